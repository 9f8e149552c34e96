//! In-memory store with optimistic concurrency.
//!
//! Every record carries a version drawn from a global counter. A unit of work
//! remembers the version of each record it touched and stages its writes
//! locally; `commit` re-checks those versions under the write lock and fails
//! with `Conflict` if any record changed in the meantime. Units that touch
//! disjoint records never conflict.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use shared::{DateRange, Expense, Pagination, Purchase, StockItem, Usage};
use uuid::Uuid;

use super::{InventoryStore, Page, UnitOfWork};
use crate::error::{AppError, AppResult};

struct Versioned<T> {
    version: u64,
    value: T,
}

type Table<T> = HashMap<Uuid, Versioned<T>>;

#[derive(Default)]
struct Tables {
    stock: Table<StockItem>,
    purchases: Table<Purchase>,
    usages: Table<Usage>,
    expenses: Table<Expense>,
    next_version: u64,
}

/// Thread-safe in-memory implementation of [`InventoryStore`]
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Tables>> {
        self.inner
            .read()
            .map_err(|_| AppError::Internal("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Tables>> {
        self.inner
            .write()
            .map_err(|_| AppError::Internal("in-memory store lock poisoned".to_string()))
    }

    fn get<T: Record>(&self, id: Uuid) -> AppResult<Option<T>> {
        let tables = self.read()?;
        Ok(T::table(&tables).get(&id).map(|v| v.value.clone()))
    }

    fn collect<T: Record>(&self, keep: impl Fn(&T) -> bool) -> AppResult<Vec<T>> {
        let tables = self.read()?;
        Ok(T::table(&tables)
            .values()
            .filter(|v| keep(&v.value))
            .map(|v| v.value.clone())
            .collect())
    }
}

fn paginate<T>(rows: Vec<T>, pagination: &Pagination) -> Page<T> {
    let total = rows.len() as u64;
    let page = rows
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(pagination.limit() as usize)
        .collect();
    (page, total)
}

/// Records that live in one of the in-memory tables
trait Record: Clone + Send + 'static {
    const KIND: &'static str;

    fn table(tables: &Tables) -> &Table<Self>;
    fn table_mut(tables: &mut Tables) -> &mut Table<Self>;
    fn staged(uow: &mut MemoryUnitOfWork) -> &mut Staged<Self>;
}

macro_rules! record {
    ($ty:ty, $kind:literal, $table:ident) => {
        impl Record for $ty {
            const KIND: &'static str = $kind;

            fn table(tables: &Tables) -> &Table<Self> {
                &tables.$table
            }

            fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
                &mut tables.$table
            }

            fn staged(uow: &mut MemoryUnitOfWork) -> &mut Staged<Self> {
                &mut uow.$table
            }
        }
    };
}

record!(StockItem, "stock_item", stock);
record!(Purchase, "purchase", purchases);
record!(Usage, "usage", usages);
record!(Expense, "expense", expenses);

/// Versions observed and writes staged by a unit of work for one table.
/// An observed version of 0 means the record did not exist.
struct Staged<T> {
    observed: HashMap<Uuid, u64>,
    writes: HashMap<Uuid, Option<T>>,
}

impl<T> Default for Staged<T> {
    fn default() -> Self {
        Self {
            observed: HashMap::new(),
            writes: HashMap::new(),
        }
    }
}

impl<T: Record> Staged<T> {
    fn validate(&self, tables: &Tables) -> AppResult<()> {
        let table = T::table(tables);
        for (id, expected) in &self.observed {
            let current = table.get(id).map(|v| v.version).unwrap_or(0);
            if current != *expected {
                tracing::debug!(kind = T::KIND, %id, expected, current, "version mismatch, rejecting commit");
                return Err(AppError::conflict(
                    T::KIND,
                    format!("{} {} was modified concurrently", T::KIND, id),
                ));
            }
        }
        Ok(())
    }

    fn apply(self, tables: &mut Tables) {
        for (id, write) in self.writes {
            match write {
                Some(value) => {
                    tables.next_version += 1;
                    let version = tables.next_version;
                    T::table_mut(tables).insert(id, Versioned { version, value });
                }
                None => {
                    T::table_mut(tables).remove(&id);
                }
            }
        }
    }
}

/// Unit of work over a [`MemoryStore`]
pub struct MemoryUnitOfWork {
    store: MemoryStore,
    stock: Staged<StockItem>,
    purchases: Staged<Purchase>,
    usages: Staged<Usage>,
    expenses: Staged<Expense>,
}

impl MemoryUnitOfWork {
    fn new(store: MemoryStore) -> Self {
        Self {
            store,
            stock: Staged::default(),
            purchases: Staged::default(),
            usages: Staged::default(),
            expenses: Staged::default(),
        }
    }

    /// Reads see this unit's own staged writes first
    fn get<T: Record>(&mut self, id: Uuid) -> AppResult<Option<T>> {
        if let Some(staged) = T::staged(self).writes.get(&id) {
            return Ok(staged.clone());
        }

        let (version, value) = {
            let tables = self.store.read()?;
            match T::table(&tables).get(&id) {
                Some(v) => (v.version, Some(v.value.clone())),
                None => (0, None),
            }
        };

        T::staged(self).observed.entry(id).or_insert(version);
        Ok(value)
    }

    fn observe<T: Record>(&mut self, id: Uuid) -> AppResult<()> {
        if T::staged(self).observed.contains_key(&id) {
            return Ok(());
        }
        let version = {
            let tables = self.store.read()?;
            T::table(&tables).get(&id).map(|v| v.version).unwrap_or(0)
        };
        T::staged(self).observed.insert(id, version);
        Ok(())
    }

    fn put<T: Record>(&mut self, id: Uuid, value: T) -> AppResult<()> {
        self.observe::<T>(id)?;
        T::staged(self).writes.insert(id, Some(value));
        Ok(())
    }

    fn delete<T: Record>(&mut self, id: Uuid) -> AppResult<bool> {
        let existed = self.get::<T>(id)?.is_some();
        if existed {
            T::staged(self).writes.insert(id, None);
        }
        Ok(existed)
    }

    fn commit_sync(self) -> AppResult<()> {
        let MemoryUnitOfWork {
            store,
            stock,
            purchases,
            usages,
            expenses,
        } = self;

        let mut tables = store.write()?;

        stock.validate(&tables)?;
        purchases.validate(&tables)?;
        usages.validate(&tables)?;
        expenses.validate(&tables)?;

        stock.apply(&mut tables);
        purchases.apply(&mut tables);
        usages.apply(&mut tables);
        expenses.apply(&mut tables);

        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn stock_item(&mut self, id: Uuid) -> AppResult<Option<StockItem>> {
        self.get(id)
    }

    async fn put_stock_item(&mut self, item: &StockItem) -> AppResult<()> {
        self.put(item.id, item.clone())
    }

    async fn delete_stock_item(&mut self, id: Uuid) -> AppResult<bool> {
        self.delete::<StockItem>(id)
    }

    async fn purchase(&mut self, id: Uuid) -> AppResult<Option<Purchase>> {
        self.get(id)
    }

    async fn put_purchase(&mut self, purchase: &Purchase) -> AppResult<()> {
        self.put(purchase.id, purchase.clone())
    }

    async fn delete_purchase(&mut self, id: Uuid) -> AppResult<bool> {
        self.delete::<Purchase>(id)
    }

    async fn usage(&mut self, id: Uuid) -> AppResult<Option<Usage>> {
        self.get(id)
    }

    async fn put_usage(&mut self, usage: &Usage) -> AppResult<()> {
        self.put(usage.id, usage.clone())
    }

    async fn delete_usage(&mut self, id: Uuid) -> AppResult<bool> {
        self.delete::<Usage>(id)
    }

    async fn expense(&mut self, id: Uuid) -> AppResult<Option<Expense>> {
        self.get(id)
    }

    async fn put_expense(&mut self, expense: &Expense) -> AppResult<()> {
        self.put(expense.id, expense.clone())
    }

    async fn delete_expense(&mut self, id: Uuid) -> AppResult<bool> {
        self.delete::<Expense>(id)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        (*self).commit_sync()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork::new(self.clone())))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list_stock_items(
        &self,
        pagination: &Pagination,
        query: Option<&str>,
    ) -> AppResult<Page<StockItem>> {
        let needle = query
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        let mut rows = self.collect::<StockItem>(|s| match &needle {
            Some(needle) => s.name.to_lowercase().contains(needle.as_str()),
            None => true,
        })?;
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(rows, pagination))
    }

    async fn list_purchases(&self, pagination: &Pagination) -> AppResult<Page<Purchase>> {
        let mut rows = self.collect::<Purchase>(|_| true)?;
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
        Ok(paginate(rows, pagination))
    }

    async fn list_usages(&self, pagination: &Pagination) -> AppResult<Page<Usage>> {
        let mut rows = self.collect::<Usage>(|_| true)?;
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
        Ok(paginate(rows, pagination))
    }

    async fn list_expenses(&self, pagination: &Pagination) -> AppResult<Page<Expense>> {
        let mut rows = self.collect::<Expense>(|_| true)?;
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
        Ok(paginate(rows, pagination))
    }

    async fn all_stock_items(&self) -> AppResult<Vec<StockItem>> {
        self.collect::<StockItem>(|_| true)
    }

    async fn purchases_between(&self, range: &DateRange) -> AppResult<Vec<Purchase>> {
        self.collect::<Purchase>(|p| range.contains(p.date))
    }

    async fn usages_between(&self, range: &DateRange) -> AppResult<Vec<Usage>> {
        self.collect::<Usage>(|u| range.contains(u.date))
    }

    async fn expenses_between(&self, range: &DateRange) -> AppResult<Vec<Expense>> {
        self.collect::<Expense>(|e| range.contains(e.date))
    }

    async fn get_stock_item(&self, id: Uuid) -> AppResult<Option<StockItem>> {
        self.get(id)
    }

    async fn get_purchase(&self, id: Uuid) -> AppResult<Option<Purchase>> {
        self.get(id)
    }

    async fn get_usage(&self, id: Uuid) -> AppResult<Option<Usage>> {
        self.get(id)
    }

    async fn get_expense(&self, id: Uuid) -> AppResult<Option<Expense>> {
        self.get(id)
    }
}
