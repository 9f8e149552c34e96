//! PostgreSQL store.
//!
//! A unit of work is a database transaction. Records read through it are
//! locked with `SELECT ... FOR UPDATE`, so concurrent units touching the same
//! stock item serialize on the row lock while disjoint units run in
//! parallel. Serialization failures and deadlocks surface as `Conflict`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    DateRange, Expense, Pagination, Purchase, PurchaseItem, StockCategory, StockItem, Usage,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, PgConnection, Postgres, Transaction};
use uuid::Uuid;

use super::{InventoryStore, Page, UnitOfWork};
use crate::error::{AppError, AppResult};

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Map driver errors, turning lock contention into `Conflict`
fn map_db_err(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if matches!(
            db_err.code().as_deref(),
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
        ) {
            return AppError::conflict("stock_item", db_err.message().to_string());
        }
    }
    AppError::DatabaseError(err)
}

/// `ILIKE` pattern matching `fragment` literally anywhere in the value
fn contains_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// PostgreSQL implementation of [`InventoryStore`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a connection pool and wrap it
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> AppResult<Self> {
        tracing::info!(max_connections, min_connections, "Connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        tracing::info!("Database connection established");
        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> AppResult<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))?;
        tracing::info!("Migrations completed");
        Ok(())
    }

    async fn attach_items(&self, rows: Vec<PurchaseRow>) -> AppResult<Vec<Purchase>> {
        let mut conn = self.pool.acquire().await?;
        load_purchase_items(&mut conn, rows).await
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct StockItemRow {
    id: Uuid,
    name: String,
    category: String,
    quantity: Decimal,
    unit: String,
    unit_price: Decimal,
    reorder_level: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StockItemRow> for StockItem {
    type Error = AppError;

    fn try_from(row: StockItemRow) -> Result<Self, Self::Error> {
        let category = StockCategory::parse(&row.category).ok_or_else(|| {
            AppError::Internal(format!("Unknown stock category '{}'", row.category))
        })?;

        Ok(StockItem {
            id: row.id,
            name: row.name,
            category,
            quantity: row.quantity,
            unit: row.unit,
            unit_price: row.unit_price,
            reorder_level: row.reorder_level,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn stock_items(rows: Vec<StockItemRow>) -> AppResult<Vec<StockItem>> {
    rows.into_iter().map(StockItem::try_from).collect()
}

#[derive(Debug, FromRow)]
struct PurchaseRow {
    id: Uuid,
    supplier_id: Uuid,
    date: NaiveDate,
    total_cost: Decimal,
}

#[derive(Debug, FromRow)]
struct PurchaseItemRow {
    id: Uuid,
    purchase_id: Uuid,
    stock_item_id: Uuid,
    quantity: Decimal,
    price: Decimal,
}

#[derive(Debug, FromRow)]
struct UsageRow {
    id: Uuid,
    stock_item_id: Uuid,
    quantity_used: Decimal,
    date: NaiveDate,
    purpose: Option<String>,
    created_by: Option<String>,
}

impl From<UsageRow> for Usage {
    fn from(row: UsageRow) -> Self {
        Usage {
            id: row.id,
            stock_item_id: row.stock_item_id,
            quantity_used: row.quantity_used,
            date: row.date,
            purpose: row.purpose,
            created_by: row.created_by,
        }
    }
}

#[derive(Debug, FromRow)]
struct ExpenseRow {
    id: Uuid,
    category: String,
    description: Option<String>,
    amount: Option<Decimal>,
    date: NaiveDate,
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Expense {
            id: row.id,
            category: row.category,
            description: row.description,
            amount: row.amount,
            date: row.date,
        }
    }
}

const STOCK_COLUMNS: &str =
    "id, name, category, quantity, unit, unit_price, reorder_level, created_at, updated_at";
const PURCHASE_COLUMNS: &str = "id, supplier_id, date, total_cost";
const USAGE_COLUMNS: &str = "id, stock_item_id, quantity_used, date, purpose, created_by";
const EXPENSE_COLUMNS: &str = "id, category, description, amount, date";

/// Fetch the items of every purchase in `rows` with one query
async fn load_purchase_items(
    conn: &mut PgConnection,
    rows: Vec<PurchaseRow>,
) -> AppResult<Vec<Purchase>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let item_rows = sqlx::query_as::<_, PurchaseItemRow>(
        r#"
        SELECT id, purchase_id, stock_item_id, quantity, price
        FROM purchase_items
        WHERE purchase_id = ANY($1)
        ORDER BY purchase_id, position
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_err)?;

    let mut items: HashMap<Uuid, Vec<PurchaseItem>> = HashMap::new();
    for row in item_rows {
        items.entry(row.purchase_id).or_default().push(PurchaseItem {
            id: row.id,
            stock_item_id: row.stock_item_id,
            quantity: row.quantity,
            price: row.price,
        });
    }

    Ok(rows
        .into_iter()
        .map(|row| Purchase {
            id: row.id,
            supplier_id: row.supplier_id,
            date: row.date,
            total_cost: row.total_cost,
            items: items.remove(&row.id).unwrap_or_default(),
        })
        .collect())
}

// ============================================================================
// Unit of work
// ============================================================================

/// Unit of work backed by a PostgreSQL transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn stock_item(&mut self, id: Uuid) -> AppResult<Option<StockItem>> {
        let row = sqlx::query_as::<_, StockItemRow>(&format!(
            "SELECT {} FROM stock_items WHERE id = $1 FOR UPDATE",
            STOCK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        row.map(StockItem::try_from).transpose()
    }

    async fn put_stock_item(&mut self, item: &StockItem) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_items (id, name, category, quantity, unit, unit_price, reorder_level, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                category = EXCLUDED.category,
                quantity = EXCLUDED.quantity,
                unit = EXCLUDED.unit,
                unit_price = EXCLUDED.unit_price,
                reorder_level = EXCLUDED.reorder_level,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(item.category.as_str())
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.unit_price)
        .bind(item.reorder_level)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        Ok(())
    }

    async fn delete_stock_item(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM stock_items WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn purchase(&mut self, id: Uuid) -> AppResult<Option<Purchase>> {
        let row = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {} FROM purchases WHERE id = $1 FOR UPDATE",
            PURCHASE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        match row {
            Some(row) => Ok(load_purchase_items(&mut self.tx, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn put_purchase(&mut self, purchase: &Purchase) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchases (id, supplier_id, date, total_cost)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                supplier_id = EXCLUDED.supplier_id,
                date = EXCLUDED.date,
                total_cost = EXCLUDED.total_cost
            "#,
        )
        .bind(purchase.id)
        .bind(purchase.supplier_id)
        .bind(purchase.date)
        .bind(purchase.total_cost)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        // The item collection is always replaced as a whole
        sqlx::query("DELETE FROM purchase_items WHERE purchase_id = $1")
            .bind(purchase.id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        for (position, item) in purchase.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO purchase_items (id, purchase_id, stock_item_id, quantity, price, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id)
            .bind(purchase.id)
            .bind(item.stock_item_id)
            .bind(item.quantity)
            .bind(item.price)
            .bind(position as i32)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        }

        Ok(())
    }

    async fn delete_purchase(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM purchases WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn usage(&mut self, id: Uuid) -> AppResult<Option<Usage>> {
        let row = sqlx::query_as::<_, UsageRow>(&format!(
            "SELECT {} FROM usages WHERE id = $1 FOR UPDATE",
            USAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        Ok(row.map(Usage::from))
    }

    async fn put_usage(&mut self, usage: &Usage) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO usages (id, stock_item_id, quantity_used, date, purpose, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                stock_item_id = EXCLUDED.stock_item_id,
                quantity_used = EXCLUDED.quantity_used,
                date = EXCLUDED.date,
                purpose = EXCLUDED.purpose,
                created_by = EXCLUDED.created_by
            "#,
        )
        .bind(usage.id)
        .bind(usage.stock_item_id)
        .bind(usage.quantity_used)
        .bind(usage.date)
        .bind(&usage.purpose)
        .bind(&usage.created_by)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        Ok(())
    }

    async fn delete_usage(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM usages WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn expense(&mut self, id: Uuid) -> AppResult<Option<Expense>> {
        let row = sqlx::query_as::<_, ExpenseRow>(&format!(
            "SELECT {} FROM expenses WHERE id = $1 FOR UPDATE",
            EXPENSE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        Ok(row.map(Expense::from))
    }

    async fn put_expense(&mut self, expense: &Expense) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO expenses (id, category, description, amount, date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                category = EXCLUDED.category,
                description = EXCLUDED.description,
                amount = EXCLUDED.amount,
                date = EXCLUDED.date
            "#,
        )
        .bind(expense.id)
        .bind(&expense.category)
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(expense.date)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        Ok(())
    }

    async fn delete_expense(&mut self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await.map_err(map_db_err)
    }
}

// ============================================================================
// Store
// ============================================================================

#[async_trait]
impl InventoryStore for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(map_db_err)?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_stock_items(
        &self,
        pagination: &Pagination,
        query: Option<&str>,
    ) -> AppResult<Page<StockItem>> {
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(contains_pattern);

        let rows = sqlx::query_as::<_, StockItemRow>(&format!(
            r#"
            SELECT {}
            FROM stock_items
            WHERE ($1::text IS NULL OR name ILIKE $1 ESCAPE '\')
            ORDER BY name, id
            LIMIT $2 OFFSET $3
            "#,
            STOCK_COLUMNS
        ))
        .bind(&pattern)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r"SELECT COUNT(*) FROM stock_items WHERE ($1::text IS NULL OR name ILIKE $1 ESCAPE '\')",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok((stock_items(rows)?, total as u64))
    }

    async fn list_purchases(&self, pagination: &Pagination) -> AppResult<Page<Purchase>> {
        let rows = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {} FROM purchases ORDER BY date DESC, id LIMIT $1 OFFSET $2",
            PURCHASE_COLUMNS
        ))
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM purchases")
            .fetch_one(&self.pool)
            .await?;

        Ok((self.attach_items(rows).await?, total as u64))
    }

    async fn list_usages(&self, pagination: &Pagination) -> AppResult<Page<Usage>> {
        let rows = sqlx::query_as::<_, UsageRow>(&format!(
            "SELECT {} FROM usages ORDER BY date DESC, id LIMIT $1 OFFSET $2",
            USAGE_COLUMNS
        ))
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM usages")
            .fetch_one(&self.pool)
            .await?;

        Ok((rows.into_iter().map(Usage::from).collect(), total as u64))
    }

    async fn list_expenses(&self, pagination: &Pagination) -> AppResult<Page<Expense>> {
        let rows = sqlx::query_as::<_, ExpenseRow>(&format!(
            "SELECT {} FROM expenses ORDER BY date DESC, id LIMIT $1 OFFSET $2",
            EXPENSE_COLUMNS
        ))
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM expenses")
            .fetch_one(&self.pool)
            .await?;

        Ok((rows.into_iter().map(Expense::from).collect(), total as u64))
    }

    async fn all_stock_items(&self) -> AppResult<Vec<StockItem>> {
        let rows = sqlx::query_as::<_, StockItemRow>(&format!(
            "SELECT {} FROM stock_items",
            STOCK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        stock_items(rows)
    }

    async fn purchases_between(&self, range: &DateRange) -> AppResult<Vec<Purchase>> {
        let rows = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {} FROM purchases WHERE date BETWEEN $1 AND $2",
            PURCHASE_COLUMNS
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        self.attach_items(rows).await
    }

    async fn usages_between(&self, range: &DateRange) -> AppResult<Vec<Usage>> {
        let rows = sqlx::query_as::<_, UsageRow>(&format!(
            "SELECT {} FROM usages WHERE date BETWEEN $1 AND $2",
            USAGE_COLUMNS
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Usage::from).collect())
    }

    async fn expenses_between(&self, range: &DateRange) -> AppResult<Vec<Expense>> {
        let rows = sqlx::query_as::<_, ExpenseRow>(&format!(
            "SELECT {} FROM expenses WHERE date BETWEEN $1 AND $2",
            EXPENSE_COLUMNS
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Expense::from).collect())
    }

    async fn get_stock_item(&self, id: Uuid) -> AppResult<Option<StockItem>> {
        let row = sqlx::query_as::<_, StockItemRow>(&format!(
            "SELECT {} FROM stock_items WHERE id = $1",
            STOCK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StockItem::try_from).transpose()
    }

    async fn get_purchase(&self, id: Uuid) -> AppResult<Option<Purchase>> {
        let row = sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {} FROM purchases WHERE id = $1",
            PURCHASE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn get_usage(&self, id: Uuid) -> AppResult<Option<Usage>> {
        let row = sqlx::query_as::<_, UsageRow>(&format!(
            "SELECT {} FROM usages WHERE id = $1",
            USAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Usage::from))
    }

    async fn get_expense(&self, id: Uuid) -> AppResult<Option<Expense>> {
        let row = sqlx::query_as::<_, ExpenseRow>(&format!(
            "SELECT {} FROM expenses WHERE id = $1",
            EXPENSE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Expense::from))
    }
}
