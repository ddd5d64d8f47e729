//! PostgreSQL store backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{Address, BookListing, CatalogReader, IdentityReader, OrderFilter, OrderStore, OrderTx, Phone};
use crate::domain::aggregates::{GatewayReceipt, LineItem, Order, Promo};
use crate::domain::pricing::BookPrice;
use crate::domain::value_objects::Percentage;
use crate::{OrderError, Result};

const ORDER_COLUMNS: &str = "id, user_id, created_at, received_at, status, total, stn, promo_id, phone_id, address_id";
const PROMO_COLUMNS: &str = "p.id, p.code, p.expires_at, p.lim, p.percentage, p.max_discount";
const RECEIPT_COLUMNS: &str = "id, order_id, authority, ref_id, code, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn OrderTx>> {
        Ok(Box::new(PgTx { tx: self.pool.begin().await? }))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, user_id: Uuid, created_at: DateTime<Utc>, received_at: Option<DateTime<Utc>>,
    status: i16, total: i64, stn: Option<String>, promo_id: Option<Uuid>,
    phone_id: Option<Uuid>, address_id: Option<Uuid>,
}

impl TryFrom<OrderRow> for Order {
    type Error = OrderError;
    fn try_from(r: OrderRow) -> Result<Self> {
        Ok(Order {
            id: r.id, user_id: r.user_id, created_at: r.created_at, received_at: r.received_at,
            status: r.status.try_into()?, total: to_amount(r.total)?, stn: r.stn,
            promo_id: r.promo_id, phone_id: r.phone_id, address_id: r.address_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow { id: Uuid, order_id: Uuid, book_id: Uuid, kind: i16, quantity: i32 }

impl TryFrom<ItemRow> for LineItem {
    type Error = OrderError;
    fn try_from(r: ItemRow) -> Result<Self> {
        Ok(LineItem { id: r.id, order_id: r.order_id, book_id: r.book_id, kind: r.kind.try_into()?, quantity: to_count(r.quantity)? })
    }
}

#[derive(sqlx::FromRow)]
struct BookRow {
    id: Uuid, title: String, availability: i16,
    digital_price: i64, digital_discount: i16, physical_price: i64, physical_discount: i16,
    stock: i32, file: Option<String>,
}

impl TryFrom<BookRow> for BookListing {
    type Error = OrderError;
    fn try_from(r: BookRow) -> Result<Self> {
        Ok(BookListing {
            id: r.id, title: r.title, availability: r.availability.try_into()?,
            price: BookPrice {
                digital_price: to_amount(r.digital_price)?, digital_discount: to_discount(r.digital_discount)?,
                physical_price: to_amount(r.physical_price)?, physical_discount: to_discount(r.physical_discount)?,
            },
            stock: to_count(r.stock)?, file: r.file,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PromoRow { id: Uuid, code: String, expires_at: DateTime<Utc>, lim: i32, percentage: i16, max_discount: Option<i64> }

impl TryFrom<PromoRow> for Promo {
    type Error = OrderError;
    fn try_from(r: PromoRow) -> Result<Self> {
        let percentage = u8::try_from(r.percentage).map_err(|_| corrupt("promo.percentage"))?;
        Ok(Promo {
            id: r.id, code: r.code, expires_at: r.expires_at, limit: to_count(r.lim)?,
            percentage: Percentage::new(percentage).map_err(|_| corrupt("promo.percentage"))?,
            max_discount: r.max_discount.map(to_amount).transpose()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReceiptRow { id: Uuid, order_id: Uuid, authority: String, ref_id: Option<String>, code: i32, created_at: DateTime<Utc> }

impl From<ReceiptRow> for GatewayReceipt {
    fn from(r: ReceiptRow) -> Self {
        GatewayReceipt { id: r.id, order_id: r.order_id, authority: r.authority, ref_id: r.ref_id, code: r.code, created_at: r.created_at }
    }
}

fn corrupt(column: &str) -> OrderError {
    OrderError::Internal(format!("Stored value out of range: {column}"))
}

fn to_amount(v: i64) -> Result<u64> { u64::try_from(v).map_err(|_| corrupt("amount")) }
fn to_count(v: i32) -> Result<u32> { u32::try_from(v).map_err(|_| corrupt("count")) }
fn to_discount(v: i16) -> Result<u8> { u8::try_from(v).map_err(|_| corrupt("discount")) }
fn db_amount(v: u64) -> Result<i64> { i64::try_from(v).map_err(|_| OrderError::InvalidInput("Amount too large".into())) }
fn db_count(v: u32) -> Result<i32> { i32::try_from(v).map_err(|_| OrderError::InvalidInput("Quantity too large".into())) }

/// Maps unique-constraint violations to `Conflict`, everything else to `Storage`.
/// Unique and foreign-key violations are races lost to another transaction.
fn constraint_as_conflict(e: sqlx::Error, message: &str) -> OrderError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
            OrderError::Conflict(message.to_string())
        }
        _ => OrderError::Storage(e),
    }
}

// =============================================================================
// Readers
// =============================================================================

#[async_trait]
impl CatalogReader for PgTx {
    async fn book(&mut self, book_id: Uuid) -> Result<Option<BookListing>> {
        sqlx::query_as::<_, BookRow>("SELECT id, title, availability, digital_price, digital_discount, physical_price, physical_discount, stock, file FROM book WHERE id = $1")
            .bind(book_id).fetch_optional(&mut *self.tx).await?
            .map(BookListing::try_from).transpose()
    }
}

#[async_trait]
impl IdentityReader for PgTx {
    async fn user_exists(&mut self, user_id: Uuid) -> Result<bool> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
            .bind(user_id).fetch_optional(&mut *self.tx).await?;
        Ok(found.is_some())
    }

    async fn phone_of_user(&mut self, phone_id: Uuid) -> Result<Option<Phone>> {
        let row: Option<(Uuid, Uuid, String)> = sqlx::query_as("SELECT id, user_id, number FROM phone WHERE id = $1")
            .bind(phone_id).fetch_optional(&mut *self.tx).await?;
        Ok(row.map(|(id, user_id, number)| Phone { id, user_id, number }))
    }

    async fn address_of_user(&mut self, address_id: Uuid) -> Result<Option<Address>> {
        let row: Option<(Uuid, Uuid)> = sqlx::query_as("SELECT id, user_id FROM address WHERE id = $1")
            .bind(address_id).fetch_optional(&mut *self.tx).await?;
        Ok(row.map(|(id, user_id)| Address { id, user_id }))
    }

    async fn email_of_user(&mut self, user_id: Uuid) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT email FROM users WHERE id = $1")
            .bind(user_id).fetch_optional(&mut *self.tx).await?;
        Ok(row.map(|(email,)| email))
    }
}

// =============================================================================
// Unit of work
// =============================================================================

#[async_trait]
impl OrderTx for PgTx {
    async fn ensure_open_order(&mut self, user_id: Uuid) -> Result<(Order, bool)> {
        let fresh = Order::open(user_id);
        let inserted = sqlx::query("INSERT INTO orders (id, user_id, created_at, status, total) VALUES ($1, $2, $3, 0, 0) ON CONFLICT (user_id) WHERE status = 0 DO NOTHING")
            .bind(fresh.id).bind(user_id).bind(fresh.created_at)
            .execute(&mut *self.tx).await?.rows_affected() == 1;
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND status = 0 FOR UPDATE"))
            .bind(user_id).fetch_one(&mut *self.tx).await?;
        Ok((row.try_into()?, inserted))
    }

    async fn order(&mut self, order_id: Uuid) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id).fetch_optional(&mut *self.tx).await?
            .map(Order::try_from).transpose()
    }

    async fn order_for_update(&mut self, order_id: Uuid) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
            .bind(order_id).fetch_optional(&mut *self.tx).await?
            .map(Order::try_from).transpose()
    }

    async fn save_order(&mut self, order: &Order) -> Result<()> {
        let updated = sqlx::query("UPDATE orders SET received_at = $2, status = $3, total = $4, stn = $5, promo_id = $6, phone_id = $7, address_id = $8 WHERE id = $1")
            .bind(order.id).bind(order.received_at).bind(order.status.code()).bind(db_amount(order.total)?)
            .bind(&order.stn).bind(order.promo_id).bind(order.phone_id).bind(order.address_id)
            .execute(&mut *self.tx).await?;
        if updated.rows_affected() == 0 { return Err(OrderError::NotFound("order")); }
        Ok(())
    }

    async fn delete_order(&mut self, order_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM orders WHERE id = $1").bind(order_id).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn orders(&mut self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let mut q = QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE TRUE"));
        if let Some(user_id) = filter.user_id { q.push(" AND user_id = ").push_bind(user_id); }
        if let Some(status) = filter.status { q.push(" AND status = ").push_bind(status.code()); }
        if let Some((from, to)) = filter.created_between {
            q.push(" AND created_at BETWEEN ").push_bind(from).push(" AND ").push_bind(to);
        }
        q.push(" ORDER BY created_at DESC, id DESC");
        q.build_query_as::<OrderRow>().fetch_all(&mut *self.tx).await?
            .into_iter().map(Order::try_from).collect()
    }

    async fn items(&mut self, order_id: Uuid) -> Result<Vec<LineItem>> {
        sqlx::query_as::<_, ItemRow>("SELECT id, order_id, book_id, kind, quantity FROM item WHERE order_id = $1 ORDER BY id")
            .bind(order_id).fetch_all(&mut *self.tx).await?
            .into_iter().map(LineItem::try_from).collect()
    }

    async fn insert_item(&mut self, item: &LineItem) -> Result<()> {
        sqlx::query("INSERT INTO item (id, order_id, book_id, kind, quantity) VALUES ($1, $2, $3, $4, $5)")
            .bind(item.id).bind(item.order_id).bind(item.book_id).bind(item.kind.code()).bind(db_count(item.quantity)?)
            .execute(&mut *self.tx).await
            .map_err(|e| constraint_as_conflict(e, "Digital copy already in the order"))?;
        Ok(())
    }

    async fn update_item_quantity(&mut self, item_id: Uuid, quantity: u32) -> Result<()> {
        sqlx::query("UPDATE item SET quantity = $2 WHERE id = $1")
            .bind(item_id).bind(db_count(quantity)?).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn delete_item(&mut self, item_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM item WHERE id = $1").bind(item_id).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn owned_digital_books(&mut self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT DISTINCT i.book_id FROM item i JOIN orders o ON o.id = i.order_id WHERE o.user_id = $1 AND o.status >= 1 AND i.kind = 0 ORDER BY i.book_id",
        )
        .bind(user_id).fetch_all(&mut *self.tx).await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn take_stock(&mut self, book_id: Uuid, quantity: u32) -> Result<()> {
        let updated = sqlx::query("UPDATE book SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
            .bind(book_id).bind(db_count(quantity)?).execute(&mut *self.tx).await?;
        if updated.rows_affected() == 0 { return Err(OrderError::InsufficientStock); }
        Ok(())
    }

    async fn return_stock(&mut self, book_id: Uuid, quantity: u32) -> Result<()> {
        sqlx::query("UPDATE book SET stock = stock + $2 WHERE id = $1")
            .bind(book_id).bind(db_count(quantity)?).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn insert_promo(&mut self, promo: &Promo) -> Result<()> {
        let max_discount = promo.max_discount.map(db_amount).transpose()?;
        sqlx::query("INSERT INTO promo (id, code, expires_at, lim, percentage, max_discount) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(promo.id).bind(&promo.code).bind(promo.expires_at).bind(db_count(promo.limit)?)
            .bind(i16::from(promo.percentage.value())).bind(max_discount)
            .execute(&mut *self.tx).await
            .map_err(|e| constraint_as_conflict(e, &format!("Promo code {} already exists", promo.code)))?;
        Ok(())
    }

    async fn grant_promo(&mut self, promo_id: Uuid, user_id: Uuid) -> Result<()> {
        sqlx::query("INSERT INTO promo_user (promo_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(promo_id).bind(user_id).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn promo(&mut self, promo_id: Uuid) -> Result<Option<Promo>> {
        sqlx::query_as::<_, PromoRow>(&format!("SELECT {PROMO_COLUMNS} FROM promo p WHERE p.id = $1"))
            .bind(promo_id).fetch_optional(&mut *self.tx).await?
            .map(Promo::try_from).transpose()
    }

    async fn granted_promo(&mut self, code: &str, user_id: Uuid) -> Result<Option<Promo>> {
        sqlx::query_as::<_, PromoRow>(&format!(
            "SELECT {PROMO_COLUMNS} FROM promo p JOIN promo_user g ON g.promo_id = p.id WHERE p.code = $1 AND g.user_id = $2 FOR UPDATE OF p"
        ))
        .bind(code).bind(user_id).fetch_optional(&mut *self.tx).await?
        .map(Promo::try_from).transpose()
    }

    async fn promos(&mut self, user_id: Option<Uuid>) -> Result<Vec<Promo>> {
        let rows = match user_id {
            Some(user_id) => sqlx::query_as::<_, PromoRow>(&format!(
                "SELECT {PROMO_COLUMNS} FROM promo p JOIN promo_user g ON g.promo_id = p.id WHERE g.user_id = $1 ORDER BY p.code"
            ))
            .bind(user_id).fetch_all(&mut *self.tx).await?,
            None => sqlx::query_as::<_, PromoRow>(&format!("SELECT {PROMO_COLUMNS} FROM promo p ORDER BY p.code"))
                .fetch_all(&mut *self.tx).await?,
        };
        rows.into_iter().map(Promo::try_from).collect()
    }

    async fn promo_in_use(&mut self, promo_id: Uuid) -> Result<bool> {
        let (in_use,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM orders WHERE promo_id = $1)")
            .bind(promo_id).fetch_one(&mut *self.tx).await?;
        Ok(in_use)
    }

    async fn delete_promo(&mut self, promo_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM promo WHERE id = $1").bind(promo_id).execute(&mut *self.tx).await
            .map_err(|e| constraint_as_conflict(e, "Promo is attached to an order"))?;
        Ok(())
    }

    async fn claim_promo(&mut self, promo_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let updated = sqlx::query("UPDATE promo SET lim = lim - 1 WHERE id = $1 AND lim > 0 AND expires_at > $2")
            .bind(promo_id).bind(now).execute(&mut *self.tx).await?;
        if updated.rows_affected() == 0 {
            return Err(OrderError::PromoUnusable("Promo is expired or exhausted".into()));
        }
        Ok(())
    }

    async fn release_promo(&mut self, promo_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE promo SET lim = lim + 1 WHERE id = $1").bind(promo_id).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn receipt_by_authority(&mut self, authority: &str) -> Result<Option<GatewayReceipt>> {
        let row = sqlx::query_as::<_, ReceiptRow>(&format!("SELECT {RECEIPT_COLUMNS} FROM zarinpal WHERE authority = $1 FOR UPDATE"))
            .bind(authority).fetch_optional(&mut *self.tx).await?;
        Ok(row.map(GatewayReceipt::from))
    }

    async fn receipt_of_order(&mut self, order_id: Uuid) -> Result<Option<GatewayReceipt>> {
        let row = sqlx::query_as::<_, ReceiptRow>(&format!("SELECT {RECEIPT_COLUMNS} FROM zarinpal WHERE order_id = $1"))
            .bind(order_id).fetch_optional(&mut *self.tx).await?;
        Ok(row.map(GatewayReceipt::from))
    }

    async fn replace_receipt(&mut self, receipt: &GatewayReceipt) -> Result<()> {
        sqlx::query("DELETE FROM zarinpal WHERE order_id = $1 AND code <> 100")
            .bind(receipt.order_id).execute(&mut *self.tx).await?;
        sqlx::query("INSERT INTO zarinpal (id, order_id, authority, ref_id, code, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(receipt.id).bind(receipt.order_id).bind(&receipt.authority).bind(&receipt.ref_id)
            .bind(receipt.code).bind(receipt.created_at)
            .execute(&mut *self.tx).await
            .map_err(|e| constraint_as_conflict(e, "Payment already recorded for this order or authority"))?;
        Ok(())
    }

    async fn save_receipt(&mut self, receipt: &GatewayReceipt) -> Result<()> {
        sqlx::query("UPDATE zarinpal SET ref_id = $2, code = $3 WHERE id = $1")
            .bind(receipt.id).bind(&receipt.ref_id).bind(receipt.code)
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::fmt;

    #[derive(Debug)]
    struct Violation(ErrorKind);

    impl fmt::Display for Violation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }

    impl std::error::Error for Violation {}

    impl DatabaseError for Violation {
        fn message(&self) -> &str { "violation" }
        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) { self }
        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) { self }
        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> { self }
        fn kind(&self) -> ErrorKind {
            match self.0 {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                ErrorKind::ForeignKeyViolation => ErrorKind::ForeignKeyViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn db_error(kind: ErrorKind) -> sqlx::Error {
        sqlx::Error::Database(Box::new(Violation(kind)))
    }

    #[test]
    fn test_constraint_violations_become_conflicts() {
        let err = constraint_as_conflict(db_error(ErrorKind::ForeignKeyViolation), "Promo is attached to an order");
        assert!(matches!(err, OrderError::Conflict(m) if m == "Promo is attached to an order"));
        let err = constraint_as_conflict(db_error(ErrorKind::UniqueViolation), "taken");
        assert!(matches!(err, OrderError::Conflict(_)));
        let err = constraint_as_conflict(db_error(ErrorKind::CheckViolation), "unused");
        assert!(matches!(err, OrderError::Storage(_)));
        let err = constraint_as_conflict(sqlx::Error::RowNotFound, "unused");
        assert!(matches!(err, OrderError::Storage(_)));
    }
}
