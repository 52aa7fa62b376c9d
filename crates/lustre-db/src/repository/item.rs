//! # Item Repository
//!
//! Database operations for sellable items (graded stones and other
//! individually serialized pieces).

use chrono::Utc;
use lustre_core::validation::{validate_price_cents, validate_stock};
use lustre_core::{EntityKind, SellableItem};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::stock;
use crate::error::DbResult;

/// Gets an item by ID on the given connection.
pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<SellableItem>> {
    let item = sqlx::query_as::<_, SellableItem>(
        r#"
        SELECT
            id, sku, shape, carat, cut, clarity, color, lab_grown,
            certificate, price_cents, stock, version, created_at, updated_at
        FROM items
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(item)
}

/// Inserts an item on the given connection.
pub async fn insert(conn: &mut SqliteConnection, item: &SellableItem) -> DbResult<()> {
    validate_price_cents(item.price_cents)?;
    validate_stock(item.stock)?;

    debug!(id = %item.id, sku = %item.sku, "Inserting item");

    sqlx::query(
        r#"
        INSERT INTO items (
            id, sku, shape, carat, cut, clarity, color, lab_grown,
            certificate, price_cents, stock, version, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
            ?9, ?10, ?11, ?12, ?13, ?14
        )
        "#,
    )
    .bind(&item.id)
    .bind(&item.sku)
    .bind(&item.shape)
    .bind(item.carat)
    .bind(&item.cut)
    .bind(&item.clarity)
    .bind(&item.color)
    .bind(item.lab_grown)
    .bind(&item.certificate)
    .bind(item.price_cents)
    .bind(item.stock)
    .bind(item.version)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Repository for item database operations.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Gets an item by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SellableItem>> {
        let mut conn = self.pool.acquire().await?;
        find_by_id(&mut conn, id).await
    }

    /// Inserts a new item.
    pub async fn insert(&self, item: &SellableItem) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, item).await
    }

    /// Adds `quantity` units of stock.
    pub async fn restock(&self, id: &str, quantity: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        stock::increment(&mut conn, EntityKind::Item, id, quantity, Utc::now()).await
    }

    /// Counts items.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
