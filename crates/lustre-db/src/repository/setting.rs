//! # Setting Repository
//!
//! Database operations for sellable settings.
//!
//! List attributes (`metal_options`, `available_shapes`, `features`,
//! `images`) are stored as JSON arrays in TEXT columns and decoded through
//! [`SettingRow`].

use chrono::{DateTime, Utc};
use lustre_core::validation::{validate_price_cents, validate_stock};
use lustre_core::{EntityKind, SellableSetting};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{from_json, stock, to_json};
use crate::error::DbResult;

const SELECT_SETTING: &str = r#"
    SELECT
        id, title, slug, description, price_cents,
        metal_options, available_shapes, features, images,
        stock, version, created_at, updated_at
    FROM settings
"#;

/// Raw `settings` row with JSON list columns.
#[derive(Debug, sqlx::FromRow)]
struct SettingRow {
    id: String,
    title: String,
    slug: String,
    description: Option<String>,
    price_cents: i64,
    metal_options: String,
    available_shapes: String,
    features: String,
    images: String,
    stock: i64,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SettingRow {
    fn into_setting(self) -> DbResult<SellableSetting> {
        Ok(SellableSetting {
            metal_options: from_json("settings.metal_options", &self.metal_options)?,
            available_shapes: from_json("settings.available_shapes", &self.available_shapes)?,
            features: from_json("settings.features", &self.features)?,
            images: from_json("settings.images", &self.images)?,
            id: self.id,
            title: self.title,
            slug: self.slug,
            description: self.description,
            price_cents: self.price_cents,
            stock: self.stock,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// =============================================================================
// Connection-level
// =============================================================================

/// Gets a setting by ID on the given connection.
pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<SellableSetting>> {
    let sql = format!("{SELECT_SETTING} WHERE id = ?1");

    let row = sqlx::query_as::<_, SettingRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(SettingRow::into_setting).transpose()
}

/// Inserts a setting on the given connection.
pub async fn insert(conn: &mut SqliteConnection, setting: &SellableSetting) -> DbResult<()> {
    validate_price_cents(setting.price_cents)?;
    validate_stock(setting.stock)?;

    debug!(id = %setting.id, slug = %setting.slug, "Inserting setting");

    sqlx::query(
        r#"
        INSERT INTO settings (
            id, title, slug, description, price_cents,
            metal_options, available_shapes, features, images,
            stock, version, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13
        )
        "#,
    )
    .bind(&setting.id)
    .bind(&setting.title)
    .bind(&setting.slug)
    .bind(&setting.description)
    .bind(setting.price_cents)
    .bind(to_json("settings.metal_options", &setting.metal_options)?)
    .bind(to_json("settings.available_shapes", &setting.available_shapes)?)
    .bind(to_json("settings.features", &setting.features)?)
    .bind(to_json("settings.images", &setting.images)?)
    .bind(setting.stock)
    .bind(setting.version)
    .bind(setting.created_at)
    .bind(setting.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Pool-level
// =============================================================================

/// Repository for setting database operations.
#[derive(Debug, Clone)]
pub struct SettingRepository {
    pool: SqlitePool,
}

impl SettingRepository {
    /// Creates a new SettingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingRepository { pool }
    }

    /// Gets a setting by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SellableSetting>> {
        let mut conn = self.pool.acquire().await?;
        find_by_id(&mut conn, id).await
    }

    /// Inserts a new setting.
    ///
    /// ## Returns
    /// * `Err(DbError::Invalid)` - Negative price or stock
    /// * `Err(DbError::UniqueViolation)` - Slug already taken
    pub async fn insert(&self, setting: &SellableSetting) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, setting).await
    }

    /// Adds `quantity` units of stock.
    pub async fn restock(&self, id: &str, quantity: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        stock::increment(&mut conn, EntityKind::Setting, id, quantity, Utc::now()).await
    }

    /// Counts settings (for diagnostics and seeding).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};

    fn setting(id: &str, stock: i64) -> SellableSetting {
        let now = Utc::now();
        SellableSetting {
            id: id.to_string(),
            title: "Classic Solitaire".to_string(),
            slug: format!("classic-solitaire-{id}"),
            description: Some("Six-prong platinum".to_string()),
            price_cents: 125_000,
            metal_options: vec!["Platinum".to_string(), "18K Yellow Gold".to_string()],
            available_shapes: vec!["round".to_string(), "oval".to_string()],
            features: vec!["cathedral".to_string()],
            images: vec![],
            stock,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trips_lists() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.settings().insert(&setting("s-1", 3)).await.unwrap();

        let loaded = db.settings().get_by_id("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.metal_options.len(), 2);
        assert_eq!(loaded.available_shapes, vec!["round", "oval"]);
        assert_eq!(loaded.stock, 3);
        assert!(db.settings().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_negative_stock_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.settings().insert(&setting("s-1", -1)).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_restock_bumps_version() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.settings().insert(&setting("s-1", 0)).await.unwrap();

        db.settings().restock("s-1", 4).await.unwrap();

        let loaded = db.settings().get_by_id("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.stock, 4);
        assert_eq!(loaded.version, 1);

        let err = db.settings().restock("missing", 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
