//! Database operations for the `vending_machines` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `vending_machines` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MachineRow {
    pub id: i64,
    pub lat: Decimal,
    pub lon: Decimal,
    pub location: String,
    pub description: String,
    pub available: bool,
    pub items: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Column values for a new machine. Coordinates are rounded to the column
/// scale (six decimal places) on insert.
#[derive(Debug, Clone)]
pub struct NewMachineRow<'a> {
    pub lat: Decimal,
    pub lon: Decimal,
    pub location: &'a str,
    pub description: &'a str,
    pub available: bool,
    pub items: &'a str,
    pub image_url: Option<&'a str>,
}

const MACHINE_COLUMNS: &str =
    "id, lat, lon, location, description, available, items, image_url, created_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns every machine, ordered by id (insertion order).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_machines(pool: &PgPool) -> Result<Vec<MachineRow>, DbError> {
    let rows = sqlx::query_as::<_, MachineRow>(&format!(
        "SELECT {MACHINE_COLUMNS} FROM vending_machines ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a single machine by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_machine(pool: &PgPool, id: i64) -> Result<Option<MachineRow>, DbError> {
    let row = sqlx::query_as::<_, MachineRow>(&format!(
        "SELECT {MACHINE_COLUMNS} FROM vending_machines WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Inserts a machine and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (e.g. coordinates overflow
/// `NUMERIC(9,6)`).
pub async fn create_machine(pool: &PgPool, new: &NewMachineRow<'_>) -> Result<MachineRow, DbError> {
    let row = sqlx::query_as::<_, MachineRow>(&format!(
        "INSERT INTO vending_machines \
             (lat, lon, location, description, available, items, image_url) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {MACHINE_COLUMNS}"
    ))
    .bind(new.lat.round_dp(6))
    .bind(new.lon.round_dp(6))
    .bind(new.location)
    .bind(new.description)
    .bind(new.available)
    .bind(new.items)
    .bind(new.image_url)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Sparse update of the mutable columns (`items`, `available`).
///
/// `None` keeps the current value. Returns `None` if no machine has that id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_machine(
    pool: &PgPool,
    id: i64,
    items: Option<&str>,
    available: Option<bool>,
) -> Result<Option<MachineRow>, DbError> {
    let row = sqlx::query_as::<_, MachineRow>(&format!(
        "UPDATE vending_machines \
         SET items = COALESCE($2, items), \
             available = COALESCE($3, available) \
         WHERE id = $1 \
         RETURNING {MACHINE_COLUMNS}"
    ))
    .bind(id)
    .bind(items)
    .bind(available)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
