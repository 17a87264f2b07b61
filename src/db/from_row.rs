//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const PURCHASE_RECORD_COLS: &str =
    "purchase_code, product_id, product_name, buyer, license_tier, supported_until, cached_at";

pub const REGISTRATION_COLS: &str = "id, purchase_code, domain, environment, server_address, admin_contact, supported_until, revoked, registered_at, updated_at";

// ============ FromRow Implementations ============

impl FromRow for PurchaseRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PurchaseRecord {
            purchase_code: row.get(0)?,
            product_id: row.get(1)?,
            product_name: row.get(2)?,
            buyer: row.get(3)?,
            license_tier: row.get(4)?,
            supported_until: row.get(5)?,
            cached_at: row.get(6)?,
        })
    }
}

impl FromRow for Registration {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Registration {
            id: row.get(0)?,
            purchase_code: row.get(1)?,
            domain: row.get(2)?,
            environment: parse_enum(row, 3, "environment")?,
            server_address: row.get(4)?,
            admin_contact: row.get(5)?,
            supported_until: row.get(6)?,
            revoked: row.get::<_, i32>(7)? != 0,
            registered_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}
