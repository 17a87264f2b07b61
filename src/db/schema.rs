use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Purchase records (cache of the purchase authority's answers)
        -- Never deleted: a forced refresh overwrites the row in place.
        CREATE TABLE IF NOT EXISTS purchase_records (
            purchase_code TEXT PRIMARY KEY,
            product_id TEXT NOT NULL,
            product_name TEXT NOT NULL,
            buyer TEXT NOT NULL,
            license_tier TEXT NOT NULL,
            supported_until TEXT,
            cached_at INTEGER NOT NULL
        );

        -- Registrations (one slot held by a domain for a purchase code)
        -- Never deleted: revocation only sets revoked = 1, keeping history for disputes.
        -- domain: normalized key; rows written by older clients may carry a scheme prefix.
        CREATE TABLE IF NOT EXISTS registrations (
            id TEXT PRIMARY KEY,
            purchase_code TEXT NOT NULL,
            domain TEXT NOT NULL,
            environment TEXT NOT NULL CHECK (environment IN ('production', 'development')),
            server_address TEXT NOT NULL,
            admin_contact TEXT,
            supported_until TEXT,
            revoked INTEGER NOT NULL DEFAULT 0,
            registered_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_registrations_code ON registrations(purchase_code);
        CREATE INDEX IF NOT EXISTS idx_registrations_slots ON registrations(purchase_code, environment, revoked);
        "#,
    )?;
    Ok(())
}

/// Per-connection settings applied by the pool.
///
/// WAL lets status reads proceed while an activation holds the write lock;
/// the busy timeout makes a second writer wait for the lock instead of failing.
pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        "#,
    )
}

const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
