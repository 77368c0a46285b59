use crate::config::DatabaseConfig;
use deadpool_sqlite::{Config, Object, Pool, PoolConfig, Runtime};
use rusqlite::Connection;

/// Settings stored in the database file itself.
fn apply_database_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")
}

/// Settings SQLite forgets when a connection closes. Every pooled
/// connection needs these.
pub fn apply_connection_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -16384;
        PRAGMA busy_timeout = 5000;
        PRAGMA temp_store = MEMORY;
        ",
    )
}

/// Create a deadpool-sqlite connection pool sized from config.
pub fn create_pool(config: &DatabaseConfig) -> Result<Pool, deadpool_sqlite::CreatePoolError> {
    let db_path = config.path.clone();

    // Set restrictive file permissions on the database file (Unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if db_path.exists() {
            if let Err(e) =
                std::fs::set_permissions(&db_path, std::fs::Permissions::from_mode(0o600))
            {
                tracing::warn!(error = %e, "failed to set database file permissions");
            }
        }
    }

    let mut cfg = Config::new(db_path);
    cfg.pool = Some(PoolConfig::new(config.pool_size.max(1)));
    cfg.create_pool(Runtime::Tokio1)
}

/// Run migrations, then open every pooled connection once and apply the
/// per-connection PRAGMAs to it. The pool keeps idle connections, so each
/// one is configured for its lifetime.
pub async fn init_pool(pool: &Pool) -> Result<(), Box<dyn std::error::Error>> {
    let first = pool.get().await?;
    first
        .interact(|conn| {
            apply_database_pragmas(conn)?;
            apply_connection_pragmas(conn)?;
            crate::storage::migrations::run_migrations(conn)?;
            Ok::<_, rusqlite::Error>(())
        })
        .await??;

    let size = pool.status().max_size;
    let mut held: Vec<Object> = vec![first];
    while held.len() < size {
        let conn = pool.get().await?;
        conn.interact(|conn| apply_connection_pragmas(conn)).await??;
        held.push(conn);
    }

    tracing::debug!(connections = held.len(), "sqlite pool warmed");
    Ok(())
}
