//! Schema for the `users` table.
//!
//! `apply` only ever adds: the table, any missing column, and the indexes.
//! Existing columns are never altered or dropped. `revert` drops the table.

use anyhow::Context;
use sqlx::PgPool;
use tracing::info;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    username VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL,
    password_hash VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at TIMESTAMPTZ
)"#;

/// Columns backfilled onto a table created by an older schema. Identity
/// columns arrive nullable with no default; pre-existing rows keep NULL.
const COLUMNS: &[(&str, &str)] = &[
    ("username", "VARCHAR(255)"),
    ("email", "VARCHAR(255)"),
    ("password_hash", "VARCHAR(255)"),
    ("created_at", "TIMESTAMPTZ NOT NULL DEFAULT NOW()"),
    ("updated_at", "TIMESTAMPTZ NOT NULL DEFAULT NOW()"),
    ("deleted_at", "TIMESTAMPTZ"),
];

// Uniqueness only binds live rows, so a tombstoned user's email can be reused.
const INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username_active ON users (username) WHERE deleted_at IS NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_active ON users (email) WHERE deleted_at IS NULL",
    "CREATE INDEX IF NOT EXISTS idx_users_deleted_at ON users (deleted_at)",
];

const DROP_TABLE: &str = "DROP TABLE IF EXISTS users";

pub fn apply_statements() -> Vec<String> {
    let mut stmts = vec![CREATE_TABLE.trim().to_string()];
    stmts.extend(
        COLUMNS
            .iter()
            .map(|(name, def)| format!("ALTER TABLE users ADD COLUMN IF NOT EXISTS {name} {def}")),
    );
    stmts.extend(INDEXES.iter().map(|s| s.to_string()));
    stmts
}

pub async fn apply(pool: &PgPool) -> anyhow::Result<()> {
    info!("running database migrations");
    let mut tx = pool.begin().await.context("begin migration transaction")?;
    for sql in apply_statements() {
        sqlx::query(&sql)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration statement failed: {sql}"))?;
    }
    tx.commit().await.context("commit migration")?;
    info!("database migration completed");
    Ok(())
}

pub async fn revert(pool: &PgPool) -> anyhow::Result<()> {
    info!("rolling back database migrations");
    sqlx::query(DROP_TABLE)
        .execute(pool)
        .await
        .context("drop users table")?;
    info!("database rollback completed");
    Ok(())
}
