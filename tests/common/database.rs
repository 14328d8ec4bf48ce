//! Test database setup
#![allow(dead_code)]

use charity_gallery::db::ensure_schema;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Fresh in-memory SQLite database with the gallery schema.
///
/// A single pooled connection keeps every query on the same in-memory database.
pub async fn setup_test_database() -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(opt).await?;
    ensure_schema(&db).await?;
    Ok(db)
}
