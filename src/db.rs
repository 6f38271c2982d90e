use std::time::Duration;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema,
};
use tracing::info;

use crate::config::AppConfig;
use crate::entities;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl DbConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            url: config.database_url.clone(),
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            ..Default::default()
        }
    }
}

/// Establishes a connection pool to the database
pub async fn establish_connection(config: &DbConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);

    let pool = Database::connect(options).await?;
    info!(url = %config.url, "database connection established");
    Ok(pool)
}

/// Establishes a connection from application configuration, creating the
/// schema when `auto_create_schema` is enabled.
pub async fn establish_connection_from_app_config(
    config: &AppConfig,
) -> Result<DatabaseConnection, DbErr> {
    let pool = establish_connection(&DbConfig::from_app_config(config)).await?;
    if config.auto_create_schema {
        init_schema(&pool).await?;
    }
    Ok(pool)
}

/// Creates all workflow tables from the entity definitions.
///
/// Used by tests and SQLite deployments; production schemas are managed by
/// the operations tooling outside this crate.
pub async fn init_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(entities::deal::Entity),
        schema.create_table_from_entity(entities::offer_request::Entity),
        schema.create_table_from_entity(entities::offer::Entity),
        schema.create_table_from_entity(entities::offer_equipment::Entity),
        schema.create_table_from_entity(entities::offer_installment::Entity),
        schema.create_table_from_entity(entities::contract::Entity),
        schema.create_table_from_entity(entities::contract_installment::Entity),
        schema.create_table_from_entity(entities::spare_part_request::Entity),
        schema.create_table_from_entity(entities::status_history::Entity),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        db.execute(backend.build(statement)).await?;
    }

    Ok(())
}
