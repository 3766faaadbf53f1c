use std::sync::Arc;

use fieldops_core::Result;
use fieldops_storage_sqlite::{create_pool_with_size, init, run_migrations, DbPool};
use tracing::info;

use crate::config::Config;

/// Shared handler state.
pub struct AppState {
    pub pool: Arc<DbPool>,
    pub db_path: String,
}

/// Prepares the database (directory, migrations, pool) and builds the state.
pub fn build_state(config: &Config) -> Result<Arc<AppState>> {
    let db_path = init(&config.data_dir)?;
    run_migrations(&db_path)?;
    let pool = create_pool_with_size(&db_path, config.pool_size)?;
    info!(
        "Database ready at {} (pool size {})",
        db_path, config.pool_size
    );
    Ok(Arc::new(AppState { pool, db_path }))
}
