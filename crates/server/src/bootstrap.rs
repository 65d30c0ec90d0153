use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use rebook_core::clock::SystemClock;
use rebook_core::config::{AppConfig, ConfigError, LoadOptions};
use rebook_db::repositories::{
    SqlBookingRepository, SqlDirectoryRepository, SqlProfileRepository, SqlSuggestionRepository,
};
use rebook_db::{connect, migrations, DbPool};
use rebook_engine::{
    BookingCommitter, ExpiryReaper, PreferenceLearner, SlotLockRegistry, SuggestionGenerator,
    SuggestionPresenter,
};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub learner: Arc<PreferenceLearner>,
    pub generator: Arc<SuggestionGenerator>,
    pub presenter: Arc<SuggestionPresenter>,
    pub committer: Arc<BookingCommitter>,
    pub reaper: Arc<ExpiryReaper>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let bookings = Arc::new(SqlBookingRepository::new(db_pool.clone()));
    let profiles = Arc::new(SqlProfileRepository::new(db_pool.clone()));
    let suggestions = Arc::new(SqlSuggestionRepository::new(db_pool.clone()));
    let directory = Arc::new(SqlDirectoryRepository::new(db_pool.clone()));
    let clock = Arc::new(SystemClock);
    let locks = SlotLockRegistry::new();

    Ok(Application {
        learner: Arc::new(PreferenceLearner::new(
            bookings.clone(),
            profiles.clone(),
            clock.clone(),
        )),
        generator: Arc::new(SuggestionGenerator::new(
            profiles.clone(),
            suggestions.clone(),
            bookings.clone(),
            clock.clone(),
        )),
        presenter: Arc::new(SuggestionPresenter::new(
            suggestions.clone(),
            profiles.clone(),
            bookings.clone(),
            directory.clone(),
            clock.clone(),
        )),
        committer: Arc::new(BookingCommitter::new(
            suggestions.clone(),
            bookings,
            directory,
            locks,
            clock.clone(),
        )),
        reaper: Arc::new(ExpiryReaper::new(suggestions, clock)),
        config,
        db_pool,
    })
}
