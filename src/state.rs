use std::sync::Arc;

use crate::{
    accounts::{AccountStore, MemoryAccountStore, PgAccountStore},
    auth::JwtKeys,
    config::AppConfig,
    courses::{CourseStore, MemoryCourseStore, PgCourseStore},
    db,
    storage::{MemoryStorage, S3Storage, StorageClient},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: Arc<JwtKeys>,
    pub accounts: Arc<dyn AccountStore>,
    pub courses: Arc<dyn CourseStore>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    /// Postgres-backed state with S3 media storage, built from the environment.
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let pool = db::connect(&config).await?;
        db::run_migrations(&pool).await;

        let storage = Arc::new(S3Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;
        Self::from_parts(
            config,
            Arc::new(PgAccountStore::new(pool.clone())),
            Arc::new(PgCourseStore::new(pool)),
            storage,
        )
    }

    pub fn from_parts(
        config: AppConfig,
        accounts: Arc<dyn AccountStore>,
        courses: Arc<dyn CourseStore>,
        storage: Arc<dyn StorageClient>,
    ) -> anyhow::Result<Self> {
        let keys = Arc::new(JwtKeys::from_config(&config.jwt)?);
        Ok(Self {
            config: Arc::new(config),
            keys,
            accounts,
            courses,
            storage,
        })
    }

    /// State whose stores and media live in process memory.
    pub fn in_memory(config: AppConfig) -> anyhow::Result<Self> {
        Self::from_parts(
            config,
            Arc::new(MemoryAccountStore::default()),
            Arc::new(MemoryCourseStore::default()),
            Arc::new(MemoryStorage::default()),
        )
    }
}
