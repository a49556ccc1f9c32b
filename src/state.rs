use std::{future::Future, sync::Arc};

use anyhow::Context;
use tracing::info;

use crate::auth::repo::UserRepo;
use crate::config::AppConfig;
use crate::db::PgRepo;
use crate::lists::repo::TodoRepo;

/// Everything a handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub todos: Arc<dyn TodoRepo>,
}

impl AppState {
    /// Connects to Postgres and applies the embedded migrations. A failed
    /// migration aborts startup.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let repo = Arc::new(PgRepo::connect(&config).await?);
        let migration = repo.migrate();
        Self::after_migration(config, repo.clone(), migration).await
    }

    /// Builds the state over `repo` once `migration` has succeeded.
    pub(crate) async fn after_migration<R, M>(
        config: AppConfig,
        repo: Arc<R>,
        migration: M,
    ) -> anyhow::Result<Self>
    where
        R: UserRepo + TodoRepo + 'static,
        M: Future<Output = anyhow::Result<()>>,
    {
        migration.await.context("database schema is not up to date")?;
        info!("database schema up to date");
        Ok(Self::from_parts(
            Arc::new(config),
            repo.clone() as Arc<dyn UserRepo>,
            repo as Arc<dyn TodoRepo>,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        todos: Arc<dyn TodoRepo>,
    ) -> Self {
        Self {
            config,
            users,
            todos,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let repo = Arc::new(crate::memory::MemoryRepo::default());
        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            repo.clone() as Arc<dyn UserRepo>,
            repo as Arc<dyn TodoRepo>,
        )
    }
}
