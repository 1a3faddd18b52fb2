use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::auth::repo::{MemoryUserStore, PgUserStore, UserStore};
use crate::avatar::{AvatarSource, HttpAvatarSource};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub avatars: Arc<dyn AvatarSource>,
}

impl AppState {
    /// Connects to Postgres and builds the real avatar client.
    /// Returns the pool too so `main` can run migrations on it.
    pub async fn init(config: AppConfig) -> anyhow::Result<(Self, PgPool)> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let avatars = Arc::new(HttpAvatarSource::new(&config.avatar)?) as Arc<dyn AvatarSource>;
        let users = Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>;

        Ok((Self::from_parts(Arc::new(config), users, avatars), db))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        avatars: Arc<dyn AvatarSource>,
    ) -> Self {
        Self {
            config,
            users,
            avatars,
        }
    }

    /// In-memory state with a fixed avatar, for tests.
    pub fn fake() -> Self {
        #[derive(Clone)]
        struct FakeAvatars;
        #[async_trait]
        impl AvatarSource for FakeAvatars {
            async fn fetch(&self) -> anyhow::Result<String> {
                Ok("https://fake.local/avatar.png".into())
            }
        }

        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            Arc::new(MemoryUserStore::new()),
            Arc::new(FakeAvatars),
        )
    }
}
