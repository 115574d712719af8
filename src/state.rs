use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        repo::{MemoryUserRepo, PgUserRepo, UserRepo},
    },
    config::AppConfig,
    db,
    disasters::{
        memory::MemoryDisasterStore,
        repo::{DisasterStore, PgDisasterStore},
    },
    ingest::{
        feed::{FeedSource, HttpFeed, StaticFeed},
        normalizer::Normalizer,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub disasters: Arc<dyn DisasterStore>,
    pub users: Arc<dyn UserRepo>,
    pub feed: Arc<dyn FeedSource>,
    pub normalizer: Normalizer,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        Self::from_config(AppConfig::from_env()?).await
    }

    /// Postgres when `database_url` is set, in-memory stores otherwise.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let (disasters, users): (Arc<dyn DisasterStore>, Arc<dyn UserRepo>) =
            match &config.database_url {
                Some(url) => {
                    let pool = db::connect(url).await?;
                    db::migrate(&pool).await;
                    (
                        Arc::new(PgDisasterStore::new(pool.clone())),
                        Arc::new(PgUserRepo::new(pool)),
                    )
                }
                None => {
                    warn!("DATABASE_URL is not set; data lives in memory until shutdown");
                    (
                        Arc::new(MemoryDisasterStore::new()),
                        Arc::new(MemoryUserRepo::new()),
                    )
                }
            };

        let feed: Arc<dyn FeedSource> = match &config.feed.file {
            Some(path) => {
                let doc = std::fs::read_to_string(path)
                    .with_context(|| format!("read FEED_FILE {path}"))?;
                info!(%path, "serving feed from a local file");
                Arc::new(StaticFeed(doc))
            }
            None => Arc::new(HttpFeed::new(&config.feed)?),
        };
        Ok(Self {
            jwt: JwtKeys::new(&config.jwt),
            disasters,
            users,
            feed,
            normalizer: Normalizer::new(config.feed.name.clone()),
            config,
        })
    }

    /// In-memory stores and a one-item static feed.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::ingest::feed::tests::ONE_ITEM_FEED;

        let config = Arc::new(tests::config());
        Self {
            jwt: JwtKeys::new(&config.jwt),
            disasters: Arc::new(MemoryDisasterStore::new()),
            users: Arc::new(MemoryUserRepo::new()),
            feed: Arc::new(StaticFeed(ONE_ITEM_FEED.into())),
            normalizer: Normalizer::new(config.feed.name.clone()),
            config,
        }
    }
}
