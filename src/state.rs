use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::content::{ContentRepository, SqliteContentRepository};
use crate::engagement::{EngagementRepository, SqliteEngagementRepository};
use crate::scrape::MetadataFetcher;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub content: Arc<dyn ContentRepository>,
    pub engagement: Arc<dyn EngagementRepository>,
    pub fetcher: Arc<dyn MetadataFetcher>,
}

impl AppState {
    /// Wire the SQLite repositories over `db`.
    pub fn new(db: DbPool, config: Config, fetcher: Arc<dyn MetadataFetcher>) -> Self {
        Self {
            content: Arc::new(SqliteContentRepository::new(
                db.clone(),
                config.feed.clone(),
            )),
            engagement: Arc::new(SqliteEngagementRepository::new(db.clone())),
            db,
            config,
            fetcher,
        }
    }
}
