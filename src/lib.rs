use std::sync::Arc;

pub mod bot;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod storage;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;
#[cfg(test)]
mod tests;

use bot::api::BotApi;
use config::Config;
use db::Database;
use error::AppError;
use services::resolver::RetrievalResolver;
use storage::object::ObjectBackend;
use storage::relay::RelayBackend;
use storage::router::StorageRouter;

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub bot: Arc<BotApi>,
    pub storage: Arc<StorageRouter>,
    pub resolver: RetrievalResolver,
}

/// Wire the backends, router, and resolver around an already-migrated
/// database. Configuration problems (an unusable bucket binding) surface
/// here, before the server starts accepting requests.
pub fn build_state(config: Config, db: Database) -> Result<Arc<AppState>, AppError> {
    let bot = Arc::new(BotApi::new(&config.bot_token, &config.bot_api_root));

    let object = match &config.object_storage {
        Some(object_config) => Some(Arc::new(ObjectBackend::new(object_config)?)),
        None => None,
    };
    let relay = Arc::new(RelayBackend::new(bot.clone(), config.storage_chat_id));

    let storage = Arc::new(StorageRouter::new(
        object,
        relay,
        &config.public_base_url,
        config.default_storage,
    ));
    let resolver = RetrievalResolver::new(db.clone(), storage.clone());

    Ok(Arc::new(AppState {
        config,
        db,
        bot,
        storage,
        resolver,
    }))
}
