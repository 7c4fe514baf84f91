use crate::auth::TokenKeys;
use crate::config::Config;
use crate::db::DbPool;
use crate::ids::SharedIdGenerator;
use crate::storage::LocalStorage;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub storage: LocalStorage,
    pub id_gen: Arc<SharedIdGenerator>,
    pub tokens: TokenKeys,
    pub config: Config,
}

impl AppState {
    pub fn new(
        db_pool: DbPool,
        storage: LocalStorage,
        id_gen: SharedIdGenerator,
        config: Config,
    ) -> Self {
        let tokens = TokenKeys::new(config.secret_key.as_bytes(), config.token_ttl_secs);
        Self {
            db_pool,
            storage,
            id_gen: Arc::new(id_gen),
            tokens,
            config,
        }
    }
}
