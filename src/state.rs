// src/state.rs

use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    config::Config,
    services::digest::{
        dispatcher::DigestDispatcher,
        notifier::{self, Notifier, NotifyError},
    },
    store::PgStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: PgStore,
    pub config: Config,
    pub dispatcher: DigestDispatcher,
}

impl AppState {
    /// Wires the store, metrics source and the configured notifier together.
    pub fn new(pool: PgPool, config: Config) -> Result<Self, NotifyError> {
        let notifier = notifier::from_config(&config.email)?;
        Ok(Self::with_notifier(pool, config, notifier))
    }

    pub fn with_notifier(pool: PgPool, config: Config, notifier: Arc<dyn Notifier>) -> Self {
        let store = PgStore::new(pool);
        let dispatcher = DigestDispatcher::new(Arc::new(store.clone()), notifier);
        Self {
            store,
            config,
            dispatcher,
        }
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.config.dispatch_timeout_secs)
    }
}

impl FromRef<AppState> for PgStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for DigestDispatcher {
    fn from_ref(state: &AppState) -> Self {
        state.dispatcher.clone()
    }
}
