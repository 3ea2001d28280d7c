//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::ApplicationStore;
use crate::services::{Assistant, AuthService, Notifier};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the application store and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    store: Arc<dyn ApplicationStore>,
    auth: AuthService,
    notifier: Notifier,
    assistant: Assistant,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The store is injected rather than built here so tests can substitute
    /// an in-memory implementation.
    #[must_use]
    pub fn new(config: AppConfig, store: Arc<dyn ApplicationStore>) -> Self {
        let auth = AuthService::new(config.auth.clone());
        let notifier = Notifier::new(config.email.clone());
        let assistant = Assistant::new(config.assistant.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                auth,
                notifier,
                assistant,
            }),
        }
    }

    /// Get a reference to the application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the application store.
    #[must_use]
    pub fn store(&self) -> &dyn ApplicationStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the authentication service.
    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    /// Get a reference to the notification dispatcher.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// Get a reference to the chat assistant client.
    #[must_use]
    pub fn assistant(&self) -> &Assistant {
        &self.inner.assistant
    }
}
