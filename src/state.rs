use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::OnceCell;

use crate::config::Config;
use crate::services::analytics::AnalyticsHandle;
use crate::services::auth::{AuthService, StaticTokenAuth};
use crate::services::completion::CompletionSideChannel;
use crate::services::model::{CannedModel, CompletionModel, HttpCompletionModel};
use crate::services::store::{ChatStore, MemoryStore};
use crate::services::streaming::StreamRegistry;
use crate::services::template::TemplateEngine;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ChatStore>,
    pub model: Arc<dyn CompletionModel>,
    pub auth: Arc<dyn AuthService>,
    pub analytics: AnalyticsHandle,
    pub completion: Arc<CompletionSideChannel>,
    pub templates: Arc<TemplateEngine>,
    // Lazily built on first use; shared by every clone of the state.
    streams: Arc<OnceCell<Arc<StreamRegistry>>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        tracing::info!("[STATE] Initializing AppState...");
        tracing::info!("[STATE]   Environment: {}", config.environment);
        tracing::info!("[STATE]   Model: {}", config.model_name);

        let model: Arc<dyn CompletionModel> = match &config.model_endpoint {
            Some(endpoint) => {
                tracing::info!("[STATE]   Model endpoint: {}", endpoint);
                Arc::new(HttpCompletionModel::new(
                    endpoint.clone(),
                    config.model_api_key.clone(),
                ))
            }
            None => {
                tracing::info!("[STATE]   No MODEL_ENDPOINT set, using canned responses");
                Arc::new(CannedModel::default())
            }
        };

        Self::with_collaborators(
            config,
            Arc::new(MemoryStore::new()),
            model,
            Arc::new(StaticTokenAuth::from_env()),
        )
    }

    /// Wires the state from explicit collaborators. Tests use this to swap
    /// in doubles for the store, model or auth service.
    pub fn with_collaborators(
        config: Config,
        store: Arc<dyn ChatStore>,
        model: Arc<dyn CompletionModel>,
        auth: Arc<dyn AuthService>,
    ) -> Result<Self> {
        let analytics = AnalyticsHandle::spawn(
            config.environment.clone(),
            config.public_origin.clone(),
            config.analytics_buffer,
        );
        let completion = Arc::new(CompletionSideChannel::new(
            store.clone(),
            analytics.clone(),
            config.completion_override.clone(),
        ));
        let templates = Arc::new(TemplateEngine::new()?);

        Ok(Self {
            config: Arc::new(config),
            store,
            model,
            auth,
            analytics,
            completion,
            templates,
            streams: Arc::new(OnceCell::new()),
        })
    }

    /// The process-wide resumable-stream registry, built once on first use.
    pub fn stream_registry(&self) -> Arc<StreamRegistry> {
        self.streams
            .get_or_init(|| Arc::new(StreamRegistry::new()))
            .clone()
    }
}
