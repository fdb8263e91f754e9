use std::sync::Arc;

mod attachment;
mod model;
mod provider;
mod rig_adapter;
mod shared;

pub use attachment::{Attachment, MediaKind, OCTET_STREAM};
pub use model::{DEFAULT_GEMINI_MODEL, Model, default_gemini_models, resolve_model};
pub use provider::{
    BackendConfig, BackendError, BackendResult, BoxFuture, ChatBackend, GENERIC_FAILURE_TEXT,
    describe_failure,
};
pub use rig_adapter::{GeminiAdapter, RIG_GEMINI_PROVIDER_ID};
pub use shared::{shared_backend, shared_backend_if_initialized};

pub fn create_backend(mut config: BackendConfig) -> BackendResult<Arc<dyn ChatBackend>> {
    if config.provider_id.trim().is_empty() {
        config.provider_id = RIG_GEMINI_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        "gemini" | "google" | "rig-gemini" => {
            config.provider_id = RIG_GEMINI_PROVIDER_ID.to_string();
            Ok(Arc::new(GeminiAdapter::new(config)?))
        }
        _ => Err(BackendError::UnsupportedProvider {
            stage: "create-backend",
            provider_id: config.provider_id,
        }),
    }
}
