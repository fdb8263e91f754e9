use std::sync::{Arc, OnceLock};

use super::create_backend;
use super::provider::{BackendConfig, BackendResult, ChatBackend};

static SHARED_BACKEND: OnceLock<Arc<dyn ChatBackend>> = OnceLock::new();

/// Returns the process-wide backend, constructing it on first use.
///
/// A failed construction leaves the slot empty, so a later call with a
/// corrected configuration can still succeed. Once set, `config` is ignored.
pub fn shared_backend(config: BackendConfig) -> BackendResult<Arc<dyn ChatBackend>> {
    if let Some(backend) = SHARED_BACKEND.get() {
        return Ok(backend.clone());
    }

    let backend = create_backend(config)?;
    tracing::info!(
        provider_id = %backend.id(),
        provider_name = %backend.name(),
        "initialized shared chat backend"
    );
    Ok(SHARED_BACKEND.get_or_init(|| backend).clone())
}

pub fn shared_backend_if_initialized() -> Option<Arc<dyn ChatBackend>> {
    SHARED_BACKEND.get().cloned()
}
