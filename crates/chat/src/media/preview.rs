use std::collections::HashMap;

use parking_lot::Mutex;
use parley_llm::Attachment;
use uuid::Uuid;

const PREVIEW_SCHEME: &str = "blob:parley/";

/// Revocable local reference used to render an attachment preview.
///
/// Deliberately not `Clone`: whoever holds the value owns the reference and is
/// the only one able to hand it back to [`PreviewRegistry::release`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct PreviewRef {
    id: Uuid,
    url: String,
}

impl PreviewRef {
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone)]
struct PreviewEntry {
    name: String,
    mime_type: String,
}

#[derive(Debug, Default)]
struct RegistryState {
    live: HashMap<Uuid, PreviewEntry>,
    acquired: u64,
    released: u64,
}

/// Creates and revokes preview references and tracks which ones are alive.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    state: Mutex<RegistryState>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, attachment: &Attachment) -> PreviewRef {
        let id = Uuid::new_v4();
        let url = format!("{PREVIEW_SCHEME}{id}");

        let mut state = self.state.lock();
        state.live.insert(
            id,
            PreviewEntry {
                name: attachment.name().to_string(),
                mime_type: attachment.mime_type().to_string(),
            },
        );
        state.acquired += 1;

        tracing::debug!(
            preview = %url,
            name = %attachment.name(),
            mime_type = %attachment.mime_type(),
            live = state.live.len(),
            "acquired attachment preview"
        );

        PreviewRef { id, url }
    }

    /// Revokes `preview`. Returns `false` if this registry never issued it.
    pub fn release(&self, preview: PreviewRef) -> bool {
        let mut state = self.state.lock();
        let Some(entry) = state.live.remove(&preview.id) else {
            tracing::warn!(preview = %preview.url, "released a preview this registry does not own");
            return false;
        };
        state.released += 1;

        tracing::debug!(
            preview = %preview.url,
            name = %entry.name,
            live = state.live.len(),
            "released attachment preview"
        );
        true
    }

    pub fn is_live(&self, url: &str) -> bool {
        let Some(raw) = url.strip_prefix(PREVIEW_SCHEME) else {
            return false;
        };
        let Ok(id) = Uuid::parse_str(raw) else {
            return false;
        };
        self.state.lock().live.contains_key(&id)
    }

    pub fn mime_type_of(&self, preview: &PreviewRef) -> Option<String> {
        self.state
            .lock()
            .live
            .get(&preview.id)
            .map(|entry| entry.mime_type.clone())
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn acquired_total(&self) -> u64 {
        self.state.lock().acquired
    }

    pub fn released_total(&self) -> u64 {
        self.state.lock().released
    }
}

impl Drop for PreviewRegistry {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.live.is_empty() {
            tracing::warn!(
                leaked = state.live.len(),
                acquired = state.acquired,
                released = state.released,
                "preview registry dropped with live references"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo() -> Attachment {
        Attachment::from_bytes("cat.jpg", "image/jpeg", vec![0xFF_u8, 0xD8])
    }

    #[test]
    fn acquire_and_release_are_paired() {
        let registry = PreviewRegistry::new();
        let preview = registry.acquire(&photo());
        let url = preview.url().to_string();

        assert!(url.starts_with(PREVIEW_SCHEME));
        assert!(registry.is_live(&url));
        assert_eq!(registry.mime_type_of(&preview).as_deref(), Some("image/jpeg"));

        assert!(registry.release(preview));
        assert!(!registry.is_live(&url));
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.acquired_total(), 1);
        assert_eq!(registry.released_total(), 1);
    }

    #[test]
    fn foreign_reference_is_not_counted_as_released() {
        let issuer = PreviewRegistry::new();
        let other = PreviewRegistry::new();
        let preview = issuer.acquire(&photo());
        let url = preview.url().to_string();

        assert!(!other.release(preview));
        assert_eq!(other.released_total(), 0);
        // The issuer still considers it alive; ownership moved away with the value.
        assert!(issuer.is_live(&url));
    }

    #[test]
    fn unrelated_urls_are_never_live() {
        let registry = PreviewRegistry::new();
        assert!(!registry.is_live("https://example.com/cat.jpg"));
        assert!(!registry.is_live("blob:parley/not-a-uuid"));
    }
}
