use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Media category accepted as a chat attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classifies a MIME type by its top-level prefix.
    pub fn classify(mime_type: &str) -> Option<Self> {
        let mime_type = mime_type.trim().to_ascii_lowercase();
        if mime_type.starts_with("image/") {
            Some(Self::Image)
        } else if mime_type.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttachmentSource {
    Memory(Arc<[u8]>),
    Path(PathBuf),
}

/// Raw binary picked by the user.
///
/// Path-backed attachments are read lazily, so a file that disappears after
/// selection only fails once somebody actually reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    name: String,
    mime_type: String,
    source: AttachmentSource,
}

impl Attachment {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: normalize_mime(mime_type.into()),
            source: AttachmentSource::Memory(bytes.into()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self::from_path_with_mime(name, mime_type, path)
    }

    pub fn from_path_with_mime(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: normalize_mime(mime_type.into()),
            source: AttachmentSource::Path(path.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::classify(&self.mime_type)
    }

    pub async fn read(&self) -> io::Result<Arc<[u8]>> {
        match &self.source {
            AttachmentSource::Memory(bytes) => Ok(bytes.clone()),
            AttachmentSource::Path(path) => Ok(tokio::fs::read(path).await?.into()),
        }
    }
}

fn normalize_mime(mime_type: String) -> String {
    let trimmed = mime_type.trim();
    if trimmed.is_empty() {
        OCTET_STREAM.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_matches_prefix_only() {
        assert_eq!(MediaKind::classify("image/jpeg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::classify("Video/MP4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::classify("application/pdf"), None);
        assert_eq!(MediaKind::classify("imagex/png"), None);
        assert_eq!(MediaKind::classify(""), None);
    }

    #[test]
    fn from_path_guesses_mime_from_extension() {
        let photo = Attachment::from_path("/tmp/holiday/beach.JPG");
        assert_eq!(photo.name(), "beach.JPG");
        assert_eq!(photo.mime_type(), "image/jpeg");
        assert_eq!(photo.kind(), Some(MediaKind::Image));

        let unknown = Attachment::from_path("/tmp/notes.parley-unknown");
        assert_eq!(unknown.mime_type(), OCTET_STREAM);
        assert_eq!(unknown.kind(), None);
    }

    #[tokio::test]
    async fn reading_missing_path_fails_lazily() {
        let attachment = Attachment::from_path_with_mime(
            "gone.png",
            "image/png",
            "/definitely/not/here/gone.png",
        );
        assert_eq!(attachment.kind(), Some(MediaKind::Image));
        assert!(attachment.read().await.is_err());
    }

    #[tokio::test]
    async fn memory_attachment_reads_back_bytes() {
        let attachment = Attachment::from_bytes("a.png", " IMAGE/PNG ", vec![1_u8, 2, 3]);
        assert_eq!(attachment.mime_type(), "image/png");
        assert_eq!(&*attachment.read().await.unwrap(), &[1, 2, 3]);
    }
}
