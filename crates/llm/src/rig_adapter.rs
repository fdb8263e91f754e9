use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rig::OneOrMany;
use rig::completion::message::{
    AssistantContent, DocumentSourceKind, ImageMediaType, UserContent, Video, VideoMediaType,
};
use rig::completion::{CompletionModel, Message as RigMessage};
use rig::prelude::CompletionClient;
use rig::providers::gemini;
use snafu::{ResultExt, ensure};

use super::attachment::{Attachment, MediaKind};
use super::provider::{
    BackendConfig, BackendResult, BoxFuture, ChatBackend, CompletionsFailedSnafu,
    EmptyResponseSnafu, HttpClientSnafu, MissingApiKeySnafu, ReadAttachmentSnafu,
    UnsupportedAttachmentSnafu,
};

pub const RIG_GEMINI_PROVIDER_ID: &str = "gemini";

pub struct GeminiAdapter {
    config: BackendConfig,
}

impl GeminiAdapter {
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "gemini-adapter-new",
                provider_id: config.provider_id.clone(),
            }
        );

        Ok(Self { config })
    }

    fn build_client(config: &BackendConfig) -> BackendResult<gemini::Client> {
        let mut builder = gemini::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-client",
        })
    }

    async fn media_part(attachment: &Attachment) -> BackendResult<UserContent> {
        let bytes = attachment.read().await.context(ReadAttachmentSnafu {
            stage: "read-attachment",
            name: attachment.name().to_string(),
        })?;
        let encoded = STANDARD.encode(&bytes);

        match attachment.kind() {
            Some(MediaKind::Image) => {
                let Some(media_type) = image_media_type(attachment.mime_type()) else {
                    return UnsupportedAttachmentSnafu {
                        stage: "map-image-media-type",
                        mime_type: attachment.mime_type().to_string(),
                    }
                    .fail();
                };
                Ok(UserContent::image_base64(encoded, Some(media_type), None))
            }
            Some(MediaKind::Video) => {
                let Some(media_type) = video_media_type(attachment.mime_type()) else {
                    return UnsupportedAttachmentSnafu {
                        stage: "map-video-media-type",
                        mime_type: attachment.mime_type().to_string(),
                    }
                    .fail();
                };
                Ok(UserContent::Video(Video {
                    data: DocumentSourceKind::Base64(encoded),
                    media_type: Some(media_type),
                    additional_params: None,
                }))
            }
            None => UnsupportedAttachmentSnafu {
                stage: "classify-attachment",
                mime_type: attachment.mime_type().to_string(),
            }
            .fail(),
        }
    }

    async fn build_prompt(
        prompt: &str,
        attachment: Option<&Attachment>,
    ) -> BackendResult<RigMessage> {
        let mut parts = Vec::with_capacity(2);

        // Media goes first so the text part reads as the instruction about it.
        if let Some(attachment) = attachment {
            parts.push(Self::media_part(attachment).await?);
        }
        parts.push(UserContent::text(prompt));

        let content =
            OneOrMany::many(parts).unwrap_or_else(|_| OneOrMany::one(UserContent::text(prompt)));
        Ok(RigMessage::User { content })
    }

    async fn complete(
        &self,
        prompt: &str,
        attachment: Option<&Attachment>,
    ) -> BackendResult<String> {
        let client = Self::build_client(&self.config)?;
        let model = client.completion_model(self.config.model_id.clone());
        let message = Self::build_prompt(prompt, attachment).await?;

        let mut builder = model.completion_request(message);
        if let Some(preamble) = &self.config.preamble {
            builder = builder.preamble(preamble.clone());
        }
        if let Some(temperature) = self.config.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        let response = builder.send().await.context(CompletionsFailedSnafu {
            stage: "send-completion",
        })?;

        let text = response
            .choice
            .iter()
            .filter_map(|content| match content {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        ensure!(
            !text.trim().is_empty(),
            EmptyResponseSnafu {
                stage: "collect-response-text",
            }
        );
        Ok(text)
    }
}

impl ChatBackend for GeminiAdapter {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn name(&self) -> &str {
        "Rig Gemini"
    }

    fn send<'a>(
        &'a self,
        prompt: &'a str,
        attachment: Option<&'a Attachment>,
    ) -> BoxFuture<'a, BackendResult<String>> {
        Box::pin(async move {
            tracing::debug!(
                provider_id = %self.config.provider_id,
                model_id = %self.config.model_id,
                prompt_chars = prompt.chars().count(),
                attachment_mime = attachment.map(Attachment::mime_type),
                "sending completion request"
            );

            let result = self.complete(prompt, attachment).await;
            if let Err(error) = &result {
                tracing::warn!(
                    provider_id = %self.config.provider_id,
                    model_id = %self.config.model_id,
                    stage = error.stage(),
                    error = %error,
                    "completion request failed"
                );
            }
            result
        })
    }
}

/// Image formats the Gemini request conversion accepts.
fn image_media_type(mime_type: &str) -> Option<ImageMediaType> {
    match mime_type {
        "image/png" => Some(ImageMediaType::PNG),
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageMediaType::JPEG),
        "image/webp" => Some(ImageMediaType::WEBP),
        "image/heic" => Some(ImageMediaType::HEIC),
        "image/heif" => Some(ImageMediaType::HEIF),
        _ => None,
    }
}

/// Video formats rig can tag; other containers are refused before the request.
fn video_media_type(mime_type: &str) -> Option<VideoMediaType> {
    match mime_type {
        "video/mp4" => Some(VideoMediaType::MP4),
        "video/mpeg" => Some(VideoMediaType::MPEG),
        "video/x-msvideo" | "video/avi" => Some(VideoMediaType::AVI),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::BackendError;

    #[test]
    fn blank_api_key_fails_construction() {
        let result = GeminiAdapter::new(BackendConfig::new("gemini", "  ", ""));
        assert!(matches!(
            result,
            Err(BackendError::MissingApiKey {
                stage: "gemini-adapter-new",
                ..
            })
        ));
    }

    #[test]
    fn maps_common_media_types() {
        assert!(image_media_type("image/jpeg").is_some());
        assert!(image_media_type("image/tiff").is_none());
        assert!(image_media_type("image/gif").is_none());
        assert!(video_media_type("video/mp4").is_some());
        assert!(video_media_type("video/webm").is_none());
    }

    async fn image_prompt(name: &str, mime_type: &str) -> BackendResult<RigMessage> {
        let photo = Attachment::from_bytes(name, mime_type, vec![0_u8, 1, 2]);
        GeminiAdapter::build_prompt("Describe this image", Some(&photo)).await
    }

    #[tokio::test]
    async fn heic_photo_is_sent_as_image_part() {
        let message = image_prompt("IMG_0001.heic", "image/heic").await.unwrap();
        let RigMessage::User { content } = message else {
            panic!("expected a user message");
        };
        assert_eq!(content.len(), 2);
        assert!(matches!(
            content.first(),
            UserContent::Image(image) if image.media_type == Some(ImageMediaType::HEIC)
        ));
    }

    #[tokio::test]
    async fn heif_photo_is_sent_as_image_part() {
        let message = image_prompt("IMG_0002.heif", "image/heif").await.unwrap();
        let RigMessage::User { content } = message else {
            panic!("expected a user message");
        };
        assert!(matches!(
            content.first(),
            UserContent::Image(image) if image.media_type == Some(ImageMediaType::HEIF)
        ));
    }

    #[tokio::test]
    async fn gif_is_refused_before_the_request() {
        let error = image_prompt("loop.gif", "image/gif").await.err();
        assert!(matches!(
            error,
            Some(BackendError::UnsupportedAttachment {
                stage: "map-image-media-type",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn webm_clip_is_refused_before_the_request() {
        let clip = Attachment::from_bytes("clip.webm", "video/webm", vec![0_u8; 4]);
        let error = GeminiAdapter::build_prompt("What happens here?", Some(&clip))
            .await
            .err();
        assert!(matches!(
            error,
            Some(BackendError::UnsupportedAttachment {
                stage: "map-video-media-type",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn unreadable_attachment_fails_before_any_request() {
        let attachment =
            Attachment::from_path_with_mime("gone.png", "image/png", "/no/such/dir/gone.png");
        let error = GeminiAdapter::build_prompt("describe", Some(&attachment))
            .await
            .err();
        assert!(matches!(error, Some(BackendError::ReadAttachment { .. })));
    }
}
