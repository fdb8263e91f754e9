use std::future::Future;
use std::pin::Pin;

use snafu::Snafu;

use super::attachment::Attachment;
use super::model::DEFAULT_GEMINI_MODEL;

pub const GENERIC_FAILURE_TEXT: &str = "An unexpected error occurred.";

#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub provider_id: String,
    pub api_key: String,
    pub endpoint: String,
    pub model_id: String,
    pub preamble: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl BackendConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            endpoint: endpoint.into().trim().to_string(),
            model_id: DEFAULT_GEMINI_MODEL.to_string(),
            preamble: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        let model_id = model_id.into().trim().to_string();
        if !model_id.is_empty() {
            self.model_id = model_id;
        }
        self
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        let preamble = preamble.into();
        self.preamble = (!preamble.trim().is_empty()).then_some(preamble);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display(
        "API key for provider '{provider_id}' is not set. Please configure it in your environment."
    ))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("provider '{provider_id}' is not supported"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("attachment type '{mime_type}' cannot be sent to the model"))]
    UnsupportedAttachment {
        stage: &'static str,
        mime_type: String,
    },
    #[snafu(display("failed to read attachment '{name}': {source}"))]
    ReadAttachment {
        stage: &'static str,
        name: String,
        source: std::io::Error,
    },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completions failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
    #[snafu(display("the model returned no text"))]
    EmptyResponse { stage: &'static str },
    /// Failure raised by a backend outside this crate; `description` may be blank.
    #[snafu(display("{description}"))]
    Remote {
        stage: &'static str,
        description: String,
    },
}

impl BackendError {
    pub fn remote(description: impl Into<String>) -> Self {
        Self::Remote {
            stage: "remote",
            description: description.into(),
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::MissingApiKey { stage, .. }
            | Self::UnsupportedProvider { stage, .. }
            | Self::UnsupportedAttachment { stage, .. }
            | Self::ReadAttachment { stage, .. }
            | Self::HttpClient { stage, .. }
            | Self::CompletionsFailed { stage, .. }
            | Self::EmptyResponse { stage }
            | Self::Remote { stage, .. } => stage,
        }
    }
}

/// Renderable description of a failed call; blank descriptions get a generic text.
pub fn describe_failure(error: &BackendError) -> String {
    let description = error.to_string();
    if description.trim().is_empty() {
        GENERIC_FAILURE_TEXT.to_string()
    } else {
        description
    }
}

/// One request/response exchange with a generative model.
///
/// Implementations never retry and never stream partial output.
pub trait ChatBackend: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn send<'a>(
        &'a self,
        prompt: &'a str,
        attachment: Option<&'a Attachment>,
    ) -> BoxFuture<'a, BackendResult<String>>;
}
