use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use parley_llm::{BackendConfig, DEFAULT_GEMINI_MODEL, RIG_GEMINI_PROVIDER_ID, resolve_model};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "parley";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "PARLEY_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default)]
    pub api_key: String,
    /// Blank means the provider's public endpoint.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub preamble: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            provider_id: default_provider_id(),
            api_key: String::new(),
            endpoint: String::new(),
            model: default_model(),
            preamble: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl ChatSettings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn to_backend_config(&self) -> BackendConfig {
        let mut config = BackendConfig::new(&self.provider_id, &self.api_key, &self.endpoint)
            .with_model(&self.model);
        if let Some(preamble) = &self.preamble {
            config = config.with_preamble(preamble);
        }
        if let Some(temperature) = self.temperature {
            config = config.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        config
    }

    pub fn normalized(mut self) -> Self {
        self.provider_id = if self.provider_id.trim().is_empty() {
            default_provider_id()
        } else {
            self.provider_id.trim().to_string()
        };
        self.api_key = self.api_key.trim().to_string();
        self.endpoint = self.endpoint.trim().to_string();
        self.model = resolve_model(&self.model).id;
        self.preamble = self
            .preamble
            .map(|preamble| preamble.trim().to_string())
            .filter(|preamble| !preamble.is_empty());
        self
    }
}

/// Where settings are read from, lowest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSources {
    FileOnly,
    FileAndEnvironment,
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ChatSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".parley"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf, sources: SettingsSources) -> Self {
        let settings = Self::load_from_sources(&config_path, sources);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(
            Self::default_config_path(),
            SettingsSources::FileAndEnvironment,
        )
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ChatSettings> {
        self.settings.load_full()
    }

    /// Applies `change` to the current settings, writes them, then publishes them.
    ///
    /// Nothing is published when the write fails.
    pub fn update_with(
        &self,
        change: impl FnOnce(&mut ChatSettings),
    ) -> Result<Arc<ChatSettings>, SettingsError> {
        let mut next = ChatSettings::clone(&self.settings.load());
        change(&mut next);
        let next = Arc::new(next.normalized());

        write_settings_file(&self.config_path, &next)?;
        self.settings.store(next.clone());
        tracing::info!(
            path = %self.config_path.display(),
            provider_id = %next.provider_id,
            model = %next.model,
            "settings saved"
        );
        Ok(next)
    }

    fn figment(path: &Path, sources: SettingsSources) -> Figment {
        let figment = Figment::from(Serialized::defaults(ChatSettings::default()))
            .merge(Json::file(path));

        match sources {
            SettingsSources::FileOnly => figment,
            SettingsSources::FileAndEnvironment => figment
                .merge(Env::raw().only(&["api_key"]))
                .merge(
                    Env::raw()
                        .only(&["gemini_api_key"])
                        .map(|_| "api_key".into()),
                )
                .merge(Env::prefixed(ENV_PREFIX)),
        }
    }

    fn load_from_sources(path: &Path, sources: SettingsSources) -> ChatSettings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        match Self::figment(path, sources).extract::<ChatSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                ChatSettings::default()
            }
        }
    }
}

/// Writes next to `path` under a unique name and renames over it, so readers
/// see either the old file or the new one.
fn write_settings_file(path: &Path, settings: &ChatSettings) -> Result<(), SettingsError> {
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory).context(PrepareDirectorySnafu {
        stage: "prepare-settings-directory",
        directory: directory.to_path_buf(),
    })?;

    let mut encoded = serde_json::to_vec_pretty(settings).context(EncodeSettingsSnafu {
        stage: "encode-settings",
    })?;
    encoded.push(b'\n');

    let staging = directory.join(format!(".{SETTINGS_FILE_NAME}.{}", uuid::Uuid::new_v4()));
    std::fs::write(&staging, &encoded).context(StageWriteSnafu {
        stage: "stage-settings-write",
        staging: staging.clone(),
    })?;

    let committed = std::fs::rename(&staging, path);
    if committed.is_err() {
        let _ = std::fs::remove_file(&staging);
    }
    committed.context(CommitSnafu {
        stage: "commit-settings-write",
        target: path.to_path_buf(),
    })
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("cannot create {directory:?} on `{stage}`: {source}"))]
    PrepareDirectory {
        stage: &'static str,
        directory: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("cannot encode settings on `{stage}`: {source}"))]
    EncodeSettings {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("cannot write staging file {staging:?} on `{stage}`: {source}"))]
    StageWrite {
        stage: &'static str,
        staging: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("cannot move settings into {target:?} on `{stage}`: {source}"))]
    Commit {
        stage: &'static str,
        target: PathBuf,
        source: std::io::Error,
    },
}

fn default_provider_id() -> String {
    RIG_GEMINI_PROVIDER_ID.to_string()
}

fn default_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}
