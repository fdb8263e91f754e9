pub mod state;

pub use state::{ChatSettings, SettingsError, SettingsSources, SettingsStore};
