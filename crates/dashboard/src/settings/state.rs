use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use skytorch_remote::DEFAULT_CHAT_TITLE;
use snafu::{ResultExt, Snafu};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_BRAND_NAME: &str = "SkyTorch";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_INITIAL_PAGE_SIZE: usize = 8;
pub const DEFAULT_TITLE_MAX_CHARS: usize = 100;
pub const SETTINGS_DIRECTORY_NAME: &str = "skytorch";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "SKYTORCH_";

/// Runtime configuration of the dashboard client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the remote store, e.g. `http://localhost:3000`.
    pub base_url: String,
    /// Anti-forgery token attached to mutating requests.
    pub csrf_token: Option<String>,
    pub poll_interval_secs: u64,
    /// Entries kept from `GET /chats` on a full refresh.
    pub initial_page_size: usize,
    pub title_max_chars: usize,
    pub new_chat_title: String,
    pub brand_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            csrf_token: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            initial_page_size: DEFAULT_INITIAL_PAGE_SIZE,
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
            new_chat_title: DEFAULT_CHAT_TITLE.to_string(),
            brand_name: DEFAULT_BRAND_NAME.to_string(),
        }
    }
}

impl Settings {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".skytorch"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Loads from the default path and the environment, falling back to defaults on error.
    pub fn load() -> Self {
        Self::load_from(&Self::default_config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        let file = if path.exists() {
            Some(path)
        } else {
            tracing::info!("settings file not found at {:?}, using defaults", path);
            None
        };

        match Self::extract(Self::figment(file).merge(Env::prefixed(ENV_PREFIX))) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                Self::default()
            }
        }
    }

    /// Defaults layered under an optional JSON file.
    pub fn figment(file: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        match file {
            Some(path) => figment.merge(Json::file(path)),
            None => figment,
        }
    }

    pub fn extract(figment: Figment) -> Result<Self, SettingsError> {
        let settings = figment.extract::<Self>().context(ExtractSnafu {
            stage: "extract-settings",
        })?;
        Ok(settings.normalized())
    }

    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();

        self.base_url = non_blank(self.base_url, defaults.base_url);
        self.csrf_token = self
            .csrf_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        self.poll_interval_secs = self.poll_interval_secs.max(1);
        self.initial_page_size = self.initial_page_size.max(1);
        self.title_max_chars = self.title_max_chars.max(1);
        self.new_chat_title = non_blank(self.new_chat_title, defaults.new_chat_title);
        self.brand_name = non_blank(self.brand_name, defaults.brand_name);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn non_blank(value: String, fallback: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to extract settings on `{stage}`: {source}"))]
    Extract {
        stage: &'static str,
        #[snafu(source(from(figment::Error, Box::new)))]
        source: Box<figment::Error>,
    },
}
