use std::env;
use std::env::current_dir;
use std::fmt::Display;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

/// Global configuration, loaded from `configuration/*.yaml`. See
/// `get_configuration`.
#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub backend: BackendSettings,
    pub waitlist: WaitlistSettings,
}

/// Where the waitlist backend lives, and how long to wait for it
#[derive(Deserialize, Clone, Debug)]
pub struct BackendSettings {
    /// Usually supplied through `APP_BACKEND__BASE_URL`. When unset (or
    /// empty), requests go to `origin`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// The origin the site itself is served from
    pub origin: String,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub submit_timeout_milliseconds: u64,

    /// Applies to count and health requests
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub fetch_timeout_milliseconds: u64,
}

impl BackendSettings {
    /// Base url without a trailing slash
    pub fn url(&self) -> &str {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.origin)
            .trim_end_matches('/')
    }

    pub fn endpoint(
        &self,
        path: &str,
    ) -> String {
        format!("{}{path}", self.url())
    }

    pub fn submit_timeout(&self) -> Duration { Duration::from_millis(self.submit_timeout_milliseconds) }

    pub fn fetch_timeout(&self) -> Duration { Duration::from_millis(self.fetch_timeout_milliseconds) }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            origin: "http://localhost:3000".to_string(),
            submit_timeout_milliseconds: 15_000,
            fetch_timeout_milliseconds: 10_000,
        }
    }
}

/// Behaviour of the signup form and the subscriber counter
#[derive(Deserialize, Clone, Debug)]
pub struct WaitlistSettings {
    /// Sent as `name` with every signup; the form only asks for an email
    pub display_name: String,

    /// Shown until the first successful count fetch
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub initial_count: u64,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub poll_interval_milliseconds: u64,

    /// Delay of the one-off count fetch after a successful signup
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub reconcile_delay_milliseconds: u64,
}

impl WaitlistSettings {
    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_milliseconds) }

    pub fn reconcile_delay(&self) -> Duration { Duration::from_millis(self.reconcile_delay_milliseconds) }
}

impl Default for WaitlistSettings {
    fn default() -> Self {
        Self {
            display_name: "Website Subscriber".to_string(),
            initial_count: 0,
            poll_interval_milliseconds: 10_000,
            reconcile_delay_milliseconds: 1_000,
        }
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Display for Environment {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Environment::Local => "local",
                Environment::Production => "production",
            }
        )
    }
}

impl TryFrom<String> for Environment {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            e => Err(format!("Invalid environment: {e}")),
        }
    }
}

/// Load yaml configuration files at `<project_root>/configuration`:
/// `base.yaml`, then `{APP_ENVIRONMENT}.yaml` (`local` by default), then any
/// `APP_*` env vars.
///
/// All fields must be present after layering, otherwise initialisation fails
/// immediately.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let cfg_dir = current_dir()
        .map_err(|e| ConfigError::Foreign(Box::new(e)))?
        .join("configuration");

    let env: Environment = env::var("APP_ENVIRONMENT")
        .unwrap_or("local".to_string())
        .try_into()
        .map_err(ConfigError::Message)?;

    tracing::info!("loading config for {env} env");

    let settings = Config::builder()
        .add_source(config::File::from(cfg_dir.join("base.yaml")))
        .add_source(config::File::from(cfg_dir.join(format!("{env}.yaml"))))
        .add_source(
            // env vars are -always- parsed as String, hence `serde-aux` on the
            // numeric fields.
            //
            // `APP_BACKEND__BASE_URL=https://api.example.com` -> `Settings.backend.base_url`
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
