use config::ConfigError;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub rotation: RotationSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub session_store: SessionStoreKind,
}

/// Which session store backs the rotation endpoint
#[derive(serde::Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    #[default]
    Memory,
    Postgres,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token rotation settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct RotationSettings {
    #[serde(default = "default_token_bytes")]
    pub token_bytes: usize,
    /// Advertised in `expires_in_ms` when set. Expiry itself is enforced elsewhere.
    #[serde(default)]
    pub access_token_lifetime_ms: Option<i64>,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl RotationSettings {
    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            token_bytes: default_token_bytes(),
            access_token_lifetime_ms: None,
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_token_bytes() -> usize {
    32
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

/// Load settings from `configuration.{yaml,toml,json}` (optional) and `APP_*` variables.
///
/// Nested keys use a double underscore, e.g. `APP_APPLICATION__PORT=8080`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
