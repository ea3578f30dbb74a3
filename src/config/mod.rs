//! Builds an `AppConfig` from the layered config files and the process environment.
//! Gets initialized with `OnceLock` so it only needs to get initialized once.

mod error;
mod types;

use std::{path::Path, sync::OnceLock};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use tracing::info;

// Re-export config structs
pub use error::{ConfigError, ConfigResult};
pub use types::{AppConfig, DbConfig, Environment, NetConfig, SheetsConfig, SslRequire};

/// Flat variables that map straight onto `sheets_config`.
const GOOGLE_ENV_KEYS: [(&str, &str); 3] = [
    ("GOOGLE_SHEET_ID", "sheets_config.spreadsheet_id"),
    (
        "GOOGLE_SERVICE_ACCOUNT_JSON",
        "sheets_config.service_account_json",
    ),
    (
        "GOOGLE_SERVICE_ACCOUNT_FILE",
        "sheets_config.service_account_file",
    ),
];

/// Allocates a static `OnceLock` containing `AppConfig`.
/// This ensures configuration only gets initialized the first time we call this function.
/// Every other caller gets a &'static ref to AppConfig.
/// Panics if anything goes wrong.
pub fn get_or_init_config() -> &'static AppConfig {
    static CONFIG_INIT: OnceLock<AppConfig> = OnceLock::new();
    CONFIG_INIT.get_or_init(|| {
        info!("{:<20} - Initializing the configuration", "get_or_init_config");
        let base_path = std::env::current_dir().expect("Failed to determine the current DIR.");
        let config_dir = base_path.join("config");

        let environment: Environment = std::env::var("APP_ENVIRONMENT")
            .unwrap_or_else(|_| "local".into())
            .try_into()
            .expect("Failed to parse APP_ENVIRONMENT.");

        AppConfig::load(&config_dir, &environment)
            .unwrap_or_else(|er| panic!("Fatal Error: Building config: {er}"))
    })
}

impl AppConfig {
    /// Layers `base.toml`, `{environment}.toml`, `APP_` prefixed variables and the flat
    /// `GOOGLE_*` variables, in that order.
    pub fn load(config_dir: &Path, environment: &Environment) -> ConfigResult<Self> {
        let environment_filename = format!("{}.toml", environment.as_ref().to_lowercase());

        let mut config: AppConfig = Figment::new()
            .merge(Toml::file(config_dir.join("base.toml")))
            .merge(Toml::file(config_dir.join(environment_filename)))
            .merge(Env::prefixed("APP_").split("__"))
            .merge(google_env())
            .extract()?;

        // Setup DbConfig for production
        if matches!(environment, Environment::Production) {
            if let Ok(production_db) = std::env::var("DATABASE_URL") {
                config.db_config = DbConfig::try_from(production_db.as_str())?;
            }
        }

        Ok(config)
    }
}

fn google_env() -> Env {
    let keys = GOOGLE_ENV_KEYS.map(|(var, _)| var);
    Env::raw().only(&keys).map(|key| {
        GOOGLE_ENV_KEYS
            .iter()
            .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
            .map(|(_, path)| (*path).into())
            .unwrap_or_else(|| key.as_str().into())
    })
}
