//! The configuration structs used to build the AppConfig, and their impls.
use std::{path::PathBuf, time::Duration};

use lazy_regex::regex_captures;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::{
    postgres::{PgConnectOptions, PgSslMode},
    ConnectOptions,
};
use strum_macros::AsRefStr;

use crate::config::ConfigError;

// ###################################
// ->   STRUCTS
// ###################################
#[derive(AsRefStr, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AppConfig {
    pub net_config: NetConfig,
    pub db_config: DbConfig,
    pub sheets_config: SheetsConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct NetConfig {
    pub host: [u8; 4],
    pub app_port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DbConfig {
    pub username: String,
    pub password: SecretString,
    pub port: u16,
    pub host: String,
    pub db_name: String,
    pub require_ssl: SslRequire,
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SslRequire {
    #[default]
    Prefer,
    Require,
    Disable,
}

/// Where the signup sheet lives and how to authenticate against it.
///
/// The identifier and credentials are optional here on purpose: the server starts without
/// them and the signup sink reports the missing values when it first initializes.
#[derive(Deserialize, Clone, Debug)]
pub struct SheetsConfig {
    pub spreadsheet_id: Option<String>,
    /// Inline service account key (the JSON document Google hands out).
    pub service_account_json: Option<SecretString>,
    /// Path to a service account key file. Ignored when `service_account_json` is set.
    pub service_account_file: Option<PathBuf>,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    pub api_base_url: String,
    pub timeout_millis: u64,
}

fn default_sheet_name() -> String {
    "Signups".to_string()
}

// ###################################
// ->   IMPLs
// ###################################
impl SheetsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }
}

impl DbConfig {
    pub fn connection_options(&self) -> PgConnectOptions {
        self.connection_options_without_db().database(&self.db_name)
    }
    pub fn connection_options_without_db(&self) -> PgConnectOptions {
        // Create new PgConnectOptions struct but don't try to use the '$HOME/.pgpass' file.
        PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(self.require_ssl.into())
            .log_statements(tracing::log::LevelFilter::Trace)
    }
}

impl From<SslRequire> for PgSslMode {
    fn from(value: SslRequire) -> Self {
        match value {
            SslRequire::Require => PgSslMode::Require,
            SslRequire::Disable => PgSslMode::Disable,
            SslRequire::Prefer => PgSslMode::Prefer,
        }
    }
}

// ###################################
// ->   TRY FROMs
// ###################################

impl TryFrom<String> for Environment {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            _ => Err(Self::Error::StringToEnvironmentFail(value)),
        }
    }
}

impl TryFrom<&str> for DbConfig {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // postgres://{username}:{password}@{hostname}:{port}/{database}?{options}
        let (_whole, username, password, host, port, db_name, options) = regex_captures!(
            r#"^postgres(?:ql)?:\/\/([^:]+):([^@]+)@([^:\/]+):(\d+)\/([^\s\/?]+)(\?[^\s]*)?$"#,
            value
        )
        .ok_or(Self::Error::StringToDbConfigFail)?;

        let (username, db_name, host) =
            (username.to_string(), db_name.to_string(), host.to_string());
        let password = SecretString::from(password.to_string());
        let port = port
            .parse()
            .map_err(|_| Self::Error::StringToDbConfigFail)?;

        let mut require_ssl = SslRequire::default();
        if let Some(options) = options.strip_prefix('?') {
            for option in options.split('&') {
                if let Some(("sslmode", val)) = option.split_once('=') {
                    match val {
                        "disable" => require_ssl = SslRequire::Disable,
                        "require" => require_ssl = SslRequire::Require,
                        _ => {}
                    }
                }
            }
        }

        Ok(DbConfig {
            username,
            password,
            port,
            host,
            db_name,
            require_ssl,
        })
    }
}

// ###################################
// ->   TESTS
// ###################################
