//! The signup sink: records validated signups as rows of a Google Sheet.
//!
//! The sink owns a lazily built `SheetsClient`. The first operation that needs the client
//! builds it; concurrent first callers wait on the same initialization instead of racing.
//! A failed initialization is not cached, so the next call tries again.

mod auth;
mod client;
mod error;

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::ExposeSecret;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::{config::SheetsConfig, web::types::NormalizedEmail};

// re-export
pub use auth::{CredentialSource, ServiceAccountKey, TokenProvider, SPREADSHEETS_SCOPE};
pub use client::SheetsClient;
pub use error::{SinkError, SinkResult, UpstreamError};

/// The labels that must occupy the first row of the signup sheet.
pub const HEADER_ROW: [&str; 3] = ["Email", "Timestamp", "Source"];
/// Identifies the form every signup comes from.
pub const SIGNUP_SOURCE: &str = "P.A.R. Landing Page";

// ###################################
// ->   STRUCTS
// ###################################
/// One row of the signup sheet.
#[derive(Debug, Clone)]
pub struct SignupRecord {
    email: NormalizedEmail,
    timestamp: String,
    source: &'static str,
}

impl SignupRecord {
    pub fn new(email: NormalizedEmail) -> Self {
        Self::at(email, Utc::now())
    }

    pub fn at(email: NormalizedEmail, at: DateTime<Utc>) -> Self {
        Self {
            email,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Micros, true),
            source: SIGNUP_SOURCE,
        }
    }

    pub fn email(&self) -> &NormalizedEmail {
        &self.email
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn source(&self) -> &str {
        self.source
    }

    /// The row as it is written to the sheet: email, timestamp, source.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.email.as_ref().to_string(),
            self.timestamp.clone(),
            self.source.to_string(),
        ]
    }
}

/// The resolved, non optional part of `SheetsConfig` the sink needs to build its client.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub spreadsheet_id: String,
    pub credentials: CredentialSource,
}

impl TryFrom<&SheetsConfig> for SinkConfig {
    type Error = SinkError;

    fn try_from(config: &SheetsConfig) -> Result<Self, Self::Error> {
        let spreadsheet_id = config
            .spreadsheet_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SinkError::Config("missing spreadsheet id".to_string()))?
            .to_string();

        let inline = config
            .service_account_json
            .as_ref()
            .filter(|json| !json.expose_secret().trim().is_empty());
        let credentials = match (inline, &config.service_account_file) {
            (Some(json), _) => CredentialSource::Inline(json.clone()),
            (None, Some(path)) => CredentialSource::File(path.clone()),
            (None, None) => {
                return Err(SinkError::Config(
                    "missing service account credentials".to_string(),
                ))
            }
        };

        Ok(Self {
            spreadsheet_id,
            credentials,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SinkState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl From<u8> for SinkState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Initializing,
            2 => Self::Ready,
            3 => Self::Failed,
            _ => Self::Uninitialized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStatus {
    AlreadyPresent,
    Written,
}

#[derive(Debug)]
pub struct SignupSink {
    config: SheetsConfig,
    client: OnceCell<SheetsClient>,
    state: AtomicU8,
    init_attempts: AtomicUsize,
}

// ###################################
// ->   IMPLs
// ###################################
impl SignupSink {
    pub fn new(config: SheetsConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
            state: AtomicU8::new(SinkState::Uninitialized as u8),
            init_attempts: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> SinkState {
        self.state.load(Ordering::Acquire).into()
    }

    /// How many times the sink tried to build its client.
    pub fn init_attempts(&self) -> usize {
        self.init_attempts.load(Ordering::Acquire)
    }

    /// Appends the record as a new row, returning the failure instead of swallowing it.
    #[tracing::instrument(name = "Appending signup", skip_all, fields(email = %record.email()))]
    pub async fn try_append_signup(&self, record: &SignupRecord) -> SinkResult<()> {
        let client = self.client().await?;
        client
            .append_values(&self.append_range(), &[record.to_row()])
            .await?;

        info!("Successfully added signup");
        Ok(())
    }

    /// Appends the record as a new row. Every failure is logged and reported as `false`.
    pub async fn append_signup(&self, record: &SignupRecord) -> bool {
        match self.try_append_signup(record).await {
            Ok(()) => true,
            Err(SinkError::Upstream(er)) => {
                error!(error = %er, "Google Sheets API error");
                false
            }
            Err(er) => {
                error!(error = %er, "Failed to add signup");
                false
            }
        }
    }

    /// Makes sure the first row of the sheet holds `HEADER_ROW`, writing it only when it
    /// is missing or different.
    #[tracing::instrument(name = "Ensuring sheet headers", skip_all)]
    pub async fn ensure_headers(&self) -> SinkResult<HeaderStatus> {
        let client = self.client().await?;
        let range = self.header_range();

        let rows = client.get_values(&range).await?;
        let present = rows
            .first()
            .is_some_and(|row| row.iter().map(String::as_str).eq(HEADER_ROW));
        if present {
            info!("Sheet headers already exist");
            return Ok(HeaderStatus::AlreadyPresent);
        }

        let header = HEADER_ROW.map(String::from).to_vec();
        client.update_values(&range, &[header]).await?;

        info!("Sheet headers set up successfully");
        Ok(HeaderStatus::Written)
    }

    async fn client(&self) -> SinkResult<&SheetsClient> {
        self.client.get_or_try_init(|| self.init_client()).await
    }

    async fn init_client(&self) -> SinkResult<SheetsClient> {
        self.init_attempts.fetch_add(1, Ordering::AcqRel);
        self.set_state(SinkState::Initializing);

        match self.build_client().await {
            Ok(client) => {
                self.set_state(SinkState::Ready);
                info!("{:<20} - Google Sheets client initialized", "init_client");
                Ok(client)
            }
            Err(er) => {
                self.set_state(SinkState::Failed);
                error!(error = %er, "Failed to initialize Google Sheets client");
                Err(er)
            }
        }
    }

    async fn build_client(&self) -> SinkResult<SheetsClient> {
        let SinkConfig {
            spreadsheet_id,
            credentials,
        } = SinkConfig::try_from(&self.config)?;
        let key = credentials.load().await?;

        SheetsClient::new(
            &self.config.api_base_url,
            spreadsheet_id,
            key,
            self.config.timeout(),
        )
    }

    fn set_state(&self, state: SinkState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn append_range(&self) -> String {
        a1_range(&self.config.sheet_name, "A:C")
    }

    fn header_range(&self) -> String {
        a1_range(&self.config.sheet_name, "A1:C1")
    }
}

// ###################################
// ->   HELPERS
// ###################################
/// Builds an A1 range, quoting the sheet name when it has anything but letters, digits and `_`.
fn a1_range(sheet_name: &str, cells: &str) -> String {
    if sheet_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        format!("{sheet_name}!{cells}")
    } else {
        format!("'{}'!{cells}", sheet_name.replace('\'', "''"))
    }
}
