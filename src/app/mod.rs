use std::{net::SocketAddr, sync::Arc};

use derive_more::Deref;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::{config::AppConfig, database::DbManager, sheets::SignupSink, Result};

// ###################################
// ->  Structs
// ###################################
pub struct App {
    pub app_state: AppState,
    pub listener: TcpListener,
}
impl App {
    pub fn new(app_state: AppState, listener: TcpListener) -> Self {
        App {
            app_state,
            listener,
        }
    }

    pub async fn build_from_config(config: AppConfig) -> Result<Self> {
        let dm = DbManager::init(&config);
        let signup_sink = SignupSink::new(config.sheets_config);

        let app_state = AppState::new(dm, signup_sink);

        let addr = SocketAddr::from((config.net_config.host, config.net_config.app_port));
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        info!("{:<20} - {}", "Listening on:", addr);

        let app = App::new(app_state, listener);
        Ok(app)
    }
}

pub struct InternalState {
    pub database_mgr: DbManager,
    pub signup_sink: SignupSink,
}

/// Application state containing all global data.
/// It implements `Deref` to easily access the fields on `InternalState`
/// Uses an `Arc` so it can be cloned around.
#[derive(Clone, Deref)]
pub struct AppState(Arc<InternalState>);

impl AppState {
    pub fn new(database_mgr: DbManager, signup_sink: SignupSink) -> Self {
        AppState(Arc::new(InternalState {
            database_mgr,
            signup_sink,
        }))
    }

    /// One-off work done before serving. Nothing in here may stop the server from starting:
    /// failures are logged and the server comes up anyway.
    pub async fn run_startup_tasks(&self) {
        if let Err(er) = self.database_mgr.migrate().await {
            warn!(error = %er, "Failed to run database migrations");
        }

        match self.signup_sink.ensure_headers().await {
            Ok(status) => info!(?status, "Google Sheets ready"),
            Err(er) => error!(error = %er, "Failed to setup Google Sheets"),
        }
    }
}
