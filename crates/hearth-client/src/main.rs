//! Headless hearth client: keeps a local replica of the account in sync and
//! logs what happens until interrupted.
//!
//! The session token comes from the local credential store, or from
//! `HEARTH_TOKEN` on first run.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use hearth_client::{init_tracing, ClientConfig, ClientEvent, Collaborators, Session};
use hearth_net::{ApiClient, FileStorage, HttpApi, HttpFileStorage, WsGateway};
use hearth_shared::constants::APP_NAME;
use hearth_store::{Database, DatabaseHandle, Persister, StoreHandle, TokenStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Tracing and configuration
    // -----------------------------------------------------------------------
    init_tracing();
    info!("Starting {} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 2. Local state
    // -----------------------------------------------------------------------
    let db = match &config.data_dir {
        Some(dir) => Database::open_in(dir),
        None => Database::open_default(),
    }
    .context("failed to open local database")?;
    if let Some(path) = db.path() {
        info!(path = %path.display(), "Opened local database");
    }

    let store = StoreHandle::new(db.load_store());
    let db = DatabaseHandle::new(db);
    let (persister, persist_task) =
        Persister::spawn(db.clone(), store.clone(), config.persist_debounce());

    // -----------------------------------------------------------------------
    // 3. Collaborators
    // -----------------------------------------------------------------------
    let api = Arc::new(HttpApi::new(&config.api_url));
    let files: Option<Arc<dyn FileStorage>> = match api.fetch_info().await {
        Ok(info) => match HttpFileStorage::from_info(&info) {
            Ok(storage) => Some(Arc::new(storage)),
            Err(e) => {
                warn!(error = %e, "File storage unavailable, attachments disabled");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "Could not reach API, attachments disabled");
            None
        }
    };

    let tokens: Arc<dyn TokenStore> = Arc::new(db.clone());
    let session = Session::new(
        config,
        store,
        Some(persister.clone()),
        Collaborators {
            api,
            gateway: Arc::new(WsGateway),
            files,
            tokens,
        },
    );

    // -----------------------------------------------------------------------
    // 4. Run until interrupted
    // -----------------------------------------------------------------------
    let mut events = session.subscribe();
    match std::env::var("HEARTH_TOKEN") {
        Ok(token) if !token.is_empty() => session.sign_in(&token).await?,
        _ => session
            .resume()
            .await
            .context("no stored session; set HEARTH_TOKEN to sign in")?,
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(ClientEvent::StateChanged(state)) => info!(%state, "Connection state"),
                Ok(ClientEvent::StoreUpdated { channel }) => {
                    tracing::debug!(channel = ?channel, "Store updated");
                }
                Ok(ClientEvent::MessageFailed { channel, nonce, error }) => {
                    warn!(%channel, %nonce, %error, "Message failed");
                }
                Ok(ClientEvent::SignedOut) => {
                    info!("Session ended");
                    break;
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Event listener lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    // -----------------------------------------------------------------------
    // 5. Shutdown
    // -----------------------------------------------------------------------
    session.stop().await;
    persister.flush().await.context("failed to write store")?;
    persister.shutdown().await;
    let _ = persist_task.await;

    Ok(())
}
