//! # kconnect-client
//!
//! Client-side state for Krishna Connect: the conversation store, the
//! notification center, the identity context and the background tasks
//! (receipts, push listener) that mutate them, exposed to a view layer
//! through the [`commands`] module.

pub mod auth;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod delivery;
pub mod directory;
pub mod error;
pub mod events;
pub mod identity;
pub mod notifications;
pub mod push;
pub mod state;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use state::{AppState, SharedState};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kconnect_client=debug,kconnect_store=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Open the persisted state described by `config` and start the push
/// listener on the simulated source.
///
/// Must be called from within a tokio runtime.
pub fn start(config: ClientConfig) -> Result<SharedState> {
    tracing::info!(app = kconnect_shared::constants::APP_NAME, "starting client");

    let state = AppState::open(config.clone())?.into_shared();
    let source = push::SimulatedPush::from_config(state.clone(), &config);
    push::spawn_push_listener(state.clone(), source);
    Ok(state)
}
