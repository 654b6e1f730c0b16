// src/server/mod.rs
//! The ambient HTTP/WebSocket shell (§4.8). Owns no pipeline logic:
//! every handler delegates straight into `CertBuffer` / `FanOutBroker`.

pub mod http;
pub mod ws;

use std::sync::Arc;

use crate::broker::FanOutBroker;
use crate::config::Config;

/// Shared application state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<FanOutBroker>,
    pub config: Arc<Config>,
}
