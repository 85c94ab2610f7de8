//! faultprobe-control
//!
//! Standalone control plane: loads probe policies from `faultprobe.yaml`
//! (or the path given as the first argument) and serves the attribute tree.

use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

use faultprobe_control::{app_state, config};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "faultprobe.yaml".to_string());
    let cfg = config::load_from_file(&path).expect("config load failed");
    let listen: SocketAddr = cfg
        .control
        .listen
        .parse()
        .expect("control.listen must be a valid SocketAddr");

    let state = app_state::AppState::new(cfg);

    if let Err(e) = faultprobe_control::serve(state, listen).await {
        tracing::error!(error = %e, "control surface unavailable");
        std::process::exit(1);
    }
}
