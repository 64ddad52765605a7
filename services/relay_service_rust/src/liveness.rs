//! Liveness endpoint for external uptime probes.
//!
//! Serves `GET /` on its own OS thread and runtime so it keeps answering
//! regardless of what the chat or telemetry side is doing.

use std::io;
use std::thread;

use axum::{routing::get, Router};
use log::{error, info};
use tokio::net::TcpListener;

pub const ALIVE_BODY: &str = "Rust Bot is Alive and Listening!";

pub fn build_router() -> Router {
    Router::new().route("/", get(alive))
}

async fn alive() -> &'static str {
    ALIVE_BODY
}

pub async fn serve(listener: TcpListener) -> io::Result<()> {
    info!("Liveness endpoint listening on {}", listener.local_addr()?);
    axum::serve(listener, build_router()).await
}

/// Start the endpoint on `0.0.0.0:<port>` in a background thread.
pub fn spawn(port: u16) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("liveness".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to build liveness runtime: {}", e);
                    return;
                }
            };

            let result = runtime.block_on(async move {
                let listener = TcpListener::bind(("0.0.0.0", port)).await?;
                serve(listener).await
            });
            if let Err(e) = result {
                error!("Liveness endpoint on port {} stopped: {}", port, e);
            }
        })
}
