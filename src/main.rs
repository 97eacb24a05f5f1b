//! Demo server.
//!
//! Run with:
//!   RUST_LOG=debug PORT=3000 cargo run
//!
//! Try:
//!   curl http://localhost:3000/data
//!   curl -H 'authorization: x' http://localhost:3000/auth
//!   curl http://localhost:3000/exception/403
//!   curl -X POST http://localhost:3000/user \
//!        -H 'content-type: application/json' \
//!        -d '{"id":1,"fullName":"Ada Lovelace","job":"engineer"}'
//!   curl http://localhost:3000/user/1

use std::process::ExitCode;
use std::sync::Arc;

use tracing::error;
use tracing_subscriber::EnvFilter;

use tollgate::app::{self, UserStore};
use tollgate::{Config, Server};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let dispatcher = app::dispatcher(&config, Arc::new(UserStore::new()));

    match Server::bind(config.listen_addr()).serve(dispatcher).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server error: {e}");
            ExitCode::FAILURE
        }
    }
}
