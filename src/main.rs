//! lazy-gateway
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net (TCP / TLS / Unix listener)
//!                 │
//!                 ▼
//!             http::server ── host lookup ──▶ routing::RouteTable
//!                 │                                 │
//!        no rule  │                                 │ ProxyRule
//!                 ▼                                 ▼
//!        static files / 502            security::cors (gate)
//!                                                   │
//!                                                   ▼
//!                                      proxy::engine ──▶ Upstream
//!                                                   │   (http / https / pipe)
//!                                                   ▼
//!                                      security::csp, header merge
//!                                                   │
//!     Client ◀── streamed body (proxy::body) ◀──────┘
//! ```

use clap::Parser;

use lazy_gateway::cli::Cli;
use lazy_gateway::lifecycle;
use lazy_gateway::observability::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().load()?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lazy-gateway starting");
    tracing::info!(
        listener = %config.listener.bind_address(),
        rules = config.rules.len(),
        proxy_only = config.proxy_only,
        "Configuration loaded"
    );

    lifecycle::run(config).await?;
    Ok(())
}
