use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use veil_gateway::config::{
    DEFAULT_BACKLOG_LIMIT, DEFAULT_MAX_FRAME_BYTES, DEFAULT_MAX_SESSIONS, DEFAULT_OUTBOX_CAPACITY,
};
use veil_gateway::{RelayConfig, RelayState};

#[derive(Parser, Debug)]
#[command(name = "veil-gateway")]
#[command(about = "Veil gateway - relays encrypted envelopes between session peers")]
struct Args {
    /// WebSocket listen address
    #[arg(long, env = "VEIL_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Largest accepted inbound frame in bytes
    #[arg(long, env = "VEIL_MAX_FRAME_BYTES", default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    max_frame_bytes: usize,

    /// Outbound queue capacity per connection
    #[arg(long, env = "VEIL_OUTBOX_CAPACITY", default_value_t = DEFAULT_OUTBOX_CAPACITY)]
    outbox_capacity: usize,

    /// Events retained per session
    #[arg(long, env = "VEIL_BACKLOG_LIMIT", default_value_t = DEFAULT_BACKLOG_LIMIT)]
    backlog_limit: usize,

    /// Sessions retained before the least recently used is dropped
    #[arg(long, env = "VEIL_MAX_SESSIONS", default_value_t = DEFAULT_MAX_SESSIONS)]
    max_sessions: usize,

    /// Allow binding to a non-loopback address
    #[arg(long, env = "VEIL_ALLOW_PUBLIC_BIND", default_value_t = false)]
    allow_public_bind: bool,

    /// Log level
    #[arg(long, env = "VEIL_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl From<&Args> for RelayConfig {
    fn from(args: &Args) -> Self {
        Self {
            max_frame_bytes: args.max_frame_bytes,
            outbox_capacity: args.outbox_capacity,
            backlog_limit: args.backlog_limit,
            max_sessions: args.max_sessions,
        }
    }
}

fn check_public_bind_allowed(addr: SocketAddr, allowed: bool) -> Result<()> {
    if addr.ip().is_loopback() || allowed {
        return Ok(());
    }
    Err(anyhow::anyhow!(
        "refusing non-loopback bind without --allow-public-bind"
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    veil_common::init_tracing_with_default(&args.log_level);

    let config = RelayConfig::from(&args);
    config.validate()?;
    check_public_bind_allowed(args.listen, args.allow_public_bind)?;

    info!("Starting veil-gateway v{}", env!("CARGO_PKG_VERSION"));
    let listener = TcpListener::bind(args.listen).await?;
    info!("listening on ws://{}/rpc", listener.local_addr()?);
    info!(
        "max frame {} bytes, outbox {} messages, backlog {} events, {} sessions",
        config.max_frame_bytes, config.outbox_capacity, config.backlog_limit, config.max_sessions
    );

    veil_gateway::serve(listener, RelayState::in_memory(config)).await?;
    Ok(())
}
