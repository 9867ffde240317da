//! Starboard daemon: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  SysfsGpio   SysfsLed   SysfsPwm   Dummy*   LogEventSink     │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ─────────────────       │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │   Components (one dispatch task each)                  │  │
//! │  │   Feeder · Lights · KeyPanel                           │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                                                              │
//! │  Scheduler (per component) · Publisher (fan-out)             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `starboard [CONFIG]` (default `/etc/starboard/apparatus.json`).
//! Log level follows `RUST_LOG`, `info` when unset.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use edge_executor::LocalExecutor;
use futures_lite::future;
use log::info;

use starboard::adapters::log_sink::LogEventSink;
use starboard::apparatus::Apparatus;
use starboard::config::ApparatusConfig;
use starboard::events::Publisher;

const DEFAULT_CONFIG: &str = "/etc/starboard/apparatus.json";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);
    let config = ApparatusConfig::load(&path)?;
    info!(
        "starboard {} starting from {}",
        env!("CARGO_PKG_VERSION"),
        path.display()
    );

    let executor: LocalExecutor = LocalExecutor::new();
    let publisher = Publisher::new();
    publisher.subscribe(LogEventSink::new());

    let apparatus =
        Apparatus::build(&config, &executor, &publisher).context("building apparatus")?;
    for addr in apparatus.addresses() {
        info!("  {addr}");
    }

    // The controller relay is an external collaborator; components run
    // until the process is stopped.
    future::block_on(executor.run(future::pending::<()>()));
    Ok(())
}
