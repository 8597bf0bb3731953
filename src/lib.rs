//! Binary crate wiring: load config, stand up a [`Manager`](session::Manager)
//! behind the control API, configure it from the config file, and run
//! until the process receives a shutdown signal.

pub mod config;
pub mod control;
pub mod rib;

use std::sync::Arc;

use config::Config;
use control::Control;
use rib::LoggingRib;
use session::Manager;

/// Replaces `main` so integration tests can start the daemon directly,
/// the way `turn_server::server_main` does for its own test suite.
pub async fn server_main(config: Arc<Config>) -> anyhow::Result<()> {
    let manager = Manager::new(Arc::new(LoggingRib));
    let control = Control::new(manager);

    control.set_itad(config.trip.itad)?;
    control.set_id(config.trip.id)?;
    control.set_hold(config.trip.hold)?;
    control.bind(config.trip.listen).await?;

    for peer in &config.trip.peers {
        let hold = peer.hold.unwrap_or(config.trip.hold);
        let trans_mode = peer.trans_mode.map(Into::into).unwrap_or(codec::message::TransMode::SendRecv);
        control.add_peer(peer.addr, peer.remote_itad, hold, trans_mode);
    }

    control.run()?;
    log::info!("trip location server listening on {}", config.trip.listen);

    tokio::signal::ctrl_c().await?;
    log::info!("shutdown signal received");
    control.shutdown().await;
    Ok(())
}
