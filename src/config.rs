use clap::Parser;
use serde::*;
use std::{fs::read_to_string, net::SocketAddr};

use codec::message::TransMode;

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum TransModeConfig {
    SendRecv,
    Send,
    Recv,
}

impl From<TransModeConfig> for TransMode {
    fn from(value: TransModeConfig) -> Self {
        match value {
            TransModeConfig::SendRecv => TransMode::SendRecv,
            TransModeConfig::Send => TransMode::Send,
            TransModeConfig::Recv => TransMode::Recv,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct PeerConfig {
    /// address this peer connects from/to. identity in the locator (§4.2).
    pub addr: SocketAddr,

    /// the ITAD this peer is expected to present in its Open.
    pub remote_itad: u32,

    /// per-peer hold time, in seconds. defaults to the daemon's own `hold`.
    pub hold: Option<u16>,

    /// per-peer transmit mode. defaults to `send_recv`.
    pub trans_mode: Option<TransModeConfig>,
}

#[derive(Deserialize, Debug)]
pub struct Trip {
    /// listen address for the TRIP TCP server.
    ///
    /// the IANA-assigned TRIP port is 6069; this is not hardcoded so the
    /// daemon can be run on an alternate port in test environments.
    #[serde(default = "Trip::listen")]
    pub listen: SocketAddr,

    /// this daemon's ITAD number. nonzero (I-checked by the manager at
    /// session start, not here).
    pub itad: u32,

    /// this daemon's router id.
    pub id: u32,

    /// this daemon's hold timer, in seconds. either 0 (keepalives disabled)
    /// or at least 3.
    #[serde(default = "Trip::hold")]
    pub hold: u16,

    /// statically configured peers. each becomes a locator entry and an
    /// outbound session at startup.
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

impl Trip {
    fn listen() -> SocketAddr {
        "0.0.0.0:6069".parse().unwrap()
    }

    fn hold() -> u16 {
        90
    }
}

#[derive(Deserialize, Debug)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub trip: Trip,
    #[serde(default)]
    pub log: Log,
}

#[derive(Parser)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    /// specify the configuration file path.
    #[arg(long)]
    config: Option<String>,
}

impl Config {
    /// Load command line parameters, if the configuration file path is
    /// specified, the configuration is read from the configuration file,
    /// otherwise parsing an empty document (and failing on the required
    /// `trip.itad`/`trip.id` fields).
    pub fn load() -> anyhow::Result<Self> {
        let cfg_str = Cli::parse()
            .config
            .map(|path| read_to_string(path))
            .transpose()?
            .unwrap_or_default();
        Ok(toml::from_str(&cfg_str)?)
    }
}
