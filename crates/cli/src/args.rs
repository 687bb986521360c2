use std::path::PathBuf;

use clap::Parser;
use dronewarden_common::Band;

#[derive(Parser, Debug)]
#[command(name = "dronewarden")]
#[command(version)]
#[command(about = "Passive WiFi drone detection with deauthentication countermeasure", long_about = None)]
pub struct Cli {
    /// Wireless interface to capture on (switched to monitor mode)
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Pick the interface from an interactive list
    #[arg(short, long)]
    pub list: bool,

    /// Replay a pcap file instead of capturing live (overrides -i)
    #[arg(short, long, value_name = "FILE")]
    pub read: Option<PathBuf>,

    /// Vendor database: "vendor;prefix" lines
    #[arg(short = 'f', long = "vendors", value_name = "FILE", default_value = "./misc/oui.csv")]
    pub vendors: PathBuf,

    /// Telemetry API base URL. Leave unset to run without API
    #[arg(long, value_name = "URL")]
    pub api: Option<String>,

    /// Latitude of the probe
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude of the probe
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub lng: f64,

    /// Hop over 5 GHz channels instead of 2.4 GHz
    #[arg(short = '5', long = "five-ghz")]
    pub five_ghz: bool,

    /// Detect only, never inject deauthentication frames
    #[arg(long)]
    pub no_deauth: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    Offline(PathBuf),
    Live(String),
    /// No interface given: ask the user
    Menu,
}

impl Cli {
    pub fn band(&self) -> Band {
        if self.five_ghz {
            Band::FiveGhz
        } else {
            Band::TwoGhz
        }
    }

    pub fn source(&self) -> CaptureSource {
        if let Some(path) = &self.read {
            return CaptureSource::Offline(path.clone());
        }
        match &self.interface {
            Some(name) if !self.list => CaptureSource::Live(name.clone()),
            _ => CaptureSource::Menu,
        }
    }
}
