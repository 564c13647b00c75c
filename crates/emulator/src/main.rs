//! usb-emulator
//!
//! Presents an emulated USB device to a host over a TCP link.

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use emulator::config::{ClassField, EmulatorConfig};
use emulator::{Device, host_link};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "usb-emulator")]
#[command(author, version, about = "USB device emulator - present a virtual device to a host")]
#[command(long_about = "
Emulates the device side of a USB connection. The device announces its
descriptors to the connected host and answers GET_DESCRIPTOR on EP0.

EXAMPLES:
    # Run with default config
    usb-emulator

    # Emulate a bulk-only mass storage device
    usb-emulator --class 8 --subclass 6 --protocol 0x50

    # Listen on another address with debug logging
    usb-emulator --listen 0.0.0.0:3240 --log-level debug

CONFIGURATION:
    The emulator reads ~/.config/usb-emulator/emulator.toml unless --config
    is given, and falls back to built-in defaults.
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Address to listen for the host on
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,

    /// bDeviceClass, decimal or 0x-prefixed hex
    #[arg(long, value_name = "CLASS")]
    class: Option<String>,

    /// bDeviceSubClass, decimal or 0x-prefixed hex
    #[arg(long, value_name = "SUBCLASS")]
    subclass: Option<String>,

    /// bDeviceProtocol, decimal or 0x-prefixed hex
    #[arg(long, value_name = "PROTOCOL")]
    protocol: Option<String>,
}

impl Args {
    /// Command line values take precedence over the file
    fn apply(&self, config: &mut EmulatorConfig) {
        if let Some(ref level) = self.log_level {
            config.emulator.log_level = level.clone();
        }
        if let Some(ref listen) = self.listen {
            config.emulator.listen_addr = listen.clone();
        }
        if let Some(ref class) = self.class {
            config.device.class = ClassField::Text(class.clone());
        }
        if let Some(ref subclass) = self.subclass {
            config.device.subclass = ClassField::Text(subclass.clone());
        }
        if let Some(ref protocol) = self.protocol {
            config.device.protocol = ClassField::Text(protocol.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = EmulatorConfig::default();
        let path = EmulatorConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        EmulatorConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        EmulatorConfig::load_or_default()
    };
    args.apply(&mut config);

    setup_logging(&config.emulator.log_level).context("Failed to setup logging")?;
    config.validate().context("Invalid configuration")?;

    info!("usb-emulator v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", config.emulator.log_level);

    let class = config.device.class()?;
    let identity = config.device.identity()?;
    let mut device = Device::with_identity(class, identity);
    info!("Emulating device class {}", class);

    let listener = TcpListener::bind(&config.emulator.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.emulator.listen_addr))?;

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    host_link::run(
        listener,
        &mut device,
        config.emulator.tick_interval(),
        shutdown,
    )
    .await?;

    info!("Emulator stopped");
    Ok(())
}
