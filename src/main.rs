//! blufi-sim — drive a full provisioning run against the in-memory device.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ LocalExecutor                                                │
//! │                                                              │
//! │   task: Session::run_inbound ◀── SimulatedDevice outbox      │
//! │   main: connect ▶ scan ▶ status ▶ configure ▶ status ▶       │
//! │         version ▶ custom data ▶ disconnect                   │
//! │                                                              │
//! │ TimerDelay ─▶ async-io-mini reactor                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;

use blufi::adapters::sim::{SimOptions, SimulatedDevice};
use blufi::adapters::time::TimerDelay;
use blufi::discovery::{Advertisement, DeviceFilter};
use blufi::protocol::payloads::WifiCredentials;
use blufi::{Session, SessionConfig};

#[derive(Parser, Debug)]
#[command(name = "blufi-sim", version, about = "BluFi provisioning against a simulated device")]
struct Args {
    /// Station SSID to provision
    #[arg(long, default_value = "HomeNet")]
    ssid: String,

    /// Station password (empty for an open network)
    #[arg(long, default_value = "correct-horse-battery")]
    password: String,

    /// Session configuration as a JSON file
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Enable CRC16 on every frame
    #[arg(long)]
    checksum: bool,

    /// Largest GATT write in bytes
    #[arg(long)]
    mtu: Option<usize>,

    /// Custom data to send after provisioning
    #[arg(long)]
    custom: Option<String>,
}

fn load_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            SessionConfig::from_json(&json)?
        }
        None => SessionConfig::default(),
    };
    config.checksum_enabled |= args.checksum;
    if let Some(mtu) = args.mtu {
        config.max_frame_bytes = mtu;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args)?;
    let credentials = WifiCredentials::new(&args.ssid, &args.password)?;

    // ── Discovery ──────────────────────────────────────────
    let mut filter = DeviceFilter::new(&config.device_prefix);
    let sightings = [
        Advertisement {
            id: "24:0A:C4:00:00:01".into(),
            name: Some("BLUFI_DEVICE".into()),
            rssi: -52,
        },
        Advertisement {
            id: "7C:DF:A1:00:00:02".into(),
            name: Some("Headphones".into()),
            rssi: -70,
        },
        Advertisement {
            id: "24:0A:C4:00:00:01".into(),
            name: Some("BLUFI_DEVICE".into()),
            rssi: -50,
        },
    ];
    let Some(target) = sightings.iter().find(|adv| filter.offer(adv)) else {
        bail!("no device advertising {:?}", config.device_prefix);
    };
    info!("Selected {} ({:?})", target.id, target.name);

    let device = SimulatedDevice::new(SimOptions::default());
    let session = Session::new(device, TimerDelay::new(), config)?;

    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
    executor.spawn(session.run_inbound()).detach();

    futures_lite::future::block_on(executor.run(async {
        session.connect(&target.id).await?;

        let networks = session.scan_wifi_networks(None).await?;
        for net in &networks {
            info!("  {:>4} dBm  {}", net.rssi_dbm(), net.ssid);
        }

        let before = session.request_wifi_status(None).await?;
        info!("Before: {}", before);

        session.configure_station(&credentials).await?;
        let after = session.request_wifi_status(None).await?;
        info!("After: {}", after);

        let version = session.request_version(None).await?;
        info!("Firmware {}", version);

        if let Some(custom) = &args.custom {
            session.send_custom_data(custom.as_bytes()).await?;
        }

        session.disconnect().await?;
        if !after.is_station_connected() {
            bail!("device did not join {:?}", credentials.ssid());
        }
        info!("Provisioned {} onto {:?}", target.id, credentials.ssid());
        Ok::<(), anyhow::Error>(())
    }))
}
