use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use bridge_core::{
    wait_until_connected, ActuationMapper, CommandSession, DetachedVehicle, HttpVehicleEndpoint,
    HttpVehicleOptions, SensorDispatcher, UpdatePump, VehicleEndpoint,
};
use clap::Parser;
use sensor_integration::{ScriptedSensorHub, SensorHub};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings};

/// Drives a simulated vehicle from armband poses and orientation.
#[derive(Parser, Debug)]
struct Args {
    /// Settings file; defaults to ./bridge.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Vehicle host: `localhost`, `host:port` or a full URL.
    #[arg(long)]
    remote_host: Option<String>,
    #[arg(long)]
    debug: bool,
    /// Log updates instead of sending them to a vehicle.
    #[arg(long)]
    no_vehicle: bool,
    #[arg(long)]
    pump_period_ms: Option<u64>,
    /// `0` waits forever.
    #[arg(long)]
    connect_timeout_ms: Option<u64>,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.remote_host {
            settings.remote_host = host.clone();
        }
        if self.debug {
            settings.debug_mode = true;
        }
        if let Some(ms) = self.pump_period_ms {
            settings.pump_period_ms = ms;
        }
        if let Some(ms) = self.connect_timeout_ms {
            settings.set_connect_timeout_ms(ms);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    args.apply(&mut settings);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let vehicle: Arc<dyn VehicleEndpoint> = if args.no_vehicle {
        info!("no vehicle attached, updates are only logged");
        Arc::new(DetachedVehicle::new())
    } else {
        let endpoint = HttpVehicleEndpoint::open(&settings.remote_host, HttpVehicleOptions::default())
            .context("failed to open vehicle endpoint")?;
        info!(url = %endpoint.base_url(), "attempting to connect to vehicle");
        Arc::new(endpoint)
    };

    wait_until_connected(vehicle.as_ref(), settings.connect_timeout())
        .await
        .with_context(|| format!("vehicle at '{}' never became ready", settings.remote_host))?;
    info!("vehicle connected");

    let session = CommandSession::new(ActuationMapper::new(settings.mapper_config()));
    let pump = UpdatePump::start(session.clone(), Arc::clone(&vehicle), settings.pump_period());

    let hub = Arc::new(ScriptedSensorHub::new());
    hub.start_listening().await?;
    let events = hub.subscribe().await;
    let dispatcher = SensorDispatcher::new(session.clone(), Arc::clone(&hub) as Arc<dyn SensorHub>);
    let dispatch_task = tokio::spawn(dispatcher.run(events));

    info!("reading sensor script from stdin, `quit` to exit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim() == "quit" {
                        break;
                    }
                    if let Err(err) = hub.feed_line(&line).await {
                        warn!(%err, %line, "sensor script rejected");
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    error!(%err, "failed to read stdin");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    pump.stop().await;
    hub.shutdown().await?;
    let stats = dispatch_task.await.context("dispatcher task failed")?;
    info!(?stats, final_state = ?session.snapshot().await, "bridge stopped");
    Ok(())
}
