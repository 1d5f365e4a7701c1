use mpd_remote::{Config, DeviceLifecycleMonitor};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log to stdout, filtered by `RUST_LOG` (default `info`)
fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout).with_target(false))
        .try_init()?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    let config = Config::default();
    tracing::info!(
        "Waiting for remote {} (MPD at {})",
        config.device_phys,
        config.server_addr()
    );

    let mut monitor = DeviceLifecycleMonitor::new(config);

    let result = tokio::select! {
        result = monitor.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            Ok(())
        }
    };

    monitor.shutdown().await;
    result?;
    Ok(())
}
