use crate::config::GatewayConfig;
use crate::server::{self, GatewayState};
use anyhow::Result;
use std::net::SocketAddr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// CLI arguments forwarded from `main()`.
pub struct BootstrapArgs {
    pub config_path: std::path::PathBuf,
    /// Overrides `0.0.0.0:<listen_port>` from the config when set.
    pub listen: Option<String>,
}

/// Gateway lifecycle: init logging → load config → wire state → spawn
/// background tasks → serve.
pub async fn run(args: BootstrapArgs) -> Result<()> {
    init_tracing();

    let cfg = GatewayConfig::load(&args.config_path)?;

    let state = GatewayState::new(&cfg);
    state.start_background_tasks();

    let listen: SocketAddr = match args.listen {
        Some(ref l) => l.parse()?,
        None => SocketAddr::from(([0, 0, 0, 0], cfg.listen_port)),
    };

    server::run(listen, &cfg, state).await
}

fn init_tracing() {
    let (non_blocking, _guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .buffered_lines_limit(128_000)
        .lossy(true)
        .finish(std::io::stdout());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .json(),
        )
        .init();

    std::mem::forget(_guard);
}
