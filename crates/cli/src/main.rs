use airgapd::{cli::Cli, signals::ShutdownSignals};
use anyhow::Context;
use clap::Parser;
use config::Config;
use orchestrator::{
    Clock, CpuSampler, LsblkEnumerator, Orchestrator, ProcfsCpuSource, Services, SystemClock,
    open_sink, platform,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};
use tracing_subscriber::{EnvFilter, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // NOTE: The verbosity flag takes precedence over the environment variable
    // for log control. `AIRGAPD_LOG` can only set the log level per crate,
    // e.g. `AIRGAPD_LOG=orchestrator=debug airgapd`.
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("AIRGAPD_LOG")
        .from_env()?
        .add_directive(cli.verbosity.log_level_filter().as_str().parse()?);

    let layer = tracing_subscriber::fmt::layer()
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .init();

    if let Err(err) = run(cli).await {
        error!("fatal: {err:#}");
        return Err(err);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // load config
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        _ => {
            let mut candidates = glob::glob("/etc/airgapd/config.d/*.toml")?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            candidates.insert(0, "/etc/airgapd/config.toml".into());
            trace!(?candidates, "config file candidates");
            Config::load_multiple(candidates)?
        }
    };
    debug!(?config, ?cli);

    // Without a working audit trail there is nothing worth running for.
    let usb_path = config.logging.usb_path();
    let usb_sink = open_sink(config.logging.usb_format, &usb_path)
        .with_context(|| format!("cannot open usb audit log {}", usb_path.display()))?;
    let cpu_path = config.logging.cpu_path();
    let cpu_sink = open_sink(config.logging.cpu_format, &cpu_path)
        .with_context(|| format!("cannot open cpu audit log {}", cpu_path.display()))?;

    let subscriptions = platform::subscription_factory(&config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let cancel = CancellationToken::new();
    let signals = ShutdownSignals::install().context("cannot install signal handlers")?;
    let signal_handle = tokio::spawn(signals.cancel_on_signal(cancel.clone()));

    let cpu_handle = config.cpu.enabled.then(|| {
        let sampler = CpuSampler::new(&config, ProcfsCpuSource, cpu_sink, clock.clone());
        tokio::spawn(sampler.run(cancel.clone()))
    });

    let services = Services {
        enumerator: Arc::new(LsblkEnumerator::new(&config)),
        subscriptions,
        sink: usb_sink,
        clock,
    };
    let mut orchestrator = Orchestrator::new(config, services);
    info!(log = %usb_path.display(), "airgapd started");
    orchestrator.run_until(cancel.clone()).await;

    if let Some(handle) = cpu_handle {
        handle.await?;
    }
    signal_handle.await?;

    info!("shutdown complete");
    Ok(())
}
