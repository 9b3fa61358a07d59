use anyhow::Context;
use skald_printer::TcpDevice;
use skald_server::{
    BacklogIndicator, Config, MessageQueue, MessageRelay, Normalizer, PrintEngine, RosterStore,
    Secrets, TelegramPoller, TelegramTransport, UserRegistry, init_logger_with_file,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment (dotenv, config, logging)
    dotenv::dotenv().ok();
    let config = Config::from_env();
    init_logger_with_file(
        std::env::var("SKALD_LOG_LEVEL").ok().as_deref(),
        config.log_dir.as_deref(),
    );

    tracing::info!("Skald server starting...");

    // 2. Secrets are required files; refuse to start without them
    let secrets = Secrets::load(&config.data_dir)?;

    std::fs::create_dir_all(&config.spool_dir)
        .with_context(|| format!("creating spool dir {}", config.spool_dir.display()))?;

    // 3. Persistence
    let store = Arc::new(RosterStore::open(
        config.data_dir.join("saves.json"),
        secrets.admin_id,
    )?);
    let registry = UserRegistry::new(store, config.default_permission);
    let queue = Arc::new(MessageQueue::open(config.data_dir.join("backlog.json"))?);

    // 4. Printer
    let device = Arc::new(TcpDevice::new(&config.printer_host, config.printer_port)?);
    let engine = Arc::new(PrintEngine::new(device, config.paper_width));
    if let Err(e) = engine.print_banner("Skald started!").await {
        tracing::warn!(error = %e, "startup banner failed, printer may be offline");
    }

    let indicator = Arc::new(BacklogIndicator::new(
        engine.clone(),
        Duration::from_secs(config.indicator_interval_secs),
    ));
    if queue.backlog_len()? > 0 {
        tracing::warn!(
            backlog = queue.backlog_len()?,
            "unprinted messages survived the restart"
        );
        indicator.start();
    }

    // 5. Relay + Telegram
    let transport = Arc::new(TelegramTransport::new(&secrets.bot_token));
    let relay = Arc::new(MessageRelay::new(
        registry,
        queue,
        engine,
        Normalizer::new(&config.spool_dir),
        indicator,
        transport.clone(),
        secrets.admin_id,
    ));

    let shutdown = CancellationToken::new();
    let poller = TelegramPoller::new(transport, relay, shutdown.clone());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                shutdown.cancel();
            }
        }
    });

    poller.run().await;
    tracing::info!("Skald server stopped");
    Ok(())
}
