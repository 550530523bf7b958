use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tornsync_torn::{TornApi, TornClient};
use tornsync_worker::config::WorkerConfig;
use tornsync_worker::config_service::GuildConfigService;
use tornsync_worker::discord::DiscordRest;
use tornsync_worker::notify_loop::NotificationLoop;
use tornsync_worker::platform::ChatPlatform;
use tornsync_worker::scheduler::CoarseScheduler;
use tornsync_worker::store::{EntityStore, PgEntityStore, PgGuildConfigStore};
use tornsync_worker::sweeps::Sweeps;
use tornsync_worker::verify::IdentityReconciler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tornsync_worker=info,tornsync_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        main_guild_id = config.main_guild_id,
        notify_interval_secs = config.notify_interval_secs,
        schedule_interval_secs = config.schedule_interval_secs,
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = tornsync_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    tornsync_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tornsync_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Clients ---
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .context("Failed to build HTTP client")?;
    let torn: Arc<dyn TornClient> = Arc::new(TornApi::with_client(http.clone(), &config.torn_api_url));
    let platform: Arc<dyn ChatPlatform> = Arc::new(DiscordRest::new(
        http,
        &config.discord_api_url,
        &config.discord_token,
    ));

    // --- Stores ---
    let entities: Arc<dyn EntityStore> = Arc::new(PgEntityStore::new(pool.clone()));
    let configs = Arc::new(GuildConfigService::new(Arc::new(PgGuildConfigStore::new(pool))));
    let loaded = configs
        .load_all()
        .await
        .context("Failed to load guild configurations")?;
    tracing::info!(count = loaded.len(), "Guild configurations loaded");

    // --- Loops ---
    let cancel = CancellationToken::new();

    let verifier = Arc::new(IdentityReconciler::new(torn.clone()));
    let sweeps = Arc::new(Sweeps::new(
        verifier,
        torn.clone(),
        platform.clone(),
        entities.clone(),
    ));
    let scheduler = CoarseScheduler::new(configs, sweeps, platform.clone(), config.schedule_interval());
    let scheduler_cancel = cancel.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_cancel).await;
    });

    let notify_handle = if config.notifications_enabled {
        let notifier = NotificationLoop::new(
            entities,
            torn,
            platform,
            config.main_guild_id,
            config.notify_interval(),
        );
        let notify_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            notifier.run(notify_cancel).await;
        }))
    } else {
        tracing::info!("Notification loop disabled");
        None
    };

    shutdown_signal().await;

    // --- Shutdown ---
    cancel.cancel();
    let grace = config.shutdown_grace();
    let _ = tokio::time::timeout(grace, scheduler_handle).await;
    if let Some(handle) = notify_handle {
        let _ = tokio::time::timeout(grace, handle).await;
    }
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
