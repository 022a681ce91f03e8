//! Relay engine entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::sync::watch;

use relay::adapters::http::{serve, AppState};
use relay::adapters::plugins::github::{
    GitHubClient, GitHubCreateIssueHandler, GitHubPoller, GitHubPostCommentHandler,
};
use relay::adapters::plugins::gmail::SendEmailHandler;
use relay::adapters::plugins::providers::{AliasedProvider, GitHubOAuthProvider, GoogleOAuthProvider};
use relay::adapters::plugins::slack::SlackSendMessageHandler;
use relay::adapters::plugins::system::LogMessageHandler;
use relay::adapters::sqlite::{
    create_pool, Migrator, PoolConfig, SqliteActionStateRepository, SqliteAutomationRepository,
    SqliteExecutionRepository, SqliteNotificationRepository, SqliteServiceRepository,
    SqliteTokenRepository, SqliteWebhookSubscriptionRepository,
};
use relay::cli::{Cli, Commands};
use relay::domain::models::{Config, Service};
use relay::domain::ports::{
    ActionStateRepository, AutomationRepository, ExecutionRepository, NotificationRepository,
    OAuthProvider, ServicePoller, ServiceRepository, TokenRepository, TracingSink,
    WebhookSubscriptionRepository,
};
use relay::infrastructure::config::ConfigLoader;
use relay::infrastructure::logging;
use relay::services::{
    Catalog, DispatchQueue, Dispatcher, ExecutionAdmitter, HandlerRegistry, MetricsCollector,
    NotificationService, PollRunner, RetentionTask, TimerScheduler, TokenBroker, WebhookIngest,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    logging::init(&config.logging);

    let database_url = format!("sqlite:{}", config.database.path);
    let pool = create_pool(
        &database_url,
        Some(PoolConfig {
            max_connections: config.database.max_connections,
            ..Default::default()
        }),
    )
    .await
    .context("Failed to connect to database")?;

    let applied = Migrator::new(pool.clone())
        .run()
        .await
        .context("Failed to run database migrations")?;
    if applied > 0 {
        tracing::info!(applied, "Applied database migrations");
    }

    let services: Arc<dyn ServiceRepository> = Arc::new(SqliteServiceRepository::new(pool.clone()));
    seed_services(&services).await?;

    match cli.command {
        Commands::Migrate => {
            tracing::info!("Migrations complete");
            Ok(())
        }
        Commands::Status => print_status(pool).await,
        Commands::Serve => run_engine(config, pool, services).await,
    }
}

/// Make sure every catalog service has an availability row.
async fn seed_services(services: &Arc<dyn ServiceRepository>) -> Result<()> {
    for def in Catalog::builtin().services() {
        services
            .seed(&Service::new(def.name, def.description))
            .await
            .context("Failed to seed service table")?;
    }
    Ok(())
}

async fn print_status(pool: sqlx::SqlitePool) -> Result<()> {
    let executions: Arc<dyn ExecutionRepository> =
        Arc::new(SqliteExecutionRepository::new(pool));
    let collector = MetricsCollector::new(
        executions,
        Arc::new(TracingSink),
        Default::default(),
    );
    let snapshot = collector.collect(Utc::now()).await?;

    let body = serde_json::json!({
        "last_hour": {
            "pending": snapshot.last_hour.pending,
            "running": snapshot.last_hour.running,
            "success": snapshot.last_hour.success,
            "failed": snapshot.last_hour.failed,
            "success_rate": snapshot.last_hour.success_rate(),
        },
        "last_day": {
            "pending": snapshot.last_day.pending,
            "running": snapshot.last_day.running,
            "success": snapshot.last_day.success,
            "failed": snapshot.last_day.failed,
            "success_rate": snapshot.last_day.success_rate(),
        },
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn run_engine(
    config: Config,
    pool: sqlx::SqlitePool,
    services: Arc<dyn ServiceRepository>,
) -> Result<()> {
    let automations: Arc<dyn AutomationRepository> =
        Arc::new(SqliteAutomationRepository::new(pool.clone()));
    let executions: Arc<dyn ExecutionRepository> =
        Arc::new(SqliteExecutionRepository::new(pool.clone()));
    let states: Arc<dyn ActionStateRepository> =
        Arc::new(SqliteActionStateRepository::new(pool.clone()));
    let tokens: Arc<dyn TokenRepository> = Arc::new(SqliteTokenRepository::new(pool.clone()));
    let subscriptions: Arc<dyn WebhookSubscriptionRepository> =
        Arc::new(SqliteWebhookSubscriptionRepository::new(pool.clone()));
    let notification_repo: Arc<dyn NotificationRepository> =
        Arc::new(SqliteNotificationRepository::new(pool.clone()));

    let notifications = Arc::new(NotificationService::new(notification_repo));

    let mut providers: Vec<Arc<dyn OAuthProvider>> = vec![Arc::new(GitHubOAuthProvider)];
    if let Some(google_config) = config.providers.get("google") {
        providers.push(Arc::new(GoogleOAuthProvider::new(google_config)));
        providers.push(Arc::new(AliasedProvider::new(
            "gmail",
            GoogleOAuthProvider::new(google_config),
        )));
    }
    let broker = Arc::new(TokenBroker::new(
        Arc::clone(&tokens),
        providers,
        Arc::clone(&notifications),
        config.token_broker.token_refresh_window_seconds,
    ));

    let (queue, queue_rx) = DispatchQueue::bounded(config.dispatcher.queue_capacity);
    let admitter = Arc::new(ExecutionAdmitter::new(Arc::clone(&executions), queue.clone()));

    let github_client = Arc::new(GitHubClient::new());
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(LogMessageHandler));
    registry.register(Arc::new(SendEmailHandler::new(Arc::clone(&broker))));
    registry.register(Arc::new(SlackSendMessageHandler::new(Arc::clone(&broker))));
    registry.register(Arc::new(GitHubCreateIssueHandler::new(
        Arc::clone(&github_client),
        Arc::clone(&broker),
    )));
    registry.register(Arc::new(GitHubPostCommentHandler::new(
        Arc::clone(&github_client),
        Arc::clone(&broker),
    )));
    tracing::info!(handlers = ?registry.names(), "Reaction handlers registered");
    let registry = Arc::new(registry);

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&executions),
        Arc::clone(&automations),
        Arc::clone(&registry),
        Arc::clone(&broker),
        Arc::clone(&notifications),
        Arc::new(TracingSink),
        config.dispatcher.clone(),
        queue.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = dispatcher.spawn_workers(queue_rx, shutdown_rx.clone());

    // Recover work left over from the previous process lifetime.
    dispatcher.reclaim_stale().await?;
    dispatcher.enqueue_pending_backlog().await?;

    if config.scheduler.enabled {
        let scheduler = Arc::new(TimerScheduler::new(
            Arc::clone(&automations),
            Arc::clone(&admitter),
        ));
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { scheduler.run(rx).await }));
    }

    let pollers: Vec<Arc<dyn ServicePoller>> =
        vec![Arc::new(GitHubPoller::new(Arc::clone(&github_client)))];
    let poll_runner = Arc::new(PollRunner::new(
        Arc::clone(&automations),
        Arc::clone(&states),
        Arc::clone(&subscriptions),
        Arc::clone(&services),
        Arc::clone(&broker),
        Arc::clone(&admitter),
        Arc::clone(&notifications),
        pollers,
        config.polling.clone(),
    ));
    tasks.extend(poll_runner.spawn_loops(shutdown_rx.clone()));

    let retention = Arc::new(RetentionTask::new(
        Arc::clone(&executions),
        config.retention.clone(),
    ));
    {
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { retention.run(rx).await }));
    }

    let metrics = Arc::new(MetricsCollector::new(
        Arc::clone(&executions),
        Arc::new(TracingSink),
        config.metrics.clone(),
    ));
    {
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { metrics.run(rx).await }));
    }

    // Periodic reclaim of executions stranded in `running`.
    {
        let dispatcher = Arc::clone(&dispatcher);
        let mut rx = shutdown_rx.clone();
        let interval = std::time::Duration::from_secs(
            config.dispatcher.reclaim_running_after_seconds.max(1),
        );
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = rx.changed() => break,
                }
                if let Err(e) = dispatcher.reclaim_stale().await {
                    tracing::error!(error = %e, "Reclaim sweep failed");
                }
            }
        }));
    }

    let ingest = Arc::new(WebhookIngest::new(
        Arc::clone(&automations),
        Arc::clone(&subscriptions),
        Arc::clone(&admitter),
    ));
    let state = AppState {
        services,
        ingest,
        webhook_secrets: Arc::new(config.webhook_secrets.clone()),
        catalog: Catalog::builtin(),
    };
    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port)
        .parse()
        .context("Invalid HTTP bind address")?;

    tracing::info!(addr = %addr, workers = config.dispatcher.worker_count, "Relay engine started");

    tokio::select! {
        result = serve(state, addr) => {
            result.context("HTTP server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, draining workers");
        }
    }

    let _ = shutdown_tx.send(true);
    let drain = futures::future::join_all(tasks);
    if tokio::time::timeout(std::time::Duration::from_secs(30), drain)
        .await
        .is_err()
    {
        tracing::warn!("Some tasks did not drain within the shutdown budget");
    }

    tracing::info!("Relay engine stopped");
    Ok(())
}
