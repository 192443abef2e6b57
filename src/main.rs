//! TrustRail billing service binary.
//!
//! Wires the lifecycle engine to its adapters, starts the renewal
//! sweeper, and runs until SIGINT/SIGTERM. The in-memory adapters are
//! the single-process deployment; networked implementations plug in at
//! the same constructor seam.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trustrail_billing::adapters::{
    InMemorySubscriptionStore, MockPaymentGateway, RecordingNotifier,
};
use trustrail_billing::application::{
    LifecycleConfig, RenewalSweeper, RenewalSweeperConfig, SubscriptionLifecycleManager,
};
use trustrail_billing::config::AppConfig;
use trustrail_billing::domain::subscription::PlanTier;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config);

    info!(
        grace_window_days = config.billing.grace_window_days,
        sweep_interval_secs = config.sweeper.sweep_interval_secs,
        "starting trustrail billing service"
    );

    let store = Arc::new(InMemorySubscriptionStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let lifecycle = LifecycleConfig::default()
        .with_trial_days(PlanTier::Basic, config.billing.trial_days_basic)
        .with_trial_days(PlanTier::Premium, config.billing.trial_days_premium)
        .with_trial_days(PlanTier::Enterprise, config.billing.trial_days_enterprise)
        .with_grace_window_days(config.billing.grace_window_days)
        .with_max_version_retries(config.billing.max_version_retries)
        .with_charge_timeout(config.payment.charge_timeout())
        .with_charge_retries(
            config.payment.charge_retry_attempts,
            config.payment.charge_retry_backoff(),
        );

    let manager = Arc::new(SubscriptionLifecycleManager::new(
        store.clone(),
        gateway,
        notifier,
        lifecycle,
    ));

    let sweeper = RenewalSweeper::with_config(
        store,
        manager,
        RenewalSweeperConfig::default()
            .with_sweep_interval(config.sweeper.sweep_interval())
            .with_batch_size(config.sweeper.batch_size),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    shutdown_signal().await;
    info!("shutdown signal received");

    shutdown_tx.send(true)?;
    sweeper_handle.await?;

    info!("trustrail billing service stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    // RUST_LOG wins over the configured default when both are set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Wait for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
