use std::sync::Arc;

use anyhow::Context;
use tokio::signal;

use strongbox_api::app::{AppServices, build_app};
use strongbox_api::config::Settings;
use strongbox_auth::SubjectResolver;
use strongbox_infra::{AccountStore, InMemoryAccountStore, PostgresAccountStore};

/// Password given to the accounts created by `--seed`.
const SEED_PASSWORD: &str = "password";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load();
    strongbox_observability::init(settings.log_format);

    let secret = settings.jwt_secret();
    let ttl = settings.token_ttl()?;

    match &settings.database_url {
        Some(url) => {
            let store = PostgresAccountStore::connect(url)
                .await
                .context("failed to connect to postgres")?;
            store.ensure_schema().await?;
            let services = AppServices::with_secret(Arc::new(store), &secret, ttl);
            serve(&settings, services).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set; accounts are kept in memory");
            let services = AppServices::with_secret(Arc::new(InMemoryAccountStore::new()), &secret, ttl);
            serve(&settings, services).await
        }
    }
}

async fn serve<S>(settings: &Settings, services: AppServices<S>) -> anyhow::Result<()>
where
    S: AccountStore + SubjectResolver,
{
    let services = Arc::new(services);
    if settings.seed {
        seed(&services).await?;
    }

    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(settings.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn seed<S>(services: &AppServices<S>) -> anyhow::Result<()>
where
    S: AccountStore + SubjectResolver,
{
    for (first, last, is_admin) in [("Anthony", "Regular", false), ("Ada", "Admin", true)] {
        let account = services
            .open_account(first.into(), last.into(), SEED_PASSWORD.into(), is_admin)
            .await
            .with_context(|| format!("failed to seed account {first} {last}"))?;
        tracing::info!(
            account_id = %account.id,
            account_number = %account.account_number,
            is_admin,
            "seeded account"
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received, starting graceful shutdown"),
        _ = terminate => tracing::info!("SIGTERM received, starting graceful shutdown"),
    }
}
