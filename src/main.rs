use anyhow::Context;
use dotenv::dotenv;
use kbk_bot::admin_lock::{LockStore, MemoryLockStore, RedisLockStore};
use kbk_bot::catalog::Catalog;
use kbk_bot::db::{create_pool, run_migrations};
use kbk_bot::observability::alerts::AlertTarget;
use kbk_bot::observability::ALERTS;
use kbk_bot::repository::{sync_catalog, PgSessionFactory, SessionFactory, UnitOfWork};
use std::sync::Arc;

mod bot;
mod config;

use crate::bot::{run_bot, App};
use crate::config::AppConfig;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn connect_lock_store(redis_url: Option<&str>) -> Arc<dyn LockStore> {
    match redis_url {
        Some(url) => match RedisLockStore::connect(url).await {
            Ok(store) => {
                tracing::info!("Admin lock backed by Redis");
                Arc::new(store)
            }
            Err(e) => {
                tracing::error!("Failed to connect to Redis, admin lock stays local: {}", e);
                Arc::new(MemoryLockStore::new(false))
            }
        },
        None => {
            tracing::warn!("REDIS_URL not set, admin lock is local to this process");
            Arc::new(MemoryLockStore::new(false))
        }
    }
}

fn sync_catalog_tables(sessions: &dyn SessionFactory, catalog: &Catalog) -> anyhow::Result<()> {
    let uow = sessions.begin()?;
    if let Err(e) = sync_catalog(uow.repository(), catalog) {
        if let Err(rollback) = uow.rollback() {
            tracing::error!("Rollback after catalog sync failed: {}", rollback);
        }
        return Err(e.into());
    }
    uow.commit()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().context("invalid configuration")?;

    if config.is_admin_logs_active() {
        if let Some(chat_id) = config.admin_chat_id {
            ALERTS.configure(AlertTarget {
                chat_id,
                min_level: config.admin_log_level,
            });
        }
    }

    let pool = Arc::new(create_pool(&config.database_url).context("failed to create pool")?);
    let applied = run_migrations(&pool)?;
    tracing::info!("Database ready, {} migrations applied", applied);

    let catalog = Catalog::load(config.catalog_path.as_deref())?;
    let sessions: Arc<dyn SessionFactory> = Arc::new(PgSessionFactory::new(pool));
    sync_catalog_tables(sessions.as_ref(), &catalog)?;

    let lock = connect_lock_store(config.redis_url.as_deref()).await;

    tracing::info!("{} admins configured", config.admin_ids.len());
    let app = Arc::new(App {
        sessions,
        lock,
        admins: config.admin_ids,
        catalog,
    });

    run_bot(config.bot_token, app).await;
    Ok(())
}
