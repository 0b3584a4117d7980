use anyhow::Context;
use axum::Router;
use sqlx::SqlitePool;

use libris_http::AppInfo;
use libris_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

pub const APP_INFO: AppInfo = AppInfo {
    name: "Libris",
    version: env!("CARGO_PKG_VERSION"),
};

/// A bootstrapped application: settings, open pool, initialized modules.
pub struct Application {
    settings: Settings,
    pool: SqlitePool,
    registry: ModuleRegistry,
}

impl Application {
    /// Connect to the store, register modules, apply migrations when
    /// `database.auto_migrate` is set, then initialize every module.
    pub async fn bootstrap(settings: Settings) -> anyhow::Result<Self> {
        let pool = libris_db::connect(&settings.database)
            .await
            .context("failed to open database")?;

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry);

        let app = Self {
            settings,
            pool,
            registry,
        };

        if app.settings.database.auto_migrate {
            app.migrate().await?;
        }

        app.registry.init_all(&app.ctx()).await?;

        Ok(app)
    }

    /// Apply pending module migrations; returns how many ran.
    pub async fn migrate(&self) -> anyhow::Result<usize> {
        let applied = libris_db::migrate(&self.pool, &self.registry.collect_migrations())
            .await
            .context("failed to apply migrations")?;

        tracing::info!(applied, "migrations complete");
        Ok(applied)
    }

    /// The fully layered HTTP router.
    pub fn router(&self) -> Router {
        libris_http::build_router(&self.registry, &self.ctx(), APP_INFO)
    }

    /// Start modules, serve until shutdown, then stop modules and close
    /// the pool.
    pub async fn serve(self) -> anyhow::Result<()> {
        self.registry.start_all(&self.ctx()).await?;

        let served = libris_http::start_server(self.router(), &self.settings.server).await;

        self.registry.stop_all().await?;
        self.pool.close().await;

        served
    }

    fn ctx(&self) -> InitCtx<'_> {
        InitCtx {
            settings: &self.settings,
            pool: &self.pool,
        }
    }
}
