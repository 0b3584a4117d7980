use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use libris_app::Application;
use libris_kernel::{settings::Settings, ModuleRegistry};

/// Libris book catalogue service
#[derive(Debug, Parser)]
#[command(name = "libris", version, about)]
struct Cli {
    /// Directory holding base.toml and per-environment overlays
    #[arg(long, global = true, env = "LIBRIS_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Environment overlay to load (local, staging, production)
    #[arg(long = "env", global = true, env = "LIBRIS_ENV", default_value = "local")]
    environment: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Print the route table without touching the database
    Routes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Allow missing `.env` files; loaded first so clap sees LIBRIS_* values.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Routes => {
            print_routes();
            Ok(())
        }
        Command::Serve => {
            let settings = load_settings(&cli.config_dir, &cli.environment)?;
            Application::bootstrap(settings).await?.serve().await
        }
        Command::Migrate => {
            let mut settings = load_settings(&cli.config_dir, &cli.environment)?;
            settings.database.auto_migrate = false;

            let app = Application::bootstrap(settings).await?;
            let applied = app.migrate().await?;
            println!("applied {} migration(s)", applied);
            Ok(())
        }
    }
}

fn load_settings(config_dir: &std::path::Path, environment: &str) -> anyhow::Result<Settings> {
    let settings = Settings::load_from(config_dir, environment)
        .with_context(|| "failed to load Libris settings")?;

    libris_telemetry::init(&settings.telemetry)?;
    tracing::info!(env = ?settings.environment, db = %settings.database.url, "settings loaded");

    Ok(settings)
}

fn print_routes() {
    let mut registry = ModuleRegistry::new();
    libris_app::register_all(&mut registry);

    for route in libris_http::openapi::route_table(&registry) {
        println!("{:<7} {:<20} {}", route.method, route.path, route.summary);
    }
}
