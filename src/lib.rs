pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod services;
pub mod state;

use anyhow::Context;
use std::path::Path;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub use cli::{Cli, Commands};
pub use config::Config;
use db::migrator::{DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME};
use db::{NewUser, Store};

/// Loads `.env`, then the config file (explicit path or search path), and validates it.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    // A missing .env is the common case.
    let _ = dotenvy::dotenv();

    let config = match path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    config.validate()?;

    Ok(config)
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.general.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.context("Failed to initialise tracing")
}

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    init_tracing(&config)?;

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    }) {
        Commands::Serve { host, port } => run_server(config, host, port).await,

        Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit config.toml and run again.");
            } else {
                println!("config.toml already exists, leaving it untouched.");
            }
            Ok(())
        }

        Commands::CreateUser {
            username,
            email,
            password,
            admin,
            staff,
        } => {
            cmd_create_user(
                &config,
                NewUser {
                    username,
                    email,
                    password,
                    is_admin: admin,
                    is_staff: staff,
                },
            )
            .await
        }
    }
}

async fn run_server(config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    info!(
        "Integration Hub v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let api_state = api::create_app_state_from_config(config).await?;

    if api_state
        .store()
        .verify_user_password(DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD)
        .await?
        .is_some()
    {
        warn!(
            "The bootstrap account '{}' still uses its default password. Change it before exposing the server.",
            DEFAULT_ADMIN_USERNAME
        );
    }

    let app = api::router(api_state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Web server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }
}

async fn cmd_create_user(config: &Config, new_user: NewUser) -> anyhow::Result<()> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let repo = store.user_repo();
    if let Some(existing) = repo
        .find_conflicting(&new_user.username, &new_user.email)
        .await?
    {
        anyhow::bail!(
            "A user with this username or email already exists (id {})",
            existing.user_id
        );
    }

    let user = repo.create(new_user, &config.security).await?;
    println!(
        "✓ Created user '{}' (id {}, admin: {}, staff: {})",
        user.username, user.user_id, user.is_admin, user.is_staff
    );

    Ok(())
}
