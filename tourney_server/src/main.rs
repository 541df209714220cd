//! Bracket tournament server.
//!
//! Spawns one TournamentActor per tournament, managed by TournamentManager,
//! on top of PostgreSQL when `DATABASE_URL` is set and an in-memory store
//! otherwise.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Error};
use pico_args::Arguments;
use tourney::{
    InMemoryStore, TournamentManager, TournamentStore,
    store::{Database, PgTournamentStore},
};
use tourney_server::{
    announcer, api,
    config::ServerConfig,
    logging,
    metrics,
};
use tracing::info;

const HELP: &str = "\
Run a bracket tournament server

USAGE:
  tourney_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url     URL         Database connection string  [default: env DATABASE_URL, in-memory store if unset]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  METRICS_BIND             Prometheus exporter address
  ORGANIZER_ROLES          Comma separated roles allowed to run organizer commands
  BATTLE_CHANNELS          Comma separated battle channel IDs
  REPLY_TIMEOUT_HOURS      Time to answer the opponent's post  [default: 24]
  VOTE_WINDOW_HOURS        Vote window length  [default: 24]
  REPLY_THRESHOLD          Posts before a match goes to a vote  [default: 6]
  TIE_BREAK                favor_player_one | favor_earlier_registrant | random
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;

    logging::init();

    let config = ServerConfig::from_env(bind, database_url)?;
    config.validate()?;
    info!("Starting tournament server at {}", config.bind);

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics exported on {}", addr);
    }

    let mut database = None;
    let store: Arc<dyn TournamentStore> = match &config.database {
        Some(db_config) => {
            let db = Database::new(db_config)
                .await
                .context("Failed to connect to database")?;
            let store = PgTournamentStore::new(&db);
            store
                .ensure_schema()
                .await
                .context("Failed to create database schema")?;
            info!("Database connected successfully");
            database = Some(db);
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, tournaments will not survive a restart");
            Arc::new(InMemoryStore::new())
        }
    };

    let manager = Arc::new(TournamentManager::new(store, config.engine.clone())?);
    let announcer = announcer::spawn(Arc::clone(&manager)).await;

    let resumed = manager.load_existing_tournaments().await?;
    info!("Resumed {} tournament(s)", resumed);

    let current = manager
        .ensure_current(
            &config.default_tournament.name,
            config.default_tournament.max_participants,
        )
        .await?;
    info!("Current tournament: {}", current);

    match manager.list_tournaments().await {
        Ok(tournaments) => {
            for t in tournaments {
                info!(
                    "  - {} (ID: {}) - {}, {} participant(s)",
                    t.name, t.id, t.status, t.participant_count
                );
            }
        }
        Err(e) => {
            tracing::error!("Failed to list tournaments: {}", e);
        }
    }

    let app = api::create_router(api::AppState {
        manager: Arc::clone(&manager),
        organizer_routes: config.organizer_routes,
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");
    manager.shutdown().await;
    announcer.abort();
    if let Some(db) = database {
        db.close().await;
        info!("Database pool closed");
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
