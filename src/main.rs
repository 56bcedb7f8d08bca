//! Chat server binary.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use freelance_chat::adapters::auth::JwtSessionValidator;
use freelance_chat::adapters::broadcast::{
    run_relay, subscribe_channel, LocalBroadcastBus, RedisBroadcastBus, RelayBackoff,
};
use freelance_chat::adapters::http::{app_router, AppState, ChatAppState};
use freelance_chat::adapters::postgres::{PostgresChatReader, PostgresChatRepository};
use freelance_chat::adapters::websocket::{RealtimeState, RoomManager};
use freelance_chat::config::AppConfig;
use freelance_chat::ports::{BroadcastBus, SessionValidator};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const MIGRATIONS_PATH: &str = "./migrations";

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        bus = ?config.realtime.bus,
        "Starting chat server"
    );

    let pool = config.database.pool_options().connect(&config.database.url).await?;
    if config.database.run_migrations {
        let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(MIGRATIONS_PATH)).await?;
        migrator.run(&pool).await?;
        tracing::info!("Migrations applied");
    }

    let rooms = Arc::new(RoomManager::with_capacity(
        config.realtime.connection_queue_capacity,
    ));
    let bus = build_bus(&config, rooms.clone()).await?;
    let validator: Arc<dyn SessionValidator> = Arc::new(JwtSessionValidator::new(
        &config.auth.jwt_secret,
        config.auth.leeway_secs,
    ));

    let state = AppState {
        chat: ChatAppState {
            chat_reader: Arc::new(PostgresChatReader::new(pool.clone())),
        },
        realtime: RealtimeState::new(
            rooms,
            bus,
            validator.clone(),
            Arc::new(PostgresChatRepository::new(pool)),
        ),
        auth: validator,
    };
    let app = app_router(state, &config.server.cors_origins_list());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn build_bus(
    config: &AppConfig,
    rooms: Arc<RoomManager>,
) -> Result<Arc<dyn BroadcastBus>, BoxError> {
    if !config.realtime.uses_redis() {
        return Ok(Arc::new(LocalBroadcastBus::new(rooms)));
    }

    let client = redis::Client::open(config.redis.url.as_str())?;
    let bus = RedisBroadcastBus::connect(
        &client,
        config.realtime.channel.clone(),
        rooms.clone(),
        config.redis.timeout(),
    )
    .await?;

    // Subscribe before serving so no publish from this process is missed.
    let channel = config.realtime.channel.clone();
    let timeout = config.redis.timeout();
    let initial = subscribe_channel(&client, &channel, timeout).await?;
    tracing::info!(channel = %channel, "Broadcast relay subscribed");

    let backoff = RelayBackoff::new(
        config.realtime.relay_backoff_min(),
        config.realtime.relay_backoff_max(),
    );
    let resubscribe = move || {
        let client = client.clone();
        let channel = channel.clone();
        async move { subscribe_channel(&client, &channel, timeout).await }
    };
    tokio::spawn(run_relay(rooms, initial, resubscribe, backoff));

    Ok(Arc::new(bus))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
