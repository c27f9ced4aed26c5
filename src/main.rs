//! Ticketd binary: wires the inventory engine, order service, ticket
//! worker, query projector and HTTP surface into one process.

use std::sync::Arc;

use axum::middleware;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ticketd::adapters::http::{
    health_routes, inventory_routes, middleware::request_context, order_routes, query_routes,
};
use ticketd::adapters::postgres::{
    PostgresOrderStore, PostgresOrderViewStore, PostgresOutboxStore, PostgresSnapshotStore,
    PostgresTicketStore, PostgresWalStore,
};
use ticketd::adapters::redis::{RedisHoldTtlStore, RedisStreamConsumer, RedisStreamProducer, RedisViewCache};
use ticketd::adapters::{HttpInventoryClient, MockSeatAllocator};
use ticketd::application::inventory::InventoryService;
use ticketd::application::order::OrderService;
use ticketd::application::query::QueryService;
use ticketd::application::ticket::TicketWorker;
use ticketd::application::OutboxPublisher;
use ticketd::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let pool = config.database.pool()?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let redis_conn = redis_client.get_multiplexed_tokio_connection().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Inventory engine: recovery, then WAL writer / snapshot / TTL loops.
    let producer = Arc::new(RedisStreamProducer::new(redis_conn.clone()));
    let inventory = InventoryService::new(
        config.inventory.engine_config(),
        Arc::new(PostgresWalStore::new(pool.clone())),
        Arc::new(PostgresSnapshotStore::new(pool.clone())),
        Arc::new(RedisHoldTtlStore::new(
            redis_conn.clone(),
            config.inventory.hold_ttl(),
        )),
        producer.clone(),
    );
    inventory.start(shutdown_rx.clone()).await?;

    // Order service with its outbox publisher.
    let order_store = Arc::new(PostgresOrderStore::new(pool.clone()));
    let inventory_client = Arc::new(HttpInventoryClient::new(
        config.order.inventory_base_url.clone(),
    )?);
    let order_service = Arc::new(OrderService::new(
        order_store,
        inventory_client,
        config.order.service_config(),
    ));
    let order_outbox = Arc::new(PostgresOutboxStore::order_outbox(pool.clone()));
    let order_publisher = OutboxPublisher::new(
        order_outbox,
        producer.clone(),
        config.streams.order_stream.clone(),
    );
    let publisher_shutdown = shutdown_rx.clone();
    tokio::spawn(async move { order_publisher.run(publisher_shutdown).await });

    // Ticket worker: consumes order events, publishes ticket events.
    let ticket_consumer = Arc::new(
        RedisStreamConsumer::new(
            redis_conn.clone(),
            config.streams.order_stream.clone(),
            config.streams.ticket_group.clone(),
            "ticket-worker-1",
        )
        .await?,
    );
    let ticket_worker = TicketWorker::new(
        ticket_consumer,
        Arc::new(MockSeatAllocator),
        Arc::new(PostgresTicketStore::new(pool.clone())),
    );
    let worker_shutdown = shutdown_rx.clone();
    tokio::spawn(async move { ticket_worker.run(worker_shutdown).await });

    let ticket_outbox = Arc::new(PostgresOutboxStore::ticket_outbox(pool.clone()));
    let ticket_publisher = OutboxPublisher::new(
        ticket_outbox,
        producer.clone(),
        config.streams.ticket_stream.clone(),
    );
    let publisher_shutdown = shutdown_rx.clone();
    tokio::spawn(async move { ticket_publisher.run(publisher_shutdown).await });

    // Query side: cold-start rebuild, then both projector loops.
    let query_service = Arc::new(QueryService::new(
        Arc::new(PostgresOrderViewStore::new(pool.clone())),
        Arc::new(RedisViewCache::new(redis_conn.clone())),
    ));
    let rebuilt = query_service.rebuild_cold_start().await?;
    tracing::info!(rebuilt, "query view cold-start rebuild finished");

    let order_events_consumer = Arc::new(
        RedisStreamConsumer::new(
            redis_conn.clone(),
            config.streams.order_stream.clone(),
            config.streams.query_group.clone(),
            "query-order-1",
        )
        .await?,
    );
    let projector = query_service.clone();
    let projector_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        projector
            .run_order_events(order_events_consumer, projector_shutdown)
            .await
    });

    let ticket_events_consumer = Arc::new(
        RedisStreamConsumer::new(
            redis_conn.clone(),
            config.streams.ticket_stream.clone(),
            config.streams.query_group.clone(),
            "query-ticket-1",
        )
        .await?,
    );
    let projector = query_service.clone();
    let projector_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        projector
            .run_ticket_events(ticket_events_consumer, projector_shutdown)
            .await
    });

    // HTTP surface.
    let app = health_routes()
        .nest("/inventory", inventory_routes(inventory.clone()))
        .merge(order_routes(order_service))
        .nest("/query", query_routes(query_service))
        .layer(middleware::from_fn(request_context))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "ticketd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}
