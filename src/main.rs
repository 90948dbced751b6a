use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use todo_backend::config::StoreConfig;
use todo_backend::context::StoreContext;
use todo_backend::domain::todo::{TodoProps, TodoService};
use todo_backend::metrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,todo_backend=debug"))
        )
        .init();

    tracing::info!("Starting Todo backend");

    // === 1. Build the store context (no I/O yet) ===
    let config = StoreConfig::from_env()?;
    tracing::info!(
        mode = ?config.mode,
        keyspace = %config.database,
        table = %config.collection,
        cache_mb = config.cache_mb,
        "Store configured"
    );
    let context = StoreContext::new(config)?;

    // === 2. Connect once; resolvers share the gateway and cache ===
    context.connect().await?;

    // === 3. Metrics HTTP server in background thread ===
    let registry = context.metrics().registry().clone();
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Metrics runtime error: {}", e);
                return;
            }
        };
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(registry, 9090).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 4. Todo lifecycle for one client ===
    let todos = TodoService::new(TodoService::resolver(&context));
    let client_id = Uuid::new_v4();

    let milk = todos
        .create(client_id, TodoProps { order: 1, title: "Buy milk".to_string(), completed: false })
        .await?;
    let walk = todos
        .create(client_id, TodoProps { order: 2, title: "Walk the dog".to_string(), completed: false })
        .await?;
    tracing::info!(client_id = %client_id, ids = ?[milk.id, walk.id], "Todos created");

    if let Some(done) = todos
        .patch(client_id, milk.id, TodoProps { completed: true, ..milk.props() })
        .await?
    {
        tracing::info!(id = done.id, completed = done.completed, "Todo updated");
    }

    todos.delete(client_id, walk.id).await?;
    let remaining = todos.list(client_id).await?;
    tracing::info!(count = remaining.len(), "Todos after delete");

    todos.clear(client_id).await?;
    tracing::info!(count = todos.list(client_id).await?.len(), "Todos after clear");

    tracing::info!("Demo complete");
    Ok(())
}
