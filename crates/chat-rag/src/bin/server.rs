//! Chat RAG server binary
//!
//! Run with: cargo run -p chat-rag --bin chat-rag-server

use std::path::PathBuf;

use chat_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                        Chat RAG                           ║
║         Conversational answers with source documents      ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    // Load configuration
    let config_path = std::env::var("RAG_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("chat-rag.toml"));
    let config = RagConfig::load(Some(config_path.as_path()))?;
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - LLM: {:?} {}", config.llm.backend, config.llm.generate_model);
    tracing::info!(
        "  - Embeddings: {:?} {} ({} dims)",
        config.embeddings.backend,
        config.embeddings.model,
        config.embeddings.dimensions
    );
    tracing::info!("  - Index: {}", config.vector_db.index_host);
    tracing::info!("  - Top K: {}", config.retrieval.top_k);

    // Create server
    let server = RagServer::new(config)?;

    // Probe every backend; serving continues either way
    for backend in server.state().probe_backends().await {
        if backend.healthy {
            tracing::info!("{} ({}) is reachable", backend.role, backend.provider);
        } else {
            tracing::warn!(
                "{} ({}) is not reachable; requests will fail until it is up",
                backend.role,
                backend.provider
            );
        }
    }

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/chat  - Ask a question (Accept: text/event-stream to stream)");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
