//! CLI command implementations: index, watch, serve.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scopegraph_ai::providers::create_provider;
use scopegraph_ai::rerank::{LlmReranker, RerankConfig};
use scopegraph_core::{EnvConfig, ProjectConfig};
use scopegraph_indexer::ingest::run_incremental;
use scopegraph_indexer::store::{IngestionExecutor, StoreConfig};
use scopegraph_query::router::create_router;
use scopegraph_query::ServerState;
use scopegraph_watcher::watcher::{run_watch_loop, FileWatcher};

pub async fn index(root: PathBuf, config_path: PathBuf) -> anyhow::Result<()> {
    let config = ProjectConfig::load(&config_path)?;

    let store_config = StoreConfig::from_env()?;
    let executor = IngestionExecutor::connect(&store_config).await?;
    executor.bootstrap_schema().await?;

    let outcome = run_incremental(&root, &config.source.include, &config.source.exclude, &executor).await?;
    tracing::info!(
        files_parsed = outcome.stats.files_parsed,
        files_failed = outcome.stats.files_failed,
        scopes = outcome.stats.scopes_assembled,
        edges = outcome.stats.edges_assembled,
        "parsed project"
    );
    tracing::info!(
        created = outcome.counts.created,
        updated = outcome.counts.updated,
        unchanged = outcome.counts.unchanged,
        deleted = outcome.counts.deleted,
        nodes_written = outcome.report.nodes_written,
        edges_written = outcome.report.edges_written,
        partial = outcome.report.partial,
        "ingestion complete"
    );

    Ok(())
}

pub async fn watch(root: PathBuf, config_path: PathBuf) -> anyhow::Result<()> {
    let config = ProjectConfig::load(&config_path)?;
    index(root.clone(), config_path).await?;

    let watcher = FileWatcher::new(&root)?;
    run_watch_loop(watcher, config.source.include, config.source.exclude, Duration::from_millis(500)).await
}

pub async fn serve(_root: PathBuf, config_path: PathBuf, host: String, port: u16) -> anyhow::Result<()> {
    let config = ProjectConfig::load(&config_path)?;
    let env = EnvConfig::load()?;

    let mut builder = neo4rs::ConfigBuilder::default().uri(&env.neo4j_uri).user(&env.neo4j_username).password(&env.neo4j_password);
    if let Some(db) = &env.neo4j_database {
        builder = builder.db(db.as_str());
    }
    let neo4j_config = builder.build().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let graph = neo4rs::Graph::connect(neo4j_config).await?;

    let reranker = match &config.summarization_llm {
        Some(provider_name) => {
            let provider = create_provider(provider_name, None)?;
            Some(Arc::new(LlmReranker::new(provider.into(), RerankConfig::default())))
        }
        None => None,
    };

    let state = Arc::new(ServerState::new(graph, config, None, reranker));
    let router = create_router(state);

    let addr = format!("{host}:{port}");
    tracing::info!(%addr, "query operations server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
