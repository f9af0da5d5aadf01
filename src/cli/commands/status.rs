use anyhow::Result;
use tracing::debug;

use crate::cli::output::{IndexState, StatusInfo, get_formatter};
use crate::client::DaemonClient;
use crate::error::VectorStoreError;
use crate::models::{Config, OutputFormat};
use crate::services::{VectorStore, registry};
use crate::sources::load_corpus;

pub async fn handle_status(format: OutputFormat) -> Result<()> {
    let config = Config::load()?.config;
    let formatter = get_formatter(format);

    let client = DaemonClient::new(&config);
    let daemon = if client.is_running() {
        client.status().await.ok()
    } else {
        None
    };

    let mut status = StatusInfo {
        daemon_running: daemon.is_some(),
        daemon_pid: daemon.as_ref().map(|d| d.pid),
        daemon_idle_secs: daemon.as_ref().map(|d| d.idle_secs),
        embedding_model: daemon
            .map(|d| d.embedding_model)
            .unwrap_or_else(|| config.embedding.model_id.clone()),
        store_driver: config.vector_store.driver.to_string(),
        store_path: None,
        store_error: None,
        collection: config.vector_store.collection.clone(),
        records: 0,
        dimension: None,
        index_state: IndexState::Empty,
    };

    match registry::store(&config.vector_store) {
        Ok(store) => {
            let store = store.read().await;
            if let Err(e) = fill_store_status(&mut status, &**store, &config) {
                status.store_error = Some(e.to_string());
            }
        }
        Err(e) => status.store_error = Some(e.to_string()),
    }

    print!("{}", formatter.format_status(&status));

    if format == OutputFormat::Text {
        if !status.daemon_running {
            eprintln!();
            eprintln!(
                "Hint: embedding daemon not running. It starts automatically on first search/index."
            );
            eprintln!("      Or start manually with: csearch serve");
        }
        if matches!(
            status.index_state,
            IndexState::Empty | IndexState::Stale | IndexState::Incomplete
        ) {
            eprintln!("Hint: rebuild the index with: csearch index build");
        }
    }

    Ok(())
}

fn fill_store_status(
    status: &mut StatusInfo,
    store: &dyn VectorStore,
    config: &Config,
) -> Result<(), VectorStoreError> {
    status.store_path = store.location();
    status.records = store.count()?;
    status.dimension = store.dimension()?;

    let stored = store.fingerprint()?;
    status.index_state = if status.records == 0 {
        IndexState::Empty
    } else {
        match (stored, load_corpus(&config.corpus, None)) {
            (None, _) => IndexState::Incomplete,
            (Some(_), Err(e)) => {
                debug!(error = %e, "corpus unavailable for status check");
                IndexState::Unknown
            }
            (Some(stored), Ok(corpus)) if stored == corpus.fingerprint() => IndexState::Current,
            (Some(_), Ok(_)) => IndexState::Stale,
        }
    };
    Ok(())
}
