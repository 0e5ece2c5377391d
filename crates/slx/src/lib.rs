//! 🚰 slx — sluicex — streaming NDJSON → document-store bulk ingestion.
//!
//! One line in, one (or several, if chunking) documents out, over HTTP, at
//! whatever concurrency the cluster can take, with watermark backpressure so
//! a forty-gigabyte file costs megabytes of RAM instead of a eulogy.
//!
//! The shape of the thing:
//!
//!   source → builder (split + identity) → batcher → queue → store
//!                                                      ↘ tracker
//!
//! The reader lives behind a gate the queue controls. Everything else is
//! commentary. 🦆

pub mod app_config;

mod backpressure;
mod batcher;
mod builder;
mod common;
mod pipeline;
mod progress;
mod queue;
mod sources;
mod splitter;
mod store;
mod tracker;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::sources::SourceBackend;
use crate::sources::file_source::FileSource;
use crate::store::StoreClient;
use crate::tracker::ResultTracker;

/// 🚀 Run one complete ingest from a validated [`app_config::AppConfig`].
///
/// Pings the cluster BEFORE reading a single line — if the URL is wrong or
/// the credentials are stale, we want to hear about it now, not 50,000
/// documents from now.
pub async fn run(config: app_config::AppConfig) -> Result<()> {
    config.validate()?;

    let store = StoreClient::new(&config)
        .context("💀 Could not build the HTTP client for the document store")?;
    store.ping().await?;
    info!(cluster = %config.cluster, index = %config.index, "📡 cluster is reachable — starting ingest");

    let source = SourceBackend::File(
        FileSource::new(std::path::Path::new(&config.file))
            .await
            .context("💀 Could not open the input file")?,
    );
    let tracker = Arc::new(ResultTracker::new(&config).await?);

    pipeline::run_pipeline(&config, source, store, tracker).await
}
