//! Application state shared across handlers

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::PipelineError;
use crate::models::GatewaySnapshot;
use crate::services::pipeline::{Pipeline, TracingProgress};

/// Shared application state: the pipeline plus the latest snapshot it
/// produced. The snapshot is replaced wholesale on refresh, never
/// mutated in place.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    snapshot: Arc<RwLock<Option<GatewaySnapshot>>>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            snapshot: Arc::new(RwLock::new(None)),
        }
    }

    /// Run the pipeline and publish the resulting snapshot.
    pub async fn refresh(&self) -> Result<GatewaySnapshot, PipelineError> {
        let gateways = self.pipeline.run(&TracingProgress).await?;
        let snapshot = GatewaySnapshot::new(gateways);
        let mut guard = self.snapshot.write().await;
        *guard = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Latest snapshot, triggering a pipeline run when none exists yet.
    pub async fn snapshot_or_refresh(&self) -> Result<GatewaySnapshot, PipelineError> {
        if let Some(snapshot) = self.snapshot.read().await.clone() {
            return Ok(snapshot);
        }
        self.refresh().await
    }
}
