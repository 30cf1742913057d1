use crate::config::PreviewConfig;
use crate::error::Result;
use crate::eval::cache::{hash_request, CachedPreview, HeightmapCache};
use crate::eval::{
    evaluate_heightmap_with, CancelToken, Connection, EvalGraph, EvalOptions, GraphIssue,
    GraphNode, GridDims, Heightmap,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    /// Graph snapshot as held by the editor.
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Grid size; configured defaults apply when absent. Signed so that a
    /// negative size is reported rather than failing to parse.
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub seed: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    /// `None` when the graph has no output node.
    pub heightmap: Option<Arc<Heightmap>>,
    /// Anomalies absorbed evaluating this graph, replayed on cache hits.
    pub issues: Vec<GraphIssue>,
    pub cached: bool,
}

/// Evaluates preview requests, memoizing whole results across calls.
pub struct PreviewService {
    config: PreviewConfig,
    cache: HeightmapCache,
}

impl PreviewService {
    pub fn new(config: PreviewConfig) -> Self {
        let cache = HeightmapCache::new(config.cache_capacity);
        Self { config, cache }
    }

    pub fn cache(&self) -> &HeightmapCache {
        &self.cache
    }

    /// Evaluate a parsed request.
    pub fn evaluate(&self, request: PreviewRequest) -> Result<PreviewResponse> {
        self.evaluate_cancellable(request, CancelToken::new())
    }

    /// Evaluate a request that the caller may abandon via `cancel`.
    pub fn evaluate_cancellable(
        &self,
        request: PreviewRequest,
        cancel: CancelToken,
    ) -> Result<PreviewResponse> {
        let dims = GridDims::new(
            request.width.unwrap_or(self.config.width as i64),
            request.height.unwrap_or(self.config.height as i64),
        )?;
        let seed = request.seed.unwrap_or(self.config.seed);

        let key = hash_request(&request.nodes, &request.connections, dims, seed);
        if let Some(hit) = self.cache.get(key) {
            info!(key, "preview cache hit");
            return Ok(PreviewResponse {
                heightmap: hit.heightmap,
                issues: hit.issues.to_vec(),
                cached: true,
            });
        }

        let graph = EvalGraph::from_raw(request.nodes, request.connections);
        let options = EvalOptions::default()
            .with_strategy(self.config.strategy)
            .with_cancel(cancel);
        let evaluation = evaluate_heightmap_with(&graph, dims, seed, &options)?;

        let (heightmap, issues) = match evaluation {
            Some(eval) => (Some(Arc::new(eval.heightmap)), eval.report.issues),
            None => (None, Vec::new()),
        };
        info!(
            nodes = graph.node_count(),
            connections = graph.connection_count,
            width = dims.width,
            height = dims.height,
            has_output = heightmap.is_some(),
            issues = issues.len(),
            "preview evaluated"
        );

        self.cache.put(
            key,
            CachedPreview {
                heightmap: heightmap.clone(),
                issues: Arc::from(issues.as_slice()),
            },
        );
        Ok(PreviewResponse {
            heightmap,
            issues,
            cached: false,
        })
    }

    /// Full JSON round trip: parse a request, evaluate, serialize the response.
    pub fn evaluate_json(&self, request_json: &str) -> Result<String> {
        let request: PreviewRequest = serde_json::from_str(request_json)?;
        let response = self.evaluate(request)?;
        Ok(serde_json::to_string(&response)?)
    }
}

impl Default for PreviewService {
    fn default() -> Self {
        Self::new(PreviewConfig::default())
    }
}
