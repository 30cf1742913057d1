// eval/cache.rs — LRU heightmap cache with deterministic graph hashing
//
// Caches finished heightmaps keyed by a hash of the complete graph snapshot
// plus the grid size and seed. Thread-safe via Mutex.
//
// Results are stored behind `Arc` so cache hits return a cheap reference
// count bump instead of cloning a multi-MB `Vec<f32>`.
//
// This is whole-snapshot memoization across calls: any change to any node
// or connection produces a different key. Nothing here tracks which parts
// of a graph changed.

use crate::eval::diagnostics::GraphIssue;
use crate::eval::graph::{Connection, GraphNode};
use crate::eval::grid::{GridDims, Heightmap};
use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One cached evaluation. `heightmap` is `None` for graphs without an
/// output node, so repeated previews of an unfinished graph are also hits.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPreview {
    pub heightmap: Option<Arc<Heightmap>>,
    /// Anomalies absorbed when the entry was computed.
    pub issues: Arc<[GraphIssue]>,
}

/// Content-addressable cache for evaluation results.
/// Key = hash(graph + dims + seed), Value = CachedPreview.
pub struct HeightmapCache {
    entries: Mutex<LruCache<u64, CachedPreview>>,
}

impl HeightmapCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    // A panic while holding the lock cannot leave the LRU half-updated in a
    // way that matters to readers, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, LruCache<u64, CachedPreview>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a cached result, `None` on a miss.
    pub fn get(&self, key: u64) -> Option<CachedPreview> {
        self.lock().get(&key).cloned()
    }

    /// Insert a result (or the absence of one) under `key`.
    pub fn put(&self, key: u64, entry: CachedPreview) {
        self.lock().put(key, entry);
    }

    /// Clear all cached entries (useful when the user explicitly invalidates).
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Graph hashing ──────────────────────────────────────────────────

/// Hash the graph snapshot + evaluation parameters deterministically.
/// Same graph + params = same hash.
///
/// Node order and connection order are part of the key: both decide which
/// output node and which duplicate connection win.
pub fn hash_request(
    nodes: &[GraphNode],
    connections: &[Connection],
    dims: GridDims,
    seed: i32,
) -> u64 {
    let mut hasher = DefaultHasher::new();

    hash_graph(&mut hasher, nodes, connections);

    dims.width.hash(&mut hasher);
    dims.height.hash(&mut hasher);
    seed.hash(&mut hasher);

    hasher.finish()
}

/// Hash the parts of the graph that affect evaluation.
///
/// Params are hashed in key order so map iteration order doesn't matter.
/// Titles, positions and output ports are ignored: the evaluator never
/// reads them.
fn hash_graph(hasher: &mut DefaultHasher, nodes: &[GraphNode], connections: &[Connection]) {
    nodes.len().hash(hasher);
    for node in nodes {
        node.id.hash(hasher);
        node.node_type.hash(hasher);

        let mut keys: Vec<&String> = node.params.keys().collect();
        keys.sort();
        keys.len().hash(hasher);
        for key in keys {
            key.hash(hasher);
            node.params[key].to_bits().hash(hasher);
        }

        node.inputs.len().hash(hasher);
        for port in &node.inputs {
            port.id.hash(hasher);
        }
    }

    connections.len().hash(hasher);
    for conn in connections {
        conn.from.node_id.hash(hasher);
        conn.to.hash(hasher);
    }
}
