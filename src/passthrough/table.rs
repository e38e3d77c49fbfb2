//! Hostname → backend address table for passthrough routing.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::model::L4Mapping;

/// Shared routing table. Readers never block; updates replace the whole map.
#[derive(Debug, Clone, Default)]
pub struct PassthroughTable {
    routes: Arc<ArcSwap<HashMap<String, String>>>,
}

impl PassthroughTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every route with `mappings`.
    pub fn replace<'a, I>(&self, mappings: I)
    where
        I: IntoIterator<Item = &'a L4Mapping>,
    {
        let routes: HashMap<String, String> = mappings
            .into_iter()
            .map(|m| (normalise(&m.hostname), m.backend_address.clone()))
            .collect();
        tracing::debug!(routes = routes.len(), "Passthrough table replaced");
        self.routes.store(Arc::new(routes));
    }

    /// Backend address for `hostname`. Exact match, case-insensitive.
    pub fn lookup(&self, hostname: &str) -> Option<String> {
        self.routes.load().get(&normalise(hostname)).cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalise(hostname: &str) -> String {
    hostname.trim_end_matches('.').to_ascii_lowercase()
}
