//! Depth bookkeeping for one conversion run.

use crate::error::{Error, Result};
use log::debug;
use std::collections::HashMap;

/// Identifier of the container that holds the original post.
pub const ROOT_ID: &str = "siteTable";
/// The root sits one level above the original post (-1); top-level replies are 0.
pub const ROOT_DEPTH: i64 = -2;

/// Reports how far a message sits from the thread root. Used only for
/// ancestors whose own parent linkage is unavailable (deleted messages).
pub trait DistanceLookup {
    fn lookup_distance(&self, id: &str) -> Result<i64>;
}

/// Maps node identifiers to nesting depth. Only ever grows.
pub struct HierarchyResolver<'a> {
    levels: HashMap<String, i64>,
    lookup: &'a dyn DistanceLookup,
}

impl<'a> HierarchyResolver<'a> {
    pub fn new(lookup: &'a dyn DistanceLookup) -> Self {
        let mut levels = HashMap::new();
        levels.insert(ROOT_ID.to_string(), ROOT_DEPTH);
        Self { levels, lookup }
    }

    pub fn get(&self, id: &str) -> Option<i64> {
        self.levels.get(id).copied()
    }

    pub fn record(&mut self, id: &str, depth: i64) {
        self.levels.insert(id.to_string(), depth);
    }

    /// Depth of `id`, asking the lookup when it has not been seen.
    pub fn depth_of(&mut self, id: &str) -> Result<i64> {
        match self.get(id) {
            Some(depth) => Ok(depth),
            None => self.resolve_deleted(id),
        }
    }

    /// Record the externally reported distance of `id` as its depth. A second
    /// call for the same id returns the cached value without a lookup.
    pub fn resolve_deleted(&mut self, id: &str) -> Result<i64> {
        if let Some(depth) = self.get(id) {
            return Ok(depth);
        }
        let depth = self
            .lookup
            .lookup_distance(id)
            .map_err(|source| Error::UnresolvedAncestor {
                id: id.to_string(),
                source: Box::new(source),
            })?;
        debug!("resolved deleted ancestor {id} at depth {depth}");
        self.record(id, depth);
        Ok(depth)
    }
}
