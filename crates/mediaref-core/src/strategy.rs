//! Resolution strategy seam

use crate::media::{MediaItem, ResolutionResult};

/// One step of the resolution pipeline.
///
/// `candidates` are already filtered to the requested kind and sorted oldest
/// first. Returning `None` passes the request on to the next strategy.
pub trait ReferenceStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn resolve(&self, message: &str, candidates: &[MediaItem]) -> Option<ResolutionResult>;
}
