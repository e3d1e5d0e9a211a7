//! Telemetry reported by storage servers.

use crate::quota::{ServerId, Tag};

/// One busiest-tag entry in a storage server report: the cost rate a tag is
/// currently imposing on that server for one operation type.
#[derive(Debug, Clone)]
pub struct TagCostReport {
    /// The reporting tag.
    pub tag: Tag,
    /// Cost rate in cost units per second.
    pub rate: f64,
    /// Fraction of the server's busyness attributed to the tag. Carried on
    /// the wire but not consumed by the throttling controller.
    pub fractional_busyness: f64,
}

impl TagCostReport {
    /// Create a report with no busyness attribution.
    #[must_use]
    pub fn new(tag: Tag, rate: f64) -> Self {
        Self {
            tag,
            rate,
            fractional_busyness: 0.0,
        }
    }
}

/// Periodic per-storage-server telemetry: the tags imposing the most read and
/// write cost on the server.
#[derive(Debug, Clone)]
pub struct StorageQueueInfo {
    /// Identity of the reporting server.
    pub server_id: ServerId,
    /// Busiest tags by read cost rate.
    pub busiest_read_tags: Vec<TagCostReport>,
    /// Busiest tags by write cost rate.
    pub busiest_write_tags: Vec<TagCostReport>,
}

impl StorageQueueInfo {
    /// An empty report for the given server.
    #[must_use]
    pub fn new(server_id: ServerId) -> Self {
        Self {
            server_id,
            busiest_read_tags: Vec::new(),
            busiest_write_tags: Vec::new(),
        }
    }
}
