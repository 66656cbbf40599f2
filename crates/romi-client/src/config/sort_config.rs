use romi_events::BlockPos;
use serde::{Deserialize, Serialize};

/// The source and destination containers the sort pipeline works between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortRegion {
    pub from: BlockPos,
    pub to: BlockPos,
}

impl Default for SortRegion {
    fn default() -> Self {
        Self {
            from: BlockPos::new(0, 64, 0),
            to: BlockPos::new(0, 64, 0),
        }
    }
}

/// Sort pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Time between sort runs (default: 60000)
    pub interval_ms: u64,
    /// Give up on reaching a container after this long (default: 60000)
    pub navigation_timeout_ms: u64,
    pub region: SortRegion,
    /// Item kind dropped on the ground
    pub discard_item: String,
    /// Item kind carried to the destination container
    pub transfer_item: String,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            navigation_timeout_ms: 60_000,
            region: SortRegion::default(),
            discard_item: "arrow".to_string(),
            transfer_item: "bone".to_string(),
        }
    }
}
