//! Overlay Snapshot Feed
//!
//! The rendering collaborator never touches engine internals; it consumes
//! immutable snapshots of the current blocks. Snapshots flow through a
//! channel for push-style consumers and a latest-value store for pull-style
//! ones.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::blocks::{BlockColor, BlockId, BlockState, Orientation, Rect};
use crate::capture::CaptureRegion;

/// Read-only view of one tracked block
#[derive(Debug, Clone)]
pub struct BlockSnapshot {
    pub id: BlockId,
    pub rect: Rect,
    pub orientation: Orientation,
    pub text: String,
    /// Translated text, once a result for the current generation applied
    pub translation: Option<String>,
    pub color: BlockColor,
    pub state: BlockState,
}

/// Read-only view of one tracked region
#[derive(Debug, Clone)]
pub struct RegionSnapshot {
    pub region_id: Uuid,
    pub region: CaptureRegion,
    pub blocks: Vec<BlockSnapshot>,
}

/// Publishes region snapshots to the rendering collaborator
#[derive(Clone)]
pub struct SnapshotPublisher {
    sender: Sender<RegionSnapshot>,
    latest: Arc<RwLock<HashMap<Uuid, RegionSnapshot>>>,
}

impl SnapshotPublisher {
    /// Create a publisher and the receiving end of its feed
    pub fn new() -> (Self, Receiver<RegionSnapshot>) {
        let (sender, receiver) = unbounded();
        (
            Self {
                sender,
                latest: Arc::new(RwLock::new(HashMap::new())),
            },
            receiver,
        )
    }

    /// Publish a snapshot; keeps the latest per region even when no
    /// consumer drains the channel
    pub fn publish(&self, snapshot: RegionSnapshot) {
        self.latest
            .write()
            .insert(snapshot.region_id, snapshot.clone());
        let _ = self.sender.send(snapshot);
    }

    /// Latest snapshot for one region
    pub fn latest(&self, region_id: Uuid) -> Option<RegionSnapshot> {
        self.latest.read().get(&region_id).cloned()
    }

    /// Latest snapshot of every region
    pub fn latest_all(&self) -> Vec<RegionSnapshot> {
        let mut all: Vec<RegionSnapshot> = self.latest.read().values().cloned().collect();
        all.sort_by_key(|s| s.region_id);
        all
    }
}
