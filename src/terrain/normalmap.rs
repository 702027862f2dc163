// src/terrain/normalmap.rs
// Normal-map worker seam with idempotent enqueue.
// RELEVANT FILES: src/terrain/source.rs, src/quadtree/node.rs

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::quadtree::NodeKey;
use crate::render::TextureHandle;

/// Request to build a normal-map texture from a segment's working normals.
#[derive(Debug, Clone)]
pub struct NormalMapRequest {
    pub key: NodeKey,
    pub node_id: i64,
    /// Working normals at `file_grid_size` resolution, row-major.
    pub normals: Vec<f32>,
}

/// Finished normal-map texture for an earlier request.
#[derive(Debug, Clone)]
pub struct NormalMapResponse {
    pub key: NodeKey,
    pub node_id: i64,
    pub texture: TextureHandle,
}

/// The normal-map generation worker. The core guards `queue` with the
/// segment's in-queue flag, so implementations may assume each node is
/// enqueued at most once until its completion is ingested.
pub trait NormalMapCreator {
    fn queue(&mut self, req: NormalMapRequest);

    fn poll_completed(&mut self) -> Vec<NormalMapResponse>;
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<NormalMapRequest>,
    finished: Vec<NormalMapResponse>,
    next_texture: u64,
    queued_total: usize,
}

/// Shared-queue creator: requests wait until the worker side asks it to
/// finish a batch. Clones share one queue, so a host (or test) keeps a
/// handle while the planet owns the boxed seam.
#[derive(Debug, Clone, Default)]
pub struct QueueNormalMapCreator {
    state: Arc<Mutex<QueueState>>,
}

impl QueueNormalMapCreator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Total enqueues ever observed; the idempotence guard keeps this at
    /// one per node until its map is ingested.
    pub fn queued_total(&self) -> usize {
        self.state.lock().unwrap().queued_total
    }

    /// Resolve up to `n` queued requests into textures.
    pub fn complete(&mut self, n: usize) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..n {
            let Some(req) = state.pending.pop_front() else {
                break;
            };
            state.next_texture += 1;
            let texture = TextureHandle(state.next_texture);
            state.finished.push(NormalMapResponse {
                key: req.key,
                node_id: req.node_id,
                texture,
            });
        }
    }
}

impl NormalMapCreator for QueueNormalMapCreator {
    fn queue(&mut self, req: NormalMapRequest) {
        let mut state = self.state.lock().unwrap();
        state.queued_total += 1;
        state.pending.push_back(req);
    }

    fn poll_completed(&mut self) -> Vec<NormalMapResponse> {
        std::mem::take(&mut self.state.lock().unwrap().finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_completes_in_order() {
        let mut creator = QueueNormalMapCreator::new();
        for id in 0..3 {
            creator.queue(NormalMapRequest {
                key: NodeKey::from_raw(id as u32),
                node_id: id,
                normals: vec![],
            });
        }
        creator.complete(2);
        let done = creator.poll_completed();
        assert_eq!(done.len(), 2);
        assert_eq!(done[0].node_id, 0);
        assert_eq!(done[1].node_id, 1);
        assert_eq!(creator.pending_len(), 1);
    }

    #[test]
    fn test_clones_share_one_queue() {
        let mut creator = QueueNormalMapCreator::new();
        let mut handle = creator.clone();
        creator.queue(NormalMapRequest {
            key: NodeKey::from_raw(0),
            node_id: 7,
            normals: vec![],
        });
        handle.complete(1);
        let done = creator.poll_completed();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].node_id, 7);
    }
}
