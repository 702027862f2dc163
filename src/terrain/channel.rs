// src/terrain/channel.rs
// mpsc-backed terrain source for off-thread providers.
// RELEVANT FILES: src/terrain/source.rs, src/planet.rs

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

use super::source::{TerrainRequest, TerrainResponse, TerrainSource};

/// Terrain source bridged over std channels. The worker side receives
/// [`TerrainRequest`]s and sends [`TerrainResponse`]s back whenever it
/// finishes; the core drains them non-blocking at frame start. A worker
/// that hangs up mid-flight simply stops delivering; affected nodes stay
/// on inherited data, which is the required degradation.
pub struct ChannelTerrainSource {
    req_tx: Sender<TerrainRequest>,
    resp_rx: Receiver<TerrainResponse>,
}

impl ChannelTerrainSource {
    /// Returns the source plus the worker's end of both channels.
    pub fn new() -> (Self, Receiver<TerrainRequest>, Sender<TerrainResponse>) {
        let (req_tx, req_rx) = channel();
        let (resp_tx, resp_rx) = channel();
        (Self { req_tx, resp_rx }, req_rx, resp_tx)
    }
}

impl TerrainSource for ChannelTerrainSource {
    fn request(&mut self, req: TerrainRequest) {
        // a disconnected worker is treated as a permanently silent source
        let _ = self.req_tx.send(req);
    }

    fn poll_completed(&mut self) -> Vec<TerrainResponse> {
        let mut out = Vec::new();
        loop {
            match self.resp_rx.try_recv() {
                Ok(resp) => out.push(resp),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quadtree::NodeKey;
    use crate::terrain::{TerrainData, TileIndex};

    #[test]
    fn test_request_response_roundtrip() {
        let (mut source, req_rx, resp_tx) = ChannelTerrainSource::new();

        source.request(TerrainRequest {
            key: NodeKey::from_raw(7),
            node_id: 42,
            tile: TileIndex::new(1, 0, 0),
            grid_size: 2,
        });
        assert!(source.poll_completed().is_empty());

        // worker side
        let req = req_rx.try_recv().expect("request should arrive");
        resp_tx
            .send(TerrainResponse {
                key: req.key,
                node_id: req.node_id,
                tile: req.tile,
                data: Some(TerrainData {
                    vertices: vec![0.0; 27],
                    grid_size: 2,
                    normals: None,
                }),
            })
            .unwrap();

        let done = source.poll_completed();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].node_id, 42);
    }

    #[test]
    fn test_disconnected_worker_is_silent() {
        let (mut source, req_rx, resp_tx) = ChannelTerrainSource::new();
        drop(req_rx);
        drop(resp_tx);
        source.request(TerrainRequest {
            key: NodeKey::from_raw(0),
            node_id: 0,
            tile: TileIndex::new(0, 0, 0),
            grid_size: 1,
        });
        assert!(source.poll_completed().is_empty());
    }
}
