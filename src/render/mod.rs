//! GPU resource seam.
//!
//! The renderer backend is an external collaborator; the core only creates
//! and releases opaque handles through [`RenderBackend`]. [`NullBackend`]
//! is a counting no-op for tests and headless runs.

/// Opaque handle to a vertex coordinate buffer owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Opaque handle to a normal-map texture owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Opaque handle to an imagery-layer material slot. Materials belong to
/// the layer system; the core only drops them on branch cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u64);

/// What the core needs from the GPU side: coordinate buffers for segment
/// meshes and release of buffers/textures on destruction.
pub trait RenderBackend {
    /// Upload a `(grid_size + 1)^2 * 3` f32 coordinate array.
    fn create_coords_buffer(&mut self, vertices: &[f32], grid_size: u32) -> BufferHandle;

    fn delete_buffer(&mut self, handle: BufferHandle);

    fn delete_texture(&mut self, handle: TextureHandle);
}

/// Backend that allocates nothing and counts everything.
#[derive(Debug, Default)]
pub struct NullBackend {
    next_id: u64,
    pub buffers_created: usize,
    pub buffers_deleted: usize,
    pub textures_deleted: usize,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers_created - self.buffers_deleted
    }
}

impl RenderBackend for NullBackend {
    fn create_coords_buffer(&mut self, _vertices: &[f32], _grid_size: u32) -> BufferHandle {
        self.next_id += 1;
        self.buffers_created += 1;
        BufferHandle(self.next_id)
    }

    fn delete_buffer(&mut self, _handle: BufferHandle) {
        self.buffers_deleted += 1;
    }

    fn delete_texture(&mut self, _handle: TextureHandle) {
        self.textures_deleted += 1;
    }
}
