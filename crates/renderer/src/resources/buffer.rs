use anyhow::Result;

use crate::api::{BufferHandle, BufferUsage, PendingRelease, ReleaseQueue, RendererApi};
use crate::command::RenderCommand;
use crate::types::BufferLayout;

/// Interleaved `f32` vertex data plus its attribute layout.
#[derive(Debug)]
pub struct VertexBuffer {
    handle: BufferHandle,
    layout: BufferLayout,
    len: usize,
    releases: ReleaseQueue,
}

impl VertexBuffer {
    pub fn new<B: RendererApi>(command: &mut RenderCommand<B>, vertices: &[f32]) -> Result<Self> {
        let handle = command
            .api_mut()
            .create_buffer(BufferUsage::Vertex, bytemuck::cast_slice(vertices))?;
        Ok(Self {
            handle,
            layout: BufferLayout::default(),
            len: vertices.len(),
            releases: command.releases().clone(),
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: BufferLayout) {
        self.layout = layout;
    }

    /// Number of `f32` values stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for VertexBuffer {
    fn drop(&mut self) {
        self.releases.push(PendingRelease::Buffer(self.handle));
    }
}

/// `u32` indices.
#[derive(Debug)]
pub struct IndexBuffer {
    handle: BufferHandle,
    count: u32,
    releases: ReleaseQueue,
}

impl IndexBuffer {
    pub fn new<B: RendererApi>(command: &mut RenderCommand<B>, indices: &[u32]) -> Result<Self> {
        let handle = command
            .api_mut()
            .create_buffer(BufferUsage::Index, bytemuck::cast_slice(indices))?;
        Ok(Self {
            handle,
            count: indices.len() as u32,
            releases: command.releases().clone(),
        })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Drop for IndexBuffer {
    fn drop(&mut self) {
        self.releases.push(PendingRelease::Buffer(self.handle));
    }
}
