use std::rc::Rc;

use anyhow::{bail, Result};

use crate::api::{PendingRelease, ReleaseQueue, RendererApi, VertexArrayHandle};
use crate::command::RenderCommand;

use super::buffer::{IndexBuffer, VertexBuffer};

/// Vertex input state: shared vertex buffers plus one owned index buffer.
#[derive(Debug)]
pub struct VertexArray {
    handle: VertexArrayHandle,
    vertex_buffers: Vec<Rc<VertexBuffer>>,
    index_buffer: Option<IndexBuffer>,
    releases: ReleaseQueue,
}

impl VertexArray {
    pub fn new<B: RendererApi>(command: &mut RenderCommand<B>) -> Result<Self> {
        let handle = command.api_mut().create_vertex_array()?;
        Ok(Self {
            handle,
            vertex_buffers: Vec::new(),
            index_buffer: None,
            releases: command.releases().clone(),
        })
    }

    pub fn handle(&self) -> VertexArrayHandle {
        self.handle
    }

    pub fn add_vertex_buffer<B: RendererApi>(
        &mut self,
        command: &mut RenderCommand<B>,
        buffer: Rc<VertexBuffer>,
    ) -> Result<()> {
        if buffer.layout().is_empty() {
            bail!("vertex buffer has no layout");
        }
        command
            .api_mut()
            .attach_vertex_buffer(self.handle, buffer.handle(), buffer.layout())?;
        self.vertex_buffers.push(buffer);
        Ok(())
    }

    pub fn set_index_buffer<B: RendererApi>(
        &mut self,
        command: &mut RenderCommand<B>,
        buffer: IndexBuffer,
    ) -> Result<()> {
        command
            .api_mut()
            .attach_index_buffer(self.handle, buffer.handle(), buffer.count())?;
        self.index_buffer = Some(buffer);
        Ok(())
    }

    pub fn vertex_buffers(&self) -> &[Rc<VertexBuffer>] {
        &self.vertex_buffers
    }

    pub fn index_buffer(&self) -> Option<&IndexBuffer> {
        self.index_buffer.as_ref()
    }

    /// Index count of the attached index buffer, `0` when there is none.
    pub fn index_count(&self) -> u32 {
        self.index_buffer.as_ref().map_or(0, IndexBuffer::count)
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        self.releases.push(PendingRelease::VertexArray(self.handle));
    }
}
