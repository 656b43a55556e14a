use anyhow::Result;
use tracing::{debug, trace};

use crate::api::{PendingRelease, ReleaseQueue, RendererApi, TextureHandle};
use crate::resources::{Framebuffer, VertexArray};
use crate::types::{DepthFunction, PolygonOffset};

/// Front door to the active backend.
///
/// Owns the backend and the process-wide [`ReleaseQueue`]. Resource wrappers
/// are created through it and queue their device handles here when dropped;
/// [`RenderCommand::process_deletion_queue`] performs the actual deletions at a
/// frame boundary so nothing is released while a draw of the same frame may
/// still reference it.
pub struct RenderCommand<B: RendererApi> {
    api: B,
    releases: ReleaseQueue,
    polygon_offset: PolygonOffset,
    polygon_offset_enabled: bool,
}

impl<B: RendererApi> RenderCommand<B> {
    pub fn new(api: B) -> Self {
        Self {
            api,
            releases: ReleaseQueue::new(),
            polygon_offset: PolygonOffset {
                factor: 0.0,
                units: 0.0,
            },
            polygon_offset_enabled: false,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        debug!(backend = self.api.name(), "initialising render backend");
        self.api.init()
    }

    pub fn api(&self) -> &B {
        &self.api
    }

    pub fn api_mut(&mut self) -> &mut B {
        &mut self.api
    }

    pub fn releases(&self) -> &ReleaseQueue {
        &self.releases
    }

    pub fn queue_texture_for_deletion(&self, texture: TextureHandle) {
        self.releases.push(PendingRelease::Texture(texture));
    }

    /// Deletes every queued device object. Returns how many were released.
    pub fn process_deletion_queue(&mut self) -> usize {
        let pending = self.releases.drain();
        for release in &pending {
            trace!(?release, "releasing device object");
            match *release {
                PendingRelease::Buffer(buffer) => self.api.delete_buffer(buffer),
                PendingRelease::Texture(texture) => self.api.delete_texture(texture),
                PendingRelease::VertexArray(vertex_array) => {
                    self.api.delete_vertex_array(vertex_array)
                }
                PendingRelease::Framebuffer(framebuffer) => {
                    self.api.delete_framebuffer(framebuffer)
                }
                PendingRelease::Program(program) => self.api.delete_program(program),
            }
        }
        pending.len()
    }

    pub fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.api.set_viewport(x, y, width, height);
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.api.set_clear_color(color);
    }

    pub fn clear(&mut self) {
        self.api.clear();
    }

    pub fn clear_depth(&mut self) {
        self.api.clear_depth();
    }

    pub fn enable_depth_test(&mut self, enabled: bool) {
        self.api.set_depth_test(enabled);
    }

    pub fn enable_depth_mask(&mut self, enabled: bool) {
        self.api.set_depth_mask(enabled);
    }

    pub fn enable_cull_face(&mut self, enabled: bool) {
        self.api.set_cull_face(enabled);
    }

    pub fn set_depth_function(&mut self, function: DepthFunction) {
        self.api.set_depth_function(function);
    }

    pub fn enable_polygon_offset(&mut self) {
        self.polygon_offset_enabled = true;
        self.api.set_polygon_offset(Some(self.polygon_offset));
    }

    pub fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.polygon_offset = PolygonOffset { factor, units };
        if self.polygon_offset_enabled {
            self.api.set_polygon_offset(Some(self.polygon_offset));
        }
    }

    pub fn disable_polygon_offset(&mut self) {
        self.polygon_offset_enabled = false;
        self.api.set_polygon_offset(None);
    }

    pub fn draw_arrays(&mut self, vertex_array: &VertexArray, vertex_count: u32) {
        self.api.draw_arrays(vertex_array.handle(), vertex_count);
    }

    /// Draws `index_count` indices; `0` means the vertex array's full index buffer.
    pub fn draw_indexed(&mut self, vertex_array: &VertexArray, index_count: u32) {
        let count = if index_count == 0 {
            vertex_array.index_count()
        } else {
            index_count
        };
        if count == 0 {
            trace!("skipping indexed draw without indices");
            return;
        }
        self.api.draw_indexed(vertex_array.handle(), count);
    }

    pub fn dispatch_compute(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) {
        self.api.dispatch_compute(groups_x, groups_y, groups_z);
    }

    pub fn blit_to_swapchain(
        &mut self,
        framebuffer: &Framebuffer,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.api
            .blit_to_swapchain(framebuffer.handle(), width, height)
    }
}
