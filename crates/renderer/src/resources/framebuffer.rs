use anyhow::Result;
use tracing::{debug, error, warn};

use crate::api::{
    FramebufferAttachments, FramebufferHandle, PendingRelease, ReleaseQueue, RendererApi,
};
use crate::command::RenderCommand;
use crate::error::ResourceError;
use crate::types::FramebufferSpecification;

use super::texture::Texture2D;

/// Offscreen render target with a color and an optional depth attachment.
#[derive(Debug)]
pub struct Framebuffer {
    handle: FramebufferHandle,
    spec: FramebufferSpecification,
    color: Texture2D,
    depth: Option<Texture2D>,
    releases: ReleaseQueue,
}

impl Framebuffer {
    pub fn new<B: RendererApi>(
        command: &mut RenderCommand<B>,
        spec: FramebufferSpecification,
    ) -> Result<Self> {
        let (handle, color, depth) = Self::build(command, &spec)?;
        Ok(Self {
            handle,
            spec,
            color,
            depth,
            releases: command.releases().clone(),
        })
    }

    fn build<B: RendererApi>(
        command: &mut RenderCommand<B>,
        spec: &FramebufferSpecification,
    ) -> Result<(FramebufferHandle, Texture2D, Option<Texture2D>)> {
        if spec.width == 0 || spec.height == 0 {
            return Err(ResourceError::IncompleteFramebuffer(format!(
                "zero-sized target {}x{}",
                spec.width, spec.height
            ))
            .into());
        }
        let color = Texture2D::new(command, spec.color.resized(spec.width, spec.height))?;
        let depth = spec
            .depth
            .map(|depth| Texture2D::new(command, depth.resized(spec.width, spec.height)))
            .transpose()?;
        let handle = command
            .api_mut()
            .create_framebuffer(&FramebufferAttachments {
                width: spec.width,
                height: spec.height,
                color: Some(color.handle()),
                depth: depth.as_ref().map(Texture2D::handle),
            })?;
        Ok((handle, color, depth))
    }

    /// Recreates the attachments at a new size.
    ///
    /// A zero dimension is ignored with a warning. When recreation fails the
    /// previous attachments stay in place. Returns whether the size changed.
    pub fn resize<B: RendererApi>(
        &mut self,
        command: &mut RenderCommand<B>,
        width: u32,
        height: u32,
    ) -> bool {
        if width == 0 || height == 0 {
            warn!(width, height, "ignoring framebuffer resize to a zero dimension");
            return false;
        }
        if width == self.spec.width && height == self.spec.height {
            return false;
        }
        self.invalidate(command, width, height)
    }

    fn invalidate<B: RendererApi>(
        &mut self,
        command: &mut RenderCommand<B>,
        width: u32,
        height: u32,
    ) -> bool {
        let spec = FramebufferSpecification {
            width,
            height,
            ..self.spec
        };
        match Self::build(command, &spec) {
            Ok((handle, color, depth)) => {
                let previous = std::mem::replace(&mut self.handle, handle);
                self.releases.push(PendingRelease::Framebuffer(previous));
                // Replaced attachments queue themselves on drop.
                self.color = color;
                self.depth = depth;
                self.spec = spec;
                debug!(width, height, "framebuffer recreated");
                true
            }
            Err(err) => {
                error!(
                    width,
                    height,
                    "failed to recreate framebuffer; keeping previous attachments: {err:#}"
                );
                false
            }
        }
    }

    pub fn bind<B: RendererApi>(&self, command: &mut RenderCommand<B>) {
        command.api_mut().bind_framebuffer(Some(self.handle));
        command.set_viewport(0, 0, self.spec.width, self.spec.height);
    }

    pub fn unbind<B: RendererApi>(&self, command: &mut RenderCommand<B>) {
        command.api_mut().bind_framebuffer(None);
    }

    pub fn handle(&self) -> FramebufferHandle {
        self.handle
    }

    pub fn specification(&self) -> &FramebufferSpecification {
        &self.spec
    }

    pub fn width(&self) -> u32 {
        self.spec.width
    }

    pub fn height(&self) -> u32 {
        self.spec.height
    }

    pub fn color_attachment(&self) -> &Texture2D {
        &self.color
    }

    pub fn depth_attachment(&self) -> Option<&Texture2D> {
        self.depth.as_ref()
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.releases.push(PendingRelease::Framebuffer(self.handle));
    }
}
