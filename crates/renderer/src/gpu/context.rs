use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::types::{BackendConfig, GpuPowerPreference};

pub(crate) struct SurfaceState {
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
    caps: wgpu::SurfaceCapabilities,
}

pub(crate) struct GpuContext {
    _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_name: String,
    pub surface: Option<SurfaceState>,
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

impl GpuContext {
    /// Device without a presentation surface, for offscreen rendering and export.
    pub(crate) fn headless(config: &BackendConfig) -> Result<Self> {
        let instance = create_instance();
        let (adapter_name, device, queue) = request_device(&instance, None, config)?;
        Ok(Self {
            _instance: instance,
            device,
            queue,
            adapter_name,
            surface: None,
        })
    }

    pub(crate) fn with_surface<T>(
        target: T,
        width: u32,
        height: u32,
        config: &BackendConfig,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle + Send + Sync + 'static,
    {
        target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        let instance = create_instance();
        let surface = instance
            .create_surface(target)
            .context("failed to create rendering surface")?;
        let (adapter_name, device, queue, caps) = {
            let adapter = pick_adapter(&instance, Some(&surface), config)?;
            let caps = surface.get_capabilities(&adapter);
            let (name, device, queue) = open_device(adapter)?;
            (name, device, queue, caps)
        };

        if caps.formats.is_empty() {
            anyhow::bail!("surface is not supported by the selected adapter");
        }

        // Shader output is written as-is, like a GL default framebuffer.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .unwrap_or_else(|| {
                let fallback = caps.formats[0];
                tracing::warn!(?fallback, "no non-sRGB surface format available");
                fallback
            });

        let present_mode = present_mode_for(&caps, config.vsync, wgpu::PresentMode::Fifo);
        tracing::debug!(?present_mode, ?format, "configuring surface");

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        Ok(Self {
            _instance: instance,
            device,
            queue,
            adapter_name,
            surface: Some(SurfaceState {
                surface,
                config: surface_config,
                caps,
            }),
        })
    }

    pub(crate) fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(state) = self.surface.as_mut() {
            if state.config.width == width && state.config.height == height {
                return;
            }
            state.config.width = width;
            state.config.height = height;
            state.surface.configure(&self.device, &state.config);
        }
    }

    /// Reapplies the current configuration after the surface was lost or outdated.
    pub(crate) fn reconfigure_surface(&mut self) {
        if let Some(state) = self.surface.as_ref() {
            state.surface.configure(&self.device, &state.config);
        }
    }

    pub(crate) fn set_vsync(&mut self, enabled: bool) {
        let Some(state) = self.surface.as_mut() else {
            return;
        };
        let target_mode = present_mode_for(&state.caps, enabled, state.config.present_mode);
        if target_mode != state.config.present_mode {
            state.config.present_mode = target_mode;
            state.surface.configure(&self.device, &state.config);
            tracing::debug!(?target_mode, vsync_enabled = enabled, "reconfigured surface present mode");
        }
    }
}

/// Fifo when vsync is wanted, otherwise Immediate, then Mailbox, then `fallback`.
fn present_mode_for(
    caps: &wgpu::SurfaceCapabilities,
    vsync: bool,
    fallback: wgpu::PresentMode,
) -> wgpu::PresentMode {
    let has = |mode: wgpu::PresentMode| caps.present_modes.contains(&mode);
    if vsync {
        if has(wgpu::PresentMode::Fifo) {
            return wgpu::PresentMode::Fifo;
        }
    } else if has(wgpu::PresentMode::Immediate) {
        return wgpu::PresentMode::Immediate;
    } else if has(wgpu::PresentMode::Mailbox) {
        return wgpu::PresentMode::Mailbox;
    }
    if has(fallback) {
        fallback
    } else {
        caps.present_modes
            .first()
            .copied()
            .unwrap_or(wgpu::PresentMode::Fifo)
    }
}

fn pick_adapter(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
    config: &BackendConfig,
) -> Result<wgpu::Adapter> {
    let power_preference = match config.power {
        GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
        GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
    };
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference,
        compatible_surface,
        force_fallback_adapter: false,
    }))
    .context("failed to find a suitable GPU adapter")
}

fn open_device(adapter: wgpu::Adapter) -> Result<(String, wgpu::Device, wgpu::Queue)> {
    let info = adapter.get_info();
    tracing::debug!(
        name = %info.name,
        backend = ?info.backend,
        device_type = ?info.device_type,
        "selected GPU adapter"
    );

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("fractalscope device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::default(),
    }))
    .context("failed to create GPU device")?;

    Ok((info.name, device, queue))
}

fn request_device(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
    config: &BackendConfig,
) -> Result<(String, wgpu::Device, wgpu::Queue)> {
    let adapter = pick_adapter(instance, compatible_surface, config)?;
    open_device(adapter)
}
