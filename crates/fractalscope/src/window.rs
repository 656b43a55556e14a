use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use fractal::{FractalParameters, FractalState};
use renderer::{Renderer, WgpuBackend};
use tracing::{error, info};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowBuilder};

use crate::keys::{Action, KeyboardState};
use crate::settings::Settings;

/// Everything the preview loop owns between frames.
struct PreviewState {
    window: Arc<Window>,
    renderer: Renderer<WgpuBackend>,
    fractal: FractalState,
    keyboard: KeyboardState,
    configuration: PathBuf,
    settings: Settings,
    last_frame: Instant,
}

impl PreviewState {
    fn new(window: Arc<Window>, settings: Settings, initial: FractalParameters) -> Result<Self> {
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));
        let backend =
            WgpuBackend::with_surface(window.clone(), width, height, settings.backend_config())
                .context("failed to initialise window renderer")?;
        info!(adapter = backend.adapter_name(), "GPU backend ready");

        let (fb_width, fb_height) = settings.scaled_size(width, height);
        let renderer = Renderer::new(backend, settings.renderer_config(fb_width, fb_height))?;

        Ok(Self {
            window,
            renderer,
            fractal: settings.fractal_state(initial),
            keyboard: KeyboardState::default(),
            configuration: settings.startup_configuration.clone(),
            settings,
            last_frame: Instant::now(),
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            tracing::debug!("window minimised; keeping framebuffer size");
            return;
        }
        let (width, height) = self.settings.scaled_size(size.width, size.height);
        self.renderer.resize(width, height);
        self.renderer
            .backend_mut()
            .resize_surface(size.width, size.height);
    }

    fn render_frame(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.fractal.navigate(&self.keyboard.navigation(), dt);
        self.fractal.update(dt);

        self.renderer.begin();
        self.renderer.submit(self.fractal.current());
        self.renderer.end();

        let size = self.window.inner_size();
        if let Err(err) = self.renderer.present(size.width, size.height) {
            error!("failed to present frame: {err:#}");
        }
    }

    /// Runs a key-bound action. Returns false when the loop should exit.
    fn perform(&mut self, action: Action) -> bool {
        match action {
            Action::ReloadShader => {
                if !self.renderer.reload_shader() {
                    error!("shader reload failed; keeping the previous program");
                }
            }
            Action::ReloadConfiguration => {
                match fractal::load_into(&self.configuration, self.fractal.target_mut()) {
                    Ok(()) => info!(path = %self.configuration.display(), "configuration reloaded"),
                    Err(err) => error!(
                        path = %self.configuration.display(),
                        "failed to reload configuration: {err}"
                    ),
                }
            }
            Action::SaveConfiguration => {
                match fractal::save(&self.configuration, self.fractal.target()) {
                    Ok(()) => info!(path = %self.configuration.display(), "configuration saved"),
                    Err(err) => error!(
                        path = %self.configuration.display(),
                        "failed to save configuration: {err}"
                    ),
                }
            }
            Action::ExportFrame => {
                self.renderer.export_frame_to(&self.settings.export_dir);
            }
            Action::Quit => {
                if self.settings.escape_closes_app {
                    info!("escape pressed; closing");
                    return false;
                }
            }
        }
        true
    }
}

pub fn run_window(settings: Settings, initial: FractalParameters) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title("fractalscope")
        .with_inner_size(PhysicalSize::new(settings.width, settings.height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let mut state = PreviewState::new(window, settings, initial)?;
    state.window.request_redraw();

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                if let Some(action) = state.keyboard.handle(code, event.state, event.repeat) {
                    if !state.perform(action) {
                        elwt.exit();
                    }
                }
            }
            WindowEvent::Focused(false) => state.keyboard.release_all(),
            WindowEvent::Resized(size) => state.resize(size),
            WindowEvent::RedrawRequested => state.render_frame(),
            _ => {}
        },
        Event::AboutToWait => {
            state.window.request_redraw();
            elwt.set_control_flow(ControlFlow::Wait);
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
