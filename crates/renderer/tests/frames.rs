use std::f32::consts::FRAC_PI_2;
use std::fs;
use std::path::PathBuf;

use fractal::{FractalAlgorithm, FractalParameters, NamedEnum, OrbitTrapType, Palette};
use renderer::{DrawKind, HeadlessBackend, Renderer, RendererConfig, UniformValue};
use tempfile::TempDir;

fn shader_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/shaders")
}

fn config(width: u32, height: u32) -> RendererConfig {
    RendererConfig {
        framebuffer_size: (width, height),
        ..RendererConfig::default()
    }
    .with_shader_dir(&shader_dir())
}

fn renderer(width: u32, height: u32) -> Renderer<HeadlessBackend> {
    Renderer::new(HeadlessBackend::new(), config(width, height)).unwrap()
}

#[test]
fn bundled_shaders_compile() {
    let renderer = renderer(64, 32);
    assert!(renderer.backend().is_initialised());
    assert!(renderer.shader().is_valid());
    assert!(renderer.has_quad());
    let framebuffer = renderer.framebuffer().unwrap();
    assert_eq!((framebuffer.width(), framebuffer.height()), (64, 32));
    assert!(renderer.backend().depth_test());
}

#[test]
fn submit_draws_the_quad_into_the_framebuffer() {
    let mut renderer = renderer(64, 32);
    renderer.begin();
    renderer.submit(&FractalParameters::default());
    renderer.end();

    let framebuffer = renderer.framebuffer().unwrap().handle();
    let draws = renderer.backend().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].kind, DrawKind::Indexed);
    assert_eq!(draws[0].count, 6);
    assert_eq!(draws[0].framebuffer, Some(framebuffer));
    assert_eq!(draws[0].viewport, [0, 0, 64, 32]);
    assert_eq!(renderer.backend().bound_framebuffer(), None);
}

#[test]
fn submit_uploads_every_parameter() {
    let mut renderer = renderer(64, 32);
    let mut params = FractalParameters {
        algorithm: FractalAlgorithm::BurningShip,
        zoom: 4.0,
        position: [-1.5, 0.25],
        rotation: 90.0,
        max_iterations: 500,
        julia_mode: true,
        julia_c: [0.3, -0.1],
        orbit_coloring: true,
        palette: Palette::new(vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
        ..FractalParameters::default()
    };
    params.trap.trap_type = OrbitTrapType::Circle;
    params.trap.p2 = [0.75, 0.0];
    params.trap.blend = 0.25;

    renderer.begin();
    renderer.submit(&params);
    renderer.end();

    let program = renderer.shader().program().unwrap();
    let backend = renderer.backend();
    let get = |name: &str| backend.uniform(program, name).unwrap();

    assert_eq!(get("u_Resolution"), UniformValue::Vec2([64.0, 32.0]));
    assert_eq!(get("u_Zoom"), UniformValue::Float(4.0));
    assert_eq!(get("u_Position"), UniformValue::Vec2([-1.5, 0.25]));
    let UniformValue::Float(rotation) = get("u_Rotation") else {
        panic!("rotation is not a float");
    };
    assert!((rotation - FRAC_PI_2).abs() < 1e-6);
    assert_eq!(get("u_MaxIterations"), UniformValue::Int(500));
    assert_eq!(
        get("u_Algorithm"),
        UniformValue::Int(FractalAlgorithm::BurningShip.ordinal())
    );
    assert_eq!(get("u_JuliaMode"), UniformValue::Bool(true));
    assert_eq!(get("u_JuliaC"), UniformValue::Vec2([0.3, -0.1]));
    assert_eq!(get("u_OrbitColoring"), UniformValue::Bool(true));

    assert_eq!(get("u_ColorCount"), UniformValue::Int(3));
    assert_eq!(get("u_Colors[1]"), UniformValue::Vec3([0.0, 1.0, 0.0]));
    assert_eq!(get("u_ColorPositions[1]"), UniformValue::Float(0.5));
    assert_eq!(get("u_ColorPositions[2]"), UniformValue::Float(1.0));

    assert_eq!(get("u_TrapType"), UniformValue::Int(OrbitTrapType::Circle.ordinal()));
    assert_eq!(get("u_TrapP2"), UniformValue::Vec2([0.75, 0.0]));
    assert_eq!(get("u_TrapBlend"), UniformValue::Float(0.25));
}

#[test]
fn missing_shader_skips_drawing() {
    let config = RendererConfig {
        framebuffer_size: (16, 16),
        ..RendererConfig::default()
    }
    .with_shader_dir(std::path::Path::new("/nonexistent/fractalscope"));
    let mut renderer = Renderer::new(HeadlessBackend::new(), config).unwrap();
    assert!(!renderer.shader().is_valid());

    renderer.begin();
    renderer.submit(&FractalParameters::default());
    renderer.end();
    assert!(renderer.backend().draws().is_empty());
}

#[test]
fn failed_reload_keeps_the_running_program() {
    let dir = TempDir::new().unwrap();
    for name in ["mandelbrot.vert", "mandelbrot.frag"] {
        fs::copy(shader_dir().join(name), dir.path().join(name)).unwrap();
    }
    let config = RendererConfig {
        framebuffer_size: (16, 16),
        ..RendererConfig::default()
    }
    .with_shader_dir(dir.path());
    let mut renderer = Renderer::new(HeadlessBackend::new(), config).unwrap();
    let original = renderer.shader().program().unwrap();

    fs::write(
        dir.path().join("mandelbrot.frag"),
        "#version 330 core\nvoid main() { this is not glsl }\n",
    )
    .unwrap();
    assert!(!renderer.reload_shader());
    assert_eq!(renderer.shader().program(), Some(original));
    assert!(renderer.backend().has_program(original));

    renderer.begin();
    renderer.submit(&FractalParameters::default());
    assert_eq!(renderer.backend().draws().len(), 1);
}

#[test]
fn successful_reload_releases_the_old_program_next_frame() {
    let mut renderer = renderer(16, 16);
    let original = renderer.shader().program().unwrap();

    assert!(renderer.reload_shader());
    let reloaded = renderer.shader().program().unwrap();
    assert_ne!(original, reloaded);
    assert!(renderer.backend().has_program(original));

    renderer.begin();
    assert!(!renderer.backend().has_program(original));
    assert!(renderer.backend().has_program(reloaded));
}

#[test]
fn resize_defers_release_of_old_attachments() {
    let mut renderer = renderer(32, 32);
    let old = renderer.framebuffer().unwrap().handle();
    let old_color = renderer.framebuffer().unwrap().color_attachment().handle();
    assert_eq!(renderer.backend().live_framebuffers(), 1);
    assert_eq!(renderer.backend().live_textures(), 2);

    assert!(renderer.resize(48, 24));
    let framebuffer = renderer.framebuffer().unwrap();
    assert_eq!((framebuffer.width(), framebuffer.height()), (48, 24));
    assert!(renderer.backend().has_framebuffer(old));
    assert!(renderer.backend().has_texture(old_color));
    assert_eq!(renderer.backend().live_textures(), 4);

    renderer.begin();
    assert!(!renderer.backend().has_framebuffer(old));
    assert!(!renderer.backend().has_texture(old_color));
    assert_eq!(renderer.backend().live_framebuffers(), 1);
    assert_eq!(renderer.backend().live_textures(), 2);
    assert_eq!(renderer.backend().viewport(), [0, 0, 48, 24]);
}

#[test]
fn resize_ignores_same_size_and_zero_dimensions() {
    let mut renderer = renderer(32, 32);
    let handle = renderer.framebuffer().unwrap().handle();

    assert!(!renderer.resize(32, 32));
    assert!(!renderer.resize(0, 720));
    assert!(!renderer.resize(720, 0));

    let framebuffer = renderer.framebuffer().unwrap();
    assert_eq!(framebuffer.handle(), handle);
    assert_eq!((framebuffer.width(), framebuffer.height()), (32, 32));

    let color = framebuffer.color_attachment();
    assert_eq!((color.width(), color.height()), (32, 32));
    let depth = framebuffer.depth_attachment().unwrap();
    assert_eq!((depth.width(), depth.height()), (32, 32));
}

#[test]
fn failed_recreation_keeps_the_previous_framebuffer() {
    let mut renderer = renderer(32, 32);
    let handle = renderer.framebuffer().unwrap().handle();

    renderer.backend_mut().fail_framebuffer_creation(true);
    assert!(!renderer.resize(64, 64));
    renderer.begin();

    let framebuffer = renderer.framebuffer().unwrap();
    assert_eq!(framebuffer.handle(), handle);
    assert_eq!(framebuffer.width(), 32);
    assert!(renderer.backend().has_framebuffer(handle));
    assert_eq!(renderer.backend().live_textures(), 2);

    renderer.backend_mut().fail_framebuffer_creation(false);
    assert!(renderer.resize(64, 64));
}

#[test]
fn export_writes_top_row_first() {
    let dir = TempDir::new().unwrap();
    let mut renderer = renderer(4, 2);
    renderer.begin();
    renderer.end();

    let handle = renderer.framebuffer().unwrap().handle();
    let plane = renderer.backend_mut().framebuffer_pixels_mut(handle).unwrap();
    // Bottom row first: paint the bottom-left pixel red.
    plane[..4].copy_from_slice(&[255, 0, 0, 255]);

    let path = dir.path().join("nested/frame.png");
    assert!(renderer.export_frame(&path));

    let exported = image::open(&path).unwrap().into_rgba8();
    assert_eq!(exported.dimensions(), (4, 2));
    assert_eq!(exported.get_pixel(0, 1).0, [255, 0, 0, 255]);
    assert_eq!(exported.get_pixel(0, 0).0, [0, 0, 0, 255]);
}

#[test]
fn export_to_directory_uses_a_timestamped_name() {
    let dir = TempDir::new().unwrap();
    let mut renderer = renderer(8, 8);
    renderer.begin();
    renderer.end();

    let path = renderer.export_frame_to(dir.path()).unwrap();
    assert!(path.exists());
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("Mandelbrot-"));
    assert!(name.ends_with(".png"));
}

#[test]
fn zero_sized_configuration_exports_nothing() {
    let dir = TempDir::new().unwrap();
    let mut renderer = Renderer::new(HeadlessBackend::new(), config(0, 720)).unwrap();
    assert!(renderer.framebuffer().is_none());

    renderer.begin();
    renderer.submit(&FractalParameters::default());
    renderer.end();

    let path = dir.path().join("frame.png");
    assert!(!renderer.export_frame(&path));
    assert!(!path.exists());
}
