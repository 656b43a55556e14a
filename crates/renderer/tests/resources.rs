use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use renderer::{
    BufferLayout, HeadlessBackend, IndexBuffer, RenderCommand, ResourceError, Shader,
    ShaderDataType, ShaderSources, Texture2D, TextureFormat, TextureSpecification, VertexArray,
    VertexBuffer,
};
use tempfile::TempDir;

fn shader_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/shaders")
}

fn command() -> RenderCommand<HeadlessBackend> {
    let mut command = RenderCommand::new(HeadlessBackend::new());
    command.init().unwrap();
    command
}

#[test]
fn dropped_objects_are_released_on_the_next_drain() {
    let mut command = command();
    {
        let mut vertices = VertexBuffer::new(&mut command, &[0.0; 10]).unwrap();
        vertices.set_layout(BufferLayout::new([(ShaderDataType::Float2, "a_Position")]));
        let indices = IndexBuffer::new(&mut command, &[0, 1, 2]).unwrap();
        let mut array = VertexArray::new(&mut command).unwrap();
        array.add_vertex_buffer(&mut command, Rc::new(vertices)).unwrap();
        array.set_index_buffer(&mut command, indices).unwrap();
        assert_eq!(array.index_count(), 3);
    }

    assert_eq!(command.api().live_buffers(), 2);
    assert_eq!(command.api().live_vertex_arrays(), 1);
    assert_eq!(command.releases().len(), 3);

    assert_eq!(command.process_deletion_queue(), 3);
    assert_eq!(command.api().live_buffers(), 0);
    assert_eq!(command.api().live_vertex_arrays(), 0);
    assert!(command.releases().is_empty());
}

#[test]
fn vertex_buffer_without_layout_is_rejected() {
    let mut command = command();
    let vertices = VertexBuffer::new(&mut command, &[0.0; 6]).unwrap();
    let mut array = VertexArray::new(&mut command).unwrap();
    assert!(array.add_vertex_buffer(&mut command, Rc::new(vertices)).is_err());
    assert!(array.vertex_buffers().is_empty());
}

#[test]
fn rgb_texture_is_flipped_for_bottom_up_backends() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stripes.png");
    let mut stripes = image::RgbImage::new(1, 2);
    stripes.put_pixel(0, 0, image::Rgb([255, 0, 0]));
    stripes.put_pixel(0, 1, image::Rgb([0, 0, 255]));
    stripes.save(&path).unwrap();

    let mut command = command();
    let texture =
        Texture2D::from_file(&mut command, &path, TextureSpecification::default()).unwrap();
    assert_eq!(texture.format(), TextureFormat::Rgb8);
    assert_eq!((texture.width(), texture.height()), (1, 2));
    assert_eq!(texture.path(), Some(path.as_path()));

    let pixels = command.api().texture_pixels(texture.handle()).unwrap();
    assert_eq!(&pixels[..3], &[0, 0, 255]);
    assert_eq!(&pixels[3..6], &[255, 0, 0]);
}

#[test]
fn grey_alpha_texture_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mask.png");
    image::GrayAlphaImage::new(2, 2).save(&path).unwrap();

    let mut command = command();
    let err = Texture2D::from_file(&mut command, &path, TextureSpecification::default())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ResourceError>(),
        Some(ResourceError::UnsupportedChannels(2))
    ));
    assert_eq!(command.api().live_textures(), 0);
}

#[test]
fn texture_data_must_match_its_size() {
    let mut command = command();
    let spec = TextureSpecification::render_target(2, 2, TextureFormat::Rgba8);
    let mut texture = Texture2D::new(&mut command, spec).unwrap();

    let err = texture.set_data(&mut command, &[0; 15]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ResourceError>(),
        Some(ResourceError::SizeMismatch { expected: 16, actual: 15 })
    ));
    texture.set_data(&mut command, &[7; 16]).unwrap();
    assert_eq!(command.api().texture_pixels(texture.handle()).unwrap(), &[7; 16]);
}

#[test]
fn shader_asset_resolves_paths_next_to_itself() {
    let dir = TempDir::new().unwrap();
    for name in ["mandelbrot.vert", "mandelbrot.frag"] {
        fs::copy(shader_dir().join(name), dir.path().join(name)).unwrap();
    }
    let asset = dir.path().join("fractal.shader");
    fs::write(
        &asset,
        "[Shader]\nVertexPath = \"mandelbrot.vert\"\nFragmentPath = \"mandelbrot.frag\"\n",
    )
    .unwrap();

    let mut command = command();
    let shader = Shader::from_asset(&mut command, &asset).unwrap();
    assert!(shader.is_valid());
    assert_eq!(
        shader.sources(),
        &ShaderSources::Graphics {
            vertex: dir.path().join("mandelbrot.vert"),
            fragment: dir.path().join("mandelbrot.frag"),
        }
    );
}

#[test]
fn bundled_shader_asset_loads() {
    let mut command = command();
    let shader = Shader::from_asset(&mut command, &shader_dir().join("mandelbrot.shader")).unwrap();
    assert!(shader.is_valid());
}

#[test]
fn shader_asset_without_stages_is_an_error() {
    let dir = TempDir::new().unwrap();
    let asset = dir.path().join("broken.shader");
    fs::write(&asset, "[Shader]\nVertexPath = \"only.vert\"\n").unwrap();

    let mut command = command();
    assert!(Shader::from_asset(&mut command, &asset).is_err());
}

#[test]
fn compute_shader_dispatches_only_while_bound() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fill.comp");
    fs::write(
        &path,
        "#version 430 core\n\
         layout(local_size_x = 8, local_size_y = 8) in;\n\
         uniform float u_Scale;\n\
         void main() { float unused = u_Scale; }\n",
    )
    .unwrap();

    let mut command = command();
    let shader = Shader::compute(&mut command, path.clone());
    assert!(shader.is_valid());

    command.dispatch_compute(4, 4, 1);
    assert!(command.api().draws().is_empty());

    let program = shader.bind(&mut command).unwrap().program();
    command.dispatch_compute(4, 4, 1);
    assert_eq!(command.api().draws().len(), 1);
    assert_eq!(command.api().draws()[0].program, program);

    drop(shader);
    assert!(command.api().has_program(program));
    command.process_deletion_queue();
    assert!(!command.api().has_program(program));
}
