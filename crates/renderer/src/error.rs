/// Typed failures when creating or feeding device resources.
///
/// Backends return these wrapped in `anyhow::Error`; wrappers log them at error
/// level and leave the resource unavailable.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("shader compilation failed: {0}")]
    ShaderCompilation(String),
    #[error("unsupported uniform `{name}`: {reason}")]
    UnsupportedUniform { name: String, reason: String },
    #[error("framebuffer is incomplete: {0}")]
    IncompleteFramebuffer(String),
    #[error("unsupported image channel count: {0}")]
    UnsupportedChannels(u8),
    #[error("unknown {kind} handle #{raw}")]
    InvalidHandle { kind: &'static str, raw: u32 },
    #[error("expected {expected} bytes of pixel data, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}
