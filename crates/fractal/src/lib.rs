//! Fractal data model for fractalscope.
//!
//! Everything in this crate is plain CPU-side state; nothing here touches the
//! GPU. The pieces fit together like this:
//!
//! ```text
//!   .fractal document ──load──▶ FractalState::target_mut()
//!   keyboard input ──navigate──▶ FractalState::target_mut()
//!                                        │ update(dt)
//!                                        ▼
//!                             FractalState::current() ──▶ renderer::Renderer::submit
//! ```
//!
//! `target` is the authoritative, edited parameter set. `current` follows it
//! through exponential smoothing and is the only set the renderer ever sees.

mod document;
mod names;
mod navigation;
mod orbit_trap;
mod palette;
mod params;
mod state;

pub use document::{
    apply_toml_str, load, load_into, save, to_toml_string, DocumentError, FILE_EXTENSION,
};
pub use names::NamedEnum;
pub use navigation::NavigationInput;
pub use orbit_trap::{OrbitTrap, OrbitTrapType};
pub use palette::{Palette, ShaderPalette, MAX_PALETTE_COLORS};
pub use params::{ColorAlgorithm, FractalAlgorithm, FractalParameters, InteriorColoring};
pub use state::FractalState;
