mod font;
mod renderer;

pub use renderer::{Renderer, PLACEHOLDER_HALF_SIZE_PX};
