mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod stage;

pub use input::{InputAction, InputSnapshot};
pub use loop_runner::{run_app, AppError, LoopConfig};
pub use metrics::LoopMetricsSnapshot;
pub use rendering::{Renderer, PLACEHOLDER_HALF_SIZE_PX};
pub use stage::{
    Scene, SceneCommand, Sprite, SpriteId, Stage, TileLayer, Vec2, CELL_SIZE_PX,
    EDGE_MASK_DEPTH_PX, GRID_COLS, GRID_ROWS,
};
