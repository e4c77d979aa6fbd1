use std::collections::HashMap;
use std::time::Instant;

use super::input::InputSnapshot;
use super::metrics::LoopMetricsSnapshot;

/// Cell edge length in pixels for both the tile layer and sprite placement.
pub const CELL_SIZE_PX: u32 = 64;
/// Visible tile columns in the fixed viewport.
pub const GRID_COLS: u32 = 9;
/// Visible tile rows in the fixed viewport.
pub const GRID_ROWS: u32 = 7;
/// Depth of the opaque border bands hiding tile pop-in at the viewport edges.
pub const EDGE_MASK_DEPTH_PX: u32 = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

/// Opaque handle to a sprite owned by the stage. Ids are never reused, so a
/// handle held across a removal can only miss, never alias another sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpriteId(u64);

#[derive(Debug, Default)]
struct SpriteIdAllocator {
    next: u64,
}

impl SpriteIdAllocator {
    fn allocate(&mut self) -> SpriteId {
        let id = SpriteId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone)]
pub struct Sprite {
    id: SpriteId,
    texture_key: String,
    position_px: Vec2,
}

impl Sprite {
    pub fn id(&self) -> SpriteId {
        self.id
    }

    pub fn texture_key(&self) -> &str {
        &self.texture_key
    }

    pub fn position_px(&self) -> Vec2 {
        self.position_px
    }
}

/// Scrollable grid of tile indices. Index 0 renders as empty; texture keys
/// are bound per index by the active scene.
#[derive(Debug)]
pub struct TileLayer {
    cols: u32,
    rows: u32,
    tiles: Vec<u16>,
    scroll_px: Vec2,
    textures_by_index: HashMap<u16, String>,
}

impl TileLayer {
    fn new(cols: u32, rows: u32) -> Self {
        Self {
            cols,
            rows,
            tiles: vec![0; cols as usize * rows as usize],
            scroll_px: Vec2::default(),
            textures_by_index: HashMap::new(),
        }
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Writes one cell. Out-of-bounds writes are ignored and reported as
    /// `false` so callers can feed arbitrarily sized maps without clamping.
    pub fn set_tile(&mut self, col: u32, row: u32, index: u16) -> bool {
        if col >= self.cols || row >= self.rows {
            return false;
        }
        self.tiles[(row * self.cols + col) as usize] = index;
        true
    }

    pub fn tile_at(&self, col: u32, row: u32) -> Option<u16> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        Some(self.tiles[(row * self.cols + col) as usize])
    }

    pub fn set_scroll_px(&mut self, scroll: Vec2) {
        self.scroll_px = scroll;
    }

    pub fn scroll_px(&self) -> Vec2 {
        self.scroll_px
    }

    pub fn bind_texture(&mut self, index: u16, texture_key: &str) {
        self.textures_by_index
            .insert(index, texture_key.to_string());
    }

    pub fn texture_for(&self, index: u16) -> Option<&str> {
        self.textures_by_index.get(&index).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.tiles.fill(0);
        self.scroll_px = Vec2::default();
    }
}

/// Everything the renderer draws for one frame: a tile layer plus a list of
/// sprites in spawn order. Scenes mutate the stage; the loop renders it.
#[derive(Debug)]
pub struct Stage {
    allocator: SpriteIdAllocator,
    sprites: Vec<Sprite>,
    tiles: TileLayer,
}

impl Stage {
    pub fn new(cols: u32, rows: u32) -> Self {
        Self {
            allocator: SpriteIdAllocator::default(),
            sprites: Vec::new(),
            tiles: TileLayer::new(cols, rows),
        }
    }

    pub fn spawn_sprite(&mut self, texture_key: &str, position_px: Vec2) -> SpriteId {
        let id = self.allocator.allocate();
        self.sprites.push(Sprite {
            id,
            texture_key: texture_key.to_string(),
            position_px,
        });
        id
    }

    pub fn remove_sprite(&mut self, id: SpriteId) -> bool {
        let before = self.sprites.len();
        self.sprites.retain(|sprite| sprite.id != id);
        self.sprites.len() != before
    }

    pub fn set_sprite_position(&mut self, id: SpriteId, position_px: Vec2) -> bool {
        match self.sprites.iter_mut().find(|sprite| sprite.id == id) {
            Some(sprite) => {
                sprite.position_px = position_px;
                true
            }
            None => false,
        }
    }

    pub fn sprite(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.iter().find(|sprite| sprite.id == id)
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }

    /// Sprites in draw order: oldest spawn first, newest on top.
    pub fn sprites(&self) -> &[Sprite] {
        &self.sprites
    }

    /// Topmost sprite whose center is within `half_size_px` of `point_px`
    /// on both axes. Later spawns win, matching draw order.
    pub fn sprite_at_px(&self, point_px: Vec2, half_size_px: f32) -> Option<SpriteId> {
        self.sprites
            .iter()
            .rev()
            .find(|sprite| {
                (sprite.position_px.x - point_px.x).abs() <= half_size_px
                    && (sprite.position_px.y - point_px.y).abs() <= half_size_px
            })
            .map(|sprite| sprite.id)
    }

    pub fn tiles(&self) -> &TileLayer {
        &self.tiles
    }

    pub fn tiles_mut(&mut self) -> &mut TileLayer {
        &mut self.tiles
    }

    pub fn clear(&mut self) {
        self.sprites.clear();
        self.tiles.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

pub trait Scene {
    fn load(&mut self, stage: &mut Stage);

    fn update(&mut self, now: Instant, input: &InputSnapshot, stage: &mut Stage) -> SceneCommand;

    fn overlay_lines(&self, _metrics: &LoopMetricsSnapshot) -> Vec<String> {
        Vec::new()
    }

    fn unload(&mut self, stage: &mut Stage);
}
