use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use pixels::{Error, Pixels, SurfaceTexture};
use tracing::warn;
use winit::window::Window;

use crate::app::stage::{Stage, Vec2, CELL_SIZE_PX, EDGE_MASK_DEPTH_PX};

use super::font;

const CLEAR_COLOR: [u8; 4] = [20, 22, 28, 255];
const EDGE_MASK_COLOR: [u8; 4] = [0, 0, 0, 255];
const PLACEHOLDER_COLOR: [u8; 4] = [220, 220, 240, 255];
const TILE_FALLBACK_FLOOR_COLOR: [u8; 4] = [74, 112, 56, 255];
const TILE_FALLBACK_WALL_COLOR: [u8; 4] = [70, 74, 82, 255];
const OVERLAY_TEXT_COLOR: [u8; 4] = [255, 0, 68, 255];
const OVERLAY_MARGIN_PX: i32 = 8;

pub const PLACEHOLDER_HALF_SIZE_PX: i32 = 10;

struct LoadedTexture {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    buffer_width: u32,
    buffer_height: u32,
    surface_width: u32,
    surface_height: u32,
    asset_root: PathBuf,
    texture_cache: HashMap<String, Option<LoadedTexture>>,
    warned_missing_texture_keys: HashSet<String>,
}

impl Renderer {
    pub fn new(
        window: Arc<Window>,
        buffer_width: u32,
        buffer_height: u32,
        asset_root: PathBuf,
    ) -> Result<Self, Error> {
        let size = window.inner_size();
        let surface_width = size.width.max(1);
        let surface_height = size.height.max(1);
        let pixels = Self::build_pixels(
            Arc::clone(&window),
            buffer_width,
            buffer_height,
            surface_width,
            surface_height,
        )?;
        Ok(Self {
            window,
            pixels,
            buffer_width,
            buffer_height,
            surface_width,
            surface_height,
            asset_root,
            texture_cache: HashMap::new(),
            warned_missing_texture_keys: HashSet::new(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(
            Arc::clone(&self.window),
            self.buffer_width,
            self.buffer_height,
            width,
            height,
        )?;
        self.surface_width = width;
        self.surface_height = height;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        buffer_width: u32,
        buffer_height: u32,
        surface_width: u32,
        surface_height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(surface_width, surface_height, window);
        Pixels::new(buffer_width, buffer_height, surface)
    }

    /// Maps a physical window coordinate into the fixed-size frame buffer.
    pub fn buffer_position_px(&self, surface_position: Vec2) -> Vec2 {
        Vec2 {
            x: surface_position.x * self.buffer_width as f32 / self.surface_width.max(1) as f32,
            y: surface_position.y * self.buffer_height as f32 / self.surface_height.max(1) as f32,
        }
    }

    pub fn render(&mut self, stage: &Stage, overlay_lines: &[String]) -> Result<(), Error> {
        let buffer_width = self.buffer_width;
        let buffer_height = self.buffer_height;
        let asset_root = self.asset_root.as_path();
        let texture_cache = &mut self.texture_cache;
        let warned_missing_texture_keys = &mut self.warned_missing_texture_keys;
        let frame = self.pixels.frame_mut();

        for chunk in frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&CLEAR_COLOR);
        }

        draw_tile_layer(
            frame,
            buffer_width,
            buffer_height,
            stage,
            texture_cache,
            warned_missing_texture_keys,
            asset_root,
        );

        for sprite in stage.sprites() {
            let center_x = sprite.position_px().x.round() as i32;
            let center_y = sprite.position_px().y.round() as i32;
            match resolve_cached_texture(
                texture_cache,
                warned_missing_texture_keys,
                asset_root,
                sprite.texture_key(),
            ) {
                Some(texture) => draw_texture_centered(
                    frame,
                    buffer_width,
                    buffer_height,
                    center_x,
                    center_y,
                    texture,
                ),
                None => fill_rect(
                    frame,
                    buffer_width,
                    buffer_height,
                    center_x - PLACEHOLDER_HALF_SIZE_PX,
                    center_y - PLACEHOLDER_HALF_SIZE_PX,
                    (PLACEHOLDER_HALF_SIZE_PX * 2) as u32,
                    (PLACEHOLDER_HALF_SIZE_PX * 2) as u32,
                    PLACEHOLDER_COLOR,
                ),
            }
        }

        draw_edge_mask(frame, buffer_width, buffer_height);

        let line_height = font::line_height_px() as i32;
        for (index, line) in overlay_lines.iter().enumerate() {
            font::draw_text(
                frame,
                buffer_width,
                buffer_height,
                OVERLAY_MARGIN_PX,
                OVERLAY_MARGIN_PX + index as i32 * line_height,
                line,
                OVERLAY_TEXT_COLOR,
            );
        }

        self.pixels.render()
    }
}

fn draw_tile_layer(
    frame: &mut [u8],
    buffer_width: u32,
    buffer_height: u32,
    stage: &Stage,
    texture_cache: &mut HashMap<String, Option<LoadedTexture>>,
    warned_missing_texture_keys: &mut HashSet<String>,
    asset_root: &Path,
) {
    let tiles = stage.tiles();
    let scroll = tiles.scroll_px();
    let scroll_x = scroll.x.round() as i32;
    let scroll_y = scroll.y.round() as i32;

    for row in 0..tiles.rows() {
        for col in 0..tiles.cols() {
            let Some(index) = tiles.tile_at(col, row) else {
                continue;
            };
            if index == 0 {
                continue;
            }
            let left = (col * CELL_SIZE_PX) as i32 + scroll_x;
            let top = (row * CELL_SIZE_PX) as i32 + scroll_y;
            let texture = tiles.texture_for(index).and_then(|key| {
                resolve_cached_texture(
                    texture_cache,
                    warned_missing_texture_keys,
                    asset_root,
                    key,
                )
            });
            match texture {
                Some(texture) => {
                    draw_texture_top_left(frame, buffer_width, buffer_height, left, top, texture);
                }
                None => fill_rect(
                    frame,
                    buffer_width,
                    buffer_height,
                    left,
                    top,
                    CELL_SIZE_PX,
                    CELL_SIZE_PX,
                    tile_fallback_color(index),
                ),
            }
        }
    }
}

fn tile_fallback_color(index: u16) -> [u8; 4] {
    if index == 3 {
        TILE_FALLBACK_WALL_COLOR
    } else {
        TILE_FALLBACK_FLOOR_COLOR
    }
}

fn draw_edge_mask(frame: &mut [u8], buffer_width: u32, buffer_height: u32) {
    let depth = EDGE_MASK_DEPTH_PX;
    fill_rect(
        frame,
        buffer_width,
        buffer_height,
        0,
        0,
        buffer_width,
        depth,
        EDGE_MASK_COLOR,
    );
    fill_rect(
        frame,
        buffer_width,
        buffer_height,
        0,
        buffer_height as i32 - depth as i32,
        buffer_width,
        depth,
        EDGE_MASK_COLOR,
    );
    fill_rect(
        frame,
        buffer_width,
        buffer_height,
        0,
        0,
        depth,
        buffer_height,
        EDGE_MASK_COLOR,
    );
    fill_rect(
        frame,
        buffer_width,
        buffer_height,
        buffer_width as i32 - depth as i32,
        0,
        depth,
        buffer_height,
        EDGE_MASK_COLOR,
    );
}

#[allow(clippy::too_many_arguments)]
fn fill_rect(
    frame: &mut [u8],
    buffer_width: u32,
    buffer_height: u32,
    left: i32,
    top: i32,
    width: u32,
    height: u32,
    color: [u8; 4],
) {
    let right = left.saturating_add(width as i32);
    let bottom = top.saturating_add(height as i32);
    let draw_left = left.max(0);
    let draw_top = top.max(0);
    let draw_right = right.min(buffer_width as i32);
    let draw_bottom = bottom.min(buffer_height as i32);
    if draw_left >= draw_right || draw_top >= draw_bottom {
        return;
    }

    let frame_width = buffer_width as usize;
    for y in draw_top..draw_bottom {
        let row_offset = y as usize * frame_width * 4;
        for x in draw_left..draw_right {
            let offset = row_offset + x as usize * 4;
            frame[offset..offset + 4].copy_from_slice(&color);
        }
    }
}

fn draw_texture_top_left(
    frame: &mut [u8],
    buffer_width: u32,
    buffer_height: u32,
    left: i32,
    top: i32,
    texture: &LoadedTexture,
) {
    blit_texture(frame, buffer_width, buffer_height, left, top, texture);
}

fn draw_texture_centered(
    frame: &mut [u8],
    buffer_width: u32,
    buffer_height: u32,
    center_x: i32,
    center_y: i32,
    texture: &LoadedTexture,
) {
    let left = center_x - (texture.width as i32 / 2);
    let top = center_y - (texture.height as i32 / 2);
    blit_texture(frame, buffer_width, buffer_height, left, top, texture);
}

fn blit_texture(
    frame: &mut [u8],
    buffer_width: u32,
    buffer_height: u32,
    left: i32,
    top: i32,
    texture: &LoadedTexture,
) {
    if texture.width == 0 || texture.height == 0 {
        return;
    }
    let expected_rgba_len = texture.width as usize * texture.height as usize * 4;
    if texture.rgba.len() < expected_rgba_len {
        return;
    }

    let right = left + texture.width as i32;
    let bottom = top + texture.height as i32;
    let draw_left = left.max(0);
    let draw_top = top.max(0);
    let draw_right = right.min(buffer_width as i32);
    let draw_bottom = bottom.min(buffer_height as i32);
    if draw_left >= draw_right || draw_top >= draw_bottom {
        return;
    }

    let frame_width = buffer_width as usize;
    let texture_width = texture.width as usize;

    for out_y in draw_top..draw_bottom {
        let src_y = (out_y - top) as usize;
        let src_row_offset = src_y * texture_width * 4;
        let dst_row_offset = out_y as usize * frame_width * 4;
        for out_x in draw_left..draw_right {
            let src_x = (out_x - left) as usize;
            let src_offset = src_row_offset + src_x * 4;
            let alpha = texture.rgba[src_offset + 3];
            if alpha == 0 {
                continue;
            }
            let dst_offset = dst_row_offset + out_x as usize * 4;
            frame[dst_offset] = texture.rgba[src_offset];
            frame[dst_offset + 1] = texture.rgba[src_offset + 1];
            frame[dst_offset + 2] = texture.rgba[src_offset + 2];
            frame[dst_offset + 3] = alpha;
        }
    }
}

fn resolve_cached_texture<'a>(
    cache: &'a mut HashMap<String, Option<LoadedTexture>>,
    warned_missing_texture_keys: &mut HashSet<String>,
    asset_root: &Path,
    key: &str,
) -> Option<&'a LoadedTexture> {
    if !cache.contains_key(key) {
        let texture = match resolve_texture_image_path(asset_root, key) {
            Ok(path) => match load_texture_rgba(&path) {
                Ok(texture) => Some(texture),
                Err(reason) => {
                    warn_texture_load_once(
                        warned_missing_texture_keys,
                        key,
                        Some(path.as_path()),
                        reason.as_str(),
                    );
                    None
                }
            },
            Err(reason) => {
                warn_texture_load_once(warned_missing_texture_keys, key, None, reason.as_str());
                None
            }
        };
        cache.insert(key.to_string(), texture);
    }
    cache.get(key).and_then(Option::as_ref)
}

fn resolve_texture_image_path(asset_root: &Path, key: &str) -> Result<PathBuf, String> {
    validate_texture_key(key)?;
    Ok(asset_root.join(format!("{key}.png")))
}

/// Texture keys come from server data, so reject anything that could escape
/// the asset directory.
fn validate_texture_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("invalid_key:empty".to_string());
    }
    let valid = key
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if !valid {
        return Err(format!("invalid_key:{key}"));
    }
    Ok(())
}

fn load_texture_rgba(path: &Path) -> Result<LoadedTexture, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    Ok(LoadedTexture {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

fn warn_texture_load_once(
    warned_keys: &mut HashSet<String>,
    key: &str,
    resolved_path: Option<&Path>,
    reason: &str,
) {
    if !warned_keys.insert(key.to_string()) {
        return;
    }
    let path_display = resolved_path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unresolved>".to_string());
    warn!(
        texture_key = key,
        path = %path_display,
        reason = reason,
        "renderer_texture_load_failed_using_placeholder"
    );
}
