use engine::{Stage, Vec2, CELL_SIZE_PX};

use crate::app::session::wire::LookSnapshot;

/// Tile indices the renderer draws. Zero stays reserved for empty cells so a
/// short map window leaves blank tiles rather than stale ones.
pub(crate) const TILE_FLOOR: u16 = 1;
pub(crate) const TILE_WALL: u16 = 3;

/// Walls are the only cell code with dedicated handling; every other code
/// renders as floor.
pub(crate) fn tile_index_for(cell: char) -> u16 {
    if cell == '#' {
        TILE_WALL
    } else {
        TILE_FLOOR
    }
}

/// Sub-cell scroll that keeps the player's cell centered while its
/// fractional position slides the whole layer.
pub(crate) fn scroll_offset_px(player_coord: f32) -> f32 {
    (player_coord * CELL_SIZE_PX as f32).rem_euclid(CELL_SIZE_PX as f32)
        - (CELL_SIZE_PX as f32) * 0.5
}

/// Writes one look window into the stage's tile layer. Rows beyond the layer
/// bounds are dropped; rows shorter than the layer leave trailing cells as
/// they were written by `clear_tiles`.
pub(crate) fn apply(stage: &mut Stage, snapshot: &LookSnapshot) {
    clear_tiles(stage);
    for (row_index, row) in snapshot.map.iter().enumerate() {
        for (col_index, cell) in row.iter().enumerate() {
            stage
                .tiles_mut()
                .set_tile(col_index as u32, row_index as u32, tile_index_for(*cell));
        }
    }
    stage.tiles_mut().set_scroll_px(Vec2 {
        x: scroll_offset_px(snapshot.x),
        y: scroll_offset_px(snapshot.y),
    });
}

fn clear_tiles(stage: &mut Stage) {
    let cols = stage.tiles().cols();
    let rows = stage.tiles().rows();
    for row in 0..rows {
        for col in 0..cols {
            stage.tiles_mut().set_tile(col, row, 0);
        }
    }
}
