//! Tiny built-in 3x5 pixel font for overlay text. Covers digits, upper-case
//! letters, and the punctuation the overlay actually prints.

pub(crate) const GLYPH_WIDTH_PX: u32 = 3;
pub(crate) const GLYPH_HEIGHT_PX: u32 = 5;
pub(crate) const GLYPH_SPACING_PX: u32 = 1;
pub(crate) const TEXT_SCALE: u32 = 2;

pub(crate) fn line_height_px() -> u32 {
    (GLYPH_HEIGHT_PX + GLYPH_SPACING_PX) * TEXT_SCALE
}

/// Rows are the low three bits, most significant bit leftmost.
fn glyph_rows(ch: char) -> [u8; 5] {
    match ch.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b110, 0b100, 0b110, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b101, 0b111, 0b111, 0b111, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b001],
        'R' => [0b110, 0b101, 0b110, 0b110, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        ' ' => [0; 5],
        // Unknown characters render as a filled block.
        _ => [0b111; 5],
    }
}

pub(crate) fn draw_text(
    frame: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    origin_x: i32,
    origin_y: i32,
    text: &str,
    color: [u8; 4],
) {
    let advance = ((GLYPH_WIDTH_PX + GLYPH_SPACING_PX) * TEXT_SCALE) as i32;
    let mut pen_x = origin_x;
    for ch in text.chars() {
        draw_glyph(frame, frame_width, frame_height, pen_x, origin_y, ch, color);
        pen_x += advance;
    }
}

fn draw_glyph(
    frame: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    origin_x: i32,
    origin_y: i32,
    ch: char,
    color: [u8; 4],
) {
    let rows = glyph_rows(ch);
    for (row_index, row_bits) in rows.iter().enumerate() {
        for col_index in 0..GLYPH_WIDTH_PX {
            let bit = (row_bits >> (GLYPH_WIDTH_PX - 1 - col_index)) & 1;
            if bit == 0 {
                continue;
            }
            for sub_y in 0..TEXT_SCALE {
                for sub_x in 0..TEXT_SCALE {
                    let x = origin_x + (col_index * TEXT_SCALE + sub_x) as i32;
                    let y = origin_y + (row_index as u32 * TEXT_SCALE + sub_y) as i32;
                    write_pixel_clipped(frame, frame_width, frame_height, x, y, color);
                }
            }
        }
    }
}

fn write_pixel_clipped(
    frame: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    x: i32,
    y: i32,
    color: [u8; 4],
) {
    if x < 0 || y < 0 || x >= frame_width as i32 || y >= frame_height as i32 {
        return;
    }
    let offset = (y as usize * frame_width as usize + x as usize) * 4;
    if offset + 4 > frame.len() {
        return;
    }
    frame[offset..offset + 4].copy_from_slice(&color);
}
