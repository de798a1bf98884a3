//! Bitmap, tile and raster-op defaults, all reduced to runs of equal color.

use super::{clip_rect, pure_color};
use crate::device::Device;
use crate::error::{DeviceError, DeviceResult};
use crate::op::Op;
use pagechain_types::graphics::{Bitmap, ClipPath, LogicalOp, Phase, RopArgs, StripBitmap, TileBitmap};
use pagechain_types::{ColorIndex, DeviceColor, NO_COLOR_INDEX};

/// Reads `bits` bits starting at bit `offset` of `row`, MSB first.
pub(crate) fn read_bits(row: &[u8], offset: usize, bits: u32) -> u64 {
    (0..bits as usize).fold(0u64, |acc, i| {
        let bit = offset + i;
        let set = row.get(bit / 8).is_some_and(|b| b & (0x80 >> (bit % 8)) != 0);
        (acc << 1) | u64::from(set)
    })
}

/// Paints one row given a per-column color; `NO_COLOR_INDEX` leaves the
/// pixel alone.
fn paint_row(
    dev: &mut Device,
    x: i32,
    y: i32,
    width: i32,
    mut color_at: impl FnMut(i32) -> ColorIndex,
) -> DeviceResult<()> {
    let mut start = 0;
    while start < width {
        let color = color_at(start);
        let mut end = start + 1;
        while end < width && color_at(end) == color {
            end += 1;
        }
        if color != NO_COLOR_INDEX {
            dev.fill_rectangle(x + start, y, end - start, 1, color)?;
        }
        start = end;
    }
    Ok(())
}

pub fn copy_mono(
    dev: &mut Device,
    bitmap: &Bitmap<'_>,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    zero: ColorIndex,
    one: ColorIndex,
) -> DeviceResult<()> {
    for row in 0..height.max(0) {
        paint_row(dev, x, y + row, width, |col| if bitmap.bit(row as usize, col) { one } else { zero })?;
    }
    Ok(())
}

/// Source pixels are `depth` bits each, packed like the device's colors.
pub fn copy_color(dev: &mut Device, bitmap: &Bitmap<'_>, x: i32, y: i32, width: i32, height: i32) -> DeviceResult<()> {
    let depth = u32::from(dev.state().color_info.depth);
    for row in 0..height.max(0) {
        let data = bitmap.row(row as usize);
        paint_row(dev, x, y + row, width, |col| {
            read_bits(data, ((bitmap.data_x + col) as usize) * depth as usize, depth)
        })?;
    }
    Ok(())
}

/// Alpha samples are thresholded at half coverage.
pub fn copy_alpha(
    dev: &mut Device,
    bitmap: &Bitmap<'_>,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    color: ColorIndex,
    depth: u8,
) -> DeviceResult<()> {
    let depth = u32::from(depth.clamp(1, 16));
    let max = (1u64 << depth) - 1;
    for row in 0..height.max(0) {
        let data = bitmap.row(row as usize);
        paint_row(dev, x, y + row, width, |col| {
            let alpha = read_bits(data, ((bitmap.data_x + col) as usize) * depth as usize, depth);
            if alpha * 2 > max { color } else { NO_COLOR_INDEX }
        })?;
    }
    Ok(())
}

pub fn copy_alpha_hl_color(
    _dev: &mut Device,
    _bitmap: &Bitmap<'_>,
    _x: i32,
    _y: i32,
    _width: i32,
    _height: i32,
    _color: &DeviceColor,
    _depth: u8,
) -> DeviceResult<()> {
    Err(DeviceError::Range("copy_alpha_hl_color has no generic implementation".into()))
}

/// A mask: set bits paint `color`, clear bits leave the device alone.
pub fn fill_mask(
    dev: &mut Device,
    bitmap: &Bitmap<'_>,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    color: &DeviceColor,
    depth: u8,
    _lop: LogicalOp,
    clip: Option<&ClipPath>,
) -> DeviceResult<()> {
    let Some(color) = pure_color(dev, color) else {
        return Ok(());
    };
    let area = clip_rect(dev, clip).intersect(&pagechain_types::IntRect::from_size(x, y, width, height));
    if area.is_empty() {
        return Ok(());
    }
    let (dx, dy) = (area.p.x - x, area.p.y - y);
    let start = (dy.max(0) as usize * bitmap.raster).min(bitmap.data.len());
    let sub = Bitmap {
        data: &bitmap.data[start..],
        data_x: bitmap.data_x + dx,
        raster: bitmap.raster,
        id: bitmap.id,
    };
    if depth > 1 {
        dev.copy_alpha(&sub, area.p.x, area.p.y, area.width(), area.height(), color, depth)
    } else {
        dev.copy_mono(&sub, area.p.x, area.p.y, area.width(), area.height(), NO_COLOR_INDEX, color)
    }
}

pub fn tile_rectangle(
    dev: &mut Device,
    tile: &TileBitmap,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    color0: ColorIndex,
    color1: ColorIndex,
    phase: Phase,
) -> DeviceResult<()> {
    let strip = StripBitmap {
        tile: tile.clone(),
        rep_width: tile.width,
        rep_height: tile.height,
        shift: 0,
    };
    dev.strip_tile_rectangle(&strip, x, y, width, height, color0, color1, phase)
}

/// When both colors are `NO_COLOR_INDEX` the tile holds device pixels;
/// otherwise it is a mono tile painted with the two colors.
pub fn strip_tile_rectangle(
    dev: &mut Device,
    tiles: &StripBitmap,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    color0: ColorIndex,
    color1: ColorIndex,
    phase: Phase,
) -> DeviceResult<()> {
    let rep_w = tiles.rep_width.max(1) as i32;
    let rep_h = tiles.rep_height.max(1) as i32;
    let colored = color0 == NO_COLOR_INDEX && color1 == NO_COLOR_INDEX;
    let depth = if colored { u32::from(dev.state().color_info.depth) } else { 1 };
    let tile = &tiles.tile;
    for row in 0..height.max(0) {
        let ty = y + row + phase.y;
        let strip = ty.div_euclid(rep_h);
        let tile_row = ty.rem_euclid(rep_h) as usize;
        let shift = strip * tiles.shift as i32;
        let start = (tile_row * tile.raster).min(tile.data.len());
        let end = (start + tile.raster).min(tile.data.len());
        let data = &tile.data[start..end];
        paint_row(dev, x, y + row, width, |col| {
            let tx = (x + col + phase.x + shift).rem_euclid(rep_w) as usize;
            let sample = read_bits(data, tx * depth as usize, depth);
            match (colored, sample) {
                (true, pixel) => pixel,
                (false, 0) => color0,
                (false, _) => color1,
            }
        })?;
    }
    Ok(())
}

pub fn strip_tile_rect_devn(
    dev: &mut Device,
    tiles: &StripBitmap,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    color0: &DeviceColor,
    color1: &DeviceColor,
    phase: Phase,
) -> DeviceResult<()> {
    let c0 = pure_color(dev, color0).unwrap_or(NO_COLOR_INDEX);
    let c1 = pure_color(dev, color1).unwrap_or(NO_COLOR_INDEX);
    dev.strip_tile_rectangle(tiles, x, y, width, height, c0, c1, phase)
}

pub fn copy_rop(dev: &mut Device, args: &RopArgs<'_>) -> DeviceResult<()> {
    dev.strip_copy_rop(args)
}

pub fn strip_copy_rop2(dev: &mut Device, args: &RopArgs<'_>) -> DeviceResult<()> {
    if args.planar_height != 0 {
        return Err(DeviceError::Unsupported(Op::StripCopyRop2));
    }
    dev.strip_copy_rop(args)
}

/// Handles the raster ops that reduce to a plain fill or copy: all-zero,
/// all-one, destination, source and texture.
pub fn strip_copy_rop(dev: &mut Device, args: &RopArgs<'_>) -> DeviceResult<()> {
    let r = args.rect;
    if r.is_empty() {
        return Ok(());
    }
    match args.lop & 0xff {
        0xaa => Ok(()),
        0x00 => dev.fill_rectangle(r.p.x, r.p.y, r.width(), r.height(), 0),
        0xff => {
            let depth = u32::from(dev.state().color_info.depth).min(63);
            dev.fill_rectangle(r.p.x, r.p.y, r.width(), r.height(), (1u64 << depth) - 1)
        }
        0xcc => match (&args.source, args.source_colors) {
            (Some(source), Some([zero, one])) => dev.copy_mono(source, r.p.x, r.p.y, r.width(), r.height(), zero, one),
            (Some(source), None) => dev.copy_color(source, r.p.x, r.p.y, r.width(), r.height()),
            (None, _) => Err(DeviceError::Unsupported(Op::StripCopyRop)),
        },
        0xf0 => match (args.texture, args.texture_colors) {
            (Some(texture), colors) => {
                let [c0, c1] = colors.unwrap_or([NO_COLOR_INDEX; 2]);
                dev.strip_tile_rectangle(texture, r.p.x, r.p.y, r.width(), r.height(), c0, c1, args.phase)
            }
            (None, Some([solid, _])) => dev.fill_rectangle(r.p.x, r.p.y, r.width(), r.height(), solid),
            (None, None) => Err(DeviceError::Unsupported(Op::StripCopyRop)),
        },
        _ => Err(DeviceError::Unsupported(Op::StripCopyRop)),
    }
}

/// Planes of `plane_height` rows, one per component, combined into
/// chunky device pixels.
pub fn copy_planes(
    dev: &mut Device,
    bitmap: &Bitmap<'_>,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    plane_height: u32,
) -> DeviceResult<()> {
    let info = &dev.state().color_info;
    let ncomp = usize::from(info.num_components.max(1));
    let bits = u32::from(info.bits_per_component());
    for row in 0..height.max(0) {
        let rows: Vec<&[u8]> =
            (0..ncomp).map(|p| bitmap.row(p * plane_height as usize + row as usize)).collect();
        paint_row(dev, x, y + row, width, |col| {
            let offset = ((bitmap.data_x + col) as usize) * bits as usize;
            rows.iter().fold(0u64, |acc, plane| (acc << bits) | read_bits(plane, offset, bits))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::read_bits;

    #[test]
    fn read_bits_spans_byte_boundaries() {
        let row = [0b0000_0011u8, 0b1100_0000];
        assert_eq!(read_bits(&row, 6, 4), 0b1111);
        assert_eq!(read_bits(&row, 0, 8), 3);
        assert_eq!(read_bits(&row, 14, 4), 0);
    }
}
