use crate::device::Device;
use crate::error::{DeviceError, DeviceResult};
use pagechain_types::{ColorIndex, ColorMapping, ColorValue, MAX_COLOR_VALUE, NO_COLOR_INDEX};

/// Bits per component and component count, as the packing sees them.
fn layout(dev: &Device) -> (u32, usize) {
    let info = &dev.state().color_info;
    (u32::from(info.bits_per_component()).min(16), usize::from(info.num_components.max(1)))
}

/// Packs components MSB first, `depth / num_components` bits each.
pub fn encode_color(dev: &Device, cv: &[ColorValue]) -> ColorIndex {
    let (bits, ncomp) = layout(dev);
    let mut color: ColorIndex = 0;
    for i in 0..ncomp {
        let value = cv.get(i).copied().unwrap_or(0);
        color = (color << bits) | ColorIndex::from(value >> (16 - bits));
    }
    color
}

pub fn decode_color(dev: &Device, color: ColorIndex) -> DeviceResult<Vec<ColorValue>> {
    if color == NO_COLOR_INDEX {
        return Err(DeviceError::Range("cannot decode the transparent color index".into()));
    }
    let (bits, ncomp) = layout(dev);
    let mask: ColorIndex = (1 << bits) - 1;
    let mut out = vec![0; ncomp];
    for (i, slot) in out.iter_mut().enumerate() {
        let shift = bits * (ncomp - 1 - i) as u32;
        let raw = (color >> shift) & mask;
        *slot = (raw * ColorIndex::from(MAX_COLOR_VALUE) / mask) as ColorValue;
    }
    Ok(out)
}

pub fn get_color_mapping_procs(dev: &Device) -> ColorMapping {
    ColorMapping::for_components(dev.state().color_info.num_components)
}

pub fn get_color_comp_index(dev: &Device, name: &str) -> Option<usize> {
    let model = dev.state().color_info.model();
    model.colorant_names().iter().position(|n| *n == name)
}

pub fn map_rgb_color(dev: &Device, cv: &[ColorValue]) -> ColorIndex {
    let at = |i: usize| cv.get(i).copied().unwrap_or(0);
    let comps = dev.get_color_mapping_procs().map_rgb(at(0), at(1), at(2));
    dev.encode_color(&comps)
}

pub fn map_cmyk_color(dev: &Device, cv: &[ColorValue]) -> ColorIndex {
    let at = |i: usize| cv.get(i).copied().unwrap_or(0);
    let comps = dev.get_color_mapping_procs().map_cmyk(at(0), at(1), at(2), at(3));
    dev.encode_color(&comps)
}

/// Alpha is dropped; devices without an alpha channel paint opaque.
pub fn map_rgb_alpha_color(dev: &Device, rgb: [ColorValue; 3], _alpha: ColorValue) -> ColorIndex {
    dev.map_rgb_color(&rgb)
}

pub fn map_color_rgb(dev: &Device, color: ColorIndex) -> DeviceResult<[ColorValue; 3]> {
    let comps = dev.decode_color(color)?;
    Ok(match comps.as_slice() {
        [gray] => [*gray; 3],
        [r, g, b] => [*r, *g, *b],
        [c, m, y, k, ..] => {
            let inv = |v: ColorValue| MAX_COLOR_VALUE.saturating_sub(v.saturating_add(*k));
            [inv(*c), inv(*m), inv(*y)]
        }
        other => {
            return Err(DeviceError::Range(format!("cannot map {} components to RGB", other.len())));
        }
    })
}

pub fn map_color_rgb_alpha(dev: &Device, color: ColorIndex) -> DeviceResult<[ColorValue; 4]> {
    let [r, g, b] = dev.map_color_rgb(color)?;
    Ok([r, g, b, MAX_COLOR_VALUE])
}
