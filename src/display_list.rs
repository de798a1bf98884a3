//! JSON display lists and their replay through a device chain.
//!
//! A display list is a flat sequence of drawing operations in device
//! space (the imager state's CTM is the identity). Colors are given as 1, 3
//! or 4 components in `0.0..=1.0`, read as gray, RGB or CMYK, and mapped
//! into the chain's process color model before encoding.
//!
//! ```json
//! { "ops": [
//!     { "op": "fill_rect", "x": 10, "y": 10, "width": 50, "height": 20, "color": [1, 0, 0] },
//!     { "op": "show_page" }
//! ] }
//! ```

use crate::error::PipelineError;
use log::debug;
use pagechain_device::{Device, TextEnum};
use pagechain_types::geometry::float2fixed;
use pagechain_types::graphics::{
    BlendMode, FillParams, FillRule, Font, ImageDescriptor, ImagePlane, ImagerState, Path, StrokeParams, TextParams,
    TransparencyGroupParams,
};
use pagechain_types::{
    ColorIndex, ColorValue, DeviceColor, FixedPoint, MAX_COLOR_VALUE, Matrix, ParamList, ParamValue, Rect,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path as FsPath;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayList {
    #[serde(default)]
    pub ops: Vec<DrawOp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawOp {
    FillRect {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        color: Vec<f32>,
    },
    /// A closed polygon.
    FillPath {
        points: Vec<[f64; 2]>,
        color: Vec<f32>,
        #[serde(default)]
        even_odd: bool,
    },
    StrokePath {
        points: Vec<[f64; 2]>,
        color: Vec<f32>,
        #[serde(default = "default_line_width")]
        line_width: f64,
        #[serde(default)]
        closed: bool,
    },
    /// A sampled image with its lower-left sample at `(x, y)`, each sample
    /// `scale` units square. Zero components makes it a 1-bit stencil mask
    /// painted in `color`.
    Image {
        x: f64,
        y: f64,
        #[serde(default = "default_scale")]
        scale: f64,
        width: u32,
        height: u32,
        #[serde(default = "default_components")]
        components: u8,
        #[serde(default = "default_bits")]
        bits: u8,
        #[serde(default)]
        color: Vec<f32>,
        data: Vec<u8>,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        #[serde(default = "default_font")]
        font: String,
        #[serde(default = "default_font_size")]
        size: f64,
        color: Vec<f32>,
    },
    BeginGroup {
        bbox: [f64; 4],
        #[serde(default = "default_alpha")]
        alpha: f32,
        #[serde(default)]
        blend_mode: BlendMode,
    },
    EndGroup,
    /// Sent to the chain with `put_params`.
    Params {
        values: BTreeMap<String, ParamValue>,
    },
    ShowPage {
        #[serde(default = "default_copies")]
        copies: u32,
    },
}

fn default_line_width() -> f64 {
    1.0
}

fn default_scale() -> f64 {
    1.0
}

fn default_components() -> u8 {
    1
}

fn default_bits() -> u8 {
    8
}

fn default_font() -> String {
    "Helvetica".to_string()
}

fn default_font_size() -> f64 {
    12.0
}

fn default_alpha() -> f32 {
    1.0
}

fn default_copies() -> u32 {
    1
}

impl DisplayList {
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<FsPath>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| {
            PipelineError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read display list from '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_json(&source)
    }

    /// Pages this list ends with `show_page`.
    pub fn page_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, DrawOp::ShowPage { .. })).count()
    }
}

/// Plays `list` into `dev`, which must be open. Returns the pages shown.
pub fn replay(dev: &mut Device, list: &DisplayList) -> Result<usize, PipelineError> {
    let pis = ImagerState::default();
    let mut pages = 0;
    for (index, op) in list.ops.iter().enumerate() {
        match op {
            DrawOp::FillRect { x, y, width, height, color } => {
                let color = encode(dev, color, index)?;
                dev.fill_rectangle(*x, *y, *width, *height, color)?;
            }
            DrawOp::FillPath { points, color, even_odd } => {
                let path = polygon(points, true, index)?;
                let color = DeviceColor::Pure(encode(dev, color, index)?);
                let rule = if *even_odd { FillRule::EvenOdd } else { FillRule::NonZero };
                let params = FillParams { rule, ..FillParams::default() };
                dev.fill_path(&pis, &path, &params, &color, None)?;
            }
            DrawOp::StrokePath { points, color, line_width, closed } => {
                let path = polygon(points, *closed, index)?;
                let color = DeviceColor::Pure(encode(dev, color, index)?);
                let params = StrokeParams { line_width: *line_width, ..StrokeParams::default() };
                dev.stroke_path(&pis, &path, &params, &color, None)?;
            }
            DrawOp::Image { x, y, scale, width, height, components, bits, color, data } => {
                draw_image(dev, &pis, index, ImageOp {
                    origin: (*x, *y),
                    scale: *scale,
                    size: (*width, *height),
                    components: *components,
                    bits: *bits,
                    color,
                    data,
                })?;
            }
            DrawOp::Text { x, y, text, font, size, color } => {
                let color = DeviceColor::Pure(encode(dev, color, index)?);
                let font = Font::new(font.as_str(), *size);
                let origin = FixedPoint::new(float2fixed(*x), float2fixed(*y));
                let mut en = dev.text_begin(&pis, &TextParams::show(text), &font, origin, &color, None)?;
                en.process(dev)?;
            }
            DrawOp::BeginGroup { bbox, alpha, blend_mode } => {
                let params = TransparencyGroupParams { alpha: *alpha, blend_mode: *blend_mode, ..Default::default() };
                let bbox = Rect::new(bbox[0], bbox[1], bbox[2], bbox[3]);
                dev.begin_transparency_group(&params, &bbox, &pis)?;
            }
            DrawOp::EndGroup => dev.end_transparency_group(&pis)?,
            DrawOp::Params { values } => {
                let mut list = ParamList::new();
                for (key, value) in values {
                    list.set(key.as_str(), value.clone());
                }
                dev.put_params(&mut list)?;
            }
            DrawOp::ShowPage { copies } => {
                dev.output_page(*copies, true)?;
                pages += 1;
            }
        }
    }
    debug!("replayed {} operations, {} pages shown", list.ops.len(), pages);
    Ok(pages)
}

struct ImageOp<'a> {
    origin: (f64, f64),
    scale: f64,
    size: (u32, u32),
    components: u8,
    bits: u8,
    color: &'a [f32],
    data: &'a [u8],
}

fn draw_image(dev: &mut Device, pis: &ImagerState, index: usize, op: ImageOp<'_>) -> Result<(), PipelineError> {
    let (width, height) = op.size;
    let (mut image, color) = if op.components == 0 {
        (ImageDescriptor::mask(width, height), DeviceColor::Pure(encode(dev, op.color, index)?))
    } else {
        let mut image = ImageDescriptor::new(width, height, op.components);
        image.bits_per_component = op.bits;
        (image, DeviceColor::Null)
    };
    let placement = Matrix::new(op.scale, 0.0, 0.0, op.scale, op.origin.0, op.origin.1);
    image.image_matrix = placement.invert().ok_or_else(|| PipelineError::DisplayList {
        index,
        message: format!("image scale {} cannot be inverted", op.scale),
    })?;

    let raster = (width as usize * usize::from(image.num_components) * usize::from(image.bits_per_component)).div_ceil(8);
    if op.data.len() < raster * height as usize {
        return Err(PipelineError::DisplayList {
            index,
            message: format!("image needs {} bytes of samples, got {}", raster * height as usize, op.data.len()),
        });
    }

    let mut info = dev.begin_typed_image(pis, None, &image, None, &color, None)?;
    let planes = [ImagePlane { data: op.data, data_x: 0, raster }];
    dev.image_data(info.as_mut(), &planes, height)?;
    dev.end_image(info, true)?;
    Ok(())
}

fn polygon(points: &[[f64; 2]], closed: bool, index: usize) -> Result<Path, PipelineError> {
    let Some((first, rest)) = points.split_first() else {
        return Err(PipelineError::DisplayList { index, message: "path has no points".to_string() });
    };
    let mut path = Path::new().move_to(float2fixed(first[0]), float2fixed(first[1]));
    for point in rest {
        path = path.line_to(float2fixed(point[0]), float2fixed(point[1]));
    }
    Ok(if closed { path.close() } else { path })
}

fn component(value: f32) -> ColorValue {
    (value.clamp(0.0, 1.0) * f32::from(MAX_COLOR_VALUE)).round() as ColorValue
}

/// Maps a gray, RGB or CMYK color into the chain's color model and encodes it.
fn encode(dev: &Device, color: &[f32], index: usize) -> Result<ColorIndex, PipelineError> {
    let mapping = dev.get_color_mapping_procs();
    let cv = match *color {
        [g] => mapping.map_gray(component(g)),
        [r, g, b] => mapping.map_rgb(component(r), component(g), component(b)),
        [c, m, y, k] => mapping.map_cmyk(component(c), component(m), component(y), component(k)),
        _ => {
            return Err(PipelineError::DisplayList {
                index,
                message: format!("colors have 1, 3 or 4 components, not {}", color.len()),
            });
        }
    };
    Ok(dev.encode_color(&cv))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_are_tagged_by_name() {
        let list = DisplayList::from_json(
            r#"{ "ops": [
                { "op": "fill_rect", "x": 1, "y": 2, "width": 3, "height": 4, "color": [0.5] },
                { "op": "end_group" },
                { "op": "show_page" }
            ] }"#,
        )
        .unwrap();
        assert_eq!(list.ops[1], DrawOp::EndGroup);
        assert_eq!(list.ops[2], DrawOp::ShowPage { copies: 1 });
        assert_eq!(list.page_count(), 1);
    }

    #[test]
    fn params_keep_their_value_types() {
        let list = DisplayList::from_json(
            r#"{ "ops": [ { "op": "params", "values": { "FirstPage": 2, "Name": "x", "HWResolution": [72.5, 72.5] } } ] }"#,
        )
        .unwrap();
        let DrawOp::Params { values } = &list.ops[0] else { panic!("not params") };
        assert_eq!(values["FirstPage"], ParamValue::Int(2));
        assert_eq!(values["Name"], ParamValue::String("x".into()));
        assert_eq!(values["HWResolution"], ParamValue::FloatArray(vec![72.5, 72.5]));
    }

    #[test]
    fn components_clamp_to_full_scale() {
        assert_eq!(component(2.0), MAX_COLOR_VALUE);
        assert_eq!(component(-1.0), 0);
        assert_eq!(component(0.5), 32768);
    }

    #[test]
    fn empty_paths_are_rejected() {
        assert!(matches!(polygon(&[], true, 7), Err(PipelineError::DisplayList { index: 7, .. })));
    }
}
