//! The standard device parameters.
//!
//! `put_params` validates every recognized key before applying any of them,
//! so a rejected list leaves the device exactly as it was.

use crate::device::Device;
use crate::error::{DeviceError, DeviceResult};
use pagechain_types::{ParamList, ParamValue, Rect};

pub fn get_params(dev: &Device, list: &mut ParamList) -> DeviceResult<()> {
    let state = dev.state();
    let floats = |v: &[f32]| ParamValue::FloatArray(v.iter().map(|f| f64::from(*f)).collect());
    list.set("Name", dev.name());
    list.set("HWResolution", floats(&state.hw_resolution));
    list.set("MediaSize", floats(&state.media_size));
    list.set("PageSize", floats(&state.media_size));
    list.set("Margins", floats(&state.margins));
    list.set("HWMargins", floats(&state.hw_margins));
    list.set("Width", state.width);
    list.set("Height", state.height);
    list.set("FirstPage", state.first_page);
    list.set("LastPage", state.last_page);
    list.set("NumCopies", state.num_copies);
    list.set("PageCount", state.page_count);
    list.set("ProcessColorModel", state.color_info.model().name());
    list.set("BitsPerPixel", i64::from(state.color_info.depth));
    list.set("PageUsesTransparency", state.page_uses_transparency);
    if state.imaging_bbox_set {
        let b = state.imaging_bbox;
        list.set("ImagingBBox", vec![b.x0, b.y0, b.x1, b.y1]);
    }
    Ok(())
}

/// What a parameter list asks to change, checked but not yet applied.
#[derive(Debug, Default)]
struct Changes {
    hw_resolution: Option<[f32; 2]>,
    media_size: Option<[f32; 2]>,
    margins: Option<[f32; 2]>,
    hw_margins: Option<[f32; 4]>,
    first_page: Option<i32>,
    last_page: Option<i32>,
    num_copies: Option<i32>,
    page_uses_transparency: Option<bool>,
    imaging_bbox: Option<Rect>,
}

fn float_array<const N: usize>(key: &str, value: &ParamValue) -> DeviceResult<[f32; N]> {
    let values = value
        .as_floats()
        .ok_or_else(|| DeviceError::Range(format!("{key} must be a numeric array")))?;
    let array: [f64; N] = values
        .try_into()
        .map_err(|v: Vec<f64>| DeviceError::Range(format!("{key} needs {N} values, got {}", v.len())))?;
    Ok(array.map(|f| f as f32))
}

fn positive<const N: usize>(key: &str, values: [f32; N]) -> DeviceResult<[f32; N]> {
    if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(DeviceError::Range(format!("{key} must be positive, got {values:?}")));
    }
    Ok(values)
}

fn int_in(key: &str, value: &ParamValue, min: i64) -> DeviceResult<i32> {
    let v = value.as_int().ok_or_else(|| DeviceError::Range(format!("{key} must be an integer")))?;
    if v < min || v > i64::from(i32::MAX) {
        return Err(DeviceError::Range(format!("{key} out of range: {v}")));
    }
    Ok(v as i32)
}

/// Read-only keys may be sent back unchanged, never altered.
fn check_read_only(dev: &Device, list: &mut ParamList) -> DeviceResult<()> {
    let state = dev.state();
    let current: [(&str, ParamValue); 6] = [
        ("Name", dev.name().into()),
        ("ProcessColorModel", state.color_info.model().name().into()),
        ("BitsPerPixel", i64::from(state.color_info.depth).into()),
        ("PageCount", state.page_count.into()),
        ("Width", state.width.into()),
        ("Height", state.height.into()),
    ];
    for (key, value) in current {
        if let Some(requested) = list.take(key) {
            let same = match (&requested, &value) {
                (ParamValue::String(a), ParamValue::String(b)) => a == b,
                _ => requested.as_int().is_some() && requested.as_int() == value.as_int(),
            };
            if !same {
                return Err(DeviceError::Range(format!("{key} is read-only")));
            }
        }
    }
    Ok(())
}

fn collect(dev: &Device, list: &mut ParamList) -> DeviceResult<Changes> {
    check_read_only(dev, list)?;
    let mut changes = Changes::default();
    if let Some(v) = list.take("HWResolution") {
        changes.hw_resolution = Some(positive("HWResolution", float_array("HWResolution", &v)?)?);
    }
    for key in ["MediaSize", "PageSize"] {
        if let Some(v) = list.take(key) {
            changes.media_size = Some(positive(key, float_array(key, &v)?)?);
        }
    }
    if let Some(v) = list.take("Margins") {
        changes.margins = Some(float_array("Margins", &v)?);
    }
    if let Some(v) = list.take("HWMargins") {
        changes.hw_margins = Some(float_array("HWMargins", &v)?);
    }
    if let Some(v) = list.take("FirstPage") {
        changes.first_page = Some(int_in("FirstPage", &v, 0)?);
    }
    if let Some(v) = list.take("LastPage") {
        changes.last_page = Some(int_in("LastPage", &v, 0)?);
    }
    if let Some(v) = list.take("NumCopies") {
        changes.num_copies = Some(int_in("NumCopies", &v, 1)?);
    }
    if let Some(v) = list.take("PageUsesTransparency") {
        let flag = v
            .as_bool()
            .ok_or_else(|| DeviceError::Range("PageUsesTransparency must be a boolean".into()))?;
        changes.page_uses_transparency = Some(flag);
    }
    if let Some(v) = list.take("ImagingBBox") {
        let [x0, y0, x1, y1] = float_array::<4>("ImagingBBox", &v)?;
        changes.imaging_bbox = Some(Rect::new(f64::from(x0), f64::from(y0), f64::from(x1), f64::from(y1)));
    }
    Ok(changes)
}

pub fn put_params(dev: &mut Device, list: &mut ParamList) -> DeviceResult<()> {
    let changes = collect(dev, list)?;
    let state = dev.state_mut();
    let geometry_changed = changes.hw_resolution.is_some() || changes.media_size.is_some();
    if let Some(v) = changes.hw_resolution {
        state.hw_resolution = v;
    }
    if let Some(v) = changes.media_size {
        state.media_size = v;
    }
    if let Some(v) = changes.margins {
        state.margins = v;
    }
    if let Some(v) = changes.hw_margins {
        state.hw_margins = v;
    }
    if let Some(v) = changes.first_page {
        state.first_page = v;
    }
    if let Some(v) = changes.last_page {
        state.last_page = v;
    }
    if let Some(v) = changes.num_copies {
        state.num_copies = v;
        state.num_copies_set = true;
    }
    if let Some(v) = changes.page_uses_transparency {
        state.page_uses_transparency = v;
    }
    if let Some(b) = changes.imaging_bbox {
        state.imaging_bbox = b;
        state.imaging_bbox_set = true;
    }
    if geometry_changed {
        state.update_dimensions();
    }
    Ok(())
}
