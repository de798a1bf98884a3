//! Generic implementations used when a device leaves an operation to the
//! default library.
//!
//! Every function here takes the device it is running for and reaches other
//! operations through that device's dispatch, so a terminal that implements
//! only `fill_rectangle` still gets paths, masks, tiles and images drawn.

mod color;
mod copy;
mod fill;
mod params;

pub use color::*;
pub use copy::*;
pub use fill::*;
pub use params::*;

pub(crate) use copy::read_bits;

use crate::device::{Device, DeviceId};
use crate::enumerator::{DefaultImageEnum, DefaultTextEnum, ImageEnum, TextEnum};
use crate::error::{DeviceError, DeviceResult};
use crate::op::Op;
use crate::procs::{CompositorTarget, DevSpecRequest};
use pagechain_types::geometry::int2fixed;
use pagechain_types::graphics::{
    AlphaBitsKind, BitmapId, ClipPath, ColorSpaceRef, Compositor, DevnParams, Font, GetBitsParams,
    ImageDescriptor, ImagePlane, ImagerState, PatternManage, ProcessPageOptions, TextParams,
    TransparencyGroupParams, TransparencyMaskParams,
};
use pagechain_types::{
    DeviceColor, DeviceProfile, FixedPoint, FixedRect, GraphicsTypeTag, IntRect, Matrix, ParamList, ProfileHandle,
    Rect,
};
use std::sync::Arc;

pub fn open_device(_dev: &mut Device) -> DeviceResult<()> {
    Ok(())
}

pub fn sync_output(_dev: &mut Device) -> DeviceResult<()> {
    Ok(())
}

/// Counts the page; devices that actually emit output do so before calling this.
pub fn output_page(dev: &mut Device, num_copies: u32, _flush: bool) -> DeviceResult<()> {
    let state = dev.state_mut();
    state.page_count += i64::from(num_copies);
    state.showpage_count += 1;
    Ok(())
}

pub fn close_device(_dev: &mut Device) -> DeviceResult<()> {
    Ok(())
}

pub fn get_initial_matrix(dev: &Device) -> Matrix {
    let state = dev.state();
    Matrix::new(
        f64::from(state.hw_resolution[0]) / 72.0,
        0.0,
        0.0,
        -f64::from(state.hw_resolution[1]) / 72.0,
        0.0,
        f64::from(state.height),
    )
}

/// Reads one row through `get_bits_rectangle`; never the other way round.
pub fn get_bits(dev: &Device, y: i32, data: &mut [u8]) -> DeviceResult<()> {
    let rect = IntRect::new(0, y, dev.state().width, y + 1);
    let mut params = GetBitsParams::default();
    dev.get_bits_rectangle(&rect, &mut params)?;
    let n = data.len().min(params.data.len());
    data[..n].copy_from_slice(&params.data[..n]);
    Ok(())
}

pub fn get_bits_rectangle(_dev: &Device, _rect: &IntRect, _params: &mut GetBitsParams) -> DeviceResult<()> {
    Err(DeviceError::Unsupported(Op::GetBitsRectangle))
}

pub fn get_xfont_procs(_dev: &Device) -> Option<&'static str> {
    None
}

pub fn get_xfont_device(dev: &Device) -> DeviceId {
    dev.id()
}

pub fn get_page_device(_dev: &Device) -> Option<DeviceId> {
    None
}

pub fn get_alpha_bits(_dev: &Device, _kind: AlphaBitsKind) -> u8 {
    1
}

pub fn get_band(_dev: &Device, _y: i32) -> Option<(i32, i32)> {
    None
}

/// The whole device, in fixed coordinates.
pub fn get_clipping_box(dev: &Device) -> FixedRect {
    let state = dev.state();
    FixedRect::new(0, 0, int2fixed(state.width), int2fixed(state.height))
}

pub fn get_hardware_params(_dev: &Device, _list: &mut ParamList) -> DeviceResult<()> {
    Ok(())
}

pub fn ret_devn_params(_dev: &Device) -> Option<DevnParams> {
    None
}

/// The device's profile; failing that, one named by its color info; failing
/// that, the default for its component count.
pub fn get_profile(dev: &Device) -> ProfileHandle {
    let state = dev.state();
    if let Some(profile) = &state.icc_profile {
        return Arc::clone(profile);
    }
    let info = &state.color_info;
    if !info.icc_profile.is_empty() {
        return Arc::new(DeviceProfile::named(info.icc_profile.clone(), info.num_components));
    }
    Arc::new(DeviceProfile::default_for_components(info.num_components))
}

pub fn begin_image(
    dev: &mut Device,
    pis: &ImagerState,
    image: &ImageDescriptor,
    color: &DeviceColor,
    clip: Option<&ClipPath>,
) -> DeviceResult<Box<dyn ImageEnum>> {
    dev.begin_typed_image(pis, None, image, None, color, clip)
}

pub fn begin_typed_image(
    dev: &mut Device,
    pis: &ImagerState,
    matrix: Option<&Matrix>,
    image: &ImageDescriptor,
    rect: Option<&IntRect>,
    color: &DeviceColor,
    clip: Option<&ClipPath>,
) -> DeviceResult<Box<dyn ImageEnum>> {
    Ok(Box::new(DefaultImageEnum::new(dev, pis, matrix, image, rect, color, clip)?))
}

/// Hands the rows to the enumerator, running it against the device that
/// created it when that device is further down the chain.
pub fn image_data(
    dev: &mut Device,
    info: &mut dyn ImageEnum,
    planes: &[ImagePlane<'_>],
    height: u32,
) -> DeviceResult<bool> {
    let owner = info.device_id();
    match dev.find_mut(owner) {
        Some(target) => info.plane_data(target, planes, height),
        None => info.plane_data(dev, planes, height),
    }
}

pub fn end_image(dev: &mut Device, info: Box<dyn ImageEnum>, draw_last: bool) -> DeviceResult<()> {
    let owner = info.device_id();
    match dev.find_mut(owner) {
        Some(target) => info.end_image(target, draw_last),
        None => info.end_image(dev, draw_last),
    }
}

pub fn create_compositor(dev: &mut Device, _compositor: &Compositor, _pis: &ImagerState) -> DeviceResult<CompositorTarget> {
    Ok(CompositorTarget::Current(dev.id()))
}

pub fn text_begin(
    dev: &mut Device,
    _pis: &ImagerState,
    text: &TextParams,
    font: &Font,
    origin: FixedPoint,
    _color: &DeviceColor,
    _clip: Option<&ClipPath>,
) -> DeviceResult<Box<dyn TextEnum>> {
    Ok(Box::new(DefaultTextEnum::new(dev.id(), text, font, origin)))
}

/// A copied device starts closed; its buffers belong to the original.
pub fn finish_copydevice(dev: &mut Device, _from: &Device) -> DeviceResult<()> {
    dev.set_open(false);
    Ok(())
}

pub fn begin_transparency_group(
    _dev: &mut Device,
    _params: &TransparencyGroupParams,
    _bbox: &Rect,
    _pis: &ImagerState,
) -> DeviceResult<()> {
    Ok(())
}

pub fn end_transparency_group(_dev: &mut Device, _pis: &ImagerState) -> DeviceResult<()> {
    Ok(())
}

pub fn begin_transparency_mask(
    _dev: &mut Device,
    _params: &TransparencyMaskParams,
    _bbox: &Rect,
    _pis: &ImagerState,
) -> DeviceResult<()> {
    Ok(())
}

pub fn end_transparency_mask(_dev: &mut Device, _pis: &ImagerState) -> DeviceResult<()> {
    Ok(())
}

pub fn discard_transparency_layer(_dev: &mut Device, _pis: &ImagerState) -> DeviceResult<()> {
    Ok(())
}

pub fn push_transparency_state(_dev: &mut Device, _pis: &ImagerState) -> DeviceResult<()> {
    Ok(())
}

pub fn pop_transparency_state(_dev: &mut Device, _pis: &ImagerState) -> DeviceResult<()> {
    Ok(())
}

/// `Ok(false)`: the device does not accumulate patterns itself.
pub fn pattern_manage(_dev: &mut Device, _id: BitmapId, _function: PatternManage) -> DeviceResult<bool> {
    Ok(false)
}

pub fn include_color_space(_dev: &mut Device, _space: &ColorSpaceRef) -> DeviceResult<()> {
    Ok(())
}

pub fn update_spot_equivalent_colors(_dev: &mut Device, _pis: &ImagerState) -> DeviceResult<()> {
    Ok(())
}

pub fn put_image(_dev: &mut Device, _planes: &[&[u8]], _rect: IntRect, _row_stride: usize) -> DeviceResult<()> {
    Err(DeviceError::Unsupported(Op::PutImage))
}

pub fn dev_spec_op(dev: &mut Device, request: &DevSpecRequest) -> DeviceResult<i64> {
    match request {
        DevSpecRequest::SupportsDevn | DevSpecRequest::SupportsHlColor => Ok(0),
        DevSpecRequest::PageUsesTransparency => Ok(i64::from(dev.state().page_uses_transparency)),
        DevSpecRequest::Named(name) => Err(DeviceError::Undefined(format!("dev_spec_op '{name}'"))),
    }
}

pub fn set_graphics_type_tag(dev: &mut Device, tag: GraphicsTypeTag) {
    dev.state_mut().graphics_type_tag = tag;
}

pub fn process_page(_dev: &mut Device, _options: &mut ProcessPageOptions<'_>) -> DeviceResult<()> {
    Err(DeviceError::Unsupported(Op::ProcessPage))
}

/// A drawing color as a single device index, when it has one.
pub(crate) fn pure_color(dev: &Device, color: &DeviceColor) -> Option<pagechain_types::ColorIndex> {
    match color {
        DeviceColor::Pure(c) => Some(*c),
        DeviceColor::DevN(values) => Some(dev.encode_color(values)),
        DeviceColor::Null => None,
    }
}

/// The device rectangle, optionally narrowed by a clip.
pub(crate) fn clip_rect(dev: &Device, clip: Option<&ClipPath>) -> IntRect {
    let state = dev.state();
    let page = IntRect::new(0, 0, state.width, state.height);
    match clip {
        Some(clip) => page.intersect(&clip.outer_box.to_int_rect()),
        None => page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceState, Prototype};
    use crate::memory::HeapMemory;
    use crate::op::OpTable;

    #[derive(Debug)]
    struct Bare;

    impl crate::procs::DeviceProcs for Bare {}

    fn bare_device() -> Device {
        let prototype = Prototype::new("bare", Bare, OpTable::unset());
        Device::new(&prototype, DeviceState::default(), Arc::new(HeapMemory::new())).unwrap()
    }

    #[test]
    fn initial_matrix_flips_y_and_scales_to_resolution() {
        let mut dev = bare_device();
        dev.state_mut().hw_resolution = [144.0, 144.0];
        dev.state_mut().update_dimensions();
        let m = dev.get_initial_matrix();
        assert_eq!(m.to_array(), [2.0, 0.0, 0.0, -2.0, 0.0, 1584.0]);
    }

    #[test]
    fn output_page_counts_copies() {
        let mut dev = bare_device();
        dev.output_page(2, true).unwrap();
        assert_eq!(dev.state().page_count, 2);
        assert_eq!(dev.state().showpage_count, 1);
    }

    #[test]
    fn bufferless_device_cannot_read_bits() {
        let dev = bare_device();
        let mut row = vec![0u8; 8];
        let err = dev.get_bits(0, &mut row).unwrap_err();
        assert!(matches!(err, DeviceError::Unsupported(Op::GetBitsRectangle)));
    }

    #[test]
    fn profile_falls_back_to_component_default() {
        let mut dev = bare_device();
        assert_eq!(dev.get_profile().name, pagechain_types::profile::DEFAULT_RGB_ICC);
        dev.state_mut().color_info.icc_profile = "press.icc".into();
        assert_eq!(dev.get_profile().name, "press.icc");
    }

    #[test]
    fn unknown_dev_spec_op_is_undefined() {
        let mut dev = bare_device();
        assert_eq!(dev.dev_spec_op(&DevSpecRequest::SupportsDevn).unwrap(), 0);
        let err = dev.dev_spec_op(&DevSpecRequest::Named("frobnicate".into())).unwrap_err();
        assert!(matches!(err, DeviceError::Undefined(_)));
    }

    #[test]
    fn compositor_default_keeps_the_current_device() {
        let mut dev = bare_device();
        let target = dev.create_compositor(&Compositor::Alpha { alpha: 0.5 }, &ImagerState::default()).unwrap();
        assert!(matches!(target, CompositorTarget::Current(id) if id == dev.id()));
    }
}
