//! The forwarding stage: a device that passes every operation to the device
//! it wraps unless its policy says to swallow it.
//!
//! A policy only answers "is this operation suppressed right now"; the stage
//! takes care of what a suppressed operation returns, of keeping the
//! wrapper's state in step with its child, and of hiding the child's
//! identity from callers.

use crate::defaults;
use crate::device::{Device, DeviceId, DeviceState, Prototype};
use crate::enumerator::{ImageEnum, NullImageEnum, NullTextEnum, TextEnum};
use crate::error::DeviceResult;
use crate::op::{Op, OpTable};
use crate::procs::{CompositorTarget, DevSpecRequest, DeviceProcs};
use crate::subclass::resync;
use log::trace;
use pagechain_types::graphics::{
    AlphaBitsKind, Bitmap, BitmapId, ClipPath, ColorSpaceRef, Compositor, DevnParams, FillAttributes, FillParams,
    Font, GetBitsParams, ImageDescriptor, ImagePlane, ImagerState, LogicalOp, Path, PatternManage, Phase,
    ProcessPageOptions, RopArgs, ShadingVertex, StripBitmap, StrokeParams, TextParams, TileBitmap,
    TransparencyGroupParams, TransparencyMaskParams,
};
use pagechain_types::{
    ColorIndex, ColorMapping, ColorValue, DeviceColor, Fixed, FixedEdge, FixedPoint, FixedRect, GraphicsTypeTag,
    IntRect, Matrix, ParamList, ProfileHandle, Rect,
};
use std::any::Any;
use std::fmt;

/// Decides which operations a forwarding stage swallows.
pub trait StagePolicy: Send + Sync + fmt::Debug + 'static {
    /// Per-node data kept in the stage's private block.
    type Data: Any + Send;

    /// Consulted for every non-accessor operation, `output_page` included.
    fn suppresses(&self, op: Op, data: &Self::Data, state: &DeviceState) -> bool;

    /// Called once per `output_page`, after the gating decision.
    fn page_completed(&self, _data: &mut Self::Data) {}
}

#[derive(Debug, Clone)]
pub struct ForwardingStage<P> {
    policy: P,
}

impl<P: StagePolicy> ForwardingStage<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// A prototype whose every slot forwards, with `init` building the
    /// private data for each installed node.
    pub fn prototype<F>(name: impl Into<String>, policy: P, init: F) -> Prototype
    where
        F: Fn() -> P::Data + Send + Sync + 'static,
    {
        Prototype::new(name, Self::new(policy), OpTable::all_implemented()).with_private_data(init)
    }

    fn suppressed(&self, dev: &Device, op: Op) -> bool {
        if op.is_accessor() {
            return false;
        }
        let Ok(data) = dev.private::<P::Data>() else {
            return false;
        };
        let suppressed = self.policy.suppresses(op, data, dev.state());
        if suppressed {
            trace!("'{}' {} suppressed {op}", dev.name(), dev.id());
        }
        suppressed
    }
}

/// Accessors: always forwarded, or answered by the default library when
/// there is nothing to forward to.
macro_rules! forward_ref {
    ($( $name:ident ( $( $arg:ident : $ty:ty ),* ) -> $ret:ty; )*) => {
        $(
            fn $name(&self, dev: &Device $(, $arg: $ty)*) -> $ret {
                match dev.child() {
                    Some(child) => child.$name($($arg),*),
                    None => defaults::$name(dev $(, $arg)*),
                }
            }
        )*
    };
}

/// Gated read-backs: a suppressed page has nothing to read, so the default
/// answers against the wrapper itself.
macro_rules! gated_ref {
    ($( $name:ident => $op:ident ( $( $arg:ident : $ty:ty ),* ) -> $ret:ty; )*) => {
        $(
            fn $name(&self, dev: &Device $(, $arg: $ty)*) -> $ret {
                if self.suppressed(dev, Op::$op) {
                    return defaults::$name(dev $(, $arg)*);
                }
                match dev.child() {
                    Some(child) => child.$name($($arg),*),
                    None => defaults::$name(dev $(, $arg)*),
                }
            }
        )*
    };
}

/// Gated operations: `$suppressed` is what a swallowed call returns.
macro_rules! gated_mut {
    ($( $name:ident => $op:ident ( $( $arg:ident : $ty:ty ),* ) -> $ret:ty
        = |$dev:ident| $suppressed:expr; )*) => {
        $(
            fn $name(&self, $dev: &mut Device $(, $arg: $ty)*) -> $ret {
                if self.suppressed($dev, Op::$op) {
                    return $suppressed;
                }
                match $dev.child_mut() {
                    Some(child) => child.$name($($arg),*),
                    None => defaults::$name($dev $(, $arg)*),
                }
            }
        )*
    };
}

#[allow(clippy::too_many_arguments)]
impl<P: StagePolicy> DeviceProcs for ForwardingStage<P> {
    forward_ref! {
        get_initial_matrix() -> Matrix;
        map_rgb_color(cv: &[ColorValue]) -> ColorIndex;
        map_color_rgb(color: ColorIndex) -> DeviceResult<[ColorValue; 3]>;
        get_params(list: &mut ParamList) -> DeviceResult<()>;
        map_cmyk_color(cv: &[ColorValue]) -> ColorIndex;
        get_xfont_procs() -> Option<&'static str>;
        get_xfont_device() -> DeviceId;
        map_rgb_alpha_color(rgb: [ColorValue; 3], alpha: ColorValue) -> ColorIndex;
        get_page_device() -> Option<DeviceId>;
        get_clipping_box() -> FixedRect;
        map_color_rgb_alpha(color: ColorIndex) -> DeviceResult<[ColorValue; 4]>;
        get_hardware_params(list: &mut ParamList) -> DeviceResult<()>;
        get_color_mapping_procs() -> ColorMapping;
        get_color_comp_index(name: &str) -> Option<usize>;
        encode_color(cv: &[ColorValue]) -> ColorIndex;
        decode_color(color: ColorIndex) -> DeviceResult<Vec<ColorValue>>;
        ret_devn_params() -> Option<DevnParams>;
        get_profile() -> ProfileHandle;
    }

    gated_ref! {
        get_bits => GetBits(y: i32, data: &mut [u8]) -> DeviceResult<()>;
        get_band => GetBand(y: i32) -> Option<(i32, i32)>;
        get_bits_rectangle => GetBitsRectangle(rect: &IntRect, params: &mut GetBitsParams) -> DeviceResult<()>;
    }

    /// A suppressed page reports no alpha bits at all.
    fn get_alpha_bits(&self, dev: &Device, kind: AlphaBitsKind) -> u8 {
        if self.suppressed(dev, Op::GetAlphaBits) {
            return 0;
        }
        match dev.child() {
            Some(child) => child.get_alpha_bits(kind),
            None => defaults::get_alpha_bits(dev, kind),
        }
    }

    gated_mut! {
        sync_output => SyncOutput() -> DeviceResult<()> = |dev| Ok(());
        fill_rectangle => FillRectangle(x: i32, y: i32, width: i32, height: i32, color: ColorIndex)
            -> DeviceResult<()> = |dev| Ok(());
        tile_rectangle => TileRectangle(
            tile: &TileBitmap, x: i32, y: i32, width: i32, height: i32,
            color0: ColorIndex, color1: ColorIndex, phase: Phase
        ) -> DeviceResult<()> = |dev| Ok(());
        copy_mono => CopyMono(
            bitmap: &Bitmap<'_>, x: i32, y: i32, width: i32, height: i32, zero: ColorIndex, one: ColorIndex
        ) -> DeviceResult<()> = |dev| Ok(());
        copy_color => CopyColor(bitmap: &Bitmap<'_>, x: i32, y: i32, width: i32, height: i32)
            -> DeviceResult<()> = |dev| Ok(());
        draw_line => DrawLine(x0: i32, y0: i32, x1: i32, y1: i32, color: ColorIndex) -> DeviceResult<()> = |dev| Ok(());
        copy_alpha => CopyAlpha(
            bitmap: &Bitmap<'_>, x: i32, y: i32, width: i32, height: i32, color: ColorIndex, depth: u8
        ) -> DeviceResult<()> = |dev| Ok(());
        copy_rop => CopyRop(args: &RopArgs<'_>) -> DeviceResult<()> = |dev| Ok(());
        fill_path => FillPath(
            pis: &ImagerState, path: &Path, params: &FillParams, color: &DeviceColor, clip: Option<&ClipPath>
        ) -> DeviceResult<()> = |dev| Ok(());
        stroke_path => StrokePath(
            pis: &ImagerState, path: &Path, params: &StrokeParams, color: &DeviceColor, clip: Option<&ClipPath>
        ) -> DeviceResult<()> = |dev| Ok(());
        fill_mask => FillMask(
            bitmap: &Bitmap<'_>, x: i32, y: i32, width: i32, height: i32,
            color: &DeviceColor, depth: u8, lop: LogicalOp, clip: Option<&ClipPath>
        ) -> DeviceResult<()> = |dev| Ok(());
        fill_trapezoid => FillTrapezoid(
            left: &FixedEdge, right: &FixedEdge, ybot: Fixed, ytop: Fixed, swap_axes: bool,
            color: &DeviceColor, lop: LogicalOp
        ) -> DeviceResult<()> = |dev| Ok(());
        fill_parallelogram => FillParallelogram(
            origin: FixedPoint, a: FixedPoint, b: FixedPoint, color: &DeviceColor, lop: LogicalOp
        ) -> DeviceResult<()> = |dev| Ok(());
        fill_triangle => FillTriangle(
            origin: FixedPoint, a: FixedPoint, b: FixedPoint, color: &DeviceColor, lop: LogicalOp
        ) -> DeviceResult<()> = |dev| Ok(());
        draw_thin_line => DrawThinLine(
            from: FixedPoint, to: FixedPoint, color: &DeviceColor, lop: LogicalOp
        ) -> DeviceResult<()> = |dev| Ok(());
        begin_image => BeginImage(
            pis: &ImagerState, image: &ImageDescriptor, color: &DeviceColor, clip: Option<&ClipPath>
        ) -> DeviceResult<Box<dyn ImageEnum>> = |dev| Ok(Box::new(NullImageEnum::new(dev.id(), image)));
        image_data => ImageData(
            info: &mut dyn ImageEnum, planes: &[ImagePlane<'_>], height: u32
        ) -> DeviceResult<bool> = |dev| Ok(true);
        end_image => EndImage(info: Box<dyn ImageEnum>, draw_last: bool) -> DeviceResult<()> = |dev| Ok(());
        strip_tile_rectangle => StripTileRectangle(
            tiles: &StripBitmap, x: i32, y: i32, width: i32, height: i32,
            color0: ColorIndex, color1: ColorIndex, phase: Phase
        ) -> DeviceResult<()> = |dev| Ok(());
        strip_copy_rop => StripCopyRop(args: &RopArgs<'_>) -> DeviceResult<()> = |dev| Ok(());
        begin_typed_image => BeginTypedImage(
            pis: &ImagerState, matrix: Option<&Matrix>, image: &ImageDescriptor, rect: Option<&IntRect>,
            color: &DeviceColor, clip: Option<&ClipPath>
        ) -> DeviceResult<Box<dyn ImageEnum>> = |dev| Ok(Box::new(NullImageEnum::new(dev.id(), image)));
        text_begin => TextBegin(
            pis: &ImagerState, text: &TextParams, font: &Font, origin: FixedPoint,
            color: &DeviceColor, clip: Option<&ClipPath>
        ) -> DeviceResult<Box<dyn TextEnum>> = |dev| Ok(Box::new(NullTextEnum::new(dev.id(), text)));
        begin_transparency_group => BeginTransparencyGroup(
            params: &TransparencyGroupParams, bbox: &Rect, pis: &ImagerState
        ) -> DeviceResult<()> = |dev| Ok(());
        end_transparency_group => EndTransparencyGroup(pis: &ImagerState) -> DeviceResult<()> = |dev| Ok(());
        begin_transparency_mask => BeginTransparencyMask(
            params: &TransparencyMaskParams, bbox: &Rect, pis: &ImagerState
        ) -> DeviceResult<()> = |dev| Ok(());
        end_transparency_mask => EndTransparencyMask(pis: &ImagerState) -> DeviceResult<()> = |dev| Ok(());
        discard_transparency_layer => DiscardTransparencyLayer(pis: &ImagerState) -> DeviceResult<()> = |dev| Ok(());
        pattern_manage => PatternManage(id: BitmapId, function: PatternManage) -> DeviceResult<bool> = |dev| Ok(false);
        fill_rectangle_hl_color => FillRectangleHlColor(
            rect: &FixedRect, pis: &ImagerState, color: &DeviceColor, clip: Option<&ClipPath>
        ) -> DeviceResult<()> = |dev| Ok(());
        include_color_space => IncludeColorSpace(space: &ColorSpaceRef) -> DeviceResult<()> = |dev| Ok(());
        fill_linear_color_scanline => FillLinearColorScanline(
            fa: &FillAttributes, x: i32, y: i32, width: i32, c0: &[f32], step: &[f32]
        ) -> DeviceResult<()> = |dev| Ok(());
        fill_linear_color_trapezoid => FillLinearColorTrapezoid(
            fa: &FillAttributes, corners: &[ShadingVertex; 4]
        ) -> DeviceResult<bool> = |dev| Ok(true);
        fill_linear_color_triangle => FillLinearColorTriangle(
            fa: &FillAttributes, corners: &[ShadingVertex; 3]
        ) -> DeviceResult<bool> = |dev| Ok(true);
        update_spot_equivalent_colors => UpdateSpotEquivalentColors(pis: &ImagerState) -> DeviceResult<()> = |dev| Ok(());
        fillpage => Fillpage(pis: &ImagerState, color: &DeviceColor) -> DeviceResult<()> = |dev| Ok(());
        push_transparency_state => PushTransparencyState(pis: &ImagerState) -> DeviceResult<()> = |dev| Ok(());
        pop_transparency_state => PopTransparencyState(pis: &ImagerState) -> DeviceResult<()> = |dev| Ok(());
        put_image => PutImage(planes: &[&[u8]], rect: IntRect, row_stride: usize) -> DeviceResult<()> = |dev| Ok(());
        dev_spec_op => DevSpecOp(request: &DevSpecRequest) -> DeviceResult<i64> = |dev| Ok(0);
        copy_planes => CopyPlanes(
            bitmap: &Bitmap<'_>, x: i32, y: i32, width: i32, height: i32, plane_height: u32
        ) -> DeviceResult<()> = |dev| Ok(());
        strip_copy_rop2 => StripCopyRop2(args: &RopArgs<'_>) -> DeviceResult<()> = |dev| Ok(());
        strip_tile_rect_devn => StripTileRectDevn(
            tiles: &StripBitmap, x: i32, y: i32, width: i32, height: i32,
            color0: &DeviceColor, color1: &DeviceColor, phase: Phase
        ) -> DeviceResult<()> = |dev| Ok(());
        copy_alpha_hl_color => CopyAlphaHlColor(
            bitmap: &Bitmap<'_>, x: i32, y: i32, width: i32, height: i32, color: &DeviceColor, depth: u8
        ) -> DeviceResult<()> = |dev| Ok(());
        process_page => ProcessPage(options: &mut ProcessPageOptions<'_>) -> DeviceResult<()> = |dev| Ok(());
    }

    /// Opens the child, then mirrors whatever opening changed.
    fn open_device(&self, dev: &mut Device) -> DeviceResult<()> {
        let Some(child) = dev.child_mut() else {
            return defaults::open_device(dev);
        };
        child.open_device()?;
        child.set_open(true);
        resync(dev)
    }

    /// The page is counted whether or not it was forwarded, and whether or
    /// not the child managed to emit it.
    fn output_page(&self, dev: &mut Device, num_copies: u32, flush: bool) -> DeviceResult<()> {
        let forward = !self.suppressed(dev, Op::OutputPage);
        let result = if forward {
            let result = match dev.child_mut() {
                Some(child) => child.output_page(num_copies, flush),
                None => defaults::output_page(dev, num_copies, flush),
            };
            resync(dev)?;
            result
        } else {
            Ok(())
        };
        if let Ok(data) = dev.private_mut::<P::Data>() {
            self.policy.page_completed(data);
        }
        result
    }

    fn close_device(&self, dev: &mut Device) -> DeviceResult<()> {
        let result = match dev.child_mut() {
            Some(child) => {
                let result = child.close_device();
                child.set_open(false);
                result
            }
            None => defaults::close_device(dev),
        };
        dev.set_open(false);
        resync(dev)?;
        result
    }

    /// The child may close itself (a geometry change on a raster device);
    /// the wrapper follows suit and picks up the new state.
    fn put_params(&self, dev: &mut Device, list: &mut ParamList) -> DeviceResult<()> {
        let Some(child) = dev.child_mut() else {
            return defaults::put_params(dev, list);
        };
        let result = child.put_params(list);
        let open = child.is_open();
        dev.set_open(open);
        resync(dev)?;
        result
    }

    /// Never lets the child's identity escape: "use yourself" from the
    /// child means "use the wrapper" to the caller.
    fn create_compositor(&self, dev: &mut Device, compositor: &Compositor, pis: &ImagerState) -> DeviceResult<CompositorTarget> {
        let wrapper = dev.id();
        if self.suppressed(dev, Op::CreateCompositor) {
            return Ok(CompositorTarget::Current(wrapper));
        }
        let Some(child) = dev.child_mut() else {
            return defaults::create_compositor(dev, compositor, pis);
        };
        let child_id = child.id();
        match child.create_compositor(compositor, pis)? {
            CompositorTarget::Current(id) if id == child_id => Ok(CompositorTarget::Current(wrapper)),
            other => Ok(other),
        }
    }

    /// Copying a stage never copies the chain behind it.
    fn finish_copydevice(&self, _dev: &mut Device, _from: &Device) -> DeviceResult<()> {
        Ok(())
    }

    fn set_graphics_type_tag(&self, dev: &mut Device, tag: GraphicsTypeTag) {
        if self.suppressed(dev, Op::SetGraphicsTypeTag) {
            return;
        }
        match dev.child_mut() {
            Some(child) => {
                child.set_graphics_type_tag(tag);
                let tag = child.state().graphics_type_tag;
                dev.state_mut().graphics_type_tag = tag;
            }
            None => defaults::set_graphics_type_tag(dev, tag),
        }
    }
}
