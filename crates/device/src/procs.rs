//! The device procedure trait and table-driven dispatch.
//!
//! Every operation appears twice: as a `DeviceProcs` method whose body falls
//! back to the default library, and as an inherent `Device` method that
//! consults the node's slot table. Callers only ever use the latter.

use crate::defaults;
use crate::device::{Device, DeviceId};
use crate::enumerator::{ImageEnum, TextEnum};
use crate::error::DeviceResult;
use crate::op::Op;
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
use std::fmt;
use std::sync::Arc;

/// What `create_compositor` hands back.
#[derive(Debug)]
pub enum CompositorTarget {
    /// Keep drawing on the device with this identity.
    Current(DeviceId),
    /// Draw on this newly created compositing device instead.
    Created(Box<Device>),
}

/// Requests understood by `dev_spec_op`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevSpecRequest {
    /// Non-zero if the device takes DeviceN colors directly.
    SupportsDevn,
    /// Non-zero if the device takes high-level colors in fill operations.
    SupportsHlColor,
    PageUsesTransparency,
    /// Device-specific request by name.
    Named(String),
}

macro_rules! device_ops {
    (
        ref {
            $( $(#[$rmeta:meta])* $rname:ident => $rop:ident ( $( $rarg:ident : $rty:ty ),* ) -> $rret:ty; )*
        }
        mut {
            $( $(#[$mmeta:meta])* $mname:ident => $mop:ident ( $( $marg:ident : $mty:ty ),* ) -> $mret:ty; )*
        }
    ) => {
        /// The procedures a device type supplies.
        ///
        /// Every method defaults to the generic implementation, so a type only
        /// overrides what it handles and marks those slots implemented in its
        /// prototype's table.
        #[allow(clippy::too_many_arguments)]
        pub trait DeviceProcs: Send + Sync + fmt::Debug {
            $(
                $(#[$rmeta])*
                fn $rname(&self, dev: &Device $(, $rarg: $rty)*) -> $rret {
                    defaults::$rname(dev $(, $rarg)*)
                }
            )*
            $(
                $(#[$mmeta])*
                fn $mname(&self, dev: &mut Device $(, $marg: $mty)*) -> $mret {
                    defaults::$mname(dev $(, $marg)*)
                }
            )*
        }

        #[allow(clippy::too_many_arguments)]
        impl Device {
            $(
                $(#[$rmeta])*
                pub fn $rname(&self $(, $rarg: $rty)*) -> $rret {
                    if self.table.is_implemented(Op::$rop) {
                        self.procs.$rname(self $(, $rarg)*)
                    } else {
                        defaults::$rname(self $(, $rarg)*)
                    }
                }
            )*
            $(
                $(#[$mmeta])*
                pub fn $mname(&mut self $(, $marg: $mty)*) -> $mret {
                    if self.table.is_implemented(Op::$mop) {
                        let procs = Arc::clone(&self.procs);
                        procs.$mname(self $(, $marg)*)
                    } else {
                        defaults::$mname(self $(, $marg)*)
                    }
                }
            )*
        }
    };
}

device_ops! {
    ref {
        /// Default user space (72 units per inch, y up) to device space.
        get_initial_matrix => GetInitialMatrix() -> Matrix;
        map_rgb_color => MapRgbColor(cv: &[ColorValue]) -> ColorIndex;
        map_color_rgb => MapColorRgb(color: ColorIndex) -> DeviceResult<[ColorValue; 3]>;
        /// Reads one scan line into `data`.
        get_bits => GetBits(y: i32, data: &mut [u8]) -> DeviceResult<()>;
        get_params => GetParams(list: &mut ParamList) -> DeviceResult<()>;
        map_cmyk_color => MapCmykColor(cv: &[ColorValue]) -> ColorIndex;
        /// Names the platform font backend, if the device routes to one.
        get_xfont_procs => GetXfontProcs() -> Option<&'static str>;
        get_xfont_device => GetXfontDevice() -> DeviceId;
        map_rgb_alpha_color => MapRgbAlphaColor(rgb: [ColorValue; 3], alpha: ColorValue) -> ColorIndex;
        get_page_device => GetPageDevice() -> Option<DeviceId>;
        get_alpha_bits => GetAlphaBits(kind: AlphaBitsKind) -> u8;
        /// `(band_start, band_height)` for the band holding `y`; `None` when unbanded.
        get_band => GetBand(y: i32) -> Option<(i32, i32)>;
        get_clipping_box => GetClippingBox() -> FixedRect;
        get_bits_rectangle => GetBitsRectangle(rect: &IntRect, params: &mut GetBitsParams) -> DeviceResult<()>;
        map_color_rgb_alpha => MapColorRgbAlpha(color: ColorIndex) -> DeviceResult<[ColorValue; 4]>;
        get_hardware_params => GetHardwareParams(list: &mut ParamList) -> DeviceResult<()>;
        get_color_mapping_procs => GetColorMappingProcs() -> ColorMapping;
        get_color_comp_index => GetColorCompIndex(name: &str) -> Option<usize>;
        encode_color => EncodeColor(cv: &[ColorValue]) -> ColorIndex;
        decode_color => DecodeColor(color: ColorIndex) -> DeviceResult<Vec<ColorValue>>;
        ret_devn_params => RetDevnParams() -> Option<DevnParams>;
        get_profile => GetProfile() -> ProfileHandle;
    }
    mut {
        open_device => OpenDevice() -> DeviceResult<()>;
        sync_output => SyncOutput() -> DeviceResult<()>;
        output_page => OutputPage(num_copies: u32, flush: bool) -> DeviceResult<()>;
        close_device => CloseDevice() -> DeviceResult<()>;
        fill_rectangle => FillRectangle(x: i32, y: i32, width: i32, height: i32, color: ColorIndex) -> DeviceResult<()>;
        tile_rectangle => TileRectangle(
            tile: &TileBitmap, x: i32, y: i32, width: i32, height: i32,
            color0: ColorIndex, color1: ColorIndex, phase: Phase
        ) -> DeviceResult<()>;
        /// Zero bits paint `zero`, one bits paint `one`; `NO_COLOR_INDEX` is transparent.
        copy_mono => CopyMono(
            bitmap: &Bitmap<'_>, x: i32, y: i32, width: i32, height: i32, zero: ColorIndex, one: ColorIndex
        ) -> DeviceResult<()>;
        copy_color => CopyColor(bitmap: &Bitmap<'_>, x: i32, y: i32, width: i32, height: i32) -> DeviceResult<()>;
        draw_line => DrawLine(x0: i32, y0: i32, x1: i32, y1: i32, color: ColorIndex) -> DeviceResult<()>;
        put_params => PutParams(list: &mut ParamList) -> DeviceResult<()>;
        copy_alpha => CopyAlpha(
            bitmap: &Bitmap<'_>, x: i32, y: i32, width: i32, height: i32, color: ColorIndex, depth: u8
        ) -> DeviceResult<()>;
        copy_rop => CopyRop(args: &RopArgs<'_>) -> DeviceResult<()>;
        fill_path => FillPath(
            pis: &ImagerState, path: &Path, params: &FillParams, color: &DeviceColor, clip: Option<&ClipPath>
        ) -> DeviceResult<()>;
        stroke_path => StrokePath(
            pis: &ImagerState, path: &Path, params: &StrokeParams, color: &DeviceColor, clip: Option<&ClipPath>
        ) -> DeviceResult<()>;
        fill_mask => FillMask(
            bitmap: &Bitmap<'_>, x: i32, y: i32, width: i32, height: i32,
            color: &DeviceColor, depth: u8, lop: LogicalOp, clip: Option<&ClipPath>
        ) -> DeviceResult<()>;
        fill_trapezoid => FillTrapezoid(
            left: &FixedEdge, right: &FixedEdge, ybot: Fixed, ytop: Fixed, swap_axes: bool,
            color: &DeviceColor, lop: LogicalOp
        ) -> DeviceResult<()>;
        fill_parallelogram => FillParallelogram(
            origin: FixedPoint, a: FixedPoint, b: FixedPoint, color: &DeviceColor, lop: LogicalOp
        ) -> DeviceResult<()>;
        fill_triangle => FillTriangle(
            origin: FixedPoint, a: FixedPoint, b: FixedPoint, color: &DeviceColor, lop: LogicalOp
        ) -> DeviceResult<()>;
        draw_thin_line => DrawThinLine(
            from: FixedPoint, to: FixedPoint, color: &DeviceColor, lop: LogicalOp
        ) -> DeviceResult<()>;
        begin_image => BeginImage(
            pis: &ImagerState, image: &ImageDescriptor, color: &DeviceColor, clip: Option<&ClipPath>
        ) -> DeviceResult<Box<dyn ImageEnum>>;
        /// Feeds rows to an enumerator; `Ok(true)` once the image is complete.
        image_data => ImageData(
            info: &mut dyn ImageEnum, planes: &[ImagePlane<'_>], height: u32
        ) -> DeviceResult<bool>;
        end_image => EndImage(info: Box<dyn ImageEnum>, draw_last: bool) -> DeviceResult<()>;
        strip_tile_rectangle => StripTileRectangle(
            tiles: &StripBitmap, x: i32, y: i32, width: i32, height: i32,
            color0: ColorIndex, color1: ColorIndex, phase: Phase
        ) -> DeviceResult<()>;
        strip_copy_rop => StripCopyRop(args: &RopArgs<'_>) -> DeviceResult<()>;
        begin_typed_image => BeginTypedImage(
            pis: &ImagerState, matrix: Option<&Matrix>, image: &ImageDescriptor, rect: Option<&IntRect>,
            color: &DeviceColor, clip: Option<&ClipPath>
        ) -> DeviceResult<Box<dyn ImageEnum>>;
        create_compositor => CreateCompositor(
            compositor: &Compositor, pis: &ImagerState
        ) -> DeviceResult<CompositorTarget>;
        text_begin => TextBegin(
            pis: &ImagerState, text: &TextParams, font: &Font, origin: FixedPoint,
            color: &DeviceColor, clip: Option<&ClipPath>
        ) -> DeviceResult<Box<dyn TextEnum>>;
        finish_copydevice => FinishCopydevice(from: &Device) -> DeviceResult<()>;
        begin_transparency_group => BeginTransparencyGroup(
            params: &TransparencyGroupParams, bbox: &Rect, pis: &ImagerState
        ) -> DeviceResult<()>;
        end_transparency_group => EndTransparencyGroup(pis: &ImagerState) -> DeviceResult<()>;
        begin_transparency_mask => BeginTransparencyMask(
            params: &TransparencyMaskParams, bbox: &Rect, pis: &ImagerState
        ) -> DeviceResult<()>;
        end_transparency_mask => EndTransparencyMask(pis: &ImagerState) -> DeviceResult<()>;
        discard_transparency_layer => DiscardTransparencyLayer(pis: &ImagerState) -> DeviceResult<()>;
        pattern_manage => PatternManage(id: BitmapId, function: PatternManage) -> DeviceResult<bool>;
        fill_rectangle_hl_color => FillRectangleHlColor(
            rect: &FixedRect, pis: &ImagerState, color: &DeviceColor, clip: Option<&ClipPath>
        ) -> DeviceResult<()>;
        include_color_space => IncludeColorSpace(space: &ColorSpaceRef) -> DeviceResult<()>;
        /// Colors are in 0..=1 per component; `step` is added once per pixel.
        fill_linear_color_scanline => FillLinearColorScanline(
            fa: &FillAttributes, x: i32, y: i32, width: i32, c0: &[f32], step: &[f32]
        ) -> DeviceResult<()>;
        /// `Ok(false)` asks the caller to decompose the shape itself.
        fill_linear_color_trapezoid => FillLinearColorTrapezoid(
            fa: &FillAttributes, corners: &[ShadingVertex; 4]
        ) -> DeviceResult<bool>;
        fill_linear_color_triangle => FillLinearColorTriangle(
            fa: &FillAttributes, corners: &[ShadingVertex; 3]
        ) -> DeviceResult<bool>;
        update_spot_equivalent_colors => UpdateSpotEquivalentColors(pis: &ImagerState) -> DeviceResult<()>;
        fillpage => Fillpage(pis: &ImagerState, color: &DeviceColor) -> DeviceResult<()>;
        push_transparency_state => PushTransparencyState(pis: &ImagerState) -> DeviceResult<()>;
        pop_transparency_state => PopTransparencyState(pis: &ImagerState) -> DeviceResult<()>;
        put_image => PutImage(planes: &[&[u8]], rect: IntRect, row_stride: usize) -> DeviceResult<()>;
        dev_spec_op => DevSpecOp(request: &DevSpecRequest) -> DeviceResult<i64>;
        copy_planes => CopyPlanes(
            bitmap: &Bitmap<'_>, x: i32, y: i32, width: i32, height: i32, plane_height: u32
        ) -> DeviceResult<()>;
        set_graphics_type_tag => SetGraphicsTypeTag(tag: GraphicsTypeTag) -> ();
        strip_copy_rop2 => StripCopyRop2(args: &RopArgs<'_>) -> DeviceResult<()>;
        strip_tile_rect_devn => StripTileRectDevn(
            tiles: &StripBitmap, x: i32, y: i32, width: i32, height: i32,
            color0: &DeviceColor, color1: &DeviceColor, phase: Phase
        ) -> DeviceResult<()>;
        copy_alpha_hl_color => CopyAlphaHlColor(
            bitmap: &Bitmap<'_>, x: i32, y: i32, width: i32, height: i32, color: &DeviceColor, depth: u8
        ) -> DeviceResult<()>;
        process_page => ProcessPage(options: &mut ProcessPageOptions<'_>) -> DeviceResult<()>;
    }
}
