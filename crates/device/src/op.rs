//! The ordered list of device operations and the per-device slot table.
//!
//! The order of `Op` is part of the device contract: stages, terminals and
//! recorded command streams all index operations by position.

use std::fmt;

/// Broad grouping used by stage policies to decide what to gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCategory {
    /// Open/close/output and device-level setup. Not gated, except that page
    /// counting stages treat `output_page` specially.
    Lifecycle,
    /// Pure queries (color mapping, parameters, profile, geometry). Never gated.
    Accessor,
    Raster,
    Vector,
    Image,
    Text,
    Transparency,
    MarkingState,
}

macro_rules! ops {
    ($( $variant:ident => $name:literal, $cat:ident; )*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Op {
            $( $variant, )*
        }

        impl Op {
            pub const ALL: [Op; Op::COUNT] = [ $( Op::$variant, )* ];

            pub fn name(self) -> &'static str {
                match self {
                    $( Op::$variant => $name, )*
                }
            }

            pub fn category(self) -> OpCategory {
                match self {
                    $( Op::$variant => OpCategory::$cat, )*
                }
            }
        }
    };
}

ops! {
    OpenDevice => "open_device", Lifecycle;
    GetInitialMatrix => "get_initial_matrix", Accessor;
    SyncOutput => "sync_output", Lifecycle;
    OutputPage => "output_page", Lifecycle;
    CloseDevice => "close_device", Lifecycle;
    MapRgbColor => "map_rgb_color", Accessor;
    MapColorRgb => "map_color_rgb", Accessor;
    FillRectangle => "fill_rectangle", Raster;
    TileRectangle => "tile_rectangle", Raster;
    CopyMono => "copy_mono", Raster;
    CopyColor => "copy_color", Raster;
    DrawLine => "draw_line", Vector;
    GetBits => "get_bits", Raster;
    GetParams => "get_params", Accessor;
    PutParams => "put_params", Lifecycle;
    MapCmykColor => "map_cmyk_color", Accessor;
    GetXfontProcs => "get_xfont_procs", Accessor;
    GetXfontDevice => "get_xfont_device", Accessor;
    MapRgbAlphaColor => "map_rgb_alpha_color", Accessor;
    GetPageDevice => "get_page_device", Accessor;
    GetAlphaBits => "get_alpha_bits", Raster;
    CopyAlpha => "copy_alpha", Raster;
    GetBand => "get_band", Raster;
    CopyRop => "copy_rop", Raster;
    FillPath => "fill_path", Vector;
    StrokePath => "stroke_path", Vector;
    FillMask => "fill_mask", Vector;
    FillTrapezoid => "fill_trapezoid", Vector;
    FillParallelogram => "fill_parallelogram", Vector;
    FillTriangle => "fill_triangle", Vector;
    DrawThinLine => "draw_thin_line", Vector;
    BeginImage => "begin_image", Image;
    ImageData => "image_data", Image;
    EndImage => "end_image", Image;
    StripTileRectangle => "strip_tile_rectangle", Raster;
    StripCopyRop => "strip_copy_rop", Raster;
    GetClippingBox => "get_clipping_box", Accessor;
    BeginTypedImage => "begin_typed_image", Image;
    GetBitsRectangle => "get_bits_rectangle", Raster;
    MapColorRgbAlpha => "map_color_rgb_alpha", Accessor;
    CreateCompositor => "create_compositor", Transparency;
    GetHardwareParams => "get_hardware_params", Accessor;
    TextBegin => "text_begin", Text;
    FinishCopydevice => "finish_copydevice", Lifecycle;
    BeginTransparencyGroup => "begin_transparency_group", Transparency;
    EndTransparencyGroup => "end_transparency_group", Transparency;
    BeginTransparencyMask => "begin_transparency_mask", Transparency;
    EndTransparencyMask => "end_transparency_mask", Transparency;
    DiscardTransparencyLayer => "discard_transparency_layer", Transparency;
    GetColorMappingProcs => "get_color_mapping_procs", Accessor;
    GetColorCompIndex => "get_color_comp_index", Accessor;
    EncodeColor => "encode_color", Accessor;
    DecodeColor => "decode_color", Accessor;
    PatternManage => "pattern_manage", Vector;
    FillRectangleHlColor => "fill_rectangle_hl_color", Vector;
    IncludeColorSpace => "include_color_space", Lifecycle;
    FillLinearColorScanline => "fill_linear_color_scanline", Vector;
    FillLinearColorTrapezoid => "fill_linear_color_trapezoid", Vector;
    FillLinearColorTriangle => "fill_linear_color_triangle", Vector;
    UpdateSpotEquivalentColors => "update_spot_equivalent_colors", Lifecycle;
    RetDevnParams => "ret_devn_params", Accessor;
    Fillpage => "fillpage", Raster;
    PushTransparencyState => "push_transparency_state", Transparency;
    PopTransparencyState => "pop_transparency_state", Transparency;
    PutImage => "put_image", Raster;
    DevSpecOp => "dev_spec_op", Lifecycle;
    CopyPlanes => "copy_planes", Raster;
    GetProfile => "get_profile", Accessor;
    SetGraphicsTypeTag => "set_graphics_type_tag", MarkingState;
    StripCopyRop2 => "strip_copy_rop2", Raster;
    StripTileRectDevn => "strip_tile_rect_devn", Raster;
    CopyAlphaHlColor => "copy_alpha_hl_color", Raster;
    ProcessPage => "process_page", Raster;
}

impl Op {
    pub const COUNT: usize = 73;

    pub fn index(self) -> usize {
        self as usize
    }

    /// Slots that stay unset after `fill_in_procs`; a later initialization
    /// step (buffer allocation in `open_device`) wires them.
    pub fn is_deferred(self) -> bool {
        matches!(self, Op::FillRectangle)
    }

    pub fn is_accessor(self) -> bool {
        self.category() == OpCategory::Accessor
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of one operation slot in a device's table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProcSlot {
    /// Not assigned yet; a later initialization step is expected to fill it.
    #[default]
    Unset,
    /// The device's own procs handle the operation.
    Implemented,
    /// Intentionally absent: dispatch goes to the default library.
    Default,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpTable {
    slots: [ProcSlot; Op::COUNT],
}

impl Default for OpTable {
    fn default() -> Self {
        Self::unset()
    }
}

impl OpTable {
    pub fn unset() -> Self {
        Self { slots: [ProcSlot::Unset; Op::COUNT] }
    }

    /// Every slot implemented, as a forwarding stage declares itself.
    pub fn all_implemented() -> Self {
        Self { slots: [ProcSlot::Implemented; Op::COUNT] }
    }

    /// `ops` implemented, everything else unset.
    pub fn implementing(ops: &[Op]) -> Self {
        let mut table = Self::unset();
        for op in ops {
            table.set(*op, ProcSlot::Implemented);
        }
        table
    }

    pub fn get(&self, op: Op) -> ProcSlot {
        self.slots[op.index()]
    }

    pub fn set(&mut self, op: Op, slot: ProcSlot) {
        self.slots[op.index()] = slot;
    }

    pub fn is_implemented(&self, op: Op) -> bool {
        self.get(op) == ProcSlot::Implemented
    }

    pub fn is_unset(&self, op: Op) -> bool {
        self.get(op) == ProcSlot::Unset
    }

    pub fn iter(&self) -> impl Iterator<Item = (Op, ProcSlot)> + '_ {
        Op::ALL.iter().map(|op| (*op, self.get(*op)))
    }

    pub fn count(&self, slot: ProcSlot) -> usize {
        self.slots.iter().filter(|s| **s == slot).count()
    }
}

impl fmt::Debug for OpTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpTable")
            .field("implemented", &self.count(ProcSlot::Implemented))
            .field("default", &self.count(ProcSlot::Default))
            .field("unset", &self.iter().filter(|(_, s)| *s == ProcSlot::Unset).map(|(op, _)| op.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Resolves every unset slot to `Default`, leaving deferred slots alone.
pub fn fill_in_procs(table: &mut OpTable) {
    for op in Op::ALL {
        if table.is_unset(op) && !op.is_deferred() {
            table.set(op, ProcSlot::Default);
        }
    }
}
