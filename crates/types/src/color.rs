use serde::{Deserialize, Serialize};

/// A device color value, packed to the device's `depth`.
pub type ColorIndex = u64;

/// A single colorant intensity, 0..=`MAX_COLOR_VALUE`.
pub type ColorValue = u16;

pub const MAX_COLOR_VALUE: ColorValue = u16::MAX;

/// Returned by color mapping when no device color can represent the request.
pub const NO_COLOR_INDEX: ColorIndex = ColorIndex::MAX;

pub const MAX_COMPONENTS: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    #[default]
    Additive,
    Subtractive,
    Unknown,
}

/// The process color model a device renders in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorModel {
    DeviceGray,
    #[default]
    DeviceRGB,
    DeviceCMYK,
}

impl ColorModel {
    pub fn num_components(self) -> u8 {
        match self {
            ColorModel::DeviceGray => 1,
            ColorModel::DeviceRGB => 3,
            ColorModel::DeviceCMYK => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColorModel::DeviceGray => "DeviceGray",
            ColorModel::DeviceRGB => "DeviceRGB",
            ColorModel::DeviceCMYK => "DeviceCMYK",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DeviceGray" => Some(ColorModel::DeviceGray),
            "DeviceRGB" => Some(ColorModel::DeviceRGB),
            "DeviceCMYK" => Some(ColorModel::DeviceCMYK),
            _ => None,
        }
    }

    /// Standard colorant names, in component order.
    pub fn colorant_names(self) -> &'static [&'static str] {
        match self {
            ColorModel::DeviceGray => &["Gray"],
            ColorModel::DeviceRGB => &["Red", "Green", "Blue"],
            ColorModel::DeviceCMYK => &["Cyan", "Magenta", "Yellow", "Black"],
        }
    }
}

/// The color-info block every device carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorInfo {
    pub max_components: u8,
    pub num_components: u8,
    pub polarity: Polarity,
    /// Bits per pixel.
    pub depth: u8,
    pub gray_index: u8,
    pub max_gray: u32,
    pub max_color: u32,
    pub dither_grays: u32,
    pub dither_colors: u32,
    pub separable_and_linear: bool,
    /// Name of the output profile, empty when the default for the model applies.
    pub icc_profile: String,
}

impl Default for ColorInfo {
    fn default() -> Self {
        Self::for_model(ColorModel::DeviceRGB, 24)
    }
}

impl ColorInfo {
    pub fn for_model(model: ColorModel, depth: u8) -> Self {
        let num_components = model.num_components();
        let bits = u32::from(depth / num_components).max(1);
        let max_value = (1u32 << bits.min(16)) - 1;
        let (max_gray, max_color) = match model {
            ColorModel::DeviceGray => (max_value, 0),
            _ => (max_value, max_value),
        };
        Self {
            max_components: num_components,
            num_components,
            polarity: match model {
                ColorModel::DeviceCMYK => Polarity::Subtractive,
                _ => Polarity::Additive,
            },
            depth,
            gray_index: match model {
                ColorModel::DeviceCMYK => 3,
                ColorModel::DeviceGray => 0,
                ColorModel::DeviceRGB => u8::MAX,
            },
            max_gray,
            max_color,
            dither_grays: max_gray + 1,
            dither_colors: if max_color > 0 { max_color + 1 } else { 0 },
            separable_and_linear: true,
            icc_profile: String::new(),
        }
    }

    pub fn model(&self) -> ColorModel {
        match self.num_components {
            1 => ColorModel::DeviceGray,
            3 => ColorModel::DeviceRGB,
            _ => ColorModel::DeviceCMYK,
        }
    }

    /// Bits available to each component.
    pub fn bits_per_component(&self) -> u8 {
        (self.depth / self.num_components.max(1)).max(1)
    }
}

/// Black and white as the device encodes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CachedColors {
    pub black: ColorIndex,
    pub white: ColorIndex,
}

impl Default for CachedColors {
    fn default() -> Self {
        Self {
            black: NO_COLOR_INDEX,
            white: NO_COLOR_INDEX,
        }
    }
}

/// What kind of object is currently being drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphicsTypeTag {
    #[default]
    Unknown,
    Untouched,
    Path,
    Image,
    Text,
}

/// A drawing color resolved for a particular device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceColor {
    Pure(ColorIndex),
    /// High-level (DeviceN) components, one per device colorant.
    DevN(Vec<ColorValue>),
    Null,
}

impl DeviceColor {
    pub fn pure(&self) -> Option<ColorIndex> {
        match self {
            DeviceColor::Pure(c) => Some(*c),
            _ => None,
        }
    }
}

/// Color-mapping procedures: how the device turns gray/RGB/CMYK into its colorants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorMapping {
    DevGray,
    DevRGB,
    DevCMYK,
}

impl ColorMapping {
    pub fn for_components(num_components: u8) -> Self {
        match num_components {
            1 => ColorMapping::DevGray,
            3 => ColorMapping::DevRGB,
            _ => ColorMapping::DevCMYK,
        }
    }

    pub fn map_gray(self, gray: ColorValue) -> Vec<ColorValue> {
        match self {
            ColorMapping::DevGray => vec![gray],
            ColorMapping::DevRGB => vec![gray; 3],
            ColorMapping::DevCMYK => vec![0, 0, 0, MAX_COLOR_VALUE - gray],
        }
    }

    pub fn map_rgb(self, r: ColorValue, g: ColorValue, b: ColorValue) -> Vec<ColorValue> {
        match self {
            ColorMapping::DevGray => vec![luminance(r, g, b)],
            ColorMapping::DevRGB => vec![r, g, b],
            ColorMapping::DevCMYK => {
                let (c, m, y) = (MAX_COLOR_VALUE - r, MAX_COLOR_VALUE - g, MAX_COLOR_VALUE - b);
                let k = c.min(m).min(y);
                vec![c - k, m - k, y - k, k]
            }
        }
    }

    pub fn map_cmyk(self, c: ColorValue, m: ColorValue, y: ColorValue, k: ColorValue) -> Vec<ColorValue> {
        match self {
            ColorMapping::DevCMYK => vec![c, m, y, k],
            _ => {
                let inv = |v: ColorValue| MAX_COLOR_VALUE.saturating_sub(v.saturating_add(k));
                let (r, g, b) = (inv(c), inv(m), inv(y));
                match self {
                    ColorMapping::DevGray => vec![luminance(r, g, b)],
                    _ => vec![r, g, b],
                }
            }
        }
    }
}

/// Rec. 601 weights, the same ones the gray mapping has always used.
fn luminance(r: ColorValue, g: ColorValue, b: ColorValue) -> ColorValue {
    ((u32::from(r) * 30 + u32::from(g) * 59 + u32::from(b) * 11) / 100) as ColorValue
}
