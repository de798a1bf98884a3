//! Value types shared by every crate in the device chain.

pub mod color;
pub mod geometry;
pub mod graphics;
pub mod params;
pub mod profile;

pub use color::{
    CachedColors, ColorIndex, ColorInfo, ColorMapping, ColorModel, ColorValue, DeviceColor, GraphicsTypeTag,
    MAX_COLOR_VALUE, NO_COLOR_INDEX, Polarity,
};
pub use geometry::{Fixed, FixedEdge, FixedPoint, FixedRect, IntPoint, IntRect, Matrix, Point, Rect, Size};
pub use params::{ParamList, ParamValue};
pub use profile::{DeviceProfile, InvalidProfileType, ProfileHandle, ProfileType};
