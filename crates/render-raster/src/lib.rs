//! A terminal device that renders into memory.

pub mod buffer;
pub mod device;
pub mod output;

pub use buffer::PageBuffer;
pub use device::{RASTER_DEVICE, RasterDevice, RasterOptions, RasterPage};
pub use output::{RasterOutput, RenderedPage};
