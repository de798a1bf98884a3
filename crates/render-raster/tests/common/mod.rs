#![allow(dead_code)]

use pagechain_device::{Device, DeviceMemory, HeapMemory};
use pagechain_raster::{RasterDevice, RasterOptions};
use pagechain_types::ColorModel;
use std::sync::Arc;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A small gray page: 20x10 pixels at 72 dpi.
pub fn gray_options() -> RasterOptions {
    RasterOptions {
        color_model: ColorModel::DeviceGray,
        media_size: [20.0, 10.0],
        ..RasterOptions::default()
    }
}

pub fn raster(options: &RasterOptions) -> Device {
    raster_in(options, Arc::new(HeapMemory::new()))
}

pub fn raster_in(options: &RasterOptions, memory: Arc<dyn DeviceMemory>) -> Device {
    RasterDevice::create(options, memory).expect("raster device")
}
