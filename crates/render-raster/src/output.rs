//! Finished pages and where they go.

use pagechain_device::{DeviceError, DeviceResult};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

/// Where `output_page` sends the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterOutput {
    /// Keep pages in the device; read them back with `RasterDevice::pages`.
    #[default]
    Memory,
    /// One PNM file per page; `%d` in the path becomes the 1-based page
    /// number.
    Pnm(PathBuf),
    /// Drop the pixels, count the page.
    Discard,
}

impl RasterOutput {
    pub fn page_path(pattern: &std::path::Path, page: i64) -> PathBuf {
        let text = pattern.to_string_lossy();
        if text.contains("%d") {
            PathBuf::from(text.replacen("%d", &page.to_string(), 1))
        } else {
            pattern.to_path_buf()
        }
    }
}

/// A snapshot of the page buffer taken at `output_page`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub width: i32,
    pub height: i32,
    pub num_components: u8,
    pub bits_per_component: u8,
    pub data: Vec<u8>,
}

impl RenderedPage {
    /// Binary PNM: P5 for gray, P6 for RGB, 8 bits per component.
    pub fn write_pnm<W: Write>(&self, out: &mut W) -> DeviceResult<()> {
        if self.bits_per_component != 8 {
            return Err(DeviceError::Range(format!(
                "PNM output needs 8 bits per component, page has {}",
                self.bits_per_component
            )));
        }
        let magic = match self.num_components {
            1 => "P5",
            3 => "P6",
            n => return Err(DeviceError::Range(format!("PNM output has no format for {n} components"))),
        };
        write!(out, "{magic}\n{} {}\n255\n", self.width, self.height)?;
        out.write_all(&self.data)?;
        Ok(())
    }

    pub fn to_pnm(&self) -> DeviceResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.len() + 32);
        self.write_pnm(&mut out)?;
        Ok(out)
    }
}
