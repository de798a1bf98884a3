//! Chain configuration, loadable from JSON.

use pagechain_pdf::PdfOptions;
use pagechain_raster::RasterOptions;
use pagechain_stages::ObjectKinds;
use pagechain_types::ColorModel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Which terminal device ends the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Renders into page buffers.
    #[default]
    Raster,
    /// Writes a PDF document.
    Pdf,
}

/// Pages to keep, zero-based and inclusive; `last == 0` runs to the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpan {
    pub first: i32,
    #[serde(default)]
    pub last: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub device: DeviceKind,
    /// No span means every page is kept.
    pub pages: Option<PageSpan>,
    /// Object kinds dropped before they reach the device.
    pub filter: ObjectKinds,
    pub color_model: ColorModel,
    /// Dots per inch, x and y.
    pub resolution: [f32; 2],
    /// Points, width and height.
    pub media_size: [f32; 2],
    /// Raster only: rows per band.
    pub band_height: i32,
    /// Byte budget for device memory; unbounded when absent.
    pub memory_limit: Option<usize>,
    /// Where output goes. Raster output takes a `%d` page-number pattern;
    /// without a path, output is kept in memory.
    pub output: Option<PathBuf>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            device: DeviceKind::Raster,
            pages: None,
            filter: ObjectKinds::default(),
            color_model: ColorModel::DeviceRGB,
            resolution: [72.0, 72.0],
            media_size: [612.0, 792.0],
            band_height: 0,
            memory_limit: None,
            output: None,
        }
    }
}

impl ChainConfig {
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| {
            PipelineError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read chain config from '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_json(&source)
    }

    pub fn raster_options(&self) -> RasterOptions {
        RasterOptions {
            color_model: self.color_model,
            bits_per_component: 8,
            resolution: self.resolution,
            media_size: self.media_size,
            band_height: self.band_height,
            output: match &self.output {
                Some(pattern) => pagechain_raster::RasterOutput::Pnm(pattern.clone()),
                None => pagechain_raster::RasterOutput::Memory,
            },
        }
    }

    pub fn pdf_options(&self) -> PdfOptions {
        PdfOptions {
            color_model: self.color_model,
            resolution: self.resolution,
            media_size: self.media_size,
            output: match &self.output {
                Some(path) => pagechain_pdf::PdfOutput::File(path.clone()),
                None => pagechain_pdf::PdfOutput::Memory,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_in_defaults() {
        let config = ChainConfig::from_json(r#"{ "device": "pdf", "pages": { "first": 2 } }"#).unwrap();
        assert_eq!(config.device, DeviceKind::Pdf);
        assert_eq!(config.pages, Some(PageSpan { first: 2, last: 0 }));
        assert_eq!(config.resolution, [72.0, 72.0]);
        assert!(config.filter.is_empty());
    }

    #[test]
    fn output_path_selects_the_sink() {
        let config = ChainConfig { output: Some("page-%d.pnm".into()), ..ChainConfig::default() };
        assert!(matches!(config.raster_options().output, pagechain_raster::RasterOutput::Pnm(_)));
        assert_eq!(ChainConfig::default().pdf_options().output, pagechain_pdf::PdfOutput::Memory);
    }

    #[test]
    fn unknown_device_is_rejected() {
        assert!(matches!(ChainConfig::from_json(r#"{ "device": "plotter" }"#), Err(PipelineError::Json(_))));
    }
}
