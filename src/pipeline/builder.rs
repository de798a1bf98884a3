// src/pipeline/builder.rs
use super::config::{ChainConfig, DeviceKind, PageSpan};
use super::orchestrator::PageChain;
use crate::error::PipelineError;
use log::info;
use pagechain_device::{BoundedMemory, Device, DeviceMemory, HeapMemory};
use pagechain_pdf::PdfWriterDevice;
use pagechain_raster::RasterDevice;
use pagechain_stages::{ObjectKinds, install_object_filter, install_page_range};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A builder for a device chain: the terminal device plus the stages
/// installed in front of it.
#[derive(Default)]
pub struct ChainBuilder {
    config: ChainConfig,
    memory: Option<Arc<dyn DeviceMemory>>,
}

impl ChainBuilder {
    /// A raster chain with no stages, on US Letter at 72 dpi.
    pub fn new() -> Self {
        Default::default()
    }

    /// Replaces every setting with those in `config`.
    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_config_file<P: AsRef<Path>>(self, path: P) -> Result<Self, PipelineError> {
        Ok(self.with_config(ChainConfig::from_file(path)?))
    }

    /// Keeps pages `first..=last`, zero-based; `last == 0` keeps everything from `first` on.
    pub fn with_page_range(mut self, first: i32, last: i32) -> Self {
        self.config.pages = Some(PageSpan { first, last });
        self
    }

    /// Drops the given object kinds before they reach the device.
    pub fn with_object_filter(mut self, kinds: ObjectKinds) -> Self {
        self.config.filter = kinds;
        self
    }

    pub fn with_device(mut self, device: DeviceKind) -> Self {
        self.config.device = device;
        self
    }

    pub fn with_raster_device(self) -> Self {
        self.with_device(DeviceKind::Raster)
    }

    pub fn with_pdf_device(self) -> Self {
        self.with_device(DeviceKind::Pdf)
    }

    pub fn with_output<P: Into<PathBuf>>(mut self, output: P) -> Self {
        self.config.output = Some(output.into());
        self
    }

    pub fn with_resolution(mut self, x_dpi: f32, y_dpi: f32) -> Self {
        self.config.resolution = [x_dpi, y_dpi];
        self
    }

    pub fn with_media_size(mut self, width: f32, height: f32) -> Self {
        self.config.media_size = [width, height];
        self
    }

    /// Caps device memory at `limit` bytes.
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.config.memory_limit = Some(limit);
        self
    }

    /// Uses `memory` for every device in the chain; overrides any limit.
    pub fn with_memory(mut self, memory: Arc<dyn DeviceMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Creates the terminal device, installs the stages and opens the chain.
    pub fn build(self) -> Result<PageChain, PipelineError> {
        let config = self.config;
        let memory = match (self.memory, config.memory_limit) {
            (Some(memory), _) => memory,
            (None, Some(limit)) => Arc::new(BoundedMemory::new(limit)) as Arc<dyn DeviceMemory>,
            (None, None) => Arc::new(HeapMemory::new()),
        };

        let mut dev: Device = match config.device {
            DeviceKind::Raster => RasterDevice::create(&config.raster_options(), memory)?,
            DeviceKind::Pdf => PdfWriterDevice::create(&config.pdf_options(), memory)?,
        };
        // The page range goes in last so it sees every page before the filter does.
        if !config.filter.is_empty() {
            install_object_filter(&mut dev, config.filter)?;
        }
        if let Some(span) = config.pages {
            install_page_range(&mut dev, span.first, span.last)?;
        }
        dev.open()?;
        info!("Built device chain: {}", dev.describe_chain());

        Ok(PageChain::new(dev, config.device))
    }
}
