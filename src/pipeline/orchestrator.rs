// src/pipeline/orchestrator.rs
use super::config::DeviceKind;
use crate::display_list::{DisplayList, replay};
use crate::error::PipelineError;
use log::{debug, info};
use pagechain_device::Device;
use pagechain_pdf::PdfWriterDevice;
use pagechain_raster::{RasterDevice, RenderedPage};
use pagechain_stages::PageRange;

/// What a chain produced once closed.
#[derive(Debug)]
pub enum ChainOutput {
    /// Pages kept in memory; empty when they went to files.
    Raster(Vec<RenderedPage>),
    /// The document bytes; `None` when it went to a file.
    Pdf(Option<Vec<u8>>),
}

impl ChainOutput {
    pub fn into_pdf(self) -> Option<Vec<u8>> {
        match self {
            ChainOutput::Pdf(bytes) => bytes,
            ChainOutput::Raster(_) => None,
        }
    }

    pub fn into_pages(self) -> Vec<RenderedPage> {
        match self {
            ChainOutput::Raster(pages) => pages,
            ChainOutput::Pdf(_) => Vec::new(),
        }
    }
}

/// An open device chain fed from display lists.
#[derive(Debug)]
pub struct PageChain {
    device: Device,
    kind: DeviceKind,
    pages_shown: usize,
}

impl PageChain {
    pub(super) fn new(device: Device, kind: DeviceKind) -> Self {
        Self { device, kind, pages_shown: 0 }
    }

    /// The head of the chain.
    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// `show_page` operations replayed so far, kept or not.
    pub fn pages_shown(&self) -> usize {
        self.pages_shown
    }

    /// Pages counted by the page-range stage, if one is installed.
    pub fn pages_seen(&self) -> Option<i64> {
        PageRange::pages_seen(&self.device)
    }

    pub fn replay(&mut self, list: &DisplayList) -> Result<usize, PipelineError> {
        let pages = replay(&mut self.device, list)?;
        self.pages_shown += pages;
        debug!("{} pages shown through {}", self.pages_shown, self.device.name());
        Ok(pages)
    }

    /// Closes the chain and collects its output; the devices are finalized.
    pub fn finish(mut self) -> Result<ChainOutput, PipelineError> {
        self.device.close()?;
        let output = match self.kind {
            DeviceKind::Raster => ChainOutput::Raster(RasterDevice::take_pages(&mut self.device)?),
            DeviceKind::Pdf => ChainOutput::Pdf(PdfWriterDevice::take_output(&mut self.device)?),
        };
        info!(
            "Chain closed after {} pages shown ({} seen by the range stage)",
            self.pages_shown,
            self.pages_seen().map_or_else(|| "none".to_string(), |n| n.to_string())
        );
        self.device.finalize();
        Ok(output)
    }
}
