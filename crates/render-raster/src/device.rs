//! The raster terminal: draws everything into an in-memory page buffer and
//! hands finished pages to a [`RasterOutput`].
//!
//! The buffer only exists while the device is open, so `fill_rectangle` is
//! wired at open and unwired at close. A geometry change through
//! `put_params` throws the buffer away and leaves the device closed; the
//! next `open` allocates one of the new size.

use crate::buffer::PageBuffer;
use crate::output::{RasterOutput, RenderedPage};
use log::{debug, info};
use pagechain_device::defaults;
use pagechain_device::{
    Allocation, Arena, Device, DeviceError, DeviceId, DeviceMemory, DeviceProcs, DeviceResult, DeviceState, Op,
    OpTable, Prototype,
};
use pagechain_types::graphics::{GetBitsParams, ProcessPageOptions};
use pagechain_types::{ColorIndex, ColorInfo, ColorModel, IntRect, ParamList, Polarity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const RASTER_DEVICE: &str = "raster";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    pub color_model: ColorModel,
    pub bits_per_component: u8,
    /// Dots per inch, x and y.
    pub resolution: [f32; 2],
    /// Points, width and height.
    pub media_size: [f32; 2],
    /// Rows per band reported by `get_band` and used by `process_page`;
    /// 0 means the whole page is one band.
    pub band_height: i32,
    pub output: RasterOutput,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            color_model: ColorModel::DeviceRGB,
            bits_per_component: 8,
            resolution: [72.0, 72.0],
            media_size: [612.0, 792.0],
            band_height: 0,
            output: RasterOutput::Memory,
        }
    }
}

/// The raster device's private data.
#[derive(Debug)]
pub struct RasterPage {
    band_height: i32,
    output: RasterOutput,
    buffer: Option<PageBuffer>,
    allocation: Option<Allocation>,
    pages: Vec<RenderedPage>,
    pixels_filled: u64,
}

impl RasterPage {
    fn new(band_height: i32, output: RasterOutput) -> Self {
        Self {
            band_height,
            output,
            buffer: None,
            allocation: None,
            pages: Vec::new(),
            pixels_filled: 0,
        }
    }

    pub fn buffer(&self) -> Option<&PageBuffer> {
        self.buffer.as_ref()
    }

    pub fn pages(&self) -> &[RenderedPage] {
        &self.pages
    }

    /// Pixels written by `fill_rectangle` since the device was created.
    pub fn pixels_filled(&self) -> u64 {
        self.pixels_filled
    }
}

#[derive(Debug)]
pub struct RasterDevice;

impl RasterDevice {
    pub fn prototype(options: &RasterOptions) -> Prototype {
        let table = OpTable::implementing(&[
            Op::OpenDevice,
            Op::OutputPage,
            Op::CloseDevice,
            Op::FillRectangle,
            Op::PutParams,
            Op::GetPageDevice,
            Op::GetBand,
            Op::GetBitsRectangle,
            Op::ProcessPage,
        ]);
        let band_height = options.band_height;
        let output = options.output.clone();
        Prototype::new(RASTER_DEVICE, RasterDevice, table)
            .with_private_data(move || RasterPage::new(band_height, output.clone()))
            .with_finalize(|dev| {
                if let Err(err) = release_buffer(dev) {
                    log::warn!("raster device {} released its buffer badly: {err}", dev.id());
                }
            })
    }

    pub fn initial_state(options: &RasterOptions) -> DeviceResult<DeviceState> {
        if !matches!(options.bits_per_component, 8 | 16) {
            return Err(DeviceError::Range(format!(
                "raster device renders 8 or 16 bits per component, not {}",
                options.bits_per_component
            )));
        }
        if options.resolution.iter().chain(&options.media_size).any(|v| *v <= 0.0) {
            return Err(DeviceError::Range("resolution and media size must be positive".into()));
        }
        let depth = options.color_model.num_components() * options.bits_per_component;
        let mut state = DeviceState {
            color_info: ColorInfo::for_model(options.color_model, depth),
            hw_resolution: options.resolution,
            media_size: options.media_size,
            ..DeviceState::default()
        };
        state.update_dimensions();
        state.cached_colors.white = white(&state);
        state.cached_colors.black = !state.cached_colors.white & full_scale(depth);
        Ok(state)
    }

    pub fn create(options: &RasterOptions, memory: Arc<dyn DeviceMemory>) -> DeviceResult<Device> {
        Device::new(&Self::prototype(options), Self::initial_state(options)?, memory)
    }

    /// The raster page data at the end of `dev`'s chain.
    pub fn page(dev: &Device) -> DeviceResult<&RasterPage> {
        dev.tail().private::<RasterPage>()
    }

    /// Takes the pages kept in memory so far.
    pub fn take_pages(dev: &mut Device) -> DeviceResult<Vec<RenderedPage>> {
        let tail = dev.tail().id();
        let node = dev
            .find_mut(tail)
            .ok_or_else(|| DeviceError::Structural(format!("tail {tail} vanished from its chain")))?;
        Ok(std::mem::take(&mut node.private_mut::<RasterPage>()?.pages))
    }
}

fn full_scale(depth: u8) -> ColorIndex {
    if depth >= 64 { ColorIndex::MAX } else { (1 << depth) - 1 }
}

/// Paper: all components full on for additive models, all off otherwise.
fn white(state: &DeviceState) -> ColorIndex {
    match state.color_info.polarity {
        Polarity::Additive => full_scale(state.color_info.depth),
        _ => 0,
    }
}

fn release_buffer(dev: &mut Device) -> DeviceResult<()> {
    let page = dev.private_mut::<RasterPage>()?;
    page.buffer = None;
    let allocation = page.allocation.take();
    if let Some(allocation) = allocation {
        dev.memory().free(allocation);
        debug!("raster device {} released its page buffer", dev.id());
    }
    dev.unwire_deferred();
    Ok(())
}

impl DeviceProcs for RasterDevice {
    fn open_device(&self, dev: &mut Device) -> DeviceResult<()> {
        if dev.private::<RasterPage>()?.buffer.is_some() {
            return Ok(());
        }
        let state = dev.state();
        let (width, height, depth) = (state.width, state.height, state.color_info.depth);
        let size = PageBuffer::size_for(width, height, depth)
            .ok_or_else(|| DeviceError::Range(format!("cannot buffer {width}x{height} pixels at depth {depth}")))?;
        let paper = white(state);
        // Charge the budget before touching the system allocator.
        let allocation = dev.memory().alloc(Arena::Stable, size, "raster page buffer")?;
        let mut buffer = match PageBuffer::new(width, height, depth) {
            Ok(buffer) => buffer,
            Err(err) => {
                dev.memory().free(allocation);
                return Err(err);
            }
        };
        buffer.clear(paper);
        let page = dev.private_mut::<RasterPage>()?;
        page.buffer = Some(buffer);
        page.allocation = Some(allocation);
        dev.wire_deferred();
        debug!("raster device {} opened at {width}x{height}, depth {depth}", dev.id());
        Ok(())
    }

    fn output_page(&self, dev: &mut Device, num_copies: u32, flush: bool) -> DeviceResult<()> {
        let number = dev.state().page_count + 1;
        let paper = white(dev.state());
        let info = dev.state().color_info.clone();
        let id = dev.id();
        let page = dev.private_mut::<RasterPage>()?;
        let buffer = page
            .buffer
            .as_mut()
            .ok_or_else(|| DeviceError::Structural(format!("raster device {id} output a page while closed")))?;
        let rendered = RenderedPage {
            width: buffer.width(),
            height: buffer.height(),
            num_components: info.num_components,
            bits_per_component: info.bits_per_component(),
            data: buffer.data().to_vec(),
        };
        buffer.clear(paper);
        match &page.output {
            RasterOutput::Memory => page.pages.push(rendered),
            RasterOutput::Pnm(pattern) => {
                let path = RasterOutput::page_path(pattern, number);
                std::fs::write(&path, rendered.to_pnm()?)?;
                info!("page {number} written to {}", path.display());
            }
            RasterOutput::Discard => {}
        }
        info!("raster device {id} emitted page {number}");
        defaults::output_page(dev, num_copies, flush)
    }

    fn close_device(&self, dev: &mut Device) -> DeviceResult<()> {
        release_buffer(dev)
    }

    fn fill_rectangle(&self, dev: &mut Device, x: i32, y: i32, width: i32, height: i32, color: ColorIndex) -> DeviceResult<()> {
        let page = dev.private_mut::<RasterPage>()?;
        let Some(buffer) = page.buffer.as_mut() else {
            return Err(DeviceError::Unsupported(Op::FillRectangle));
        };
        page.pixels_filled += buffer.fill(IntRect::from_size(x, y, width, height), color) as u64;
        Ok(())
    }

    /// Applies the standard parameters; a change of size or resolution
    /// while open discards the buffer and closes the device.
    fn put_params(&self, dev: &mut Device, list: &mut ParamList) -> DeviceResult<()> {
        let geometry = |s: &DeviceState| (s.width, s.height, s.hw_resolution, s.media_size);
        let before = geometry(dev.state());
        defaults::put_params(dev, list)?;
        if geometry(dev.state()) != before && dev.is_open() {
            info!("raster device {} changed geometry, closing", dev.id());
            release_buffer(dev)?;
            dev.set_open(false);
        }
        Ok(())
    }

    fn get_page_device(&self, dev: &Device) -> Option<DeviceId> {
        Some(dev.id())
    }

    /// `(first row of the band holding y, rows in that band)`.
    fn get_band(&self, dev: &Device, y: i32) -> Option<(i32, i32)> {
        let page = dev.private::<RasterPage>().ok()?;
        let height = page.buffer.as_ref()?.height();
        if page.band_height <= 0 || y < 0 || y >= height {
            return None;
        }
        let start = y / page.band_height * page.band_height;
        Some((start, page.band_height.min(height - start)))
    }

    fn get_bits_rectangle(&self, dev: &Device, rect: &IntRect, params: &mut GetBitsParams) -> DeviceResult<()> {
        let Some(buffer) = dev.private::<RasterPage>()?.buffer.as_ref() else {
            return defaults::get_bits_rectangle(dev, rect, params);
        };
        if !buffer.read_rect(rect, &mut params.data, params.raster) {
            return Err(DeviceError::Range(format!("{rect:?} is not inside the page")));
        }
        Ok(())
    }

    fn process_page(&self, dev: &mut Device, options: &mut ProcessPageOptions<'_>) -> DeviceResult<()> {
        let page = dev.private::<RasterPage>()?;
        let Some(buffer) = page.buffer.as_ref() else {
            return Err(DeviceError::Unsupported(Op::ProcessPage));
        };
        let height = buffer.height();
        let band = match (options.band_height, page.band_height) {
            (0, 0) => height.max(1),
            (0, own) => own,
            (asked, _) => i32::try_from(asked).unwrap_or(i32::MAX),
        };
        let mut y = 0;
        while y < height {
            let end = (y + band).min(height);
            (options.process)(IntRect::new(0, y, buffer.width(), end), buffer.rows(y, end))
                .map_err(|err| DeviceError::Io(std::io::Error::other(format!("band at row {y}: {err}"))))?;
            y = end;
        }
        Ok(())
    }
}
