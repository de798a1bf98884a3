#![allow(dead_code)]

use pagechain_device::defaults;
use pagechain_device::{
    CompositorTarget, Device, DeviceMemory, DeviceProcs, DeviceResult, DeviceState, ForwardingStage, ImageEnum, Op,
    OpCategory, OpTable, Prototype, StagePolicy,
};
use pagechain_types::graphics::{ClipPath, Compositor, FillParams, ImageDescriptor, ImagerState, Path};
use pagechain_types::{ColorIndex, DeviceColor, IntRect, Matrix};
use std::sync::Arc;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// What the recording terminal saw.
#[derive(Debug, Default)]
pub struct Recording {
    pub calls: Vec<&'static str>,
    pub fills: Vec<(IntRect, ColorIndex)>,
}

/// A terminal device that writes down every call it handles itself.
#[derive(Debug)]
pub struct Recorder;

fn note(dev: &mut Device, call: &'static str) -> DeviceResult<()> {
    dev.private_mut::<Recording>()?.calls.push(call);
    Ok(())
}

impl DeviceProcs for Recorder {
    fn open_device(&self, dev: &mut Device) -> DeviceResult<()> {
        dev.wire_deferred();
        note(dev, "open_device")
    }

    fn close_device(&self, dev: &mut Device) -> DeviceResult<()> {
        dev.unwire_deferred();
        note(dev, "close_device")
    }

    fn output_page(&self, dev: &mut Device, num_copies: u32, flush: bool) -> DeviceResult<()> {
        note(dev, "output_page")?;
        defaults::output_page(dev, num_copies, flush)
    }

    fn fill_rectangle(&self, dev: &mut Device, x: i32, y: i32, w: i32, h: i32, color: ColorIndex) -> DeviceResult<()> {
        let rec = dev.private_mut::<Recording>()?;
        rec.calls.push("fill_rectangle");
        rec.fills.push((IntRect::from_size(x, y, w, h), color));
        Ok(())
    }

    fn fill_path(
        &self,
        dev: &mut Device,
        pis: &ImagerState,
        path: &Path,
        params: &FillParams,
        color: &DeviceColor,
        clip: Option<&ClipPath>,
    ) -> DeviceResult<()> {
        note(dev, "fill_path")?;
        defaults::fill_path(dev, pis, path, params, color, clip)
    }

    fn begin_typed_image(
        &self,
        dev: &mut Device,
        pis: &ImagerState,
        matrix: Option<&Matrix>,
        image: &ImageDescriptor,
        rect: Option<&IntRect>,
        color: &DeviceColor,
        clip: Option<&ClipPath>,
    ) -> DeviceResult<Box<dyn ImageEnum>> {
        note(dev, "begin_typed_image")?;
        defaults::begin_typed_image(dev, pis, matrix, image, rect, color, clip)
    }

    fn create_compositor(
        &self,
        dev: &mut Device,
        _compositor: &Compositor,
        _pis: &ImagerState,
    ) -> DeviceResult<CompositorTarget> {
        note(dev, "create_compositor")?;
        Ok(CompositorTarget::Current(dev.id()))
    }
}

pub fn recorder_prototype() -> Prototype {
    let table = OpTable::implementing(&[
        Op::OpenDevice,
        Op::CloseDevice,
        Op::OutputPage,
        Op::FillRectangle,
        Op::FillPath,
        Op::BeginTypedImage,
        Op::CreateCompositor,
    ]);
    Prototype::new("recorder", Recorder, table).with_private_data(Recording::default)
}

pub fn recorder(memory: Arc<dyn DeviceMemory>) -> Device {
    Device::new(&recorder_prototype(), DeviceState::default(), memory).expect("recorder allocates")
}

/// The recording of the chain's tail.
pub fn recording(dev: &Device) -> &Recording {
    dev.tail().private::<Recording>().expect("tail is a recorder")
}

/// Swallows every drawing operation while its private flag is set.
#[derive(Debug)]
pub struct Switch;

impl StagePolicy for Switch {
    type Data = bool;

    fn suppresses(&self, op: Op, data: &bool, _state: &DeviceState) -> bool {
        *data && op.category() != OpCategory::Lifecycle
    }
}

pub fn switch_prototype(on: bool) -> Prototype {
    ForwardingStage::prototype("switch", Switch, move || on)
}
