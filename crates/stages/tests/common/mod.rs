#![allow(dead_code)]

use pagechain_device::defaults;
use pagechain_device::{Device, DeviceProcs, DeviceResult, DeviceState, HeapMemory, Op, OpTable, Prototype};
use pagechain_types::graphics::{ClipPath, FillParams, ImagerState, Path};
use pagechain_types::{ColorIndex, DeviceColor};
use std::sync::Arc;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Marks received per emitted page.
#[derive(Debug, Default)]
pub struct Pages {
    pub emitted: Vec<usize>,
    pub marks: usize,
    pub paths: usize,
    /// The page number each emitted page was drawn as, from its first mark.
    pub numbers: Vec<i32>,
    first_mark: Option<i32>,
}

#[derive(Debug)]
pub struct PageRecorder;

impl DeviceProcs for PageRecorder {
    fn open_device(&self, dev: &mut Device) -> DeviceResult<()> {
        dev.wire_deferred();
        Ok(())
    }

    fn output_page(&self, dev: &mut Device, num_copies: u32, flush: bool) -> DeviceResult<()> {
        let pages = dev.private_mut::<Pages>()?;
        pages.emitted.push(pages.marks);
        pages.marks = 0;
        if let Some(number) = pages.first_mark.take() {
            pages.numbers.push(number);
        }
        defaults::output_page(dev, num_copies, flush)
    }

    fn fill_rectangle(&self, dev: &mut Device, x: i32, _y: i32, _w: i32, _h: i32, _c: ColorIndex) -> DeviceResult<()> {
        let pages = dev.private_mut::<Pages>()?;
        pages.marks += 1;
        pages.first_mark.get_or_insert(x);
        Ok(())
    }

    fn fill_path(
        &self,
        dev: &mut Device,
        _pis: &ImagerState,
        _path: &Path,
        _params: &FillParams,
        _color: &DeviceColor,
        _clip: Option<&ClipPath>,
    ) -> DeviceResult<()> {
        let pages = dev.private_mut::<Pages>()?;
        pages.paths += 1;
        pages.marks += 1;
        Ok(())
    }
}

pub fn page_recorder() -> Device {
    let table = OpTable::implementing(&[Op::OpenDevice, Op::OutputPage, Op::FillRectangle, Op::FillPath]);
    let prototype = Prototype::new("pages", PageRecorder, table).with_private_data(Pages::default);
    Device::new(&prototype, DeviceState::default(), Arc::new(HeapMemory::new())).expect("recorder allocates")
}

pub fn pages(dev: &Device) -> &Pages {
    dev.tail().private::<Pages>().expect("tail records pages")
}

/// One page with one mark on it.
pub fn draw_page(dev: &mut Device) -> DeviceResult<()> {
    dev.fill_rectangle(0, 0, 10, 10, 1)?;
    dev.output_page(1, true)
}

/// Page `number`, marked at `x == number` so the receiver can tell which it got.
pub fn draw_numbered_page(dev: &mut Device, number: i32) -> DeviceResult<()> {
    dev.fill_rectangle(number, 0, 1, 1, 1)?;
    dev.output_page(1, true)
}
