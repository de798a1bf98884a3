//! First/last page selection.
//!
//! Pages outside `[FirstPage, LastPage]` are swallowed whole: none of their
//! drawing reaches the wrapped device and neither does their `output_page`.
//! The range is the device's own `FirstPage`/`LastPage` state, so a
//! `put_params` sent to the chain moves it.

use log::debug;
use pagechain_device::{
    Device, DeviceError, DeviceResult, DeviceState, ForwardingStage, Op, OpCategory, Prototype, StagePolicy, install,
    resync, uninstall,
};

pub const PAGE_RANGE_STAGE: &str = "FirstLastPage";

/// Whether zero-based page `page` is selected; `last == 0` means "to the end".
pub fn page_in_range(page: i64, first: i32, last: i32) -> bool {
    page >= i64::from(first) && (last == 0 || page <= i64::from(last))
}

/// Pages seen so far, forwarded or not, and the range the stage replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCounter {
    pub count: i64,
    pub replaced: (i32, i32),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PageRange;

impl PageRange {
    pub fn prototype() -> Prototype {
        ForwardingStage::prototype(PAGE_RANGE_STAGE, PageRange, PageCounter::default)
    }

    /// The counter of the first page-range stage in the chain.
    pub fn pages_seen(dev: &Device) -> Option<i64> {
        dev.walk()
            .filter(|d| d.witness().is::<ForwardingStage<PageRange>>())
            .find_map(|d| d.private::<PageCounter>().ok())
            .map(|c| c.count)
    }
}

impl StagePolicy for PageRange {
    type Data = PageCounter;

    fn suppresses(&self, op: Op, data: &PageCounter, state: &DeviceState) -> bool {
        let gated = op == Op::OutputPage || !matches!(op.category(), OpCategory::Lifecycle | OpCategory::Accessor);
        gated && !page_in_range(data.count, state.first_page, state.last_page)
    }

    fn page_completed(&self, data: &mut PageCounter) {
        data.count += 1;
    }
}

/// Puts a page-range stage in front of `dev` and records the range on every
/// device behind it. The chain is untouched if the range is invalid or the
/// stage cannot be allocated.
pub fn install_page_range(dev: &mut Device, first: i32, last: i32) -> DeviceResult<()> {
    if first < 0 || last < 0 {
        return Err(DeviceError::Range(format!("page range {first}..{last} is negative")));
    }
    if last != 0 && last < first {
        return Err(DeviceError::Range(format!("last page {last} is before first page {first}")));
    }
    let prototype = PageRange::prototype();
    let replaced = (dev.state().first_page, dev.state().last_page);
    install(dev, &prototype, prototype.private_size())?;
    dev.private_mut::<PageCounter>()?.replaced = replaced;
    mirror_range(dev, first, last)?;
    let end = if last == 0 { "end".to_string() } else { last.to_string() };
    debug!("pages {first}..{end} selected in front of {}", dev.describe_chain());
    Ok(())
}

/// Removes the page-range stage at `dev` and puts back the range that was
/// in force before it went in. Stacked ranges come off innermost last.
pub fn uninstall_page_range(dev: &mut Device) -> DeviceResult<()> {
    if !dev.witness().is::<ForwardingStage<PageRange>>() {
        return Err(DeviceError::Structural(format!("'{}' is not a page-range stage", dev.name())));
    }
    let (first, last) = dev.private::<PageCounter>()?.replaced;
    uninstall(dev)?;
    // `dev` is now the old child; mirror into it and everything below.
    let state = dev.state_mut();
    state.first_page = first;
    state.last_page = last;
    mirror_range(dev, first, last)?;
    debug!("page range removed, {first}..{last} restored on {}", dev.describe_chain());
    Ok(())
}

/// Every node below `dev` mirrors the range, or the next resync would undo it.
fn mirror_range(dev: &mut Device, first: i32, last: i32) -> DeviceResult<()> {
    let mut node = dev.child_mut();
    while let Some(below) = node {
        let state = below.state_mut();
        state.first_page = first;
        state.last_page = last;
        node = below.child_mut();
    }
    resync(dev)
}
