mod common;

use common::{TestResult, gray_options, init_logging, raster, raster_in};
use pagechain_device::{Arena, BoundedMemory, DeviceError, DeviceMemory, HeapMemory, Op, ProcSlot};
use pagechain_raster::{PageBuffer, RasterDevice, RasterOptions, RasterOutput};
use pagechain_stages::install_page_range;
use pagechain_types::graphics::{GetBitsParams, ImageDescriptor, ImagePlane, ImagerState, ProcessPageOptions};
use pagechain_types::{DeviceColor, IntRect, ParamList};
use std::sync::Arc;

#[test]
fn test_geometry_change_closes_the_raster_behind_a_stage() -> TestResult {
    init_logging();
    let mut dev = raster(&gray_options());
    install_page_range(&mut dev, 0, 0)?;
    dev.open()?;
    assert!(dev.is_open());
    assert_eq!((dev.state().width, dev.state().height), (20, 10));

    let mut list = ParamList::new().with("HWResolution", vec![144.0, 144.0]);
    dev.put_params(&mut list)?;
    assert!(!dev.is_open());
    assert!(!dev.tail().is_open());
    assert_eq!((dev.state().width, dev.state().height), (40, 20));
    assert_eq!(dev.table().get(Op::FillRectangle), ProcSlot::Unset);

    dev.open()?;
    let buffer = RasterDevice::page(&dev)?.buffer().map(|b| (b.width(), b.height()));
    assert_eq!(buffer, Some((40, 20)));
    assert_eq!(dev.table().get(Op::FillRectangle), ProcSlot::Implemented);
    Ok(())
}

#[test]
fn test_unchanged_geometry_keeps_the_device_open() -> TestResult {
    init_logging();
    let mut dev = raster(&gray_options());
    dev.open()?;
    let mut list = ParamList::new().with("NumCopies", 2);
    dev.put_params(&mut list)?;
    assert!(dev.is_open());
    assert_eq!(dev.state().num_copies, 2);
    Ok(())
}

#[test]
fn test_bits_read_back_through_the_chain() -> TestResult {
    init_logging();
    let mut dev = raster(&gray_options());
    install_page_range(&mut dev, 0, 0)?;
    dev.open()?;
    dev.fill_rectangle(2, 3, 4, 1, 0x10)?;

    let mut row = vec![0u8; 20];
    dev.get_bits(3, &mut row)?;
    assert_eq!(&row[..7], &[0xff, 0xff, 0x10, 0x10, 0x10, 0x10, 0xff]);

    let mut params = GetBitsParams::default();
    dev.get_bits_rectangle(&IntRect::new(2, 3, 4, 5), &mut params)?;
    assert_eq!(params.data, vec![0x10, 0x10, 0xff, 0xff]);

    let outside = dev.get_bits_rectangle(&IntRect::new(18, 0, 22, 1), &mut params);
    assert!(matches!(outside, Err(DeviceError::Range(_))));
    Ok(())
}

#[test]
fn test_process_page_walks_every_band() -> TestResult {
    init_logging();
    let mut dev = raster(&RasterOptions { band_height: 4, ..gray_options() });
    dev.open()?;
    dev.fill_rectangle(0, 9, 20, 1, 0)?;

    let mut bands = Vec::new();
    let mut process = |rect: IntRect, rows: &[u8]| -> Result<(), String> {
        bands.push((rect, rows.len(), rows.last().copied()));
        Ok(())
    };
    dev.process_page(&mut ProcessPageOptions { band_height: 0, process: &mut process })?;
    assert_eq!(
        bands,
        vec![
            (IntRect::new(0, 0, 20, 4), 80, Some(0xff)),
            (IntRect::new(0, 4, 20, 8), 80, Some(0xff)),
            (IntRect::new(0, 8, 20, 10), 40, Some(0)),
        ]
    );

    let mut failing = |_: IntRect, _: &[u8]| -> Result<(), String> { Err("disk full".into()) };
    let result = dev.process_page(&mut ProcessPageOptions { band_height: 5, process: &mut failing });
    assert!(matches!(result, Err(DeviceError::Io(_))));
    Ok(())
}

#[test]
fn test_pages_are_kept_and_the_buffer_cleared() -> TestResult {
    init_logging();
    let mut dev = raster(&gray_options());
    dev.open()?;
    dev.fill_rectangle(0, 0, 1, 1, 0)?;
    dev.output_page(1, true)?;
    dev.output_page(1, true)?;

    let pages = RasterDevice::take_pages(&mut dev)?;
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].data[0], 0);
    assert_eq!(pages[1].data[0], 0xff);
    assert_eq!((pages[0].width, pages[0].height, pages[0].num_components), (20, 10, 1));
    assert!(RasterDevice::page(&dev)?.pages().is_empty());
    assert_eq!(dev.state().page_count, 2);
    Ok(())
}

#[test]
fn test_selected_pages_are_written_as_pnm_files() -> TestResult {
    init_logging();
    let dir = tempfile::tempdir()?;
    let pattern = dir.path().join("page-%d.pgm");
    let mut dev = raster(&RasterOptions { output: RasterOutput::Pnm(pattern), ..gray_options() });
    install_page_range(&mut dev, 1, 2)?;
    dev.open()?;
    for _ in 0..4 {
        dev.fill_rectangle(0, 0, 20, 10, 0x80)?;
        dev.output_page(1, true)?;
    }

    let first = std::fs::read(dir.path().join("page-1.pgm"))?;
    assert!(first.starts_with(b"P5\n20 10\n255\n"));
    assert_eq!(first.len(), b"P5\n20 10\n255\n".len() + 200);
    assert!(first.ends_with(&[0x80]));
    assert!(dir.path().join("page-2.pgm").exists());
    assert!(!dir.path().join("page-3.pgm").exists());
    Ok(())
}

#[test]
fn test_mask_image_paints_into_the_buffer() -> TestResult {
    init_logging();
    let mut dev = raster(&gray_options());
    install_page_range(&mut dev, 0, 0)?;
    dev.open()?;

    let pis = ImagerState::default();
    let image = ImageDescriptor::mask(8, 1);
    let mut info = dev.begin_typed_image(&pis, None, &image, None, &DeviceColor::Pure(0x20), None)?;
    let row = [0b1010_0000u8];
    let planes = [ImagePlane { data: &row, data_x: 0, raster: 1 }];
    dev.image_data(info.as_mut(), &planes, 1)?;
    dev.end_image(info, false)?;

    let buffer = RasterDevice::page(&dev)?.buffer().cloned().ok_or("no buffer")?;
    assert_eq!(buffer.pixel(0, 0), Some(0x20));
    assert_eq!(buffer.pixel(1, 0), Some(0xff));
    assert_eq!(buffer.pixel(2, 0), Some(0x20));
    assert_eq!(buffer.pixel(3, 0), Some(0xff));
    Ok(())
}

#[test]
fn test_buffer_memory_is_accounted_and_returned() -> TestResult {
    init_logging();
    let memory = Arc::new(HeapMemory::new());
    let mut dev = raster_in(&gray_options(), memory.clone());
    let base = memory.in_use(Arena::Stable);
    dev.open()?;
    assert_eq!(memory.in_use(Arena::Stable), base + PageBuffer::size_for(20, 10, 8).ok_or("size")?);
    dev.close()?;
    assert_eq!(memory.in_use(Arena::Stable), base);

    dev.open()?;
    drop(dev);
    assert_eq!(memory.in_use(Arena::Stable), 0);
    Ok(())
}

#[test]
fn test_open_fails_cleanly_without_room_for_the_page() -> TestResult {
    init_logging();
    let options = gray_options();
    let private = RasterDevice::prototype(&options).private_size();
    let memory: Arc<dyn DeviceMemory> = Arc::new(BoundedMemory::new(private + 64));
    let mut dev = raster_in(&options, memory);
    let err = dev.open().expect_err("a 200 byte page does not fit in 64");
    assert!(matches!(err, DeviceError::AllocationFailure { .. }));
    assert!(!dev.is_open());
    assert!(RasterDevice::page(&dev)?.buffer().is_none());
    assert_eq!(dev.table().get(Op::FillRectangle), ProcSlot::Unset);
    Ok(())
}

#[test]
fn test_oversized_page_is_refused_by_a_bounded_budget() -> TestResult {
    init_logging();
    let memory = Arc::new(BoundedMemory::new(1 << 20));
    let options = RasterOptions { resolution: [20000.0, 20000.0], ..RasterOptions::default() };
    let mut dev = raster_in(&options, memory.clone());
    let base = memory.in_use(Arena::Stable);

    let err = dev.open().unwrap_err();
    assert!(matches!(err, DeviceError::AllocationFailure { arena: Arena::Stable, .. }));
    assert!(!dev.is_open());
    assert!(RasterDevice::page(&dev)?.buffer().is_none());
    assert_eq!(memory.in_use(Arena::Stable), base);
    assert_eq!(dev.table().get(Op::FillRectangle), ProcSlot::Unset);
    Ok(())
}
