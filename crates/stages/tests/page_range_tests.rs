mod common;

use common::{TestResult, draw_numbered_page, draw_page, init_logging, page_recorder, pages};
use pagechain_device::{DeviceError, Op, ProcSlot};
use pagechain_stages::{PageRange, install_page_range, uninstall_page_range};
use pagechain_types::graphics::{AlphaBitsKind, Font, ImageDescriptor, ImagePlane, ImagerState, TextParams};
use pagechain_types::{DeviceColor, FixedPoint, ParamList};

#[test]
fn test_three_of_ten_pages_are_forwarded() -> TestResult {
    init_logging();
    let mut dev = page_recorder();
    install_page_range(&mut dev, 3, 5)?;
    dev.open()?;
    for n in 0..10 {
        draw_numbered_page(&mut dev, n)?;
    }
    assert_eq!(PageRange::pages_seen(&dev), Some(10));
    assert_eq!(pages(&dev).emitted, vec![1, 1, 1]);
    assert_eq!(pages(&dev).numbers, vec![3, 4, 5]);
    assert_eq!(dev.tail().state().page_count, 3);
    Ok(())
}

#[test]
fn test_range_two_to_four_of_six() -> TestResult {
    init_logging();
    let mut dev = page_recorder();
    install_page_range(&mut dev, 2, 4)?;
    dev.open()?;
    for n in 0..6 {
        draw_numbered_page(&mut dev, n)?;
    }
    assert_eq!(PageRange::pages_seen(&dev), Some(6));
    assert_eq!(pages(&dev).numbers, vec![2, 3, 4]);
    // The head mirrors the terminal's count, not the stage's.
    assert_eq!(dev.state().page_count, 3);
    Ok(())
}

#[test]
fn test_open_ended_range_forwards_the_tail_of_the_document() -> TestResult {
    init_logging();
    let mut dev = page_recorder();
    install_page_range(&mut dev, 4, 0)?;
    dev.open()?;
    for _ in 0..7 {
        draw_page(&mut dev)?;
    }
    assert_eq!(pages(&dev).emitted.len(), 3);
    Ok(())
}

#[test]
fn test_put_params_moves_the_range() -> TestResult {
    init_logging();
    let mut dev = page_recorder();
    install_page_range(&mut dev, 0, 0)?;
    dev.open()?;
    let mut list = ParamList::new().with("FirstPage", 2);
    dev.put_params(&mut list)?;
    assert_eq!(dev.state().first_page, 2);
    assert_eq!(dev.tail().state().first_page, 2);
    for _ in 0..4 {
        draw_page(&mut dev)?;
    }
    assert_eq!(pages(&dev).emitted.len(), 2);
    Ok(())
}

#[test]
fn test_skipped_pages_hand_back_null_enumerators() -> TestResult {
    init_logging();
    let mut dev = page_recorder();
    install_page_range(&mut dev, 1, 1)?;
    dev.open()?;

    let pis = ImagerState::default();
    let image = ImageDescriptor::mask(8, 1);
    let mut info = dev.begin_typed_image(&pis, None, &image, None, &DeviceColor::Pure(1), None)?;
    assert!(info.is_null());
    let row = [0xffu8];
    let planes = [ImagePlane { data: &row, data_x: 0, raster: 1 }];
    assert!(dev.image_data(info.as_mut(), &planes, 1)?);
    dev.end_image(info, true)?;

    let text = TextParams::show("skipped");
    let font = Font::new("Courier", 12.0);
    let mut text_enum = dev.text_begin(&pis, &text, &font, FixedPoint::default(), &DeviceColor::Pure(1), None)?;
    assert!(text_enum.is_null());
    assert!(text_enum.process(&mut dev)?);

    dev.output_page(1, true)?;
    assert!(pages(&dev).emitted.is_empty());
    Ok(())
}

#[test]
fn test_invalid_ranges_leave_the_device_alone() -> TestResult {
    init_logging();
    let mut dev = page_recorder();
    assert!(matches!(install_page_range(&mut dev, 5, 3), Err(DeviceError::Range(_))));
    assert!(matches!(install_page_range(&mut dev, -1, 0), Err(DeviceError::Range(_))));
    assert_eq!(dev.chain_len(), 1);
    assert_eq!(dev.table().get(Op::FillRectangle), ProcSlot::Unset);
    Ok(())
}

#[test]
fn test_skipped_pages_report_no_alpha_bits() -> TestResult {
    init_logging();
    let mut dev = page_recorder();
    install_page_range(&mut dev, 1, 1)?;
    dev.open()?;
    assert_eq!(dev.get_alpha_bits(AlphaBitsKind::Text), 0);
    assert_eq!(dev.get_alpha_bits(AlphaBitsKind::Graphics), 0);
    draw_page(&mut dev)?;
    assert_eq!(dev.get_alpha_bits(AlphaBitsKind::Text), 1);
    Ok(())
}

#[test]
fn test_removing_the_range_restores_the_previous_one() -> TestResult {
    init_logging();
    let mut dev = page_recorder();
    install_page_range(&mut dev, 2, 0)?;
    install_page_range(&mut dev, 5, 6)?;
    assert_eq!(dev.tail().state().first_page, 5);

    uninstall_page_range(&mut dev)?;
    assert_eq!(dev.chain_len(), 2);
    assert_eq!((dev.state().first_page, dev.state().last_page), (2, 0));
    assert_eq!((dev.tail().state().first_page, dev.tail().state().last_page), (2, 0));

    uninstall_page_range(&mut dev)?;
    assert_eq!(dev.chain_len(), 1);
    assert_eq!((dev.state().first_page, dev.state().last_page), (0, 0));
    assert!(matches!(uninstall_page_range(&mut dev), Err(DeviceError::Structural(_))));
    Ok(())
}
