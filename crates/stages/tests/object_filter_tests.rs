mod common;

use common::{TestResult, init_logging, page_recorder, pages};
use pagechain_stages::{ObjectKinds, install_object_filter, install_page_range};
use pagechain_types::geometry::int2fixed;
use pagechain_types::graphics::{FillParams, ImageDescriptor, ImagerState, Path};
use pagechain_types::{DeviceColor, GraphicsTypeTag};

fn triangle() -> Path {
    Path::new()
        .move_to(int2fixed(0), int2fixed(0))
        .line_to(int2fixed(8), int2fixed(0))
        .line_to(int2fixed(0), int2fixed(8))
        .close()
}

#[test]
fn test_vector_filter_drops_paths_but_keeps_images() -> TestResult {
    init_logging();
    let mut dev = page_recorder();
    install_object_filter(&mut dev, ObjectKinds { vector: true, ..ObjectKinds::default() })?;
    dev.open()?;

    let pis = ImagerState::default();
    dev.fill_path(&pis, &triangle(), &FillParams::default(), &DeviceColor::Pure(1), None)?;
    assert_eq!(pages(&dev).paths, 0);

    let image = ImageDescriptor::mask(4, 1);
    let info = dev.begin_typed_image(&pis, None, &image, None, &DeviceColor::Pure(1), None)?;
    assert!(!info.is_null());
    dev.end_image(info, true)?;
    Ok(())
}

#[test]
fn test_image_filter_follows_the_type_tag_down_to_rectangles() -> TestResult {
    init_logging();
    let mut dev = page_recorder();
    install_object_filter(&mut dev, ObjectKinds { image: true, ..ObjectKinds::default() })?;
    dev.open()?;

    dev.set_graphics_type_tag(GraphicsTypeTag::Image);
    assert_eq!(dev.state().graphics_type_tag, GraphicsTypeTag::Image);
    dev.fill_rectangle(0, 0, 4, 4, 1)?;
    assert_eq!(pages(&dev).marks, 0);

    dev.set_graphics_type_tag(GraphicsTypeTag::Path);
    dev.fill_rectangle(0, 0, 4, 4, 1)?;
    assert_eq!(pages(&dev).marks, 1);
    Ok(())
}

#[test]
fn test_filter_and_page_range_compose() -> TestResult {
    init_logging();
    let mut dev = page_recorder();
    install_object_filter(&mut dev, ObjectKinds { text: true, ..ObjectKinds::default() })?;
    install_page_range(&mut dev, 1, 1)?;
    assert_eq!(dev.chain_len(), 3);
    dev.open()?;

    let pis = ImagerState::default();
    for _ in 0..3 {
        dev.fill_path(&pis, &triangle(), &FillParams::default(), &DeviceColor::Pure(1), None)?;
        dev.output_page(1, true)?;
    }
    assert_eq!(pages(&dev).emitted, vec![1]);
    Ok(())
}

#[test]
fn test_kinds_load_from_json() -> TestResult {
    let kinds: ObjectKinds = serde_json::from_str(r#"{ "text": true }"#)?;
    assert_eq!(kinds, ObjectKinds { text: true, ..ObjectKinds::default() });
    Ok(())
}
