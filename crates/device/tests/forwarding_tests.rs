mod common;

use common::{TestResult, init_logging, recorder, recording, switch_prototype};
use pagechain_device::{
    Arena, BoundedMemory, CompositorTarget, DeviceError, DeviceMemory, HeapMemory, Op, ProcSlot, install, uninstall,
};
use pagechain_types::graphics::{Compositor, FillParams, ImageDescriptor, ImagePlane, ImagerState, Path};
use pagechain_types::geometry::int2fixed;
use pagechain_types::{DeviceColor, IntRect, MAX_COLOR_VALUE, ParamList};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn square() -> Path {
    Path::new()
        .move_to(int2fixed(2), int2fixed(2))
        .line_to(int2fixed(6), int2fixed(2))
        .line_to(int2fixed(6), int2fixed(6))
        .line_to(int2fixed(2), int2fixed(6))
        .close()
}

#[test]
fn test_open_stage_forwards_drawing_to_the_tail() -> TestResult {
    init_logging();
    let mut dev = recorder(Arc::new(HeapMemory::new()));
    let proto = switch_prototype(false);
    install(&mut dev, &proto, proto.private_size())?;
    dev.open()?;

    let pis = ImagerState::default();
    dev.fill_path(&pis, &square(), &FillParams::default(), &DeviceColor::Pure(3), None)?;

    let rec = recording(&dev);
    assert_eq!(rec.calls[0], "open_device");
    assert!(rec.calls.contains(&"fill_path"));
    // The tail's own fill_path default breaks the square into rectangles.
    assert!(!rec.fills.is_empty());
    assert!(rec.fills.iter().all(|(_, color)| *color == 3));
    Ok(())
}

#[test]
fn test_suppressed_drawing_never_reaches_the_tail() -> TestResult {
    init_logging();
    let mut dev = recorder(Arc::new(HeapMemory::new()));
    let proto = switch_prototype(true);
    install(&mut dev, &proto, proto.private_size())?;
    dev.open()?;

    let pis = ImagerState::default();
    dev.fill_path(&pis, &square(), &FillParams::default(), &DeviceColor::Pure(3), None)?;
    dev.fill_rectangle(0, 0, 10, 10, 1)?;
    dev.draw_line(0, 0, 5, 5, 1)?;

    assert_eq!(recording(&dev).calls, vec!["open_device"]);

    // Flip the switch off and the same call goes through.
    *dev.private_mut::<bool>()? = false;
    dev.fill_rectangle(0, 0, 10, 10, 1)?;
    assert_eq!(recording(&dev).fills, vec![(IntRect::new(0, 0, 10, 10), 1)]);
    Ok(())
}

#[test]
fn test_accessors_ignore_the_gate() -> TestResult {
    init_logging();
    let mut dev = recorder(Arc::new(HeapMemory::new()));
    let expected = dev.map_rgb_color(&[MAX_COLOR_VALUE, 0, 0]);
    let matrix = dev.get_initial_matrix();
    let proto = switch_prototype(true);
    install(&mut dev, &proto, proto.private_size())?;

    assert_eq!(dev.map_rgb_color(&[MAX_COLOR_VALUE, 0, 0]), expected);
    assert_eq!(dev.get_initial_matrix(), matrix);
    Ok(())
}

#[test]
fn test_accessor_falls_back_to_the_default_when_the_child_has_none() -> TestResult {
    init_logging();
    let memory: Arc<dyn DeviceMemory> = Arc::new(HeapMemory::new());
    let mut dev = recorder(memory.clone());
    let bare = recorder(memory);
    let proto = switch_prototype(false);
    install(&mut dev, &proto, proto.private_size())?;

    // The recorder implements no color mapping; both answers come from the
    // default library.
    assert_eq!(dev.child().map(|c| c.table().get(Op::MapRgbColor)), Some(ProcSlot::Default));
    let cv = [MAX_COLOR_VALUE / 2, MAX_COLOR_VALUE, 0];
    assert_eq!(dev.map_rgb_color(&cv), bare.map_rgb_color(&cv));
    assert_eq!(dev.get_color_comp_index("Green"), bare.get_color_comp_index("Green"));
    Ok(())
}

#[test]
fn test_compositor_answer_never_names_the_child() -> TestResult {
    init_logging();
    let mut dev = recorder(Arc::new(HeapMemory::new()));
    let proto = switch_prototype(false);
    install(&mut dev, &proto, proto.private_size())?;
    let head = dev.id();
    let pis = ImagerState::default();

    let target = dev.create_compositor(&Compositor::Alpha { alpha: 0.5 }, &pis)?;
    assert!(matches!(target, CompositorTarget::Current(id) if id == head));
    assert_eq!(recording(&dev).calls, vec!["create_compositor"]);

    *dev.private_mut::<bool>()? = true;
    let target = dev.create_compositor(&Compositor::Transparency { page_group: true }, &pis)?;
    assert!(matches!(target, CompositorTarget::Current(id) if id == head));
    assert_eq!(recording(&dev).calls.len(), 1);
    Ok(())
}

#[test]
fn test_install_on_exhausted_memory_leaves_the_chain_alone() -> TestResult {
    init_logging();
    let size = common::recorder_prototype().private_size();
    let memory = Arc::new(BoundedMemory::new(size));
    let mut dev = recorder(memory.clone());
    let id = dev.id();
    let table = dev.table().clone();
    let proto = switch_prototype(false);

    let err = install(&mut dev, &proto, proto.private_size()).expect_err("no room for the stage");
    assert!(matches!(err, DeviceError::AllocationFailure { .. }));
    assert_eq!(dev.id(), id);
    assert_eq!(dev.chain_len(), 1);
    assert_eq!(dev.table(), &table);
    assert_eq!(memory.in_use(Arena::Collected), 0);
    assert_eq!(memory.in_use(Arena::Stable), size);
    Ok(())
}

#[test]
fn test_suppressed_image_gets_a_null_enumerator() -> TestResult {
    init_logging();
    let mut dev = recorder(Arc::new(HeapMemory::new()));
    let proto = switch_prototype(true);
    install(&mut dev, &proto, proto.private_size())?;
    dev.open()?;

    let pis = ImagerState::default();
    let image = ImageDescriptor::mask(8, 2);
    let mut info = dev.begin_typed_image(&pis, None, &image, None, &DeviceColor::Pure(5), None)?;
    assert!(info.is_null());

    let rows = [0xffu8, 0xff];
    let planes = [ImagePlane { data: &rows, data_x: 0, raster: 1 }];
    assert!(dev.image_data(info.as_mut(), &planes, 2)?);
    dev.end_image(info, true)?;
    assert_eq!(recording(&dev).calls, vec!["open_device"]);
    Ok(())
}

#[test]
fn test_image_rows_are_drawn_by_the_device_that_began_them() -> TestResult {
    init_logging();
    let mut dev = recorder(Arc::new(HeapMemory::new()));
    let proto = switch_prototype(false);
    install(&mut dev, &proto, proto.private_size())?;
    dev.open()?;

    let pis = ImagerState::default();
    let image = ImageDescriptor::mask(8, 2);
    let mut info = dev.begin_typed_image(&pis, None, &image, None, &DeviceColor::Pure(5), None)?;
    assert!(!info.is_null());
    assert_eq!(Some(info.device_id()), dev.child().map(|c| c.id()));

    let rows = [0b1111_0000u8, 0b0000_1111];
    let planes = [ImagePlane { data: &rows, data_x: 0, raster: 1 }];
    assert!(dev.image_data(info.as_mut(), &planes, 2)?);
    dev.end_image(info, false)?;

    assert_eq!(
        recording(&dev).fills,
        vec![(IntRect::new(0, 0, 4, 1), 5), (IntRect::new(4, 1, 8, 2), 5)]
    );
    Ok(())
}

#[test]
fn test_fill_rectangle_waits_for_the_tail_to_open() -> TestResult {
    init_logging();
    let mut dev = recorder(Arc::new(HeapMemory::new()));
    let proto = switch_prototype(false);
    install(&mut dev, &proto, proto.private_size())?;
    assert_eq!(dev.table().get(Op::FillRectangle), ProcSlot::Unset);
    assert!(matches!(dev.fill_rectangle(0, 0, 1, 1, 0), Err(DeviceError::Unsupported(Op::FillRectangle))));

    dev.open()?;
    assert_eq!(dev.table().get(Op::FillRectangle), ProcSlot::Implemented);
    dev.fill_rectangle(0, 0, 1, 1, 0)?;
    assert_eq!(recording(&dev).fills.len(), 1);
    Ok(())
}

#[test]
fn test_params_and_pages_are_mirrored_on_the_head() -> TestResult {
    init_logging();
    let mut dev = recorder(Arc::new(HeapMemory::new()));
    let proto = switch_prototype(false);
    install(&mut dev, &proto, proto.private_size())?;
    dev.open()?;

    let mut list = ParamList::new().with("HWResolution", vec![144.0, 144.0]);
    dev.put_params(&mut list)?;
    assert_eq!(dev.state().hw_resolution, [144.0, 144.0]);
    assert_eq!(dev.state().width, 1224);

    dev.output_page(2, true)?;
    assert_eq!(dev.state().page_count, 2);
    assert_eq!(dev.state().showpage_count, 1);
    assert_eq!(dev.tail().state().page_count, 2);
    Ok(())
}

#[test]
fn test_close_marks_every_node_closed() -> TestResult {
    init_logging();
    let mut dev = recorder(Arc::new(HeapMemory::new()));
    let proto = switch_prototype(true);
    install(&mut dev, &proto, proto.private_size())?;
    dev.open()?;
    dev.close()?;
    assert!(!dev.is_open());
    assert!(!dev.tail().is_open());
    assert_eq!(recording(&dev).calls, vec!["open_device", "close_device"]);
    Ok(())
}

#[test]
fn test_finalize_hook_runs_once_when_the_chain_is_dropped() -> TestResult {
    init_logging();
    let runs = Arc::new(AtomicUsize::new(0));
    let memory = Arc::new(HeapMemory::new());
    let mut dev = recorder(memory.clone());
    let counter = Arc::clone(&runs);
    let proto = switch_prototype(false).with_finalize(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    install(&mut dev, &proto, proto.private_size())?;
    assert!(memory.in_use(Arena::Collected) > 0);

    dev.finalize();
    dev.finalize();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    drop(dev);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(memory.in_use(Arena::Stable), 0);
    assert_eq!(memory.in_use(Arena::Collected), 0);
    Ok(())
}

#[test]
fn test_uninstall_skips_the_finalize_hook() -> TestResult {
    init_logging();
    let runs = Arc::new(AtomicUsize::new(0));
    let mut dev = recorder(Arc::new(HeapMemory::new()));
    let counter = Arc::clone(&runs);
    let proto = switch_prototype(false).with_finalize(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    install(&mut dev, &proto, proto.private_size())?;
    uninstall(&mut dev)?;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(dev.chain_len(), 1);
    assert!(dev.private::<common::Recording>().is_ok());
    Ok(())
}
