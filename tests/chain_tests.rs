mod common;

use common::{GeneratedPdf, TestResult, init_logging, numbered_pages, pixel, small_chain};
use pagechain::{ChainConfig, DeviceKind, DisplayList, DrawOp, ObjectKinds, PageSpan, PipelineError};
use pagechain_device::DeviceError;
use std::fs;

#[test]
fn test_range_keeps_only_the_selected_raster_pages() -> TestResult {
    init_logging();
    let mut chain = small_chain().with_page_range(1, 2).build()?;
    assert_eq!(chain.replay(&numbered_pages(4))?, 4);
    assert_eq!(chain.pages_seen(), Some(4));

    let pages = chain.finish()?.into_pages();
    assert_eq!(pages.len(), 2);
    // Page 1's square, in gray 0.1.
    assert_eq!(pixel(&pages[0], 1, 1), [25, 25, 25]);
    assert_eq!(pixel(&pages[0], 0, 0), [255, 255, 255]);
    assert_eq!(pixel(&pages[1], 2, 2), [51, 51, 51]);
    Ok(())
}

#[test]
fn test_open_ended_range_runs_to_the_last_page() -> TestResult {
    init_logging();
    let mut chain = small_chain().with_page_range(3, 0).build()?;
    chain.replay(&numbered_pages(6))?;
    assert_eq!(chain.finish()?.into_pages().len(), 3);
    Ok(())
}

#[test]
fn test_without_a_range_every_page_is_kept() -> TestResult {
    init_logging();
    let mut chain = small_chain().build()?;
    chain.replay(&numbered_pages(3))?;
    assert_eq!(chain.pages_seen(), None);
    assert_eq!(chain.finish()?.into_pages().len(), 3);
    Ok(())
}

#[test]
fn test_image_filter_leaves_rectangles_alone() -> TestResult {
    init_logging();
    let list = DisplayList::from_json(
        r#"{ "ops": [
            { "op": "image", "x": 0, "y": 0, "width": 2, "height": 1, "data": [0, 0] },
            { "op": "fill_rect", "x": 5, "y": 5, "width": 1, "height": 1, "color": [0, 0, 1] },
            { "op": "show_page" }
        ] }"#,
    )?;
    let mut chain = small_chain().with_object_filter(ObjectKinds { image: true, ..ObjectKinds::default() }).build()?;
    chain.replay(&list)?;

    let pages = chain.finish()?.into_pages();
    assert_eq!(pixel(&pages[0], 0, 0), [255, 255, 255]);
    assert_eq!(pixel(&pages[0], 5, 5), [0, 0, 255]);
    Ok(())
}

#[test]
fn test_pdf_chain_writes_selected_pages_with_text() -> TestResult {
    init_logging();
    let list = DisplayList::from_json(
        r#"{ "ops": [
            { "op": "text", "x": 1, "y": 5, "text": "skipped", "color": [0] },
            { "op": "show_page" },
            { "op": "text", "x": 1, "y": 5, "text": "kept", "size": 4, "color": [1, 0, 0] },
            { "op": "show_page" }
        ] }"#,
    )?;
    let mut chain = small_chain().with_device(DeviceKind::Pdf).with_page_range(1, 1).build()?;
    chain.replay(&list)?;

    let bytes = chain.finish()?.into_pdf().ok_or("pdf kept in memory")?;
    let pdf = GeneratedPdf::from_bytes(&bytes)?;
    assert_eq!(pdf.page_count(), 1);
    let ops = pdf.operators(1)?;
    assert!(ops.contains(&"Tj".to_string()));
    assert!(ops.contains(&"rg".to_string()));
    Ok(())
}

#[test]
fn test_text_filter_keeps_text_out_of_the_pdf() -> TestResult {
    init_logging();
    let list = DisplayList {
        ops: vec![
            DrawOp::Text {
                x: 1.0,
                y: 1.0,
                text: "hidden".into(),
                font: "Helvetica".into(),
                size: 4.0,
                color: vec![0.0],
            },
            DrawOp::FillRect { x: 0, y: 0, width: 3, height: 3, color: vec![0.0] },
            DrawOp::ShowPage { copies: 1 },
        ],
    };
    let mut chain = small_chain()
        .with_device(DeviceKind::Pdf)
        .with_object_filter(ObjectKinds { text: true, ..ObjectKinds::default() })
        .build()?;
    chain.replay(&list)?;

    let pdf = GeneratedPdf::from_bytes(&chain.finish()?.into_pdf().ok_or("no pdf")?)?;
    let ops = pdf.operators(1)?;
    assert!(!ops.contains(&"BT".to_string()));
    assert!(ops.contains(&"re".to_string()));
    Ok(())
}

#[test]
fn test_config_file_drives_the_chain() -> TestResult {
    init_logging();
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("chain.json");
    let pattern = dir.path().join("page-%d.pnm");
    let config = ChainConfig {
        pages: Some(PageSpan { first: 1, last: 2 }),
        media_size: [10.0, 10.0],
        output: Some(pattern),
        ..ChainConfig::default()
    };
    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

    let mut chain = small_chain().with_config_file(&config_path)?.build()?;
    chain.replay(&numbered_pages(5))?;
    assert!(chain.finish()?.into_pages().is_empty());

    let first = fs::read(dir.path().join("page-1.pnm"))?;
    assert!(first.starts_with(b"P6\n10 10\n255\n"));
    assert!(dir.path().join("page-2.pnm").exists());
    assert!(!dir.path().join("page-3.pnm").exists());
    Ok(())
}

#[test]
fn test_memory_limit_is_enforced_when_the_chain_opens() {
    init_logging();
    let result = small_chain().with_memory_limit(16).build();
    assert!(matches!(result, Err(PipelineError::Device(DeviceError::AllocationFailure { .. }))));
}

#[test]
fn test_bad_colors_report_their_operation() -> TestResult {
    init_logging();
    let list = DisplayList::from_json(
        r#"{ "ops": [
            { "op": "show_page" },
            { "op": "fill_rect", "x": 0, "y": 0, "width": 1, "height": 1, "color": [0, 1] }
        ] }"#,
    )?;
    let mut chain = small_chain().build()?;
    let err = chain.replay(&list).unwrap_err();
    assert!(matches!(err, PipelineError::DisplayList { index: 1, .. }));
    Ok(())
}

#[test]
fn test_params_reach_the_terminal_through_the_stages() -> TestResult {
    init_logging();
    let list = DisplayList::from_json(r#"{ "ops": [ { "op": "params", "values": { "NumCopies": 3 } } ] }"#)?;
    let mut chain = small_chain().with_page_range(0, 0).build()?;
    chain.replay(&list)?;
    assert_eq!(chain.device().tail().state().num_copies, 3);
    Ok(())
}
