//! Board tests
//!
//! Need a configured board under `MANDEL_FPGA_DEV_DIR` and the bitstream at
//! `MANDEL_FPGA_BITSTREAM`.

use mandel_chip::MandelCore;
use mandel_driver::{
    open_board, reference_frame, AcceleratorController, BoardConfig, BoardManager, ParityReport,
    ProtocolConfig, ViewBounds,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
#[ignore] // Requires hardware
fn test_discover_boards() {
    init_tracing();
    let manager = BoardManager::discover().expect("No boards found");
    for info in manager.devices() {
        println!(
            "{} : CardID = {:#010x}, SerialNum = {:#010x}",
            info.index, info.card_id, info.serial
        );
    }
    assert!(manager.device_count() > 0);
}

#[test]
#[ignore] // Requires hardware
fn test_frame_matches_reference() {
    init_tracing();
    let config = ProtocolConfig::default();
    let board = open_board(&BoardConfig::from_env(), &config).expect("Board open/configure");
    let viewport = ViewBounds::default().viewport(config.geometry).unwrap();

    let mut ctl = AcceleratorController::new(board, config.clone()).unwrap();
    let (frame, metrics) = ctl.render(&viewport).expect("Frame");
    println!("Frame: {metrics}");

    let reference = reference_frame(&viewport, &config, &MandelCore::default()).unwrap();
    let report = ParityReport::compare(&frame, &reference);
    println!("Parity: {report}");
    assert!(report.is_exact());
}

#[test]
#[ignore] // Requires hardware
fn test_repeated_frames_complete() {
    init_tracing();
    let config = ProtocolConfig::default();
    let board = open_board(&BoardConfig::from_env(), &config).expect("Board open/configure");
    let mut ctl = AcceleratorController::new(board, config).unwrap();

    let mut bounds = ViewBounds::default();
    for _ in 0..10 {
        let viewport = bounds.viewport(ctl.config().geometry).unwrap();
        ctl.render(&viewport).expect("Frame");
        bounds.zoom(160, 120, ctl.config().geometry, mandel_driver::Zoom::In);
    }
    assert_eq!(ctl.frames(), 10);
    ctl.into_port().close();
}
