//! Frame protocol against the software accelerator
//!
//! Runs the controller over the in-memory port and checks frames against the
//! host reference render.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mandel_chip::{ByteOrder, FrameGeometry, MandelCore, QFormat};
use mandel_driver::{
    reference_frame, select_backend, AcceleratorController, BackendSelection, BackendType,
    BoardConfig, FpgaError, FrameState, ManualClock, ParityReport, PgmWriter, PollPolicy,
    ProtocolConfig, RetryPolicy, SoftwareAccelerator, ViewBounds,
};

fn small_config() -> ProtocolConfig {
    ProtocolConfig::default().with_geometry(FrameGeometry::new(32, 24))
}

fn controller(
    acc: SoftwareAccelerator,
    config: ProtocolConfig,
) -> AcceleratorController<SoftwareAccelerator, ManualClock> {
    AcceleratorController::with_clock(acc, config, ManualClock::default())
        .expect("valid protocol config")
}

#[test]
fn reference_viewport_end_to_end() {
    let config = ProtocolConfig::default();
    let viewport = ViewBounds::new(-2.2, -1.1, 1.1, 1.1)
        .viewport(config.geometry)
        .unwrap();

    // Steps are 3.3/320 and 2.2/240, truncated into Q5.27
    let words = viewport.encode(QFormat::PROTOCOL).unwrap();
    assert_eq!(words[2], ((3.3 / 320.0) * f64::from(1u32 << 27)) as i32);
    assert_eq!(words[3], ((2.2 / 240.0) * f64::from(1u32 << 27)) as i32);

    let mut ctl = controller(SoftwareAccelerator::new(config.clone()), config.clone());
    let mut frame = vec![0u8; 320 * 240];
    let metrics = ctl.compute_frame(&viewport, &mut frame).unwrap();

    // One scanline retired per poll, sentinel on the last
    assert_eq!(metrics.polls, 240);
    assert_eq!(metrics.progress_updates, 239);
    assert_eq!(ctl.state(), FrameState::Complete);
    let stats = ctl.port().stats();
    assert_eq!(stats.status_polls, 240);
    assert_eq!(stats.triggers, 1);
    assert_eq!(stats.bulk_reads, 1);

    let reference = reference_frame(&viewport, &config, &MandelCore::default()).unwrap();
    assert_eq!(&frame[..], &reference.data()[..]);
    assert_eq!(frame[0], 1);
}

#[test]
fn software_frame_has_reference_parity() {
    let config = small_config();
    let viewport = ViewBounds::default().viewport(config.geometry).unwrap();
    let mut ctl = controller(SoftwareAccelerator::new(config.clone()), config.clone());

    let (frame, metrics) = ctl.render(&viewport).unwrap();
    let reference = reference_frame(&viewport, &config, &MandelCore::default()).unwrap();
    let report = ParityReport::compare(&frame, &reference);

    assert!(report.is_exact(), "{report}");
    assert_eq!(metrics.attempts, 1);
    assert_eq!(frame.pixel(19, 12), Some(240));
}

#[test]
fn big_endian_build_has_reference_parity() {
    let config = small_config().with_byte_order(ByteOrder::BigEndian);
    let viewport = ViewBounds::default().viewport(config.geometry).unwrap();
    let mut ctl = controller(SoftwareAccelerator::new(config.clone()), config.clone());

    let (frame, metrics) = ctl.render(&viewport).unwrap();
    let reference = reference_frame(&viewport, &config, &MandelCore::default()).unwrap();

    assert!(ParityReport::compare(&frame, &reference).is_exact());
    assert_eq!(metrics.polls, 24);
    assert_eq!(metrics.progress_updates, 23);
}

#[test]
fn progress_counts_down_scanlines() {
    let config = small_config();
    let viewport = ViewBounds::default().viewport(config.geometry).unwrap();
    let acc = SoftwareAccelerator::new(config.clone()).with_scanlines_per_poll(5);
    let mut ctl = controller(acc, config);
    let mut seen = Vec::new();

    let metrics = ctl
        .compute_frame_with_progress(&viewport, &mut [0u8; 32 * 24], |p| {
            assert_eq!(p.total, 24);
            seen.push(p.remaining);
        })
        .unwrap();

    assert_eq!(seen, [19, 14, 9, 4]);
    assert_eq!(metrics.polls, 5);
}

#[test]
fn stalled_accelerator_times_out() {
    let config = small_config().with_poll(PollPolicy::polls(100));
    let viewport = ViewBounds::default().viewport(config.geometry).unwrap();
    let mut ctl = controller(SoftwareAccelerator::new(config.clone()).stalled(), config);

    let err = ctl
        .compute_frame(&viewport, &mut [0u8; 32 * 24])
        .unwrap_err();

    assert!(matches!(err, FpgaError::ProtocolTimeout { polls: 100, .. }));
    assert_eq!(ctl.state(), FrameState::Error);
    assert_eq!(ctl.port().stats().triggers, 0);
}

#[test]
fn transient_bulk_failure_is_retried() {
    let config = small_config().with_retry(RetryPolicy {
        frame_attempts: 3,
        backoff: Duration::from_millis(1),
    });
    let viewport = ViewBounds::default().viewport(config.geometry).unwrap();
    let acc = SoftwareAccelerator::new(config.clone()).with_bulk_failures(1);
    let mut ctl = controller(acc, config);

    let (_, metrics) = ctl.render(&viewport).unwrap();

    assert_eq!(metrics.attempts, 2);
    assert_eq!(ctl.port().stats().frames, 2);
    assert_eq!(ctl.port().stats().bulk_reads, 1);
}

#[test]
fn short_transfer_exhausts_retries() {
    let config = small_config();
    let viewport = ViewBounds::default().viewport(config.geometry).unwrap();
    let acc = SoftwareAccelerator::new(config.clone()).with_bulk_limit(100);
    let mut ctl = controller(acc, config);

    let err = ctl.render(&viewport).unwrap_err();

    assert!(matches!(
        err,
        FpgaError::ShortTransfer {
            expected: 768,
            got: 100
        }
    ));
    assert_eq!(ctl.port().stats().bulk_reads, 3);
}

#[test]
fn sequence_writes_last_frame_as_pgm() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mandel.pgm");
    let config = small_config();
    let mut ctl = controller(SoftwareAccelerator::new(config.clone()), config);
    let mut sink = PgmWriter::new(&path);

    let metrics = ctl
        .render_sequence(ViewBounds::default(), 3, 0.3, &mut sink)
        .unwrap();

    assert_eq!(metrics.len(), 3);
    assert_eq!(ctl.frames(), 3);
    assert_eq!(sink.written(), 3);

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"P5\n32 24\n255\n"));
    assert_eq!(bytes.len(), 13 + 32 * 24);
    assert_eq!(&bytes[13..], ctl.port().frame());
}

#[test]
fn controller_is_shared_through_mutex() {
    let config = small_config();
    let viewport = ViewBounds::default().viewport(config.geometry).unwrap();
    let ctl = Arc::new(Mutex::new(controller(
        SoftwareAccelerator::new(config.clone()),
        config,
    )));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let ctl = Arc::clone(&ctl);
            std::thread::spawn(move || {
                let mut ctl = ctl.lock().unwrap();
                ctl.render(&viewport).map(|(frame, _)| frame)
            })
        })
        .collect();
    let frames: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    assert_eq!(frames[0], frames[1]);
    assert_eq!(ctl.lock().unwrap().frames(), 2);
}

#[test]
fn boxed_software_port_drives_controller() {
    let config = small_config();
    let board = BoardConfig::default().with_dev_dir("/nonexistent");
    let port = select_backend(BackendSelection::Software, &board, &config).unwrap();
    assert_eq!(port.backend_type(), BackendType::Software);

    let viewport = ViewBounds::default().viewport(config.geometry).unwrap();
    let mut ctl = AcceleratorController::with_clock(port, config, ManualClock::default()).unwrap();
    let (frame, _) = ctl.render(&viewport).unwrap();
    assert_eq!(frame.data().len(), 32 * 24);
}
