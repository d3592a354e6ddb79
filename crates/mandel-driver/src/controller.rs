//! Frame controller
//!
//! One frame is one pass through the accelerator protocol:
//!
//! ```text
//! Idle ─write viewport─▶ ParamsSent ─read status─▶ Polling
//!      ◀──────────────────────────────────────────── (until sentinel)
//! Polling ─write trigger─▶ TransferTriggered ─bulk read─▶ Complete
//! any state ─error─▶ Error
//! ```
//!
//! While polling, the status word counts remaining scanlines; only the
//! sentinel value ends the poll. The poll is bounded by [`PollPolicy`] and
//! checks a [`CancellationToken`] before the viewport writes and before every
//! status read. A cancellation ends only the frame in flight: the token is
//! cleared when that frame returns `Cancelled`. Frames are atomic: a failed
//! frame leaves the caller's buffer unspecified and the next call starts
//! again from `Idle`.
//!
//! [`PollPolicy`]: crate::config::PollPolicy

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mandel_chip::regs::{TRANSFER_GO, WORD_BYTES};

use crate::channel::{BulkTransport, RegisterChannel};
use crate::config::ProtocolConfig;
use crate::error::{FpgaError, Result};
use crate::frame::{Frame, FrameSink};
use crate::viewport::{ViewBounds, Viewport};

/// Monotonic time source and sleeper
pub trait Clock {
    /// Time since an arbitrary fixed origin
    fn now(&self) -> Duration;

    /// Block for `duration`
    fn sleep(&mut self, duration: Duration);
}

/// Wall clock
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only moves when slept on
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualClock {
    now: Duration,
}

impl ManualClock {
    /// Move time forward without sleeping
    pub fn advance(&mut self, duration: Duration) {
        self.now += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.now += duration;
    }
}

/// Shared flag that stops an in-flight frame at its next poll
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a previous request
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where the controller is in the frame protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    /// No frame in flight
    #[default]
    Idle,
    /// Viewport words written
    ParamsSent,
    /// Waiting for the sentinel
    Polling,
    /// Transfer trigger written
    TransferTriggered,
    /// Frame delivered
    Complete,
    /// Last frame failed
    Error,
}

impl std::fmt::Display for FrameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ParamsSent => "params sent",
            Self::Polling => "polling",
            Self::TransferTriggered => "transfer triggered",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Advisory progress read from the status word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Scanlines the accelerator still has to compute
    pub remaining: u32,
    /// Frame height
    pub total: u32,
    /// Status reads so far
    pub polls: u64,
}

/// Timing and traffic of one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameMetrics {
    /// Status reads
    pub polls: u64,
    /// Progress callbacks fired
    pub progress_updates: u64,
    /// Writing the viewport
    pub params: Duration,
    /// Viewport written to sentinel seen
    pub compute: Duration,
    /// Trigger to end of bulk read
    pub transfer: Duration,
    /// Whole frame
    pub total: Duration,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

impl std::fmt::Display for FrameMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} polls, compute {} ms, transfer {} ms, total {} ms",
            self.polls,
            self.compute.as_millis(),
            self.transfer.as_millis(),
            self.total.as_millis()
        )
    }
}

/// Frames per second over a run of frames
#[allow(clippy::cast_precision_loss)]
pub fn frames_per_second(frames: &[FrameMetrics]) -> f64 {
    let total: Duration = frames.iter().map(|m| m.total).sum();
    if total.is_zero() {
        return 0.0;
    }
    frames.len() as f64 / total.as_secs_f64()
}

/// Drives frames through one accelerator port
#[derive(Debug)]
pub struct AcceleratorController<P, C = SystemClock> {
    port: P,
    config: ProtocolConfig,
    clock: C,
    cancel: CancellationToken,
    state: FrameState,
    frames: u64,
}

impl<P> AcceleratorController<P, SystemClock>
where
    P: RegisterChannel + BulkTransport,
{
    /// Controller on the wall clock
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if `config` cannot drive a frame.
    pub fn new(port: P, config: ProtocolConfig) -> Result<Self> {
        Self::with_clock(port, config, SystemClock::default())
    }
}

impl<P, C> AcceleratorController<P, C>
where
    P: RegisterChannel + BulkTransport,
    C: Clock,
{
    /// Controller on an injected clock
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if `config` cannot drive a frame.
    pub fn with_clock(port: P, config: ProtocolConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            port,
            config,
            clock,
            cancel: CancellationToken::new(),
            state: FrameState::Idle,
            frames: 0,
        })
    }

    /// Token that cancels the frame in flight
    ///
    /// A request made between frames cancels the next one before any
    /// register is written.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Protocol state after the last operation
    pub const fn state(&self) -> FrameState {
        self.state
    }

    /// Protocol configuration
    pub const fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Frames completed
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Underlying port
    pub const fn port(&self) -> &P {
        &self.port
    }

    /// Underlying port, mutably
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Clock
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Give the port back
    pub fn into_port(self) -> P {
        self.port
    }

    /// Compute one frame into `frame`
    ///
    /// # Errors
    ///
    /// Returns `BufferSize` or `InvalidViewport` before touching the device;
    /// `Transport`, `ProtocolTimeout`, `Cancelled` or `ShortTransfer` if the
    /// protocol fails.
    pub fn compute_frame(&mut self, viewport: &Viewport, frame: &mut [u8]) -> Result<FrameMetrics> {
        self.compute_frame_with_progress(viewport, frame, |_| {})
    }

    /// Compute one frame, reporting each decrease of the remaining-scanline
    /// counter to `on_progress`
    ///
    /// # Errors
    ///
    /// As [`Self::compute_frame`].
    pub fn compute_frame_with_progress(
        &mut self,
        viewport: &Viewport,
        frame: &mut [u8],
        mut on_progress: impl FnMut(Progress),
    ) -> Result<FrameMetrics> {
        let expected = self.config.frame_len();
        if frame.len() != expected {
            return Err(FpgaError::BufferSize {
                expected,
                got: frame.len(),
            });
        }
        let words = viewport.register_words(&self.config.registers, self.config.wire_format)?;

        self.state = FrameState::Idle;
        match self.run_frame(&words, frame, &mut on_progress) {
            Ok(metrics) => {
                self.state = FrameState::Complete;
                self.frames += 1;
                tracing::info!("Frame {} complete: {metrics}", self.frames);
                Ok(metrics)
            }
            Err(e) => {
                tracing::debug!("Frame failed in state {}: {e}", self.state);
                self.state = FrameState::Error;
                Err(e)
            }
        }
    }

    /// Compute one frame, retrying the whole frame on recoverable errors
    ///
    /// # Errors
    ///
    /// Returns the last error once the retry budget is spent, or the first
    /// unrecoverable one.
    pub fn compute_frame_with_retry(
        &mut self,
        viewport: &Viewport,
        frame: &mut [u8],
    ) -> Result<FrameMetrics> {
        let attempts = self.config.retry.frame_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.compute_frame(viewport, frame) {
                Ok(mut metrics) => {
                    metrics.attempts = attempt;
                    return Ok(metrics);
                }
                Err(e) if e.is_recoverable() && attempt < attempts => {
                    tracing::warn!("Frame attempt {attempt}/{attempts} failed: {e}; retrying");
                    self.clock.sleep(self.config.retry.backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Compute one frame into a fresh buffer, with retries
    ///
    /// # Errors
    ///
    /// As [`Self::compute_frame_with_retry`].
    pub fn render(&mut self, viewport: &Viewport) -> Result<(Frame, FrameMetrics)> {
        let mut data = vec![0u8; self.config.frame_len()];
        let metrics = self.compute_frame_with_retry(viewport, &mut data)?;
        Ok((Frame::new(data, self.config.geometry)?, metrics))
    }

    /// Render `count` frames, moving the view right by `shift` each frame,
    /// handing every frame to `sink`
    ///
    /// # Errors
    ///
    /// Stops at the first frame or sink error.
    pub fn render_sequence(
        &mut self,
        start: ViewBounds,
        count: u32,
        shift: f64,
        sink: &mut impl FrameSink,
    ) -> Result<Vec<FrameMetrics>> {
        let mut metrics = Vec::new();
        let mut bounds = start;
        for i in 0..count {
            let viewport = bounds.viewport(self.config.geometry)?;
            tracing::info!("Frame {}/{count}: {bounds}", i + 1);
            let (frame, m) = self.render(&viewport)?;
            sink.consume(&frame)?;
            metrics.push(m);
            bounds = bounds.shifted(shift);
        }
        Ok(metrics)
    }

    fn run_frame(
        &mut self,
        words: &[(u32, u32); 4],
        frame: &mut [u8],
        on_progress: &mut impl FnMut(Progress),
    ) -> Result<FrameMetrics> {
        let order = self.config.byte_order;
        let regs = self.config.registers;
        let mut metrics = FrameMetrics {
            attempts: 1,
            ..FrameMetrics::default()
        };
        let start = self.clock.now();

        self.check_cancelled(0)?;
        for &(addr, word) in words {
            self.port.write_word(addr, word, order)?;
        }
        self.state = FrameState::ParamsSent;
        let params_done = self.clock.now();
        metrics.params = params_done - start;
        tracing::debug!("Viewport written: {words:x?}");

        self.state = FrameState::Polling;
        let total = self.config.geometry.height;
        let mut last = u32::MAX;
        loop {
            self.check_cancelled(metrics.polls)?;

            let status = self.port.read_word(regs.status, WORD_BYTES, order)?;
            metrics.polls += 1;
            if status == self.config.sentinel {
                break;
            }
            if status < last {
                last = status;
                metrics.progress_updates += 1;
                tracing::debug!("Remaining scanlines: {status:03}/{total}");
                on_progress(Progress {
                    remaining: status,
                    total,
                    polls: metrics.polls,
                });
            }

            let elapsed = self.clock.now() - params_done;
            if self.config.poll.exhausted(metrics.polls, elapsed) {
                return Err(FpgaError::ProtocolTimeout {
                    polls: metrics.polls,
                    elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                });
            }
            if !self.config.poll.interval.is_zero() {
                self.clock.sleep(self.config.poll.interval);
            }
        }
        let computed = self.clock.now();
        metrics.compute = computed - params_done;

        self.port.write_byte(regs.transfer_start, TRANSFER_GO)?;
        self.state = FrameState::TransferTriggered;

        let got = self.port.read_bulk(frame)?;
        if got != frame.len() {
            return Err(FpgaError::ShortTransfer {
                expected: frame.len(),
                got,
            });
        }
        let done = self.clock.now();
        metrics.transfer = done - computed;
        metrics.total = done - start;
        Ok(metrics)
    }

    /// Consume a pending cancellation request
    fn check_cancelled(&self, polls: u64) -> Result<()> {
        if self.cancel.is_cancelled() {
            self.cancel.reset();
            return Err(FpgaError::Cancelled { polls });
        }
        Ok(())
    }
}
