//! `mandel`: command-line interface for the Mandelbrot FPGA accelerator.
//!
//! ```text
//! USAGE:
//!   mandel enumerate                 List boards
//!   mandel render [view] [-n N]      Render frames, write the last as PGM
//!   mandel zoom [view] --steps N     Zoom toward a pixel, render the result
//!   mandel bench [-n N]              Frames per second while zooming
//!   mandel validate [view]           Compare a frame with the reference core
//!   mandel patterns                  Emit the VHDL test-vector table
//! ```
//!
//! `--backend software` runs everything without a board.

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mandel_chip::{patterns, MandelCore};
use mandel_driver::viewport::FRAME_SHIFT;
use mandel_driver::{
    frames_per_second, reference_frame, select_backend, AcceleratorController, AcceleratorPort,
    BackendSelection, BackendType, BoardConfig, BoardManager, FrameSink, ParityReport, PgmWriter,
    ProtocolConfig, ViewBounds, Zoom,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mandel", about = "Fixed-point Mandelbrot FPGA accelerator CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List boards with card id and serial number.
    Enumerate,
    /// Render frames, moving right by 0.3 per frame; writes the last one.
    Render {
        #[command(flatten)]
        view: ViewArgs,
        #[command(flatten)]
        backend: BackendArgs,
        /// Number of frames.
        #[arg(short = 'n', long, default_value_t = 1)]
        frames: u32,
        /// Output image.
        #[arg(short, long, default_value = "mandel.pgm")]
        out: PathBuf,
    },
    /// Zoom toward (or away from) a pixel, then render the resulting view.
    Zoom {
        #[command(flatten)]
        view: ViewArgs,
        #[command(flatten)]
        backend: BackendArgs,
        /// Pixel column to zoom around.
        #[arg(long, default_value_t = 160)]
        x: u32,
        /// Pixel row to zoom around.
        #[arg(long, default_value_t = 120)]
        y: u32,
        /// Zoom steps of 1% each.
        #[arg(long, default_value_t = 100)]
        steps: u32,
        /// Zoom out instead of in.
        #[arg(long)]
        out_zoom: bool,
        /// Output image.
        #[arg(short, long, default_value = "mandel.pgm")]
        out: PathBuf,
    },
    /// Render while zooming and report frames per second.
    Bench {
        #[command(flatten)]
        backend: BackendArgs,
        /// Number of frames.
        #[arg(short = 'n', long, default_value_t = 100)]
        frames: u32,
    },
    /// Compare a board frame with the host reference render.
    Validate {
        #[command(flatten)]
        view: ViewArgs,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Print the VHDL pattern_array generated from the reference core.
    Patterns {
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Viewport corners.
#[derive(Args, Clone, Copy)]
struct ViewArgs {
    /// Left edge.
    #[arg(long, default_value_t = -2.2, allow_hyphen_values = true)]
    xld: f64,
    /// Lower edge.
    #[arg(long, default_value_t = -1.1, allow_hyphen_values = true)]
    yld: f64,
    /// Right edge.
    #[arg(long, default_value_t = 1.1, allow_hyphen_values = true)]
    xru: f64,
    /// Upper edge.
    #[arg(long, default_value_t = 1.1, allow_hyphen_values = true)]
    yru: f64,
}

impl ViewArgs {
    const fn bounds(self) -> ViewBounds {
        ViewBounds::new(self.xld, self.yld, self.xru, self.yru)
    }
}

#[derive(Args, Clone, Copy)]
struct BackendArgs {
    /// Accelerator to drive.
    #[arg(long, value_enum, default_value_t = BackendArg::Auto)]
    backend: BackendArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    /// Board if available, else software.
    Auto,
    /// Board only.
    Device,
    /// Software accelerator.
    Software,
}

impl From<BackendArg> for BackendSelection {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => Self::Auto,
            BackendArg::Device => Self::DeviceFile,
            BackendArg::Software => Self::Software,
        }
    }
}

type Controller = AcceleratorController<Box<dyn AcceleratorPort>>;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Enumerate => cmd_enumerate()?,
        Cmd::Render {
            view,
            backend,
            frames,
            out,
        } => cmd_render(view.bounds(), backend, frames, out)?,
        Cmd::Zoom {
            view,
            backend,
            x,
            y,
            steps,
            out_zoom,
            out,
        } => {
            let direction = if out_zoom { Zoom::Out } else { Zoom::In };
            cmd_zoom(view.bounds(), backend, (x, y), steps, direction, out)?;
        }
        Cmd::Bench { backend, frames } => cmd_bench(backend, frames)?,
        Cmd::Validate { view, backend } => cmd_validate(view.bounds(), backend)?,
        Cmd::Patterns { out } => cmd_patterns(out)?,
    }

    Ok(())
}

fn controller(backend: BackendArgs) -> Result<Controller> {
    let config = ProtocolConfig::default();
    tracing::debug!("Protocol: {config:?}");
    let port = select_backend(backend.backend.into(), &BoardConfig::from_env(), &config)?;
    println!("[-] Using {}", port.describe());
    Ok(AcceleratorController::new(port, config)?)
}

fn cmd_enumerate() -> Result<()> {
    let mgr = BoardManager::discover()?;

    println!("{} available cards in the system", mgr.device_count());
    println!();

    for info in mgr.devices() {
        println!(
            "{} : CardID = {:#010x}, SerialNum = {:#010x}  ({})",
            info.index,
            info.card_id,
            info.serial,
            info.path.display()
        );
    }

    Ok(())
}

fn cmd_render(bounds: ViewBounds, backend: BackendArgs, frames: u32, out: PathBuf) -> Result<()> {
    let mut ctl = controller(backend)?;
    let mut sink = PgmWriter::new(&out);

    if frames > 1 {
        let metrics = ctl.render_sequence(bounds, frames, FRAME_SHIFT, &mut sink)?;
        for (i, m) in metrics.iter().enumerate() {
            println!("[-] Frame {}: {m}", i + 1);
        }
        println!("[-] Wrote {}", out.display());
        return Ok(());
    }

    let geometry = ctl.config().geometry;
    let viewport = bounds.viewport(geometry)?;
    let mut data = vec![0u8; geometry.len()];

    let metrics = ctl.compute_frame_with_progress(&viewport, &mut data, |p| {
        print!("\r[-] Remaining scanlines: {:03}/{}", p.remaining, p.total);
        let _ = std::io::stdout().flush();
    })?;
    println!("\r[-] Remaining scanlines: {:03}/{}", 0, geometry.height);
    println!("[-] Frame computed (took {} ms)", metrics.compute.as_millis());
    println!("[-] Frame sent (took {} ms)", metrics.transfer.as_millis());

    sink.consume(&mandel_driver::Frame::new(data, geometry)?)?;
    println!("[-] Wrote {}", out.display());
    Ok(())
}

fn cmd_zoom(
    mut bounds: ViewBounds,
    backend: BackendArgs,
    (x, y): (u32, u32),
    steps: u32,
    direction: Zoom,
    out: PathBuf,
) -> Result<()> {
    let mut ctl = controller(backend)?;
    let geometry = ctl.config().geometry;

    let mut applied = 0;
    for _ in 0..steps {
        if !bounds.zoom(x, y, geometry, direction) {
            println!("[-] Zoom limit reached after {applied} steps");
            break;
        }
        applied += 1;
    }
    println!("[-] View {bounds}");

    let viewport = bounds.viewport(geometry)?;
    let (frame, metrics) = ctl.render(&viewport)?;
    println!("[-] {metrics}");
    mandel_driver::write_pgm(&out, &frame)?;
    println!("[-] Wrote {}", out.display());
    Ok(())
}

fn cmd_bench(backend: BackendArgs, frames: u32) -> Result<()> {
    let mut ctl = controller(backend)?;
    let geometry = ctl.config().geometry;
    let mut bounds = ViewBounds::new(-2.2, -1.1, 1.0, 1.1);
    let mut metrics = Vec::new();

    for _ in 0..frames {
        let viewport = bounds.viewport(geometry)?;
        let (_, m) = ctl.render(&viewport)?;
        metrics.push(m);
        // Toward the seahorse valley; reverse once the floor is hit
        if !bounds.zoom(100, 118, geometry, Zoom::In) {
            bounds.zoom(100, 118, geometry, Zoom::Out);
        }
    }

    let polls: u64 = metrics.iter().map(|m| m.polls).sum();
    println!("Frames     : {}", metrics.len());
    println!("Polls/frame: {}", polls / u64::from(frames.max(1)));
    println!("Frames/sec : {:5.2}", frames_per_second(&metrics));
    Ok(())
}

fn cmd_validate(bounds: ViewBounds, backend: BackendArgs) -> Result<()> {
    let mut ctl = controller(backend)?;
    require_hardware(&**ctl.port())?;
    let config = ctl.config().clone();
    let viewport = bounds.viewport(config.geometry)?;

    let (frame, metrics) = ctl.render(&viewport)?;
    let reference = reference_frame(&viewport, &config, &MandelCore::default())?;
    let report = ParityReport::compare(&frame, &reference);

    println!("[-] {metrics}");
    println!("[-] {report}");
    if !report.is_exact() {
        bail!("frame differs from the reference core");
    }
    Ok(())
}

/// The software accelerator renders with the reference core itself
fn require_hardware(port: &dyn AcceleratorPort) -> Result<()> {
    if port.backend_type() == BackendType::Software {
        bail!(
            "validate needs a board; {} renders with the reference core",
            port.describe()
        );
    }
    Ok(())
}

fn cmd_patterns(out: Option<PathBuf>) -> Result<()> {
    let table = patterns::to_vhdl(&patterns::sweep(&MandelCore::default()));
    match out {
        Some(path) => std::fs::write(&path, table)
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{table}"),
    }
    Ok(())
}
