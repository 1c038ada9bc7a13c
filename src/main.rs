//! ascope - Main Entry Point
//!
//! Host-side viewer for a microcontroller oscilloscope. The reactor owns the
//! instrument link and runs on its own thread; the egui window runs on the
//! main thread and exchanges snapshots and commands with it over channels.

use ascope_rs::{
    acquisition::AcquisitionState,
    analysis::Resampler,
    config::{AppConfig, LoggingConfig},
    error::{Result, ResultExt, ScopeError, EXIT_OK},
    frontend::{Graticule, ScopeApp},
    link::{Link, SerialLink, SimSettings, SimulatedDevice},
    reactor::Reactor,
    renderer::{ChannelRenderer, LogRenderer, Renderer},
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread::JoinHandle;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Snapshots buffered between the reactor and the window
const SNAPSHOT_CHANNEL_CAPACITY: usize = 4;

#[derive(Debug, Parser)]
#[command(name = "ascope", version, about = "Microcontroller oscilloscope viewer")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "ASCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Serial device of the instrument
    #[arg(short, long)]
    device: Option<String>,

    /// Line speed
    #[arg(short, long)]
    baud: Option<u32>,

    /// Use the built-in simulated instrument
    #[arg(long)]
    simulate: bool,

    /// Log snapshots instead of opening a window
    #[arg(long)]
    headless: bool,

    /// Raw buffer dump file
    #[arg(long)]
    dump_path: Option<PathBuf>,

    /// Log filter directives (overridden by RUST_LOG)
    #[arg(long)]
    log_filter: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(device) = &self.device {
            config.link.device = device.clone();
        }
        if let Some(baud) = self.baud {
            config.link.baud_rate = baud;
        }
        if self.simulate {
            config.link.simulate = true;
        }
        if self.headless {
            config.display.headless = true;
        }
        if let Some(path) = &self.dump_path {
            config.export.dump_path = path.clone();
        }
        if let Some(filter) = &self.log_filter {
            config.logging.filter = filter.clone();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ascope: {}", e);
            return exit_code(e.exit_code());
        }
    };

    let _log_guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ascope: {}", e);
            return exit_code(e.exit_code());
        }
    };

    match run(config) {
        Ok(()) => {
            tracing::info!("Bye");
            exit_code(EXIT_OK)
        }
        Err(e) => {
            tracing::error!("{}", e);
            exit_code(e.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().ok_or_else(|| {
                ScopeError::Config(format!("logging.file {} has no file name", path.display()))
            })?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| ScopeError::Startup(format!("Failed to initialize logging: {}", e)))?;
    Ok(guard)
}

fn open_link(config: &AppConfig) -> Result<Box<dyn Link>> {
    if config.link.simulate {
        let device = SimulatedDevice::start(SimSettings::default())
            .context("Failed to start simulated instrument")?;
        Ok(Box::new(device))
    } else {
        Ok(Box::new(SerialLink::open(&config.link)?))
    }
}

fn run(config: AppConfig) -> Result<()> {
    tracing::info!("Starting ascope");

    let link = open_link(&config)?;
    tracing::info!("Connected to {}", link.describe());

    tracing::debug!("Building sinc kernels");
    let resampler = Resampler::with_default_kernels();
    let state = AcquisitionState::new(config.initial_zoom(), config.voltage_range());
    let (command_tx, command_rx) = crossbeam_channel::unbounded();

    if config.display.headless {
        // Commands never arrive; the sender stays alive so the reactor keeps running
        let _commands = command_tx;
        let renderer: Box<dyn Renderer> = Box::new(LogRenderer::new());
        let mut reactor = Reactor::new(
            link,
            renderer,
            command_rx,
            resampler,
            state,
            config.reactor_settings(),
        );
        return reactor.run();
    }

    let graticule = Graticule {
        divisions_x: config.display.divisions_x,
        divisions_y: config.display.divisions_y,
    };
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([800.0, 600.0])
            .with_min_inner_size([400.0, 300.0])
            .with_title("ascope"),
        ..Default::default()
    };

    // The reactor starts only once the window exists
    let settings = config.reactor_settings();
    let ui_commands = command_tx.clone();
    let mut reactor_handle: Option<JoinHandle<Result<()>>> = None;
    let ui_result = eframe::run_native(
        "ascope",
        native_options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());

            let (snapshot_tx, snapshot_rx) =
                crossbeam_channel::bounded(SNAPSHOT_CHANNEL_CAPACITY);
            let repaint_ctx = cc.egui_ctx.clone();
            let renderer = ChannelRenderer::new(snapshot_tx)
                .with_waker(move || repaint_ctx.request_repaint());

            let handle = std::thread::Builder::new()
                .name("reactor".into())
                .spawn(move || {
                    let mut reactor = Reactor::new(
                        link,
                        Box::new(renderer),
                        command_rx,
                        resampler,
                        state,
                        settings,
                    );
                    reactor.run()
                })
                .map_err(|e| ScopeError::Startup(format!("Failed to spawn reactor: {}", e)))?;
            reactor_handle = Some(handle);

            Ok(Box::new(ScopeApp::new(snapshot_rx, ui_commands, graticule)))
        }),
    );

    let Some(reactor_handle) = reactor_handle else {
        return Err(match ui_result {
            Err(e) => ScopeError::Startup(format!("Display failed: {}", e)),
            Ok(()) => ScopeError::Startup("Window closed before the reactor started".into()),
        });
    };

    // Stops the reactor if the window went away without sending Quit
    let _ = command_tx.send(ascope_rs::Command::Quit);
    drop(command_tx);

    tracing::info!("Shutting down...");
    let reactor_result = reactor_handle
        .join()
        .map_err(|_| ScopeError::Link("Reactor thread panicked".into()))?;

    ui_result.map_err(|e| ScopeError::Startup(format!("Display failed: {}", e)))?;
    reactor_result
}
