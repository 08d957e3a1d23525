//! Rasterterm Headless Runner
//!
//! Replays captured host output through the terminal against a software
//! framebuffer and prints what the screen would show.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use rasterterm::app::{FileStore, HostConfig, MemoryStore, SettingsStore};
use rasterterm::core::{Framebuffer, Resolution, Snapshot};
use rasterterm::parser::Parser;
use rasterterm::serial::IoStream;
use rasterterm::Terminal;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut input_file: Option<PathBuf> = None;
    let mut config_file: Option<PathBuf> = None;
    let mut settings_file: Option<PathBuf> = None;
    let mut width: Option<u16> = None;
    let mut height: Option<u16> = None;
    let mut output_format = OutputFormat::Text;
    let mut show_help = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-i" | "--input" => {
                i += 1;
                if i < args.len() {
                    input_file = Some(PathBuf::from(&args[i]));
                }
            }
            "-c" | "--config" => {
                i += 1;
                if i < args.len() {
                    config_file = Some(PathBuf::from(&args[i]));
                }
            }
            "-s" | "--settings" => {
                i += 1;
                if i < args.len() {
                    settings_file = Some(PathBuf::from(&args[i]));
                }
            }
            "-W" | "--width" => {
                i += 1;
                if i < args.len() {
                    width = args[i].parse().ok();
                }
            }
            "-H" | "--height" => {
                i += 1;
                if i < args.len() {
                    height = args[i].parse().ok();
                }
            }
            "-j" | "--json" => {
                output_format = OutputFormat::Json;
            }
            "-a" | "--actions" => {
                output_format = OutputFormat::Actions;
            }
            "-h" | "--help" => {
                show_help = true;
            }
            _ => {
                // Treat as input file if no flag
                if input_file.is_none() && !args[i].starts_with('-') {
                    input_file = Some(PathBuf::from(&args[i]));
                }
            }
        }
        i += 1;
    }

    if show_help {
        print_help();
        return ExitCode::SUCCESS;
    }

    let mut config = match &config_file {
        Some(path) => match HostConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error reading config '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => HostConfig::load_or_default(),
    };
    if settings_file.is_some() {
        config.settings_path = settings_file;
    }
    if width.is_some() || height.is_some() {
        let (w, h) = config.display.resolution.size();
        let size = (width.unwrap_or(w), height.unwrap_or(h));
        match Resolution::from_size(size.0, size.1) {
            Some(resolution) => config.display.resolution = resolution,
            None => {
                eprintln!("Unsupported resolution {}x{}", size.0, size.1);
                return ExitCode::FAILURE;
            }
        }
    }

    let input: Box<dyn Read> = match &input_file {
        Some(path) => match File::open(path) {
            Ok(file) => Box::new(file),
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(io::stdin()),
    };

    let result = match output_format {
        OutputFormat::Actions => print_actions(input),
        OutputFormat::Text | OutputFormat::Json => run_terminal(input, &config, output_format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
    Actions,
}

/// Parse the input and print one JSON action per line
fn print_actions(mut input: Box<dyn Read>) -> rasterterm::Result<()> {
    let mut data = Vec::new();
    input.read_to_end(&mut data)?;

    let mut parser = Parser::new();
    for action in parser.feed(&data) {
        println!("{}", serde_json::to_string(&action)?);
    }
    if parser.is_awaiting_terminator() {
        eprintln!("Input ends inside an escape sequence: {:?}", parser.state());
    }
    Ok(())
}

/// Boot a terminal on the input and print the final screen
fn run_terminal(
    input: Box<dyn Read>,
    config: &HostConfig,
    format: OutputFormat,
) -> rasterterm::Result<()> {
    let store: Box<dyn SettingsStore> = match &config.settings_path {
        Some(path) => Box::new(FileStore::open(path)?),
        None => Box::new(MemoryStore::new()),
    };
    let display = &config.display;
    let framebuffer =
        Framebuffer::with_font(display.resolution, (display.font_width, display.font_height));

    let mut terminal = Terminal::new(IoStream::new(input, io::sink()), framebuffer)
        .with_store(store)
        .with_resolution(display.resolution)
        .with_settle_delay(display.settle_delay())
        .with_event_capacity(config.event_queue_capacity);

    terminal.boot()?;
    terminal.run_until_closed()?;
    info!(stats = ?terminal.display().stats(), "Replay finished");

    let snapshot = Snapshot::from_framebuffer(terminal.display());
    match format {
        OutputFormat::Json => println!("{}", snapshot.to_json()?),
        _ => {
            let g = snapshot.geometry;
            let (col, row) = snapshot.cursor_cell();
            println!("Terminal State ({}x{}):", g.columns(), g.rows());
            println!("Cursor: ({}, {})", row, col);
            println!("---");
            print!("{}", snapshot.to_text());
            println!("---");
        }
    }
    Ok(())
}

fn print_help() {
    println!("Rasterterm Headless Runner");
    println!();
    println!("Usage: rasterterm-headless [OPTIONS] [INPUT_FILE]");
    println!();
    println!("Options:");
    println!("  -i, --input <PATH>     Read host output from file");
    println!("  -c, --config <PATH>    Host configuration file (JSON)");
    println!("  -s, --settings <PATH>  File backing the settings store");
    println!("  -W, --width <N>        Display width in pixels");
    println!("  -H, --height <N>       Display height in pixels");
    println!("  -j, --json             Output snapshot as JSON");
    println!("  -a, --actions          Output parsed actions as JSON lines");
    println!("  -h, --help             Show this help message");
    println!();
    println!("If no input file is specified, reads from stdin.");
    println!("Supported sizes: 800x480, 480x272, 320x240.");
    println!();
    println!("Examples:");
    println!("  printf 'Hello\\x1b[2;5HWorld' | rasterterm-headless");
    println!("  rasterterm-headless --width 320 --height 240 capture.bin");
    println!("  rasterterm-headless --actions < capture.bin");
}
