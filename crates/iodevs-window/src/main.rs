//! iodevs host binary.
//!
//! Registers the device files, attaches an in-memory window and runs a
//! scripted guest against them, logging every device event.
//!
//! Usage:
//!   cargo run -p iodevs-window --bin iodevs-host
//!   cargo run -p iodevs-window --bin iodevs-host -- --width 320 --height 200 --frames 5
//!   RUST_LOG=debug cargo run -p iodevs-window --bin iodevs-host -- --config devices.toml

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use iodevs_kernel::{DeviceConfig, DeviceRole, IoDevices, OpenMode, VirtualFileStore, WindowSize};
use iodevs_window::{HostWindow, InputEvent, MouseButton, decode_batch};

/// Run a scripted framebuffer guest against virtual devices.
#[derive(Parser, Debug)]
#[command(name = "iodevs-host")]
#[command(about = "Virtual framebuffer, window size and input devices with a scripted guest")]
struct Args {
    /// TOML device configuration (defaults to /dev/wasmerfb0 and friends)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Window width the guest requests
    #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Window height the guest requests
    #[arg(long, default_value_t = 48, value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// Number of frames the guest draws
    #[arg(long, default_value_t = 3)]
    frames: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DeviceConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DeviceConfig::default(),
    };

    let store = Arc::new(VirtualFileStore::new());
    let devices = IoDevices::new(Arc::clone(&store), &config)?;

    let mut events = devices.subscribe("device.>");
    let logger = tokio::spawn(async move {
        let mut seen = 0usize;
        while let Some(msg) = events.recv().await {
            seen += 1;
            tracing::info!(subject = %msg.subject, event = ?msg.payload, "device event");
        }
        seen
    });

    let window = HostWindow::attach(&devices);
    run_guest(&store, &devices, &window, &args)?;

    tracing::info!(
        open = window.is_open(),
        last_size = ?window.last_size(),
        "guest finished"
    );

    // Last owners of the event bus; the logger drains and stops once they go
    drop(window);
    drop(devices);
    let seen = logger.await?;
    tracing::info!(events = seen, files = store.paths().len(), "shutdown");
    Ok(())
}

/// Drive the devices the way a WASI framebuffer program would: open the
/// paths by name, size the window, draw, consume input and close.
fn run_guest(
    store: &VirtualFileStore,
    devices: &IoDevices,
    window: &HostWindow,
    args: &Args,
) -> Result<()> {
    let size = WindowSize::new(args.width, args.height);
    let size_fd = store.open(devices.path(DeviceRole::WindowSize), OpenMode::Write)?;
    let fb_fd = store.open(devices.path(DeviceRole::FrameBuffer), OpenMode::Write)?;
    let display_fd = store.open(devices.path(DeviceRole::BufferIndexDisplay), OpenMode::Write)?;
    let input_fd = store.open(devices.path(DeviceRole::Input), OpenMode::Read)?;

    store.write(size_fd, size.to_string().as_bytes())?;

    for frame in 0..args.frames {
        store.write(fb_fd, &gradient(size, frame))?;
        // Double buffering: alternate the displayed index
        store.write(display_fd, (frame % 2).to_string().as_bytes())?;
        tracing::debug!(frame, drawn = window.frames_drawn(), "frame presented");
    }

    window.send_input(&[
        InputEvent::KeyDown { code: 32 },
        InputEvent::MouseMove { x: 10, y: 10 },
        InputEvent::Click { x: 10, y: 10, button: MouseButton::Left },
        InputEvent::KeyUp { code: 32 },
    ])?;
    let pending = decode_batch(&store.read(input_fd)?)?;
    for event in &pending {
        tracing::info!(kind = event.kind(), ?event, "guest input");
    }
    let leftover = store.read(input_fd)?;
    anyhow::ensure!(leftover.is_empty(), "input not cleared after read");

    store.write(size_fd, b"0x0")?;
    for fd in [size_fd, fb_fd, display_fd, input_fd] {
        store.close(fd)?;
    }
    Ok(())
}

/// A frame of horizontal and vertical ramps, shifted per frame.
fn gradient(size: WindowSize, frame: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(size.rgba_len().unwrap_or_default());
    for y in 0..size.height {
        for x in 0..size.width {
            pixels.extend_from_slice(&[
                (x.wrapping_add(frame.wrapping_mul(8)) % 256) as u8,
                (y % 256) as u8,
                (frame.wrapping_mul(40) % 256) as u8,
                0xff,
            ]);
        }
    }
    pixels
}
