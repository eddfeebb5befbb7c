// SPDX-License-Identifier: GPL-2.0
//! Rakk Dasig X HID-BPF Descriptor Fixup Loader
//!
//! Loads a HID-BPF program that rewrites the mouse's report descriptor
//! (Usage Maximum 3 -> 5) so side buttons 4 and 5 reach userspace.
//! The BPF links are pinned to /sys/fs/bpf/rakk-dasig-x so they persist
//! after the loader exits.
//!
//! Usage:
//!   dasig-loader                 # Show status (default)
//!   dasig-loader load            # Load BPF, rebind the mouse and exit
//!   dasig-loader unload          # Unload BPF
//!   dasig-loader check FILE      # Inspect a descriptor dump offline

mod dump;
mod hid;
mod loader;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use dasig_rdesc::{fixup, inspect, Status, USAGE_MAX_OFFSET};
use tracing::{info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Rakk Dasig X Side-Button Fixup Loader
#[derive(Parser)]
#[command(name = "dasig-loader", version = VERSION, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override auto-detected HID ID
    #[arg(short = 'i', long, global = true)]
    hid_id: Option<u32>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether the fixup is loaded and what each mouse reports (default)
    Status,
    /// Load BPF programs
    Load {
        /// Path to BPF object file to load.
        /// If not provided, uses default location /usr/local/lib/rakk-dasig-x/dasig-ebpf.bpf.o
        #[arg(long)]
        bpf_path: Option<PathBuf>,

        /// Don't rebind the devices after loading
        #[arg(long)]
        no_rebind: bool,
    },
    /// Unload BPF programs
    Unload,
    /// Verify BPF programs through kernel verifier (CI mode, no hardware required)
    Verify {
        /// Path to BPF object file to verify.
        /// If not provided, uses default location /usr/local/lib/rakk-dasig-x/dasig-ebpf.bpf.o
        #[arg(long)]
        bpf_path: Option<PathBuf>,
    },
    /// Inspect a report descriptor (dump file or hidraw node)
    Check(CheckArgs),
}

#[derive(Args)]
struct CheckArgs {
    /// Descriptor dump: raw bytes, hex text or hid-recorder output
    #[arg(required_unless_present = "hidraw", conflicts_with = "hidraw")]
    file: Option<PathBuf>,

    /// Read the descriptor from a hidraw node instead (e.g. /dev/hidraw3)
    #[arg(long)]
    hidraw: Option<String>,

    /// Run the fixup on a copy and show the result
    #[arg(long)]
    apply: bool,
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

/// One-line summary of a descriptor status
fn describe(status: Status) -> String {
    match status {
        Status::Unrecognized => "not a known Dasig X descriptor".to_string(),
        Status::NeedsFixup(t) => format!("{t}, unpatched (Usage Maximum 3, side buttons lost)"),
        Status::Patched(t) => format!("{t}, patched (Usage Maximum 5)"),
        Status::Foreign { transport, value } => format!(
            "{transport} length, unexpected Usage Maximum byte 0x{value:02x} (left alone)"
        ),
    }
}

/// Status line for a bound device. A length belonging to another transport
/// than the one its IDs name is called out.
fn describe_device(dev: &hid::HidInfo) -> String {
    let status = inspect(&dev.rdesc, dev.rdesc.len());
    match status.transport() {
        Some(t) if t != dev.transport => {
            format!("{} (device IDs say {})", describe(status), dev.transport)
        }
        _ => describe(status),
    }
}

fn do_status() -> Result<()> {
    let links = loader::pinned_links();

    if links.is_empty() {
        println!("Status: Not loaded");
    } else {
        println!("Status: Loaded ({} link(s))", links.len());
        println!("Pin directory: {}", loader::BPF_PIN_DIR);
        for link in &links {
            match loader::link_hid_id(link) {
                Some(id) => println!("  {} (hid_id={})", link.display(), id),
                None => println!("  {}", link.display()),
            }
        }
    }

    show_devices();
    Ok(())
}

fn show_devices() {
    let devices = match hid::find_devices() {
        Ok(d) => d,
        Err(e) => {
            println!("\nCannot list HID devices: {e}");
            return;
        }
    };

    println!("\n=== Rakk Dasig X devices ===");
    if devices.is_empty() {
        println!("(none connected)");
    }
    for dev in devices {
        println!(
            "{} [{}] {}: {}",
            dev.device_name,
            dev.transport,
            dev.hidraw_path.as_deref().unwrap_or("-"),
            describe_device(&dev)
        );
    }
}

/// Print the status of a descriptor and, with `--apply`, of its fixed copy.
/// Returns the last status printed.
fn do_check(args: &CheckArgs) -> Result<Status> {
    let (label, mut rdesc) = match (&args.file, &args.hidraw) {
        (Some(file), _) => (file.display().to_string(), dump::read_dump(file)?),
        (None, Some(node)) => (node.clone(), hid::read_hidraw_rdesc(node)?),
        (None, None) => bail!("Either a dump file or --hidraw is required"),
    };

    let rsize = rdesc.len();
    let mut status = inspect(&rdesc, rsize);
    println!("{label}: {rsize} bytes, {}", describe(status));

    if args.apply {
        fixup(&hid::DeviceLabel(&label), &mut rdesc, &rsize);
        println!(
            "After fixup: {}",
            dump::format_hex(&rdesc[..rdesc.len().min(USAGE_MAX_OFFSET + 1)])
        );
        status = inspect(&rdesc, rsize);
        println!("Now: {}", describe(status));
    }

    Ok(status)
}

fn do_load(hid_id: Option<u32>, bpf_path: Option<&Path>, rebind: bool) -> Result<()> {
    // Check root for BPF loading
    if !nix::unistd::geteuid().is_root() {
        bail!("Must run as root to load BPF programs");
    }

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    info!(
        "[{}] Rakk Dasig X Side-Button Fixup Loader v{}",
        timestamp, VERSION
    );

    // Unload any previous BPF programs first
    loader::unload_previous()?;

    // (hid_id, device name); the name is empty when the id was given by hand
    let targets: Vec<(u32, String)> = if let Some(id) = hid_id {
        info!("Using provided hid_id={}", id);
        vec![(id, String::new())]
    } else {
        let devices = hid::find_devices()?;
        if devices.is_empty() {
            bail!("Could not find a Rakk Dasig X. Is the mouse or its dongle connected?");
        }
        for dev in &devices {
            info!(
                "Found {} (hid_id={}): {}",
                dev.device_name,
                dev.hid_id,
                describe_device(dev)
            );
        }
        devices
            .into_iter()
            .map(|d| (d.hid_id, d.device_name))
            .collect()
    };

    for (id, _) in &targets {
        loader::load(*id, bpf_path)?;
    }

    // Rebind device to run the descriptor fixup
    if rebind {
        for (_, name) in targets.iter().filter(|(_, name)| !name.is_empty()) {
            hid::rebind_device(name)?;
        }
        report_after_rebind();
    }

    info!("BPF loaded and pinned. Use 'dasig-loader unload' to remove.");

    Ok(())
}

fn report_after_rebind() {
    match hid::find_devices() {
        Ok(devices) => {
            for dev in devices {
                let status = inspect(&dev.rdesc, dev.rdesc.len());
                if matches!(status, Status::Patched(_)) {
                    info!("{}: {}", dev.device_name, describe(status));
                } else {
                    warn!("{}: {}", dev.device_name, describe(status));
                }
            }
        }
        Err(e) => warn!("Could not re-read descriptors: {}", e),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Status is the default when no subcommand is given
    let command = cli.command.unwrap_or(Commands::Status);

    match command {
        Commands::Status => do_status(),
        Commands::Unload => {
            setup_logging(cli.verbose);
            loader::unload()
        }
        Commands::Verify { bpf_path } => {
            setup_logging(cli.verbose);
            loader::verify(bpf_path.as_deref())
        }
        Commands::Check(args) => {
            setup_logging(cli.verbose);
            do_check(&args).map(|_| ())
        }
        Commands::Load {
            bpf_path,
            no_rebind,
        } => {
            setup_logging(cli.verbose);
            do_load(cli.hid_id, bpf_path.as_deref(), !no_rebind)
        }
    }
}


// =============================================================================
// Hardware integration tests (ignored by default)
// =============================================================================
