// SPDX-License-Identifier: GPL-2.0
//! BPF loader using Aya with struct_ops support

use anyhow::{bail, Context, Result};
use aya::maps::StructOpsMap;
use aya::{Btf, Ebpf};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory where we pin BPF links
pub const BPF_PIN_DIR: &str = "/sys/fs/bpf/rakk-dasig-x";

/// Installed BPF library path
pub const BPF_LIB_DIR: &str = "/usr/local/lib/rakk-dasig-x";

/// BPF object filename
const BPF_FILENAME: &str = "dasig-ebpf.bpf.o";

/// struct_ops map name in the BPF object
const STRUCT_OPS_NAME: &str = "dasig_x_fixup";

/// Pinned links are named after the HID device they are attached to
const LINK_PREFIX: &str = "link_";

/// Get the pin path for the BPF link of one device
pub fn pin_path(hid_id: u32) -> PathBuf {
    pin_path_in(Path::new(BPF_PIN_DIR), hid_id)
}

fn pin_path_in(pin_dir: &Path, hid_id: u32) -> PathBuf {
    pin_dir.join(format!("{LINK_PREFIX}{hid_id}"))
}

/// HID id a pinned link belongs to, from its file name
pub fn link_hid_id(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix(LINK_PREFIX)?
        .parse()
        .ok()
}

/// All pinned links, sorted
pub fn pinned_links() -> Vec<PathBuf> {
    pinned_links_in(Path::new(BPF_PIN_DIR))
}

fn pinned_links_in(pin_dir: &Path) -> Vec<PathBuf> {
    let mut links: Vec<PathBuf> = match std::fs::read_dir(pin_dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(_) => Vec::new(),
    };
    links.sort();
    links
}

/// Unload any previously pinned BPF programs
pub fn unload_previous() -> Result<()> {
    let pin_dir = Path::new(BPF_PIN_DIR);

    if !pin_dir.exists() {
        return Ok(());
    }

    info!("Checking for previously loaded BPF programs...");

    for path in pinned_links_in(pin_dir) {
        info!("Removing pinned link: {:?}", path);
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("Failed to remove {:?}: {}", path, e);
        }
    }

    // Try to remove the directory if empty
    let _ = std::fs::remove_dir(pin_dir);

    Ok(())
}

/// Unload command - remove all pinned BPF programs
pub fn unload() -> Result<()> {
    let removed = unload_from(Path::new(BPF_PIN_DIR))?;

    if removed == 0 {
        info!("No BPF programs were loaded");
    } else {
        info!("{} BPF link(s) unloaded successfully", removed);
        info!("Replug or rebind the mouse to restore the original descriptor");
    }

    Ok(())
}

fn unload_from(pin_dir: &Path) -> Result<usize> {
    if !pin_dir.exists() {
        info!("No BPF programs loaded (pin directory doesn't exist)");
        return Ok(0);
    }

    let links = pinned_links_in(pin_dir);
    for path in &links {
        info!("Unloading: {:?}", path);
        std::fs::remove_file(path).with_context(|| format!("Failed to remove {path:?}"))?;
    }

    // Remove the directory
    let _ = std::fs::remove_dir(pin_dir);

    Ok(links.len())
}

/// Get the BPF object path
///
/// Searches in order:
/// 1. Installed path (/usr/local/lib/rakk-dasig-x/)
/// 2. Development path (relative to source)
fn get_bpf_path() -> Result<PathBuf> {
    // Try installed path first
    let installed_path = Path::new(BPF_LIB_DIR).join(BPF_FILENAME);
    if installed_path.exists() {
        return Ok(installed_path);
    }

    // Fall back to development path
    let dev_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(BPF_FILENAME);
    if dev_path.exists() {
        return Ok(dev_path);
    }

    bail!(
        "BPF object not found.\nSearched:\n  - {installed_path:?}\n  - {dev_path:?}\nBuild dasig-ebpf and copy the object to one of these paths."
    );
}

fn open_bpf(bpf_path: Option<&Path>) -> Result<(PathBuf, Ebpf)> {
    let bpf_path = match bpf_path {
        Some(p) => p.to_path_buf(),
        None => get_bpf_path()?,
    };

    let bpf = Ebpf::load_file(&bpf_path)
        .with_context(|| format!("Failed to load BPF object: {bpf_path:?}"))?;

    Ok((bpf_path, bpf))
}

/// Verify BPF programs through the kernel verifier (CI mode)
///
/// Loads and verifies the struct_ops programs without registering them, so
/// verifier errors show up without the mouse attached.
pub fn verify(bpf_path: Option<&Path>) -> Result<()> {
    let (bpf_path, mut bpf) = open_bpf(bpf_path)?;
    info!("Verifying BPF from {:?}", bpf_path);

    info!("BPF object loaded, running kernel verifier...");

    let btf = Btf::from_sys_fs().context("Failed to load kernel BTF")?;
    bpf.load_struct_ops(&btf)
        .context("Failed to load struct_ops programs")?;

    info!("All BPF programs passed kernel verification!");

    info!("Verified programs:");
    for (name, _prog) in bpf.programs() {
        info!("  ✓ {}", name);
    }

    Ok(())
}

/// Load and register the fixup for one HID device
///
/// The BPF link is pinned to the filesystem so it persists after the loader
/// exits. The descriptor is only rewritten on the next probe, so the caller
/// has to rebind the device afterwards.
pub fn load(hid_id: u32, bpf_path: Option<&Path>) -> Result<PathBuf> {
    let (bpf_path, mut bpf) = open_bpf(bpf_path)?;
    info!("Loading BPF from {:?} for hid_id={}", bpf_path, hid_id);

    debug!("Available programs:");
    for (name, _prog) in bpf.programs() {
        debug!("  - {}", name);
    }

    // Load kernel BTF and populate struct_ops with program FDs
    let btf = Btf::from_sys_fs().context("Failed to load kernel BTF")?;
    debug!("Calling load_struct_ops...");
    bpf.load_struct_ops(&btf)
        .context("Failed to load struct_ops programs")?;

    debug!("Looking for struct_ops map: {}", STRUCT_OPS_NAME);

    let map = bpf
        .map_mut(STRUCT_OPS_NAME)
        .with_context(|| format!("struct_ops map '{STRUCT_OPS_NAME}' not found"))?;

    let mut struct_ops: StructOpsMap<_> = map
        .try_into()
        .context("Failed to convert to StructOpsMap")?;

    // Set hid_id at offset 0 (first field in hid_bpf_ops)
    debug!("Setting hid_id={} at offset 0", hid_id);
    let hid_id_field = i32::try_from(hid_id).context("hid_id does not fit hid_bpf_ops.hid_id")?;
    struct_ops
        .set_field_i32(0, hid_id_field)
        .context("Failed to set hid_id")?;

    info!("Registering struct_ops with kernel...");
    struct_ops
        .register()
        .context("Failed to register struct_ops")?;

    // HID-BPF struct_ops are link based; without a pinned link the program
    // goes away with this process
    if !struct_ops.is_link() {
        bail!("struct_ops '{STRUCT_OPS_NAME}' is not link-based, cannot pin it");
    }

    let pin_path = pin_path(hid_id);
    {
        info!("Creating BPF link for link-based struct_ops...");
        let link = struct_ops.attach().context("Failed to attach struct_ops")?;

        let pin_dir = Path::new(BPF_PIN_DIR);
        if !pin_dir.exists() {
            std::fs::create_dir_all(pin_dir).context("Failed to create BPF pin directory")?;
        }

        // Pin the link so it persists after we exit
        info!("Pinning BPF link to {:?}", pin_path);
        link.pin(&pin_path)
            .with_context(|| format!("Failed to pin link to {pin_path:?}"))?;
    }

    // Forget the bpf object so it doesn't get dropped (link is pinned)
    std::mem::forget(bpf);

    Ok(pin_path)
}
