// SPDX-License-Identifier: GPL-2.0
//! HID device discovery and operations for the Rakk Dasig X

use anyhow::{bail, Context, Result};
use dasig_rdesc::{HidDevice, Transport};
use std::fs::{self, File};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Where the kernel lists bound HID devices
pub const HID_SYSFS: &str = "/sys/bus/hid/devices";

/// Driver used when a device has no driver link (e.g. already unbound)
const DEFAULT_DRIVER: &str = "hid-generic";

/// HID_MAX_DESCRIPTOR_SIZE from linux/hid.h
pub const HID_MAX_DESCRIPTOR_SIZE: usize = 4096;

/// HID interface information
#[derive(Debug, Clone)]
pub struct HidInfo {
    pub hid_id: u32,
    pub device_name: String,
    pub transport: Transport,
    /// Descriptor as currently exposed by the kernel (post-fixup if loaded)
    pub rdesc: Vec<u8>,
    pub hidraw_path: Option<String>,
}

/// Tags fixup diagnostics with a device name
pub struct DeviceLabel<'a>(pub &'a str);

impl HidDevice for DeviceLabel<'_> {
    fn report_patched(&self, transport: Transport) {
        tracing::info!(
            "{}: Intercepting Rakk Dasig X report descriptor ({}, buttons 3 -> 5)",
            self.0,
            transport
        );
    }
}

/// Sysfs device name fields: `BBBB:VVVV:PPPP.IIII`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceName {
    pub bus: u16,
    pub vendor: u16,
    pub product: u16,
    pub hid_id: u32,
}

/// Parse a device name like `0003:248A:FB01.000B`
pub fn parse_device_name(name: &str) -> Option<DeviceName> {
    let parts: Vec<&str> = name.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let (pid, id) = parts[2].split_once('.')?;

    Some(DeviceName {
        bus: u16::from_str_radix(parts[0], 16).ok()?,
        vendor: u16::from_str_radix(parts[1], 16).ok()?,
        product: u16::from_str_radix(pid, 16).ok()?,
        hid_id: u32::from_str_radix(id, 16).ok()?,
    })
}

/// Find every bound Dasig X HID device
pub fn find_devices() -> Result<Vec<HidInfo>> {
    find_devices_in(Path::new(HID_SYSFS))
}

/// Same as [`find_devices`] against an arbitrary sysfs root
pub fn find_devices_in(hid_devices: &Path) -> Result<Vec<HidInfo>> {
    if !hid_devices.exists() {
        bail!("HID sysfs not available at {}", hid_devices.display());
    }

    tracing::info!(
        "Searching for Rakk Dasig X devices VID={:04x}...",
        dasig_rdesc::ids::VENDOR_ID
    );

    let entries = fs::read_dir(hid_devices)
        .with_context(|| format!("Failed to read {}", hid_devices.display()))?;

    let mut found = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();

        let Some(parsed) = parse_device_name(&name_str) else {
            continue;
        };

        let Some(transport) = Transport::from_ids(parsed.bus, parsed.vendor, parsed.product)
        else {
            continue;
        };

        tracing::debug!("Checking {} ({})...", name_str, transport);

        let rdesc_path = entry.path().join("report_descriptor");
        let rdesc = match fs::read(&rdesc_path) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!("  Skipping, cannot read {:?}: {}", rdesc_path, e);
                continue;
            }
        };

        tracing::debug!(
            "  Descriptor size={}, usage max byte: {:02x?}",
            rdesc.len(),
            rdesc.get(dasig_rdesc::USAGE_MAX_OFFSET)
        );

        found.push(HidInfo {
            hid_id: parsed.hid_id,
            device_name: name_str.to_string(),
            transport,
            rdesc,
            hidraw_path: find_hidraw_for_hid(&entry.path()),
        });
    }

    found.sort_by_key(|d| d.hid_id);
    Ok(found)
}

/// Find hidraw device for a HID interface
fn find_hidraw_for_hid(hid_path: &Path) -> Option<String> {
    let hidraw_dir = hid_path.join("hidraw");

    if !hidraw_dir.exists() {
        return None;
    }

    for entry in fs::read_dir(hidraw_dir).ok()?.flatten() {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();

        if name_str.starts_with("hidraw") {
            return Some(format!("/dev/{name_str}"));
        }
    }

    None
}

// HIDRAW ioctl definitions
// From linux/hidraw.h:
// #define HIDIOCGRDESCSIZE _IOR('H', 0x01, int)
// #define HIDIOCGRDESC     _IOR('H', 0x02, struct hidraw_report_descriptor)

const HIDRAW_MAGIC: u8 = b'H';

/// _IOC direction bits
const IOC_READ: u32 = 2;

fn hidraw_ioc(dir: u32, nr: u32, len: usize) -> libc::c_ulong {
    // Direction: 2 bits at 30-31, Size: 14 bits at 16-29, Type: 8 bits at 8-15, Nr: 8 bits at 0-7
    let size = (len as u32) & 0x3FFF;
    let typ = HIDRAW_MAGIC as u32;
    ((dir << 30) | (size << 16) | (typ << 8) | nr) as libc::c_ulong
}

fn hidiocgrdescsize() -> libc::c_ulong {
    hidraw_ioc(IOC_READ, 0x01, std::mem::size_of::<libc::c_int>())
}

fn hidiocgrdesc() -> libc::c_ulong {
    hidraw_ioc(IOC_READ, 0x02, std::mem::size_of::<HidrawReportDescriptor>())
}

/// struct hidraw_report_descriptor
#[repr(C)]
struct HidrawReportDescriptor {
    size: u32,
    value: [u8; HID_MAX_DESCRIPTOR_SIZE],
}

/// Read the report descriptor the kernel parsed, via hidraw ioctls
pub fn read_hidraw_rdesc(hidraw_path: &str) -> Result<Vec<u8>> {
    let file = File::options()
        .read(true)
        .open(hidraw_path)
        .with_context(|| format!("Failed to open {hidraw_path}"))?;

    let fd = file.as_raw_fd();

    let mut size: libc::c_int = 0;
    let ret = unsafe { libc::ioctl(fd, hidiocgrdescsize() as _, &mut size as *mut libc::c_int) };
    if ret < 0 {
        bail!(
            "HIDIOCGRDESCSIZE failed: {}",
            std::io::Error::last_os_error()
        );
    }

    let size = usize::try_from(size)
        .with_context(|| format!("Kernel reported negative descriptor size {size}"))?
        .min(HID_MAX_DESCRIPTOR_SIZE);
    tracing::debug!("{}: descriptor size {}", hidraw_path, size);

    let mut desc = HidrawReportDescriptor {
        size: size as u32,
        value: [0; HID_MAX_DESCRIPTOR_SIZE],
    };
    let ret = unsafe { libc::ioctl(fd, hidiocgrdesc() as _, &mut desc as *mut HidrawReportDescriptor) };
    if ret < 0 {
        bail!("HIDIOCGRDESC failed: {}", std::io::Error::last_os_error());
    }

    Ok(desc.value[..size].to_vec())
}

/// Driver currently bound to a HID device, from the `driver` symlink
fn bound_driver(device_path: &Path) -> Option<String> {
    let target = fs::read_link(device_path.join("driver")).ok()?;
    Some(target.file_name()?.to_string_lossy().into_owned())
}

/// Rebind HID device so the kernel re-fetches and re-fixes the descriptor
pub fn rebind_device(device_name: &str) -> Result<()> {
    tracing::info!("Rebinding device {}...", device_name);

    let device_path = Path::new(HID_SYSFS).join(device_name);
    let driver = bound_driver(&device_path).unwrap_or_else(|| DEFAULT_DRIVER.to_string());
    let driver_dir = PathBuf::from("/sys/bus/hid/drivers").join(&driver);
    tracing::debug!("Current driver: {}", driver);

    // Unbind
    if let Ok(mut f) = File::create(driver_dir.join("unbind")) {
        let _ = write!(f, "{device_name}");
    }

    thread::sleep(Duration::from_millis(100));

    // Bind
    let mut f = File::create(driver_dir.join("bind"))
        .with_context(|| format!("Failed to open {driver} bind"))?;
    write!(f, "{device_name}").with_context(|| format!("Failed to bind {device_name}"))?;

    thread::sleep(Duration::from_millis(100));
    tracing::info!("Device rebound");

    Ok(())
}
