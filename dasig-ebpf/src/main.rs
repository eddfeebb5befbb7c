//! HID-BPF driver for the Rakk Dasig X mouse
//! Fixes the report descriptor so side buttons 4 and 5 are registered
//!
//! The firmware declares Usage Maximum (3) for a 5-bit button field. The
//! kernel hands us the raw descriptor through `hid_rdesc_fixup` before
//! hid-generic parses it; we rewrite byte 17 (0x03 -> 0x05) in place and keep
//! the original size.
//!
//! Mouse: VID 0x248A / PID 0xFB01 (USB), 0xFA02 (dongle), 0x8266 (Bluetooth)
//!
//! Nothing else is hooked. Input reports are decoded by the generic HID
//! parser once the descriptor is correct.

#![no_std]
#![no_main]
// BPF struct_ops callbacks receive raw pointers from kernel - always valid in this context
#![allow(clippy::not_unsafe_ptr_arg_deref)]

use aya_ebpf::programs::hid_bpf::{hid_bpf_ctx, HidBpfContext};
use dasig_rdesc::{patch_target, HidDevice, Transport, USAGE_MAX_FIXED_VALUE, USAGE_MAX_OFFSET};

// =============================================================================
// GPL License - Required for BPF programs using GPL-only kernel helpers/kfuncs
// =============================================================================

#[link_section = "license"]
#[used]
static LICENSE: [u8; 4] = *b"GPL\0";

// =============================================================================
// Safe wrappers for BPF helpers
// =============================================================================

/// Safe wrapper for bpf_printk that hides the unsafe.
macro_rules! trace {
    ($($arg:tt)*) => {
        // SAFETY: bpf_printk is safe when given valid format string and matching args
        unsafe { aya_ebpf::helpers::bpf_printk!($($arg)*) }
    };
}

/// Diagnostic sink for the fixup: one trace_pipe line per patched descriptor.
struct TracePipe;

impl HidDevice for TracePipe {
    #[inline(always)]
    fn report_patched(&self, transport: Transport) {
        trace!(
            b"dasig_x: intercepting %d-byte report descriptor (buttons 3 -> 5)",
            transport.rdesc_len() as u32
        );
    }
}

// =============================================================================
// struct_ops definitions
// =============================================================================

/// Kernel's list_head struct for linked lists.
/// Must have exact name for BTF matching.
#[repr(C)]
struct list_head {
    next: *mut list_head,
    prev: *mut list_head,
}

/// Opaque hid_device pointer type for BTF matching.
#[repr(C)]
struct hid_device {
    _opaque: u8,
}

/// Matches kernel's struct hid_bpf_ops layout.
/// Field names and types MUST match exactly for BTF struct_ops matching.
#[repr(C)]
struct hid_bpf_ops {
    hid_id: i32,
    flags: u32,
    list: list_head,
    hid_device_event: *const (),
    hid_rdesc_fixup: *const (),
    hid_hw_request: *const (),
    hid_hw_output_report: *const (),
    hdev: *mut hid_device,
}

unsafe impl Sync for hid_bpf_ops {}

// hid_id is filled in by the loader (offset 0) before registration
#[unsafe(link_section = ".struct_ops.link")]
#[unsafe(no_mangle)]
static dasig_x_fixup: hid_bpf_ops = hid_bpf_ops {
    hid_id: 0,
    flags: 0,
    list: list_head {
        next: core::ptr::null_mut(),
        prev: core::ptr::null_mut(),
    },
    hid_device_event: dasig_x_event as *const (),
    hid_rdesc_fixup: dasig_x_rdesc_fixup as *const (),
    hid_hw_request: core::ptr::null(),
    hid_hw_output_report: core::ptr::null(),
    hdev: core::ptr::null_mut(),
};

// =============================================================================
// HID-BPF callbacks
// =============================================================================

/// Extract the actual hid_bpf_ctx pointer from struct_ops context wrapper.
///
/// struct_ops callbacks get a pointer to an array of u64 with the typed
/// pointer at index 0 (what BPF_PROG does in C).
#[inline(always)]
unsafe fn extract_ctx(ctx_wrapper: *mut u64) -> *mut hid_bpf_ctx {
    *ctx_wrapper as *mut hid_bpf_ctx
}

// Device event handler - reports pass through untouched
#[no_mangle]
#[link_section = "struct_ops/hid_device_event"]
pub extern "C" fn dasig_x_event(_ctx: *mut u64) -> i32 {
    0
}

// Report descriptor fixup - Usage Maximum 3 -> 5, size unchanged
#[no_mangle]
#[link_section = "struct_ops/hid_rdesc_fixup"]
pub extern "C" fn dasig_x_rdesc_fixup(ctx_wrapper: *mut u64) -> i32 {
    // SAFETY: kernel passes valid context wrapper, extract the actual hid_bpf_ctx pointer
    let ctx = unsafe { HidBpfContext::new(extract_ctx(ctx_wrapper)) };

    // retval holds the current descriptor size; the data window is larger
    let rsize = ctx.retval() as usize;

    let Some(mut data) = ctx.data(0, USAGE_MAX_OFFSET + 1) else {
        return 0;
    };

    // The data window is a checked accessor, not a slice, so this goes
    // through the same decision as fixup() without borrowing &mut [u8]
    if let Some(transport) = patch_target(rsize, || data.get(USAGE_MAX_OFFSET)) {
        TracePipe.report_patched(transport);
        data.set(USAGE_MAX_OFFSET, USAGE_MAX_FIXED_VALUE);
    }

    // 0 = keep the original size
    0
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}
