// SPDX-License-Identifier: GPL-2.0
//! Device identification for the Rakk Dasig X
//!
//! All vendor/product/bus constants live here. The loader and the BPF object
//! import from this module instead of keeping their own copies.

/// Vendor ID shared by every Dasig X transport (Telink)
pub const VENDOR_ID: u16 = 0x248A;

/// Product IDs, one per transport
pub const PRODUCT_ID_WIRED: u16 = 0xFB01;
pub const PRODUCT_ID_DONGLE: u16 = 0xFA02; // 2.4GHz receiver
pub const PRODUCT_ID_BLUETOOTH: u16 = 0x8266;

/// HID bus types as they appear in `/sys/bus/hid/devices/BBBB:...`
pub const BUS_USB: u16 = 0x0003;
pub const BUS_BLUETOOTH: u16 = 0x0005;

/// Descriptor lengths the faulty firmware reports on each transport
pub const RDESC_LEN_WIRED: usize = 193;
pub const RDESC_LEN_DONGLE: usize = 150;
pub const RDESC_LEN_BLUETOOTH: usize = 89;

/// Link the mouse enumerated over. Each one produces a differently sized
/// descriptor carrying the same fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Usb,
    Dongle,
    Bluetooth,
}

impl Transport {
    pub const ALL: [Transport; 3] = [Transport::Usb, Transport::Dongle, Transport::Bluetooth];

    #[inline]
    pub const fn product_id(self) -> u16 {
        match self {
            Transport::Usb => PRODUCT_ID_WIRED,
            Transport::Dongle => PRODUCT_ID_DONGLE,
            Transport::Bluetooth => PRODUCT_ID_BLUETOOTH,
        }
    }

    /// HID bus the transport binds on. The dongle is a USB device.
    #[inline]
    pub const fn bus(self) -> u16 {
        match self {
            Transport::Usb | Transport::Dongle => BUS_USB,
            Transport::Bluetooth => BUS_BLUETOOTH,
        }
    }

    /// Length of the unpatched descriptor on this transport
    #[inline]
    pub const fn rdesc_len(self) -> usize {
        match self {
            Transport::Usb => RDESC_LEN_WIRED,
            Transport::Dongle => RDESC_LEN_DONGLE,
            Transport::Bluetooth => RDESC_LEN_BLUETOOTH,
        }
    }

    /// Resolve the known variant from a descriptor length alone.
    #[inline]
    pub const fn from_rdesc_len(len: usize) -> Option<Transport> {
        match len {
            RDESC_LEN_WIRED => Some(Transport::Usb),
            RDESC_LEN_DONGLE => Some(Transport::Dongle),
            RDESC_LEN_BLUETOOTH => Some(Transport::Bluetooth),
            _ => None,
        }
    }

    /// Match a (bus, vendor, product) triple against the device table.
    pub fn from_ids(bus: u16, vendor: u16, product: u16) -> Option<Transport> {
        if vendor != VENDOR_ID {
            return None;
        }
        Transport::ALL
            .into_iter()
            .find(|t| t.bus() == bus && t.product_id() == product)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Transport::Usb => "wired USB",
            Transport::Dongle => "2.4GHz dongle",
            Transport::Bluetooth => "Bluetooth",
        }
    }
}

impl core::fmt::Display for Transport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
