// SPDX-License-Identifier: GPL-2.0
//! Report descriptor fixup for the Rakk Dasig X mouse
//!
//! The Dasig X firmware declares `USAGE_MAXIMUM = 3` in its mouse collection
//! while sending five button bits (`REPORT_COUNT = 5`), so the generic HID
//! parser drops the two side buttons. The faulty item sits at bytes 16-17 of
//! the descriptor on every transport:
//!
//! ```text
//! 05 01 09 02 a1 01 85 01 09 01 a1 00 05 09 19 01 29 03
//!                                                    ^^ -> 05
//! ```
//!
//! The only thing that differs between wired USB, the 2.4GHz dongle and
//! Bluetooth is the total descriptor length (193, 150 and 89 bytes), which is
//! what [`fixup`] keys on. Nothing else in the descriptor is parsed.

#![cfg_attr(not(test), no_std)]

pub mod captured;
pub mod ids;

pub use ids::Transport;

/// Offset of the Usage Maximum data byte (item prefix 0x29 sits at 16)
pub const USAGE_MAX_OFFSET: usize = 17;

/// Value shipped by the firmware (buttons 1-3)
pub const USAGE_MAX_ORIG_VALUE: u8 = 0x03;

/// Value that matches the 5-bit button report
pub const USAGE_MAX_FIXED_VALUE: u8 = 0x05;

/// Receiver for the diagnostic emitted when a descriptor gets patched.
///
/// This is the device handle of the fixup contract. It is only used for log
/// attribution, never for control flow.
pub trait HidDevice {
    fn report_patched(&self, transport: Transport);
}

/// A device handle that discards diagnostics
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDevice;

impl HidDevice for NoDevice {
    fn report_patched(&self, _transport: Transport) {}
}

/// Where a descriptor stands with respect to the Dasig X fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Length matches no known variant (or the buffer is too short to hold
    /// the usage maximum byte). Not a Dasig X descriptor.
    Unrecognized,
    /// Known variant still declaring 3 buttons
    NeedsFixup(Transport),
    /// Known variant already declaring 5 buttons
    Patched(Transport),
    /// Known length, but offset 17 holds something else entirely
    Foreign { transport: Transport, value: u8 },
}

impl Status {
    /// Classify the usage maximum byte of a descriptor already matched by length.
    #[inline]
    pub const fn classify(transport: Transport, value: u8) -> Status {
        match value {
            USAGE_MAX_ORIG_VALUE => Status::NeedsFixup(transport),
            USAGE_MAX_FIXED_VALUE => Status::Patched(transport),
            _ => Status::Foreign { transport, value },
        }
    }

    /// Variant picked by the descriptor length, if any
    pub const fn transport(&self) -> Option<Transport> {
        match *self {
            Status::Unrecognized => None,
            Status::NeedsFixup(t) | Status::Patched(t) => Some(t),
            Status::Foreign { transport, .. } => Some(transport),
        }
    }
}

/// Read-only classification of `rdesc[..rsize]`.
///
/// Offset 17 is read only when `rsize` is one of the known variant lengths.
pub fn inspect(rdesc: &[u8], rsize: usize) -> Status {
    let Some(transport) = Transport::from_rdesc_len(rsize) else {
        return Status::Unrecognized;
    };

    match rdesc.get(USAGE_MAX_OFFSET) {
        Some(&value) => Status::classify(transport, value),
        None => Status::Unrecognized,
    }
}

/// Decide whether a descriptor of `rsize` bytes gets patched.
///
/// `usage_max` is asked for byte 17 only once `rsize` matches a known
/// variant. Returns the variant to patch when that byte still holds
/// `USAGE_MAXIMUM = 3`. Slices go through [`fixup`]; the BPF program calls
/// this directly on its HID-BPF data window.
#[inline(always)]
pub fn patch_target<F>(rsize: usize, usage_max: F) -> Option<Transport>
where
    F: FnOnce() -> Option<u8>,
{
    let transport = Transport::from_rdesc_len(rsize)?;
    match Status::classify(transport, usage_max()?) {
        Status::NeedsFixup(transport) => Some(transport),
        _ => None,
    }
}

/// Patch a faulty Dasig X report descriptor in place.
///
/// Called before the descriptor is parsed. If `rsize` is one of the known
/// variant lengths and byte 17 still holds `USAGE_MAXIMUM = 3`, the byte is
/// rewritten to 5 and `hdev` gets one diagnostic. Every other input is left
/// untouched, including descriptors that are already patched, so applying
/// the fixup twice is the same as applying it once.
///
/// The length is borrowed immutably and the same buffer is handed back.
pub fn fixup<'a, D>(hdev: &D, rdesc: &'a mut [u8], rsize: &usize) -> &'a mut [u8]
where
    D: HidDevice + ?Sized,
{
    if let Some(transport) = patch_target(*rsize, || rdesc.get(USAGE_MAX_OFFSET).copied()) {
        if let Some(byte) = rdesc.get_mut(USAGE_MAX_OFFSET) {
            hdev.report_patched(transport);
            *byte = USAGE_MAX_FIXED_VALUE;
        }
    }

    rdesc
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Records every diagnostic so tests can count them
    #[derive(Default)]
    struct RecordingDevice {
        patched: RefCell<Vec<Transport>>,
    }

    impl HidDevice for RecordingDevice {
        fn report_patched(&self, transport: Transport) {
            self.patched.borrow_mut().push(transport);
        }
    }

    fn wired() -> Vec<u8> {
        captured::WIRED.to_vec()
    }

    #[test]
    fn test_fixup_patches_wired_descriptor() {
        let mut rdesc = wired();
        let rsize = 193;
        let hdev = RecordingDevice::default();
        assert_eq!(rdesc[USAGE_MAX_OFFSET], 0x03);

        let ptr = rdesc.as_ptr();
        let ret = fixup(&hdev, &mut rdesc, &rsize);

        assert_eq!(ret.as_ptr(), ptr);
        assert_eq!(rdesc[17], 0x05);
        assert_eq!(rdesc[16], 0x29);
        assert_eq!(*hdev.patched.borrow(), vec![Transport::Usb]);
    }

    #[test]
    fn test_fixup_only_modifies_target_byte() {
        for transport in Transport::ALL {
            let original = captured::for_transport(transport);
            let mut rdesc = original.to_vec();
            let rsize = original.len();

            fixup(&NoDevice, &mut rdesc, &rsize);

            assert_eq!(rdesc.len(), original.len());
            assert_eq!(rsize, transport.rdesc_len());
            for (i, (&got, &want)) in rdesc.iter().zip(original).enumerate() {
                if i == USAGE_MAX_OFFSET {
                    assert_eq!(got, 0x05, "{transport}");
                } else {
                    assert_eq!(got, want, "{transport}: byte {i} changed");
                }
            }
        }
    }

    #[test]
    fn test_fixup_patches_dongle_and_bluetooth() {
        let hdev = RecordingDevice::default();

        let mut dongle = captured::DONGLE.to_vec();
        let ptr = dongle.as_ptr();
        assert_eq!(fixup(&hdev, &mut dongle, &150).as_ptr(), ptr);
        assert_eq!(dongle[17], 0x05);

        let mut bt = captured::BLUETOOTH.to_vec();
        let ptr = bt.as_ptr();
        assert_eq!(fixup(&hdev, &mut bt, &89).as_ptr(), ptr);
        assert_eq!(bt[17], 0x05);

        assert_eq!(
            *hdev.patched.borrow(),
            vec![Transport::Dongle, Transport::Bluetooth]
        );
    }

    #[test]
    fn test_no_fixup_wrong_size() {
        let mut rdesc = wired();
        let hdev = RecordingDevice::default();

        fixup(&hdev, &mut rdesc, &100);

        assert_eq!(rdesc[17], 0x03);
        assert!(hdev.patched.borrow().is_empty());
    }

    #[test]
    fn test_no_fixup_already_patched() {
        for transport in Transport::ALL {
            let mut rdesc = captured::for_transport(transport).to_vec();
            rdesc[17] = 0x05;
            let expected = rdesc.clone();
            let hdev = RecordingDevice::default();

            fixup(&hdev, &mut rdesc, &transport.rdesc_len());

            assert_eq!(rdesc, expected);
            assert!(hdev.patched.borrow().is_empty(), "{transport}");
        }
    }

    #[test]
    fn test_no_fixup_unexpected_byte_value() {
        let mut rdesc = wired();
        rdesc[17] = 0x08;
        let hdev = RecordingDevice::default();

        fixup(&hdev, &mut rdesc, &193);

        assert_eq!(rdesc[17], 0x08);
        assert!(hdev.patched.borrow().is_empty());
    }

    #[test]
    fn test_no_fixup_zero_size() {
        let mut rdesc = [0u8; 1];
        let ptr = rdesc.as_ptr();

        let ret = fixup(&NoDevice, &mut rdesc, &0);

        assert_eq!(ret.as_ptr(), ptr);
        assert_eq!(rdesc, [0]);

        let mut empty: [u8; 0] = [];
        assert!(fixup(&NoDevice, &mut empty, &0).is_empty());
    }

    #[test]
    fn test_no_fixup_small_descriptor() {
        let mut rdesc: [u8; 10] = [0x05, 0x01, 0x09, 0x02, 0xa1, 0x01, 0x85, 0x01, 0x09, 0x01];
        let expected = rdesc;
        let ptr = rdesc.as_ptr();

        let ret = fixup(&NoDevice, &mut rdesc, &10);

        assert_eq!(ret.as_ptr(), ptr);
        assert_eq!(rdesc, expected);
    }

    #[test]
    fn test_no_fixup_when_buffer_shorter_than_claimed_size() {
        // Length says wired, buffer can't hold offset 17: must not panic
        let mut rdesc = [0x03u8; 17];
        let hdev = RecordingDevice::default();

        fixup(&hdev, &mut rdesc, &193);

        assert_eq!(rdesc, [0x03u8; 17]);
        assert!(hdev.patched.borrow().is_empty());
    }

    #[test]
    fn test_fixup_uses_size_not_buffer_length() {
        // HID-BPF hands over a larger window than the descriptor itself
        let mut window = vec![0u8; 4096];
        window[..193].copy_from_slice(&captured::WIRED);

        fixup(&NoDevice, &mut window, &193);

        assert_eq!(window[17], 0x05);
        assert_eq!(window.len(), 4096);
    }

    #[test]
    fn test_no_fixup_larger_descriptor() {
        let mut rdesc = vec![0u8; 256];
        rdesc[..193].copy_from_slice(&captured::WIRED);

        fixup(&NoDevice, &mut rdesc, &256);

        assert_eq!(rdesc[17], 0x03);
    }

    #[test]
    fn test_return_value_is_rdesc() {
        let mut matching = wired();
        let ptr = matching.as_ptr();
        assert_eq!(fixup(&NoDevice, &mut matching, &193).as_ptr(), ptr);

        let mut non_matching = wired();
        let ptr = non_matching.as_ptr();
        assert_eq!(fixup(&NoDevice, &mut non_matching, &100).as_ptr(), ptr);
    }

    #[test]
    fn test_fixup_is_idempotent() {
        let hdev = RecordingDevice::default();
        let mut once = wired();
        fixup(&hdev, &mut once, &193);

        let mut twice = once.clone();
        fixup(&hdev, &mut twice, &193);

        assert_eq!(once, twice);
        assert_eq!(hdev.patched.borrow().len(), 1);
    }

    #[test]
    fn test_unknown_lengths_never_mutate() {
        let calls = Cell::new(0u32);
        struct Counting<'a>(&'a Cell<u32>);
        impl HidDevice for Counting<'_> {
            fn report_patched(&self, _: Transport) {
                self.0.set(self.0.get() + 1);
            }
        }

        let mut template = vec![0u8; 300];
        template[..193].copy_from_slice(&captured::WIRED);

        for rsize in 0..=template.len() {
            let mut rdesc = template[..rsize].to_vec();
            fixup(&Counting(&calls), &mut rdesc, &rsize);

            if Transport::from_rdesc_len(rsize).is_some() {
                // byte 17 of the wired prefix is 0x03 for every known length
                assert_eq!(rdesc[17], 0x05, "rsize={rsize}");
            } else {
                assert_eq!(rdesc, template[..rsize], "rsize={rsize}");
            }
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_inspect() {
        assert_eq!(
            inspect(&captured::WIRED, 193),
            Status::NeedsFixup(Transport::Usb)
        );
        assert_eq!(inspect(&captured::WIRED, 192), Status::Unrecognized);
        assert_eq!(inspect(&[], 0), Status::Unrecognized);
        assert_eq!(inspect(&[0u8; 10], 89), Status::Unrecognized);

        let mut bt = captured::BLUETOOTH;
        fixup(&NoDevice, &mut bt, &89);
        assert_eq!(inspect(&bt, 89), Status::Patched(Transport::Bluetooth));

        bt[17] = 0x08;
        assert_eq!(
            inspect(&bt, 89),
            Status::Foreign {
                transport: Transport::Bluetooth,
                value: 0x08
            }
        );
        assert_eq!(inspect(&bt, 89).transport(), Some(Transport::Bluetooth));
        assert_eq!(Status::Unrecognized.transport(), None);
    }

    #[test]
    fn test_patch_target_reads_byte_only_after_length_match() {
        let reads = Cell::new(0);
        let counter = &reads;
        let read = |value: u8| {
            move || {
                counter.set(counter.get() + 1);
                Some(value)
            }
        };

        assert_eq!(patch_target(192, read(0x03)), None);
        assert_eq!(patch_target(0, read(0x03)), None);
        assert_eq!(reads.get(), 0);

        assert_eq!(patch_target(193, read(0x03)), Some(Transport::Usb));
        assert_eq!(patch_target(150, read(0x03)), Some(Transport::Dongle));
        assert_eq!(patch_target(89, read(0x03)), Some(Transport::Bluetooth));
        assert_eq!(patch_target(89, read(0x05)), None);
        assert_eq!(patch_target(89, read(0xff)), None);
        assert_eq!(reads.get(), 5);

        // Window too small to hold byte 17
        assert_eq!(patch_target(193, || None), None);
    }

    #[test]
    fn test_captured_descriptors_share_fault_prefix() {
        let prefix_tail: [u8; 10] = [0x09, 0x01, 0xa1, 0x00, 0x05, 0x09, 0x19, 0x01, 0x29, 0x03];
        for transport in Transport::ALL {
            let rdesc = captured::for_transport(transport);
            assert_eq!(rdesc.len(), transport.rdesc_len());
            assert_eq!(rdesc[..6], [0x05u8, 0x01, 0x09, 0x02, 0xa1, 0x01]);
            assert_eq!(rdesc[8..18], prefix_tail);
            assert_eq!(
                inspect(rdesc, rdesc.len()),
                Status::NeedsFixup(transport)
            );
        }
    }
}
