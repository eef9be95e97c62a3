//! HCI socket event filters
//!
//! A raw HCI socket delivers every controller packet by default. The kernel
//! accepts a per-socket filter (the `SOL_HCI`/`HCI_FILTER` socket option)
//! that restricts delivery by packet type, event code and, for command
//! responses, by command opcode.

/// Mirror of the kernel's `struct hci_filter` socket option payload.
///
/// The previous filter of a socket is captured with
/// [`HciSocket::filter`](crate::hci::HciSocket::filter) before a session
/// installs its own, and treated as an opaque snapshot to be restored on
/// teardown.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciFilter {
    /// Creates an empty filter that matches no packets at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a packet type (e.g. `HCI_EVENT_PKT`).
    pub fn set_packet_type(&mut self, packet_type: u8) {
        self.type_mask |= 1u32 << (packet_type & 31);
    }

    /// Accepts an event code. Event bits live in a 64-bit mask split over
    /// two words, so codes above 0x1F land in the second word.
    pub fn set_event(&mut self, event: u8) {
        let bit = usize::from(event & 63);
        self.event_mask[bit >> 5] |= 1u32 << (bit & 31);
    }

    /// Restricts Command Complete/Status delivery to a single opcode.
    /// Zero means "any opcode".
    pub fn set_opcode(&mut self, opcode: u16) {
        self.opcode = opcode;
    }

    pub fn accepts_packet_type(&self, packet_type: u8) -> bool {
        self.type_mask & (1u32 << (packet_type & 31)) != 0
    }

    pub fn accepts_event(&self, event: u8) -> bool {
        let bit = usize::from(event & 63);
        self.event_mask[bit >> 5] & (1u32 << (bit & 31)) != 0
    }

    pub fn opcode(&self) -> u16 {
        self.opcode
    }
}
