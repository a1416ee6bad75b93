//! Buffer-size configuration and transfer-memory sizing.
//!
//! The configuration record is handed to the service once, at client
//! registration, and fixes the socket buffer sizes for the whole session.
//! The transfer-memory region negotiated at the same time must be at least
//! [`BufferConfig::transfer_memory_size`] bytes: a smaller region makes the
//! remote TCP stack advertise a zero receive window, which collapses
//! throughput to roughly one byte per second without raising any error.

use crate::command::CommandWriter;

/// Size of the encoded configuration record on the wire.
pub const CONFIG_WIRE_LEN: usize = 32;

const PAGE_MASK: u64 = 0xFFF;

/// Versioned socket buffer-size configuration.
///
/// Immutable once passed to session initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Configuration format version understood by the service.
    pub version: u32,
    /// Initial (or fixed) TCP send buffer size.
    pub tcp_tx_buf_size: u32,
    /// Initial (or fixed) TCP receive buffer size.
    pub tcp_rx_buf_size: u32,
    /// Maximum TCP send buffer size; 0 pins the buffer to its initial size.
    pub tcp_tx_buf_max_size: u32,
    /// Maximum TCP receive buffer size; 0 pins the buffer to its initial size.
    pub tcp_rx_buf_max_size: u32,
    /// UDP send buffer size.
    pub udp_tx_buf_size: u32,
    /// UDP receive buffer size.
    pub udp_rx_buf_size: u32,
    /// Per-socket buffer count multiplier (standard values 1 to 8).
    pub sb_efficiency: u32,
}

/// Stock configuration observed in production clients.
pub const DEFAULT_CONFIG: BufferConfig = BufferConfig {
    version: 1,
    tcp_tx_buf_size: 0x8000,
    tcp_rx_buf_size: 0x10000,
    tcp_tx_buf_max_size: 0x40000,
    tcp_rx_buf_max_size: 0x40000,
    udp_tx_buf_size: 0x2400,
    udp_rx_buf_size: 0xA500,
    sb_efficiency: 4,
};

impl Default for BufferConfig {
    fn default() -> Self {
        DEFAULT_CONFIG
    }
}

impl BufferConfig {
    /// Minimal transfer-memory size for this configuration.
    ///
    /// Sums the worst-case TCP buffer sizes (the maxima, falling back to the
    /// initial sizes when a maximum is 0) and both UDP buffer sizes, rounds
    /// up to a whole page, and scales by `sb_efficiency`.
    pub fn transfer_memory_size(&self) -> usize {
        let tcp_tx = if self.tcp_tx_buf_max_size != 0 {
            self.tcp_tx_buf_max_size
        } else {
            self.tcp_tx_buf_size
        };
        let tcp_rx = if self.tcp_rx_buf_max_size != 0 {
            self.tcp_rx_buf_max_size
        } else {
            self.tcp_rx_buf_size
        };

        let sum = u64::from(tcp_tx)
            + u64::from(tcp_rx)
            + u64::from(self.udp_tx_buf_size)
            + u64::from(self.udp_rx_buf_size);
        let sum = (sum + PAGE_MASK) & !PAGE_MASK;

        (u64::from(self.sb_efficiency) * sum) as usize
    }

    /// Appends the 32-byte wire encoding to a command header.
    pub fn encode_into(&self, w: &mut CommandWriter) {
        w.put_u32(self.version);
        w.put_u32(self.tcp_tx_buf_size);
        w.put_u32(self.tcp_rx_buf_size);
        w.put_u32(self.tcp_tx_buf_max_size);
        w.put_u32(self.tcp_rx_buf_max_size);
        w.put_u32(self.udp_tx_buf_size);
        w.put_u32(self.udp_rx_buf_size);
        w.put_u32(self.sb_efficiency);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::OpCode;

    #[test]
    fn default_field_values() {
        let c = BufferConfig::default();
        assert_eq!(c.version, 1);
        assert_eq!(c.tcp_tx_buf_size, 0x8000);
        assert_eq!(c.tcp_rx_buf_size, 0x10000);
        assert_eq!(c.tcp_tx_buf_max_size, 0x40000);
        assert_eq!(c.tcp_rx_buf_max_size, 0x40000);
        assert_eq!(c.udp_tx_buf_size, 0x2400);
        assert_eq!(c.udp_rx_buf_size, 0xA500);
        assert_eq!(c.sb_efficiency, 4);
    }

    #[test]
    fn default_transfer_memory_size() {
        // 0x40000 + 0x40000 + 0x2400 + 0xA500 = 0x8C900, page-rounded to
        // 0x8D000, times the efficiency factor of 4.
        assert_eq!(DEFAULT_CONFIG.transfer_memory_size(), 0x234000);
    }

    #[test]
    fn zero_max_falls_back_to_initial_size() {
        let c = BufferConfig {
            tcp_tx_buf_max_size: 0,
            tcp_rx_buf_max_size: 0,
            ..DEFAULT_CONFIG
        };
        // 0x8000 + 0x10000 + 0x2400 + 0xA500 = 0x24900 -> 0x25000 * 4.
        assert_eq!(c.transfer_memory_size(), 0x94000);
    }

    #[test]
    fn page_rounding_is_upward() {
        let c = BufferConfig {
            tcp_tx_buf_max_size: 1,
            tcp_rx_buf_max_size: 1,
            udp_tx_buf_size: 1,
            udp_rx_buf_size: 1,
            sb_efficiency: 1,
            ..DEFAULT_CONFIG
        };
        assert_eq!(c.transfer_memory_size(), 0x1000);
    }

    #[test]
    fn size_is_monotonic_in_every_field() {
        let base = DEFAULT_CONFIG;
        let grow = |f: fn(&mut BufferConfig)| {
            let mut c = base;
            f(&mut c);
            c
        };
        let baseline = base.transfer_memory_size();
        let cases = [
            grow(|c| c.tcp_tx_buf_size += 0x1000),
            grow(|c| c.tcp_rx_buf_size += 0x1000),
            grow(|c| c.tcp_tx_buf_max_size += 0x1000),
            grow(|c| c.tcp_rx_buf_max_size += 0x1000),
            grow(|c| c.udp_tx_buf_size += 0x1000),
            grow(|c| c.udp_rx_buf_size += 0x1000),
            grow(|c| c.sb_efficiency += 1),
        ];
        for c in cases {
            assert!(
                c.transfer_memory_size() >= baseline,
                "shrank for {c:?}"
            );
        }
    }

    #[test]
    fn deterministic() {
        assert_eq!(
            DEFAULT_CONFIG.transfer_memory_size(),
            DEFAULT_CONFIG.transfer_memory_size()
        );
    }

    #[test]
    fn wire_encoding_layout() {
        let mut w = CommandWriter::new(OpCode::RegisterClient);
        DEFAULT_CONFIG.encode_into(&mut w);
        let bytes = w.finish();
        assert_eq!(bytes.len(), 16 + CONFIG_WIRE_LEN);
        let field = |i: usize| {
            u32::from_le_bytes(bytes[16 + 4 * i..20 + 4 * i].try_into().unwrap())
        };
        assert_eq!(field(0), 1);
        assert_eq!(field(1), 0x8000);
        assert_eq!(field(2), 0x10000);
        assert_eq!(field(3), 0x40000);
        assert_eq!(field(4), 0x40000);
        assert_eq!(field(5), 0x2400);
        assert_eq!(field(6), 0xA500);
        assert_eq!(field(7), 4);
    }
}
