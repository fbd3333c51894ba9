//! # Byte Order Handling for Modbus
//!
//! Devices disagree on how multi-register values are laid out. The ABCD
//! notation names the position of each byte of the value:
//! - A = Most significant byte (MSB)
//! - B = Second byte
//! - C = Third byte
//! - D = Least significant byte (LSB)
//!
//! For 32-bit value `0x12345678` the registers on the wire hold:
//! - `BigEndian (ABCD)`: \[0x12, 0x34, 0x56, 0x78\]
//! - `LittleEndian (DCBA)`: \[0x78, 0x56, 0x34, 0x12\]
//! - `BigEndianSwap (CDAB)`: \[0x56, 0x78, 0x12, 0x34\] (Modbus common)
//! - `LittleEndianSwap (BADC)`: \[0x34, 0x12, 0x78, 0x56\]
//!
//! The helpers here take wire bytes (each register big-endian, registers in
//! address order) and return the value's bytes MSB first, ready for
//! `from_be_bytes`.

use std::fmt;

/// Byte/word order of a 16/32/64-bit value spread across registers.
///
/// # Example
///
/// ```rust
/// use modbus_bridge::ByteOrder;
///
/// let order = ByteOrder::from_str("CDAB").unwrap();
/// assert_eq!(order, ByteOrder::BigEndianSwap);
/// assert!(order.has_word_swap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// ABCD, most significant byte first
    #[default]
    BigEndian,

    /// DCBA, least significant byte first
    LittleEndian,

    /// CDAB, big-endian words in reverse order
    BigEndianSwap,

    /// BADC, byte-swapped words in address order
    LittleEndianSwap,
}

impl ByteOrder {
    /// Parse the common spellings.
    ///
    /// - "ABCD", "AB-CD", "BE", "BIG_ENDIAN" → BigEndian
    /// - "DCBA", "DC-BA", "LE", "LITTLE_ENDIAN" → LittleEndian
    /// - "CDAB", "CD-AB" → BigEndianSwap
    /// - "BADC", "BA-DC" → LittleEndianSwap
    ///
    /// The 16-bit spellings "AB" and "BA" map to the order that treats a
    /// single register the same way.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "ABCD" | "AB" | "BE" | "BIGENDIAN" | "ABCDEFGH" => Some(Self::BigEndian),
            "DCBA" | "LE" | "LITTLEENDIAN" | "HGFEDCBA" => Some(Self::LittleEndian),
            "CDAB" | "BIGENDIANSWAP" => Some(Self::BigEndianSwap),
            "BADC" | "BA" | "LITTLEENDIANSWAP" => Some(Self::LittleEndianSwap),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigEndian => "ABCD",
            Self::LittleEndian => "DCBA",
            Self::BigEndianSwap => "CDAB",
            Self::LittleEndianSwap => "BADC",
        }
    }

    /// Bytes within each register are swapped.
    #[inline]
    pub fn has_byte_swap(&self) -> bool {
        matches!(self, Self::LittleEndian | Self::LittleEndianSwap)
    }

    /// Registers appear in reverse significance order.
    #[inline]
    pub fn has_word_swap(&self) -> bool {
        matches!(self, Self::LittleEndian | Self::BigEndianSwap)
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Register to Bytes Conversions
// ============================================================================

/// Value bytes (MSB first) of a single register.
#[inline]
pub fn reg_to_bytes_2(reg: u16, order: ByteOrder) -> [u8; 2] {
    if order.has_byte_swap() {
        reg.to_le_bytes()
    } else {
        reg.to_be_bytes()
    }
}

/// Value bytes (MSB first) of a 32-bit value held in 2 registers.
///
/// # Example
///
/// ```rust
/// use modbus_bridge::{ByteOrder, regs_to_bytes_4};
///
/// let regs = [0x1234, 0x5678];
/// assert_eq!(regs_to_bytes_4(&regs, ByteOrder::BigEndian), [0x12, 0x34, 0x56, 0x78]);
/// assert_eq!(regs_to_bytes_4(&regs, ByteOrder::BigEndianSwap), [0x56, 0x78, 0x12, 0x34]);
/// ```
#[inline]
pub fn regs_to_bytes_4(regs: &[u16; 2], order: ByteOrder) -> [u8; 4] {
    let [h0, h1] = [regs[0].to_be_bytes(), regs[1].to_be_bytes()];

    match order {
        ByteOrder::BigEndian => [h0[0], h0[1], h1[0], h1[1]],        // ABCD
        ByteOrder::LittleEndian => [h1[1], h1[0], h0[1], h0[0]],     // DCBA
        ByteOrder::BigEndianSwap => [h1[0], h1[1], h0[0], h0[1]],    // CDAB
        ByteOrder::LittleEndianSwap => [h0[1], h0[0], h1[1], h1[0]], // BADC
    }
}

/// Value bytes (MSB first) of a 64-bit value held in 4 registers.
#[inline]
pub fn regs_to_bytes_8(regs: &[u16; 4], order: ByteOrder) -> [u8; 8] {
    let [h0, h1, h2, h3] = [
        regs[0].to_be_bytes(),
        regs[1].to_be_bytes(),
        regs[2].to_be_bytes(),
        regs[3].to_be_bytes(),
    ];

    match order {
        ByteOrder::BigEndian => [
            h0[0], h0[1], h1[0], h1[1], h2[0], h2[1], h3[0], h3[1], // ABCDEFGH
        ],
        ByteOrder::LittleEndian => [
            h3[1], h3[0], h2[1], h2[0], h1[1], h1[0], h0[1], h0[0], // HGFEDCBA
        ],
        ByteOrder::BigEndianSwap => [
            h3[0], h3[1], h2[0], h2[1], h1[0], h1[1], h0[0], h0[1], // GHEFCDAB
        ],
        ByteOrder::LittleEndianSwap => [
            h0[1], h0[0], h1[1], h1[0], h2[1], h2[0], h3[1], h3[0], // BADCFEHG
        ],
    }
}

// ============================================================================
// Wire Buffer Conversions
// ============================================================================

#[inline]
fn word(buf: &[u8], index: usize) -> u16 {
    u16::from_be_bytes([buf[index * 2], buf[index * 2 + 1]])
}

/// Value bytes of a 2-byte wire buffer.
#[inline]
pub fn wire_to_bytes_2(buf: &[u8; 2], order: ByteOrder) -> [u8; 2] {
    reg_to_bytes_2(word(buf, 0), order)
}

/// Value bytes of a 4-byte wire buffer.
#[inline]
pub fn wire_to_bytes_4(buf: &[u8; 4], order: ByteOrder) -> [u8; 4] {
    regs_to_bytes_4(&[word(buf, 0), word(buf, 1)], order)
}

/// Value bytes of an 8-byte wire buffer.
#[inline]
pub fn wire_to_bytes_8(buf: &[u8; 8], order: ByteOrder) -> [u8; 8] {
    regs_to_bytes_8(&[word(buf, 0), word(buf, 1), word(buf, 2), word(buf, 3)], order)
}
