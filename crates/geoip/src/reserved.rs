//! Reserved IPv4 blocks.

use std::net::Ipv4Addr;

use config::ReservedBlock;

/// An IPv4 block given as base address and netmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedRange {
    base: u32,
    mask: u32,
}

impl ReservedRange {
    /// A block from its base address and netmask.
    pub const fn new(base: Ipv4Addr, mask: Ipv4Addr) -> Self {
        Self {
            base: base.to_bits(),
            mask: mask.to_bits(),
        }
    }

    /// A block from its base address and prefix length. Lengths above 32 are treated as 32.
    pub const fn from_prefix(base: Ipv4Addr, prefix_len: u8) -> Self {
        let mask = match prefix_len {
            0 => 0,
            len if len >= 32 => u32::MAX,
            len => u32::MAX << (32 - len as u32),
        };

        Self {
            base: base.to_bits(),
            mask,
        }
    }

    /// Whether `addr` falls inside the block.
    pub const fn contains(&self, addr: u32) -> bool {
        addr & self.mask == self.base & self.mask
    }

    /// Base address of the block.
    pub const fn base(&self) -> Ipv4Addr {
        Ipv4Addr::from_bits(self.base)
    }

    /// Netmask of the block.
    pub const fn mask(&self) -> Ipv4Addr {
        Ipv4Addr::from_bits(self.mask)
    }
}

impl From<ReservedBlock> for ReservedRange {
    fn from(block: ReservedBlock) -> Self {
        Self::from_prefix(block.network, block.prefix_len)
    }
}

// IANA IPv4 special-purpose address registry.
const SPECIAL_PURPOSE: [ReservedRange; 16] = [
    ReservedRange::from_prefix(Ipv4Addr::new(0, 0, 0, 0), 8),
    ReservedRange::from_prefix(Ipv4Addr::new(10, 0, 0, 0), 8),
    ReservedRange::from_prefix(Ipv4Addr::new(100, 64, 0, 0), 10),
    ReservedRange::from_prefix(Ipv4Addr::new(127, 0, 0, 0), 8),
    ReservedRange::from_prefix(Ipv4Addr::new(169, 254, 0, 0), 16),
    ReservedRange::from_prefix(Ipv4Addr::new(172, 16, 0, 0), 12),
    ReservedRange::from_prefix(Ipv4Addr::new(192, 0, 0, 0), 29),
    ReservedRange::from_prefix(Ipv4Addr::new(192, 0, 2, 0), 24),
    ReservedRange::from_prefix(Ipv4Addr::new(192, 88, 99, 0), 24),
    ReservedRange::from_prefix(Ipv4Addr::new(192, 168, 0, 0), 16),
    ReservedRange::from_prefix(Ipv4Addr::new(198, 18, 0, 0), 15),
    ReservedRange::from_prefix(Ipv4Addr::new(198, 51, 100, 0), 24),
    ReservedRange::from_prefix(Ipv4Addr::new(203, 0, 113, 0), 24),
    ReservedRange::from_prefix(Ipv4Addr::new(224, 0, 0, 0), 4),
    ReservedRange::from_prefix(Ipv4Addr::new(240, 0, 0, 0), 4),
    ReservedRange::from_prefix(Ipv4Addr::new(255, 255, 255, 255), 32),
];

/// The set of blocks answered with the reserved sentinel.
///
/// Membership is a linear scan; the set is small and fixed after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedRanges {
    ranges: Vec<ReservedRange>,
}

impl ReservedRanges {
    /// A set from explicit ranges.
    pub fn new(ranges: impl IntoIterator<Item = ReservedRange>) -> Self {
        Self {
            ranges: ranges.into_iter().collect(),
        }
    }

    /// No reserved blocks: every address goes to the range table.
    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    /// The configured blocks, or the special-purpose registry when none are configured.
    pub fn from_config(blocks: Option<&[ReservedBlock]>) -> Self {
        match blocks {
            Some(blocks) => Self::new(blocks.iter().copied().map(ReservedRange::from)),
            None => Self::default(),
        }
    }

    /// The first block containing `addr`.
    pub fn find(&self, addr: u32) -> Option<&ReservedRange> {
        self.ranges.iter().find(|range| range.contains(addr))
    }

    /// Whether any block contains `addr`.
    pub fn contains(&self, addr: u32) -> bool {
        self.find(addr).is_some()
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether there are no blocks.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl Default for ReservedRanges {
    fn default() -> Self {
        Self::new(SPECIAL_PURPOSE)
    }
}
