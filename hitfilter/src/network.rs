use std::fmt;
use tracing::{debug, warn};

use crate::errors::{FilterError, FilterResult};

/// An IPv4 address as a plain 32-bit integer, ordered numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub u32);

impl Address {
    /// Parses a dotted quad leniently.
    ///
    /// Digits and dots are consumed until the first other byte; whatever has been
    /// accumulated by then is the address. Nothing is validated: `"10.0.0.1x"`
    /// reads as `10.0.0.1`, `"10.0"` as `10.0.0.0`, oversized octets wrap into
    /// their neighbours.
    pub fn parse_lenient(bytes: &[u8]) -> Address {
        let mut ip: u32 = 0;
        let mut octet: u32 = 0;
        let mut shift: u32 = 24;

        for &ch in bytes {
            match ch {
                b'.' => {
                    ip = ip.wrapping_add(octet.checked_shl(shift).unwrap_or(0));
                    octet = 0;
                    shift = shift.wrapping_sub(8);
                }
                b'0'..=b'9' => {
                    octet = octet.wrapping_mul(10).wrapping_add(u32::from(ch - b'0'));
                }
                _ => break,
            }
        }

        Address(ip.wrapping_add(octet))
    }
}

impl From<u32> for Address {
    fn from(value: u32) -> Self {
        Address(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ip = self.0;
        write!(
            f,
            "{}.{}.{}.{}",
            ip >> 24,
            (ip >> 16) & 0xFF,
            (ip >> 8) & 0xFF,
            ip & 0xFF
        )
    }
}

/// A CIDR-like block. `base_masked` is always `base & mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub base: Address,
    pub base_masked: Address,
    pub mask: Address,
}

impl Range {
    pub fn new(base: Address, prefix_len: u32) -> FilterResult<Self> {
        if prefix_len > 32 {
            return Err(FilterError::invalid_network(format!(
                "{}/{}: prefix length must be 0-32",
                base, prefix_len
            )));
        }
        let mask = u32::MAX.checked_shl(32 - prefix_len).unwrap_or(0);
        Ok(Self {
            base,
            base_masked: Address(base.0 & mask),
            mask: Address(mask),
        })
    }

    /// Parses `"A.B.C.D/N"`. The address part is read leniently, the prefix
    /// length strictly.
    pub fn parse(spec: &str) -> FilterResult<Self> {
        let (address, prefix) = spec.split_once('/').ok_or_else(|| {
            FilterError::invalid_network(format!("{}: expected A.B.C.D/N", spec))
        })?;

        // Anything after the last octet is dropped, as for hit addresses
        let base = Address::parse_lenient(address.as_bytes());

        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FilterError::invalid_network(format!(
                "{}: prefix length is not a number",
                spec
            )));
        }
        let prefix_len: u32 = prefix.parse().map_err(|_| {
            FilterError::invalid_network(format!("{}: prefix length must be 0-32", spec))
        })?;

        Self::new(base, prefix_len).map_err(|_| {
            FilterError::invalid_network(format!("{}: prefix length must be 0-32", spec))
        })
    }

    pub fn contains(&self, addr: Address) -> bool {
        addr.0 & self.mask.0 == self.base_masked.0
    }

    /// Highest address inside the block.
    pub fn last(&self) -> Address {
        Address(self.base_masked.0 | !self.mask.0)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.mask.0.count_ones())
    }
}

/// Sorted, immutable list of ranges shared read-only by every worker.
///
/// Lookup is a bisection keyed on `base`, which is only exact when the ranges
/// are pairwise disjoint. With overlapping blocks a lookup can report a miss
/// for an address that one of them does contain; it never reports a false hit.
/// [`RangeTable::build`] logs a warning when the precondition does not hold.
#[derive(Debug, Clone, Default)]
pub struct RangeTable {
    ranges: Vec<Range>,
}

impl RangeTable {
    /// Parses every spec and sorts the result ascending by base address.
    pub fn build<I, S>(specs: I) -> FilterResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ranges = specs
            .into_iter()
            .map(|spec| Range::parse(spec.as_ref().trim()))
            .collect::<FilterResult<Vec<_>>>()?;

        ranges.sort_by_key(|r| r.base);

        let table = Self { ranges };
        if !table.is_disjoint() {
            warn!("Configured networks overlap; range lookups may miss addresses");
        }
        debug!("Built range table with {} networks", table.len());

        Ok(table)
    }

    /// Binary search for a range containing `addr`.
    pub fn contains(&self, addr: Address) -> bool {
        let (mut lo, mut hi) = (0, self.ranges.len());

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let range = &self.ranges[mid];

            if range.contains(addr) {
                return true;
            } else if addr < range.base {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        false
    }

    /// Whether no two ranges share an address.
    pub fn is_disjoint(&self) -> bool {
        let mut spans: Vec<(u32, u32)> = self
            .ranges
            .iter()
            .map(|r| (r.base_masked.0, r.last().0))
            .collect();
        spans.sort_unstable();
        spans.windows(2).all(|w| w[0].1 < w[1].0)
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
