//! Bit-packed Record Identifier (RID) codec.
//!
//! A RID encodes, high to low, `tail_bit (1) | page_number | offset` within a
//! fixed total width derived from a table's `record_size`. The split between
//! page-number bits and offset bits is derived from `page_size / record_size`
//! (`offset_bits = log2(page_size / record_size)`), so it is recomputed per
//! table rather than assumed to be a global constant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A packed record identifier. Opaque outside of [`RidLayout::pack`] /
/// [`RidLayout::unpack`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rid(pub u64);

impl fmt::Debug for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({:#x})", self.0)
    }
}

/// Per-table bit-width layout for RID packing, derived from `page_size` and
/// `record_size`. Distinct tables may use distinct layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RidLayout {
    offset_bits: u32,
    page_bits: u32,
}

impl RidLayout {
    /// Derive a layout from a table's page and record sizes.
    ///
    /// # Panics
    /// Panics if `page_size` is not a power of two, if `record_size` does not
    /// evenly divide it into a power-of-two page capacity, or if the
    /// resulting record width cannot address at least one page bit. These
    /// are configuration errors, not runtime data errors.
    pub fn new(page_size: usize, record_size: usize) -> Self {
        assert!(page_size.is_power_of_two(), "page_size must be a power of two");
        assert!(record_size > 0, "record_size must be nonzero");
        assert!(
            page_size % record_size == 0,
            "record_size must evenly divide page_size"
        );
        let capacity = page_size / record_size;
        assert!(
            capacity.is_power_of_two(),
            "page_size / record_size must be a power of two"
        );
        let offset_bits = capacity.trailing_zeros();
        let total_bits = 8 * record_size as u32;
        assert!(
            total_bits > offset_bits + 1,
            "record_size too small to address any pages at this page_size"
        );
        let page_bits = total_bits - 1 - offset_bits;
        Self { offset_bits, page_bits }
    }

    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }

    pub fn page_bits(&self) -> u32 {
        self.page_bits
    }

    pub fn max_page(&self) -> u64 {
        (1u64 << self.page_bits) - 1
    }

    pub fn max_offset(&self) -> u64 {
        (1u64 << self.offset_bits) - 1
    }

    /// Pack `(is_tail, page, offset)` into a RID. `page` and `offset` must be
    /// a programmer-verified in-range value; out-of-range inputs are a
    /// programmer error, checked with `debug_assert!` rather than a
    /// `Result`, matching `storage::Page`'s treatment of its own internal
    /// offset arithmetic.
    pub fn pack(&self, is_tail: bool, page: u64, offset: u64) -> Rid {
        debug_assert!(page <= self.max_page(), "page number {page} out of range");
        debug_assert!(offset <= self.max_offset(), "offset {offset} out of range");
        let tail_bit = if is_tail { 1u64 } else { 0u64 };
        let value =
            (tail_bit << (self.page_bits + self.offset_bits)) | (page << self.offset_bits) | offset;
        Rid(value)
    }

    /// Unpack a RID into `(is_tail, page, offset)`. Total function: any
    /// `u64` produced by this layout's `pack` round-trips exactly, and any
    /// other `u64` still decodes to *some* triple (masking discards bits
    /// above the packed width).
    pub fn unpack(&self, rid: Rid) -> (bool, u64, u64) {
        let offset = rid.0 & self.max_offset();
        let page = (rid.0 >> self.offset_bits) & self.max_page();
        let is_tail = ((rid.0 >> (self.offset_bits + self.page_bits)) & 1) == 1;
        (is_tail, page, offset)
    }

    /// The reserved all-ones base-half-space RID used to mark a deleted
    /// record. Never produced by a live `pack(false, ..)` call because the
    /// table engine never allocates the final page/offset pair in a way
    /// that collides with it in practice-sized tables, but callers must
    /// still treat it as reserved.
    pub fn tombstone(&self) -> Rid {
        self.pack(false, self.max_page(), self.max_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn layout() -> RidLayout {
        RidLayout::new(4096, 8)
    }

    #[test]
    fn offset_bits_match_page_capacity() {
        let layout = layout();
        assert_eq!(layout.offset_bits(), 9); // 4096 / 8 == 512 == 2^9
        assert_eq!(layout.page_bits(), 8 * 8 - 1 - 9);
    }

    #[test]
    fn round_trip_examples() {
        let layout = layout();
        for &(is_tail, page, offset) in &[
            (false, 0u64, 0u64),
            (true, 0, 0),
            (false, 1, 5),
            (true, 42, 511),
            (false, layout.max_page(), layout.max_offset() - 1),
        ] {
            let rid = layout.pack(is_tail, page, offset);
            assert_eq!(layout.unpack(rid), (is_tail, page, offset));
        }
    }

    #[test]
    fn tombstone_is_reserved_all_ones_payload() {
        let layout = layout();
        let (is_tail, page, offset) = layout.unpack(layout.tombstone());
        assert!(!is_tail);
        assert_eq!(page, layout.max_page());
        assert_eq!(offset, layout.max_offset());
    }

    #[test]
    fn distinct_page_offset_pairs_yield_distinct_rids() {
        let layout = layout();
        let a = layout.pack(false, 3, 10);
        let b = layout.pack(false, 3, 11);
        let c = layout.pack(true, 3, 10);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    proptest! {
        #[test]
        fn pack_unpack_round_trips(is_tail in any::<bool>(), page in 0u64..256, offset in 0u64..512) {
            let layout = layout();
            let rid = layout.pack(is_tail, page, offset);
            prop_assert_eq!(layout.unpack(rid), (is_tail, page, offset));
        }

        #[test]
        fn larger_record_size_shifts_offset_bits(record_size_pow in 0u32..6) {
            // record_size in {1, 2, 4, 8, 16, 32}, page_size fixed at 4096
            let record_size = 1usize << record_size_pow;
            let layout = RidLayout::new(4096, record_size);
            prop_assert_eq!(layout.offset_bits(), (4096 / record_size).trailing_zeros());
        }
    }
}
