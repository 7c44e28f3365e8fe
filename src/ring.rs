//! Pre-trigger ring region and its linearization.
//!
//! While the trigger search runs, samples wrap around a fixed region at the
//! front of the sample buffer. Once the trigger point is known the region is
//! rotated into chronological order, oldest retained sample first, most
//! recent in the last pre-trigger slot.

use crate::config;

/// Write cursor over a caller-owned ring region.
///
/// The ring never owns the storage; the sampler lends it the pre-trigger
/// slice of the sample buffer so buffer ownership stays in one place.
#[derive(Debug, Clone, Copy)]
pub struct PreTriggerRing {
    cursor: usize,
    wrapped: bool,
}

impl PreTriggerRing {
    pub const fn new() -> Self {
        Self {
            cursor: 0,
            wrapped: false,
        }
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.wrapped = false;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether the write cursor has wrapped at least once this acquisition.
    pub fn wrap_occurred(&self) -> bool {
        self.wrapped
    }

    pub fn write(&mut self, region: &mut [u16], sample: u16) {
        region[self.cursor] = sample;
        self.cursor += 1;
        if self.cursor == region.len() {
            self.cursor = 0;
            self.wrapped = true;
        }
    }

    /// Rotate the region into chronological order through `scratch`.
    ///
    /// After alignment the most recent sample sits in the last slot. Slots
    /// that never held data (no wrap yet) land at the front and are filled
    /// with the invalid-sample sentinel so rendering skips them.
    ///
    /// `scratch` must be at least as long as `region`; at most one ring
    /// capacity of scratch is ever used.
    pub fn align(&mut self, region: &mut [u16], scratch: &mut [u16]) {
        let len = region.len();
        assert!(scratch.len() >= len);
        let scratch = &mut scratch[..len];

        // chronological order: region[cursor..] (oldest) then region[..cursor]
        let split = len - self.cursor;
        scratch[..split].copy_from_slice(&region[self.cursor..]);
        scratch[split..].copy_from_slice(&region[..self.cursor]);

        if !self.wrapped {
            // the tail of the pre-rotation ring never held data
            for slot in &mut scratch[..split] {
                *slot = config::adc::INVALID_SAMPLE;
            }
        }

        region.copy_from_slice(scratch);
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    fn run_writes(region_len: usize, writes: usize) -> (PreTriggerRing, Vec<u16>) {
        let mut region = vec![0u16; region_len];
        let mut ring = PreTriggerRing::new();
        for i in 0..writes {
            ring.write(&mut region, i as u16);
        }
        let mut scratch = vec![0u16; region_len];
        ring.align(&mut region, &mut scratch);
        (ring, region)
    }

    #[test]
    fn alignment_is_order_preserving_after_wrap() {
        // capacity 320, 500 writes = one full wrap
        let region_len = 320;
        let writes = 500;
        let (ring, region) = run_writes(region_len, writes);
        assert!(ring.wrap_occurred());
        // last 320 of the 500 writes, in chronological order, no invalid tail
        for (i, &s) in region.iter().enumerate() {
            assert_eq!(s, (writes - region_len + i) as u16);
            assert_ne!(s, config::adc::INVALID_SAMPLE);
        }
    }

    #[test]
    fn alignment_sentinel_fills_unwritten_tail() {
        let (ring, region) = run_writes(8, 5);
        assert!(!ring.wrap_occurred());
        assert_eq!(&region[..3], &[config::adc::INVALID_SAMPLE; 3]);
        assert_eq!(&region[3..], &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn alignment_with_multiple_wraps() {
        for writes in [8usize, 9, 16, 23, 100] {
            let (_, region) = run_writes(8, writes);
            for (i, &s) in region.iter().enumerate() {
                assert_eq!(s, (writes - 8 + i) as u16, "writes={}", writes);
            }
        }
    }

    #[test]
    fn exact_fill_needs_no_sentinel() {
        let (ring, region) = run_writes(8, 8);
        assert!(ring.wrap_occurred());
        assert_eq!(&region[..], &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn wrap_flag_set_on_first_wrap_only_once() {
        let mut region = [0u16; 4];
        let mut ring = PreTriggerRing::new();
        for i in 0..3 {
            ring.write(&mut region, i);
            assert!(!ring.wrap_occurred());
        }
        ring.write(&mut region, 3);
        assert!(ring.wrap_occurred());
    }
}
