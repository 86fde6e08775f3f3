//! # Read Plan
//!
//! Coalesces the catalog's register spans into as few FC03 requests as the
//! per-request cap allows.
//!
//! Spans are sorted by address and merged greedily: the current block keeps
//! growing while the next span still ends within `max_registers` of the
//! block's start. Gap words between spans are read and ignored, trading a
//! little bandwidth for fewer round trips.
//!
//! ```text
//! spans:   [56..58] [98..100] ... [172..174]   [194..196] ... [286..288]
//! blocks:  |---------- 56 + 118 -----------|   |------- 194 + 94 ------|
//! ```

use crate::catalog::{RegisterCatalog, RegisterDescriptor};
use crate::device_limits::DeviceLimits;

/// One contiguous FC03 request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadBlock {
    pub start: u16,
    pub count: u16,
}

impl ReadBlock {
    /// One past the last address read.
    #[inline]
    pub fn end(&self) -> usize {
        self.start as usize + self.count as usize
    }

    /// True when `address..address + width` lies inside this block.
    #[inline]
    pub fn contains(&self, address: u16, width: u16) -> bool {
        address >= self.start && address as usize + width as usize <= self.end()
    }
}

/// Ordered, non-overlapping blocks covering every descriptor exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadPlan {
    blocks: Vec<ReadBlock>,
}

impl ReadPlan {
    /// Build a plan for a set of descriptors.
    ///
    /// A cap smaller than a descriptor's width is raised to that width for
    /// the block holding it alone.
    pub fn build<'a, I>(descriptors: I, max_registers: u16) -> Self
    where
        I: IntoIterator<Item = &'a RegisterDescriptor>,
    {
        Self::from_spans(
            descriptors.into_iter().map(|d| (d.address, d.width())),
            max_registers,
        )
    }

    /// Plan for a whole catalog under a device's read cap.
    pub fn for_catalog(catalog: &RegisterCatalog, limits: &DeviceLimits) -> Self {
        Self::build(catalog.all(), limits.max_read_registers)
    }

    /// Build from raw `(address, width)` spans.
    pub fn from_spans<I>(spans: I, max_registers: u16) -> Self
    where
        I: IntoIterator<Item = (u16, u16)>,
    {
        let max = max_registers.max(1) as usize;

        let mut spans: Vec<(usize, usize)> = spans
            .into_iter()
            .map(|(address, width)| (address as usize, address as usize + width as usize))
            .collect();
        spans.sort_unstable();
        spans.dedup();

        let mut blocks = Vec::new();
        let mut current: Option<(usize, usize)> = None;

        for (start, end) in spans {
            current = match current {
                Some((block_start, block_end)) if end - block_start <= max => {
                    Some((block_start, block_end.max(end)))
                }
                Some(done) => {
                    blocks.push(Self::block(done));
                    Some((start, end))
                }
                None => Some((start, end)),
            };
        }
        if let Some(done) = current {
            blocks.push(Self::block(done));
        }

        Self { blocks }
    }

    #[inline]
    fn block((start, end): (usize, usize)) -> ReadBlock {
        ReadBlock {
            start: start as u16,
            count: (end - start) as u16,
        }
    }

    /// Blocks in ascending address order.
    pub fn blocks(&self) -> &[ReadBlock] {
        &self.blocks
    }

    /// The block containing `address..address + width`.
    pub fn block_for(&self, address: u16, width: u16) -> Option<&ReadBlock> {
        self.blocks.iter().find(|b| b.contains(address, width))
    }

    /// Words read per cycle, gaps included.
    pub fn total_registers(&self) -> usize {
        self.blocks.iter().map(|b| b.count as usize).sum()
    }

    /// One past the highest address read; the register image is sized to this.
    pub fn end_address(&self) -> usize {
        self.blocks.iter().map(ReadBlock::end).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn block(start: u16, count: u16) -> ReadBlock {
        ReadBlock { start, count }
    }

    #[test]
    fn test_plenticore_plan() {
        let plan = ReadPlan::for_catalog(&RegisterCatalog::plenticore(), &DeviceLimits::default());
        assert_eq!(
            plan.blocks(),
            &[
                block(56, 118),
                block(194, 94),
                block(320, 8),
                block(514, 1),
                block(1024, 56),
            ]
        );
        assert_eq!(plan.end_address(), 1080);
        assert_eq!(plan.total_registers(), 277);
    }

    #[test]
    fn test_plan_covers_every_descriptor_once() {
        let catalog = RegisterCatalog::plenticore();
        let plan = ReadPlan::for_catalog(&catalog, &DeviceLimits::conservative());
        for d in catalog.all() {
            let holders = plan
                .blocks()
                .iter()
                .filter(|b| b.contains(d.address, d.width()))
                .count();
            assert_eq!(holders, 1, "{} covered {} times", d.name, holders);
        }
        assert!(plan.blocks().iter().all(|b| b.count <= 50));
    }

    #[test]
    fn test_small_cap_raised_to_width() {
        let plan = ReadPlan::from_spans([(10, 2), (12, 1)], 1);
        assert_eq!(plan.blocks(), &[block(10, 2), block(12, 1)]);
    }

    #[test]
    fn test_adjacent_spans_merge() {
        let plan = ReadPlan::from_spans([(0, 2), (2, 2), (4, 1)], 125);
        assert_eq!(plan.blocks(), &[block(0, 5)]);
    }

    #[test]
    fn test_exact_boundary() {
        // 0..125 fits, 0..126 does not
        let plan = ReadPlan::from_spans([(0, 1), (123, 2)], 125);
        assert_eq!(plan.len(), 1);
        let plan = ReadPlan::from_spans([(0, 1), (124, 2)], 125);
        assert_eq!(plan.blocks(), &[block(0, 1), block(124, 2)]);
    }

    #[test]
    fn test_block_for() {
        let plan = ReadPlan::from_spans([(56, 2), (98, 2), (514, 1)], 125);
        assert_eq!(plan.block_for(98, 2), Some(&block(56, 44)));
        assert_eq!(plan.block_for(514, 1), Some(&block(514, 1)));
        assert_eq!(plan.block_for(515, 1), None);
    }

    #[test]
    fn test_empty_plan() {
        let plan = ReadPlan::from_spans(std::iter::empty(), 125);
        assert!(plan.is_empty());
        assert_eq!(plan.end_address(), 0);
    }

    fn spans_strategy() -> impl Strategy<Value = Vec<(u16, u16)>> {
        prop::collection::vec((0u16..200, 1u16..=2), 0..60).prop_map(|steps| {
            let mut address = 0u16;
            steps
                .into_iter()
                .map(|(gap, width)| {
                    let span = (address + gap, width);
                    address += gap + width;
                    span
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_plan_covers_and_bounds(spans in spans_strategy(), max in 2u16..=125) {
            let plan = ReadPlan::from_spans(spans.iter().copied(), max);

            for &(address, width) in &spans {
                let holders = plan.blocks().iter().filter(|b| b.contains(address, width)).count();
                prop_assert_eq!(holders, 1);
            }
            for b in plan.blocks() {
                prop_assert!(b.count <= max);
            }
            for pair in plan.blocks().windows(2) {
                prop_assert!(pair[0].end() <= pair[1].start as usize);
            }
        }
    }
}
