//! Layout packer: side-by-side columns for overlapping blocks on one day.
//!
//! Greedy interval-graph coloring. Blocks are visited by start time (longer first
//! on ties) and take the lowest column not held by a still-running block. A second
//! pass sizes each block by its full overlap neighbourhood, so a block's column
//! count is `1 + max(column of itself or anything it overlaps)`.
//!
//! Presentation only: the store is never mutated here.

use crate::block::{DayFilter, ScheduledBlock};
use crate::slot_store::SlotStore;
use crate::time::MinuteSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub column: usize,
    /// Columns the block's overlap group needs.
    pub columns: usize,
}

impl Placement {
    pub fn width_fraction(&self) -> f64 {
        1.0 / self.columns as f64
    }

    /// Left edge within a day cell whose left edge is `base_offset`, in day-widths.
    pub fn left_fraction(&self, base_offset: f64) -> f64 {
        base_offset + self.column as f64 / self.columns as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutBlock<'a> {
    pub block: &'a ScheduledBlock,
    pub placement: Placement,
}

/// Pack spans of a single day. Placements are returned in input order.
pub fn pack(spans: &[MinuteSpan]) -> Vec<Placement> {
    let n = spans.len();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        spans[a]
            .start
            .cmp(&spans[b].start)
            .then_with(|| spans[b].len().cmp(&spans[a].len()))
            .then_with(|| a.cmp(&b))
    });

    let mut column = vec![0usize; n];
    // (column, end) of blocks still running at the current start.
    let mut active: Vec<(usize, u32)> = Vec::new();

    for &i in &order {
        let start = spans[i].start;
        active.retain(|&(_, end)| end > start);

        let mut c = 0;
        while active.iter().any(|&(used, _)| used == c) {
            c += 1;
        }
        column[i] = c;
        active.push((c, spans[i].end));
    }

    (0..n)
        .map(|i| {
            let widest = (0..n)
                .filter(|&j| j == i || spans[i].overlaps(&spans[j]))
                .map(|j| column[j])
                .max()
                .unwrap_or(0);
            Placement {
                column: column[i],
                columns: widest + 1,
            }
        })
        .collect()
}

/// Lay out blocks that share one day.
pub fn layout_day<'a>(blocks: &[&'a ScheduledBlock]) -> Vec<LaidOutBlock<'a>> {
    let spans: Vec<MinuteSpan> = blocks.iter().map(|b| b.span()).collect();
    blocks
        .iter()
        .zip(pack(&spans))
        .map(|(&block, placement)| LaidOutBlock { block, placement })
        .collect()
}

/// Lay out one screen's blocks, each day packed independently.
pub fn layout_days<'a>(
    store: &'a SlotStore,
    screen_id: &str,
    days: &[DayFilter],
) -> Vec<(DayFilter, Vec<LaidOutBlock<'a>>)> {
    days.iter()
        .map(|day| (*day, layout_day(&store.blocks_on(screen_id, day))))
        .collect()
}
