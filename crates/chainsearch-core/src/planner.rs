//! Block range planner: splits `[from, to]` into contiguous batches.

use crate::types::BlockRange;

/// Divide `from..=to` into `batch_count` contiguous, non-overlapping ranges.
///
/// Every range holds `step = blocks / batch_count` blocks except the last,
/// whose end is pinned to `to` so integer division never truncates coverage.
/// When the span holds fewer blocks than `batch_count`, one single-block
/// range per block is returned instead.
///
/// Returns an empty plan if `to < from`; a `batch_count` of zero is treated
/// as one.
pub fn plan(from: u64, to: u64, batch_count: usize) -> Vec<BlockRange> {
    if to < from {
        return Vec::new();
    }
    let blocks = (to - from).saturating_add(1);
    let count = (batch_count.max(1) as u64).min(blocks);
    let step = blocks / count;

    (0..count)
        .map(|i| {
            let start = from + i * step;
            let end = if i + 1 == count { to } else { start + step - 1 };
            BlockRange::new(start, end).unwrap_or_else(|_| BlockRange::single(start))
        })
        .collect()
}
