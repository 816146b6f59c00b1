use crate::error::{Error, Result};

/// Half-open `[start, stop)` range of item indices owned by one participant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartitionRange {
    pub start: u64,
    pub stop: u64,
}

impl PartitionRange {
    pub fn new(start: u64, stop: u64) -> Self {
        Self { start, stop }
    }

    pub fn len(&self) -> u64 {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.stop == self.start
    }

    /// Extends `stop` by `extras` items (unless this is the last participant)
    /// and clamps it to `total`.
    pub fn with_look_ahead(self, extras: u64, is_last: bool, total: u64) -> Self {
        let mut stop = self.stop;
        if !is_last {
            stop = stop.saturating_add(extras);
        }
        Self {
            start: self.start,
            stop: stop.min(total),
        }
    }
}

/// Computes the contiguous slice of `0..total` owned by `ordinal`.
///
/// Every participant gets either `ceil(total / group_size)` or one fewer items.
/// The first `total % group_size` ordinals take the larger width. The result
/// depends only on the arguments, so all participants agree on the layout
/// without communicating.
pub fn partition(ordinal: usize, group_size: usize, total: u64) -> Result<PartitionRange> {
    if group_size == 0 {
        return Err(Error::Config("group size must be positive".into()));
    }
    if ordinal >= group_size {
        return Err(Error::Config(format!(
            "ordinal {ordinal} is outside a group of {group_size}"
        )));
    }
    let pes = group_size as u64;
    if pes > total {
        return Err(Error::Config(format!(
            "group of {group_size} participants exceeds {total} items; run with at most {total} participants"
        )));
    }

    let id = ordinal as u64;
    let base = total.div_ceil(pes);
    let remainder = total % pes;

    let (start, width) = if remainder > 0 && id >= remainder {
        (remainder * base + (id - remainder) * (base - 1), base - 1)
    } else {
        (id * base, base)
    };

    Ok(PartitionRange::new(start, start + width))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(group_size: usize, total: u64) -> Vec<PartitionRange> {
        (0..group_size)
            .map(|id| partition(id, group_size, total).unwrap())
            .collect()
    }

    #[test]
    fn test_five_items_two_participants() {
        assert_eq!(layout(2, 5), vec![PartitionRange::new(0, 3), PartitionRange::new(3, 5)]);
    }

    #[test]
    fn test_six_items_four_participants() {
        let ranges = layout(4, 6);
        let widths: Vec<u64> = ranges.iter().map(PartitionRange::len).collect();
        let starts: Vec<u64> = ranges.iter().map(|r| r.start).collect();
        assert_eq!(widths, vec![2, 2, 1, 1]);
        assert_eq!(starts, vec![0, 2, 4, 5]);
    }

    #[test]
    fn test_even_split() {
        assert_eq!(
            layout(3, 12),
            vec![
                PartitionRange::new(0, 4),
                PartitionRange::new(4, 8),
                PartitionRange::new(8, 12),
            ]
        );
    }

    #[test]
    fn test_group_equal_to_total_gives_unit_ranges() {
        for (id, range) in layout(5, 5).into_iter().enumerate() {
            assert_eq!(range, PartitionRange::new(id as u64, id as u64 + 1));
        }
    }

    #[test]
    fn test_ranges_tile_and_balance() {
        for group_size in 1..=9usize {
            for total in group_size as u64..=60 {
                let ranges = layout(group_size, total);
                let floor = total / group_size as u64;
                let ceil = total.div_ceil(group_size as u64);
                let remainder = (total % group_size as u64) as usize;

                let mut cursor = 0;
                for (id, range) in ranges.iter().enumerate() {
                    assert_eq!(range.start, cursor, "gap or overlap at {id} ({group_size}, {total})");
                    assert!(range.len() == floor || range.len() == ceil);
                    if remainder > 0 {
                        let expected = if id < remainder { ceil } else { floor };
                        assert_eq!(range.len(), expected);
                    }
                    assert!(!range.is_empty());
                    cursor = range.stop;
                }
                assert_eq!(cursor, total);
            }
        }
    }

    #[test]
    fn test_partition_is_deterministic() {
        let first = partition(3, 7, 1_000_003).unwrap();
        for _ in 0..10 {
            assert_eq!(partition(3, 7, 1_000_003).unwrap(), first);
        }
    }

    #[test]
    fn test_large_totals_do_not_overflow() {
        let total = 3 * i32::MAX as u64 + 7;
        let last = partition(3, 4, total).unwrap();
        assert_eq!(last.stop, total);
    }

    #[test]
    fn test_more_participants_than_items_is_rejected() {
        assert!(matches!(partition(0, 4, 3), Err(Error::Config(_))));
        assert!(matches!(partition(0, 1, 0), Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_identity_is_rejected() {
        assert!(matches!(partition(0, 0, 10), Err(Error::Config(_))));
        assert!(matches!(partition(4, 4, 10), Err(Error::Config(_))));
    }

    #[test]
    fn test_look_ahead_is_clamped() {
        let range = partition(0, 2, 6).unwrap();
        assert_eq!(range.with_look_ahead(2, false, 6), PartitionRange::new(0, 5));
        assert_eq!(range.with_look_ahead(10, false, 6), PartitionRange::new(0, 6));

        let last = partition(1, 2, 6).unwrap();
        assert_eq!(last.with_look_ahead(2, true, 6), last);
    }
}
