//! Batch partitioning over a stably ordered roster.
//!
//! Batch `b` with page size `p` owns offsets `[(b-1)*p, b*p)`, truncated to
//! the roster size. For a fixed page size and roster order the slices are
//! contiguous and disjoint, so any number of batches can run concurrently
//! without touching the same provider.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("batch index must be >= 1, got {0}")]
    InvalidIndex(i64),

    #[error("page size must be >= 1, got {0}")]
    InvalidPageSize(i64),

    #[error("batch starts at offset {start} but roster has {roster_size} providers")]
    Exhausted { start: usize, roster_size: usize },
}

impl PartitionError {
    /// True when the batch lies past the end of the roster: no work left,
    /// as opposed to invalid input.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PartitionError::Exhausted { .. })
    }
}

/// The slice of the roster one invocation is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSpec {
    pub batch_index: usize,
    pub page_size: usize,
    pub start: usize,
    pub end: usize,
}

impl BatchSpec {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Map a roster size and batch index to the batch's offset range.
///
/// Indices are taken as `i64` so that zero and negative values coming from the
/// command line or environment are reported rather than wrapped.
pub fn slice(roster_size: usize, batch_index: i64, page_size: i64) -> Result<BatchSpec, PartitionError> {
    if batch_index < 1 {
        return Err(PartitionError::InvalidIndex(batch_index));
    }
    if page_size < 1 {
        return Err(PartitionError::InvalidPageSize(page_size));
    }
    let batch_index = batch_index as usize;
    let page_size = page_size as usize;

    let start = (batch_index - 1).saturating_mul(page_size);
    if start >= roster_size {
        return Err(PartitionError::Exhausted { start, roster_size });
    }
    let end = start.saturating_add(page_size).min(roster_size);

    Ok(BatchSpec {
        batch_index,
        page_size,
        start,
        end,
    })
}

/// Number of batches needed to cover the roster: `ceil(roster_size / page_size)`.
pub fn batch_count(roster_size: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    roster_size.div_ceil(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_batch() {
        let spec = slice(1000, 1, 200).unwrap();
        assert_eq!((spec.start, spec.end), (0, 200));
        assert_eq!(spec.len(), 200);
    }

    #[test]
    fn last_batch_truncated() {
        let spec = slice(450, 3, 200).unwrap();
        assert_eq!((spec.start, spec.end), (400, 450));
    }

    #[test]
    fn zero_and_negative_index_rejected() {
        assert_eq!(slice(100, 0, 10), Err(PartitionError::InvalidIndex(0)));
        assert_eq!(slice(100, -3, 10), Err(PartitionError::InvalidIndex(-3)));
    }

    #[test]
    fn non_positive_page_size_rejected() {
        assert_eq!(slice(100, 1, 0), Err(PartitionError::InvalidPageSize(0)));
        assert_eq!(slice(100, 1, -5), Err(PartitionError::InvalidPageSize(-5)));
    }

    #[test]
    fn past_end_is_exhausted_not_invalid() {
        let err = slice(400, 3, 200).unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err, PartitionError::Exhausted { start: 400, roster_size: 400 });
        assert!(!PartitionError::InvalidIndex(0).is_exhausted());
    }

    #[test]
    fn empty_roster_is_exhausted() {
        assert!(slice(0, 1, 200).unwrap_err().is_exhausted());
    }

    #[test]
    fn batches_cover_roster_without_overlap_or_gap() {
        for roster_size in [1usize, 2, 7, 19, 20, 21, 199, 200, 201, 1003] {
            for page_size in [1usize, 3, 20, 200, 5000] {
                let count = batch_count(roster_size, page_size);
                let mut covered = vec![0u8; roster_size];
                for b in 1..=count {
                    let spec = slice(roster_size, b as i64, page_size as i64).unwrap();
                    assert!(!spec.is_empty());
                    for slot in &mut covered[spec.start..spec.end] {
                        *slot += 1;
                    }
                }
                assert!(
                    covered.iter().all(|&n| n == 1),
                    "R={roster_size} P={page_size}: coverage {covered:?}"
                );
                assert!(slice(roster_size, count as i64 + 1, page_size as i64)
                    .unwrap_err()
                    .is_exhausted());
            }
        }
    }

    #[test]
    fn slice_is_deterministic() {
        assert_eq!(slice(777, 4, 50), slice(777, 4, 50));
    }
}
