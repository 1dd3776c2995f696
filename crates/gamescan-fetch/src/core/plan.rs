use crate::data::ChunkRange;
use crate::error::{Error, Result};

/// Number of chunks a download of `total_size` bytes is split into.
pub fn chunk_count(total_size: u64, chunk_size_limit: u64) -> u64 {
    if total_size <= chunk_size_limit {
        1
    } else {
        total_size.div_ceil(chunk_size_limit)
    }
}

/// Splits `[0, total_size)` into contiguous ranges of at most `chunk_size_limit` bytes.
///
/// Without range support the whole resource is one range. An empty resource
/// has an empty plan.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when `chunk_size_limit` is zero.
///
/// # Examples
///
/// ```
/// use gamescan_fetch::plan_chunks;
///
/// let ranges = plan_chunks(25, 10, true).unwrap();
/// let bounds: Vec<_> = ranges.iter().map(|r| (r.start, r.end)).collect();
/// assert_eq!(bounds, [(0, 9), (10, 19), (20, 24)]);
/// ```
pub fn plan_chunks(total_size: u64, chunk_size_limit: u64, range_support: bool) -> Result<Vec<ChunkRange>> {
    if chunk_size_limit == 0 {
        return Err(Error::InvalidArgument("chunk size limit must be greater than zero".into()));
    }
    if total_size == 0 {
        return Ok(Vec::new());
    }

    let chunk_size = if range_support { chunk_size_limit.min(total_size) } else { total_size };
    let count = if range_support { chunk_count(total_size, chunk_size_limit) } else { 1 };

    let ranges = (0..count)
        .map(|index| {
            let start = index * chunk_size;
            let end = (start + chunk_size - 1).min(total_size - 1);
            ChunkRange {
                index: index as usize,
                start,
                end,
            }
        })
        .collect();
    Ok(ranges)
}
