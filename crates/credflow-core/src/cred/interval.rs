//! Time intervals and per-interval minting.

use serde::{Deserialize, Serialize};

use crate::config::MAX_INTERVALS;
use crate::errors::{CredError, CredResult};
use crate::graph::multigraph::Graph;
use crate::graph::weighted::WeightedGraph;

pub const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Half-open time window `[start_time_ms, end_time_ms)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub start_time_ms: i64,
    pub end_time_ms: i64,
}

impl Interval {
    pub fn new(start_time_ms: i64, end_time_ms: i64) -> CredResult<Self> {
        let interval = Self {
            start_time_ms,
            end_time_ms,
        };
        interval.validate()?;
        Ok(interval)
    }

    pub fn validate(&self) -> CredResult<()> {
        if self.start_time_ms >= self.end_time_ms {
            return Err(CredError::InvalidInterval {
                start_ms: self.start_time_ms,
                end_ms: self.end_time_ms,
            });
        }
        Ok(())
    }

    pub fn contains(&self, timestamp_ms: i64) -> bool {
        self.start_time_ms <= timestamp_ms && timestamp_ms < self.end_time_ms
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_time_ms.saturating_sub(self.start_time_ms)
    }
}

/// Checks that every interval is non-empty and that the sequence is strictly
/// ascending without overlap. Gaps between intervals are allowed.
pub fn validate_intervals(intervals: &[Interval]) -> CredResult<()> {
    for (index, interval) in intervals.iter().enumerate() {
        interval.validate()?;
        if index > 0 {
            let previous = intervals[index - 1];
            if interval.start_time_ms < previous.end_time_ms {
                return Err(CredError::InputOrdering {
                    index,
                    start_ms: interval.start_time_ms,
                    previous_end_ms: previous.end_time_ms,
                });
            }
        }
    }
    Ok(())
}

/// Contiguous intervals of `width_ms`, aligned to multiples of the width since
/// the Unix epoch, covering every instant in `[start_ms, end_ms]`. Fails when
/// the last interval would end past `i64::MAX` or when more than
/// [`MAX_INTERVALS`] intervals would be produced.
pub fn partition(start_ms: i64, end_ms: i64, width_ms: i64) -> CredResult<Vec<Interval>> {
    if width_ms <= 0 {
        return Err(CredError::InvalidConfig(format!(
            "interval width must be positive, got {width_ms}"
        )));
    }
    if start_ms > end_ms {
        return Err(CredError::InvalidInterval { start_ms, end_ms });
    }
    let width = i128::from(width_ms);
    let first = i128::from(start_ms).div_euclid(width) * width;
    let count = (i128::from(end_ms) - first) / width + 1;
    if count > MAX_INTERVALS as i128 {
        return Err(CredError::InvalidConfig(format!(
            "partition of [{start_ms}, {end_ms}] by {width_ms} exceeds {MAX_INTERVALS} intervals"
        )));
    }
    let last_end = first + count * width;
    // Both outer bounds fit in i64, so the arithmetic below cannot overflow.
    let (Ok(first), Ok(_)) = (i64::try_from(first), i64::try_from(last_end)) else {
        return Err(CredError::InvalidInterval { start_ms, end_ms });
    };
    let intervals: Vec<Interval> = (0..count as i64)
        .map(|i| first + i * width_ms)
        .map(|start| Interval {
            start_time_ms: start,
            end_time_ms: start + width_ms,
        })
        .collect();
    Ok(intervals)
}

/// Partition covering the timestamps of every node in `graph`. Empty when no
/// node carries a timestamp.
pub fn graph_intervals(graph: &Graph, width_ms: i64) -> CredResult<Vec<Interval>> {
    let mut timestamps = graph.nodes(None).filter_map(|node| node.timestamp_ms);
    let Some(first) = timestamps.next() else {
        return Ok(Vec::new());
    };
    let (min, max) = timestamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));
    partition(min, max, width_ms)
}

/// Cred minted by each node during `interval`, aligned with the node order.
pub fn mint_vector(graph: &WeightedGraph, interval: &Interval) -> Vec<f64> {
    graph
        .mint_weights()
        .iter()
        .zip(graph.timestamps())
        .map(|(&weight, timestamp)| match timestamp {
            Some(ts) if interval.contains(*ts) => weight,
            _ => 0.0,
        })
        .collect()
}
