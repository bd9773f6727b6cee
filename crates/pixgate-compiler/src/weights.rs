//! Weighted-action normalization
//!
//! Declared weights are arbitrary non-negative integers. Compilation scales
//! them onto a fixed total ([`WEIGHT_SCALE`]) with the largest-remainder
//! method so rounding never gains or loses a bucket, then lays the result
//! out as a cumulative array sorted by gateway name. Sorting by name keeps
//! sticky buckets stable across recompiles of the same weights.

use crate::error::{CompileErrorKind, CompileIssue};
use pixgate_core::{WeightedEntry, WEIGHT_SCALE};
use std::collections::{BTreeMap, HashSet};

/// Normalize declared weights into a cumulative distribution.
///
/// Returns the entries (name-ascending, cumulative) and the total, or `None`
/// with issues recorded.
pub(crate) fn normalize_weights(
    weights: &BTreeMap<String, i64>,
    known_gateways: &HashSet<String>,
    path: &str,
    issues: &mut Vec<CompileIssue>,
) -> Option<(Vec<WeightedEntry>, u32)> {
    if weights.is_empty() {
        issues.push(CompileIssue::new(
            path,
            CompileErrorKind::WeightsSumZero,
            "'weights' must contain at least one entry",
        ));
        return None;
    }

    let mut ok = true;
    for (gateway, weight) in weights {
        if !known_gateways.contains(gateway) {
            issues.push(CompileIssue::new(
                format!("{path}.{gateway}"),
                CompileErrorKind::UnknownGateway,
                format!("unknown gateway: {gateway:?}"),
            ));
            ok = false;
        }
        if *weight < 0 {
            issues.push(CompileIssue::new(
                format!("{path}.{gateway}"),
                CompileErrorKind::BadType,
                format!("weight must be non-negative, got {weight}"),
            ));
            ok = false;
        }
    }
    if !ok {
        return None;
    }

    // Zero-weight entries are dropped; they can never win a bucket.
    let positive: Vec<(&str, i64)> = weights
        .iter()
        .filter(|(_, w)| **w > 0)
        .map(|(g, w)| (g.as_str(), *w))
        .collect();
    let sum: i128 = positive.iter().map(|(_, w)| *w as i128).sum();
    if sum == 0 {
        issues.push(CompileIssue::new(
            path,
            CompileErrorKind::WeightsSumZero,
            "at least one weight must be > 0",
        ));
        return None;
    }

    // Largest-remainder scaling. BTreeMap iteration already gives
    // name-ascending order, which is also the remainder tie-break order.
    let scale = WEIGHT_SCALE as i128;
    let mut scaled: Vec<(usize, u32, i128)> = positive
        .iter()
        .enumerate()
        .map(|(idx, (_, w))| {
            let numerator = *w as i128 * scale;
            ((idx), (numerator / sum) as u32, numerator % sum)
        })
        .collect();
    let assigned: u32 = scaled.iter().map(|(_, floor, _)| *floor).sum();
    let mut leftover = WEIGHT_SCALE - assigned;

    // Hand out the remainder units, biggest fractional part first; ties go
    // to the earlier (name-ascending) entry because the sort is stable.
    let mut by_remainder: Vec<usize> = (0..scaled.len()).collect();
    by_remainder.sort_by(|a, b| scaled[*b].2.cmp(&scaled[*a].2));
    for idx in by_remainder {
        if leftover == 0 {
            break;
        }
        scaled[idx].1 += 1;
        leftover -= 1;
    }
    debug_assert_eq!(leftover, 0);

    let mut entries = Vec::with_capacity(scaled.len());
    let mut cumulative = 0u32;
    for (idx, normalized, _) in &scaled {
        cumulative += normalized;
        entries.push(WeightedEntry {
            gateway: positive[*idx].0.to_string(),
            cumulative,
        });
    }
    debug_assert_eq!(cumulative, WEIGHT_SCALE);

    Some((entries, WEIGHT_SCALE))
}
