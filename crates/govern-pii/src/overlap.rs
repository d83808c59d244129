//! # Overlap Resolution
//!
//! Reduces raw detector output to a non-overlapping, start-ordered set.
//!
//! Matches are sorted by `(start asc, priority desc, length desc, category
//! rank desc)` and swept left to right; a match is kept only if it does not
//! intersect any match already kept. Because kept matches are disjoint and
//! start-ordered, intersecting any of them is the same as starting before
//! the end of the last one.

use std::cmp::Reverse;

use crate::detector::PiiMatch;

/// Resolve overlapping matches. Zero-width matches are dropped.
pub fn resolve_overlaps(mut matches: Vec<PiiMatch>) -> Vec<PiiMatch> {
    matches.sort_by_key(|m| {
        (
            m.start,
            Reverse(m.priority),
            Reverse(m.len()),
            Reverse(m.category.priority()),
        )
    });

    let mut kept: Vec<PiiMatch> = Vec::with_capacity(matches.len());
    for m in matches {
        if m.is_empty() {
            continue;
        }
        let clear = kept.last().map_or(true, |last| m.start >= last.end);
        if clear {
            kept.push(m);
        }
    }
    kept
}
