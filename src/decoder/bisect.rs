//! Breadth-first bisection of a grouped row.
//!
//! A row whose lines disagree too much is split into halves, each half is
//! reduced on its own, and the halves are split again. Every sub-group that
//! reduces to a valid row contributes a candidate.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};

use crate::models::{DibitRow, GroupedRow};

fn content_hash(row: &GroupedRow) -> u64 {
    let mut hasher = DefaultHasher::new();
    row.lines.hash(&mut hasher);
    hasher.finish()
}

/// Search every bisection of `row` and collect the valid rows `reduce`
/// reports, de-duplicated in discovery order.
pub fn bisect_search<F>(row: &GroupedRow, mut reduce: F) -> Vec<DibitRow>
where
    F: FnMut(&GroupedRow) -> Vec<DibitRow>,
{
    let mut queue: VecDeque<(usize, usize)> = VecDeque::from([(0, row.len())]);
    let mut visited: HashSet<u64> = HashSet::new();
    let mut candidates: Vec<DibitRow> = Vec::new();

    while let Some((start, end)) = queue.pop_front() {
        if start >= end {
            continue;
        }
        let node = row.slice(start, end);
        if !visited.insert(content_hash(&node)) {
            continue;
        }
        for candidate in reduce(&node) {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
        let len = end - start;
        if len >= 2 {
            let mid = start + (len + 1) / 2;
            queue.push_back((start, mid));
            queue.push_back((mid, end));
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pattern, PatternLine};

    fn group(values: &[u8]) -> GroupedRow {
        GroupedRow {
            lines: values
                .iter()
                .map(|&v| PatternLine {
                    pattern: Pattern::BlackWhite,
                    pixels: vec![v],
                })
                .collect(),
            gray: vec![Vec::new(); values.len()],
        }
    }

    #[test]
    fn test_visits_every_distinct_subgroup_once() {
        let row = group(&[1, 2, 3, 4]);
        let mut seen = Vec::new();
        bisect_search(&row, |node| {
            seen.push(node.len());
            Vec::new()
        });
        // whole, two halves, four singles
        assert_eq!(seen, vec![4, 2, 2, 1, 1, 1, 1]);
    }

    #[test]
    fn test_identical_content_is_skipped() {
        let row = group(&[7, 7, 7, 7]);
        let mut calls = 0;
        bisect_search(&row, |_| {
            calls += 1;
            Vec::new()
        });
        // [7,7,7,7], [7,7], [7]
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_candidates_deduplicated_in_order() {
        let row = group(&[1, 2, 3]);
        let found = bisect_search(&row, |node| {
            if node.len() == 1 {
                vec![DibitRow::new(vec![node.lines[0].pixels[0] % 2])]
            } else {
                Vec::new()
            }
        });
        assert_eq!(found, vec![DibitRow::new(vec![1]), DibitRow::new(vec![0])]);
    }
}
