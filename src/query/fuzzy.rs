//! Bounded edit distance between term texts.

/// Damerau-Levenshtein distance over code points, capped at `max + 1`.
///
/// When `transposition_cost_one` is false this degrades to plain
/// Levenshtein (a transposition costs two single edits). The cap keeps the
/// dictionary scan cheap: once every cell of a row exceeds `max`, the
/// result cannot come back under it.
pub fn edit_distance(a: &str, b: &str, max: u8, transposition_cost_one: bool) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let cap = max as usize + 1;

    if a.len().abs_diff(b.len()) > max as usize {
        return cap as u8;
    }
    if a.is_empty() {
        return b.len().min(cap) as u8;
    }
    if b.is_empty() {
        return a.len().min(cap) as u8;
    }

    let width = b.len() + 1;
    let mut prev_prev: Vec<usize> = vec![cap; width];
    let mut prev: Vec<usize> = (0..width).map(|j| j.min(cap)).collect();
    let mut current: Vec<usize> = vec![0; width];

    for i in 1..=a.len() {
        current[0] = i.min(cap);
        let mut row_min = current[0];
        for j in 1..=b.len() {
            let substitution = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            let mut cost = (prev[j] + 1)
                .min(current[j - 1] + 1)
                .min(prev[j - 1] + substitution);
            if transposition_cost_one
                && i > 1
                && j > 1
                && a[i - 1] == b[j - 2]
                && a[i - 2] == b[j - 1]
            {
                cost = cost.min(prev_prev[j - 2] + 1);
            }
            current[j] = cost.min(cap);
            row_min = row_min.min(current[j]);
        }
        if row_min >= cap {
            return cap as u8;
        }
        std::mem::swap(&mut prev_prev, &mut prev);
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()].min(cap) as u8
}

/// True if `candidate` is within `max` edits of `probe`. In prefix mode
/// the candidate is truncated so the probe only has to match its head.
pub fn within_distance(
    probe: &str,
    candidate: &str,
    max: u8,
    transposition_cost_one: bool,
    prefix: bool,
) -> bool {
    if prefix {
        let keep = probe.chars().count() + max as usize;
        let truncated: String = candidate.chars().take(keep).collect();
        edit_distance(probe, &truncated, max, transposition_cost_one) <= max
    } else {
        edit_distance(probe, candidate, max, transposition_cost_one) <= max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_is_zero() {
        assert_eq!(edit_distance("sea", "sea", 2, true), 0);
    }

    #[test]
    fn test_single_edits() {
        assert_eq!(edit_distance("men", "man", 2, true), 1); // substitution
        assert_eq!(edit_distance("sea", "seas", 2, true), 1); // insertion
        assert_eq!(edit_distance("mice", "ice", 2, true), 1); // deletion
    }

    #[test]
    fn test_transposition_cost() {
        assert_eq!(edit_distance("ab", "ba", 2, true), 1);
        assert_eq!(edit_distance("ab", "ba", 2, false), 2);
    }

    #[test]
    fn test_cap_respected() {
        // Far apart: result is clamped just above the budget.
        assert_eq!(edit_distance("abcdef", "zzzzzz", 1, true), 2);
        assert!(edit_distance("abcdef", "zzzzzz", 1, true) > 1);
    }

    #[test]
    fn test_prefix_mode() {
        assert!(within_distance("sea", "seashore", 0, true, true));
        assert!(!within_distance("sea", "seashore", 0, true, false));
        assert!(within_distance("sae", "seashore", 1, true, true));
    }

    #[test]
    fn test_unicode_chars() {
        assert_eq!(edit_distance("über", "uber", 1, true), 1);
    }
}
