//! Word error counts from a minimum edit-distance alignment.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Substitution, deletion and insertion counts of one alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentErrors {
    pub substitutions: usize,
    pub deletions: usize,
    pub insertions: usize,
}

impl AlignmentErrors {
    pub fn total(&self) -> usize {
        self.substitutions + self.deletions + self.insertions
    }
}

impl AddAssign for AlignmentErrors {
    fn add_assign(&mut self, other: Self) {
        self.substitutions += other.substitutions;
        self.deletions += other.deletions;
        self.insertions += other.insertions;
    }
}

/// Align `hypothesis` against `reference` and count the edits.
///
/// On the way back through the edit table a correct match is preferred over
/// any edit, then a substitution over a deletion or insertion, then a
/// deletion over an insertion.
///
/// # Arguments
/// * `reference` - Reference words
/// * `hypothesis` - Decoded words
pub fn compute_alignment_errors<R, H>(reference: &[R], hypothesis: &[H]) -> AlignmentErrors
where
    R: AsRef<str>,
    H: AsRef<str>,
{
    let m_len = reference.len();
    let n_len = hypothesis.len();

    if m_len == 0 {
        return AlignmentErrors { insertions: n_len, ..Default::default() };
    }
    if n_len == 0 {
        return AlignmentErrors { deletions: m_len, ..Default::default() };
    }

    let same = |m: usize, n: usize| reference[m - 1].as_ref() == hypothesis[n - 1].as_ref();

    // e[m][n]: edit distance between the first m reference and first n hypothesis words
    let mut e = vec![vec![0usize; n_len + 1]; m_len + 1];
    for (n, cell) in e[0].iter_mut().enumerate() {
        *cell = n;
    }
    for m in 1..=m_len {
        e[m][0] = e[m - 1][0] + 1;
        for n in 1..=n_len {
            let sub_or_ok = e[m - 1][n - 1] + usize::from(!same(m, n));
            let del = e[m - 1][n] + 1;
            let ins = e[m][n - 1] + 1;
            e[m][n] = sub_or_ok.min(del).min(ins);
        }
    }

    let mut errors = AlignmentErrors::default();
    let (mut m, mut n) = (m_len, n_len);
    while m != 0 || n != 0 {
        if m == 0 {
            errors.insertions += 1;
            n -= 1;
        } else if n == 0 {
            errors.deletions += 1;
            m -= 1;
        } else {
            let del = e[m - 1][n] + 1;
            let ins = e[m][n - 1] + 1;
            let edit = del.min(ins);

            if same(m, n) && e[m - 1][n - 1] <= edit {
                m -= 1;
                n -= 1;
            } else if !same(m, n) && e[m - 1][n - 1] + 1 < edit {
                errors.substitutions += 1;
                m -= 1;
                n -= 1;
            } else if del < ins {
                errors.deletions += 1;
                m -= 1;
            } else {
                errors.insertions += 1;
                n -= 1;
            }
        }
    }

    errors
}

/// Whitespace-tokenising wrapper around [`compute_alignment_errors`].
pub fn compute_alignment_errors_str(reference: &str, hypothesis: &str) -> AlignmentErrors {
    let reference: Vec<&str> = reference.split_whitespace().collect();
    let hypothesis: Vec<&str> = hypothesis.split_whitespace().collect();
    compute_alignment_errors(&reference, &hypothesis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(s: usize, d: usize, i: usize) -> AlignmentErrors {
        AlignmentErrors { substitutions: s, deletions: d, insertions: i }
    }

    #[test]
    fn test_identical() {
        assert_eq!(compute_alignment_errors_str("peter piper picked", "peter piper picked"), errors(0, 0, 0));
    }

    #[test]
    fn test_empty_sides() {
        assert_eq!(compute_alignment_errors_str("", "a b"), errors(0, 0, 2));
        assert_eq!(compute_alignment_errors_str("a b c", ""), errors(0, 3, 0));
        assert_eq!(compute_alignment_errors_str("", ""), errors(0, 0, 0));
    }

    #[test]
    fn test_mixed_edits() {
        assert_eq!(compute_alignment_errors_str("a peck of pickled peppers", "a peck pickled peppers"), errors(0, 1, 0));
        assert_eq!(compute_alignment_errors_str("peter piper", "peter the piper"), errors(0, 0, 1));
        assert_eq!(compute_alignment_errors_str("peter piper picked", "peter pepper picked"), errors(1, 0, 0));
        assert_eq!(compute_alignment_errors_str("a b", "c d e").total(), 3);
    }

    #[test]
    fn test_accumulate() {
        let mut total = AlignmentErrors::default();
        total += errors(1, 2, 3);
        total += errors(1, 0, 0);
        assert_eq!(total, errors(2, 2, 3));
        assert_eq!(total.total(), 7);
    }
}
