//! Deterministic candidate ranking and selection.
//!
//! Selection never talks to an oracle: it only reads scores, generation order
//! and validator verdicts that were already collected.

use std::cmp::Ordering;

use crate::core::types::{Candidate, JudgedCandidate, Verdict};

/// How the accepted candidate was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    /// Highest-ranked candidate the validator accepted.
    Validated,
    /// Nothing validated; best-scored non-empty candidate.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection<'a> {
    pub candidate: &'a Candidate,
    pub kind: SelectionKind,
}

/// Ranking order: score descending, then generation order ascending.
pub fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.order.cmp(&b.order))
}

/// Sort candidates best-first.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(rank_order);
    candidates
}

/// Accept the best-ranked valid candidate, else fall back to the best-ranked
/// non-empty one. Returns `None` when every candidate is empty.
///
/// The input does not need to be sorted.
pub fn select(judged: &[JudgedCandidate]) -> Option<Selection<'_>> {
    let best = |keep: &dyn Fn(&JudgedCandidate) -> bool| {
        judged
            .iter()
            .filter(|j| keep(j))
            .map(|j| &j.candidate)
            .min_by(|a, b| rank_order(a, b))
    };

    if let Some(candidate) = best(&|j| j.verdict == Verdict::Valid && !j.candidate.is_empty()) {
        return Some(Selection {
            candidate,
            kind: SelectionKind::Validated,
        });
    }

    best(&|j| !j.candidate.is_empty()).map(|candidate| Selection {
        candidate,
        kind: SelectionKind::Fallback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judged(order: usize, subtasks: &[&str], score: f64, verdict: Verdict) -> JudgedCandidate {
        JudgedCandidate {
            candidate: Candidate::new(
                order,
                subtasks.iter().map(|s| s.to_string()).collect(),
                score,
            ),
            verdict,
        }
    }

    #[test]
    fn rank_breaks_ties_by_generation_order() {
        let ranked = rank(vec![
            Candidate::new(0, vec!["a".into()], 0.5),
            Candidate::new(1, vec!["b".into()], 0.9),
            Candidate::new(2, vec!["c".into()], 0.5),
        ]);
        let orders: Vec<usize> = ranked.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![1, 0, 2]);
    }

    #[test]
    fn accepts_first_valid_in_score_order() {
        let candidates = vec![
            judged(0, &["low"], 0.2, Verdict::Valid),
            judged(1, &["high"], 0.9, Verdict::Invalid),
            judged(2, &["mid"], 0.5, Verdict::Valid),
        ];
        let selection = select(&candidates).expect("selection");
        assert_eq!(selection.kind, SelectionKind::Validated);
        assert_eq!(selection.candidate.order, 2);
    }

    #[test]
    fn falls_back_to_highest_score_when_none_validate() {
        let candidates = vec![
            judged(0, &["a"], 0.9, Verdict::Invalid),
            judged(1, &["b"], 0.5, Verdict::Invalid),
            judged(2, &["c"], 0.2, Verdict::Invalid),
        ];
        let selection = select(&candidates).expect("selection");
        assert_eq!(selection.kind, SelectionKind::Fallback);
        assert_eq!(selection.candidate.score, 0.9);
        assert_eq!(selection.candidate.subtasks, vec!["a".to_string()]);
    }

    #[test]
    fn fallback_tie_prefers_first_generated() {
        let candidates = vec![
            judged(0, &["first"], 0.4, Verdict::Invalid),
            judged(1, &["second"], 0.4, Verdict::Invalid),
        ];
        let selection = select(&candidates).expect("selection");
        assert_eq!(selection.candidate.order, 0);
    }

    #[test]
    fn fallback_skips_empty_candidates() {
        let candidates = vec![
            judged(0, &[], 0.0, Verdict::Invalid),
            judged(1, &["only"], 0.0, Verdict::Invalid),
        ];
        let selection = select(&candidates).expect("selection");
        assert_eq!(selection.candidate.order, 1);
    }

    #[test]
    fn all_empty_yields_nothing() {
        let candidates = vec![
            judged(0, &[], 0.0, Verdict::Invalid),
            judged(1, &[], 0.0, Verdict::Unchecked),
            judged(2, &[], 0.0, Verdict::Invalid),
        ];
        assert!(select(&candidates).is_none());
    }

    #[test]
    fn selection_is_deterministic() {
        let candidates = vec![
            judged(0, &["a"], 0.7, Verdict::Invalid),
            judged(1, &["b"], 0.7, Verdict::Unchecked),
        ];
        let first = select(&candidates).expect("first");
        let second = select(&candidates).expect("second");
        assert_eq!(first, second);
    }
}
