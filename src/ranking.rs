//! Deterministic follow-up ordering across a set of scored customers.
//!
//! Ranking is a pure function of the score sets: priority first, churn risk
//! as the tiebreaker, customer id as the final total order. Running it twice
//! over the same scores always yields the same sequence.

use rustc_hash::FxHashMap;

use crate::models::ScoreSet;

/// Order customer ids for follow-up, most urgent first.
///
/// Sorts by priority descending, then churn risk descending, then customer
/// id ascending so the result is a total order even when scores tie.
///
/// # Examples
///
/// ```
/// use followgraph::models::ScoreSet;
/// use followgraph::ranking::rank;
/// use rustc_hash::FxHashMap;
///
/// let mut scores = FxHashMap::default();
/// scores.insert("C001".to_string(), ScoreSet { rfm: 82, churn_risk: 0.2, priority: 5 });
/// scores.insert("C002".to_string(), ScoreSet { rfm: 35, churn_risk: 0.8, priority: 2 });
///
/// assert_eq!(rank(&scores), vec!["C001".to_string(), "C002".to_string()]);
/// ```
#[must_use]
pub fn rank(scores: &FxHashMap<String, ScoreSet>) -> Vec<String> {
    let mut entries: Vec<(&String, &ScoreSet)> = scores.iter().collect();
    entries.sort_by(|(id_a, a), (id_b, b)| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.churn_risk.total_cmp(&a.churn_risk))
            .then_with(|| id_a.cmp(id_b))
    });
    entries.into_iter().map(|(id, _)| id.clone()).collect()
}
