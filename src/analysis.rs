//! Pure scoring primitives: order statistics, RFM, churn risk, priority.
//!
//! Everything in this module is a deterministic function of order history
//! and [`ScoringConfig`] constants. No IO, no model calls; the workflow
//! stages and the daily queue builder both lean on these functions so local
//! and graph-driven scoring can never drift apart.
//!
//! # Formulas
//!
//! RFM blends three 0-100 components:
//!
//! - recency: linear falloff from 100 to 0 over `recency_window_days`
//! - frequency: `frequency_points_per_order` per lifetime order, capped
//! - monetary: lifetime spend against `monetary_target`, capped
//!
//! Churn risk blends silence, inverse frequency, and inverse order value
//! into a 0.0-1.0 figure, rounded to three decimals. Customers without any
//! order history get `default_churn_risk` and an RFM of zero.

use chrono::NaiveDate;

use crate::config::ScoringConfig;
use crate::models::{OrderRecord, RecAction, Recommendation, ScoreSet};

/// Aggregates of one customer's order history as of a reference date.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OrderStats {
    /// Number of lifetime orders.
    pub order_count: usize,
    /// Lifetime revenue (quantity times unit price, summed).
    pub total_spent: f64,
    /// Average order value; zero when there are no orders.
    pub avg_order_value: f64,
    /// Whole days between the newest order and the reference date, floored at zero.
    pub days_since_last: i64,
    /// Date of the newest order, when any exist.
    pub last_order_date: Option<NaiveDate>,
}

impl OrderStats {
    /// Derive statistics from raw order records.
    ///
    /// Orders dated after `as_of` count as zero days of silence rather than
    /// negative ones.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use followgraph::analysis::OrderStats;
    /// use followgraph::models::OrderRecord;
    ///
    /// let orders = vec![
    ///     OrderRecord::new("C001", "SO-101", "2025-08-01", "CAKE-CHOC", 3, 12.50),
    ///     OrderRecord::new("C001", "SO-102", "2025-08-10", "BAG-SML", 10, 2.20),
    /// ];
    /// let as_of = NaiveDate::from_ymd_opt(2025, 8, 20).unwrap();
    /// let stats = OrderStats::from_orders(&orders, as_of);
    ///
    /// assert_eq!(stats.order_count, 2);
    /// assert_eq!(stats.days_since_last, 10);
    /// assert!((stats.total_spent - 59.5).abs() < 1e-9);
    /// ```
    #[must_use]
    pub fn from_orders(orders: &[OrderRecord], as_of: NaiveDate) -> Self {
        if orders.is_empty() {
            return Self::default();
        }

        let order_count = orders.len();
        let total_spent: f64 = orders.iter().map(OrderRecord::total).sum();
        let avg_order_value = total_spent / order_count as f64;
        let last_order_date = orders.iter().map(|o| o.order_date).max();
        let days_since_last = last_order_date
            .map(|last| (as_of - last).num_days().max(0))
            .unwrap_or(0);

        Self {
            order_count,
            total_spent,
            avg_order_value,
            days_since_last,
            last_order_date,
        }
    }

    /// True when the customer has no recorded orders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }
}

/// RFM score on the 0-100 scale.
///
/// Returns 0 for customers without order history; the workflow routes those
/// through the no-history path instead of interpreting the zero.
#[must_use]
pub fn rfm_score(stats: &OrderStats, config: &ScoringConfig) -> u8 {
    if stats.is_empty() {
        return 0;
    }

    let recency = (100.0 - stats.days_since_last as f64 * 100.0 / config.recency_window_days)
        .clamp(0.0, 100.0);
    let frequency = (stats.order_count as f64 * config.frequency_points_per_order).min(100.0);
    let monetary = (stats.total_spent / config.monetary_target * 100.0).min(100.0);

    let blended = config.recency_weight * recency
        + config.frequency_weight * frequency
        + config.monetary_weight * monetary;
    blended.round().clamp(0.0, 100.0) as u8
}

/// Churn risk on the 0.0-1.0 scale, rounded to three decimals.
///
/// Customers without order history get `default_churn_risk`: silence about
/// someone we have never sold to is treated as maximum risk by default.
#[must_use]
pub fn churn_risk(stats: &OrderStats, config: &ScoringConfig) -> f64 {
    if stats.is_empty() {
        return round3(config.default_churn_risk);
    }

    let silence = (stats.days_since_last as f64 / config.churn_silence_days).min(1.0);
    let inverse_frequency = 1.0 / (1.0 + stats.order_count as f64);
    let inverse_value = 1.0 / (1.0 + stats.avg_order_value / config.churn_aov_scale);

    let blended = config.churn_recency_weight * silence
        + config.churn_frequency_weight * inverse_frequency
        + config.churn_value_weight * inverse_value;
    round3(blended.min(1.0))
}

/// Follow-up priority on the 1-5 scale.
///
/// The base band comes from RFM alone and is monotone in it; churn then
/// shifts the band by at most one step in either direction. Raising RFM at
/// a fixed churn therefore never lowers the priority.
#[must_use]
pub fn priority_for(rfm: u8, churn: f64, config: &ScoringConfig) -> u8 {
    let base: i8 = match rfm {
        80..=100 => 5,
        60..=79 => 4,
        40..=59 => 3,
        20..=39 => 2,
        _ => 1,
    };

    let adjusted = if churn > config.churn_high_threshold {
        base - 1
    } else if churn < config.churn_low_threshold {
        base + 1
    } else {
        base
    };
    adjusted.clamp(1, 5) as u8
}

/// Compute the full score set for one customer's statistics.
#[must_use]
pub fn score_set(stats: &OrderStats, config: &ScoringConfig) -> ScoreSet {
    let rfm = rfm_score(stats, config);
    let churn = churn_risk(stats, config);
    ScoreSet {
        rfm,
        churn_risk: churn,
        priority: priority_for(rfm, churn, config),
    }
}

/// Deterministic follow-up recommendations from scores and statistics.
///
/// Always returns exactly three recommendations with distinct actions,
/// ordered by expected impact. This is both the fallback when the remote
/// recommendation stage degrades and the whole story for customers without
/// order history.
#[must_use]
pub fn rule_based_recommendations(
    stats: &OrderStats,
    rfm: u8,
    churn: f64,
    config: &ScoringConfig,
) -> Vec<Recommendation> {
    let days = stats.days_since_last;
    let mut recs: Vec<Recommendation> = Vec::with_capacity(3);

    let push = |recs: &mut Vec<Recommendation>, action: RecAction, reason: String| {
        if recs.len() < 3 && !recs.iter().any(|r| r.action == action) {
            recs.push(Recommendation::new(action, &reason));
        }
    };

    if churn > config.churn_high_threshold && days > 45 {
        push(
            &mut recs,
            RecAction::Call,
            format!("Churn risk {churn:.2} after {days} days of silence; call before the account lapses"),
        );
    }
    if churn > config.churn_high_threshold {
        push(
            &mut recs,
            RecAction::Email,
            format!("Churn risk {churn:.2} is high; send a re-engagement email"),
        );
    }
    if rfm > 70 && stats.avg_order_value > 20.0 {
        push(
            &mut recs,
            RecAction::OfferBundle,
            format!(
                "Strong account (RFM {rfm}) with {:.2} average order; propose a volume bundle",
                stats.avg_order_value
            ),
        );
    }
    if rfm > 70 {
        push(
            &mut recs,
            RecAction::Call,
            format!("Top-scoring account (RFM {rfm}); a direct call protects the relationship"),
        );
    }
    if rfm > 40 && stats.order_count < 3 {
        push(
            &mut recs,
            RecAction::Promo,
            format!(
                "Promising account with only {} orders; a promotion can build the habit",
                stats.order_count
            ),
        );
    }
    if rfm > 40 {
        push(
            &mut recs,
            RecAction::Email,
            format!("Mid-tier account (RFM {rfm}); keep the conversation warm by email"),
        );
    }
    if days > 60 {
        push(
            &mut recs,
            RecAction::Promo,
            format!("{days} days without an order; a time-limited promotion can reactivate"),
        );
    }

    // Pad to three distinct actions; the order here continues the impact ranking.
    push(
        &mut recs,
        RecAction::Email,
        "Maintain the relationship with a check-in email".to_string(),
    );
    push(
        &mut recs,
        RecAction::Promo,
        "Send a time-limited promotion to prompt the next order".to_string(),
    );
    push(
        &mut recs,
        RecAction::Call,
        "Schedule a short call to understand current needs".to_string(),
    );

    recs
}

#[inline]
fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}
