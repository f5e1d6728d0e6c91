//! Window-score formulas for the ranking/trending engine.
//!
//! Weights are explicit configuration, not hidden constants. The store layer
//! gathers `(upvote_count, avg_rating)` per entity; scoring and ordering
//! happen here so the formulas stay independently testable.

use serde::{Deserialize, Serialize};

/// Ranking window selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RankingWindow {
    Today,
    Yesterday,
    ThisMonth,
    Trending,
}

/// Configurable weights for the score formulas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RankingWeights {
    /// Multiplier applied to avg_rating in the month-best formula.
    pub month_rating_weight: f64,
    /// Multiplier applied to avg_rating in the trending formula.
    pub trending_rating_weight: f64,
    /// Default trailing window for trending, in days.
    pub trending_window_days: i64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            month_rating_weight: 10.0,
            trending_rating_weight: 5.0,
            trending_window_days: 7,
        }
    }
}

impl RankingWeights {
    /// Month-best score: `upvotes + avg_rating * month_rating_weight`.
    ///
    /// Unreviewed entities contribute `avg_rating = 0`, not null. That skew
    /// is intentional and documented.
    pub fn month_score(&self, upvote_count: i64, avg_rating: f64) -> f64 {
        upvote_count as f64 + avg_rating * self.month_rating_weight
    }

    /// Trending score: `upvotes + avg_rating * trending_rating_weight`.
    pub fn trending_score(&self, upvote_count: i64, avg_rating: f64) -> f64 {
        upvote_count as f64 + avg_rating * self.trending_rating_weight
    }

    /// Today score: pure upvote count.
    pub fn today_score(&self, upvote_count: i64) -> f64 {
        upvote_count as f64
    }
}

/// Round a mean rating to 1 decimal place, mapping the no-review case to 0.0.
pub fn round_rating(avg: Option<f64>) -> f64 {
    (avg.unwrap_or(0.0) * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let w = RankingWeights::default();
        assert_eq!(w.month_rating_weight, 10.0);
        assert_eq!(w.trending_rating_weight, 5.0);
        assert_eq!(w.trending_window_days, 7);
    }

    #[test]
    fn test_month_score_divergence_scenario() {
        // B: upvotes=5, rating=4.0 -> 45. C: upvotes=2, rating=5.0 -> 52.
        // C outranks B under month-best scoring despite fewer upvotes.
        let w = RankingWeights::default();
        let b = w.month_score(5, 4.0);
        let c = w.month_score(2, 5.0);
        assert_eq!(b, 45.0);
        assert_eq!(c, 52.0);
        assert!(c > b);
    }

    #[test]
    fn test_trending_score() {
        let w = RankingWeights::default();
        assert_eq!(w.trending_score(10, 4.2), 10.0 + 21.0);
    }

    #[test]
    fn test_today_score_ignores_rating() {
        let w = RankingWeights::default();
        assert_eq!(w.today_score(7), 7.0);
    }

    #[test]
    fn test_zero_review_entities_score_zero_rating() {
        let w = RankingWeights::default();
        assert_eq!(w.month_score(3, round_rating(None)), 3.0);
    }

    #[test]
    fn test_round_rating_one_decimal() {
        assert_eq!(round_rating(Some(4.4499)), 4.4);
        assert_eq!(round_rating(Some(4.45)), 4.5);
        assert_eq!(round_rating(Some(5.0)), 5.0);
        assert_eq!(round_rating(None), 0.0);
    }
}
