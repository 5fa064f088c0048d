
use chrono::NaiveDateTime;
use serde::Serialize;

/// Aggregate result of a submitted attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttemptScore {
    /// Sum of points earned
    pub score: f64,
    /// `score` over the attempt's total points, times 100; 0 when the total is 0
    pub percentage: f64,
    /// Whole seconds between start and submission, never negative
    pub time_spent_seconds: i64,
}

/// Total the points earned and derive percentage and elapsed time
#[inline]
pub fn score_attempt<I>(
    points_earned: I,
    total_points: f64,
    started_at: NaiveDateTime,
    submitted_at: NaiveDateTime,
) -> AttemptScore
where
    I: IntoIterator<Item = f64>,
{
    let score: f64 = points_earned.into_iter().sum();
    let percentage = if total_points > 0.0 {
        score / total_points * 100.0
    } else {
        0.0
    };
    let time_spent_seconds = (submitted_at - started_at).num_seconds().max(0);

    AttemptScore {
        score,
        percentage,
        time_spent_seconds,
    }
}
