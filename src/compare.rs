//! Price-change classification. Every scrape is classified against the most
//! recent recorded price; the direction decides whether a notification fires.

use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    New,
    Up,
    Down,
    Unchanged,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::New => "new",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Unchanged => "unchanged",
        }
    }

    /// Direction between two observations, ignoring any threshold. Used by the
    /// read API when summarizing the latest two history rows.
    pub fn between(previous: Option<&BigDecimal>, current: &BigDecimal) -> Direction {
        match previous {
            None => Direction::New,
            Some(prev) if current > prev => Direction::Up,
            Some(prev) if current < prev => Direction::Down,
            Some(_) => Direction::Unchanged,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of comparing a fresh observation against the last recorded one.
#[derive(Debug, Clone)]
pub struct PriceChange {
    pub previous: Option<BigDecimal>,
    pub current: BigDecimal,
    /// Signed absolute change; zero for first observations.
    pub delta: BigDecimal,
    /// Signed relative change as a fraction (0.05 = +5%); None when there is
    /// no previous price to compare against.
    pub pct: Option<f64>,
    pub direction: Direction,
}

impl PriceChange {
    pub fn should_notify(&self) -> bool {
        !matches!(self.direction, Direction::Unchanged)
    }
}

/// Classify a fresh price against the previous one.
///
/// A missing previous price is a first observation (`New`). A zero previous
/// price is also treated as `New` rather than dividing by it: the product is
/// effectively returning to the shelf. Otherwise the relative change decides:
/// at or above `min_pct_change` it is `Up`/`Down`, below it `Unchanged`.
/// The observation is recorded by the caller in every case.
pub fn classify(
    previous: Option<&BigDecimal>,
    current: &BigDecimal,
    min_pct_change: f64,
) -> PriceChange {
    let prev = match previous {
        Some(p) if !p.is_zero() => p,
        _ => {
            return PriceChange {
                previous: previous.cloned(),
                current: current.clone(),
                delta: BigDecimal::zero(),
                pct: None,
                direction: Direction::New,
            };
        }
    };

    let delta = current - prev;
    let pct = (&delta / prev).to_f64().unwrap_or(0.0);

    let direction = if delta.is_zero() || pct.abs() < min_pct_change {
        Direction::Unchanged
    } else if delta > BigDecimal::zero() {
        Direction::Up
    } else {
        Direction::Down
    };

    PriceChange {
        previous: Some(prev.clone()),
        current: current.clone(),
        delta,
        pct: Some(pct),
        direction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn bd(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn first_observation_is_new_and_notifies() {
        let change = classify(None, &bd("4.20"), 0.01);
        assert_eq!(change.direction, Direction::New);
        assert!(change.should_notify());
        assert!(change.pct.is_none());
    }

    #[test]
    fn five_percent_rise_is_up() {
        let change = classify(Some(&bd("10.00")), &bd("10.50"), 0.01);
        assert_eq!(change.direction, Direction::Up);
        assert!(change.should_notify());
        let pct = change.pct.unwrap();
        assert!((pct - 0.05).abs() < 1e-9);
    }

    #[test]
    fn half_percent_rise_is_unchanged_and_silent() {
        let change = classify(Some(&bd("10.00")), &bd("10.05"), 0.01);
        assert_eq!(change.direction, Direction::Unchanged);
        assert!(!change.should_notify());
        let pct = change.pct.unwrap();
        assert!((pct - 0.005).abs() < 1e-9);
    }

    #[test]
    fn drop_at_exact_threshold_notifies() {
        // 9.90 from 10.00 is exactly -1%; >= threshold fires.
        let change = classify(Some(&bd("10.00")), &bd("9.90"), 0.01);
        assert_eq!(change.direction, Direction::Down);
        assert!(change.should_notify());
    }

    #[test]
    fn identical_price_is_unchanged_even_at_zero_threshold() {
        let change = classify(Some(&bd("3.00")), &bd("3.00"), 0.0);
        assert_eq!(change.direction, Direction::Unchanged);
        assert!(!change.should_notify());
    }

    #[test]
    fn zero_previous_price_is_treated_as_new() {
        let change = classify(Some(&bd("0.00")), &bd("2.50"), 0.01);
        assert_eq!(change.direction, Direction::New);
        assert!(change.should_notify());
        assert!(change.pct.is_none());
    }

    #[test]
    fn direction_between_compares_without_threshold() {
        assert_eq!(
            Direction::between(Some(&bd("10.00")), &bd("10.05")),
            Direction::Up
        );
        assert_eq!(
            Direction::between(Some(&bd("10.00")), &bd("10.00")),
            Direction::Unchanged
        );
        assert_eq!(Direction::between(None, &bd("1.00")), Direction::New);
    }

    #[test]
    fn direction_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Direction::Unchanged).unwrap(),
            "\"unchanged\""
        );
        assert_eq!(serde_json::to_string(&Direction::New).unwrap(), "\"new\"");
    }
}
