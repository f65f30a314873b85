//! Sampled risk/return curve for visualization
//!
//! Estimated return scales the portfolio mean return linearly with target
//! volatility. This is a proxy for sanity-checking allocations, not a
//! frontier solve.

use super::ratios::{mean_return, mean_volatility, sharpe_ratio};
use crate::error::{EngineError, Result};
use crate::types::{AssetForecast, FrontierPoint};

/// Frontier parameters derived from a forecast set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfficientFrontier {
    min_volatility: f64,
    max_volatility: f64,
    mean_return: f64,
    mean_volatility: f64,
    risk_free_rate: f64,
    num_points: usize,
}

impl EfficientFrontier {
    pub fn new(forecasts: &[AssetForecast], num_points: usize, risk_free_rate: f64) -> Result<Self> {
        if forecasts.is_empty() {
            return Err(EngineError::InvalidInput(
                "efficient frontier needs at least one forecast".into(),
            ));
        }
        if num_points == 0 {
            return Err(EngineError::InvalidInput(
                "efficient frontier needs at least one point".into(),
            ));
        }

        let (min_volatility, max_volatility) = forecasts.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), f| (lo.min(f.annualized_volatility), hi.max(f.annualized_volatility)),
        );

        Ok(Self {
            min_volatility,
            max_volatility,
            mean_return: mean_return(forecasts),
            mean_volatility: mean_volatility(forecasts),
            risk_free_rate,
            num_points,
        })
    }

    pub fn len(&self) -> usize {
        self.num_points
    }

    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }

    /// Fresh iterator over the curve; each call restarts from the lowest volatility
    pub fn points(&self) -> FrontierPoints {
        FrontierPoints {
            frontier: *self,
            next: 0,
        }
    }

    fn point_at(&self, i: usize) -> FrontierPoint {
        let target_volatility = if self.num_points == 1 {
            self.min_volatility
        } else {
            let t = i as f64 / (self.num_points - 1) as f64;
            self.min_volatility + t * (self.max_volatility - self.min_volatility)
        };

        let estimated_return = if self.mean_volatility == 0.0 {
            0.0
        } else {
            self.mean_return * (target_volatility / self.mean_volatility)
        };

        FrontierPoint {
            target_volatility,
            estimated_return,
            sharpe_ratio: sharpe_ratio(estimated_return, target_volatility, self.risk_free_rate),
        }
    }
}

/// Lazy, finite iterator over frontier points
#[derive(Debug, Clone)]
pub struct FrontierPoints {
    frontier: EfficientFrontier,
    next: usize,
}

impl Iterator for FrontierPoints {
    type Item = FrontierPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.frontier.num_points {
            return None;
        }
        let point = self.frontier.point_at(self.next);
        self.next += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.frontier.num_points - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrontierPoints {}

/// Collect `num_points` frontier points for a forecast set
pub fn generate_efficient_frontier(
    forecasts: &[AssetForecast],
    num_points: usize,
    risk_free_rate: f64,
) -> Result<Vec<FrontierPoint>> {
    Ok(EfficientFrontier::new(forecasts, num_points, risk_free_rate)?
        .points()
        .collect())
}
