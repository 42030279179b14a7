//! Monte Carlo estimates over simulated terminal values
//!
//! Turns a driver's `S_T` row into a payoff estimate with a standard error
//! and a 95% confidence interval.

use ndarray::ArrayView1;

/// Result of a Monte Carlo estimate
#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloResult {
    /// Estimated value
    pub estimate: f64,
    /// Standard error
    pub std_error: f64,
    /// 95% confidence interval (lower bound)
    pub ci_lower: f64,
    /// 95% confidence interval (upper bound)
    pub ci_upper: f64,
    /// Number of samples used
    pub n_samples: usize,
}

impl MonteCarloResult {
    fn new(estimate: f64, std_error: f64, n_samples: usize) -> Self {
        // 95% CI uses z = 1.96
        let margin = 1.96 * std_error;
        Self {
            estimate,
            std_error,
            ci_lower: estimate - margin,
            ci_upper: estimate + margin,
            n_samples,
        }
    }

    /// True if `value` lies inside the 95% interval.
    pub fn contains(&self, value: f64) -> bool {
        (self.ci_lower..=self.ci_upper).contains(&value)
    }

    /// Scales estimate, error and interval by `factor` (e.g. a discount factor).
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.estimate * factor, self.std_error * factor.abs(), self.n_samples)
    }
}

/// Mean of `payoff` over `values`.
///
/// An empty sample gives a NaN estimate.
pub fn estimate<F>(values: ArrayView1<'_, f64>, payoff: F) -> MonteCarloResult
where
    F: Fn(f64) -> f64,
{
    let n = values.len();
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for &v in values.iter() {
        let p = payoff(v);
        sum += p;
        sum_sq += p * p;
    }

    let mean = sum / n as f64;
    let variance = (sum_sq / n as f64 - mean * mean).max(0.0);
    let std_error = (variance / n as f64).sqrt();

    MonteCarloResult::new(mean, std_error, n)
}

/// Discounted mean `exp(-r T) E[payoff(S_T)]`.
pub fn discounted_estimate<F>(
    values: ArrayView1<'_, f64>,
    payoff: F,
    rate: f64,
    maturity: f64,
) -> MonteCarloResult
where
    F: Fn(f64) -> f64,
{
    estimate(values, payoff).scaled((-rate * maturity).exp())
}

/// European call option payoff
pub fn call_payoff(strike: f64) -> impl Fn(f64) -> f64 {
    move |s_t| (s_t - strike).max(0.0)
}

/// European put option payoff
pub fn put_payoff(strike: f64) -> impl Fn(f64) -> f64 {
    move |s_t| (strike - s_t).max(0.0)
}

/// Digital (binary) call option payoff
pub fn digital_call_payoff(strike: f64) -> impl Fn(f64) -> f64 {
    move |s_t| if s_t > strike { 1.0 } else { 0.0 }
}

/// Black-Scholes price of a European call, used as a reference for
/// simulated GBM prices.
pub fn black_scholes_call(s0: f64, k: f64, r: f64, sigma: f64, t: f64) -> f64 {
    let d1 = ((s0 / k).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt());
    let d2 = d1 - sigma * t.sqrt();

    s0 * norm_cdf(d1) - k * (-r * t).exp() * norm_cdf(d2)
}

fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

// Abramowitz-Stegun 7.1.26, |error| < 1.5e-7
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}
