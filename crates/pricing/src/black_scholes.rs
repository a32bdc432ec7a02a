//! Black-Scholes closed-form price and delta.
//!
//! Callers must validate inputs: time to expiry and volatility are assumed
//! strictly positive, spot and strike strictly positive. Degenerate inputs
//! are a caller bug, checked only by debug assertions here.

use zdte_core::OptionRight;

const SQRT_2PI: f64 = 2.506_628_274_631_000_5;

/// Standard normal cumulative distribution function.
///
/// erf-based, accurate to well below 1e-7 absolute error.
#[must_use]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + libm::erf(x / std::f64::consts::SQRT_2))
}

/// Standard normal probability density function.
#[must_use]
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / SQRT_2PI
}

fn d1(spot: f64, strike: f64, rate: f64, carry: f64, sigma: f64, t: f64) -> f64 {
    ((spot / strike).ln() + (rate - carry + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

fn d2(spot: f64, strike: f64, rate: f64, carry: f64, sigma: f64, t: f64) -> f64 {
    d1(spot, strike, rate, carry, sigma, t) - sigma * t.sqrt()
}

/// Theoretical option price.
///
/// # Arguments
/// * `rate` - continuously compounded risk-free rate
/// * `carry` - dividend/carry yield
/// * `t` - time to expiry in years, must be > 0
#[must_use]
pub fn price(
    right: OptionRight,
    spot: f64,
    strike: f64,
    rate: f64,
    carry: f64,
    sigma: f64,
    t: f64,
) -> f64 {
    debug_assert!(t > 0.0 && sigma > 0.0 && spot > 0.0 && strike > 0.0);
    let d1 = d1(spot, strike, rate, carry, sigma, t);
    let d2 = d2(spot, strike, rate, carry, sigma, t);
    let disc_spot = spot * (-carry * t).exp();
    let disc_strike = strike * (-rate * t).exp();
    match right {
        OptionRight::Call => disc_spot * norm_cdf(d1) - disc_strike * norm_cdf(d2),
        OptionRight::Put => disc_strike * norm_cdf(-d2) - disc_spot * norm_cdf(-d1),
    }
}

/// Option delta. Calls in (0, 1), puts in (-1, 0).
#[must_use]
pub fn delta(
    right: OptionRight,
    spot: f64,
    strike: f64,
    rate: f64,
    carry: f64,
    sigma: f64,
    t: f64,
) -> f64 {
    debug_assert!(t > 0.0 && sigma > 0.0 && spot > 0.0 && strike > 0.0);
    let nd1 = norm_cdf(d1(spot, strike, rate, carry, sigma, t));
    let decay = (-carry * t).exp();
    match right {
        OptionRight::Call => decay * nd1,
        OptionRight::Put => decay * (nd1 - 1.0),
    }
}
