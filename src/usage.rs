//! Token usage accounting.
//!
//! Per-turn stats are computed once from raw counters; conversation totals are
//! the field-wise sum of every per-turn record merged into them. Merging is not
//! idempotent: callers merge each delta exactly once.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Default USD price per million input tokens.
pub const DEFAULT_INPUT_PRICE_PER_MILLION: f64 = 3.0;
/// Default USD price per million output tokens.
pub const DEFAULT_OUTPUT_PRICE_PER_MILLION: f64 = 15.0;

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// Fixed per-million token prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Pricing {
    /// Creates a price table; negative (or NaN) prices are clamped to zero.
    #[must_use]
    pub fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million: non_negative(input_per_million),
            output_per_million: non_negative(output_per_million),
        }
    }
}

impl Default for Pricing {
    fn default() -> Self {
        Self::new(
            DEFAULT_INPUT_PRICE_PER_MILLION,
            DEFAULT_OUTPUT_PRICE_PER_MILLION,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
}

impl UsageStats {
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Builds a per-turn record from raw counters.
    #[must_use]
    pub fn from_tokens(input_tokens: u64, output_tokens: u64, pricing: &Pricing) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
            estimated_cost: compute_cost(input_tokens, output_tokens, pricing),
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0
            && self.output_tokens == 0
            && self.total_tokens == 0
            && self.estimated_cost == 0.0
    }
}

impl Add for UsageStats {
    type Output = Self;

    fn add(self, delta: Self) -> Self {
        merge_usage(&self, &delta)
    }
}

impl AddAssign for UsageStats {
    fn add_assign(&mut self, delta: Self) {
        *self = merge_usage(self, &delta);
    }
}

/// Cost in USD of the given token counts.
#[must_use]
pub fn compute_cost(input_tokens: u64, output_tokens: u64, pricing: &Pricing) -> f64 {
    let input = input_tokens as f64 / TOKENS_PER_MILLION * non_negative(pricing.input_per_million);
    let output =
        output_tokens as f64 / TOKENS_PER_MILLION * non_negative(pricing.output_per_million);
    input + output
}

/// Field-wise sum of `total` and `delta`.
#[must_use]
pub fn merge_usage(total: &UsageStats, delta: &UsageStats) -> UsageStats {
    UsageStats {
        input_tokens: total.input_tokens.saturating_add(delta.input_tokens),
        output_tokens: total.output_tokens.saturating_add(delta.output_tokens),
        total_tokens: total.total_tokens.saturating_add(delta.total_tokens),
        estimated_cost: total.estimated_cost + delta.estimated_cost,
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_nan() || value < 0.0 {
        0.0
    } else {
        value
    }
}
