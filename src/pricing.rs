//! Cost estimation from token counts.
//!
//! Rates are fixed per model family and expressed in USD per million tokens. A model is
//! priced at the premium tier when its identifier contains [`PREMIUM_MARKER`].

use crate::models::UsageData;

/// Substring identifying premium-tier models.
pub const PREMIUM_MARKER: &str = "opus";

/// USD per 1,000,000 tokens for each token class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRates {
    pub input: f64,
    pub cache_creation: f64,
    pub cache_read: f64,
    pub output: f64,
}

pub const PREMIUM_RATES: ModelRates = ModelRates {
    input: 15.00,
    cache_creation: 18.75,
    cache_read: 1.50,
    output: 75.00,
};

pub const STANDARD_RATES: ModelRates = ModelRates {
    input: 3.00,
    cache_creation: 3.75,
    cache_read: 0.30,
    output: 15.00,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingTier {
    Premium,
    Standard,
}

impl PricingTier {
    pub fn for_model(model: &str) -> Self {
        if model.contains(PREMIUM_MARKER) {
            PricingTier::Premium
        } else {
            PricingTier::Standard
        }
    }

    pub fn rates(self) -> ModelRates {
        match self {
            PricingTier::Premium => PREMIUM_RATES,
            PricingTier::Standard => STANDARD_RATES,
        }
    }
}

pub struct PricingManager;

impl PricingManager {
    /// Estimated cost in USD, rounded to 4 decimal places
    pub fn calculate_cost_from_tokens(usage: &UsageData, model_name: &str) -> f64 {
        let rates = PricingTier::for_model(model_name).rates();

        let cost = usage.input_tokens as f64 * rates.input / 1e6
            + usage.cache_creation_input_tokens as f64 * rates.cache_creation / 1e6
            + usage.cache_read_input_tokens as f64 * rates.cache_read / 1e6
            + usage.output_tokens as f64 * rates.output / 1e6;

        round_four_places(cost)
    }
}

fn round_four_places(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
