//! Model pricing table
//!
//! Prices are expressed per thousand tokens, separately for input (prompt)
//! and output (completion) tokens. The built-in table covers the models the
//! evaluation step supports out of the box; configuration may add entries or
//! override prices before the ledger is built. Once handed to a ledger the
//! table is never mutated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model used when the configuration does not name one
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Pricing for a single model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per thousand input tokens ($/K)
    #[serde(rename = "input-per-thousand")]
    pub input_price_per_thousand: f64,

    /// Price per thousand output tokens ($/K)
    #[serde(rename = "output-per-thousand")]
    pub output_price_per_thousand: f64,

    #[serde(default)]
    pub description: String,
}

impl ModelPricing {
    /// Cost in USD of the given token counts at this model's prices
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_price_per_thousand
            + (output_tokens as f64 / 1000.0) * self.output_price_per_thousand
    }
}

/// Mapping from model identifier to pricing
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PricingTable {
    models: BTreeMap<String, ModelPricing>,
}

impl PricingTable {
    /// Creates an empty table
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in pricing table
    ///
    /// | Model | Input $/K | Output $/K |
    /// |-------|-----------|------------|
    /// | gpt-4o | 0.005 | 0.015 |
    /// | gpt-4o-mini | 0.00015 | 0.0006 |
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.insert(
            "gpt-4o",
            ModelPricing {
                input_price_per_thousand: 0.005,
                output_price_per_thousand: 0.015,
                description: "Most capable model, higher cost".to_string(),
            },
        );
        table.insert(
            DEFAULT_MODEL,
            ModelPricing {
                input_price_per_thousand: 0.00015,
                output_price_per_thousand: 0.0006,
                description: "Cost-effective model, good for most evaluations".to_string(),
            },
        );
        table
    }

    /// Built-in table with configured entries layered on top
    pub fn with_overrides(overrides: &BTreeMap<String, ModelPricing>) -> Self {
        let mut table = Self::builtin();
        for (model, pricing) in overrides {
            table.insert(model, pricing.clone());
        }
        table
    }

    /// Adds or replaces a model entry
    pub fn insert(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.models.insert(model.into(), pricing);
    }

    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.models.get(model)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    /// Model identifiers in sorted order
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}
