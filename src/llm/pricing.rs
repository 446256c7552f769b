//! Per-model token pricing for cost reporting.

use std::collections::HashMap;

use super::backend::TokenUsage;
use crate::config::ModelPrice;

/// Built-in prices (USD per million tokens) for the Claude 3 family.
fn builtin_price(model: &str) -> Option<ModelPrice> {
    let (input, output) = match model {
        "claude-3-opus-20240229" => (15.00, 75.00),
        "claude-3-sonnet-20240229" => (3.00, 15.00),
        "claude-3-haiku-20240307" => (0.25, 1.25),
        _ => return None,
    };
    Some(ModelPrice {
        input_per_mtok: input,
        output_per_mtok: output,
    })
}

/// Price lookup: configured overrides first, then the built-in table.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    overrides: HashMap<String, ModelPrice>,
}

impl PriceTable {
    pub fn new(overrides: HashMap<String, ModelPrice>) -> Self {
        Self { overrides }
    }

    pub fn price(&self, model: &str) -> Option<ModelPrice> {
        self.overrides
            .get(model)
            .copied()
            .or_else(|| builtin_price(model))
    }

    /// Cost in USD of `usage` on `model`. `None` when the model has no known
    /// price or the provider reported no token counts.
    pub fn cost(&self, model: &str, usage: TokenUsage) -> Option<f64> {
        let price = self.price(model)?;
        if usage.input_tokens.is_none() && usage.output_tokens.is_none() {
            return None;
        }
        let input = usage.input_tokens.unwrap_or(0) as f64 / 1_000_000.0;
        let output = usage.output_tokens.unwrap_or(0) as f64 / 1_000_000.0;
        Some(input * price.input_per_mtok + output * price.output_per_mtok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u64, output: u64) -> TokenUsage {
        TokenUsage {
            input_tokens: Some(input),
            output_tokens: Some(output),
        }
    }

    #[test]
    fn haiku_cost_matches_published_rates() {
        let table = PriceTable::default();
        let cost = table
            .cost("claude-3-haiku-20240307", usage(1_000_000, 1_000_000))
            .unwrap();
        assert!((cost - 1.50).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_has_no_cost() {
        let table = PriceTable::default();
        assert!(table.cost("llama3:instruct", usage(10, 10)).is_none());
    }

    #[test]
    fn override_beats_builtin() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "claude-3-opus-20240229".to_string(),
            ModelPrice {
                input_per_mtok: 1.0,
                output_per_mtok: 1.0,
            },
        );
        let table = PriceTable::new(overrides);
        let cost = table
            .cost("claude-3-opus-20240229", usage(500_000, 500_000))
            .unwrap();
        assert!((cost - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_reported_tokens_means_no_cost() {
        let table = PriceTable::default();
        assert!(
            table
                .cost("claude-3-opus-20240229", TokenUsage::default())
                .is_none()
        );
    }
}
