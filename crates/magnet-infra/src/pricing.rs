//! Cost estimation for AI calls.
//!
//! Providers rarely report cost, so the AI client estimates it from token
//! counts with a built-in per-model table. Estimates are approximate.

/// Pricing entry, USD per million tokens.
struct PricingEntry {
    model_pattern: &'static str,
    input_cost_per_million: f64,
    output_cost_per_million: f64,
}

/// Conservative fallback pricing when no model matches.
const FALLBACK_INPUT_COST: f64 = 5.0;
const FALLBACK_OUTPUT_COST: f64 = 15.0;

/// More specific patterns first: matching stops at the first prefix hit.
const PRICING_TABLE: &[PricingEntry] = &[
    PricingEntry {
        model_pattern: "gpt-4o-mini",
        input_cost_per_million: 0.15,
        output_cost_per_million: 0.60,
    },
    PricingEntry {
        model_pattern: "gpt-4o",
        input_cost_per_million: 2.50,
        output_cost_per_million: 10.0,
    },
    PricingEntry {
        model_pattern: "gpt-4.1-mini",
        input_cost_per_million: 0.40,
        output_cost_per_million: 1.60,
    },
    PricingEntry {
        model_pattern: "gpt-4.1",
        input_cost_per_million: 2.0,
        output_cost_per_million: 8.0,
    },
    PricingEntry {
        model_pattern: "o4-mini",
        input_cost_per_million: 1.10,
        output_cost_per_million: 4.40,
    },
    PricingEntry {
        model_pattern: "computer-use-preview",
        input_cost_per_million: 3.0,
        output_cost_per_million: 12.0,
    },
];

/// Estimate the cost of one call in USD. The model is matched by prefix,
/// so `gpt-4o` matches `gpt-4o-2024-08-06`.
pub fn estimate_cost(input_tokens: u64, output_tokens: u64, model: &str) -> f64 {
    let (input_rate, output_rate) = PRICING_TABLE
        .iter()
        .find(|entry| model.starts_with(entry.model_pattern))
        .map(|entry| (entry.input_cost_per_million, entry.output_cost_per_million))
        .unwrap_or((FALLBACK_INPUT_COST, FALLBACK_OUTPUT_COST));

    (input_tokens as f64 / 1_000_000.0) * input_rate + (output_tokens as f64 / 1_000_000.0) * output_rate
}

/// Always prefixed with `~`: `~$0.001` below one cent, `~$0.12` above.
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("~${cost:.3}")
    } else {
        format!("~${cost:.2}")
    }
}
