//! Accumulated text context threaded between steps.
//!
//! The context is one growing string: each completed step's output is
//! appended as a `--- Step {order}: {name} ---` section. Generation steps
//! receive it together with the formatted form submission through
//! [`build_input_text`].

use magnet_types::job::ExecutionStepRecord;
use serde_json::Value;

/// Delimiter between accumulated context and the current step's context.
pub const CURRENT_STEP_DELIMITER: &str = "--- Current Step Context ---";

// ---------------------------------------------------------------------------
// ContextAccumulator
// ---------------------------------------------------------------------------

/// Outputs of completed steps, in the order they were merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextAccumulator {
    text: String,
}

impl ContextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from recorded history: completed workflow-step records whose
    /// `step_order` passes `include`, in ascending `step_order`.
    pub fn from_records(
        records: &[ExecutionStepRecord],
        include: impl Fn(u32) -> bool,
    ) -> Self {
        let mut selected: Vec<&ExecutionStepRecord> = records
            .iter()
            .filter(|r| r.is_completed() && !r.is_final_output() && include(r.step_order))
            .collect();
        selected.sort_by_key(|r| r.step_order);

        let mut ctx = Self::new();
        for record in selected {
            if let Some(output) = &record.output {
                ctx.append(record.step_order, &record.step_name, output);
            }
        }
        ctx
    }

    /// Append one step's output section.
    pub fn append(&mut self, step_order: u32, step_name: &str, output: &str) {
        if !self.text.is_empty() {
            self.text.push_str("\n\n");
        }
        self.text.push_str(&format_step_section(step_order, step_name, output));
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// `--- Step {order}: {name} ---\n{output}`
pub fn format_step_section(step_order: u32, step_name: &str, output: &str) -> String {
    format!("--- Step {step_order}: {step_name} ---\n{output}")
}

/// Model input for a step: previous context, delimiter, current context.
/// Without previous context the current context is used as-is.
pub fn build_input_text(previous_context: &str, current_context: &str) -> String {
    if previous_context.is_empty() {
        current_context.to_string()
    } else {
        format!("{previous_context}\n\n{CURRENT_STEP_DELIMITER}\n{current_context}")
    }
}

/// Render form submission data as the current-step context.
///
/// Objects become one `key: value` line per field; strings are unquoted.
pub fn format_submission(submission: &Value) -> String {
    let body = match submission {
        Value::Object(map) if map.is_empty() => return String::new(),
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            fields
                .into_iter()
                .map(|(key, value)| format!("{key}: {}", render_value(value)))
                .collect::<Vec<_>>()
                .join("\n")
        }
        Value::Null => return String::new(),
        other => render_value(other),
    };
    format!("Form Submission:\n{body}")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
