//! Workflow domain types.
//!
//! A `Workflow` is an ordered list of `WorkflowStep`s. Steps are identified by
//! their 1-indexed `step_order`; dependencies are either declared explicitly
//! through `depends_on` or implied by order (every earlier step).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A tenant-owned workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: String,
    pub tenant_id: String,
    pub workflow_name: String,
    /// Steps in declaration order. `step_order` is authoritative, not position.
    pub steps: Vec<WorkflowStep>,
    /// Inject the tracking script into HTML deliverables.
    #[serde(default = "default_true")]
    pub tracking_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Workflow {
    /// Steps sorted by ascending `step_order`. `step_index` values used by
    /// the coordinator are positions in this list.
    pub fn sorted_steps(&self) -> Vec<WorkflowStep> {
        let mut steps = self.steps.clone();
        steps.sort_by_key(|s| s.step_order);
        steps
    }
}

// ---------------------------------------------------------------------------
// Step definition
// ---------------------------------------------------------------------------

/// A single declared step. Immutable once a job starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// 1-indexed position, unique within a workflow.
    pub step_order: u32,
    pub step_name: String,
    /// Declared type. `None` means `ai_generation` unless `webhook_url` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_type: Option<StepType>,
    /// Explicit dependencies by `step_order`. `None` = depends on every earlier step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<u32>>,

    // -- AI generation / HTML generation --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_html: Option<String>,

    // -- Webhook --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_method: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub webhook_headers: HashMap<String, String>,
    /// Include the form submission in the payload (default true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_include_submission: Option<bool>,
    #[serde(default)]
    pub webhook_include_context: bool,

    // -- Browser automation --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_start_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_max_actions: Option<u32>,

    // -- Handoff --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_workflow_id: Option<String>,
    #[serde(default)]
    pub handoff_payload_mode: HandoffPayloadMode,
}

impl WorkflowStep {
    /// Whether this step carries a non-empty webhook URL.
    pub fn has_webhook_url(&self) -> bool {
        self.webhook_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    pub fn includes_submission(&self) -> bool {
        self.webhook_include_submission.unwrap_or(true)
    }

    /// Declared type, defaulting to `ai_generation`.
    pub fn declared_type(&self) -> StepType {
        self.step_type.unwrap_or(StepType::AiGeneration)
    }
}

/// Step-type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    AiGeneration,
    Webhook,
    BrowserAutomation,
    HtmlGeneration,
    Handoff,
}

impl StepType {
    pub const ALL: [StepType; 5] = [
        StepType::AiGeneration,
        StepType::Webhook,
        StepType::BrowserAutomation,
        StepType::HtmlGeneration,
        StepType::Handoff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::AiGeneration => "ai_generation",
            StepType::Webhook => "webhook",
            StepType::BrowserAutomation => "browser_automation",
            StepType::HtmlGeneration => "html_generation",
            StepType::Handoff => "handoff",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown step type '{s}'"))
    }
}

/// What a handoff step forwards to the target workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffPayloadMode {
    /// Output of the most recent completed step.
    #[default]
    PreviousStepOutput,
    /// The whole accumulated context.
    FullContext,
    /// Only the original form submission.
    SubmissionOnly,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_deserializes_with_defaults() {
        let step: WorkflowStep = serde_json::from_str(
            r#"{"step_order": 1, "step_name": "Research", "instructions": "Find facts"}"#,
        )
        .unwrap();
        assert_eq!(step.step_order, 1);
        assert!(step.step_type.is_none());
        assert!(step.depends_on.is_none());
        assert_eq!(step.declared_type(), StepType::AiGeneration);
        assert!(step.includes_submission());
        assert!(!step.webhook_include_context);
        assert_eq!(step.handoff_payload_mode, HandoffPayloadMode::PreviousStepOutput);
    }

    #[test]
    fn test_explicit_empty_depends_on_is_preserved() {
        let step: WorkflowStep = serde_json::from_str(
            r#"{"step_order": 2, "step_name": "Parallel", "depends_on": []}"#,
        )
        .unwrap();
        assert_eq!(step.depends_on, Some(vec![]));
    }

    #[test]
    fn test_has_webhook_url_ignores_blank() {
        let mut step = WorkflowStep {
            step_order: 1,
            step_name: "Notify".to_string(),
            webhook_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(!step.has_webhook_url());
        step.webhook_url = Some("https://hooks.example.com/x".to_string());
        assert!(step.has_webhook_url());
    }

    #[test]
    fn test_step_type_string_forms() {
        for t in StepType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            assert_eq!(t.as_str().parse::<StepType>().unwrap(), t);
        }
        assert!("pdf_generation".parse::<StepType>().is_err());
    }

    #[test]
    fn test_sorted_steps_orders_by_step_order() {
        let wf = Workflow {
            workflow_id: "wf".to_string(),
            tenant_id: "t".to_string(),
            workflow_name: "Checklist".to_string(),
            steps: vec![
                WorkflowStep {
                    step_order: 2,
                    step_name: "b".to_string(),
                    ..Default::default()
                },
                WorkflowStep {
                    step_order: 1,
                    step_name: "a".to_string(),
                    ..Default::default()
                },
            ],
            tracking_enabled: true,
        };
        let names: Vec<String> = wf.sorted_steps().into_iter().map(|s| s.step_name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
