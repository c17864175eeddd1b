//! Workflow CLI subcommands: add, list and plan.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use console::style;
use magnet_core::ports::WorkflowStore;
use magnet_core::workflow::dag::{dependencies_of, resolve};
use magnet_types::workflow::Workflow;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Register or replace a workflow from a JSON or TOML file.
    Add {
        /// Path to the workflow definition file.
        file: PathBuf,
    },

    /// List registered workflows.
    #[command(alias = "ls")]
    List,

    /// Show the resolved execution groups of a workflow.
    Plan {
        /// Workflow ID.
        workflow_id: String,
    },
}

pub async fn handle_workflow_command(
    cmd: WorkflowCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        WorkflowCommand::Add { file } => handle_add(&file, state, json).await,
        WorkflowCommand::List => handle_list(state, json).await,
        WorkflowCommand::Plan { workflow_id } => handle_plan(&workflow_id, state, json).await,
    }
}

// ---------------------------------------------------------------------------
// Add
// ---------------------------------------------------------------------------

/// Parse a definition, choosing TOML for `.toml` files and JSON otherwise.
fn parse_definition(path: &Path, contents: &str) -> Result<Workflow> {
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(contents).context("Failed to parse workflow TOML")
    } else {
        serde_json::from_str(contents).context("Failed to parse workflow JSON")
    }
}

async fn handle_add(file: &Path, state: &AppState, json: bool) -> Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let workflow = parse_definition(file, &contents)?;

    // Reject cycles and dangling references before anything is stored
    let plan = resolve(&workflow.steps).context("Workflow validation failed")?;

    state
        .workflows
        .save_workflow(&workflow)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to save workflow: {e}"))?;

    if json {
        let out = serde_json::json!({
            "workflow_id": workflow.workflow_id,
            "workflow_name": workflow.workflow_name,
            "tenant_id": workflow.tenant_id,
            "steps": workflow.steps.len(),
            "execution_plan": plan.summary(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} Saved workflow '{}'",
            style("*").green().bold(),
            style(&workflow.workflow_name).cyan()
        );
        println!("  ID: {}", workflow.workflow_id);
        println!("  Tenant: {}", workflow.tenant_id);
        println!("  Steps: {} in {} group(s)", plan.total_steps(), plan.group_count());
        println!();
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

async fn handle_list(state: &AppState, json: bool) -> Result<()> {
    let workflows = state
        .workflows
        .list_workflows()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list workflows: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflows)?);
        return Ok(());
    }

    if workflows.is_empty() {
        println!();
        println!("  No workflows found.");
        println!("  Add one with: {}", style("magnet workflow add <file>").cyan());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "Name", "Tenant", "Steps", "Tracking"]);

    for wf in &workflows {
        table.add_row(vec![
            Cell::new(&wf.workflow_id).fg(Color::Cyan),
            Cell::new(&wf.workflow_name),
            Cell::new(&wf.tenant_id),
            Cell::new(wf.steps.len()),
            Cell::new(if wf.tracking_enabled { "on" } else { "off" }),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

async fn handle_plan(workflow_id: &str, state: &AppState, json: bool) -> Result<()> {
    let workflow = state
        .workflows
        .get_workflow(workflow_id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load workflow: {e}"))?
        .with_context(|| format!("Workflow '{workflow_id}' not found"))?;
    let plan = resolve(&workflow.steps).context("Workflow validation failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan.summary())?);
        return Ok(());
    }

    let steps = workflow.sorted_steps();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Group", "Order", "Name", "Type", "Depends on"]);

    for (group_index, group) in plan.groups().iter().enumerate() {
        for order in group {
            let Some(step) = steps.iter().find(|s| s.step_order == *order) else {
                continue;
            };
            let deps: Vec<String> = dependencies_of(step, &steps)
                .iter()
                .map(u32::to_string)
                .collect();
            table.add_row(vec![
                Cell::new(group_index + 1).fg(Color::Yellow),
                Cell::new(step.step_order),
                Cell::new(&step.step_name).fg(Color::Cyan),
                Cell::new(step.declared_type()),
                Cell::new(if deps.is_empty() { "-".to_string() } else { deps.join(", ") }),
            ]);
        }
    }

    println!();
    println!(
        "  {} {} ({} steps, {} groups)",
        style("Plan for").bold(),
        style(&workflow.workflow_name).cyan(),
        plan.total_steps(),
        plan.group_count()
    );
    println!("{table}");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use magnet_types::workflow::StepType;

    #[test]
    fn test_parse_json_definition() {
        let contents = r#"{
            "workflow_id": "wf-1",
            "tenant_id": "tenant-1",
            "workflow_name": "Checklist",
            "steps": [
                {"step_order": 1, "step_name": "Research"},
                {"step_order": 2, "step_name": "Render", "step_type": "html_generation"}
            ]
        }"#;
        let wf = parse_definition(Path::new("wf.json"), contents).unwrap();
        assert_eq!(wf.steps.len(), 2);
        assert!(wf.tracking_enabled);
        assert_eq!(wf.steps[1].declared_type(), StepType::HtmlGeneration);
    }

    #[test]
    fn test_parse_toml_definition() {
        let contents = r#"
workflow_id = "wf-2"
tenant_id = "tenant-1"
workflow_name = "Audit"
tracking_enabled = false

[[steps]]
step_order = 1
step_name = "Notify"
step_type = "webhook"
webhook_url = "https://hooks.example.com/in"

[[steps]]
step_order = 2
step_name = "Summarize"
depends_on = []
"#;
        let wf = parse_definition(Path::new("audit.TOML"), contents).unwrap();
        assert!(!wf.tracking_enabled);
        assert!(wf.steps[0].has_webhook_url());
        assert_eq!(wf.steps[1].depends_on.as_deref(), Some(&[][..]));

        let plan = resolve(&wf.steps).unwrap();
        assert_eq!(plan.groups(), &[vec![1, 2]]);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = parse_definition(Path::new("bad.json"), "{not json").unwrap_err();
        assert!(err.to_string().contains("JSON"));
    }
}
