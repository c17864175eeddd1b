//! Job CLI subcommands: submit, run, step, show and list.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use console::style;
use magnet_core::ports::{JobStore, WorkflowStore};
use magnet_core::workflow::ProcessOutcome;
use magnet_infra::pricing::format_cost;
use magnet_types::job::{Job, JobStatus, StepStatus};
use magnet_types::workflow::StepType;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum JobCommand {
    /// Create a pending job for a workflow from a form submission.
    Submit {
        /// Workflow ID.
        workflow_id: String,

        /// Submission data as a JSON object.
        #[arg(long, short = 'd', default_value = "{}")]
        data: String,
    },

    /// Run every remaining step of a job, then finalize it.
    Run {
        /// Job ID.
        job_id: String,
    },

    /// Run exactly one step (`-1` with `--type html_generation` finalizes).
    Step {
        /// Job ID.
        job_id: String,

        /// Zero-based index into the workflow's steps sorted by order.
        #[arg(allow_hyphen_values = true)]
        step_index: i64,

        /// Step type the caller expects at this index.
        #[arg(long = "type", value_name = "STEP_TYPE")]
        step_type: StepType,
    },

    /// Show a job with its execution history, artifacts and usage.
    Show {
        /// Job ID.
        job_id: String,
    },

    /// List recent jobs.
    #[command(alias = "ls")]
    List {
        /// Maximum number of jobs to show.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

pub async fn handle_job_command(cmd: JobCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        JobCommand::Submit { workflow_id, data } => {
            handle_submit(&workflow_id, &data, state, json).await
        }
        JobCommand::Run { job_id } => {
            let outcome = state.coordinator.process_job(&job_id).await;
            report_outcome(&job_id, &outcome, json)
        }
        JobCommand::Step {
            job_id,
            step_index,
            step_type,
        } => {
            let outcome = state
                .coordinator
                .process_single_step(&job_id, step_index, step_type)
                .await;
            report_outcome(&job_id, &outcome, json)
        }
        JobCommand::Show { job_id } => handle_show(&job_id, state, json).await,
        JobCommand::List { limit } => handle_list(limit, state, json).await,
    }
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

async fn handle_submit(workflow_id: &str, data: &str, state: &AppState, json: bool) -> Result<()> {
    let submission: serde_json::Value =
        serde_json::from_str(data).context("Submission data must be valid JSON")?;
    if !submission.is_object() {
        anyhow::bail!("Submission data must be a JSON object");
    }

    let workflow = state
        .workflows
        .get_workflow(workflow_id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load workflow: {e}"))?
        .with_context(|| format!("Workflow '{workflow_id}' not found"))?;

    let job = Job::new(
        uuid::Uuid::now_v7().to_string(),
        &workflow.tenant_id,
        &workflow.workflow_id,
        submission,
    );
    state
        .jobs
        .create_job(&job)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create job: {e}"))?;

    if json {
        let out = serde_json::json!({
            "job_id": job.job_id,
            "workflow_id": job.workflow_id,
            "status": job.status,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} Submitted job for '{}'",
            style("*").green().bold(),
            style(&workflow.workflow_name).cyan()
        );
        println!("  Job ID: {}", job.job_id);
        println!("  Run it with: {}", style(format!("magnet job run {}", job.job_id)).cyan());
        println!();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Run / Step
// ---------------------------------------------------------------------------

fn report_outcome(job_id: &str, outcome: &ProcessOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else if outcome.skipped {
        println!();
        println!("  {} Nothing to do for job {job_id}", style("-").dim());
        println!();
    } else if outcome.success {
        println!();
        match (outcome.step_index, outcome.step_type.as_deref()) {
            (Some(index), Some(step_type)) => println!(
                "  {} Step {index} ({step_type}) completed",
                style("*").green().bold()
            ),
            _ => println!("  {} Job {job_id} completed", style("*").green().bold()),
        }
        if let Some(url) = &outcome.output_url {
            println!("  Output: {}", style(url).cyan());
        }
        println!();
    }

    if !outcome.success {
        let error_type = outcome.error_type.as_deref().unwrap_or("Error");
        let message = outcome.error.as_deref().unwrap_or("unknown error");
        anyhow::bail!("{error_type}: {message}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Show
// ---------------------------------------------------------------------------

fn styled_status(status: JobStatus) -> String {
    let label = status.as_str();
    match status {
        JobStatus::Completed => style(label).green().to_string(),
        JobStatus::Failed => style(label).red().to_string(),
        JobStatus::Running => style(label).yellow().to_string(),
        JobStatus::Pending => style(label).dim().to_string(),
    }
}

async fn handle_show(job_id: &str, state: &AppState, json: bool) -> Result<()> {
    let job = state
        .jobs
        .get_job(job_id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load job: {e}"))?
        .with_context(|| format!("Job '{job_id}' not found"))?;
    let steps = state
        .jobs
        .load_execution_steps(&job)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load execution history: {e}"))?;
    let artifacts = state
        .artifacts
        .list_for_job(job_id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list artifacts: {e}"))?;
    let usage = state
        .usage
        .totals_for_job(job_id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load usage: {e}"))?;

    if json {
        let mut job = job;
        job.execution_steps = steps;
        let out = serde_json::json!({
            "job": job,
            "artifacts": artifacts,
            "usage": usage,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("Job").bold(), style(&job.job_id).cyan());
    println!("  Workflow: {}", job.workflow_id);
    println!("  Status:   {}", styled_status(job.status));
    if let Some(plan) = &job.execution_plan {
        let groups: Vec<String> = plan
            .execution_groups
            .iter()
            .map(|g| format!("{g:?}"))
            .collect();
        println!("  Plan:     {}", groups.join(" -> "));
    }
    if let (Some(error_type), Some(message)) = (&job.error_type, &job.error_message) {
        println!("  Error:    {} {}", style(error_type).red(), message);
    }
    if let Some(url) = &job.output_url {
        println!("  Output:   {}", style(url).cyan());
    }

    if !steps.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Order", "Name", "Type", "Status", "Duration"]);
        for record in &steps {
            let status = match record.status {
                StepStatus::Completed => Cell::new("completed").fg(Color::Green),
                StepStatus::Failed => Cell::new("failed").fg(Color::Red),
            };
            table.add_row(vec![
                Cell::new(record.step_order),
                Cell::new(&record.step_name).fg(Color::Cyan),
                Cell::new(record.details.step_type()),
                status,
                Cell::new(
                    record
                        .duration_ms
                        .map(|ms| format!("{ms} ms"))
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ]);
        }
        println!();
        println!("{table}");
    }

    if !artifacts.is_empty() {
        println!();
        println!("  {}", style("Artifacts").bold());
        for artifact in &artifacts {
            println!(
                "    {} {} ({}, {} bytes)",
                style(&artifact.artifact_id).dim(),
                artifact.filename,
                artifact.artifact_type,
                artifact.size_bytes
            );
        }
    }

    if usage.calls > 0 {
        println!();
        println!(
            "  Usage: {} call(s), {} tokens ({} in / {} out), {}",
            usage.calls,
            usage.total_tokens,
            usage.input_tokens,
            usage.output_tokens,
            format_cost(usage.cost_usd)
        );
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

async fn handle_list(limit: u32, state: &AppState, json: bool) -> Result<()> {
    let jobs = state
        .jobs
        .list_jobs(limit)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list jobs: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!();
        println!("  No jobs found.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Job", "Workflow", "Status", "Created", "Output"]);
    for job in &jobs {
        table.add_row(vec![
            Cell::new(&job.job_id).fg(Color::Cyan),
            Cell::new(&job.workflow_id),
            Cell::new(job.status.as_str()),
            Cell::new(job.created_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(job.output_url.as_deref().unwrap_or("-")),
        ]);
    }
    println!();
    println!("{table}");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_outcome_becomes_error() {
        let outcome = ProcessOutcome {
            success: false,
            error: Some("boom".into()),
            error_type: Some("StepExecutionError".into()),
            ..Default::default()
        };
        let err = report_outcome("job-1", &outcome, true).unwrap_err();
        assert_eq!(err.to_string(), "StepExecutionError: boom");
    }

    #[test]
    fn test_skipped_outcome_is_ok() {
        let outcome = ProcessOutcome {
            success: true,
            skipped: true,
            ..Default::default()
        };
        assert!(report_outcome("job-1", &outcome, false).is_ok());
    }
}
