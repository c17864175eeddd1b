//! In-memory stores and mock collaborators shared by the unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use magnet_types::error::RepositoryError;
use magnet_types::job::{
    AppendedSteps, ExecutionStepRecord, Job, JobUpdate, StepAppend, StepDetails,
};
use magnet_types::workflow::{StepType, Workflow, WorkflowStep};
use serde_json::Value;
use uuid::Uuid;

use crate::ports::{
    AiError, AiProvider, AiRequest, AiResponse, ArtifactStore, BoxFuture, BrowserDriver,
    BrowserRun, BrowserSession, CollaboratorError, Collaborators, HandoffRequest, HandoffTrigger,
    JobNotification, JobStore, NewArtifact, Notifier, UsageRecord, UsageRecorder, WebhookRequest,
    WebhookResponse, WebhookTransport, WorkflowStore,
};
use crate::workflow::error::StepError;
use crate::workflow::registry::{StepHandler, StepInvocation, StepOutcome};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn step(order: u32, step_type: StepType) -> WorkflowStep {
    WorkflowStep {
        step_order: order,
        step_name: format!("step {order}"),
        step_type: Some(step_type),
        instructions: Some(format!("s{order}")),
        ..Default::default()
    }
}

pub fn invocation(step: WorkflowStep) -> StepInvocation {
    StepInvocation {
        step,
        step_index: 0,
        job_id: "job-1".to_string(),
        tenant_id: "tenant-1".to_string(),
        submission: Value::Null,
        previous_context: String::new(),
        current_context: String::new(),
        prior_results: Vec::new(),
        history: Arc::new(Vec::new()),
    }
}

pub fn completed_record(order: u32, name: &str) -> ExecutionStepRecord {
    let mut r = ExecutionStepRecord::completed(
        order,
        name,
        StepDetails::empty_for(StepType::AiGeneration),
    );
    r.output = Some(format!("output {order}"));
    r
}

pub fn workflow(workflow_id: &str, steps: Vec<WorkflowStep>) -> Workflow {
    Workflow {
        workflow_id: workflow_id.to_string(),
        tenant_id: "tenant-1".to_string(),
        workflow_name: "Lead magnet".to_string(),
        steps,
        tracking_enabled: true,
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Job store backed by `DashMap`. With offload enabled every history write
/// goes to a blob map and only the pointer is kept on the job.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<String, Job>,
    blobs: DashMap<String, Vec<ExecutionStepRecord>>,
    offload: bool,
    pub updates: AtomicUsize,
}

impl InMemoryJobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_offload() -> Arc<Self> {
        Arc::new(Self {
            offload: true,
            ..Default::default()
        })
    }

    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.jobs.get(job_id).map(|j| j.clone())
    }

    /// Overwrite the canonical history, as another invocation would.
    pub fn set_steps(&self, job_id: &str, steps: Vec<ExecutionStepRecord>) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            self.write_steps(&mut job, steps);
        }
    }

    pub fn canonical_steps(&self, job_id: &str) -> Vec<ExecutionStepRecord> {
        let Some(job) = self.job(job_id) else {
            return Vec::new();
        };
        match &job.execution_steps_s3_key {
            Some(key) => self.blobs.get(key).map(|b| b.clone()).unwrap_or_default(),
            None => job.execution_steps,
        }
    }

    fn write_steps(&self, job: &mut Job, steps: Vec<ExecutionStepRecord>) {
        if self.offload {
            let key = format!("jobs/{}/execution_steps.json", job.job_id);
            self.blobs.insert(key.clone(), steps);
            job.execution_steps_s3_key = Some(key);
            job.execution_steps.clear();
        } else {
            job.execution_steps = steps;
        }
    }
}

impl JobStore for InMemoryJobStore {
    async fn create_job(&self, job: &Job) -> Result<(), RepositoryError> {
        self.jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, RepositoryError> {
        Ok(self.job(job_id))
    }

    async fn update_job(&self, job_id: &str, mut update: JobUpdate) -> Result<(), RepositoryError> {
        let mut job = self.jobs.get_mut(job_id).ok_or(RepositoryError::NotFound)?;
        if let Some(steps) = update.execution_steps.take() {
            self.write_steps(&mut job, steps);
        }
        update.apply_to(&mut job);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_execution_steps(
        &self,
        job: &Job,
    ) -> Result<Vec<ExecutionStepRecord>, RepositoryError> {
        match &job.execution_steps_s3_key {
            Some(key) => self
                .blobs
                .get(key)
                .map(|b| b.clone())
                .ok_or_else(|| RepositoryError::Blob(format!("missing blob {key}"))),
            None => Ok(job.execution_steps.clone()),
        }
    }

    async fn append_execution_step(
        &self,
        job_id: &str,
        append: StepAppend,
    ) -> Result<AppendedSteps, RepositoryError> {
        // The entry guard serialises appends for one job.
        let mut job = self.jobs.get_mut(job_id).ok_or(RepositoryError::NotFound)?;
        let mut steps = match &job.execution_steps_s3_key {
            Some(key) => self
                .blobs
                .get(key)
                .map(|b| b.clone())
                .ok_or_else(|| RepositoryError::Blob(format!("missing blob {key}")))?,
            None => job.execution_steps.clone(),
        };
        let mut artifacts = job.artifacts.clone();
        let Some(mut update) = append.merge_into(&mut steps, &mut artifacts) else {
            return Ok(AppendedSteps {
                steps,
                artifacts,
                appended: false,
            });
        };
        if let Some(written) = update.execution_steps.take() {
            self.write_steps(&mut job, written);
        }
        update.apply_to(&mut job);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(AppendedSteps {
            steps,
            artifacts,
            appended: true,
        })
    }
}

#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: DashMap<String, Workflow>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, workflow: Workflow) {
        self.workflows.insert(workflow.workflow_id.clone(), workflow);
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    async fn get_workflow(&self, workflow_id: &str) -> Result<Option<Workflow>, RepositoryError> {
        Ok(self.workflows.get(workflow_id).map(|w| w.clone()))
    }

    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        self.insert(workflow.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AI provider
// ---------------------------------------------------------------------------

/// Replays queued responses; when the queue is empty it answers
/// `out<{instructions}>`.
#[derive(Default)]
pub struct ScriptedAi {
    script: Mutex<VecDeque<Result<AiResponse, AiError>>>,
    requests: Mutex<Vec<AiRequest>>,
    delay: Option<Duration>,
}

impl ScriptedAi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Default::default()
        })
    }

    pub fn push(&self, response: Result<AiResponse, AiError>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<AiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl AiProvider for ScriptedAi {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, request: AiRequest) -> BoxFuture<'_, Result<AiResponse, AiError>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let scripted = self.script.lock().unwrap().pop_front();
            let default_text = format!("out<{}>", request.instructions);
            self.requests.lock().unwrap().push(request);
            scripted.unwrap_or_else(|| {
                Ok(AiResponse {
                    output_text: default_text,
                    ..Default::default()
                })
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryArtifacts {
    items: DashMap<String, NewArtifact>,
    fail: AtomicBool,
}

impl MemoryArtifacts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let store = Self::default();
        store.fail.store(true, Ordering::SeqCst);
        Arc::new(store)
    }

    pub fn get(&self, id: &str) -> Option<NewArtifact> {
        self.items.get(id).map(|a| a.clone())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl ArtifactStore for MemoryArtifacts {
    fn store_artifact(
        &self,
        artifact: NewArtifact,
    ) -> BoxFuture<'_, Result<String, CollaboratorError>> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CollaboratorError::Io("disk full".to_string()));
            }
            let id = Uuid::now_v7().to_string();
            self.items.insert(id.clone(), artifact);
            Ok(id)
        })
    }

    fn get_public_url<'a>(
        &'a self,
        artifact_id: &'a str,
    ) -> BoxFuture<'a, Result<String, CollaboratorError>> {
        Box::pin(async move {
            let item = self
                .items
                .get(artifact_id)
                .ok_or_else(|| CollaboratorError::NotFound(artifact_id.to_string()))?;
            Ok(format!("https://cdn.example.com/{}/{}", artifact_id, item.filename))
        })
    }
}

pub struct MockWebhooks {
    status: u16,
    requests: Mutex<Vec<WebhookRequest>>,
}

impl MockWebhooks {
    pub fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<WebhookRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl WebhookTransport for MockWebhooks {
    fn send(&self, request: WebhookRequest) -> BoxFuture<'_, Result<WebhookResponse, CollaboratorError>> {
        self.requests.lock().unwrap().push(request);
        let status = self.status;
        Box::pin(async move {
            Ok(WebhookResponse {
                status,
                body: format!("{{\"status\":{status}}}"),
            })
        })
    }
}

pub struct MockBrowser {
    run: Option<BrowserRun>,
    sessions: Mutex<Vec<BrowserSession>>,
}

impl MockBrowser {
    pub fn new(run: BrowserRun) -> Arc<Self> {
        Arc::new(Self {
            run: Some(run),
            sessions: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            run: None,
            sessions: Mutex::new(Vec::new()),
        })
    }

    pub fn sessions(&self) -> Vec<BrowserSession> {
        self.sessions.lock().unwrap().clone()
    }
}

impl BrowserDriver for MockBrowser {
    fn run(&self, session: BrowserSession) -> BoxFuture<'_, Result<BrowserRun, CollaboratorError>> {
        self.sessions.lock().unwrap().push(session);
        let result = self
            .run
            .clone()
            .ok_or_else(|| CollaboratorError::Transport("driver unreachable".to_string()));
        Box::pin(async move { result })
    }
}

#[derive(Default)]
pub struct MockHandoff {
    requests: Mutex<Vec<HandoffRequest>>,
}

impl MockHandoff {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<HandoffRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl HandoffTrigger for MockHandoff {
    fn trigger(&self, request: HandoffRequest) -> BoxFuture<'_, Result<String, CollaboratorError>> {
        self.requests.lock().unwrap().push(request);
        Box::pin(async move { Ok(Uuid::now_v7().to_string()) })
    }
}

#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<JobNotification>>,
    fail: bool,
}

impl MockNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn sent(&self) -> Vec<JobNotification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for MockNotifier {
    fn job_completed(
        &self,
        notification: JobNotification,
    ) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        let result = if self.fail {
            Err(CollaboratorError::Transport("smtp down".to_string()))
        } else {
            self.sent.lock().unwrap().push(notification);
            Ok(())
        };
        Box::pin(async move { result })
    }
}

#[derive(Default)]
pub struct MockUsage {
    records: Mutex<Vec<UsageRecord>>,
    fail: bool,
}

impl MockUsage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl UsageRecorder for MockUsage {
    fn record(&self, record: UsageRecord) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        let result = if self.fail {
            Err(CollaboratorError::Io("usage table locked".to_string()))
        } else {
            self.records.lock().unwrap().push(record);
            Ok(())
        };
        Box::pin(async move { result })
    }
}

/// Concrete handles behind a [`Collaborators`] bundle.
pub struct Mocks {
    pub ai: Arc<ScriptedAi>,
    pub artifacts: Arc<MemoryArtifacts>,
    pub webhooks: Arc<MockWebhooks>,
    pub browser: Arc<MockBrowser>,
    pub handoff: Arc<MockHandoff>,
    pub notifier: Arc<MockNotifier>,
    pub usage: Arc<MockUsage>,
}

pub fn mock_collaborators() -> (Collaborators, Mocks) {
    let mocks = Mocks {
        ai: ScriptedAi::new(),
        artifacts: MemoryArtifacts::new(),
        webhooks: MockWebhooks::new(200),
        browser: MockBrowser::new(BrowserRun::default()),
        handoff: MockHandoff::new(),
        notifier: MockNotifier::new(),
        usage: MockUsage::new(),
    };
    let collaborators = Collaborators {
        ai: mocks.ai.clone(),
        artifacts: mocks.artifacts.clone(),
        webhooks: mocks.webhooks.clone(),
        browser: mocks.browser.clone(),
        handoff: mocks.handoff.clone(),
        notifier: mocks.notifier.clone(),
        usage: mocks.usage.clone(),
    };
    (collaborators, mocks)
}

// ---------------------------------------------------------------------------
// Recording handler
// ---------------------------------------------------------------------------

/// Handler that records every invocation and answers `{label}:{step_order}`.
#[derive(Default)]
pub struct RecordingHandler {
    label: String,
    failing_on: HashSet<u32>,
    panicking_on: HashSet<u32>,
    barrier: Option<Arc<tokio::sync::Barrier>>,
    invocations: Mutex<Vec<StepInvocation>>,
}

impl RecordingHandler {
    pub fn new(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            ..Default::default()
        })
    }

    /// Fails with a webhook delivery error for the given step orders.
    pub fn failing_on(label: &str, orders: &[u32]) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            failing_on: orders.iter().copied().collect(),
            ..Default::default()
        })
    }

    /// Panics inside `execute` for the given step orders.
    pub fn panicking_on(label: &str, orders: &[u32]) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            panicking_on: orders.iter().copied().collect(),
            ..Default::default()
        })
    }

    /// Every invocation waits on `barrier` before answering.
    pub fn gated(label: &str, barrier: Arc<tokio::sync::Barrier>) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            barrier: Some(barrier),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    pub fn invocations(&self) -> Vec<StepInvocation> {
        self.invocations.lock().unwrap().clone()
    }
}

impl StepHandler for RecordingHandler {
    fn execute(&self, invocation: StepInvocation) -> BoxFuture<'_, Result<StepOutcome, StepError>> {
        Box::pin(async move {
            self.invocations.lock().unwrap().push(invocation.clone());
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            let order = invocation.step.step_order;
            if self.panicking_on.contains(&order) {
                panic!("handler blew up on step {order}");
            }
            if self.failing_on.contains(&order) {
                return Err(StepError::WebhookDelivery(format!("HTTP 500 from step {order}")));
            }
            let output = format!("{}:{order}", self.label);
            let mut record = ExecutionStepRecord::completed(
                order,
                invocation.step.step_name.clone(),
                StepDetails::empty_for(StepType::AiGeneration),
            );
            record.output = Some(output.clone());
            Ok(StepOutcome {
                output,
                artifact_ids: Vec::new(),
                record,
            })
        })
    }
}
