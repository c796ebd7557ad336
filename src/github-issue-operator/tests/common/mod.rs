//! In-memory store and tracker used by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use github_issue_operator::{
    select_issue, CredentialHolder, CredentialStore, IssueRequest, IssueRequestSpec,
    IssueRequestStatus, IssueTracker, OperatorConfig, Outcome, ReconcileError, Reconciler,
    RecordKey, RecordStore, RemoteIssue, RemoteIssueState, RepoRef, StoreError, TrackerConnector,
    TrackerError,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::core::ErrorResponse;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "default";
pub const REPO_URL: &str = "https://github.com/acme/widgets";
pub const TITLE: &str = "Build fails on main";
pub const TOKEN: &str = "ghp_test_token";

pub fn spec(repo_url: &str, title: &str, description: &str) -> IssueRequestSpec {
    IssueRequestSpec {
        repo_url: repo_url.to_string(),
        title: title.to_string(),
        description: description.to_string(),
    }
}

fn conflict() -> StoreError {
    StoreError::Conflict {
        message: "the object has been modified".to_string(),
    }
}

fn not_found() -> StoreError {
    StoreError::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: "not found".to_string(),
        reason: "NotFound".to_string(),
        code: 404,
    }))
}

/// Record store with API server semantics: versioned writes, generation
/// bumps on spec edits and finalizer-gated deletion.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    records: BTreeMap<RecordKey, IssueRequest>,
    holders: BTreeMap<RecordKey, CredentialHolder>,
    version: u64,
    status_conflicts: usize,
    guard_conflicts: usize,
    status_writes: usize,
    holder_creates: usize,
}

impl StoreState {
    fn next_version(&mut self) -> Option<String> {
        self.version += 1;
        Some(self.version.to_string())
    }

    fn current(&mut self, record: &IssueRequest) -> Result<&mut IssueRequest, StoreError> {
        let key = RecordKey::of(record)?;
        let stored = self.records.get_mut(&key).ok_or_else(not_found)?;
        if stored.metadata.resource_version != record.metadata.resource_version {
            return Err(conflict());
        }
        Ok(stored)
    }
}

impl FakeStore {
    /// Stores a new record and returns its key.
    pub fn create(&self, name: &str, spec: IssueRequestSpec) -> RecordKey {
        let mut record = IssueRequest::new(name, spec);
        record.metadata.namespace = Some(NAMESPACE.to_string());
        record.metadata.generation = Some(1);

        let mut state = self.state.lock().unwrap();
        record.metadata.resource_version = state.next_version();
        let key = RecordKey::new(NAMESPACE, name);
        state.records.insert(key.clone(), record);
        key
    }

    /// Edits the spec the way a user would, bumping the generation.
    pub fn edit_spec(&self, key: &RecordKey, edit: impl FnOnce(&mut IssueRequestSpec)) {
        let mut state = self.state.lock().unwrap();
        let version = state.next_version();
        let record = state.records.get_mut(key).unwrap();
        edit(&mut record.spec);
        record.metadata.generation = record.metadata.generation.map(|g| g + 1);
        record.metadata.resource_version = version;
    }

    /// Requests deletion the way a user would.
    pub fn request_delete(&self, key: &RecordKey) {
        let mut state = self.state.lock().unwrap();
        state.delete(key);
    }

    pub fn record(&self, key: &RecordKey) -> Option<IssueRequest> {
        self.state.lock().unwrap().records.get(key).cloned()
    }

    pub fn holder(&self, key: &RecordKey) -> Option<CredentialHolder> {
        self.state.lock().unwrap().holders.get(key).cloned()
    }

    /// Writes a token into the holder, creating it if needed.
    pub fn fill_token(&self, key: &RecordKey, token: &str) {
        self.state.lock().unwrap().holders.insert(
            key.clone(),
            CredentialHolder {
                token: token.to_string(),
            },
        );
    }

    /// Makes the next `count` status writes fail with a conflict.
    pub fn fail_status_writes(&self, count: usize) {
        self.state.lock().unwrap().status_conflicts = count;
    }

    /// Makes the next `count` finalizer writes fail with a conflict.
    pub fn fail_guard_writes(&self, count: usize) {
        self.state.lock().unwrap().guard_conflicts = count;
    }

    pub fn status_writes(&self) -> usize {
        self.state.lock().unwrap().status_writes
    }

    pub fn holder_creates(&self) -> usize {
        self.state.lock().unwrap().holder_creates
    }
}

impl StoreState {
    fn delete(&mut self, key: &RecordKey) {
        let version = self.next_version();
        let Some(record) = self.records.get_mut(key) else {
            return;
        };
        if record.finalizers().is_empty() {
            self.records.remove(key);
        } else if record.metadata.deletion_timestamp.is_none() {
            record.metadata.deletion_timestamp = Some(Time(Utc::now()));
            record.metadata.resource_version = version;
        }
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<IssueRequest>, StoreError> {
        Ok(self.record(key))
    }

    async fn replace_guards(
        &self,
        record: &IssueRequest,
        guards: Vec<String>,
    ) -> Result<IssueRequest, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.guard_conflicts > 0 {
            state.guard_conflicts -= 1;
            return Err(conflict());
        }

        let version = state.next_version();
        let stored = state.current(record)?;
        stored.metadata.finalizers = Some(guards);
        stored.metadata.resource_version = version;
        let updated = stored.clone();

        if updated.is_deleting() && updated.finalizers().is_empty() {
            state.records.remove(&RecordKey::of(&updated)?);
        }
        Ok(updated)
    }

    async fn update_status(
        &self,
        record: &IssueRequest,
        status: &IssueRequestStatus,
    ) -> Result<IssueRequest, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.status_conflicts > 0 {
            state.status_conflicts -= 1;
            return Err(conflict());
        }

        let version = state.next_version();
        let stored = state.current(record)?;
        stored.status = Some(status.clone());
        stored.metadata.resource_version = version;
        let updated = stored.clone();

        state.status_writes += 1;
        Ok(updated)
    }

    async fn delete(&self, key: &RecordKey) -> Result<(), StoreError> {
        self.state.lock().unwrap().delete(key);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FakeStore {
    async fn get_holder(&self, key: &RecordKey) -> Result<Option<CredentialHolder>, StoreError> {
        Ok(self.holder(key))
    }

    async fn create_holder(&self, owner: &IssueRequest) -> Result<bool, StoreError> {
        let key = RecordKey::of(owner)?;
        let mut state = self.state.lock().unwrap();
        if state.holders.contains_key(&key) {
            return Ok(false);
        }
        state.holders.insert(key, CredentialHolder::default());
        state.holder_creates += 1;
        Ok(true)
    }
}

/// A tracker operation, as recorded by [`FakeTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Find { title: String, known: Option<u64> },
    Create { title: String, body: String },
    Update { number: u64, title: String, body: String },
    Close { number: u64 },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Find { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Find,
    Create,
    Update,
    Close,
}

struct TrackerState {
    issues: Vec<RemoteIssue>,
    next_number: u64,
    calls: Vec<Call>,
    tokens: Vec<String>,
    failures: Vec<(Op, TrackerError)>,
}

/// Issue tracker that keeps issues in memory and numbers them from 42.
#[derive(Clone)]
pub struct FakeTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl Default for FakeTracker {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState {
                issues: Vec::new(),
                next_number: 42,
                calls: Vec::new(),
                tokens: Vec::new(),
                failures: Vec::new(),
            })),
        }
    }
}

impl FakeTracker {
    pub fn issues(&self) -> Vec<RemoteIssue> {
        self.state.lock().unwrap().issues.clone()
    }

    pub fn issue(&self, number: u64) -> Option<RemoteIssue> {
        self.issues().into_iter().find(|issue| issue.number == number)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Tokens the tracker was connected with.
    pub fn tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().tokens.clone()
    }

    /// Makes the next `op` call fail with `error`.
    pub fn fail_next(&self, op: Op, error: TrackerError) {
        self.state.lock().unwrap().failures.push((op, error));
    }

    /// Adds an entry created outside the controller.
    pub fn seed(&self, issue: RemoteIssue) {
        self.state.lock().unwrap().issues.push(issue);
    }

    /// Changes an issue outside the controller.
    pub fn edit_remotely(&self, number: u64, edit: impl FnOnce(&mut RemoteIssue)) {
        let mut state = self.state.lock().unwrap();
        let issue = state
            .issues
            .iter_mut()
            .find(|issue| issue.number == number)
            .unwrap();
        edit(issue);
    }

    fn begin(&self, op: Op, call: Call) -> Result<std::sync::MutexGuard<'_, TrackerState>, TrackerError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some(index) = state.failures.iter().position(|(failing, _)| *failing == op) {
            let (_, error) = state.failures.remove(index);
            return Err(error);
        }
        Ok(state)
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn find_issue(
        &self,
        _repo: &RepoRef,
        title: &str,
        known_number: Option<u64>,
    ) -> Result<Option<RemoteIssue>, TrackerError> {
        let call = Call::Find {
            title: title.to_string(),
            known: known_number,
        };
        let state = self.begin(Op::Find, call)?;
        Ok(select_issue(&state.issues, title, known_number))
    }

    async fn create_issue(
        &self,
        _repo: &RepoRef,
        title: &str,
        body: &str,
    ) -> Result<RemoteIssue, TrackerError> {
        let call = Call::Create {
            title: title.to_string(),
            body: body.to_string(),
        };
        let mut state = self.begin(Op::Create, call)?;
        let issue = RemoteIssue {
            number: state.next_number,
            title: title.to_string(),
            body: body.to_string(),
            state: RemoteIssueState::Open,
            has_linked_change_request: false,
            is_pull_request: false,
        };
        state.next_number += 1;
        state.issues.push(issue.clone());
        Ok(issue)
    }

    async fn update_issue(
        &self,
        _repo: &RepoRef,
        issue: &RemoteIssue,
        title: &str,
        body: &str,
    ) -> Result<RemoteIssue, TrackerError> {
        let call = Call::Update {
            number: issue.number,
            title: title.to_string(),
            body: body.to_string(),
        };
        let mut state = self.begin(Op::Update, call)?;
        let stored = state
            .issues
            .iter_mut()
            .find(|existing| existing.number == issue.number)
            .ok_or(TrackerError::RemoteRejected {
                status: 404,
                message: "Not Found".to_string(),
            })?;
        stored.title = title.to_string();
        stored.body = body.to_string();
        Ok(stored.clone())
    }

    async fn close_issue(&self, _repo: &RepoRef, issue: &RemoteIssue) -> Result<(), TrackerError> {
        let call = Call::Close {
            number: issue.number,
        };
        let mut state = self.begin(Op::Close, call)?;
        if let Some(stored) = state
            .issues
            .iter_mut()
            .find(|existing| existing.number == issue.number)
        {
            stored.state = RemoteIssueState::Closed;
        }
        Ok(())
    }
}

impl TrackerConnector for FakeTracker {
    type Tracker = FakeTracker;

    fn connect(&self, token: &str) -> Result<Self::Tracker, TrackerError> {
        self.state.lock().unwrap().tokens.push(token.to_string());
        Ok(self.clone())
    }
}

/// A reconciler wired to fakes, with one record under test.
pub struct Harness {
    pub reconciler: Reconciler<FakeStore, FakeTracker>,
    pub tracker: FakeTracker,
    pub key: RecordKey,
}

impl Harness {
    pub fn new(spec: IssueRequestSpec) -> Self {
        let tracker = FakeTracker::default();
        let reconciler = Reconciler::new(FakeStore::default(), tracker.clone(), OperatorConfig::default());
        let key = reconciler.store().create("build-fails", spec);
        Self {
            reconciler,
            tracker,
            key,
        }
    }

    /// A record whose token is filled and whose issue #42 has been created.
    pub async fn synced() -> Self {
        let harness = Self::new(spec(REPO_URL, TITLE, ""));
        harness.store().fill_token(&harness.key, TOKEN);
        let outcome = harness.pass().await.unwrap();
        assert_eq!(outcome, Outcome::Done);
        assert_eq!(harness.status().remote_issue_id, Some(42));
        harness.tracker.clear_calls();
        harness
    }

    pub fn store(&self) -> &FakeStore {
        self.reconciler.store()
    }

    pub async fn pass(&self) -> Result<Outcome, ReconcileError> {
        self.reconciler.reconcile(&self.key).await
    }

    pub fn record(&self) -> IssueRequest {
        self.store().record(&self.key).unwrap()
    }

    pub fn status(&self) -> IssueRequestStatus {
        self.record().status.unwrap_or_default()
    }
}
