//! Runs the reconcile loop under the Kubernetes controller runtime.
//!
//! The runtime watches `IssueRequest` records and the token secrets they
//! own, guarantees a single in-flight pass per record, and schedules the
//! requeues each pass asks for.

mod error;

pub use error::ControllerError;

use crate::config::OperatorConfig;
use crate::crd::IssueRequest;
use crate::issues::GithubConnector;
use crate::reconcile::{Backoff, Outcome, ReconcileError, Reconciler, Retry};
use crate::store::{KubeStore, RecordKey};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ListParams;
use kube::runtime::controller::Action;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Shared state handed to every reconcile pass.
pub struct Context {
    reconciler: Reconciler<KubeStore, GithubConnector>,
    backoff: Backoff,
}

impl Context {
    /// Builds the context for a Kubernetes client.
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        let backoff = Backoff::new(config.backoff_base(), config.backoff_max());
        Self {
            reconciler: Reconciler::new(KubeStore::new(client), GithubConnector, config),
            backoff,
        }
    }
}

/// Watches `IssueRequest` records until a shutdown signal arrives.
///
/// # Errors
///
/// Returns [`ControllerError`] if the client can't be created or the CRD
/// isn't installed.
pub async fn run(config: OperatorConfig) -> Result<(), ControllerError> {
    let client = Client::try_default().await?;

    let (records, secrets): (Api<IssueRequest>, Api<Secret>) = match config.namespace.as_deref() {
        Some(namespace) => {
            info!(namespace, "Watching a single namespace");
            (
                Api::namespaced(client.clone(), namespace),
                Api::namespaced(client.clone(), namespace),
            )
        }
        None => {
            info!("Watching all namespaces");
            (Api::all(client.clone()), Api::all(client.clone()))
        }
    };

    if let Err(e) = records.list(&ListParams::default().limit(1)).await {
        error!(error = %e, "IssueRequest CRD is not queryable");
        return Err(ControllerError::CrdNotQueryable(e));
    }

    let context = Arc::new(Context::new(client, config));

    info!("Starting IssueRequest controller");
    Controller::new(records, watcher::Config::default().any_semantic())
        .owns(secrets, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => debug!(record = %object, ?action, "Reconciled"),
                Err(e) => warn!(error = %e, "Reconcile failed"),
            }
        })
        .await;

    info!("Controller stopped");
    Ok(())
}

async fn reconcile(record: Arc<IssueRequest>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let key = RecordKey::of(&record)?;
    let outcome = ctx.reconciler.reconcile(&key).await?;
    ctx.backoff.reset(&key);
    Ok(to_action(outcome))
}

fn error_policy(record: Arc<IssueRequest>, error: &ReconcileError, ctx: Arc<Context>) -> Action {
    let retry = error.retry();
    error!(
        record = %record.name_any(),
        namespace = %record.namespace().unwrap_or_default(),
        error = %error,
        ?retry,
        "Reconcile pass failed"
    );

    match retry {
        Retry::Never => Action::await_change(),
        Retry::TokenPoll => Action::requeue(ctx.reconciler.config().token_poll_interval()),
        Retry::After(delay) => Action::requeue(delay),
        Retry::Backoff => match RecordKey::of(&record) {
            Ok(key) => Action::requeue(ctx.backoff.next_delay(&key)),
            Err(_) => Action::await_change(),
        },
    }
}

fn to_action(outcome: Outcome) -> Action {
    match outcome {
        Outcome::Done => Action::await_change(),
        Outcome::RequeueNow => Action::requeue(Duration::ZERO),
        Outcome::RequeueAfter(delay) => Action::requeue(delay),
    }
}
