//! Resource host abstraction.
//!
//! The host owns opened resources (in a browser host these are tabs; in the
//! headless host, HTTP fetches) and brokers the interaction collaborator
//! living inside each resource. The engine sends the collaborator
//! `{command: "interact", durationBudgetMs, kind}` (modelled here as
//! [`InteractionRequest`]) and receives at most one
//! `{event: "interaction-complete", scrolls, clicks, bytesEstimated}` on the
//! returned oneshot channel. A channel that closes without a value is the
//! "collaborator never replies" case. Collaborators report aggregate counts
//! only, never content.

mod http;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::task::TaskKind;

pub use http::HttpResourceHost;

/// Host-assigned identifier for an opened resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource-{}", self.0)
    }
}

/// Parameters handed to the interaction collaborator.
#[derive(Debug, Clone, Copy)]
pub struct InteractionRequest {
    pub duration_budget: Duration,
    pub kind: TaskKind,
}

/// Aggregate engagement counts reported by the collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionSummary {
    pub scrolls: u32,
    pub clicks: u32,
    pub bytes_estimated: u64,
}

/// Failures opening or closing a resource.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("failed to open resource: {0}")]
    Open(String),

    #[error("failed to close resource: {0}")]
    Close(String),
}

/// Failures handing off to the interaction collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttachError {
    /// The resource has no collaborator (restricted destination, headless
    /// fetch that yielded nothing attachable). Degrades to a
    /// zero-interaction success.
    #[error("no interaction collaborator in resource")]
    NoCollaborator,

    /// The collaborator exists but was not ready for the hand-off. Worth
    /// exactly one retry after a short delay.
    #[error("interaction hand-off raced collaborator startup")]
    HandoffRace,
}

/// Seam between the engine and whatever owns real resources.
///
/// Implementations are injected generically (`Engine<H, S>`); see
/// [`HttpResourceHost`] for the headless production host. All methods are
/// cancel-safe: the executor may drop an in-flight future at its timeout.
pub trait ResourceHost: Send + Sync + 'static {
    /// Opens the target and returns its id. Failures are terminal for the
    /// task; the executor never retries an open.
    fn open(&self, target: &str) -> impl Future<Output = Result<ResourceId, HostError>> + Send;

    /// Releases the resource. Closing an id that is already gone is an
    /// error the caller may swallow.
    fn close(&self, id: ResourceId) -> impl Future<Output = Result<(), HostError>> + Send;

    /// Hands the interaction request to the resource's collaborator and
    /// returns the channel its single completion event will arrive on.
    fn begin_interaction(
        &self,
        id: ResourceId,
        request: InteractionRequest,
    ) -> impl Future<Output = Result<oneshot::Receiver<InteractionSummary>, AttachError>> + Send;
}
