//! Headless HTTP resource host.
//!
//! Opens a resource by fetching the target over HTTP and acts as its own
//! minimal interaction collaborator: after a randomized dwell it reports
//! zero scrolls/clicks and the actual transferred byte count. This keeps the
//! full task lifecycle honest without a browser.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use super::{
    AttachError, HostError, InteractionRequest, InteractionSummary, ResourceHost, ResourceId,
};

/// Browser-like User-Agent; some destinations reject requests without one.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Per-request timeout for the fetch itself.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response bodies are counted up to this cap and then dropped.
const MAX_BODY_BYTES: u64 = 2 * 1024 * 1024;

/// Dwell fraction of the duration budget before the collaborator reports.
const DWELL_FRACTION: std::ops::Range<f64> = 0.3..0.8;

struct OpenResource {
    bytes_transferred: u64,
}

/// Production [`ResourceHost`] for the headless binary.
pub struct HttpResourceHost {
    client: reqwest::Client,
    open: DashMap<ResourceId, OpenResource>,
    next_id: AtomicU64,
}

impl HttpResourceHost {
    pub fn new() -> Result<Self, HostError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HostError::Open(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            open: DashMap::new(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Number of resources currently open.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    fn allocate_id(&self) -> ResourceId {
        ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl ResourceHost for HttpResourceHost {
    async fn open(&self, target: &str) -> Result<ResourceId, HostError> {
        trace!(target, "fetching resource");

        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| HostError::Open(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(HostError::Open(format!(
                "HTTP {} from {target}",
                response.status()
            )));
        }

        // Count the body up to the cap; the content itself is discarded.
        let mut bytes_transferred = 0u64;
        let mut response = response;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| HostError::Open(format!("failed to read response: {e}")))?
        {
            bytes_transferred += chunk.len() as u64;
            if bytes_transferred >= MAX_BODY_BYTES {
                debug!(target, "response body cap reached, dropping remainder");
                break;
            }
        }

        let id = self.allocate_id();
        self.open.insert(id, OpenResource { bytes_transferred });
        debug!(%id, target, bytes = bytes_transferred, "resource opened");
        Ok(id)
    }

    async fn close(&self, id: ResourceId) -> Result<(), HostError> {
        match self.open.remove(&id) {
            Some(_) => {
                trace!(%id, "resource closed");
                Ok(())
            }
            None => Err(HostError::Close(format!("{id} is not open"))),
        }
    }

    async fn begin_interaction(
        &self,
        id: ResourceId,
        request: InteractionRequest,
    ) -> Result<oneshot::Receiver<InteractionSummary>, AttachError> {
        let bytes = match self.open.get(&id) {
            Some(resource) => resource.bytes_transferred,
            None => return Err(AttachError::NoCollaborator),
        };

        let fraction = rand::thread_rng().gen_range(DWELL_FRACTION);
        let dwell = request.duration_budget.mul_f64(fraction);
        let (tx, rx) = oneshot::channel();

        // Headless stand-in for the in-page simulator: dwell, then report
        // aggregate counts only.
        tokio::spawn(async move {
            tokio::time::sleep(dwell).await;
            let summary = InteractionSummary {
                scrolls: 0,
                clicks: 0,
                bytes_estimated: bytes,
            };
            if tx.send(summary).is_err() {
                // Executor timed out or shut down before the dwell elapsed.
                warn!(%id, "interaction summary dropped, receiver gone");
            }
        });

        trace!(%id, kind = %request.kind, dwell_ms = dwell.as_millis() as u64, "interaction started");
        Ok(rx)
    }
}
