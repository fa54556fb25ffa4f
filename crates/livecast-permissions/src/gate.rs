//! Permission request cycle.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::PermissionError;
use crate::permission::{Permission, PermissionSet};
use crate::{PermissionPlatform, PermissionResult};

/// Result of a permission request cycle.
#[derive(Debug)]
pub enum PermissionOutcome {
    /// Every required permission is granted.
    AllGranted,

    /// The user must see an explanation before the platform asks again.
    NeedsRationale {
        /// Permissions the rationale is about.
        pending: PermissionSet,

        /// Continues the cycle once the rationale has been shown.
        retry: RationaleRetry,
    },

    /// The cycle ended with permissions still denied.
    Denied {
        /// Permissions denied in the final round.
        denied: PermissionSet,
    },
}

impl PermissionOutcome {
    /// Returns true if everything was granted.
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::AllGranted)
    }
}

/// Gates capture behind the platform's runtime permissions.
///
/// Within one cycle each permission is shown a rationale at most once and
/// requested directly at most once, so a cycle always terminates even if the
/// platform keeps asking for a rationale.
pub struct PermissionGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    platform: Arc<dyn PermissionPlatform>,
    required: PermissionSet,
    in_flight: AtomicBool,
}

impl PermissionGate {
    /// Create a gate for the given required permissions.
    pub fn new(
        platform: Arc<dyn PermissionPlatform>,
        required: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            inner: Arc::new(GateInner {
                platform,
                required: required.into_iter().collect(),
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// The permissions this gate requires.
    pub fn required(&self) -> &PermissionSet {
        &self.inner.required
    }

    /// Whether every required permission is currently granted.
    pub fn all_granted(&self) -> bool {
        self.inner.missing().is_empty()
    }

    /// Start a request cycle.
    ///
    /// The cycle stays in flight until it resolves to `AllGranted` or
    /// `Denied`, or until a pending [`RationaleRetry`] is consumed or dropped.
    #[instrument(name = "request_permissions", skip(self))]
    pub async fn request_permissions(&self) -> PermissionResult<PermissionOutcome> {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Permission request already in flight");
            return Err(PermissionError::RequestInFlight);
        }

        let cycle = Cycle {
            guard: FlightGuard(Arc::clone(&self.inner)),
            rationale_shown: PermissionSet::new(),
            asked: PermissionSet::new(),
        };

        Ok(cycle.run(None).await)
    }
}

impl GateInner {
    fn missing(&self) -> PermissionSet {
        self.required
            .filter(|permission| !self.platform.check_granted(permission))
    }
}

/// Releases the in-flight flag when the cycle ends.
struct FlightGuard(Arc<GateInner>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::SeqCst);
    }
}

struct Cycle {
    guard: FlightGuard,
    rationale_shown: PermissionSet,
    asked: PermissionSet,
}

impl Cycle {
    fn gate(&self) -> &GateInner {
        &self.guard.0
    }

    async fn run(mut self, mut next_request: Option<PermissionSet>) -> PermissionOutcome {
        loop {
            if let Some(requested) = next_request.take() {
                let denied = self.request_round(&requested).await;
                if !denied.is_empty() {
                    let owed = self.owed_rationale(&denied);
                    if owed.is_empty() {
                        info!(%denied, "Permissions denied");
                        return PermissionOutcome::Denied { denied };
                    }
                    return self.needs_rationale(owed);
                }
            }

            let missing = self.gate().missing();
            if missing.is_empty() {
                debug!("All permissions granted");
                return PermissionOutcome::AllGranted;
            }

            let owed = self.owed_rationale(&missing);
            if !owed.is_empty() {
                return self.needs_rationale(owed);
            }

            let unasked = missing.difference(&self.asked);
            if unasked.is_empty() {
                info!(denied = %missing, "Permissions still missing, nothing left to ask");
                return PermissionOutcome::Denied { denied: missing };
            }

            next_request = Some(unasked);
        }
    }

    /// Prompt for `requested` and return the ones denied in this round.
    async fn request_round(&mut self, requested: &PermissionSet) -> PermissionSet {
        debug!(%requested, "Requesting permissions");
        self.asked.extend_from(requested);

        let results = self.gate().platform.request(requested).await;
        requested.filter(|permission| !results.get(permission).copied().unwrap_or(false))
    }

    fn owed_rationale(&self, candidates: &PermissionSet) -> PermissionSet {
        let platform = &self.gate().platform;
        candidates.filter(|permission| {
            !self.rationale_shown.contains(permission)
                && platform.should_show_rationale(permission)
        })
    }

    fn needs_rationale(mut self, pending: PermissionSet) -> PermissionOutcome {
        debug!(%pending, "Rationale owed");
        self.rationale_shown.extend_from(&pending);

        PermissionOutcome::NeedsRationale {
            pending: pending.clone(),
            retry: RationaleRetry {
                cycle: self,
                pending,
            },
        }
    }
}

/// Continuation handed out with [`PermissionOutcome::NeedsRationale`].
///
/// Holding it keeps the cycle in flight. Dropping it ends the cycle.
pub struct RationaleRetry {
    cycle: Cycle,
    pending: PermissionSet,
}

impl RationaleRetry {
    /// The permissions the rationale was shown for.
    pub fn pending(&self) -> &PermissionSet {
        &self.pending
    }

    /// Request exactly the pending permissions again.
    pub async fn request(self) -> PermissionOutcome {
        let Self { cycle, pending } = self;
        cycle.run(Some(pending)).await
    }

    /// The user dismissed the rationale.
    pub fn decline(self) -> PermissionOutcome {
        info!(denied = %self.pending, "Rationale declined");
        PermissionOutcome::Denied {
            denied: self.pending,
        }
    }
}

impl fmt::Debug for RationaleRetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RationaleRetry")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
