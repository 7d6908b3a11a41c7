//! Status reports from riders and drivers, validated by the lifecycle table.

use serde::Deserialize;

use crate::domain::{Actor, RideId, RideStatus};
use crate::error::DispatchResult;
use crate::geo::Coordinates;
use crate::lifecycle::{self, TransitionOutcome};

use super::Dispatch;

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub booking_id: RideId,
    pub new_status: RideStatus,
    pub reason: Option<String>,
    pub location: Option<Coordinates>,
    /// Extra keys merged into the audit event payload.
    pub metadata: Option<serde_json::Value>,
}

impl Dispatch {
    /// Request one lifecycle transition on behalf of the caller.
    pub fn update_status(
        &self,
        caller: Option<Actor>,
        request: UpdateStatusRequest,
    ) -> DispatchResult<TransitionOutcome> {
        let actor = self.require_caller(caller)?;
        lifecycle::apply_transition(
            self.store(),
            self.clock(),
            &self.config().cancellation,
            request.booking_id,
            request.new_status,
            &actor,
            request.reason.as_deref(),
            request.location,
            request.metadata,
        )
    }
}
