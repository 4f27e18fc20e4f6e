use crate::relay::{RelayConnectionState, RelayController, TriggerOutcome};

/// Whatever physically removes a rejected board.
pub trait RejectActuator: Send + Sync {
    /// Fire one reject pulse of the actuator's configured length.
    fn reject(&self) -> TriggerOutcome;
    fn state(&self) -> RelayConnectionState;
}

impl RejectActuator for RelayController {
    fn reject(&self) -> TriggerOutcome {
        self.pulse()
    }

    fn state(&self) -> RelayConnectionState {
        self.current_state()
    }
}

/// Stand-in when no relay is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoActuator;

impl RejectActuator for NoActuator {
    fn reject(&self) -> TriggerOutcome {
        TriggerOutcome::Disabled
    }

    fn state(&self) -> RelayConnectionState {
        RelayConnectionState::Disconnected
    }
}
