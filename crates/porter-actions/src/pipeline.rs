use std::fmt;

use porter_collection::GatewayError;

/// Progress of one action request.
///
/// An execution walks `Idle → FormRequested → FormResolved → Executed →
/// ResultDispatched`. Hooks stop after `FormResolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    FormRequested,
    FormResolved,
    Executed,
    ResultDispatched,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::FormRequested => "form requested",
            PipelineState::FormResolved => "form resolved",
            PipelineState::Executed => "executed",
            PipelineState::ResultDispatched => "result dispatched",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Execute,
    Hook,
}

#[derive(Debug, Clone)]
pub struct ActionRun {
    action: String,
    kind: RunKind,
    state: PipelineState,
}

impl ActionRun {
    pub fn execute(action: impl Into<String>) -> Self {
        Self::new(action, RunKind::Execute)
    }

    pub fn hook(action: impl Into<String>) -> Self {
        Self::new(action, RunKind::Hook)
    }

    fn new(action: impl Into<String>, kind: RunKind) -> Self {
        Self {
            action: action.into(),
            kind,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn kind(&self) -> RunKind {
        self.kind
    }

    /// Move to `next`. Skipping, repeating or reversing a step is a bug in
    /// the caller and fails with [`GatewayError::Fatal`].
    pub fn advance(&mut self, next: PipelineState) -> Result<(), GatewayError> {
        use PipelineState::*;

        let allowed = match (self.kind, self.state, next) {
            (_, Idle, FormRequested) => true,
            (_, FormRequested, FormResolved) => true,
            (RunKind::Execute, FormResolved, Executed) => true,
            (RunKind::Execute, Executed, ResultDispatched) => true,
            _ => false,
        };
        if !allowed {
            return Err(GatewayError::Fatal(format!(
                "action '{}' cannot move from {} to {}",
                self.action, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        match self.kind {
            RunKind::Execute => self.state == PipelineState::ResultDispatched,
            RunKind::Hook => self.state == PipelineState::FormResolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_walks_every_state() {
        let mut run = ActionRun::execute("Restock");
        for next in [
            PipelineState::FormRequested,
            PipelineState::FormResolved,
            PipelineState::Executed,
            PipelineState::ResultDispatched,
        ] {
            run.advance(next).unwrap();
        }
        assert!(run.is_complete());
    }

    #[test]
    fn skipping_a_step_is_fatal() {
        let mut run = ActionRun::execute("Restock");
        let err = run.advance(PipelineState::Executed).unwrap_err();
        assert!(matches!(err, GatewayError::Fatal(_)));
        assert_eq!(run.state(), PipelineState::Idle);
    }

    #[test]
    fn hooks_never_execute() {
        let mut run = ActionRun::hook("Restock");
        run.advance(PipelineState::FormRequested).unwrap();
        run.advance(PipelineState::FormResolved).unwrap();
        assert!(run.is_complete());
        assert!(run.advance(PipelineState::Executed).is_err());
    }
}
