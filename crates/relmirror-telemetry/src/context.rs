//! Run-level tracing context.

use tracing::Span;
use uuid::Uuid;

/// Identity of one process run and the span every run event nests under.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    span: Span,
}

impl RunContext {
    /// Build the `run` span for `run_id`.
    #[must_use]
    pub fn new(run_id: Uuid) -> Self {
        let span = tracing::info_span!(
            "run",
            run_id = %run_id,
            version = env!("CARGO_PKG_VERSION")
        );
        Self { run_id, span }
    }

    /// Identifier of this run.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Span to instrument the run future with.
    #[must_use]
    pub fn span(&self) -> Span {
        self.span.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_keep_their_own_run_id() {
        let first_id = Uuid::new_v4();
        let second_id = Uuid::new_v4();
        let first = RunContext::new(first_id);
        let second = RunContext::new(second_id);
        assert_eq!(first.run_id(), first_id);
        assert_eq!(second.run_id(), second_id);
    }
}
