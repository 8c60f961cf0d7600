//! Result recording for a reconciliation run
//!
//! One outcome is kept per artifact and phase: a retry in a later pass
//! replaces the outcome of the earlier attempt. Failures of one artifact
//! never hide the successes of independent ones.

use ddlsync_core::{Artifact, LifecycleState, Outcome, OutcomeStatus, Phase, RunReport};

/// Accumulates per-artifact outcomes and run-level errors
#[derive(Debug, Clone, Default)]
pub struct ResultRecorder {
    outcomes: Vec<Outcome>,
    unresolved: Vec<String>,
    errors: Vec<String>,
}

impl ResultRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful completion
    pub fn register_success(&mut self, artifact: &Artifact, phase: Phase, status: OutcomeStatus, message: Option<String>) {
        tracing::debug!(key = %artifact.key, %phase, %status, "artifact completed");

        let mut outcome = Outcome::new(artifact, phase, status);
        outcome.message = message;
        self.upsert(outcome);
    }

    /// Record a failed or refused completion
    pub fn register_failure(&mut self, artifact: &Artifact, phase: Phase, status: OutcomeStatus, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(key = %artifact.key, %phase, %status, error = %message, "artifact failed");

        self.upsert(Outcome::new(artifact, phase, status).with_message(message));
    }

    /// Record an artifact that never converged in `phase`
    ///
    /// Keeps an existing failure outcome for the phase; otherwise records an
    /// `UNDEPLETED` one.
    pub fn register_undepleted(&mut self, artifact: &Artifact, phase: Phase, reason: Option<&str>) {
        let message = format!(
            "Undepleted artifact of type [{}] with key [{}] in phase [{}]",
            artifact.kind, artifact.key, phase
        );
        tracing::error!(key = %artifact.key, %phase, reason = reason.unwrap_or(""), "{}", message);

        let has_failure = self
            .outcomes
            .iter()
            .any(|o| o.key == artifact.key && o.phase == phase && !o.success);
        if !has_failure {
            let mut outcome = Outcome::new(artifact, phase, OutcomeStatus::Undepleted);
            outcome.state = LifecycleState::Failed;
            outcome.message = Some(match reason {
                Some(reason) => format!("{}: {}", message, reason),
                None => message.clone(),
            });
            self.upsert(outcome);
        }

        if !self.unresolved.contains(&artifact.key) {
            self.unresolved.push(artifact.key.clone());
        }
        self.errors.push(message);
    }

    /// Record a run-level problem not tied to one artifact
    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.errors.push(message);
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    /// Last outcome recorded for a key and phase
    pub fn outcome(&self, key: &str, phase: Phase) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.key == key && o.phase == phase)
    }

    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty() || self.outcomes.iter().any(|o| !o.success)
    }

    /// Finish the run
    pub fn into_report(self) -> RunReport {
        RunReport::from_parts(self.outcomes, self.unresolved, self.errors)
    }

    fn upsert(&mut self, outcome: Outcome) {
        match self
            .outcomes
            .iter_mut()
            .find(|o| o.key == outcome.key && o.phase == outcome.phase)
        {
            Some(existing) => *existing = outcome,
            None => self.outcomes.push(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddlsync_core::{ColumnDefinition, Definition, TableDefinition};

    fn artifact(name: &str) -> Artifact {
        Artifact::new(
            name,
            format!("/{}.table", name),
            name.as_bytes(),
            Definition::Table(TableDefinition::new(name, vec![ColumnDefinition::new("ID", "INT")])),
        )
    }

    #[test]
    fn independent_outcomes_are_kept() {
        let mut recorder = ResultRecorder::new();
        let a = artifact("A");
        let b = artifact("B");

        recorder.register_failure(&a, Phase::Create, OutcomeStatus::Failed, "boom");
        recorder.register_success(&b, Phase::Create, OutcomeStatus::Created, None);

        assert_eq!(recorder.outcomes().len(), 2);
        assert!(recorder.outcome("TABLE:/B.table", Phase::Create).unwrap().success);
        assert!(recorder.has_failures());
    }

    #[test]
    fn retry_replaces_earlier_attempt() {
        let mut recorder = ResultRecorder::new();
        let a = artifact("A");

        recorder.register_failure(&a, Phase::Create, OutcomeStatus::Failed, "not yet");
        recorder.register_success(&a, Phase::Create, OutcomeStatus::Created, None);

        assert_eq!(recorder.outcomes().len(), 1);
        assert_eq!(recorder.outcomes()[0].status, OutcomeStatus::Created);
        assert!(!recorder.has_failures());
    }

    #[test]
    fn undepleted_keeps_specific_failure() {
        let mut recorder = ResultRecorder::new();
        let a = artifact("A");
        let b = artifact("B");

        recorder.register_failure(&a, Phase::Drop, OutcomeStatus::FailedDelete, "holds 3 rows");
        recorder.register_undepleted(&a, Phase::Drop, Some("holds 3 rows"));
        recorder.register_undepleted(&b, Phase::Create, Some("waiting for TABLE [A]"));

        assert_eq!(recorder.outcome("TABLE:/A.table", Phase::Drop).unwrap().status, OutcomeStatus::FailedDelete);
        assert_eq!(recorder.outcome("TABLE:/B.table", Phase::Create).unwrap().status, OutcomeStatus::Undepleted);

        let report = recorder.into_report();
        assert_eq!(report.unresolved, vec!["TABLE:/A.table", "TABLE:/B.table"]);
        assert_eq!(report.summary.errors, 2);
        assert!(report.errors[0].starts_with("Undepleted artifact of type [TABLE]"));
    }
}
