//! Assignment tracking.

use crate::experiment::{Experiment, ExperimentResult};

/// Error type surfaced by tracking sinks. Failures are logged and swallowed
/// by the client; they never propagate into the evaluation path.
pub type TrackingError = Box<dyn std::error::Error + Send + Sync>;

/// Sink invoked synchronously for every organic in-experiment assignment.
///
/// The callback may enqueue I/O but the client does not wait on it.
pub trait TrackingCallback: Send + Sync {
    fn on_assignment(
        &self,
        experiment: &Experiment,
        result: &ExperimentResult,
    ) -> Result<(), TrackingError>;
}

impl<F> TrackingCallback for F
where
    F: Fn(&Experiment, &ExperimentResult) -> Result<(), TrackingError> + Send + Sync,
{
    fn on_assignment(
        &self,
        experiment: &Experiment,
        result: &ExperimentResult,
    ) -> Result<(), TrackingError> {
        self(experiment, result)
    }
}

/// One recorded assignment: the experiment and the result it produced.
///
/// The client keeps at most one active record per experiment key; repeat
/// evaluations overwrite the record while still invoking the callback.
#[derive(Debug, Clone)]
pub struct ViewedExperiment {
    pub experiment: Experiment,
    pub result: ExperimentResult,
}
