//! Errors of a segmented acquisition.

use labinstr::InstrumentError;
use thiserror::Error;

use crate::{StitchedTrace, SweepStep};

/// The error enum for acquisitions with the [`crate::SweepAcquirer`].
///
/// Every variant that involves the instrument names the segment and the step that failed, so a
/// failure can be traced back to the command that caused it. Nothing is retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AcquisitionError {
    /// The request does not fit the analyzer. Nothing was sent to the instrument.
    #[error("Invalid sweep request: {0}")]
    InvalidRequest(String),
    /// Talking to the instrument failed before any segment was completed.
    #[error("Segment {segment} failed at step '{step}': {source}")]
    Transport {
        /// Index of the segment that failed.
        segment: usize,
        /// The step that failed.
        step: SweepStep,
        /// The underlying error.
        source: InstrumentError,
    },
    /// Talking to the instrument failed after at least one segment was completed.
    ///
    /// The completed segments are returned as a partial trace.
    #[error("Segment {segment} of {total} failed at step '{step}', {segment} segment(s) completed: {source}")]
    PartialAcquisition {
        /// Index of the segment that failed, equal to the number of completed segments.
        segment: usize,
        /// Total number of segments of the request.
        total: usize,
        /// The step that failed.
        step: SweepStep,
        /// Data of the completed segments.
        partial: Box<StitchedTrace>,
        /// The underlying error.
        source: InstrumentError,
    },
    /// All segments were acquired, but the window or continuous sweeping could not be restored.
    #[error("Acquisition complete, but restoring the analyzer failed: {source}")]
    Restore {
        /// The complete trace.
        trace: Box<StitchedTrace>,
        /// The underlying error.
        source: InstrumentError,
    },
    /// Any other instrument error, e.g., when reading the current settings of the analyzer.
    #[error(transparent)]
    Instrument(#[from] InstrumentError),
}

impl AcquisitionError {
    /// The step at which the acquisition failed, if the failure happened during one.
    pub fn step(&self) -> Option<SweepStep> {
        match self {
            AcquisitionError::Transport { step, .. }
            | AcquisitionError::PartialAcquisition { step, .. } => Some(*step),
            AcquisitionError::Restore { .. } => Some(SweepStep::Restore),
            _ => None,
        }
    }
}
