//! Segmented sweep acquisition for analyzers with a fixed number of points per sweep.
//!
//! A window wider than one sweep can cover is split into segments (see [`SweepLimits::plan`]).
//! Each segment is swept once with the caller's averaging settings and the partial traces are
//! concatenated into one [`StitchedTrace`]. The analyzer is handed over as a [`SweepControl`], so
//! the same routine works for any instrument that can provide these few operations.

use std::fmt::Display;

use labinstr::InstrumentError;
use log::{debug, info, warn};
use measurements::Frequency;

use crate::{AcquisitionError, Segment, StitchedTrace, SweepLimits, SweepRequest};

/// The operations a segmented acquisition needs from an analyzer.
///
/// All methods block until the instrument has processed the command.
pub trait SweepControl {
    /// Set the frequency window of the next sweep.
    fn set_frequency_window(&mut self, start: Frequency, stop: Frequency)
    -> Result<(), InstrumentError>;

    /// Switch continuous sweeping on or off.
    fn set_continuous_sweep(&mut self, enabled: bool) -> Result<(), InstrumentError>;

    /// Trigger a single sweep and only return once it is complete.
    ///
    /// Completion must be detected by asking the instrument, never by waiting a fixed time.
    fn trigger_single_sweep_and_wait(&mut self) -> Result<(), InstrumentError>;

    /// Set the resolution bandwidth.
    fn set_resolution_bandwidth(&mut self, rbw: Frequency) -> Result<(), InstrumentError>;

    /// Enable or disable trace averaging and set the number of averages.
    fn set_averaging(&mut self, enabled: bool, count: u32) -> Result<(), InstrumentError>;

    /// Throw away accumulated averages and start averaging anew.
    fn restart_averaging(&mut self) -> Result<(), InstrumentError>;

    /// Read the amplitudes of the current trace in dBm.
    fn read_trace(&mut self) -> Result<Vec<f64>, InstrumentError>;
}

/// The step of an acquisition at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStep {
    /// Applying the resolution bandwidth before the first segment.
    ResolutionBandwidth,
    /// Pushing the segment window to the analyzer.
    FrequencyWindow,
    /// Switching continuous sweeping off.
    ContinuousSweepOff,
    /// Triggering the sweep and waiting for it to complete.
    SingleSweep,
    /// Reapplying the averaging settings.
    Averaging,
    /// Restarting the averaging.
    AverageRestart,
    /// Reading the trace data.
    ReadTrace,
    /// Restoring the window and continuous sweeping after the acquisition.
    Restore,
}

impl Display for SweepStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SweepStep::ResolutionBandwidth => "set resolution bandwidth",
            SweepStep::FrequencyWindow => "set frequency window",
            SweepStep::ContinuousSweepOff => "disable continuous sweep",
            SweepStep::SingleSweep => "single sweep",
            SweepStep::Averaging => "set averaging",
            SweepStep::AverageRestart => "restart averaging",
            SweepStep::ReadTrace => "read trace",
            SweepStep::Restore => "restore window and continuous sweep",
        };
        write!(f, "{s}")
    }
}

/// Receives acquired traces and turns them into the caller's preferred form.
pub trait DataProcessor {
    /// What the processor hands back.
    type Output;

    /// Feed a freshly acquired trace.
    fn push(&mut self, trace: StitchedTrace);

    /// Get everything processed so far.
    fn get_all(&mut self) -> Self::Output;
}

/// A [`DataProcessor`] that keeps every trace it is given.
#[derive(Debug, Clone, Default)]
pub struct TraceCollector {
    traces: Vec<StitchedTrace>,
}

impl TraceCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataProcessor for TraceCollector {
    type Output = Vec<StitchedTrace>;

    fn push(&mut self, trace: StitchedTrace) {
        self.traces.push(trace);
    }

    fn get_all(&mut self) -> Self::Output {
        self.traces.clone()
    }
}

/// Exclusive use of an analyzer for the duration of one acquisition.
///
/// The session restores the frequency window and switches continuous sweeping back on exactly
/// once: either when [`SweepSession::close`] is called or, if the acquisition bails out early,
/// when the session is dropped. Restoration errors on drop can only be logged.
pub struct SweepSession<'a, S: SweepControl> {
    surface: &'a mut S,
    restore_window: (Frequency, Frequency),
    restored: bool,
}

impl<'a, S: SweepControl> SweepSession<'a, S> {
    /// Start a session that restores `restore_window` when it ends.
    pub fn open(surface: &'a mut S, restore_window: (Frequency, Frequency)) -> Self {
        SweepSession {
            surface,
            restore_window,
            restored: false,
        }
    }

    /// The analyzer controlled by this session.
    pub fn surface(&mut self) -> &mut S {
        &mut *self.surface
    }

    /// End the session and report whether restoring the analyzer worked.
    pub fn close(mut self) -> Result<(), InstrumentError> {
        self.restore()
    }

    fn restore(&mut self) -> Result<(), InstrumentError> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        let (start, stop) = self.restore_window;
        // continuous sweeping is switched back on even if the window could not be restored
        let window = self.surface.set_frequency_window(start, stop);
        let continuous = self.surface.set_continuous_sweep(true);
        window.and(continuous)
    }
}

impl<S: SweepControl> Drop for SweepSession<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!("Could not restore the analyzer after a failed acquisition: {e}");
        }
    }
}

/// Splits a wide request into segments, acquires them one by one, and stitches the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepAcquirer {
    limits: SweepLimits,
}

impl SweepAcquirer {
    /// Create an acquirer for an analyzer with the given limits.
    pub fn new(limits: SweepLimits) -> Self {
        SweepAcquirer { limits }
    }

    /// The limits this acquirer plans with.
    pub fn limits(&self) -> &SweepLimits {
        &self.limits
    }

    /// Acquire the requested window as one stitched trace.
    ///
    /// The request is validated before anything is sent. The resolution bandwidth is set once,
    /// then every segment is acquired in order: set the window, switch continuous sweeping off,
    /// sweep once and wait, reapply and restart averaging (so no data of the previous window
    /// leaks in), and read the trace. Afterwards the window spanning the full frequency axis is
    /// set and continuous sweeping is switched back on. This restoration also happens when a
    /// segment fails.
    ///
    /// # Errors
    /// - [`AcquisitionError::InvalidRequest`] if the request does not fit the limits. Nothing
    ///   has been sent at that point, so no restoration takes place either.
    /// - [`AcquisitionError::Transport`] if the setup or the first segment fails.
    /// - [`AcquisitionError::PartialAcquisition`] if a later segment fails; the data of the
    ///   completed segments is part of the error.
    /// - [`AcquisitionError::Restore`] if all data was acquired but restoring failed; the data
    ///   is part of the error.
    pub fn acquire<S: SweepControl>(
        &self,
        request: &SweepRequest,
        surface: &mut S,
    ) -> Result<StitchedTrace, AcquisitionError> {
        let segments = self.limits.plan(request)?;
        let samples = self.limits.sample_count;
        let axis: Vec<f64> = segments.iter().flat_map(Segment::frequencies).collect();
        let restore_window = (
            Frequency::from_hertz(axis[0]),
            Frequency::from_hertz(axis[axis.len() - 1]),
        );
        info!(
            "Acquiring {} Hz to {} Hz in {} segment(s) of {samples} points",
            request.start.as_hertz(),
            request.stop.as_hertz(),
            segments.len()
        );

        let mut session = SweepSession::open(surface, restore_window);
        let mut amplitudes: Vec<f64> = Vec::with_capacity(axis.len());

        if let Err(source) = session
            .surface()
            .set_resolution_bandwidth(request.resolution_bandwidth)
        {
            return Err(AcquisitionError::Transport {
                segment: 0,
                step: SweepStep::ResolutionBandwidth,
                source,
            });
        }

        for (idx, segment) in segments.iter().enumerate() {
            debug!("Segment {}/{}: {segment}", idx + 1, segments.len());
            match acquire_segment(session.surface(), segment, request) {
                Ok(trace) => amplitudes.extend(trace),
                Err((step, source)) if idx == 0 => {
                    return Err(AcquisitionError::Transport {
                        segment: idx,
                        step,
                        source,
                    });
                }
                Err((step, source)) => {
                    let done = idx * samples;
                    let partial = StitchedTrace::new(axis[..done].to_vec(), amplitudes, samples);
                    return Err(AcquisitionError::PartialAcquisition {
                        segment: idx,
                        total: segments.len(),
                        step,
                        partial: Box::new(partial),
                        source,
                    });
                }
            }
        }

        let trace = StitchedTrace::new(axis, amplitudes, samples);
        if let Err(source) = session.close() {
            return Err(AcquisitionError::Restore {
                trace: Box::new(trace),
                source,
            });
        }
        info!("Acquired {} points", trace.len());
        Ok(trace)
    }

    /// Acquire the requested window and hand the trace to a data processor.
    ///
    /// Returns whatever the processor returns from [`DataProcessor::get_all`] after the new
    /// trace was pushed.
    pub fn acquire_with<S: SweepControl, D: DataProcessor>(
        &self,
        request: &SweepRequest,
        surface: &mut S,
        processor: &mut D,
    ) -> Result<D::Output, AcquisitionError> {
        let trace = self.acquire(request, surface)?;
        processor.push(trace);
        Ok(processor.get_all())
    }
}

/// Acquire one segment and return its amplitudes, or the step that failed.
fn acquire_segment<S: SweepControl>(
    surface: &mut S,
    segment: &Segment,
    request: &SweepRequest,
) -> Result<Vec<f64>, (SweepStep, InstrumentError)> {
    let at = |step: SweepStep| move |e: InstrumentError| (step, e);

    surface
        .set_frequency_window(segment.start, segment.stop)
        .map_err(at(SweepStep::FrequencyWindow))?;
    surface
        .set_continuous_sweep(false)
        .map_err(at(SweepStep::ContinuousSweepOff))?;
    surface
        .trigger_single_sweep_and_wait()
        .map_err(at(SweepStep::SingleSweep))?;
    surface
        .set_averaging(request.average_enabled, request.average_count)
        .map_err(at(SweepStep::Averaging))?;
    surface
        .restart_averaging()
        .map_err(at(SweepStep::AverageRestart))?;
    let trace = surface.read_trace().map_err(at(SweepStep::ReadTrace))?;

    if trace.len() != segment.sample_count {
        return Err((
            SweepStep::ReadTrace,
            InstrumentError::ResponseParseError(format!(
                "Expected {} trace points, received {}",
                segment.sample_count,
                trace.len()
            )),
        ));
    }
    Ok(trace)
}
