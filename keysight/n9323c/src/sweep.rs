//! Sweep requests, segment planning, and the stitched trace.

use std::fmt::Display;

use measurements::Frequency;

use crate::AcquisitionError;

/// Number of points the N9323C records per sweep. This cannot be changed on the instrument.
pub const N9323C_SWEEP_POINTS: usize = 461;

/// Largest number of segments a single request may be split into.
pub const MAX_SEGMENTS: usize = 10_000;

/// What the caller wants to acquire: a frequency window plus the bandwidth and averaging that
/// every sub-sweep uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepRequest {
    /// First frequency of the window.
    pub start: Frequency,
    /// Last frequency of the window, must be larger than `start`.
    pub stop: Frequency,
    /// Resolution bandwidth, applied once before the first segment.
    pub resolution_bandwidth: Frequency,
    /// Whether trace averaging is enabled for every segment.
    pub average_enabled: bool,
    /// Number of averages per segment, at least one.
    pub average_count: u32,
}

impl SweepRequest {
    /// Create a new sweep request.
    pub fn new(
        start: Frequency,
        stop: Frequency,
        resolution_bandwidth: Frequency,
        average_enabled: bool,
        average_count: u32,
    ) -> Self {
        SweepRequest {
            start,
            stop,
            resolution_bandwidth,
            average_enabled,
            average_count,
        }
    }

    /// Width of the requested window.
    pub fn span(&self) -> Frequency {
        Frequency::from_hertz(self.stop.as_hertz() - self.start.as_hertz())
    }
}

/// Capabilities of a bounded-buffer analyzer that limit how a request is split up.
///
/// The defaults describe the Keysight N9323C: 461 points per sweep, at most 500 MHz per
/// segment, a frequency range of 0 to 3 GHz, and a resolution bandwidth between 10 Hz and 3 MHz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepLimits {
    /// Widest window that is captured in one sweep.
    pub max_segment_span: Frequency,
    /// Points per sweep, fixed by the hardware.
    pub sample_count: usize,
    /// Lowest frequency the analyzer can tune to.
    pub min_frequency: Frequency,
    /// Highest frequency the analyzer can tune to.
    pub max_frequency: Frequency,
    /// Smallest resolution bandwidth.
    pub min_resolution_bandwidth: Frequency,
    /// Largest resolution bandwidth.
    pub max_resolution_bandwidth: Frequency,
}

impl Default for SweepLimits {
    fn default() -> Self {
        SweepLimits {
            max_segment_span: Frequency::from_hertz(5e8),
            sample_count: N9323C_SWEEP_POINTS,
            min_frequency: Frequency::from_hertz(0.0),
            max_frequency: Frequency::from_hertz(3e9),
            min_resolution_bandwidth: Frequency::from_hertz(10.0),
            max_resolution_bandwidth: Frequency::from_hertz(3e6),
        }
    }
}

impl SweepLimits {
    /// Check a request against these limits.
    ///
    /// This never talks to the instrument, so a request that fails here has not changed any
    /// instrument setting.
    pub fn validate(&self, request: &SweepRequest) -> Result<(), AcquisitionError> {
        let invalid = |msg: String| Err(AcquisitionError::InvalidRequest(msg));

        let max_span = self.max_segment_span.as_hertz();
        if !max_span.is_finite() || max_span <= 0.0 {
            return invalid(format!("Maximum segment span must be positive, got {max_span} Hz"));
        }
        if self.sample_count < 2 {
            return invalid(format!(
                "At least two samples per segment are required, got {}",
                self.sample_count
            ));
        }

        let start = request.start.as_hertz();
        let stop = request.stop.as_hertz();
        if !start.is_finite() || !stop.is_finite() {
            return invalid(format!("Frequencies must be finite, got {start} Hz to {stop} Hz"));
        }
        if stop <= start {
            return invalid(format!(
                "Stop frequency ({stop} Hz) must be larger than start frequency ({start} Hz)"
            ));
        }
        let (f_min, f_max) = (self.min_frequency.as_hertz(), self.max_frequency.as_hertz());
        if start < f_min || stop > f_max {
            return invalid(format!(
                "Window {start} Hz to {stop} Hz is outside of the analyzer range [{f_min}, {f_max}] Hz"
            ));
        }

        let rbw = request.resolution_bandwidth.as_hertz();
        let (rbw_min, rbw_max) = (
            self.min_resolution_bandwidth.as_hertz(),
            self.max_resolution_bandwidth.as_hertz(),
        );
        if !(rbw_min..=rbw_max).contains(&rbw) {
            return invalid(format!(
                "Resolution bandwidth {rbw} Hz is outside of [{rbw_min}, {rbw_max}] Hz"
            ));
        }

        if request.average_count == 0 {
            return invalid("Average count must be at least one".to_string());
        }

        let num_segments = ((stop - start) / max_span).ceil();
        if num_segments > MAX_SEGMENTS as f64 {
            return invalid(format!(
                "{start} Hz to {stop} Hz needs {num_segments} segments of {max_span} Hz, at most {MAX_SEGMENTS} are allowed"
            ));
        }
        if start + max_span <= start {
            return invalid(format!(
                "Maximum segment span of {max_span} Hz is below the resolution of {start} Hz"
            ));
        }
        Ok(())
    }

    /// Validate a request and split it into contiguous segments.
    ///
    /// Segment `i` starts at `start + i * max_segment_span` and stops at the end of the window or
    /// at `start + (i + 1) * max_segment_span`, whichever comes first. The stop of one segment is
    /// therefore bit-identical to the start of the next. There are `ceil(span / max_segment_span)`
    /// segments and only the last one may be narrower than the maximum span.
    pub fn plan(&self, request: &SweepRequest) -> Result<Vec<Segment>, AcquisitionError> {
        self.validate(request)?;

        let start = request.start.as_hertz();
        let stop = request.stop.as_hertz();
        let max_span = self.max_segment_span.as_hertz();
        let num_segments = (((stop - start) / max_span).ceil() as usize).max(1);

        let segments: Vec<Segment> = (0..num_segments)
            .map(|idx| {
                let seg_start = start + idx as f64 * max_span;
                let seg_stop = (start + (idx + 1) as f64 * max_span).min(stop);
                Segment {
                    start: Frequency::from_hertz(seg_start),
                    stop: Frequency::from_hertz(seg_stop),
                    sample_count: self.sample_count,
                }
            })
            // rounding can leave an empty window behind the last real one
            .filter(|seg| seg.start.as_hertz() < seg.stop.as_hertz())
            .collect();
        if segments.is_empty() {
            return Err(AcquisitionError::InvalidRequest(format!(
                "Maximum segment span of {max_span} Hz is too small to split {start} Hz to {stop} Hz"
            )));
        }
        Ok(segments)
    }
}

/// One sub-sweep of a segmented acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// First frequency of the segment.
    pub start: Frequency,
    /// Last frequency of the segment.
    pub stop: Frequency,
    /// Number of points the analyzer records in this segment.
    pub sample_count: usize,
}

impl Segment {
    /// Frequency axis of this segment in Hz.
    ///
    /// `sample_count` evenly spaced points from `start` to `stop`, both included.
    pub fn frequencies(&self) -> Vec<f64> {
        let start = self.start.as_hertz();
        let stop = self.stop.as_hertz();
        let last = self.sample_count.saturating_sub(1);
        if last == 0 {
            return vec![start; self.sample_count];
        }
        let step = (stop - start) / last as f64;
        (0..self.sample_count)
            .map(|k| if k == last { stop } else { start + step * k as f64 })
            .collect()
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} Hz, {} Hz] ({} points)",
            self.start.as_hertz(),
            self.stop.as_hertz(),
            self.sample_count
        )
    }
}

/// The result of a segmented acquisition: one continuous spectrum.
///
/// Every segment contributes `samples_per_segment` points. As each segment axis includes both of
/// its end points, the last frequency of a segment and the first frequency of the next one are
/// the same. These duplicates are kept as recorded; see
/// [`StitchedTrace::boundary_duplicates`] and [`StitchedTrace::without_boundary_duplicates`].
#[derive(Debug, Clone, PartialEq)]
pub struct StitchedTrace {
    /// Frequency axis in Hz, monotonically non-decreasing.
    pub frequencies_hz: Vec<f64>,
    /// Measured power in dBm, one value per frequency.
    pub amplitudes_dbm: Vec<f64>,
    samples_per_segment: usize,
}

impl StitchedTrace {
    /// Build a trace from its axis and values.
    ///
    /// # Panics
    /// If the two vectors differ in length, this is a bug in the caller.
    pub(crate) fn new(
        frequencies_hz: Vec<f64>,
        amplitudes_dbm: Vec<f64>,
        samples_per_segment: usize,
    ) -> Self {
        assert_eq!(
            frequencies_hz.len(),
            amplitudes_dbm.len(),
            "Frequency axis and amplitudes must have the same length"
        );
        StitchedTrace {
            frequencies_hz,
            amplitudes_dbm,
            samples_per_segment,
        }
    }

    /// Number of (frequency, amplitude) pairs.
    pub fn len(&self) -> usize {
        self.frequencies_hz.len()
    }

    /// `true` if the trace holds no data, e.g., a partial trace of a failed first segment.
    pub fn is_empty(&self) -> bool {
        self.frequencies_hz.is_empty()
    }

    /// Number of points contributed by each segment.
    pub fn samples_per_segment(&self) -> usize {
        self.samples_per_segment
    }

    /// Number of segments the trace was stitched from.
    pub fn num_segments(&self) -> usize {
        if self.samples_per_segment == 0 {
            return 0;
        }
        self.len() / self.samples_per_segment
    }

    /// Iterate over (frequency in Hz, amplitude in dBm) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies_hz
            .iter()
            .copied()
            .zip(self.amplitudes_dbm.iter().copied())
    }

    /// Indices of points that repeat the frequency of the point before them at a segment
    /// boundary.
    pub fn boundary_duplicates(&self) -> Vec<usize> {
        (1..self.num_segments())
            .map(|seg| seg * self.samples_per_segment)
            .filter(|&idx| self.frequencies_hz[idx] == self.frequencies_hz[idx - 1])
            .collect()
    }

    /// Copy of the axis and values with the boundary duplicates removed.
    ///
    /// At each duplicated boundary the point recorded by the earlier segment is kept.
    pub fn without_boundary_duplicates(&self) -> (Vec<f64>, Vec<f64>) {
        let dups = self.boundary_duplicates();
        self.iter()
            .enumerate()
            .filter(|(idx, _)| !dups.contains(idx))
            .map(|(_, pair)| pair)
            .unzip()
    }
}
