//! Per-frame pipeline orchestration.
//!
//! One `SonarProcessor` owns all mutable pipeline state for a session:
//! the chirp templates, the bandpass kernel, the Doppler EMA, the
//! background model, and the distance history feeding the physical
//! mapper. Frames move through the stages by value; each stage returns
//! a new buffer.

use num_complex::Complex64;

use crate::config::SonarConfig;
use crate::error::{Result, SonarError};
use crate::experiment::ExperimentLog;
use crate::imaging::{ObjectSize, PhysicalImage, PhysicalMapper, ShapeClassifier, ShapeLabel};
use crate::signal_processing::{
    BackgroundSubtractor, ChirpSynthesizer, DopplerSearch, Downconverter, EchoAligner,
    FirBandpass, PhaseCompensator, RangeDopplerImage, TfImage,
};

/// The distance history feeding the aperture estimate keeps this many
/// recent frames.
const DISTANCE_HISTORY_CAPACITY: usize = 128;

fn stage_fault(stage: &'static str, error: SonarError) -> SonarError {
    SonarError::StageFault {
        stage,
        detail: error.to_string(),
    }
}

/// Published result of one processed frame.
#[derive(Debug, Clone)]
pub struct FrameResult {
    pub frame_index: u64,
    /// Gated, clamped Doppler velocity in m/s
    pub velocity_m_s: f64,
    pub correlation: f64,
    /// Distance of the strongest range bin, millimetres
    pub peak_distance_mm: f64,
    pub object_size: Option<ObjectSize>,
    pub shape: Option<ShapeLabel>,
    pub range_doppler: RangeDopplerImage,
}

pub struct SonarProcessor {
    config: SonarConfig,
    reference: Vec<Complex64>,
    bandpass: FirBandpass,
    doppler: DopplerSearch,
    aligner: EchoAligner,
    downconverter: Downconverter,
    background: BackgroundSubtractor,
    mapper: PhysicalMapper,
    classifier: Option<Box<dyn ShapeClassifier>>,
    logger: Option<Box<dyn ExperimentLog>>,
    distances_mm: Vec<f64>,
    last_foreground: Option<TfImage>,
    last_range_doppler: Option<RangeDopplerImage>,
    frame_index: u64,
}

impl SonarProcessor {
    pub fn new(config: &SonarConfig) -> Result<Self> {
        config.validate()?;

        let synthesizer = ChirpSynthesizer::new(&config.chirp);
        let bandpass = FirBandpass::new(
            config.chirp.f_lo_hz,
            config.chirp.f_hi_hz,
            config.chirp.sample_rate_hz as f64,
            config.processing.fir_taps,
        )?;

        Ok(Self {
            reference: synthesizer.analytic_reference(),
            bandpass,
            doppler: DopplerSearch::new(&config.doppler),
            aligner: EchoAligner::new(&config.chirp, &config.processing, &config.doppler),
            downconverter: Downconverter::new(synthesizer.downchirp(), &config.processing),
            background: BackgroundSubtractor::new(config.processing.background_alpha),
            mapper: PhysicalMapper::new(&config.chirp, &config.physical),
            classifier: None,
            logger: None,
            distances_mm: Vec::new(),
            last_foreground: None,
            last_range_doppler: None,
            frame_index: 0,
            config: config.clone(),
        })
    }

    pub fn set_classifier(&mut self, classifier: Box<dyn ShapeClassifier>) {
        self.classifier = Some(classifier);
    }

    pub fn set_logger(&mut self, logger: Box<dyn ExperimentLog>) {
        self.logger = Some(logger);
    }

    /// Run one captured frame through the full pipeline. Empty frames
    /// yield `None`; a stage error drops the frame but leaves all
    /// session state intact for the next one.
    pub fn process_frame(&mut self, frame: &[i16]) -> Result<Option<FrameResult>> {
        if frame.is_empty() {
            return Ok(None);
        }

        let index = self.frame_index;
        self.frame_index += 1;

        if let Some(logger) = self.logger.as_mut() {
            logger.log_raw(frame, index);
        }

        let preprocessed = self.preprocess(frame);
        if let Some(logger) = self.logger.as_mut() {
            logger.log_complex(&preprocessed, index, "bandpass");
        }

        let aligned = self
            .aligner
            .align(&preprocessed, &mut self.doppler, &self.reference);
        if let Some(logger) = self.logger.as_mut() {
            logger.log_velocity(
                aligned.estimate.raw_m_s,
                aligned.estimate.smoothed_m_s,
                aligned.estimate.correlation,
                index,
            );
            logger.log_complex(&aligned.samples, index, "aligned");
        }

        let baseband = self.downconverter.dechirp(&aligned.samples);
        let tf = self
            .downconverter
            .stft(&baseband)
            .map_err(|e| stage_fault("stft", e))?;
        let foreground = self.background.subtract(tf);
        let range_doppler = self
            .downconverter
            .range_doppler(&foreground)
            .map_err(|e| stage_fault("range_doppler", e))?;
        let compensated = PhaseCompensator::compensate(&range_doppler, aligned.velocity_m_s);
        if let Some(logger) = self.logger.as_mut() {
            logger.log_image(&compensated, index, "range_doppler");
        }

        let peak_distance_mm = self.update_distances(&compensated);

        let physical = self.mapper.map(&compensated, &self.distances_mm);
        let object_size = physical.as_ref().map(|p| self.mapper.extract_size(p));
        let shape = match (&self.classifier, &physical) {
            (Some(classifier), Some(physical)) => Some(classifier.classify(
                physical,
                self.config.physical.boundary_threshold_ratio,
            )),
            _ => None,
        };

        self.last_foreground = Some(foreground);
        self.last_range_doppler = Some(compensated.clone());

        Ok(Some(FrameResult {
            frame_index: index,
            velocity_m_s: aligned.velocity_m_s,
            correlation: aligned.estimate.correlation,
            peak_distance_mm,
            object_size,
            shape,
            range_doppler: compensated,
        }))
    }

    fn preprocess(&self, frame: &[i16]) -> Vec<Complex64> {
        let complex: Vec<Complex64> = frame
            .iter()
            .map(|&s| Complex64::new(s as f64, 0.0))
            .collect();
        let filtered = self.bandpass.apply(&complex);
        if self.config.processing.double_bandpass {
            self.bandpass.apply(&filtered)
        } else {
            filtered
        }
    }

    /// Record the distance of the strongest range bin. Frames without a
    /// significant peak leave the history untouched and report the last
    /// known distance (or zero).
    fn update_distances(&mut self, image: &RangeDopplerImage) -> f64 {
        let mut peak = 0.0f32;
        let mut peak_bin = None;
        for (bin, row) in image.iter().enumerate() {
            for &value in row {
                if value > peak {
                    peak = value;
                    peak_bin = Some(bin);
                }
            }
        }

        match peak_bin {
            Some(bin) if peak >= self.config.physical.min_peak_intensity => {
                let distance = self.mapper.bin_distance_mm(bin);
                self.distances_mm.push(distance);
                if self.distances_mm.len() > DISTANCE_HISTORY_CAPACITY {
                    self.distances_mm.remove(0);
                }
                distance
            }
            _ => self.distances_mm.last().copied().unwrap_or(0.0),
        }
    }

    /// Physical-space view of the most recent compensated image.
    pub fn map_physical(&self) -> Option<PhysicalImage> {
        self.last_range_doppler
            .as_ref()
            .and_then(|image| self.mapper.map(image, &self.distances_mm))
    }

    pub fn last_range_doppler(&self) -> Option<&RangeDopplerImage> {
        self.last_range_doppler.as_ref()
    }

    pub fn last_foreground(&self) -> Option<&TfImage> {
        self.last_foreground.as_ref()
    }

    pub fn distances_mm(&self) -> &[f64] {
        &self.distances_mm
    }

    pub fn frames_seen(&self) -> u64 {
        self.frame_index
    }

    /// Forget the clutter model, e.g. after the scene has been
    /// rearranged between measurements.
    pub fn reset_background(&mut self) {
        self.background.reset();
    }

    /// Flush the attached experiment logger, if any.
    pub fn finish(&mut self) {
        if let Some(logger) = self.logger.as_mut()
            && let Err(e) = logger.save()
        {
            log::error!("Failed to save experiment trace: {}", e);
        }
    }
}
