//! Session orchestration: capture, processing and emission actors.
//!
//! Three actors share a running session. The capture actor is the audio
//! driver's callback: it copies each delivered buffer into the bounded
//! frame channel and returns immediately, dropping buffers when the
//! processing actor falls behind. The processing actor is a single
//! thread that accumulates capture buffers into one analysis frame per
//! emission period and runs the pipeline. The emission actor is a
//! timer-driven thread writing the pre-generated chirp to the speaker
//! every emission period, independent of processing latency.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, bounded, select, tick};

use crate::audio::AudioDriver;
use crate::config::SonarConfig;
use crate::error::{Result, SonarError};
use crate::experiment::ExperimentLog;
use crate::imaging::ShapeClassifier;
use crate::processing::{FrameResult, SonarProcessor};
use crate::signal_processing::ChirpSynthesizer;

/// Grace period for the emission actor to acknowledge a stop.
const EMISSION_STOP_GRACE: Duration = Duration::from_millis(500);
/// Grace period for the processing actor to drain after a stop.
const PROCESSING_STOP_GRACE: Duration = Duration::from_secs(1);

/// Receives every published frame result, in capture order.
pub trait ResultSink: Send {
    fn publish(&mut self, result: &FrameResult);
}

struct Actor {
    handle: JoinHandle<()>,
    done: Arc<AtomicBool>,
}

impl Actor {
    fn spawn<F: FnOnce() + Send + 'static>(body: F) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let done_flag = Arc::clone(&done);
        let handle = std::thread::spawn(move || {
            body();
            done_flag.store(true, Ordering::Release);
        });
        Self { handle, done }
    }

    /// Join within `grace`; a thread that does not finish in time is
    /// detached and its exit logged later by the runtime.
    fn join_within(self, grace: Duration, name: &str) {
        let deadline = Instant::now() + grace;
        while !self.done.load(Ordering::Acquire) {
            if Instant::now() >= deadline {
                log::warn!("{} did not stop within {:?}; detaching", name, grace);
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let _ = self.handle.join();
    }
}

pub struct SonarSession {
    config: SonarConfig,
    driver: Arc<dyn AudioDriver>,
    running: Arc<AtomicBool>,
    frames_processed: Arc<AtomicU64>,
    frames_dropped: Arc<AtomicU64>,
    last_result: Arc<Mutex<Option<FrameResult>>>,
    emission_stop: Option<Sender<()>>,
    emission: Option<Actor>,
    processing: Option<Actor>,
}

impl SonarSession {
    pub fn new(config: SonarConfig, driver: Arc<dyn AudioDriver>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            driver,
            running: Arc::new(AtomicBool::new(false)),
            frames_processed: Arc::new(AtomicU64::new(0)),
            frames_dropped: Arc::new(AtomicU64::new(0)),
            last_result: Arc::new(Mutex::new(None)),
            emission_stop: None,
            emission: None,
            processing: None,
        })
    }

    /// Start capture, processing and emission. Results are delivered to
    /// the sinks in capture order; the optional logger traces pipeline
    /// stages and is saved when the session stops.
    pub fn start(
        &mut self,
        sinks: Vec<Box<dyn ResultSink>>,
        logger: Option<Box<dyn ExperimentLog>>,
        classifier: Option<Box<dyn ShapeClassifier>>,
    ) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SonarError::Config("session already running".into()));
        }
        if let Err(e) = self.spawn_actors(sinks, logger, classifier) {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    fn spawn_actors(
        &mut self,
        sinks: Vec<Box<dyn ResultSink>>,
        logger: Option<Box<dyn ExperimentLog>>,
        classifier: Option<Box<dyn ShapeClassifier>>,
    ) -> Result<()> {
        let mut processor = SonarProcessor::new(&self.config)?;
        if let Some(logger) = logger {
            processor.set_logger(logger);
        }
        if let Some(classifier) = classifier {
            processor.set_classifier(classifier);
        }

        // Capture -> processing hand-off. The capacity covers two
        // emission periods of buffers; beyond that the capture actor
        // drops rather than queueing unbounded work.
        let buffers_per_frame = self
            .config
            .chirp
            .frame_samples()
            .div_ceil(self.config.chirp.capture_buffer_samples());
        let (frame_tx, frame_rx) = bounded::<Vec<i16>>(2 * buffers_per_frame);

        let dropped = Arc::clone(&self.frames_dropped);
        self.driver.start_capture(Box::new(move |pcm| {
            // the driver reuses its buffer; copy before handing off
            if frame_tx.try_send(pcm.to_vec()).is_err() {
                dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!("{}", SonarError::ExecutorRejected);
            }
        }))?;

        let frame_samples = self.config.chirp.frame_samples();
        let processed = Arc::clone(&self.frames_processed);
        let last_result = Arc::clone(&self.last_result);
        let mut sinks = sinks;
        self.processing = Some(Actor::spawn(move || {
            let mut pending: Vec<i16> = Vec::with_capacity(2 * frame_samples);
            while let Ok(buffer) = frame_rx.recv() {
                pending.extend_from_slice(&buffer);
                while pending.len() >= frame_samples {
                    let frame: Vec<i16> = pending.drain(..frame_samples).collect();
                    match processor.process_frame(&frame) {
                        Ok(Some(result)) => {
                            for sink in sinks.iter_mut() {
                                sink.publish(&result);
                            }
                            if let Ok(mut slot) = last_result.lock() {
                                *slot = Some(result);
                            }
                            processed.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            log::error!("Stage fault, frame dropped: {}", e);
                        }
                    }
                }
            }
            processor.finish();
        }));

        let chirp = ChirpSynthesizer::new(&self.config.chirp).emission();
        let driver = Arc::clone(&self.driver);
        let period = Duration::from_secs_f64(self.config.chirp.emit_period_ms / 1000.0);
        let (stop_tx, stop_rx) = bounded::<()>(0);
        self.emission_stop = Some(stop_tx);
        self.emission = Some(Actor::spawn(move || {
            let ticker = tick(period);
            loop {
                select! {
                    recv(ticker) -> _ => {
                        if let Err(e) = driver.emit(&chirp) {
                            log::warn!("Chirp emission failed: {}", e);
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            }
        }));

        log::info!(
            "Session started: {} sample frames, {:.0} ms emission period",
            frame_samples,
            self.config.chirp.emit_period_ms
        );
        Ok(())
    }

    /// Stop all actors. Idempotent; safe to call while never started.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        // signal the emission actor, then wait briefly
        self.emission_stop = None;
        if let Some(actor) = self.emission.take() {
            actor.join_within(EMISSION_STOP_GRACE, "emission actor");
        }

        // stopping capture drops the callback and with it the channel
        // sender, letting the processing actor drain and exit
        self.driver.stop_capture();
        if let Some(actor) = self.processing.take() {
            actor.join_within(PROCESSING_STOP_GRACE, "processing actor");
        }

        log::info!(
            "Session stopped: {} frames processed, {} capture buffers dropped",
            self.frames_processed.load(Ordering::Relaxed),
            self.frames_dropped.load(Ordering::Relaxed)
        );
    }

    /// Stop and release the audio driver.
    pub fn release(&mut self) {
        self.stop();
        self.driver.release();
    }

    /// Most recent published result. Eventually consistent: written by
    /// the processing actor only.
    pub fn last_result(&self) -> Option<FrameResult> {
        self.last_result.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for SonarSession {
    fn drop(&mut self) {
        self.stop();
    }
}
