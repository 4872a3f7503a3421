//! Per-stage experiment tracing.
//!
//! A session can carry an optional trace logger that records the raw
//! capture, intermediate stage outputs, and the velocity track for the
//! most recent frames. The JSON implementation writes one document per
//! experiment plus a WAV dump of the retained raw frames, for offline
//! replay through `analyze_wav`.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::Utc;
use num_complex::Complex64;
use rolling_stats::Stats;
use serde_json::{Map, Value, json};

use crate::config::ChirpConfig;
use crate::error::Result;
use crate::signal_processing::RangeDopplerImage;
use crate::wav::save_wav;

/// The in-memory ring keeps this many recent frames.
pub const SAMPLE_RING_CAPACITY: usize = 10;

/// Capability interface for per-stage tracing. All methods are fire
/// and forget; only `save` can fail.
pub trait ExperimentLog: Send {
    fn start_experiment(&mut self, name: &str, dir: &Path);
    fn log_raw(&mut self, frame: &[i16], index: u64);
    fn log_complex(&mut self, frame: &[Complex64], index: u64, stage: &str);
    fn log_image(&mut self, image: &RangeDopplerImage, index: u64, stage: &str);
    fn log_velocity(&mut self, raw: f64, smoothed: f64, correlation: f64, index: u64);
    fn save(&mut self) -> Result<()>;
}

pub struct JsonExperimentLog {
    chirp: ChirpConfig,
    name: String,
    dir: PathBuf,
    experiment_id: String,
    start_time: String,
    samples: VecDeque<(u64, Map<String, Value>)>,
}

impl JsonExperimentLog {
    pub fn new(chirp: &ChirpConfig) -> Self {
        Self {
            chirp: chirp.clone(),
            name: "experiment".into(),
            dir: PathBuf::from("."),
            experiment_id: String::new(),
            start_time: String::new(),
            samples: VecDeque::new(),
        }
    }

    /// Record for frame `index`, creating it (and evicting the oldest
    /// retained frame) on first touch.
    fn record(&mut self, index: u64) -> &mut Map<String, Value> {
        let pos = match self.samples.iter().position(|(i, _)| *i == index) {
            Some(pos) => pos,
            None => {
                let mut map = Map::new();
                map.insert("sampleIndex".into(), json!(index));
                self.samples.push_back((index, map));
                while self.samples.len() > SAMPLE_RING_CAPACITY {
                    self.samples.pop_front();
                }
                self.samples.len() - 1
            }
        };
        &mut self.samples[pos].1
    }
}

fn stats_object(values: impl Iterator<Item = f64>, shape: Option<(usize, usize)>) -> Value {
    let mut stats: Stats<f64> = Stats::new();
    for v in values {
        stats.update(v);
    }
    let mut map = Map::new();
    map.insert("min".into(), json!(stats.min));
    map.insert("max".into(), json!(stats.max));
    map.insert("mean".into(), json!(stats.mean));
    if let Some((rows, cols)) = shape {
        map.insert("rows".into(), json!(rows));
        map.insert("cols".into(), json!(cols));
    }
    Value::Object(map)
}

impl ExperimentLog for JsonExperimentLog {
    fn start_experiment(&mut self, name: &str, dir: &Path) {
        let now = Utc::now();
        self.name = name.to_string();
        self.dir = dir.to_path_buf();
        self.start_time = now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        self.experiment_id = format!("{}-{}", name, now.format("%Y%m%d%H%M%S"));
        self.samples.clear();
    }

    fn log_raw(&mut self, frame: &[i16], index: u64) {
        let signal: Vec<Value> = frame.iter().map(|&s| json!(s)).collect();
        self.record(index).insert("rawSignal".into(), Value::Array(signal));
    }

    fn log_complex(&mut self, frame: &[Complex64], index: u64, stage: &str) {
        let magnitudes: Vec<f64> = frame.iter().map(|c| c.norm()).collect();
        let stats = stats_object(magnitudes.iter().cloned(), None);
        let record = self.record(index);
        record.insert(stage.to_string(), json!(magnitudes));
        record.insert(format!("{}_stats", stage), stats);
    }

    fn log_image(&mut self, image: &RangeDopplerImage, index: u64, stage: &str) {
        let rows = image.len();
        let cols = image.first().map_or(0, Vec::len);
        let values = image.iter().flat_map(|row| row.iter().map(|&v| v as f64));
        let stats = stats_object(values, Some((rows, cols)));
        let record = self.record(index);
        record.insert(format!("{}_image", stage), json!(image));
        record.insert(format!("{}_stats", stage), stats);
    }

    fn log_velocity(&mut self, raw: f64, smoothed: f64, correlation: f64, index: u64) {
        self.record(index).insert(
            "velocityData".into(),
            json!({
                "rawVelocity": raw,
                "smoothedVelocity": smoothed,
                "correlationScore": correlation,
            }),
        );
    }

    fn save(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let document = json!({
            "metadata": {
                "name": self.name,
                "startTime": self.start_time,
                "endTime": Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
                "experimentId": self.experiment_id,
                "chirpMinFreq": self.chirp.f_lo_hz,
                "chirpMaxFreq": self.chirp.f_hi_hz,
                "chirpDuration": self.chirp.chirp_ms,
                "sampleRate": self.chirp.sample_rate_hz,
                "emitPeriod": self.chirp.emit_period_ms,
                "deviceLatency": self.chirp.device_latency_ms,
            },
            "samples": self
                .samples
                .iter()
                .map(|(_, record)| Value::Object(record.clone()))
                .collect::<Vec<_>>(),
        });

        let json_path = self.dir.join(format!("{}.json", self.name));
        let file = std::fs::File::create(&json_path)?;
        serde_json::to_writer_pretty(file, &document)?;
        log::info!("Experiment trace written to {}", json_path.display());

        // WAV dump of the retained raw frames, concatenated in order
        let mut raw: Vec<i16> = Vec::new();
        for (_, record) in &self.samples {
            if let Some(Value::Array(signal)) = record.get("rawSignal") {
                raw.extend(
                    signal
                        .iter()
                        .filter_map(|v| v.as_i64())
                        .map(|v| v as i16),
                );
            }
        }
        if !raw.is_empty() {
            let wav_path = self.dir.join(format!("{}_raw.wav", self.name));
            save_wav(&wav_path, &raw, self.chirp.sample_rate_hz)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger() -> JsonExperimentLog {
        JsonExperimentLog::new(&ChirpConfig::default())
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let mut log = logger();
        for index in 0..15u64 {
            log.log_velocity(0.0, 0.0, 1.0, index);
        }
        assert_eq!(log.samples.len(), SAMPLE_RING_CAPACITY);
        assert_eq!(log.samples.front().unwrap().0, 5);
        assert_eq!(log.samples.back().unwrap().0, 14);
    }

    #[test]
    fn test_stages_accumulate_on_one_record() {
        let mut log = logger();
        log.log_raw(&[1, -2, 3], 0);
        log.log_complex(&[Complex64::new(3.0, 4.0)], 0, "bandpass");
        log.log_velocity(1.0, 0.9, 5.0, 0);
        assert_eq!(log.samples.len(), 1);

        let record = &log.samples[0].1;
        assert!(record.contains_key("rawSignal"));
        assert!(record.contains_key("bandpass"));
        assert!(record.contains_key("bandpass_stats"));
        assert!(record.contains_key("velocityData"));

        // the single magnitude is |3+4i| = 5
        let stats = record.get("bandpass_stats").unwrap();
        assert_eq!(stats.get("mean").unwrap().as_f64().unwrap(), 5.0);
    }

    #[test]
    fn test_image_stats_carry_shape() {
        let mut log = logger();
        let image: RangeDopplerImage = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        log.log_image(&image, 3, "range_doppler");
        let record = &log.samples[0].1;
        let stats = record.get("range_doppler_stats").unwrap();
        assert_eq!(stats.get("rows").unwrap().as_u64().unwrap(), 3);
        assert_eq!(stats.get("cols").unwrap().as_u64().unwrap(), 2);
        assert_eq!(stats.get("max").unwrap().as_f64().unwrap(), 6.0);
        assert!(record.contains_key("range_doppler_image"));
    }

    #[test]
    fn test_save_writes_document() {
        let dir = std::env::temp_dir().join("sondar_experiment_test");
        let mut log = logger();
        log.start_experiment("bench", &dir);
        log.log_raw(&[0, 100, -100], 0);
        log.log_velocity(0.5, 0.4, 2.0, 0);
        log.save().unwrap();

        let text = std::fs::read_to_string(dir.join("bench.json")).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["metadata"]["name"], "bench");
        assert_eq!(doc["metadata"]["sampleRate"], 48_000);
        assert_eq!(doc["samples"][0]["sampleIndex"], 0);
        assert!(dir.join("bench_raw.wav").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
