use thiserror::Error;

#[derive(Error, Debug)]
pub enum SonarError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio stream error: {0}")]
    AudioStream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("FFT length {0} is not a power of two")]
    FftSize(usize),

    #[error("Processing executor saturated or shut down; frame dropped")]
    ExecutorRejected,

    #[error("Stage fault in {stage}: {detail}")]
    StageFault { stage: &'static str, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Experiment serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SonarError>;
