use std::path::Path;

use hound::{WavReader, WavSpec, WavWriter};

use crate::error::{Result, SonarError};

/// Save mono signed-16 PCM to a WAV file.
pub fn save_wav<P: AsRef<Path>>(path: P, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)
        .map_err(|e| SonarError::AudioStream(e.to_string()))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| SonarError::AudioStream(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| SonarError::AudioStream(e.to_string()))?;
    Ok(())
}

/// Load mono signed-16 PCM from a WAV file; returns the samples and the
/// file's sample rate.
pub fn load_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<i16>, u32)> {
    let mut reader =
        WavReader::open(path.as_ref()).map_err(|e| SonarError::AudioStream(e.to_string()))?;
    let spec = reader.spec();

    if spec.channels != 1 {
        return Err(SonarError::AudioStream(format!(
            "Expected mono WAV, got {} channels",
            spec.channels
        )));
    }
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(SonarError::AudioStream(
            "Expected 16-bit integer WAV samples".into(),
        ));
    }

    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SonarError::AudioStream(e.to_string()))?;
    Ok((samples, spec.sample_rate))
}
