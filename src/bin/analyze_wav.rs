use std::path::PathBuf;

use clap::Parser;
use rolling_stats::Stats;
use serde::Serialize;

use sondar::config::SonarConfig;
use sondar::processing::SonarProcessor;
use sondar::wav::load_wav;

#[derive(Parser, Debug)]
#[command(name = "analyze_wav")]
#[command(about = "Run recorded captures through the sonar pipeline", long_about = None)]
struct Args {
    /// WAV files to analyze (mono 16-bit captures)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// TOML configuration file (defaults used when omitted)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Print every frame instead of the per-file summary only
    #[arg(short = 'p', long)]
    per_frame: bool,

    /// Increase output verbosity
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize)]
struct StatsSummary {
    count: usize,
    mean: f64,
    std_dev: f64,
    min: f64,
    max: f64,
}

impl StatsSummary {
    fn from_stats(stats: &Stats<f64>) -> Option<Self> {
        if stats.count == 0 {
            return None;
        }
        Some(Self {
            count: stats.count,
            mean: stats.mean,
            std_dev: stats.std_dev,
            min: stats.min,
            max: stats.max,
        })
    }
}

#[derive(Debug, Serialize)]
struct FileSummary {
    file: String,
    frames: usize,
    velocity_m_s: Option<StatsSummary>,
    peak_distance_mm: Option<StatsSummary>,
    last_length_mm: Option<f64>,
    last_width_mm: Option<f64>,
}

fn analyze(path: &PathBuf, config: &SonarConfig, per_frame: bool) -> anyhow::Result<FileSummary> {
    let (samples, sample_rate) = load_wav(path)?;
    if sample_rate != config.chirp.sample_rate_hz {
        log::warn!(
            "{}: file sample rate {} differs from configured {}",
            path.display(),
            sample_rate,
            config.chirp.sample_rate_hz
        );
    }

    let mut processor = SonarProcessor::new(config)?;
    let frame_samples = config.chirp.frame_samples();

    let mut velocity_stats: Stats<f64> = Stats::new();
    let mut distance_stats: Stats<f64> = Stats::new();
    let mut frames = 0usize;
    let mut last_size = None;

    for frame in samples.chunks(frame_samples) {
        if frame.len() < frame_samples {
            break;
        }
        if let Some(result) = processor.process_frame(frame)? {
            velocity_stats.update(result.velocity_m_s);
            distance_stats.update(result.peak_distance_mm);
            last_size = result.object_size;
            frames += 1;

            if per_frame {
                println!(
                    "{}: frame {:>5} velocity {:>6.2} m/s distance {:>7.0} mm",
                    path.display(),
                    result.frame_index,
                    result.velocity_m_s,
                    result.peak_distance_mm
                );
            }
        }
    }

    Ok(FileSummary {
        file: path.display().to_string(),
        frames,
        velocity_m_s: StatsSummary::from_stats(&velocity_stats),
        peak_distance_mm: StatsSummary::from_stats(&distance_stats),
        last_length_mm: last_size.map(|s| s.length_mm),
        last_width_mm: last_size.map(|s| s.width_mm),
    })
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = match &args.config {
        Some(path) => SonarConfig::from_toml_file(path)?,
        None => SonarConfig::default(),
    };

    for file in &args.files {
        let summary = analyze(file, &config, args.per_frame)?;
        match args.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&summary)?),
            OutputFormat::Text => {
                println!("{}: {} frames", summary.file, summary.frames);
                if let Some(v) = &summary.velocity_m_s {
                    println!(
                        "  velocity: mean {:.2} m/s (std {:.2}, range {:.2}..{:.2})",
                        v.mean, v.std_dev, v.min, v.max
                    );
                }
                if let Some(d) = &summary.peak_distance_mm {
                    println!(
                        "  distance: mean {:.0} mm (std {:.0}, range {:.0}..{:.0})",
                        d.mean, d.std_dev, d.min, d.max
                    );
                }
                if let (Some(length), Some(width)) =
                    (summary.last_length_mm, summary.last_width_mm)
                {
                    println!("  last size: {:.0} mm x {:.0} mm", length, width);
                }
            }
        }
    }

    Ok(())
}
