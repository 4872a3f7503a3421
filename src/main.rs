use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;

use sondar::audio::CpalDriver;
use sondar::config::SonarConfig;
use sondar::experiment::{ExperimentLog, JsonExperimentLog};
use sondar::processing::FrameResult;
use sondar::session::{ResultSink, SonarSession};

#[derive(Parser, Debug)]
#[command(name = "sondar")]
#[command(about = "Short-range acoustic imaging sonar", long_about = None)]
struct Args {
    /// TOML configuration file (defaults used when omitted)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Substring match on the capture device name
    #[arg(short = 'd', long)]
    device: Option<String>,

    /// Sensing duration in seconds
    #[arg(short = 't', long, default_value = "10.0")]
    duration: f64,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Record an experiment trace under this name
    #[arg(short = 'e', long)]
    experiment: Option<String>,

    /// Directory for experiment traces
    #[arg(long, default_value = "experiments")]
    experiment_dir: PathBuf,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn iso8601_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

struct TextSink {
    verbose: bool,
}

impl ResultSink for TextSink {
    fn publish(&mut self, result: &FrameResult) {
        let size = match result.object_size {
            Some(size) => format!("{:.0}x{:.0} mm", size.length_mm, size.width_mm),
            None => "-".to_string(),
        };
        if self.verbose {
            println!(
                "Frame {:>5}: velocity {:>6.2} m/s  distance {:>7.0} mm  size {}  [corr {:.2e}]",
                result.frame_index,
                result.velocity_m_s,
                result.peak_distance_mm,
                size,
                result.correlation
            );
        } else {
            println!(
                "Frame {:>5}: velocity {:>6.2} m/s  distance {:>7.0} mm  size {}",
                result.frame_index, result.velocity_m_s, result.peak_distance_mm, size
            );
        }
    }
}

struct JsonSink;

impl ResultSink for JsonSink {
    fn publish(&mut self, result: &FrameResult) {
        let line = serde_json::json!({
            "ts": iso8601_timestamp(),
            "frame": result.frame_index,
            "velocity_m_s": result.velocity_m_s,
            "correlation": result.correlation,
            "peak_distance_mm": result.peak_distance_mm,
            "length_mm": result.object_size.map(|s| s.length_mm),
            "width_mm": result.object_size.map(|s| s.width_mm),
            "shape": result.shape.map(|s| s.to_string()),
        });
        println!("{}", line);
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Configure logging based on verbosity
    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = match &args.config {
        Some(path) => SonarConfig::from_toml_file(path)?,
        None => SonarConfig::default(),
    };
    config.validate()?;

    let use_stderr_banner = matches!(args.format, OutputFormat::Json);

    macro_rules! banner {
        ($($arg:tt)*) => {
            if use_stderr_banner {
                eprintln!($($arg)*);
            } else {
                println!($($arg)*);
            }
        };
    }

    banner!("=== SONDAR - Acoustic Imaging Sonar ===");
    banner!("Sample rate: {} Hz", config.chirp.sample_rate_hz);
    banner!(
        "Chirp band: {}-{} Hz, {} ms",
        config.chirp.f_lo_hz,
        config.chirp.f_hi_hz,
        config.chirp.chirp_ms
    );
    banner!("Emission period: {} ms", config.chirp.emit_period_ms);
    banner!("Device latency: {} ms", config.chirp.device_latency_ms);
    banner!("");

    let driver = Arc::new(CpalDriver::new(&config.chirp, args.device.as_deref()));
    let mut session = SonarSession::new(config.clone(), driver)?;

    let logger: Option<Box<dyn ExperimentLog>> = args.experiment.as_ref().map(|name| {
        let mut log = JsonExperimentLog::new(&config.chirp);
        log.start_experiment(name, &args.experiment_dir);
        Box::new(log) as Box<dyn ExperimentLog>
    });

    let sink: Box<dyn ResultSink> = match args.format {
        OutputFormat::Text => Box::new(TextSink {
            verbose: args.verbose >= 1,
        }),
        OutputFormat::Json => Box::new(JsonSink),
    };

    banner!("Starting capture...");
    session.start(vec![sink], logger, None)?;

    std::thread::sleep(Duration::from_secs_f64(args.duration.max(0.0)));
    session.stop();

    banner!("");
    banner!(
        "Session complete: {} frames processed, {} capture buffers dropped",
        session.frames_processed(),
        session.frames_dropped()
    );
    if let Some(result) = session.last_result()
        && let Some(size) = result.object_size
    {
        banner!(
            "Last object estimate: {:.0} mm x {:.0} mm at {:.0} mm",
            size.length_mm,
            size.width_mm,
            result.peak_distance_mm
        );
    }

    session.release();
    Ok(())
}
