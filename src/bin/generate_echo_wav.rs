use std::path::PathBuf;

use clap::Parser;

use sondar::config::SonarConfig;
use sondar::simulation::{EchoSimulator, create_rng};
use sondar::wav::save_wav;

#[derive(Parser, Debug)]
#[command(name = "generate_echo_wav")]
#[command(about = "Generate synthetic echo captures for pipeline testing", long_about = None)]
struct Args {
    /// Output WAV path
    #[arg(short = 'o', long, default_value = "echo.wav")]
    output: PathBuf,

    /// TOML configuration file (defaults used when omitted)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Reflector velocity in m/s (positive = approaching)
    #[arg(short = 'V', long, default_value = "0.0")]
    velocity: f64,

    /// Number of analysis frames to generate
    #[arg(short = 'n', long, default_value = "20")]
    frames: usize,

    /// Echo amplitude relative to the emission level
    #[arg(short = 'a', long, default_value = "0.5")]
    amplitude: f64,

    /// Add white noise at this SNR in dB
    #[arg(short = 's', long)]
    snr_db: Option<f64>,

    /// RNG seed for reproducible noise
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match &args.config {
        Some(path) => SonarConfig::from_toml_file(path)?,
        None => SonarConfig::default(),
    };

    let simulator = EchoSimulator::new(&config);
    let mut rng = create_rng(args.seed);

    let mut samples = Vec::with_capacity(args.frames * simulator.frame_samples());
    for _ in 0..args.frames {
        let frame = match args.snr_db {
            Some(snr) => simulator.noisy_frame(args.velocity, args.amplitude, snr, &mut rng),
            None => simulator.frame(args.velocity, args.amplitude),
        };
        samples.extend_from_slice(&frame);
    }

    save_wav(&args.output, &samples, config.chirp.sample_rate_hz)?;
    println!(
        "Wrote {} frames ({} samples) at {} m/s to {}",
        args.frames,
        samples.len(),
        args.velocity,
        args.output.display()
    );

    Ok(())
}
