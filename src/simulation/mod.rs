mod driver;
mod echo;
mod noise;

pub use driver::SimulatedDriver;
pub use echo::EchoSimulator;
pub use noise::{apply_awgn, create_rng, signal_power};
