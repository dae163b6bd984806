//! Measures how fast transactions can be generated and encoded, without a broker.
//! can be run with `RUST_LOG=warn cargo run --release --example throughput`

use std::error::Error;
use std::io;
use std::time::Instant;

use log::warn;
use rand::thread_rng;

use tx_producer::driver::StreamDriver;
use tx_producer::generator::RecordGenerator;
use tx_producer::sink::JsonLinesSink;

const COUNT: u64 = 100_000;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut generator = RecordGenerator::new(thread_rng());
    let start = Instant::now();
    for _ in 0..COUNT {
        generator.generate();
    }
    warn!("Generating {COUNT} transactions took: {:.2?}", start.elapsed());

    let mut driver = StreamDriver::new(
        RecordGenerator::new(thread_rng()),
        JsonLinesSink::new(io::sink()),
    );
    let summary = driver.run_burst(COUNT)?;
    warn!(
        "Generating and encoding took: {:.2?} ({:.0} TPS)",
        summary.elapsed,
        summary.messages_per_second()
    );

    Ok(())
}
