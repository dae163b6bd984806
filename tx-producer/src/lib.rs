#![deny(rust_2018_idioms)]
#![deny(clippy::correctness)]
#![deny(clippy::perf)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod distribution;
pub mod driver;
pub mod error;
pub mod generator;
pub mod kafka;
pub mod pool;
pub mod sink;
pub mod transaction;
