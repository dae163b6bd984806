use std::io;

use rdkafka::error::KafkaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("Kafka Error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("Unable to reach Kafka brokers at {brokers}: {source}")]
    Connection {
        brokers: String,
        #[source]
        source: KafkaError,
    },
    #[error("{failed} message(s) could not be delivered: {reason}")]
    Delivery { failed: u64, reason: String },
    #[error("Serialization Error")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O Error")]
    IoError(#[from] io::Error),
    #[error("Rate must be a positive, finite number of messages per second, got {0}")]
    InvalidRate(f64),
    #[error("Weights must be positive and finite")]
    InvalidWeights,
    #[error("The sink has already been closed")]
    SinkClosed,
}
