//! Kafka-backed [`Sink`].
//!
//! Records are enqueued on an rdkafka [`BaseProducer`] and delivered by the
//! client in the background. The producer asks for acknowledgement from all
//! in-sync replicas and lets the client retry transient failures; deliveries
//! that still fail are counted by [`DeliveryTracker`] and surface on the next
//! `publish` or `flush`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info};
use rdkafka::client::ClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{BaseProducer, BaseRecord, DeliveryResult, Producer, ProducerContext};

use crate::error::ProducerError;
use crate::sink::Sink;
use crate::transaction::Transaction;

pub const DEFAULT_BROKERS: &str = "localhost:9092";
pub const DEFAULT_TOPIC: &str = "financial_transactions";

const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct KafkaSinkConfig {
    pub brokers: String,
    pub topic: String,
    /// How long the client may spend delivering one message, retries included
    pub message_timeout: Duration,
    /// Upper bound on a single `flush`
    pub flush_timeout: Duration,
    /// Used for the reachability check made while connecting
    pub metadata_timeout: Duration,
}

impl Default for KafkaSinkConfig {
    fn default() -> Self {
        KafkaSinkConfig {
            brokers: DEFAULT_BROKERS.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            message_timeout: Duration::from_secs(30),
            flush_timeout: Duration::from_secs(30),
            metadata_timeout: Duration::from_secs(10),
        }
    }
}

impl KafkaSinkConfig {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("acks", "all")
            .set("retries", "3")
            .set("message.timeout.ms", self.message_timeout.as_millis().to_string())
            .set("queue.buffering.max.messages", "100000")
            .set("linger.ms", "5");
        config
    }
}

/// Counts deliveries the client gave up on.
#[derive(Debug, Default)]
pub struct DeliveryTracker {
    failed: AtomicU64,
    last_error: Mutex<Option<KafkaError>>,
}

impl DeliveryTracker {
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    fn record_failure(&self, error: &KafkaError) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last_error) = self.last_error.lock() {
            *last_error = Some(error.clone());
        }
    }

    /// Turns any failures recorded so far into an error, resetting the count.
    fn take_failures(&self) -> Result<(), ProducerError> {
        let failed = self.failed.swap(0, Ordering::SeqCst);
        if failed == 0 {
            return Ok(());
        }
        let reason = self
            .last_error
            .lock()
            .ok()
            .and_then(|mut last_error| last_error.take())
            .map_or_else(|| "unknown delivery failure".to_string(), |e| e.to_string());
        Err(ProducerError::Delivery { failed, reason })
    }
}

pub struct DeliveryContext {
    tracker: Arc<DeliveryTracker>,
}

impl ClientContext for DeliveryContext {}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = ();

    fn delivery(
        &self,
        delivery_result: &DeliveryResult<'_>,
        _delivery_opaque: Self::DeliveryOpaque,
    ) {
        if let Err((error, _)) = delivery_result {
            self.tracker.record_failure(error);
        }
    }
}

pub struct KafkaSink {
    producer: Option<BaseProducer<DeliveryContext>>,
    topic: String,
    flush_timeout: Duration,
    tracker: Arc<DeliveryTracker>,
}

impl KafkaSink {
    /// Creates the producer and checks that the brokers answer a metadata request.
    ///
    /// # Errors
    /// Errors with [`ProducerError::Connection`] when the brokers cannot be reached
    pub fn connect(config: &KafkaSinkConfig) -> Result<Self, ProducerError> {
        info!("Connecting to Kafka at {}...", config.brokers);
        let sink = KafkaSink::create(config)?;
        sink.producer()?
            .client()
            .fetch_metadata(Some(config.topic.as_str()), config.metadata_timeout)
            .map_err(|source| ProducerError::Connection {
                brokers: config.brokers.clone(),
                source,
            })?;
        info!("Connected to Kafka successfully");
        Ok(sink)
    }

    /// Builds the producer without contacting the brokers.
    fn create(config: &KafkaSinkConfig) -> Result<Self, ProducerError> {
        let tracker = Arc::new(DeliveryTracker::default());
        let context = DeliveryContext {
            tracker: Arc::clone(&tracker),
        };
        let producer: BaseProducer<DeliveryContext> = config
            .client_config()
            .create_with_context(context)
            .map_err(|source| ProducerError::Connection {
                brokers: config.brokers.clone(),
                source,
            })?;
        Ok(KafkaSink {
            producer: Some(producer),
            topic: config.topic.clone(),
            flush_timeout: config.flush_timeout,
            tracker,
        })
    }

    fn producer(&self) -> Result<&BaseProducer<DeliveryContext>, ProducerError> {
        self.producer.as_ref().ok_or(ProducerError::SinkClosed)
    }
}

impl Sink for KafkaSink {
    fn publish(&mut self, key: &str, transaction: &Transaction) -> Result<(), ProducerError> {
        let producer = self.producer()?;
        // earlier records' failures are reported before this one is accepted
        self.tracker.take_failures()?;
        let payload = serde_json::to_vec(transaction)?;
        let mut record = BaseRecord::to(&self.topic).key(key).payload(&payload);
        loop {
            match producer.send(record) {
                Ok(()) => break,
                Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), rejected)) => {
                    debug!("Local producer queue is full, waiting for deliveries");
                    record = rejected;
                    producer.poll(QUEUE_FULL_BACKOFF);
                }
                Err((error, _)) => return Err(error.into()),
            }
        }
        // serve delivery callbacks without blocking
        producer.poll(Duration::ZERO);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ProducerError> {
        self.producer()?.flush(self.flush_timeout)?;
        self.tracker.take_failures()
    }

    fn close(&mut self) -> Result<(), ProducerError> {
        match self.producer.take() {
            Some(producer) => {
                drop(producer);
                info!("Kafka producer for '{}' closed", self.topic);
                Ok(())
            }
            None => Err(ProducerError::SinkClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::RecordGenerator;

    #[test]
    fn test_client_config() {
        let config = KafkaSinkConfig {
            brokers: "kafka-1:9092,kafka-2:9092".to_string(),
            message_timeout: Duration::from_secs(12),
            ..KafkaSinkConfig::default()
        };
        let client_config = config.client_config();
        assert_eq!(
            client_config.get("bootstrap.servers"),
            Some("kafka-1:9092,kafka-2:9092")
        );
        assert_eq!(client_config.get("acks"), Some("all"));
        assert_eq!(client_config.get("retries"), Some("3"));
        assert_eq!(client_config.get("message.timeout.ms"), Some("12000"));
        assert_eq!(config.topic, DEFAULT_TOPIC);
    }

    #[test]
    fn test_delivery_tracker() {
        let tracker = DeliveryTracker::default();
        assert!(tracker.take_failures().is_ok());

        tracker.record_failure(&KafkaError::MessageProduction(
            RDKafkaErrorCode::MessageTimedOut,
        ));
        tracker.record_failure(&KafkaError::MessageProduction(
            RDKafkaErrorCode::MessageTimedOut,
        ));
        assert_eq!(tracker.failed(), 2);

        match tracker.take_failures() {
            Err(ProducerError::Delivery { failed, reason }) => {
                assert_eq!(failed, 2);
                assert!(!reason.is_empty());
            }
            other => panic!("expected a delivery error, got {other:?}"),
        }
        assert_eq!(tracker.failed(), 0);
        assert!(tracker.take_failures().is_ok());
    }

    fn offline_config() -> KafkaSinkConfig {
        KafkaSinkConfig {
            brokers: "127.0.0.1:1".to_string(),
            message_timeout: Duration::from_secs(1),
            flush_timeout: Duration::from_millis(100),
            metadata_timeout: Duration::from_millis(500),
            ..KafkaSinkConfig::default()
        }
    }

    #[test]
    fn test_earlier_failure_rejects_next_record() {
        let mut sink = KafkaSink::create(&offline_config()).unwrap();
        let tx = RecordGenerator::from_seed(5).generate();
        sink.tracker.record_failure(&KafkaError::MessageProduction(
            RDKafkaErrorCode::MessageTimedOut,
        ));

        assert!(matches!(
            sink.publish(tx.key(), &tx),
            Err(ProducerError::Delivery { failed: 1, .. })
        ));
        assert_eq!(sink.producer().unwrap().in_flight_count(), 0);

        sink.publish(tx.key(), &tx).unwrap();
        assert_eq!(sink.producer().unwrap().in_flight_count(), 1);
        sink.close().unwrap();
    }

    #[test]
    fn test_connect_unreachable_broker() {
        assert!(matches!(
            KafkaSink::connect(&offline_config()),
            Err(ProducerError::Connection { .. })
        ));
    }
}
