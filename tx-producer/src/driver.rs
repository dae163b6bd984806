use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::ProducerError;
use crate::generator::RecordGenerator;
use crate::sink::Sink;

pub const RATE_PROGRESS_INTERVAL: u64 = 10;
pub const BURST_PROGRESS_INTERVAL: u64 = 100;

/// Longest uninterrupted sleep in rate mode, so a shutdown is noticed quickly.
const MAX_SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Cooperative stop signal for a running [`StreamDriver`].
///
/// Cloning is cheap; any clone may be moved to another thread (a signal
/// watcher, a test) and flipped there.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        ShutdownHandle::new()
    }
}

impl ShutdownHandle {
    #[must_use]
    pub fn new() -> Self {
        ShutdownHandle {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub messages_sent: u64,
    pub elapsed: Duration,
    /// The run stopped because of a shutdown request rather than finishing its work
    pub interrupted: bool,
}

impl RunSummary {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn messages_per_second(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.messages_sent as f64 / seconds
        } else {
            0.0
        }
    }
}

/// Feeds generated transactions into a [`Sink`], either at a steady rate or
/// as one burst.
///
/// Whatever way a run ends (completion, shutdown, or a publish error) the
/// sink is flushed once and then closed once. A driver whose run never got
/// that far performs the same sequence when dropped.
pub struct StreamDriver<S: Sink, R: Rng = StdRng> {
    generator: RecordGenerator<R>,
    sink: S,
    shutdown: ShutdownHandle,
    message_count: u64,
    closed: bool,
}

impl<S: Sink, R: Rng> StreamDriver<S, R> {
    #[must_use]
    pub fn new(generator: RecordGenerator<R>, sink: S) -> Self {
        StreamDriver::with_shutdown(generator, sink, ShutdownHandle::new())
    }

    /// Builds a driver that stops when `shutdown` is flipped. A handle that
    /// was already shut down makes every run end before publishing anything.
    #[must_use]
    pub fn with_shutdown(
        generator: RecordGenerator<R>,
        sink: S,
        shutdown: ShutdownHandle,
    ) -> Self {
        StreamDriver {
            generator,
            sink,
            shutdown,
            message_count: 0,
            closed: false,
        }
    }

    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    #[must_use]
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Publishes continuously at `rate` messages per second until
    /// `max_messages` have been sent, a shutdown is requested, or the sink fails.
    ///
    /// # Errors
    /// Errors when `rate` is not a positive finite number or is so small that
    /// the interval between messages overflows a [`Duration`], when the driver has
    /// already finished a run, or when the sink fails to publish or flush
    pub fn run_rate(
        &mut self,
        rate: f64,
        max_messages: Option<u64>,
    ) -> Result<RunSummary, ProducerError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ProducerError::InvalidRate(rate));
        }
        // rates this small give an interval too long for a Duration
        let interval = Duration::try_from_secs_f64(1.0 / rate)
            .map_err(|_| ProducerError::InvalidRate(rate))?;
        self.ensure_open()?;
        info!("Starting to produce transactions at {rate} TPS");

        let start = Instant::now();
        let outcome = self.rate_loop(interval, max_messages);
        self.complete(outcome, start)
    }

    /// Publishes `count` transactions back to back, then flushes and closes the sink.
    ///
    /// # Errors
    /// Errors when the driver has already finished a run, or when the sink
    /// fails to publish or flush
    pub fn run_burst(&mut self, count: u64) -> Result<RunSummary, ProducerError> {
        self.ensure_open()?;
        info!("Sending burst of {count} transactions...");

        let start = Instant::now();
        let outcome = self.burst_loop(count);
        let summary = self.complete(outcome, start)?;
        if !summary.interrupted {
            info!("Burst complete! Sent {count} transactions.");
        }
        Ok(summary)
    }

    /// Flushes then closes the sink, once. Later calls are no-ops.
    ///
    /// # Errors
    /// Errors when the flush fails. The sink is closed regardless.
    pub fn finish(&mut self) -> Result<(), ProducerError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        info!("Flushing remaining messages...");
        let flushed = self.sink.flush();
        let closed = self.sink.close();
        info!("Producer stopped. Total messages sent: {}", self.message_count);
        flushed.and(closed)
    }

    fn ensure_open(&self) -> Result<(), ProducerError> {
        if self.closed {
            Err(ProducerError::SinkClosed)
        } else {
            Ok(())
        }
    }

    /// Returns whether the loop was interrupted.
    fn rate_loop(
        &mut self,
        interval: Duration,
        max_messages: Option<u64>,
    ) -> Result<bool, ProducerError> {
        loop {
            if !self.shutdown.is_running() {
                return Ok(true);
            }
            if max_messages.is_some_and(|max| self.message_count >= max) {
                info!("Reached maximum message count: {}", self.message_count);
                return Ok(false);
            }
            self.send_next()?;
            if self.message_count % RATE_PROGRESS_INTERVAL == 0 {
                info!("Produced {} transactions...", self.message_count);
            }
            self.sleep(interval);
        }
    }

    fn burst_loop(&mut self, count: u64) -> Result<bool, ProducerError> {
        for sent in 1..=count {
            if !self.shutdown.is_running() {
                return Ok(true);
            }
            self.send_next()?;
            if sent % BURST_PROGRESS_INTERVAL == 0 {
                info!("Sent {sent}/{count} transactions...");
            }
        }
        Ok(false)
    }

    fn send_next(&mut self) -> Result<(), ProducerError> {
        let transaction = self.generator.generate();
        self.sink.publish(transaction.key(), &transaction)?;
        self.message_count += 1;
        Ok(())
    }

    /// Sleeps for `interval`, waking early if a shutdown is requested.
    fn sleep(&self, interval: Duration) {
        // no deadline when the interval runs past what an Instant can hold
        let deadline = Instant::now().checked_add(interval);
        while self.shutdown.is_running() {
            let remaining = deadline.map_or(MAX_SLEEP_SLICE, |deadline| {
                deadline.saturating_duration_since(Instant::now())
            });
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(MAX_SLEEP_SLICE));
        }
    }

    fn complete(
        &mut self,
        outcome: Result<bool, ProducerError>,
        start: Instant,
    ) -> Result<RunSummary, ProducerError> {
        match outcome {
            Ok(interrupted) => {
                if interrupted {
                    info!("Shutting down gracefully...");
                }
                self.finish()?;
                Ok(RunSummary {
                    messages_sent: self.message_count,
                    elapsed: start.elapsed(),
                    interrupted,
                })
            }
            Err(e) => {
                error!("Publishing failed after {} messages: {e}", self.message_count);
                if let Err(cleanup) = self.finish() {
                    warn!("Cleanup after failure also failed: {cleanup}");
                }
                Err(e)
            }
        }
    }
}

impl<S: Sink, R: Rng> Drop for StreamDriver<S, R> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("Failed to flush and close the sink: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::transaction::Transaction;

    #[derive(Debug, Default)]
    struct Calls {
        published: Vec<String>,
        flushes: u32,
        closes: u32,
    }

    struct RecordingSink(Rc<RefCell<Calls>>);

    impl Sink for RecordingSink {
        fn publish(&mut self, key: &str, _: &Transaction) -> Result<(), ProducerError> {
            self.0.borrow_mut().published.push(key.to_string());
            Ok(())
        }

        fn flush(&mut self) -> Result<(), ProducerError> {
            self.0.borrow_mut().flushes += 1;
            Ok(())
        }

        fn close(&mut self) -> Result<(), ProducerError> {
            self.0.borrow_mut().closes += 1;
            Ok(())
        }
    }

    fn make_driver() -> (StreamDriver<RecordingSink>, Rc<RefCell<Calls>>) {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let driver = StreamDriver::new(
            RecordGenerator::from_seed(21),
            RecordingSink(Rc::clone(&calls)),
        );
        (driver, calls)
    }

    #[test]
    fn test_invalid_rates() {
        let (mut driver, calls) = make_driver();
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e-20, f64::MIN_POSITIVE] {
            assert!(matches!(
                driver.run_rate(rate, Some(1)),
                Err(ProducerError::InvalidRate(_))
            ));
        }
        assert!(calls.borrow().published.is_empty());
        assert!(!driver.is_closed());
    }

    #[test]
    fn test_slowest_valid_rate_waits_for_shutdown() {
        let (mut driver, calls) = make_driver();
        let handle = driver.shutdown_handle();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(250));
            handle.shutdown();
        });

        let summary = driver.run_rate(1e-19, None).unwrap();
        stopper.join().unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.messages_sent, 1);
        assert_eq!(calls.borrow().published.len(), 1);
        assert_eq!(calls.borrow().closes, 1);
    }

    #[test]
    fn test_finish_is_idempotent() {
        let (mut driver, calls) = make_driver();
        driver.finish().unwrap();
        driver.finish().unwrap();
        drop(driver);
        assert_eq!(calls.borrow().flushes, 1);
        assert_eq!(calls.borrow().closes, 1);
    }

    #[test]
    fn test_drop_finishes_unfinished_driver() {
        let (driver, calls) = make_driver();
        drop(driver);
        assert_eq!(calls.borrow().flushes, 1);
        assert_eq!(calls.borrow().closes, 1);
    }

    #[test]
    fn test_zero_max_messages() {
        let (mut driver, calls) = make_driver();
        let summary = driver.run_rate(1000.0, Some(0)).unwrap();
        assert_eq!(summary.messages_sent, 0);
        assert!(!summary.interrupted);
        assert!(calls.borrow().published.is_empty());
        assert_eq!(calls.borrow().flushes, 1);
    }

    #[test]
    fn test_shutdown_before_burst() {
        let (mut driver, calls) = make_driver();
        driver.shutdown_handle().shutdown();
        let summary = driver.run_burst(50).unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.messages_sent, 0);
        assert_eq!(calls.borrow().flushes, 1);
        assert_eq!(calls.borrow().closes, 1);
    }

    #[test]
    fn test_shared_handle_stopped_before_run() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let handle = ShutdownHandle::default();
        handle.shutdown();
        let mut driver = StreamDriver::with_shutdown(
            RecordGenerator::from_seed(22),
            RecordingSink(Rc::clone(&calls)),
            handle.clone(),
        );
        assert!(!driver.shutdown_handle().is_running());

        let summary = driver.run_rate(5.0, None).unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.messages_sent, 0);
        assert!(calls.borrow().published.is_empty());
        assert_eq!(calls.borrow().flushes, 1);
        assert_eq!(calls.borrow().closes, 1);
    }

    #[test]
    fn test_messages_per_second() {
        let summary = RunSummary {
            messages_sent: 50,
            elapsed: Duration::from_secs(2),
            interrupted: false,
        };
        assert!((summary.messages_per_second() - 25.0).abs() < f64::EPSILON);

        let instant = RunSummary {
            elapsed: Duration::ZERO,
            ..summary
        };
        assert!(instant.messages_per_second().abs() < f64::EPSILON);
    }
}
