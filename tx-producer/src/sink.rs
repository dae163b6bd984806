use std::io::{BufWriter, Write};

use log::debug;

use crate::error::ProducerError;
use crate::transaction::Transaction;

/// Destination for generated transactions.
///
/// Implementations may buffer: a record handed to [`publish`](Sink::publish)
/// is only guaranteed to have left the process once [`flush`](Sink::flush)
/// returns. [`close`](Sink::close) releases the underlying resources and is
/// expected to be called once, after the final flush.
pub trait Sink {
    /// Hands one record to the destination. On `Ok` the record was accepted;
    /// on `Err` it was not.
    ///
    /// # Errors
    /// Errors when the record cannot be encoded or handed to the destination,
    /// or when earlier deliveries are known to have failed. In the latter case
    /// the record is refused so the caller's count of accepted records stays exact.
    fn publish(&mut self, key: &str, transaction: &Transaction) -> Result<(), ProducerError>;

    /// # Errors
    /// Errors when buffered records could not be delivered
    fn flush(&mut self) -> Result<(), ProducerError>;

    /// # Errors
    /// Errors when releasing the destination fails
    fn close(&mut self) -> Result<(), ProducerError>;
}

/// Writes one JSON object per line to any [`Write`] destination.
///
/// The key is not written; it is implied by the record's `account_id`.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: Option<BufWriter<W>>,
    written: u64,
}

impl<W: Write> JsonLinesSink<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        JsonLinesSink {
            writer: Some(BufWriter::new(writer)),
            written: 0,
        }
    }

    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    fn writer(&mut self) -> Result<&mut BufWriter<W>, ProducerError> {
        self.writer.as_mut().ok_or(ProducerError::SinkClosed)
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn publish(&mut self, key: &str, transaction: &Transaction) -> Result<(), ProducerError> {
        let writer = self.writer()?;
        serde_json::to_writer(&mut *writer, transaction)?;
        writer.write_all(b"\n")?;
        self.written += 1;
        debug!("Wrote transaction {} for {}", transaction.transaction_id, key);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ProducerError> {
        self.writer()?.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ProducerError> {
        match self.writer.take() {
            Some(writer) => {
                writer.into_inner().map_err(|e| e.into_error())?;
                Ok(())
            }
            None => Err(ProducerError::SinkClosed),
        }
    }
}
