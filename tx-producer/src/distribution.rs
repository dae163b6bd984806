use rand::Rng;
use rust_decimal::Decimal;

use crate::error::ProducerError;
use crate::transaction::{Status, TransactionType, NUM_DECIMAL_PLACES};

pub const STATUS_WEIGHTS: [(Status, f64); 3] = [
    (Status::Completed, 0.85),
    (Status::Pending, 0.10),
    (Status::Failed, 0.05),
];

/// Cash machine denominations, in whole currency units.
pub const WITHDRAWAL_DENOMINATIONS: [i64; 9] = [20, 40, 50, 60, 80, 100, 200, 300, 500];

/// Weighted random selection over a fixed table.
///
/// Keeps a running total of the weights and binary-searches it with a
/// uniform draw, so sampling is `O(log n)` and deterministic for a seeded rng.
#[derive(Debug, Clone)]
pub struct WeightedChoice<T> {
    items: Vec<T>,
    cumulative: Vec<f64>,
}

impl<T> WeightedChoice<T> {
    /// # Errors
    /// Errors when `entries` is empty or any weight is not a positive, finite number
    pub fn new(entries: impl IntoIterator<Item = (T, f64)>) -> Result<Self, ProducerError> {
        let entries: Vec<(T, f64)> = entries.into_iter().collect();
        if entries.is_empty() || entries.iter().any(|(_, w)| !w.is_finite() || *w <= 0.0) {
            return Err(ProducerError::InvalidWeights);
        }
        Ok(Self::from_weights(entries))
    }

    /// Callers guarantee a non-empty table of positive weights.
    pub(crate) fn from_weights(entries: Vec<(T, f64)>) -> Self {
        let mut total = 0.0;
        let mut items = Vec::with_capacity(entries.len());
        let mut cumulative = Vec::with_capacity(entries.len());
        for (item, weight) in entries {
            total += weight;
            items.push(item);
            cumulative.push(total);
        }
        WeightedChoice { items, cumulative }
    }

    fn total(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or_default()
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        let point = rng.gen_range(0.0..self.total());
        let index = self.cumulative.partition_point(|&bound| bound <= point);
        // float accumulation can leave `point` a hair above the last bound
        &self.items[index.min(self.items.len() - 1)]
    }
}

/// How the amount of a transaction is drawn, by transaction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountDistribution {
    /// Every cent value in `min_cents..=max_cents` is equally likely.
    Uniform { min_cents: i64, max_cents: i64 },
    /// One of a fixed set of whole-unit amounts.
    Denominations(&'static [i64]),
}

impl AmountDistribution {
    #[must_use]
    pub fn for_type(transaction_type: TransactionType) -> Self {
        match transaction_type {
            TransactionType::Purchase => AmountDistribution::Uniform {
                min_cents: 100,
                max_cents: 50_000,
            },
            TransactionType::Withdrawal => {
                AmountDistribution::Denominations(&WITHDRAWAL_DENOMINATIONS)
            }
            TransactionType::Transfer => AmountDistribution::Uniform {
                min_cents: 1_000,
                max_cents: 500_000,
            },
            TransactionType::Deposit => AmountDistribution::Uniform {
                min_cents: 10_000,
                max_cents: 1_000_000,
            },
            TransactionType::Refund => AmountDistribution::Uniform {
                min_cents: 500,
                max_cents: 20_000,
            },
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Decimal {
        let cents = match *self {
            AmountDistribution::Uniform {
                min_cents,
                max_cents,
            } => rng.gen_range(min_cents..=max_cents),
            AmountDistribution::Denominations(values) => {
                values[rng.gen_range(0..values.len())] * 100
            }
        };
        Decimal::new(cents, NUM_DECIMAL_PLACES)
    }

    /// Inclusive lower and upper bound of every amount this distribution yields.
    #[must_use]
    pub fn bounds(&self) -> (Decimal, Decimal) {
        let (low, high) = match *self {
            AmountDistribution::Uniform {
                min_cents,
                max_cents,
            } => (min_cents, max_cents),
            AmountDistribution::Denominations(values) => (
                values.iter().min().copied().unwrap_or_default() * 100,
                values.iter().max().copied().unwrap_or_default() * 100,
            ),
        };
        (
            Decimal::new(low, NUM_DECIMAL_PLACES),
            Decimal::new(high, NUM_DECIMAL_PLACES),
        )
    }
}
