//! Synthetic transaction generation.
//!
//! A [`RecordGenerator`] owns its random source together with two rolling
//! pools, one of account ids and one of merchants. Most records reuse a
//! pooled entity so the stream shows repeat customers and regular merchants,
//! while a steady trickle of new ones keeps the population moving.

use chrono::Utc;
use fake::faker::address::en::{CityName, CountryCode};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::IPv4;
use fake::Fake;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::{Builder, Uuid};

use crate::distribution::{AmountDistribution, WeightedChoice, STATUS_WEIGHTS};
use crate::pool::RollingPool;
use crate::transaction::{
    CardInfo, CardNetwork, CardType, Channel, Currency, Location, Merchant, Metadata, Status,
    Transaction, TransactionType, TransferDetails, MERCHANT_CATEGORIES,
};

pub const INITIAL_ACCOUNTS: usize = 100;
pub const MAX_ACCOUNTS: usize = 200;
pub const INITIAL_MERCHANTS: usize = 50;
pub const MAX_MERCHANTS: usize = 100;

pub const ACCOUNT_REUSE_PROBABILITY: f64 = 0.8;
pub const MERCHANT_REUSE_PROBABILITY: f64 = 0.7;
pub const DEVICE_ID_PROBABILITY: f64 = 0.7;
pub const IP_ADDRESS_PROBABILITY: f64 = 0.6;

const COORDINATE_SCALE: f64 = 1_000_000.0;

#[derive(Debug)]
pub struct RecordGenerator<R = StdRng> {
    rng: R,
    accounts: RollingPool<String>,
    merchants: RollingPool<Merchant>,
    statuses: WeightedChoice<Status>,
}

impl RecordGenerator<StdRng> {
    /// A reproducible generator: the same seed yields the same records,
    /// timestamps aside.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        RecordGenerator::new(StdRng::seed_from_u64(seed))
    }

    #[must_use]
    pub fn from_entropy() -> Self {
        RecordGenerator::new(StdRng::from_entropy())
    }
}

impl<R: Rng> RecordGenerator<R> {
    #[must_use]
    pub fn new(mut rng: R) -> Self {
        let accounts = RollingPool::seeded(
            MAX_ACCOUNTS,
            (0..INITIAL_ACCOUNTS).map(|_| mint_account_id(&mut rng)),
        );
        let merchants = RollingPool::seeded(
            MAX_MERCHANTS,
            (0..INITIAL_MERCHANTS).map(|_| mint_merchant(&mut rng)),
        );
        RecordGenerator {
            rng,
            accounts,
            merchants,
            statuses: WeightedChoice::from_weights(STATUS_WEIGHTS.to_vec()),
        }
    }

    /// Produces one self-consistent transaction, updating the entity pools.
    pub fn generate(&mut self) -> Transaction {
        let transaction_type = pick(&mut self.rng, &TransactionType::ALL);
        let currency = pick(&mut self.rng, &Currency::ALL);
        let amount = AmountDistribution::for_type(transaction_type).sample(&mut self.rng);
        let account_id = self.next_account_id();
        let location = self.location();

        let merchant = if transaction_type.has_merchant() {
            Some(self.next_merchant())
        } else {
            None
        };

        let card_info = if transaction_type.has_card() {
            Some(CardInfo {
                last_four: self.rng.gen_range(1000..=9999_u16).to_string(),
                network: pick(&mut self.rng, &CardNetwork::ALL),
                card_type: pick(&mut self.rng, &[CardType::Debit, CardType::Credit]),
            })
        } else {
            None
        };

        let status = *self.statuses.sample(&mut self.rng);
        let metadata = self.metadata();

        let transfer = if transaction_type.is_transfer() {
            Some(TransferDetails {
                recipient_account_id: mint_account_id(&mut self.rng),
                transfer_reference: format!("TRF-{:010X}", self.rng.gen_range(0..1_u64 << 40)),
            })
        } else {
            None
        };

        Transaction {
            transaction_id: random_uuid(&mut self.rng),
            timestamp: Utc::now(),
            account_id,
            transaction_type,
            amount,
            currency,
            status,
            location,
            merchant,
            card_info,
            metadata,
            transfer,
        }
    }

    #[must_use]
    pub fn account_pool_len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn merchant_pool_len(&self) -> usize {
        self.merchants.len()
    }

    #[must_use]
    pub fn accounts(&self) -> &RollingPool<String> {
        &self.accounts
    }

    #[must_use]
    pub fn merchants(&self) -> &RollingPool<Merchant> {
        &self.merchants
    }

    fn next_account_id(&mut self) -> String {
        if self.rng.gen_bool(ACCOUNT_REUSE_PROBABILITY) {
            if let Some(account_id) = self.accounts.choose(&mut self.rng) {
                return account_id.clone();
            }
        }
        let account_id = mint_account_id(&mut self.rng);
        self.accounts.push(account_id.clone());
        account_id
    }

    fn next_merchant(&mut self) -> Merchant {
        if self.rng.gen_bool(MERCHANT_REUSE_PROBABILITY) {
            if let Some(merchant) = self.merchants.choose(&mut self.rng) {
                return merchant.clone();
            }
        }
        let merchant = mint_merchant(&mut self.rng);
        self.merchants.push(merchant.clone());
        merchant
    }

    fn location(&mut self) -> Location {
        Location {
            city: CityName().fake_with_rng(&mut self.rng),
            country: CountryCode().fake_with_rng(&mut self.rng),
            latitude: round_coordinate(self.rng.gen_range(-90.0..=90.0)),
            longitude: round_coordinate(self.rng.gen_range(-180.0..=180.0)),
        }
    }

    fn metadata(&mut self) -> Metadata {
        let channel = pick(&mut self.rng, &Channel::ALL);
        let device_id = if self.rng.gen_bool(DEVICE_ID_PROBABILITY) {
            Some(format!("{:016x}", self.rng.gen::<u64>()))
        } else {
            None
        };
        let ip_address = if self.rng.gen_bool(IP_ADDRESS_PROBABILITY) {
            Some(IPv4().fake_with_rng(&mut self.rng))
        } else {
            None
        };
        Metadata {
            channel,
            device_id,
            ip_address,
        }
    }
}

fn pick<T: Copy, R: Rng + ?Sized>(rng: &mut R, values: &[T]) -> T {
    values[rng.gen_range(0..values.len())]
}

fn mint_account_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let number = rng.gen_range(100_000..=999_999_u32);
    let letter = char::from(b'A' + rng.gen_range(0..26_u8));
    format!("ACC-{number}-{letter}")
}

fn mint_merchant<R: Rng + ?Sized>(rng: &mut R) -> Merchant {
    Merchant {
        merchant_id: format!("MER-{:08X}", rng.gen::<u32>()),
        name: CompanyName().fake_with_rng(rng),
        category: pick(rng, &MERCHANT_CATEGORIES),
        code: rng.gen_range(1000..=9999_u16).to_string(),
    }
}

fn random_uuid<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    Builder::from_random_bytes(rng.gen()).into_uuid()
}

fn round_coordinate(value: f64) -> f64 {
    (value * COORDINATE_SCALE).round() / COORDINATE_SCALE
}
