use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

pub const NUM_DECIMAL_PLACES: u32 = 2;

pub const MERCHANT_CATEGORIES: [&str; 15] = [
    "Grocery",
    "Restaurant",
    "Gas Station",
    "Online Shopping",
    "Entertainment",
    "Travel",
    "Healthcare",
    "Utilities",
    "Electronics",
    "Clothing",
    "Home Improvement",
    "Insurance",
    "Subscription Services",
    "Financial Services",
    "Education",
];

#[allow(clippy::module_name_repetitions)]
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Purchase,
    Withdrawal,
    Transfer,
    Deposit,
    Refund,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        TransactionType::Purchase,
        TransactionType::Withdrawal,
        TransactionType::Transfer,
        TransactionType::Deposit,
        TransactionType::Refund,
    ];

    /// Purchases and refunds are the only transactions settled against a merchant.
    #[must_use]
    pub fn has_merchant(self) -> bool {
        matches!(self, TransactionType::Purchase | TransactionType::Refund)
    }

    #[must_use]
    pub fn has_card(self) -> bool {
        matches!(
            self,
            TransactionType::Purchase | TransactionType::Withdrawal | TransactionType::Refund
        )
    }

    #[must_use]
    pub fn is_transfer(self) -> bool {
        self == TransactionType::Transfer
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Chf,
    Jpy,
    Cad,
    Aud,
}

impl Currency {
    pub const ALL: [Currency; 7] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Chf,
        Currency::Jpy,
        Currency::Cad,
        Currency::Aud,
    ];
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Completed,
    Pending,
    Failed,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardNetwork {
    Visa,
    Mastercard,
    Amex,
    Discover,
}

impl CardNetwork {
    pub const ALL: [CardNetwork; 4] = [
        CardNetwork::Visa,
        CardNetwork::Mastercard,
        CardNetwork::Amex,
        CardNetwork::Discover,
    ];
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Debit,
    Credit,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    MobileApp,
    Web,
    PosTerminal,
    Atm,
    Branch,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::MobileApp,
        Channel::Web,
        Channel::PosTerminal,
        Channel::Atm,
        Channel::Branch,
    ];
}

/// Where the transaction took place. Drawn independently for every record.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Location {
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Merchant {
    pub merchant_id: String,
    #[serde(rename = "merchant_name")]
    pub name: String,
    #[serde(rename = "merchant_category")]
    pub category: &'static str,
    /// Four digit merchant category code
    #[serde(rename = "mcc_code")]
    pub code: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CardInfo {
    #[serde(rename = "card_last_four")]
    pub last_four: String,
    #[serde(rename = "card_network")]
    pub network: CardNetwork,
    #[serde(rename = "card_type")]
    pub card_type: CardType,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub channel: Channel,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
}

/// Fields carried only by transfers. Flattened into the record so the keys
/// are absent from every other transaction type.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TransferDetails {
    pub recipient_account_id: String,
    pub transfer_reference: String,
}

/// One synthetic financial event, serialised as a single JSON object.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub account_id: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: Currency,
    pub status: Status,
    pub location: Location,
    pub merchant: Option<Merchant>,
    pub card_info: Option<CardInfo>,
    pub metadata: Metadata,
    #[serde(flatten)]
    pub transfer: Option<TransferDetails>,
}

impl Transaction {
    /// The partitioning key: records for one account stay ordered on the broker.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.account_id
    }
}
