//! Domain types shared by every avs-sync component.

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A 20-byte account identifier.
///
/// Ordering is the big-endian numeric value of the bytes, which is what the
/// registry contract uses when it checks a submitted operator set.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; Address::LEN]);

impl Address {
    /// Width of an address in bytes.
    pub const LEN: usize = 20;

    /// Wrap raw address bytes.
    #[must_use]
    pub const fn new(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Build an address whose numeric value is `value`.
    #[must_use]
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; Self::LEN];
        bytes[Self::LEN - 8..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Raw big-endian bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let decoded =
            hex::decode(digits).map_err(|e| Error::invalid_address(s, e.to_string()))?;
        let bytes: [u8; Self::LEN] = decoded.try_into().map_err(|v: Vec<u8>| {
            Error::invalid_address(s, format!("expected {} bytes, got {}", Self::LEN, v.len()))
        })?;

        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifier of a stake-weighting partition, in `[0, 255]`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct QuorumId(u8);

impl QuorumId {
    /// Wrap a raw quorum number.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// The raw quorum number.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Quorums `[0, count)`, the numbering the registry uses.
    pub fn first_n(count: u8) -> impl Iterator<Item = Self> {
        (0..count).map(Self)
    }
}

impl From<u8> for QuorumId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

impl FromStr for QuorumId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u8>()
            .map(Self)
            .map_err(|e| Error::invalid_quorum(s, e.to_string()))
    }
}

impl fmt::Display for QuorumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operator membership of one quorum, ready for submission.
///
/// Always de-duplicated and sorted ascending by numeric address value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OperatorSet(Vec<Address>);

impl OperatorSet {
    /// Normalize a freshly fetched membership list.
    pub fn from_fetched(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self(addresses.into_iter().sorted_unstable().dedup().collect())
    }

    /// Number of distinct operators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the quorum has no operators.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted addresses.
    #[must_use]
    pub fn as_slice(&self) -> &[Address] {
        &self.0
    }

    /// Consume into the sorted address list.
    #[must_use]
    pub fn into_vec(self) -> Vec<Address> {
        self.0
    }
}

impl FromIterator<Address> for OperatorSet {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self::from_fetched(iter)
    }
}

impl<'de> Deserialize<'de> for OperatorSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<Address>::deserialize(deserializer).map(Self::from_fetched)
    }
}

/// Final status of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    /// Included and executed.
    Successful,
    /// Included but reverted.
    Reverted,
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Successful => write!(f, "successful"),
            Self::Reverted => write!(f, "reverted"),
        }
    }
}

/// Outcome of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash, hex encoded.
    pub tx_hash: String,
    /// Execution status.
    pub status: ReceiptStatus,
}

impl Receipt {
    /// A receipt for a transaction that executed successfully.
    #[must_use]
    pub fn successful(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            status: ReceiptStatus::Successful,
        }
    }

    /// A receipt for a transaction that reverted.
    #[must_use]
    pub fn reverted(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            status: ReceiptStatus::Reverted,
        }
    }

    /// Whether the transaction executed without reverting.
    #[must_use]
    pub const fn is_successful(&self) -> bool {
        matches!(self.status, ReceiptStatus::Successful)
    }
}

/// Result of one fetch/submit attempt for a quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptResult {
    Success,
    TransientError,
    Reverted,
}

impl AttemptResult {
    /// Label used for metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::TransientError => "transient_error",
            Self::Reverted => "reverted",
        }
    }
}

/// One attempt as reported to the metrics sink. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub quorum: QuorumId,
    /// 1-based attempt number within the cycle.
    pub attempt: u32,
    pub result: AttemptResult,
}

impl AttemptOutcome {
    #[must_use]
    pub const fn new(quorum: QuorumId, attempt: u32, result: AttemptResult) -> Self {
        Self {
            quorum,
            attempt,
            result,
        }
    }
}
