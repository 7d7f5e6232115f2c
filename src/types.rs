//! Common types used throughout the application

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::address;

/// External wallet address on the ledger (`0x` + 40 hex digits)
///
/// Validated on construction; an `Address` value is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

/// Rejected address input, with the offending string for diagnostics
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid wallet address: {0:?}")]
pub struct InvalidAddress(pub String);

impl Address {
    /// Parse and validate an external address
    pub fn parse(s: &str) -> Result<Self, InvalidAddress> {
        if address::is_valid_address(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidAddress(s.to_string()))
        }
    }

    /// Build an address from raw 20-byte material (used by signers)
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Normalized space name (lowercase alphanumeric, bounded length)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceId(String);

/// Rejected space name input
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid space name: {0:?}")]
pub struct InvalidSpaceId(pub String);

impl SpaceId {
    /// Parse a space name, requiring it to already be in canonical form
    pub fn parse(s: &str) -> Result<Self, InvalidSpaceId> {
        if address::is_valid_space_id(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidSpaceId(s.to_string()))
        }
    }

    /// Normalize arbitrary user input into a space name, the way the
    /// query layer does before hitting the ledger
    pub fn normalize(s: &str) -> Result<Self, InvalidSpaceId> {
        let normalized = address::normalize_space_id(s);
        if normalized.is_empty() {
            return Err(InvalidSpaceId(s.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for SpaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only snapshot of a claimed space, fetched from the ledger
///
/// Never mutated locally. Stale the instant any write transaction commits;
/// every mutating flow re-fetches before it relies on these figures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpaceInfo {
    /// Current owner address
    pub owner: Address,

    /// Expiry timestamp (unix seconds)
    pub expiry: i64,

    /// Claim timestamp (unix seconds)
    pub created: i64,

    /// Last mutation timestamp (unix seconds)
    pub last_updated: i64,

    /// Storage-units currently held by the space
    pub units: u64,
}

/// A logical user action, created once per confirmation and never mutated
///
/// Serializes to the fee estimator's wire form with a lowercase `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Intent {
    /// Claim an unowned space
    Claim { space: SpaceId },

    /// Send tokens to another address
    Transfer { to: Address, units: u64 },

    /// Extend a space's expiry by purchasing storage-units
    Lifeline { space: SpaceId, units: u64 },

    /// Hand a space over to another owner
    Move { space: SpaceId, to: Address },

    /// Write a key/value pair into a space
    Set {
        space: SpaceId,
        key: String,
        value: String,
    },

    /// Remove a key from a space
    Delete { space: SpaceId, key: String },
}

impl Intent {
    /// Wire-level action tag, matching the serialized `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Claim { .. } => "claim",
            Intent::Transfer { .. } => "transfer",
            Intent::Lifeline { .. } => "lifeline",
            Intent::Move { .. } => "move",
            Intent::Set { .. } => "set",
            Intent::Delete { .. } => "delete",
        }
    }

    /// The space this intent touches, if any
    pub fn space(&self) -> Option<&SpaceId> {
        match self {
            Intent::Claim { space }
            | Intent::Lifeline { space, .. }
            | Intent::Move { space, .. }
            | Intent::Set { space, .. }
            | Intent::Delete { space, .. } => Some(space),
            Intent::Transfer { .. } => None,
        }
    }
}

/// Canonical signable payload produced by the remote fee estimator
///
/// The estimator is authoritative over the exact byte layout; the raw JSON
/// text is kept verbatim and never re-serialized, since the signature is
/// computed over these exact bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignablePayload {
    raw: String,
}

impl SignablePayload {
    /// Wrap the raw typed-data JSON exactly as received from the estimator
    pub fn from_raw(raw: String) -> Self {
        Self { raw }
    }

    /// The canonical bytes the signature covers
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed view of the typed data, for fee display and diagnostics
    pub fn typed_data(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.raw)
    }

    /// SHA-256 digest of the canonical bytes
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.raw.as_bytes());
        hasher.finalize().into()
    }
}

/// Opaque signature bytes returned by the external signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSignature(Vec<u8>);

impl TxSignature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex wire encoding with the ledger's `0x` prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

/// Fee-estimation response: the signable payload plus the suggested fee
#[derive(Debug, Clone)]
pub struct SuggestedFee {
    pub typed_data: SignablePayload,
    pub total_cost: u64,
}

/// Outcome of handing a signed payload to the ledger
///
/// No partial states: an unacknowledged submission counts as rejected and
/// is safe to retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub accepted: bool,
    pub tx_id: Option<String>,
}

/// Identifier for one submission attempt
///
/// Late-arriving signer or ledger results are gated on this id, never on
/// payload equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(Uuid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a submission attempt
///
/// `Done` and an abandoned `Idle` are terminal; `Failed` is recoverable
/// only through an explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptState {
    /// No work in flight (also reached again on silent signer abstention)
    Idle,
    /// Requesting the canonical payload and suggested fee
    Building,
    /// Waiting on the external signer
    AwaitingSignature,
    /// Signed payload handed to the ledger
    Submitting,
    /// Ledger acknowledged acceptance
    Done,
    /// Estimation or submission failed; user may retry
    Failed,
}

impl AttemptState {
    /// Whether the submit affordance must stay disabled in this state
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            AttemptState::Building | AttemptState::AwaitingSignature | AttemptState::Submitting
        )
    }
}
