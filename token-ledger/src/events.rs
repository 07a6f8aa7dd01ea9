//! Notification log
//!
//! Every accepted mutation appends exactly one [`LedgerEvent`]. Events are
//! numbered from 1, timestamped, and hash-chained (SHA-256 over the previous
//! hash and the event's canonical fields) so an observer can audit that the
//! log was neither reordered nor edited.

use crate::types::{Address, Amount};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Operation that produced a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Operation {
    /// Direct transfer by the balance owner
    Transfer = 1,
    /// Allowance grant
    Approve = 2,
    /// Delegated transfer by a spender
    TransferFrom = 3,
}

impl Operation {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Transfer => "transfer",
            Operation::Approve => "approve",
            Operation::TransferFrom => "transfer_from",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum EventKind {
    /// Units moved between balances
    Transfer {
        /// Debited account
        from: Address,
        /// Credited account
        to: Address,
        /// Moved amount
        value: Amount,
    },

    /// Allowance set
    Approval {
        /// Balance owner
        owner: Address,
        /// Authorized spender
        spender: Address,
        /// New allowance
        value: Amount,
    },
}

impl EventKind {
    /// Event name as observers see it
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Transfer { .. } => "Transfer",
            EventKind::Approval { .. } => "Approval",
        }
    }

    fn write_canonical(&self, hasher: &mut Sha256) {
        match self {
            EventKind::Transfer { from, to, value } => {
                hasher.update([0x01]);
                hasher.update(from.as_bytes());
                hasher.update(to.as_bytes());
                hasher.update(value.base_units().to_be_bytes());
            }
            EventKind::Approval {
                owner,
                spender,
                value,
            } => {
                hasher.update([0x02]);
                hasher.update(owner.as_bytes());
                hasher.update(spender.as_bytes());
                hasher.update(value.base_units().to_be_bytes());
            }
        }
    }
}

/// Committed notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the log, starting at 1
    pub sequence: u64,

    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Operation that produced this event
    pub operation: Operation,

    /// Payload
    #[serde(flatten)]
    pub kind: EventKind,

    /// Commit timestamp (nanoseconds since Unix epoch)
    pub timestamp_nanos: i64,

    /// Hash of the preceding event (zeroes for the first)
    #[serde(with = "hex_hash")]
    pub previous_hash: [u8; 32],

    /// Hash of this event
    #[serde(with = "hex_hash")]
    pub hash: [u8; 32],
}

impl LedgerEvent {
    /// Recompute this event's chained hash
    pub fn compute_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.previous_hash);
        hasher.update(self.sequence.to_be_bytes());
        hasher.update(self.event_id.as_bytes());
        hasher.update([self.operation as u8]);
        self.kind.write_canonical(&mut hasher);
        hasher.update(self.timestamp_nanos.to_be_bytes());
        hasher.finalize().into()
    }
}

/// Append-only, hash-chained notification log
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    /// Create empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a notification and return the committed record
    pub fn append(&mut self, operation: Operation, kind: EventKind) -> &LedgerEvent {
        let previous_hash = self.events.last().map(|e| e.hash).unwrap_or([0u8; 32]);
        let mut event = LedgerEvent {
            sequence: self.events.len() as u64 + 1,
            event_id: Uuid::now_v7(),
            operation,
            kind,
            timestamp_nanos: chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
            previous_hash,
            hash: [0u8; 32],
        };
        event.hash = event.compute_hash();

        let index = self.events.len();
        self.events.push(event);
        &self.events[index]
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no event was emitted yet
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Most recent event
    pub fn last(&self) -> Option<&LedgerEvent> {
        self.events.last()
    }

    /// All events in commit order
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Events with `sequence > after`
    pub fn since(&self, after: u64) -> &[LedgerEvent] {
        let start = usize::try_from(after)
            .unwrap_or(usize::MAX)
            .min(self.events.len());
        &self.events[start..]
    }

    /// Verify sequence numbering and the hash chain
    pub fn verify_chain(&self) -> Result<()> {
        let mut previous_hash = [0u8; 32];

        for (index, event) in self.events.iter().enumerate() {
            let expected_sequence = index as u64 + 1;
            if event.sequence != expected_sequence {
                return Err(Error::InvariantViolation(format!(
                    "event sequence {} found at position {}",
                    event.sequence, expected_sequence
                )));
            }
            if event.previous_hash != previous_hash {
                return Err(Error::InvariantViolation(format!(
                    "event {} does not link to its predecessor",
                    event.sequence
                )));
            }
            if event.compute_hash() != event.hash {
                return Err(Error::InvariantViolation(format!(
                    "event {} hash mismatch",
                    event.sequence
                )));
            }
            previous_hash = event.hash;
        }

        Ok(())
    }
}

mod hex_hash {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(&s, &mut out).map_err(serde::de::Error::custom)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(value: u128) -> EventKind {
        EventKind::Transfer {
            from: Address::from_low_u64(1),
            to: Address::from_low_u64(2),
            value: Amount::new(value),
        }
    }

    #[test]
    fn test_append_numbers_and_chains() {
        let mut log = EventLog::new();
        let first_hash = log.append(Operation::Transfer, transfer(10)).hash;
        let second = log.append(Operation::Transfer, transfer(20)).clone();

        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0].sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.previous_hash, first_hash);
        assert!(log.verify_chain().is_ok());
    }

    #[test]
    fn test_since_skips_seen_events() {
        let mut log = EventLog::new();
        for value in 1..=5 {
            log.append(Operation::Transfer, transfer(value));
        }

        assert_eq!(log.since(0).len(), 5);
        assert_eq!(log.since(3).len(), 2);
        assert_eq!(log.since(3)[0].sequence, 4);
        assert!(log.since(99).is_empty());
    }

    #[test]
    fn test_tampering_breaks_chain() {
        let mut log = EventLog::new();
        log.append(Operation::Transfer, transfer(10));
        log.append(Operation::Transfer, transfer(20));

        log.events[0].kind = transfer(11);
        assert!(matches!(
            log.verify_chain(),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_event_json_shape() {
        let mut log = EventLog::new();
        let event = log
            .append(
                Operation::Approve,
                EventKind::Approval {
                    owner: Address::from_low_u64(1),
                    spender: Address::from_low_u64(3),
                    value: Amount::new(42),
                },
            )
            .clone();

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "Approval");
        assert_eq!(json["operation"], "approve");
        assert_eq!(json["value"], "42");

        let decoded: LedgerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, event);
    }
}
