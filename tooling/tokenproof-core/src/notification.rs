//! Token notifications (events) and the rules for matching them.
//!
//! Implementations disagree on event argument *names* (`from`/`src`,
//! `value`/`wad`, ...) and some append an `origin` field. Matching therefore
//! compares the event tag and the positional argument values only.

use std::fmt;

use alloy_primitives::{Address, U256};
use serde::Serialize;

/// Name of the implementation-added trailing field ignored during matching.
pub const ORIGIN_FIELD: &str = "origin";

/// Notification as predicted by the reference model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum Notification {
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    Approval {
        owner: Address,
        spender: Address,
        value: U256,
    },
}

impl Notification {
    pub fn tag(&self) -> &'static str {
        match self {
            Notification::Transfer { .. } => "Transfer",
            Notification::Approval { .. } => "Approval",
        }
    }

    pub fn values(&self) -> [EventValue; 3] {
        match *self {
            Notification::Transfer { from, to, value } => [
                EventValue::Address(from),
                EventValue::Address(to),
                EventValue::Uint(value),
            ],
            Notification::Approval {
                owner,
                spender,
                value,
            } => [
                EventValue::Address(owner),
                EventValue::Address(spender),
                EventValue::Uint(value),
            ],
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Transfer { from, to, value } => {
                write!(f, "Transfer({from}, {to}, {value})")
            }
            Notification::Approval {
                owner,
                spender,
                value,
            } => write!(f, "Approval({owner}, {spender}, {value})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
}

/// Event exactly as a substrate reports it: a name plus named fields in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmittedEvent {
    pub name: String,
    pub fields: Vec<(String, EventValue)>,
}

impl EmittedEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: EventValue) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    /// `Transfer(from, to, value)` with the conventional field names.
    pub fn transfer(from: Address, to: Address, value: U256) -> Self {
        Self::new("Transfer")
            .with_field("from", EventValue::Address(from))
            .with_field("to", EventValue::Address(to))
            .with_field("value", EventValue::Uint(value))
    }

    /// `Approval(owner, spender, value)` with the conventional field names.
    pub fn approval(owner: Address, spender: Address, value: U256) -> Self {
        Self::new("Approval")
            .with_field("owner", EventValue::Address(owner))
            .with_field("spender", EventValue::Address(spender))
            .with_field("value", EventValue::Uint(value))
    }

    /// Field values in order, without the `origin` field.
    pub fn positional(&self) -> impl Iterator<Item = &EventValue> + '_ {
        self.fields
            .iter()
            .filter(|(name, _)| name != ORIGIN_FIELD)
            .map(|(_, value)| value)
    }

    pub fn matches(&self, expected: &Notification) -> bool {
        self.name == expected.tag() && self.positional().eq(expected.values().iter())
    }
}

impl From<&Notification> for EmittedEvent {
    fn from(notification: &Notification) -> Self {
        match *notification {
            Notification::Transfer { from, to, value } => EmittedEvent::transfer(from, to, value),
            Notification::Approval {
                owner,
                spender,
                value,
            } => EmittedEvent::approval(owner, spender, value),
        }
    }
}

/// True when every expected notification appears among the emitted events.
pub fn all_emitted(emitted: &[EmittedEvent], expected: &[Notification]) -> bool {
    expected
        .iter()
        .all(|want| emitted.iter().any(|event| event.matches(want)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn test_field_names_are_ignored() {
        let expected = Notification::Transfer {
            from: addr(1),
            to: addr(2),
            value: U256::from(7u64),
        };
        let solmate_style = EmittedEvent::new("Transfer")
            .with_field("src", EventValue::Address(addr(1)))
            .with_field("dst", EventValue::Address(addr(2)))
            .with_field("wad", EventValue::Uint(U256::from(7u64)));

        assert!(solmate_style.matches(&expected));
    }

    #[test]
    fn test_origin_field_is_ignored() {
        let expected = Notification::Approval {
            owner: addr(1),
            spender: addr(2),
            value: U256::from(3u64),
        };
        let with_origin = EmittedEvent::approval(addr(1), addr(2), U256::from(3u64))
            .with_field(ORIGIN_FIELD, EventValue::Address(addr(9)));

        assert!(with_origin.matches(&expected));
    }

    #[test]
    fn test_order_and_tag_matter() {
        let expected = Notification::Transfer {
            from: addr(1),
            to: addr(2),
            value: U256::from(7u64),
        };
        let swapped = EmittedEvent::transfer(addr(2), addr(1), U256::from(7u64));
        let wrong_tag = EmittedEvent::approval(addr(1), addr(2), U256::from(7u64));

        assert!(!swapped.matches(&expected));
        assert!(!wrong_tag.matches(&expected));
    }

    #[test]
    fn test_all_emitted_requires_every_expected_event() {
        let transfer = Notification::Transfer {
            from: addr(1),
            to: addr(2),
            value: U256::from(1u64),
        };
        let approval = Notification::Approval {
            owner: addr(1),
            spender: addr(3),
            value: U256::ZERO,
        };
        let emitted = vec![EmittedEvent::from(&transfer)];

        assert!(all_emitted(&emitted, &[transfer.clone()]));
        assert!(!all_emitted(&emitted, &[transfer, approval]));
        assert!(all_emitted(&[], &[]));
    }
}
