//! Typed synthetic stacking-event records.
//!
//! Each stacking operation kind is one variant of the closed
//! [`PoxEventData`] sum type, owning only its own fields — there are no
//! "present for some kinds" optionals on the envelope.

use serde::{Deserialize, Serialize};

/// A decoded synthetic PoX event: the common envelope plus kind-specific
/// data, with balance corrections already applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoxEvent {
    /// The stacker principal (`ADDR` or `ADDR.contract-name`).
    pub stacker: String,
    /// Microstacks locked after this operation.
    #[serde(with = "u128_str")]
    pub locked: u128,
    /// Unlocked balance after this operation.
    #[serde(with = "u128_str")]
    pub balance: u128,
    /// Burn height at which the locked amount unlocks.
    pub burnchain_unlock_height: u64,
    /// Converted Bitcoin reward address, when present and convertible.
    pub pox_addr: Option<String>,
    /// Raw `version ‖ hashbytes` of the reward address, preserved even when
    /// conversion fails.
    #[serde(with = "opt_hex")]
    pub pox_addr_raw: Option<Vec<u8>>,
    /// Kind-specific operation data.
    pub data: PoxEventData,
}

impl PoxEvent {
    /// The operation name, as printed by the PoX contract.
    pub fn name(&self) -> &'static str {
        self.data.name()
    }
}

/// Kind-specific data for each stacking operation.
///
/// 128-bit amounts travel as decimal strings: the `name`-tagged wire form
/// buffers fields through a representation without native 128-bit integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum PoxEventData {
    StackStx {
        #[serde(with = "u128_str")]
        lock_amount: u128,
        #[serde(with = "u128_str")]
        lock_period: u128,
        start_burn_height: u64,
        unlock_burn_height: u64,
    },
    StackIncrease {
        #[serde(with = "u128_str")]
        increase_by: u128,
        #[serde(with = "u128_str")]
        total_locked: u128,
    },
    StackExtend {
        #[serde(with = "u128_str")]
        extend_count: u128,
        unlock_burn_height: u64,
    },
    DelegateStx {
        #[serde(with = "u128_str")]
        amount_ustx: u128,
        delegate_to: String,
        unlock_burn_height: Option<u64>,
    },
    DelegateStackStx {
        #[serde(with = "u128_str")]
        lock_amount: u128,
        #[serde(with = "u128_str")]
        lock_period: u128,
        start_burn_height: u64,
        unlock_burn_height: u64,
        delegator: String,
    },
    DelegateStackIncrease {
        #[serde(with = "u128_str")]
        increase_by: u128,
        #[serde(with = "u128_str")]
        total_locked: u128,
        delegator: String,
    },
    DelegateStackExtend {
        #[serde(with = "u128_str")]
        extend_count: u128,
        unlock_burn_height: u64,
        delegator: String,
    },
    StackAggregationCommit {
        #[serde(with = "u128_str")]
        reward_cycle: u128,
        #[serde(with = "u128_str")]
        amount_ustx: u128,
    },
    StackAggregationCommitIndexed {
        #[serde(with = "u128_str")]
        reward_cycle: u128,
        #[serde(with = "u128_str")]
        amount_ustx: u128,
    },
    StackAggregationIncrease {
        #[serde(with = "u128_str")]
        reward_cycle: u128,
        #[serde(with = "u128_str")]
        amount_ustx: u128,
    },
    HandleUnlock {
        #[serde(with = "u128_str")]
        first_cycle_locked: u128,
        #[serde(with = "u128_str")]
        first_unlocked_cycle: u128,
    },
    RevokeDelegateStx {
        delegate_to: String,
    },
}

impl PoxEventData {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StackStx { .. } => "stack-stx",
            Self::StackIncrease { .. } => "stack-increase",
            Self::StackExtend { .. } => "stack-extend",
            Self::DelegateStx { .. } => "delegate-stx",
            Self::DelegateStackStx { .. } => "delegate-stack-stx",
            Self::DelegateStackIncrease { .. } => "delegate-stack-increase",
            Self::DelegateStackExtend { .. } => "delegate-stack-extend",
            Self::StackAggregationCommit { .. } => "stack-aggregation-commit",
            Self::StackAggregationCommitIndexed { .. } => "stack-aggregation-commit-indexed",
            Self::StackAggregationIncrease { .. } => "stack-aggregation-increase",
            Self::HandleUnlock { .. } => "handle-unlock",
            Self::RevokeDelegateStx { .. } => "revoke-delegate-stx",
        }
    }
}

mod u128_str {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

mod opt_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&format!("0x{}", hex::encode(bytes))),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(text) => hex::decode(text.strip_prefix("0x").unwrap_or(&text))
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_serializes_with_kebab_case_name() {
        let data = PoxEventData::StackAggregationCommitIndexed {
            reward_cycle: 7,
            amount_ustx: 100,
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["name"], "stack-aggregation-commit-indexed");
        assert_eq!(data.name(), "stack-aggregation-commit-indexed");
    }

    #[test]
    fn raw_pox_addr_roundtrips_as_hex() {
        let event = PoxEvent {
            stacker: "SP000000000000000000002Q6VF78".into(),
            locked: 0,
            balance: 1,
            burnchain_unlock_height: 0,
            pox_addr: None,
            pox_addr_raw: Some(vec![0x06, 0xab, 0xcd]),
            data: PoxEventData::HandleUnlock {
                first_cycle_locked: 1,
                first_unlocked_cycle: 2,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("0x06abcd"));
        let back: PoxEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn stacking_amounts_roundtrip_as_decimal_strings() {
        // Amounts above u64::MAX must survive the trip.
        let big = u128::from(u64::MAX) + 1;
        let event = PoxEvent {
            stacker: "SP000000000000000000002Q6VF78".into(),
            locked: big,
            balance: 42,
            burnchain_unlock_height: 900,
            pox_addr: None,
            pox_addr_raw: None,
            data: PoxEventData::StackStx {
                lock_amount: big,
                lock_period: 6,
                start_burn_height: 800,
                unlock_burn_height: 900,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: PoxEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["locked"], "18446744073709551616");
        assert_eq!(value["data"]["name"], "stack-stx");
        assert_eq!(value["data"]["lock_amount"], "18446744073709551616");
    }
}
