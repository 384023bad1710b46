//! Synthetic stacking-event decoding.
//!
//! The PoX contract prints a self-describing response value for every
//! stacking operation. [`decode`] validates the envelope, re-types the
//! kind-specific `data` tuple, converts the reward address, and applies the
//! per-kind balance corrections that compensate for the node's known
//! locked-balance reporting bug.
//!
//! Strictness rules:
//! - outer `ResponseErr` means the stacking call failed on-chain → `None`,
//!   not an error;
//! - any envelope violation or unknown operation name is a hard
//!   [`DecodeError`] — stale protocol knowledge must surface, never be
//!   absorbed;
//! - reward-address conversion failure alone never aborts a decode: the
//!   address degrades to `None` with the raw bytes preserved.

use stacksindex_core::types::Network;

use crate::addr::pox_addr_to_btc;
use crate::clarity::ClarityValue;
use crate::error::DecodeError;
use crate::event::{PoxEvent, PoxEventData};

/// Decode a raw print-log hex payload into a synthetic stacking event.
pub fn decode(raw_hex: &str, network: Network) -> Result<Option<PoxEvent>, DecodeError> {
    let value = ClarityValue::from_hex(raw_hex)?;
    decode_value(&value, network)
}

/// Decode an already-parsed Clarity value.
pub fn decode_value(
    value: &ClarityValue,
    network: Network,
) -> Result<Option<PoxEvent>, DecodeError> {
    let inner = match value {
        ClarityValue::ResponseErr(_) => return Ok(None),
        ClarityValue::ResponseOk(inner) => inner.as_ref(),
        other => {
            return Err(DecodeError::TypeMismatch {
                field: "<outer>".into(),
                expected: "response",
                got: other.type_name(),
            })
        }
    };

    let envelope = TupleView::of("<envelope>", inner)?;
    let name = envelope.ascii("name")?;
    let stacker = envelope.principal("stacker")?;
    let locked = envelope.uint("locked")?;
    let balance = envelope.uint("balance")?;
    let burnchain_unlock_height = envelope.uint_as_u64("burnchain-unlock-height")?;
    let data_value = envelope.field("data")?;
    let data_view = TupleView::of("data", data_value)?;

    let data = decode_data(&name, &data_view)?;
    let (pox_addr, pox_addr_raw) = decode_pox_addr(&data_view, network)?;

    let mut event = PoxEvent {
        stacker,
        locked,
        balance,
        burnchain_unlock_height,
        pox_addr,
        pox_addr_raw,
        data,
    };
    apply_balance_patch(&mut event)?;
    Ok(Some(event))
}

/// Per-kind balance corrections for the node's locked-balance reporting bug.
///
/// The node reports `balance`/`locked`/`burnchain-unlock-height` as of
/// *before* the operation for some kinds; this table shifts the envelope to
/// post-operation values.
pub fn apply_balance_patch(event: &mut PoxEvent) -> Result<(), DecodeError> {
    let kind = event.data.name();
    match &event.data {
        PoxEventData::HandleUnlock { .. } => {
            event.balance = checked_add(event.balance, event.locked, kind)?;
        }
        PoxEventData::StackStx {
            lock_amount,
            unlock_burn_height,
            ..
        }
        | PoxEventData::DelegateStackStx {
            lock_amount,
            unlock_burn_height,
            ..
        } => {
            event.burnchain_unlock_height = *unlock_burn_height;
            event.balance = checked_sub(event.balance, *lock_amount, kind)?;
            event.locked = *lock_amount;
        }
        PoxEventData::StackIncrease { increase_by, .. }
        | PoxEventData::DelegateStackIncrease { increase_by, .. } => {
            event.balance = checked_sub(event.balance, *increase_by, kind)?;
            event.locked = checked_add(event.locked, *increase_by, kind)?;
        }
        PoxEventData::StackExtend {
            unlock_burn_height, ..
        }
        | PoxEventData::DelegateStackExtend {
            unlock_burn_height, ..
        } => {
            event.burnchain_unlock_height = *unlock_burn_height;
        }
        PoxEventData::DelegateStx {
            unlock_burn_height, ..
        } => {
            if let Some(height) = unlock_burn_height {
                event.burnchain_unlock_height = *height;
            }
        }
        PoxEventData::StackAggregationCommit { .. }
        | PoxEventData::StackAggregationCommitIndexed { .. }
        | PoxEventData::StackAggregationIncrease { .. }
        | PoxEventData::RevokeDelegateStx { .. } => {}
    }
    Ok(())
}

fn checked_add(a: u128, b: u128, kind: &'static str) -> Result<u128, DecodeError> {
    a.checked_add(b).ok_or(DecodeError::BalancePatch {
        kind,
        reason: "balance overflow",
    })
}

fn checked_sub(a: u128, b: u128, kind: &'static str) -> Result<u128, DecodeError> {
    a.checked_sub(b).ok_or(DecodeError::BalancePatch {
        kind,
        reason: "balance underflow",
    })
}

// ─── Kind-specific data ───────────────────────────────────────────────────────

fn decode_data(name: &str, data: &TupleView<'_>) -> Result<PoxEventData, DecodeError> {
    match name {
        "stack-stx" => Ok(PoxEventData::StackStx {
            lock_amount: data.uint("lock-amount")?,
            lock_period: data.uint("lock-period")?,
            start_burn_height: data.uint_as_u64("start-burn-height")?,
            unlock_burn_height: data.uint_as_u64("unlock-burn-height")?,
        }),
        "stack-increase" => Ok(PoxEventData::StackIncrease {
            increase_by: data.uint("increase-by")?,
            total_locked: data.uint("total-locked")?,
        }),
        "stack-extend" => Ok(PoxEventData::StackExtend {
            extend_count: data.uint("extend-count")?,
            unlock_burn_height: data.uint_as_u64("unlock-burn-height")?,
        }),
        "delegate-stx" => Ok(PoxEventData::DelegateStx {
            amount_ustx: data.uint("amount-ustx")?,
            delegate_to: data.principal("delegate-to")?,
            unlock_burn_height: data.optional_uint_as_u64("unlock-burn-height")?,
        }),
        "delegate-stack-stx" => Ok(PoxEventData::DelegateStackStx {
            lock_amount: data.uint("lock-amount")?,
            lock_period: data.uint("lock-period")?,
            start_burn_height: data.uint_as_u64("start-burn-height")?,
            unlock_burn_height: data.uint_as_u64("unlock-burn-height")?,
            delegator: data.principal("delegator")?,
        }),
        "delegate-stack-increase" => Ok(PoxEventData::DelegateStackIncrease {
            increase_by: data.uint("increase-by")?,
            total_locked: data.uint("total-locked")?,
            delegator: data.principal("delegator")?,
        }),
        "delegate-stack-extend" => Ok(PoxEventData::DelegateStackExtend {
            extend_count: data.uint("extend-count")?,
            unlock_burn_height: data.uint_as_u64("unlock-burn-height")?,
            delegator: data.principal("delegator")?,
        }),
        "stack-aggregation-commit" => Ok(PoxEventData::StackAggregationCommit {
            reward_cycle: data.uint("reward-cycle")?,
            amount_ustx: data.uint("amount-ustx")?,
        }),
        "stack-aggregation-commit-indexed" => Ok(PoxEventData::StackAggregationCommitIndexed {
            reward_cycle: data.uint("reward-cycle")?,
            amount_ustx: data.uint("amount-ustx")?,
        }),
        "stack-aggregation-increase" => Ok(PoxEventData::StackAggregationIncrease {
            reward_cycle: data.uint("reward-cycle")?,
            amount_ustx: data.uint("amount-ustx")?,
        }),
        "handle-unlock" => Ok(PoxEventData::HandleUnlock {
            first_cycle_locked: data.uint("first-cycle-locked")?,
            first_unlocked_cycle: data.uint("first-unlocked-cycle")?,
        }),
        "revoke-delegate-stx" => Ok(PoxEventData::RevokeDelegateStx {
            delegate_to: data.principal("delegate-to")?,
        }),
        other => Err(DecodeError::UnknownOperation { name: other.into() }),
    }
}

/// Extract and convert the optional `pox-addr` field of a data tuple.
///
/// Accepts a bare tuple or `(some tuple)`; `none` and absence both mean no
/// reward address. Conversion failure is demoted to a missing address with
/// the raw `version ‖ hashbytes` preserved.
fn decode_pox_addr(
    data: &TupleView<'_>,
    network: Network,
) -> Result<(Option<String>, Option<Vec<u8>>), DecodeError> {
    let value = match data.field("pox-addr") {
        Err(_) => return Ok((None, None)),
        Ok(ClarityValue::OptionalNone) => return Ok((None, None)),
        Ok(ClarityValue::OptionalSome(inner)) => inner.as_ref(),
        Ok(value) => value,
    };
    let tuple = TupleView::of("pox-addr", value)?;
    let version = tuple.buffer("version")?;
    let hashbytes = tuple.buffer("hashbytes")?;
    if version.len() != 1 {
        return Err(DecodeError::TypeMismatch {
            field: "pox-addr.version".into(),
            expected: "(buff 1)",
            got: "longer buffer",
        });
    }

    let mut raw = Vec::with_capacity(1 + hashbytes.len());
    raw.extend_from_slice(version);
    raw.extend_from_slice(hashbytes);

    match pox_addr_to_btc(version[0], hashbytes, network) {
        Ok(address) => Ok((Some(address), Some(raw))),
        Err(error) => {
            tracing::warn!(%error, "pox address conversion failed; keeping raw bytes");
            Ok((None, Some(raw)))
        }
    }
}

// ─── Tuple access ─────────────────────────────────────────────────────────────

/// Field accessor over a Clarity tuple with typed, strict extraction.
struct TupleView<'a> {
    name: &'static str,
    entries: &'a [(String, ClarityValue)],
}

impl<'a> TupleView<'a> {
    fn of(name: &'static str, value: &'a ClarityValue) -> Result<Self, DecodeError> {
        match value {
            ClarityValue::Tuple(entries) => Ok(Self { name, entries }),
            other => Err(DecodeError::TypeMismatch {
                field: name.into(),
                expected: "tuple",
                got: other.type_name(),
            }),
        }
    }

    fn field(&self, field: &str) -> Result<&'a ClarityValue, DecodeError> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
            .ok_or_else(|| DecodeError::MissingField {
                field: format!("{}.{field}", self.name),
            })
    }

    fn uint(&self, field: &str) -> Result<u128, DecodeError> {
        match self.field(field)? {
            ClarityValue::UInt(value) => Ok(*value),
            other => Err(self.mismatch(field, "uint", other)),
        }
    }

    fn uint_as_u64(&self, field: &str) -> Result<u64, DecodeError> {
        let value = self.uint(field)?;
        u64::try_from(value).map_err(|_| DecodeError::OutOfRange {
            field: format!("{}.{field}", self.name),
            value: value.to_string(),
        })
    }

    fn optional_uint_as_u64(&self, field: &str) -> Result<Option<u64>, DecodeError> {
        match self.field(field) {
            Err(_) => Ok(None),
            Ok(ClarityValue::OptionalNone) => Ok(None),
            Ok(ClarityValue::OptionalSome(inner)) => match inner.as_ref() {
                ClarityValue::UInt(value) => {
                    u64::try_from(*value).map(Some).map_err(|_| DecodeError::OutOfRange {
                        field: format!("{}.{field}", self.name),
                        value: value.to_string(),
                    })
                }
                other => Err(self.mismatch(field, "(optional uint)", other)),
            },
            Ok(ClarityValue::UInt(value)) => {
                u64::try_from(*value).map(Some).map_err(|_| DecodeError::OutOfRange {
                    field: format!("{}.{field}", self.name),
                    value: value.to_string(),
                })
            }
            Ok(other) => Err(self.mismatch(field, "(optional uint)", other)),
        }
    }

    fn ascii(&self, field: &str) -> Result<String, DecodeError> {
        match self.field(field)? {
            ClarityValue::StringAscii(text) => Ok(text.clone()),
            other => Err(self.mismatch(field, "string-ascii", other)),
        }
    }

    fn principal(&self, field: &str) -> Result<String, DecodeError> {
        match self.field(field)? {
            ClarityValue::Principal(principal) => principal.to_address_string(),
            other => Err(self.mismatch(field, "principal", other)),
        }
    }

    fn buffer(&self, field: &str) -> Result<&'a [u8], DecodeError> {
        match self.field(field)? {
            ClarityValue::Buffer(bytes) => Ok(bytes),
            other => Err(self.mismatch(field, "buffer", other)),
        }
    }

    fn mismatch(&self, field: &str, expected: &'static str, got: &ClarityValue) -> DecodeError {
        DecodeError::TypeMismatch {
            field: format!("{}.{field}", self.name),
            expected,
            got: got.type_name(),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
