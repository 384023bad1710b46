//! Clarity value tree: consensus deserialization and principal rendering.
//!
//! Clarity values arrive from the node as hex strings in the consensus wire
//! format — a self-describing tagged tree with a one-byte type prefix per
//! node. This module decodes that format into [`ClarityValue`] and renders
//! principals as c32check address strings.

use sha2::{Digest, Sha256};

use crate::error::DecodeError;

// ─── Value tree ───────────────────────────────────────────────────────────────

/// A standard or contract principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalData {
    Standard {
        version: u8,
        hash160: [u8; 20],
    },
    Contract {
        version: u8,
        hash160: [u8; 20],
        contract_name: String,
    },
}

impl PrincipalData {
    /// Render as `ADDR` or `ADDR.contract-name`.
    pub fn to_address_string(&self) -> Result<String, DecodeError> {
        match self {
            Self::Standard { version, hash160 } => c32_address(*version, hash160),
            Self::Contract {
                version,
                hash160,
                contract_name,
            } => Ok(format!(
                "{}.{contract_name}",
                c32_address(*version, hash160)?
            )),
        }
    }
}

/// A decoded Clarity value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    Int(i128),
    UInt(u128),
    Buffer(Vec<u8>),
    Bool(bool),
    Principal(PrincipalData),
    ResponseOk(Box<ClarityValue>),
    ResponseErr(Box<ClarityValue>),
    OptionalNone,
    OptionalSome(Box<ClarityValue>),
    List(Vec<ClarityValue>),
    /// Field order as serialized.
    Tuple(Vec<(String, ClarityValue)>),
    StringAscii(String),
    StringUtf8(String),
}

impl ClarityValue {
    /// Decode a single value from a hex string (`0x` prefix optional).
    /// Trailing bytes after the value are rejected.
    pub fn from_hex(raw: &str) -> Result<Self, DecodeError> {
        let stripped = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(stripped)?;
        let mut reader = Reader::new(&bytes);
        let value = reader.read_value()?;
        if reader.remaining() > 0 {
            return Err(DecodeError::TrailingBytes {
                count: reader.remaining(),
            });
        }
        Ok(value)
    }

    /// Serialize back to consensus bytes. Used for fixtures and debugging.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_bytes(&mut out);
        out
    }

    /// Serialize to a `0x`-prefixed hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Short type name for error reporting.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Buffer(_) => "buffer",
            Self::Bool(_) => "bool",
            Self::Principal(_) => "principal",
            Self::ResponseOk(_) => "response-ok",
            Self::ResponseErr(_) => "response-err",
            Self::OptionalNone => "none",
            Self::OptionalSome(_) => "some",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::StringAscii(_) => "string-ascii",
            Self::StringUtf8(_) => "string-utf8",
        }
    }

    fn write_bytes(&self, out: &mut Vec<u8>) {
        match self {
            Self::Int(value) => {
                out.push(0x00);
                out.extend_from_slice(&value.to_be_bytes());
            }
            Self::UInt(value) => {
                out.push(0x01);
                out.extend_from_slice(&value.to_be_bytes());
            }
            Self::Buffer(bytes) => {
                out.push(0x02);
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            Self::Bool(true) => out.push(0x03),
            Self::Bool(false) => out.push(0x04),
            Self::Principal(PrincipalData::Standard { version, hash160 }) => {
                out.push(0x05);
                out.push(*version);
                out.extend_from_slice(hash160);
            }
            Self::Principal(PrincipalData::Contract {
                version,
                hash160,
                contract_name,
            }) => {
                out.push(0x06);
                out.push(*version);
                out.extend_from_slice(hash160);
                out.push(contract_name.len() as u8);
                out.extend_from_slice(contract_name.as_bytes());
            }
            Self::ResponseOk(inner) => {
                out.push(0x07);
                inner.write_bytes(out);
            }
            Self::ResponseErr(inner) => {
                out.push(0x08);
                inner.write_bytes(out);
            }
            Self::OptionalNone => out.push(0x09),
            Self::OptionalSome(inner) => {
                out.push(0x0a);
                inner.write_bytes(out);
            }
            Self::List(items) => {
                out.push(0x0b);
                out.extend_from_slice(&(items.len() as u32).to_be_bytes());
                for item in items {
                    item.write_bytes(out);
                }
            }
            Self::Tuple(entries) => {
                out.push(0x0c);
                out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
                for (name, value) in entries {
                    out.push(name.len() as u8);
                    out.extend_from_slice(name.as_bytes());
                    value.write_bytes(out);
                }
            }
            Self::StringAscii(text) => {
                out.push(0x0d);
                out.extend_from_slice(&(text.len() as u32).to_be_bytes());
                out.extend_from_slice(text.as_bytes());
            }
            Self::StringUtf8(text) => {
                out.push(0x0e);
                out.extend_from_slice(&(text.len() as u32).to_be_bytes());
                out.extend_from_slice(text.as_bytes());
            }
        }
    }
}

// ─── Reader ───────────────────────────────────────────────────────────────────

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < count {
            return Err(DecodeError::Truncated {
                offset: self.offset,
                needed: count - self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_hash160(&mut self) -> Result<[u8; 20], DecodeError> {
        let bytes = self.take(20)?;
        let mut hash = [0u8; 20];
        hash.copy_from_slice(bytes);
        Ok(hash)
    }

    fn read_clarity_name(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u8()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidPrincipal {
            reason: "non-utf8 name".into(),
        })
    }

    /// Length-prefixed collections cap their count by the bytes actually
    /// remaining, so a malformed length cannot trigger a huge allocation.
    fn checked_count(&self, count: u32) -> Result<usize, DecodeError> {
        let count = count as usize;
        if count > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.offset,
                needed: count - self.remaining(),
            });
        }
        Ok(count)
    }

    fn read_value(&mut self) -> Result<ClarityValue, DecodeError> {
        let prefix_offset = self.offset;
        let prefix = self.read_u8()?;
        match prefix {
            0x00 => {
                let bytes = self.take(16)?;
                let mut raw = [0u8; 16];
                raw.copy_from_slice(bytes);
                Ok(ClarityValue::Int(i128::from_be_bytes(raw)))
            }
            0x01 => {
                let bytes = self.take(16)?;
                let mut raw = [0u8; 16];
                raw.copy_from_slice(bytes);
                Ok(ClarityValue::UInt(u128::from_be_bytes(raw)))
            }
            0x02 => {
                let len = self.read_u32()?;
                let len = self.checked_count(len)?;
                Ok(ClarityValue::Buffer(self.take(len)?.to_vec()))
            }
            0x03 => Ok(ClarityValue::Bool(true)),
            0x04 => Ok(ClarityValue::Bool(false)),
            0x05 => {
                let version = self.read_u8()?;
                let hash160 = self.read_hash160()?;
                Ok(ClarityValue::Principal(PrincipalData::Standard {
                    version,
                    hash160,
                }))
            }
            0x06 => {
                let version = self.read_u8()?;
                let hash160 = self.read_hash160()?;
                let contract_name = self.read_clarity_name()?;
                Ok(ClarityValue::Principal(PrincipalData::Contract {
                    version,
                    hash160,
                    contract_name,
                }))
            }
            0x07 => Ok(ClarityValue::ResponseOk(Box::new(self.read_value()?))),
            0x08 => Ok(ClarityValue::ResponseErr(Box::new(self.read_value()?))),
            0x09 => Ok(ClarityValue::OptionalNone),
            0x0a => Ok(ClarityValue::OptionalSome(Box::new(self.read_value()?))),
            0x0b => {
                let count = self.read_u32()?;
                let count = self.checked_count(count)?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_value()?);
                }
                Ok(ClarityValue::List(items))
            }
            0x0c => {
                let count = self.read_u32()?;
                let count = self.checked_count(count)?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = self.read_clarity_name()?;
                    let value = self.read_value()?;
                    entries.push((name, value));
                }
                Ok(ClarityValue::Tuple(entries))
            }
            0x0d => {
                let len = self.read_u32()?;
                let len = self.checked_count(len)?;
                let bytes = self.take(len)?;
                let text =
                    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::TypeMismatch {
                        field: "string-ascii".into(),
                        expected: "ascii bytes",
                        got: "invalid utf8",
                    })?;
                Ok(ClarityValue::StringAscii(text))
            }
            0x0e => {
                let len = self.read_u32()?;
                let len = self.checked_count(len)?;
                let bytes = self.take(len)?;
                let text =
                    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::TypeMismatch {
                        field: "string-utf8".into(),
                        expected: "utf8 bytes",
                        got: "invalid utf8",
                    })?;
                Ok(ClarityValue::StringUtf8(text))
            }
            other => Err(DecodeError::UnknownTypePrefix {
                prefix: other,
                offset: prefix_offset,
            }),
        }
    }
}

// ─── c32check addresses ───────────────────────────────────────────────────────

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Stacks single-sig mainnet address version.
pub const C32_VERSION_MAINNET: u8 = 22;
/// Stacks single-sig testnet address version.
pub const C32_VERSION_TESTNET: u8 = 26;

/// Render a c32check Stacks address from a version byte and hash160.
pub fn c32_address(version: u8, hash160: &[u8; 20]) -> Result<String, DecodeError> {
    if version >= 32 {
        return Err(DecodeError::InvalidPrincipal {
            reason: format!("principal version {version} out of c32 range"),
        });
    }

    let mut check = Vec::with_capacity(21);
    check.push(version);
    check.extend_from_slice(hash160);
    let checksum = double_sha256(&check);

    let mut payload = hash160.to_vec();
    payload.extend_from_slice(&checksum[..4]);

    let mut address = String::with_capacity(2 + 39);
    address.push('S');
    address.push(C32_ALPHABET[version as usize] as char);
    address.push_str(&c32_encode(&payload));
    Ok(address)
}

fn double_sha256(bytes: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(bytes);
    let second = Sha256::digest(first);
    second.into()
}

/// c32 (Crockford-style base32) encoding, 5 bits at a time from the least
/// significant end, preserving leading zero bytes as leading `0` digits.
fn c32_encode(input: &[u8]) -> String {
    // Digits accumulate least-significant first.
    let mut digits: Vec<u8> = Vec::with_capacity(input.len() * 8 / 5 + 2);
    let mut carry: u16 = 0;
    let mut carry_bits: u8 = 0;

    for byte in input.iter().rev() {
        let current = *byte as u16;
        let low_bits_to_take = 5 - carry_bits;
        let low_bits = current & ((1 << low_bits_to_take) - 1);
        let c32_value = (low_bits << carry_bits) | carry;
        digits.push(C32_ALPHABET[c32_value as usize]);
        carry_bits = (8 + carry_bits) - 5;
        carry = current >> (8 - carry_bits);

        if carry_bits >= 5 {
            digits.push(C32_ALPHABET[(carry & 0x1f) as usize]);
            carry_bits -= 5;
            carry >>= 5;
        }
    }
    if carry_bits > 0 {
        digits.push(C32_ALPHABET[carry as usize]);
    }

    // Drop the encoding's own leading zeros (at the back of `digits`), then
    // restore one `0` digit per leading zero byte of the input.
    while digits.last() == Some(&C32_ALPHABET[0]) {
        digits.pop();
    }
    for byte in input {
        if *byte == 0 {
            digits.push(C32_ALPHABET[0]);
        } else {
            break;
        }
    }

    digits.iter().rev().map(|b| *b as char).collect()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
