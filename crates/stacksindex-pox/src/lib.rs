//! Synthetic PoX stacking-event decoder.
//!
//! The Stacks PoX contract prints a response value describing every stacking
//! operation. This crate turns the raw hex payload of such a print log into
//! a typed [`PoxEvent`]:
//!
//! ```text
//! raw hex ──► ClarityValue ──► envelope + data tuple ──► PoxEvent
//!                                   │
//!                                   ├─ pox-addr → Bitcoin address string
//!                                   └─ balance patch (node bug workaround)
//! ```
//!
//! The decoder is deliberately strict: unknown operation names and malformed
//! envelopes are hard errors so that protocol drift surfaces immediately,
//! while a failed on-chain call (outer `err`) decodes to `None`.

pub mod addr;
pub mod clarity;
pub mod decode;
pub mod error;
pub mod event;

pub use addr::pox_addr_to_btc;
pub use clarity::{c32_address, ClarityValue, PrincipalData};
pub use decode::{decode, decode_value};
pub use error::DecodeError;
pub use event::{PoxEvent, PoxEventData};
