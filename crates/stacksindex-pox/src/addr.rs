//! PoX reward-address conversion.
//!
//! A PoX address is a `{version: (buff 1), hashbytes: (buff 32)}` pair from
//! the stacking contract. The version selects the Bitcoin output type;
//! legacy types render via base58check and witness types via bech32(m).

use bech32::{hrp, segwit, Fe32};
use sha2::{Digest, Sha256};
use stacksindex_core::types::Network;

use crate::error::DecodeError;

/// PoX address version: legacy pay-to-pubkey-hash.
pub const POX_ADDR_P2PKH: u8 = 0x00;
/// Pay-to-script-hash.
pub const POX_ADDR_P2SH: u8 = 0x01;
/// p2wpkh nested in p2sh.
pub const POX_ADDR_P2SH_P2WPKH: u8 = 0x02;
/// p2wsh nested in p2sh.
pub const POX_ADDR_P2SH_P2WSH: u8 = 0x03;
/// Native segwit v0, 20-byte program.
pub const POX_ADDR_P2WPKH: u8 = 0x04;
/// Native segwit v0, 32-byte program.
pub const POX_ADDR_P2WSH: u8 = 0x05;
/// Taproot (segwit v1), 32-byte program.
pub const POX_ADDR_P2TR: u8 = 0x06;

/// Convert a PoX `{version, hashbytes}` pair to a Bitcoin address string.
///
/// Unknown versions and wrong hashbytes lengths fail; the caller degrades
/// such failures to a missing address while preserving the raw bytes.
pub fn pox_addr_to_btc(
    version: u8,
    hashbytes: &[u8],
    network: Network,
) -> Result<String, DecodeError> {
    match version {
        POX_ADDR_P2PKH => {
            let hash = expect_len(hashbytes, 20, "p2pkh")?;
            let prefix = match network {
                Network::Mainnet => 0x00,
                Network::Testnet => 0x6f,
            };
            Ok(base58check(prefix, hash))
        }
        POX_ADDR_P2SH | POX_ADDR_P2SH_P2WPKH | POX_ADDR_P2SH_P2WSH => {
            let hash = expect_len(hashbytes, 20, "p2sh")?;
            let prefix = match network {
                Network::Mainnet => 0x05,
                Network::Testnet => 0xc4,
            };
            Ok(base58check(prefix, hash))
        }
        POX_ADDR_P2WPKH => segwit_address(hashbytes, 20, segwit::VERSION_0, network),
        POX_ADDR_P2WSH => segwit_address(hashbytes, 32, segwit::VERSION_0, network),
        POX_ADDR_P2TR => segwit_address(hashbytes, 32, segwit::VERSION_1, network),
        other => Err(DecodeError::PoxAddress {
            reason: format!("unknown pox address version 0x{other:02x}"),
        }),
    }
}

fn expect_len<'a>(
    hashbytes: &'a [u8],
    expected: usize,
    kind: &str,
) -> Result<&'a [u8], DecodeError> {
    if hashbytes.len() != expected {
        return Err(DecodeError::PoxAddress {
            reason: format!(
                "{kind} hashbytes must be {expected} bytes, got {}",
                hashbytes.len()
            ),
        });
    }
    Ok(hashbytes)
}

fn base58check(prefix: u8, hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(1 + hash.len() + 4);
    payload.push(prefix);
    payload.extend_from_slice(hash);
    let checksum = Sha256::digest(Sha256::digest(&payload));
    payload.extend_from_slice(&checksum[..4]);
    bs58::encode(payload).into_string()
}

fn segwit_address(
    hashbytes: &[u8],
    expected_len: usize,
    witness_version: Fe32,
    network: Network,
) -> Result<String, DecodeError> {
    let program = expect_len(hashbytes, expected_len, "witness")?;
    let hrp = match network {
        Network::Mainnet => hrp::BC,
        Network::Testnet => hrp::TB,
    };
    segwit::encode(hrp, witness_version, program).map_err(|e| DecodeError::PoxAddress {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // hash160 of the secp256k1 generator-point pubkey; the classic test key.
    const HASH160: [u8; 20] = [
        0x75, 0x1e, 0x76, 0xe8, 0x19, 0x91, 0x96, 0xd4, 0x54, 0x94, 0x1c, 0x45, 0xd1, 0xb3, 0xa3,
        0x23, 0xf1, 0x43, 0x3b, 0xd6,
    ];

    #[test]
    fn p2pkh_mainnet() {
        let address = pox_addr_to_btc(POX_ADDR_P2PKH, &HASH160, Network::Mainnet).unwrap();
        assert_eq!(address, "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
    }

    #[test]
    fn p2pkh_testnet_prefix() {
        let address = pox_addr_to_btc(POX_ADDR_P2PKH, &HASH160, Network::Testnet).unwrap();
        assert!(address.starts_with('m') || address.starts_with('n'));
    }

    #[test]
    fn p2sh_mainnet_prefix() {
        let address = pox_addr_to_btc(POX_ADDR_P2SH, &HASH160, Network::Mainnet).unwrap();
        assert!(address.starts_with('3'));
    }

    #[test]
    fn p2sh_wrapped_variants_share_encoding() {
        let a = pox_addr_to_btc(POX_ADDR_P2SH, &HASH160, Network::Mainnet).unwrap();
        let b = pox_addr_to_btc(POX_ADDR_P2SH_P2WPKH, &HASH160, Network::Mainnet).unwrap();
        let c = pox_addr_to_btc(POX_ADDR_P2SH_P2WSH, &HASH160, Network::Mainnet).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn p2wpkh_mainnet() {
        // BIP-173 reference vector for this program.
        let address = pox_addr_to_btc(POX_ADDR_P2WPKH, &HASH160, Network::Mainnet).unwrap();
        assert_eq!(address, "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
    }

    #[test]
    fn p2wsh_requires_32_bytes() {
        let err = pox_addr_to_btc(POX_ADDR_P2WSH, &HASH160, Network::Mainnet).unwrap_err();
        assert!(matches!(err, DecodeError::PoxAddress { .. }));
    }

    #[test]
    fn p2tr_mainnet_prefix() {
        let address = pox_addr_to_btc(POX_ADDR_P2TR, &[0xab; 32], Network::Mainnet).unwrap();
        assert!(address.starts_with("bc1p"));
    }

    #[test]
    fn unknown_version_fails() {
        let err = pox_addr_to_btc(0x0f, &HASH160, Network::Mainnet).unwrap_err();
        assert!(matches!(err, DecodeError::PoxAddress { .. }));
    }

    #[test]
    fn wrong_length_fails() {
        let err = pox_addr_to_btc(POX_ADDR_P2PKH, &[0u8; 19], Network::Mainnet).unwrap_err();
        assert!(matches!(err, DecodeError::PoxAddress { .. }));
    }
}
