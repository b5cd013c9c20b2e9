//! Bech32 entity encoding (NIP-19)
//!
//! Only what the bot needs: decoding an `nsec` secret, encoding `npub` for
//! display, and encoding `nevent` references embedded in quote replies.
//!
//! `nevent` uses the TLV layout: type `0` event id (32 bytes), type `1` relay
//! URL (repeated), type `2` author public key (32 bytes).

use bech32::{Bech32, Hrp};

use crate::error::{Error, Result};

const HRP_NSEC: &str = "nsec";
const HRP_NPUB: &str = "npub";
const HRP_NEVENT: &str = "nevent";

const TLV_SPECIAL: u8 = 0;
const TLV_RELAY: u8 = 1;
const TLV_AUTHOR: u8 = 2;

/// Decode `nsec1…` into the 32 secret key bytes.
pub fn decode_nsec(s: &str) -> Result<[u8; 32]> {
    let (hrp, data) =
        bech32::decode(s.trim()).map_err(|e| Error::Key(format!("invalid bech32: {}", e)))?;
    if hrp.as_str() != HRP_NSEC {
        return Err(Error::Key(format!("expected nsec, found {}", hrp)));
    }
    data.as_slice()
        .try_into()
        .map_err(|_| Error::Key(format!("nsec payload is {} bytes, expected 32", data.len())))
}

/// Encode a hex public key as `npub1…`.
pub fn encode_npub(pubkey_hex: &str) -> Result<String> {
    let bytes = decode_hex32(pubkey_hex, "public key")?;
    encode(HRP_NPUB, &bytes)
}

/// Encode an event reference as `nevent1…`.
///
/// Fails on malformed hex or a relay URL longer than 255 bytes.
pub fn encode_nevent(event_id: &str, relays: &[String], author: Option<&str>) -> Result<String> {
    let mut tlv = Vec::with_capacity(80);
    push_tlv(&mut tlv, TLV_SPECIAL, &decode_hex32(event_id, "event id")?)?;
    for relay in relays {
        push_tlv(&mut tlv, TLV_RELAY, relay.as_bytes())?;
    }
    if let Some(author) = author {
        push_tlv(&mut tlv, TLV_AUTHOR, &decode_hex32(author, "author")?)?;
    }
    encode(HRP_NEVENT, &tlv)
}

/// Decoded `nevent` contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPointer {
    pub id: String,
    pub relays: Vec<String>,
    pub author: Option<String>,
}

/// Decode `nevent1…`. Unknown TLV types are skipped.
pub fn decode_nevent(s: &str) -> Result<EventPointer> {
    let (hrp, data) =
        bech32::decode(s.trim()).map_err(|e| Error::Key(format!("invalid bech32: {}", e)))?;
    if hrp.as_str() != HRP_NEVENT {
        return Err(Error::Key(format!("expected nevent, found {}", hrp)));
    }

    let mut id = None;
    let mut relays = Vec::new();
    let mut author = None;
    let mut rest = data.as_slice();
    while let [kind, len, tail @ ..] = rest {
        let len = *len as usize;
        if tail.len() < len {
            return Err(Error::Key("truncated nevent TLV".to_string()));
        }
        let (value, next) = tail.split_at(len);
        match *kind {
            TLV_SPECIAL if len == 32 => id = Some(hex::encode(value)),
            TLV_RELAY => relays.push(String::from_utf8_lossy(value).into_owned()),
            TLV_AUTHOR if len == 32 => author = Some(hex::encode(value)),
            _ => {}
        }
        rest = next;
    }

    let id = id.ok_or_else(|| Error::Key("nevent without event id".to_string()))?;
    Ok(EventPointer { id, relays, author })
}

fn encode(hrp: &str, data: &[u8]) -> Result<String> {
    let hrp = Hrp::parse(hrp).map_err(|e| Error::Key(format!("invalid hrp {}: {}", hrp, e)))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| Error::Key(format!("bech32 encode: {}", e)))
}

fn push_tlv(out: &mut Vec<u8>, kind: u8, value: &[u8]) -> Result<()> {
    let len = u8::try_from(value.len())
        .map_err(|_| Error::Key(format!("TLV value too long ({} bytes)", value.len())))?;
    out.push(kind);
    out.push(len);
    out.extend_from_slice(value);
    Ok(())
}

fn decode_hex32(s: &str, what: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s).map_err(|e| Error::Key(format!("invalid {} hex: {}", what, e)))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::Key(format!("{} is {} bytes, expected 32", what, bytes.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_nsec_vector() {
        let key = decode_nsec("nsec1vl029mgpspedva04g90vltkh6fvh240zqtv9k0t9af8935ke9laqsnlfe5")
            .unwrap();
        assert_eq!(
            hex::encode(key),
            "67dea2ed018072d675f5415ecfaed7d2597555e202d85b3d65ea4e58d2d92ffa"
        );
    }

    #[test]
    fn test_encode_npub_vector() {
        assert_eq!(
            encode_npub("7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e")
                .unwrap(),
            "npub10elfcs4fr0l0r8af98jlmgdh9c8tcxjvz9qkw038js35mp4dma8qzvjptg"
        );
    }

    #[test]
    fn test_decode_nsec_rejects_other_entities() {
        let npub = "npub10elfcs4fr0l0r8af98jlmgdh9c8tcxjvz9qkw038js35mp4dma8qzvjptg";
        assert!(matches!(decode_nsec(npub), Err(Error::Key(_))));
        assert!(decode_nsec("not bech32").is_err());
    }

    #[test]
    fn test_nevent_carries_id_relays_author() {
        let id = "b9f5441e45ca39179320e0031cfb18e34078673dcc3d3e3a3b3a981760aa5696";
        let author = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";
        let relays = vec!["wss://relay.example.com".to_string()];

        let encoded = encode_nevent(id, &relays, Some(author)).unwrap();
        assert!(encoded.starts_with("nevent1"));

        let pointer = decode_nevent(&encoded).unwrap();
        assert_eq!(pointer.id, id);
        assert_eq!(pointer.relays, relays);
        assert_eq!(pointer.author.as_deref(), Some(author));
    }

    #[test]
    fn test_nevent_rejects_bad_input() {
        assert!(encode_nevent("zz", &[], None).is_err());
        let long_relay = format!("wss://{}.example.com", "a".repeat(300));
        let id = "b9f5441e45ca39179320e0031cfb18e34078673dcc3d3e3a3b3a981760aa5696";
        assert!(encode_nevent(id, &[long_relay], None).is_err());
    }
}
