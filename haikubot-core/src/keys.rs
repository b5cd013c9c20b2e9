//! Bot identity and event signing
//!
//! The publisher only sees the [`Signer`] trait: it hands over an unsigned
//! [`Draft`] and gets back a complete [`Message`]. Key bytes stay inside
//! [`Keys`].

use std::fmt;
use std::sync::LazyLock;

use secp256k1::{Keypair, Secp256k1, SecretKey, XOnlyPublicKey};

use crate::error::{Error, Result};
use crate::nip19;
use crate::types::{compute_event_id, Kind, Message, Tag, Timestamp};

/// Signs event ids on behalf of one identity.
pub trait Signer: Send + Sync {
    /// x-only public key, lowercase hex
    fn public_key(&self) -> &str;

    /// BIP-340 signature over a hex event id, hex encoded.
    fn sign_id(&self, event_id: &str) -> Result<String>;
}

/// Secp256k1 key pair parsed from configuration.
pub struct Keys {
    secp: Secp256k1<secp256k1::All>,
    keypair: Keypair,
    public_hex: String,
}

impl Keys {
    /// Parse an `nsec1…` string or 64 hex characters.
    pub fn parse(secret: &str) -> Result<Self> {
        let secret = secret.trim();
        let bytes: [u8; 32] = if secret.starts_with("nsec1") {
            nip19::decode_nsec(secret)?
        } else {
            let raw = hex::decode(secret)
                .map_err(|e| Error::Key(format!("secret key is neither nsec nor hex: {}", e)))?;
            raw.as_slice()
                .try_into()
                .map_err(|_| Error::Key(format!("secret key is {} bytes, expected 32", raw.len())))?
        };
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| Error::Key(format!("invalid secret key: {}", e)))?;
        let keypair = Keypair::from_secret_key(&secp, &secret);
        let (xonly, _parity) = keypair.x_only_public_key();
        Ok(Self {
            secp,
            keypair,
            public_hex: xonly.to_string(),
        })
    }

    /// Public key as `npub1…`, for logs.
    pub fn npub(&self) -> Result<String> {
        nip19::encode_npub(&self.public_hex)
    }

}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("public_key", &self.public_hex)
            .finish_non_exhaustive()
    }
}

impl Signer for Keys {
    fn public_key(&self) -> &str {
        &self.public_hex
    }

    fn sign_id(&self, event_id: &str) -> Result<String> {
        let digest = id_digest(event_id)?;
        let msg = secp256k1::Message::from_digest(digest);
        let sig = self.secp.sign_schnorr_no_aux_rand(&msg, &self.keypair);
        Ok(sig.to_string())
    }
}

/// Event fields before id and signature exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub created_at: Timestamp,
    pub kind: Kind,
    pub tags: Vec<Tag>,
    pub content: String,
}

impl Draft {
    /// Compute the id under the signer's key and sign it.
    pub fn sign(self, signer: &dyn Signer) -> Result<Message> {
        let author = signer.public_key().to_string();
        let id = compute_event_id(&author, self.created_at, self.kind, &self.tags, &self.content);
        let sig = signer.sign_id(&id)?;
        Ok(Message {
            id,
            author,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig,
        })
    }
}

fn id_digest(event_id: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(event_id).map_err(|e| Error::Key(format!("invalid event id: {}", e)))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::Key(format!("event id is {} bytes, expected 32", bytes.len())))
}

static VERIFIER: LazyLock<Secp256k1<secp256k1::VerifyOnly>> =
    LazyLock::new(Secp256k1::verification_only);

/// Check that an event's id matches its content and that the author signed it.
pub fn verify_event(message: &Message) -> Result<()> {
    let secp: &Secp256k1<secp256k1::VerifyOnly> = &VERIFIER;
    if !message.has_valid_id() {
        return Err(Error::Key(format!("event {} has a mismatched id", message.id)));
    }
    let pubkey: XOnlyPublicKey = message
        .author
        .parse()
        .map_err(|e| Error::Key(format!("invalid author key: {}", e)))?;
    let sig: secp256k1::schnorr::Signature = message
        .sig
        .parse()
        .map_err(|e| Error::Key(format!("invalid signature: {}", e)))?;
    let msg = secp256k1::Message::from_digest(id_digest(&message.id)?);
    secp.verify_schnorr(&sig, &msg, &pubkey)
        .map_err(|e| Error::Key(format!("bad signature on {}: {}", message.id, e)))
}
