//! Key type wrappers of various kinds used in onion services.
//
// NOTE: We define wrappers here as a safety net against confusing one kind
// of key for another: without a system like this, it can get pretty hard
// making sure that each key is used only in the right way.

use oniondoc_llcrypto::pk::keymanip::{blind_keypair, blind_pubkey, BlindingError};
use oniondoc_llcrypto::pk::{curve25519, ed25519};
use oniondoc_llcrypto::util::ct::CtByteArray;

/// The identity of an onion service, expanded into a public key.
///
/// This key is not used to sign or validate anything on its own; instead,
/// it is used to derive a [`HsBlindIdKey`] for each time period.
#[derive(Clone, Debug, derive_more::From, derive_more::Into, derive_more::AsRef)]
pub struct HsIdKey(ed25519::PublicKey);

impl HsIdKey {
    /// Derive the blinded identity key for this identity, given the
    /// per-period blinding parameter `h`.
    pub fn compute_blinded_key(&self, h: [u8; 32]) -> Result<HsBlindIdKey, BlindingError> {
        blind_pubkey(&self.0, h).map(HsBlindIdKey)
    }
}

/// The long-term signing keypair of an onion service.
pub struct HsIdKeypair(ed25519::ExpandedKeypair);

impl HsIdKeypair {
    /// Return the public part of this identity.
    pub fn public(&self) -> HsIdKey {
        HsIdKey(*self.0.public())
    }

    /// Derive the blinded signing keypair for this identity, given the
    /// per-period blinding parameter `h`.
    pub fn compute_blinded_key(&self, h: [u8; 32]) -> Result<HsBlindIdKeypair, BlindingError> {
        blind_keypair(&self.0, h).map(HsBlindIdKeypair)
    }
}

impl From<ed25519::ExpandedKeypair> for HsIdKeypair {
    fn from(inner: ed25519::ExpandedKeypair) -> Self {
        HsIdKeypair(inner)
    }
}

/// The "blinded" identity of an onion service, as a checked public key.
///
/// This key is derived via a one-way transformation from an [`HsIdKey`] and
/// the current time period.  Descriptors are signed under it so that
/// directory servers cannot link one period's descriptors to another's.
#[derive(Clone, Debug, derive_more::From, derive_more::Into, derive_more::AsRef)]
pub struct HsBlindIdKey(ed25519::PublicKey);

impl HsBlindIdKey {
    /// Return a compact identity for this key.
    pub fn id(&self) -> HsBlindId {
        HsBlindId::from(ed25519::Ed25519Identity::from(&self.0))
    }
}

/// The keypair for a blinded identity, able to sign descriptor-signing-key
/// certificates.
pub struct HsBlindIdKeypair(ed25519::ExpandedKeypair);

impl HsBlindIdKeypair {
    /// Return the public part of this keypair.
    pub fn public(&self) -> HsBlindIdKey {
        HsBlindIdKey(*self.0.public())
    }

    /// Return a reference to the underlying expanded keypair, for use when
    /// signing.
    pub fn as_expanded(&self) -> &ed25519::ExpandedKeypair {
        &self.0
    }
}

impl From<ed25519::ExpandedKeypair> for HsBlindIdKeypair {
    fn from(inner: ed25519::ExpandedKeypair) -> Self {
        HsBlindIdKeypair(inner)
    }
}

/// A blinded onion service identity, represented in a compact format.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HsBlindId(CtByteArray<32>);

impl AsRef<[u8; 32]> for HsBlindId {
    fn as_ref(&self) -> &[u8; 32] {
        self.0.as_ref()
    }
}

impl From<[u8; 32]> for HsBlindId {
    fn from(bytes: [u8; 32]) -> Self {
        HsBlindId(bytes.into())
    }
}

impl From<ed25519::Ed25519Identity> for HsBlindId {
    fn from(id: ed25519::Ed25519Identity) -> Self {
        HsBlindId(<[u8; 32]>::from(id).into())
    }
}

impl From<&HsBlindIdKey> for HsBlindId {
    fn from(key: &HsBlindIdKey) -> Self {
        key.id()
    }
}

/// A key used to identify and authenticate an onion service at a single
/// introduction point.
///
/// This key is included in the onion service's descriptor; a different one
/// is used at each introduction point.  Introduction points don't know the
/// relation of this key to the onion service: they only recognize the same
/// key when they see it again.
#[derive(Clone, Debug, PartialEq, Eq, derive_more::From, derive_more::Into, derive_more::AsRef)]
pub struct HsIntroAuthKey(ed25519::PublicKey);

/// A key used to encrypt a client's first message to the onion service
/// when using a given introduction point.
///
/// The onion service chooses a different one of these to use with each
/// introduction point, though it does not need to tell the introduction
/// points about these keys.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, derive_more::From, derive_more::Into, derive_more::AsRef,
)]
pub struct HsIntroEncKey(curve25519::PublicKey);

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use oniondoc_llcrypto::pk::ed25519::{ExpandedKeypair, Keypair, Verifier as _};

    #[test]
    fn blinded_id_round_trip() {
        let mut rng = rand::rngs::OsRng;
        let id = Keypair::generate(&mut rng);
        let id_keypair = HsIdKeypair::from(ExpandedKeypair::from(&id));

        let h = [5_u8; 32];
        let blinded_pk = id_keypair.public().compute_blinded_key(h).unwrap();
        let blinded_kp = id_keypair.compute_blinded_key(h).unwrap();

        assert_eq!(blinded_pk.id(), blinded_kp.public().id());

        let msg = b"minimal descriptor";
        let sig = blinded_kp.as_expanded().sign(msg);
        let pk: &ed25519::PublicKey = blinded_pk.as_ref();
        assert!(pk.verify(msg, &sig).is_ok());
    }
}
