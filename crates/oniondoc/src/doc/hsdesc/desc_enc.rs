//! Types and functions for descriptor encryption.

use oniondoc_hscrypto::{pk::HsBlindId, Subcredential};
use oniondoc_llcrypto::cipher::aes::Aes256Ctr as Cipher;
use oniondoc_llcrypto::d::Sha3_256 as Hash;
use oniondoc_llcrypto::d::Shake256 as KDF;
use oniondoc_llcrypto::util::ct::CtByteArray;

use cipher::{KeyIvInit, StreamCipher};
use digest::{ExtendableOutput, FixedOutput, Update, XofReader};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing as Z;

/// Length of our cryptographic salt.
pub(super) const SALT_LEN: usize = 16;
/// Length of our ersatz MAC.
pub(super) const MAC_LEN: usize = 32;

/// The alignment to which the plaintext is zero-padded before encryption,
/// to hide its size.
pub(super) const PLAINTEXT_ALIGN: usize = 10_000;

/// Parameters for encrypting or decrypting the body of a descriptor.
pub(super) struct HsDescEncryption<'a> {
    /// First part of the "SECRET_DATA" field: the blinded identity the
    /// descriptor is published under.
    pub(super) blinded_id: &'a HsBlindId,
    /// The "subcredential" of the onion service, mixed into the key
    /// derivation when client authorization is in use.
    ///
    /// Absent on the ordinary (non-client-auth) path.
    pub(super) subcredential: Option<&'a Subcredential>,
    /// A personalization string, fixed for this layer of the format.
    pub(super) string_const: &'a [u8],
}

impl<'a> HsDescEncryption<'a> {
    /// Length of our MAC key.
    const MAC_KEY_LEN: usize = 32;
    /// Length of the cipher key that we use.
    const CIPHER_KEY_LEN: usize = 32;
    /// Length of our cipher's IV.
    const IV_LEN: usize = 16;

    /// Encrypt a given bytestring using these encryption parameters.
    pub(super) fn encrypt<R: Rng + CryptoRng>(&self, rng: &mut R, data: &[u8]) -> Vec<u8> {
        let output_len = data.len() + SALT_LEN + MAC_LEN;
        let mut output = Vec::with_capacity(output_len);
        let salt: [u8; SALT_LEN] = rng.gen();

        let (mut cipher, mut mac) = self.init(&salt);

        output.extend_from_slice(&salt[..]);
        output.extend_from_slice(data);
        cipher.apply_keystream(&mut output[SALT_LEN..]);
        mac.update(&output[SALT_LEN..]);
        let mut mac_val = Default::default();
        mac.finalize_into(&mut mac_val);
        output.extend_from_slice(&mac_val);
        debug_assert_eq!(output.len(), output_len);

        output
    }

    /// Decrypt a given bytestring that was first encrypted using these
    /// encryption parameters.
    pub(super) fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, DecryptionError> {
        if data.len() < SALT_LEN + MAC_LEN {
            return Err(DecryptionError::default());
        }
        let msg_len = data.len() - SALT_LEN - MAC_LEN;

        let salt = data[0..SALT_LEN]
            .try_into()
            .expect("Failed try_into for 16-byte array.");
        let ciphertext = &data[SALT_LEN..(SALT_LEN + msg_len)];

        let expected_mac = CtByteArray::from(
            <[u8; MAC_LEN]>::try_from(&data[SALT_LEN + msg_len..SALT_LEN + msg_len + MAC_LEN])
                .expect("Failed try_into for 32-byte array."),
        );
        let (mut cipher, mut mac) = self.init(&salt);

        // Check the MAC before decrypting anything.
        mac.update(ciphertext);
        let mut received_mac = CtByteArray::from([0_u8; MAC_LEN]);
        mac.finalize_into(received_mac.as_mut().into());
        if received_mac != expected_mac {
            return Err(DecryptionError::default());
        }

        let mut decrypted = ciphertext.to_vec();
        cipher.apply_keystream(&mut decrypted[..]);

        Ok(decrypted)
    }

    /// Return the cryptographic objects that are used for en/decrypting
    /// and authenticating a descriptor body, given these parameters and a
    /// provided salt.
    ///
    /// `Hash` is the required intermediate value in the calculation of the
    /// MAC: it is in the state just after the salt has been added; the
    /// ciphertext should be added, and then it should be finalized.
    fn init(&self, salt: &[u8; SALT_LEN]) -> (Cipher, Hash) {
        let mut key_stream = self.get_kdf(salt).finalize_xof();

        let mut key = Z::new([0_u8; Self::CIPHER_KEY_LEN]);
        let mut iv = Z::new([0_u8; Self::IV_LEN]);
        let mut mac_key = Z::new([0_u8; Self::MAC_KEY_LEN]);
        key_stream.read(&mut key[..]);
        key_stream.read(&mut iv[..]);
        key_stream.read(&mut mac_key[..]);

        let cipher = Cipher::new(key.as_ref().into(), iv.as_ref().into());

        let mut mac = Hash::default();
        mac.update(&(Self::MAC_KEY_LEN as u64).to_be_bytes());
        mac.update(&mac_key[..]);
        mac.update(&(salt.len() as u64).to_be_bytes());
        mac.update(&salt[..]);

        (cipher, mac)
    }

    /// Return a KDF that can yield the keys to be used for encryption with
    /// these key parameters.
    fn get_kdf(&self, salt: &[u8; SALT_LEN]) -> KDF {
        let mut kdf = KDF::default();

        // secret_input = SECRET_DATA, where SECRET_DATA is the blinded
        // identity, followed by the subcredential when client
        // authorization is in use.
        kdf.update(self.blinded_id.as_ref());
        if let Some(subcredential) = self.subcredential {
            kdf.update(subcredential.as_ref());
        }

        // keys = KDF(secret_input | salt | STRING_CONSTANT)
        kdf.update(salt);
        kdf.update(self.string_const);

        kdf
    }
}

/// An error that occurs when decrypting a descriptor body.
///
/// This error is deliberately uninformative, to avoid side channels.
#[non_exhaustive]
#[derive(Clone, Debug, Default, thiserror::Error)]
#[error("Unable to decrypt onion service descriptor.")]
pub struct DecryptionError {}

/// Pad `v` with zero bytes to the next multiple of [`PLAINTEXT_ALIGN`].
///
/// (A length that is already a multiple of the alignment is unchanged; in
/// particular an empty input stays empty.)
pub(super) fn pad_with_zero_to_align(v: &mut Vec<u8>) {
    let padding = (PLAINTEXT_ALIGN - (v.len() % PLAINTEXT_ALIGN)) % PLAINTEXT_ALIGN;
    v.resize(v.len() + padding, 0);
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rand::SeedableRng as _;

    /// Encryption parameters over a fixed identity, with no subcredential.
    fn params<'a>(blinded_id: &'a HsBlindId) -> HsDescEncryption<'a> {
        HsDescEncryption {
            blinded_id,
            subcredential: None,
            string_const: b"greetings puny humans",
        }
    }

    #[test]
    fn roundtrip_basics() {
        let blinded_id = [7; 32].into();
        let params = params(&blinded_id);
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x1234);

        let bigmsg: Vec<u8> = (1..123).cycle().take(1021).collect();
        for message in [&b""[..], &b"hello world"[..], &bigmsg[..]] {
            let mut encrypted = params.encrypt(&mut rng, message);
            assert_eq!(encrypted.len(), message.len() + 48);
            let decrypted = params.decrypt(&encrypted[..]).unwrap();
            assert_eq!(message, &decrypted);

            // Make sure we can't decrypt a partial input.
            let decryption_err = params.decrypt(&encrypted[..encrypted.len() - 1]);
            assert!(decryption_err.is_err());
            // Frob a point in the encrypted form and ensure we won't
            // decrypt.
            encrypted[7] ^= 3;
            let decryption_err = params.decrypt(&encrypted[..]);
            assert!(decryption_err.is_err());
        }
    }

    #[test]
    fn too_short() {
        let blinded_id = [7; 32].into();
        let params = params(&blinded_id);

        assert!(params.decrypt(b"").is_err());
        assert!(params.decrypt(&[0_u8; 47]).is_err());
    }

    #[test]
    fn subcredential_changes_keys() {
        let blinded_id = [7; 32].into();
        let subcredential = [11; 32].into();
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5678);

        let with_subcred = HsDescEncryption {
            blinded_id: &blinded_id,
            subcredential: Some(&subcredential),
            string_const: b"greetings puny humans",
        };
        let encrypted = with_subcred.encrypt(&mut rng, b"sekrit");

        // Without the subcredential, the MAC check must fail.
        assert!(params(&blinded_id).decrypt(&encrypted).is_err());
        assert_eq!(
            with_subcred.decrypt(&encrypted).unwrap(),
            b"sekrit".to_vec()
        );
    }

    #[test]
    fn padding_law() {
        for (input_len, expected) in [
            (0_usize, 0_usize),
            (1, 10_000),
            (9_999, 10_000),
            (10_000, 10_000),
            (10_001, 20_000),
            (25_000, 30_000),
        ] {
            let mut v = vec![3_u8; input_len];
            pad_with_zero_to_align(&mut v);
            assert_eq!(v.len(), expected);
            assert!(v.len() >= input_len);
            // Padding bytes are zero.
            assert!(v[input_len..].iter().all(|b| *b == 0));
        }
    }
}
