//! RSA PKCS#1 v1.5 batch encryption.
//!
//! A payload longer than one RSA block is split into chunks of
//! `key_size - 11` bytes; each chunk is encrypted separately and the
//! ciphertexts (each exactly `key_size` bytes) are concatenated.

use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::error::TransportError;

/// PKCS#1 v1.5 padding overhead per block.
const PADDING_OVERHEAD: usize = 11;

/// Public key used by the agent to encrypt batches.
#[derive(Debug, Clone)]
pub struct EncryptionKey(RsaPublicKey);

impl EncryptionKey {
    /// Parse a PEM `PUBLIC KEY` (SPKI) or `RSA PUBLIC KEY` (PKCS#1) block.
    pub fn from_pem(pem: &str) -> Result<Self, TransportError> {
        RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map(Self)
            .map_err(|e| TransportError::Key(format!("invalid public key: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, TransportError> {
        let pem = std::fs::read_to_string(path)
            .map_err(|e| TransportError::Key(format!("{}: {e}", path.display())))?;
        Self::from_pem(&pem)
    }

    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, TransportError> {
        let key_size = self.0.size();
        let chunk_size = key_size - PADDING_OVERHEAD;
        let mut rng = rand::thread_rng();
        let mut out = Vec::with_capacity(data.len().div_ceil(chunk_size) * key_size);
        for chunk in data.chunks(chunk_size) {
            let encrypted = self
                .0
                .encrypt(&mut rng, Pkcs1v15Encrypt, chunk)
                .map_err(|e| TransportError::Crypto(e.to_string()))?;
            out.extend_from_slice(&encrypted);
        }
        Ok(out)
    }
}

impl From<RsaPublicKey> for EncryptionKey {
    fn from(key: RsaPublicKey) -> Self {
        Self(key)
    }
}

/// Private key used by the server to decrypt batches.
#[derive(Debug, Clone)]
pub struct DecryptionKey(RsaPrivateKey);

impl DecryptionKey {
    /// Parse a PEM `RSA PRIVATE KEY` (PKCS#1) or `PRIVATE KEY` (PKCS#8) block.
    pub fn from_pem(pem: &str) -> Result<Self, TransportError> {
        RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map(Self)
            .map_err(|e| TransportError::Key(format!("invalid private key: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, TransportError> {
        let pem = std::fs::read_to_string(path)
            .map_err(|e| TransportError::Key(format!("{}: {e}", path.display())))?;
        Self::from_pem(&pem)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, TransportError> {
        let key_size = self.0.size();
        if data.len() % key_size != 0 {
            return Err(TransportError::Crypto(format!(
                "ciphertext length {} is not a multiple of the key size {key_size}",
                data.len()
            )));
        }
        let mut out = Vec::with_capacity(data.len());
        for chunk in data.chunks(key_size) {
            let plain = self
                .0
                .decrypt(Pkcs1v15Encrypt, chunk)
                .map_err(|e| TransportError::Crypto(e.to_string()))?;
            out.extend_from_slice(&plain);
        }
        Ok(out)
    }
}

impl From<RsaPrivateKey> for DecryptionKey {
    fn from(key: RsaPrivateKey) -> Self {
        Self(key)
    }
}
