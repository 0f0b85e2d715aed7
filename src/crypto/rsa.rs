use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;

use super::errors::{CryptoResult, Error};

/// RSA private key used to re-sign a CRL.
///
/// Any modulus size OpenSSL accepts is usable; the rewriter only needs
/// the modulus width to size the replacement signature, so a key larger
/// or smaller than the one that signed the original CRL is fine.
#[derive(Debug, Clone)]
pub struct RsaSigningKey {
    key: PKey<Private>,
}

impl RsaSigningKey {
    /// Generate a fresh key of the given modulus size in bits.
    pub fn generate(bits: u32) -> CryptoResult<Self> {
        let rsa = Rsa::generate(bits)?;
        let key = PKey::from_rsa(rsa)?;
        Ok(Self { key })
    }

    /// Load from PEM-encoded PKCS#1/PKCS#8.
    pub fn from_pem(pem_bytes: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let key = PKey::private_key_from_pem(pem_bytes.as_ref())?;
        Self::from_pkey(key)
    }

    /// Load from DER-encoded PKCS#1/PKCS#8.
    pub fn from_der(der_bytes: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let key = PKey::private_key_from_der(der_bytes.as_ref())?;
        Self::from_pkey(key)
    }

    /// Wrap an existing OpenSSL key; it must carry an RSA key.
    pub fn from_pkey(key: PKey<Private>) -> CryptoResult<Self> {
        key.rsa()
            .map_err(|_| Error::InvalidKey("not an RSA private key".into()))?;
        Ok(Self { key })
    }

    /// Modulus width in bytes; an RSA signature is always padded out to
    /// exactly this length.
    pub fn modulus_len(&self) -> CryptoResult<usize> {
        Ok(self.key.rsa()?.size() as usize)
    }

    /// The corresponding public key in SubjectPublicKeyInfo DER form.
    pub fn public_key_der(&self) -> CryptoResult<Vec<u8>> {
        Ok(self.key.public_key_to_der()?)
    }

    /// Get the underlying OpenSSL private key
    pub(crate) fn pkey(&self) -> &PKey<Private> {
        &self.key
    }
}
