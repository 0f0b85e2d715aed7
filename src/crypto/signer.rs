use openssl::sign::Signer;

use super::SigningAlgorithm;
use super::errors::CryptoResult;
use super::rsa::RsaSigningKey;

/// Incremental signature accumulator.
///
/// The CRL rewriter produces the to-be-signed bytes piecemeal, so the
/// signer follows the same update/finalize shape: feed it every byte of
/// the TBSCertList TLV as it is emitted, then finish to obtain the raw
/// signature.
pub struct IncrementalSigner<'k> {
    inner: Signer<'k>,
}

impl<'k> IncrementalSigner<'k> {
    pub fn new(algorithm: SigningAlgorithm, key: &'k RsaSigningKey) -> CryptoResult<Self> {
        let inner = Signer::new(algorithm.message_digest(), key.pkey())?;
        Ok(Self { inner })
    }

    /// Absorb the next chunk of to-be-signed bytes.
    pub fn update(&mut self, data: &[u8]) -> CryptoResult<()> {
        self.inner.update(data)?;
        Ok(())
    }

    /// Produce the raw (unwrapped) signature over everything absorbed.
    pub fn finish(&mut self) -> CryptoResult<Vec<u8>> {
        Ok(self.inner.sign_to_vec()?)
    }
}
