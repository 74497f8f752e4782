use alloy::primitives::{Address, B256, Bytes, keccak256};
use alloy::signers::{Signer as AlloySigner, local::PrivateKeySigner};
use alloy::sol_types::SolStruct;

use crate::abi::{AssetsBuyTypedData, AssetsSoldTypedData};
use crate::error::{RelayerError, Result};

/// Computes the EIP-712 digest for a Buy or Sell relay and signs it with the
/// operator key:
///
/// ```text
/// digest = keccak256(0x19 || 0x01 || domainSeparator || structHash)
/// ```
///
/// `domainSeparator` is supplied by the caller (read from the destination
/// contract's `DOMAIN_SEPARATOR()`), not recomputed locally — the contract is
/// the source of truth for its own domain.
pub struct Signer {
    wallet: PrivateKeySigner,
}

impl Signer {
    pub fn new(wallet: PrivateKeySigner) -> Self {
        Self { wallet }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub async fn sign_buy(&self, domain_separator: B256, data: &AssetsBuyTypedData) -> Result<Bytes> {
        self.sign(domain_separator, data.eip712_hash_struct()).await
    }

    pub async fn sign_sell(&self, domain_separator: B256, data: &AssetsSoldTypedData) -> Result<Bytes> {
        self.sign(domain_separator, data.eip712_hash_struct()).await
    }

    async fn sign(&self, domain_separator: B256, struct_hash: B256) -> Result<Bytes> {
        let digest = digest(domain_separator, struct_hash);

        let signature = self
            .wallet
            .sign_hash(&digest)
            .await
            .map_err(|e| RelayerError::Chain(e.into()))?;

        let recovered = signature
            .recover_address_from_prehash(&digest)
            .map_err(|e| RelayerError::Chain(e.into()))?;

        if recovered != self.wallet.address() {
            tracing::error!(
                expected = %self.wallet.address(),
                recovered = %recovered,
                "EIP-712 signature recovery mismatch"
            );
            return Err(RelayerError::SignatureMismatch);
        }

        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }
}

fn digest(domain_separator: B256, struct_hash: B256) -> B256 {
    let mut preimage = Vec::with_capacity(2 + 32 + 32);
    preimage.extend_from_slice(&[0x19, 0x01]);
    preimage.extend_from_slice(domain_separator.as_slice());
    preimage.extend_from_slice(struct_hash.as_slice());
    keccak256(preimage)
}
