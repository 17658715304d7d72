use bip32::DerivationPath;
use bip39::Mnemonic;
use cosmrs::{
    crypto::secp256k1::{Signature as CosmosSignature, SigningKey},
    crypto::PublicKey,
    tx::{BodyBuilder, Fee, Raw, SignDoc, SignerInfo},
    AccountId, Coin as CosmosCoin, Denom,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::error::Error;

/// HD Path prefix for Cosmos chains (BIP-44)
const HD_PATH_PREFIX: &str = "m/44'/118'/0'/0/";

/// Credential material a session can be opened from
pub enum CredentialSource {
    /// BIP-39 phrase and the account index to derive
    Mnemonic {
        phrase: SecretString,
        account_index: u32,
    },
    /// Hex-encoded secp256k1 private key
    PrivateKey(SecretString),
}

impl CredentialSource {
    /// First account of a mnemonic
    pub fn mnemonic(phrase: impl Into<String>) -> Self {
        Self::Mnemonic {
            phrase: SecretString::new(phrase.into()),
            account_index: 0,
        }
    }

    pub fn mnemonic_with_index(phrase: impl Into<String>, account_index: u32) -> Self {
        Self::Mnemonic {
            phrase: SecretString::new(phrase.into()),
            account_index,
        }
    }

    pub fn private_key_hex(key: impl Into<String>) -> Self {
        Self::PrivateKey(SecretString::new(key.into()))
    }

    /// Derive the signing wallet for `account_prefix`
    pub fn into_wallet(self, account_prefix: &str) -> Result<DexterWallet, Error> {
        match self {
            CredentialSource::Mnemonic {
                phrase,
                account_index,
            } => DexterWallet::from_mnemonic(phrase.expose_secret(), account_index, account_prefix),
            CredentialSource::PrivateKey(key) => {
                DexterWallet::from_private_key_hex(key.expose_secret(), account_prefix)
            }
        }
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Mnemonic { account_index, .. } => f
                .debug_struct("Mnemonic")
                .field("account_index", account_index)
                .finish_non_exhaustive(),
            CredentialSource::PrivateKey(_) => f.write_str("PrivateKey(..)"),
        }
    }
}

/// Wallet holding one secp256k1 signing key
///
/// The key zeroes itself when the wallet is dropped.
pub struct DexterWallet {
    signing_account: SigningKey,
    account_prefix: String,
}

// Note: DexterWallet intentionally does not implement Clone
// The signing key should not be easily duplicated

impl fmt::Debug for DexterWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DexterWallet")
            .field("account_prefix", &self.account_prefix)
            .field(
                "public_key",
                &hex::encode(self.signing_account.public_key().to_bytes()),
            )
            .finish()
    }
}

/// Wallet info that can be serialized safely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    /// The wallet address
    pub address: String,
    /// The public key as hex
    pub public_key: String,
}

impl DexterWallet {
    /// Create a new wallet from a mnemonic
    pub fn from_mnemonic(
        mnemonic: &str,
        account_index: u32,
        account_prefix: &str,
    ) -> Result<Self, Error> {
        let mnemonic = Mnemonic::from_str(mnemonic.trim())
            .map_err(|e| Error::Wallet(format!("Invalid mnemonic: {}", e)))?;

        // Seed zeroes itself on drop
        let seed = bip32::Seed::new(mnemonic.to_seed(""));

        let path = format!("{}{}", HD_PATH_PREFIX, account_index);
        let path = DerivationPath::from_str(&path)
            .map_err(|e| Error::Wallet(format!("Invalid derivation path: {}", e)))?;

        let derived_key = bip32::XPrv::derive_from_path(seed.as_bytes(), &path)
            .map_err(|e| Error::Wallet(format!("Key derivation error: {}", e)))?;

        let derived_key_bytes = Zeroizing::new(derived_key.to_bytes());
        let signing_account = SigningKey::from_slice(derived_key_bytes.as_slice())
            .map_err(|e| Error::Wallet(format!("Failed to create signing account: {}", e)))?;

        Self::with_key(signing_account, account_prefix)
    }

    /// Create a wallet from a hex-encoded private key
    pub fn from_private_key_hex(key: &str, account_prefix: &str) -> Result<Self, Error> {
        let key = key.trim().trim_start_matches("0x");
        let bytes = Zeroizing::new(
            hex::decode(key).map_err(|e| Error::Wallet(format!("Invalid private key hex: {}", e)))?,
        );
        if bytes.len() != 32 {
            return Err(Error::Wallet(format!(
                "Private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }

        let signing_account = SigningKey::from_slice(bytes.as_slice())
            .map_err(|e| Error::Wallet(format!("Invalid private key: {}", e)))?;

        Self::with_key(signing_account, account_prefix)
    }

    fn with_key(signing_account: SigningKey, account_prefix: &str) -> Result<Self, Error> {
        if account_prefix.is_empty() {
            return Err(Error::Wallet("Account prefix cannot be empty".to_string()));
        }
        let wallet = Self {
            signing_account,
            account_prefix: account_prefix.to_string(),
        };
        // Fail early on prefixes bech32 cannot encode
        wallet.address()?;
        Ok(wallet)
    }

    /// Generate a new random wallet, returning it with its phrase
    pub fn generate(account_prefix: &str) -> Result<(Self, SecretString), Error> {
        use rand::{thread_rng, RngCore};

        // 16 bytes of entropy for a 12-word mnemonic
        let mut entropy = Zeroizing::new([0u8; 16]);
        thread_rng().fill_bytes(&mut entropy[..]);

        let mnemonic = Mnemonic::from_entropy(&entropy[..])
            .map_err(|e| Error::Wallet(format!("Failed to generate mnemonic: {}", e)))?;

        let phrase = SecretString::new(mnemonic.to_string());
        let wallet = Self::from_mnemonic(phrase.expose_secret(), 0, account_prefix)?;

        Ok((wallet, phrase))
    }

    /// Get the wallet's address
    pub fn address(&self) -> Result<AccountId, Error> {
        self.signing_account
            .public_key()
            .account_id(&self.account_prefix)
            .map_err(|e| Error::Wallet(format!("Failed to get account ID: {}", e)))
    }

    pub fn public_key(&self) -> PublicKey {
        self.signing_account.public_key()
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_account
    }

    pub fn account_prefix(&self) -> &str {
        &self.account_prefix
    }

    /// Sign a transaction doc
    pub fn sign_doc(&self, sign_doc: SignDoc) -> Result<CosmosSignature, Error> {
        let sign_doc_bytes = sign_doc
            .into_bytes()
            .map_err(|e| Error::Wallet(format!("Failed to convert sign doc to bytes: {}", e)))?;
        self.signing_account
            .sign(&sign_doc_bytes)
            .map_err(|e| Error::Wallet(format!("Signing error: {}", e)))
    }

    /// Prepare and sign a transaction with body and auth info
    #[allow(clippy::too_many_arguments)]
    pub fn sign_tx(
        &self,
        account_number: u64,
        sequence: u64,
        chain_id: &str,
        fee: Fee,
        msgs: Vec<cosmrs::Any>,
        timeout_height: Option<u32>,
        memo: Option<String>,
    ) -> Result<Raw, Error> {
        let mut body_builder = BodyBuilder::new();
        body_builder.msgs(msgs);

        if let Some(memo_text) = memo {
            body_builder.memo(memo_text);
        }

        if let Some(height) = timeout_height {
            body_builder.timeout_height(height);
        }

        let tx_body = body_builder.finish();

        let signer_info = SignerInfo::single_direct(Some(self.public_key()), sequence);
        let auth_info = signer_info.auth_info(fee);

        let chain_id = cosmrs::tendermint::chain::Id::from_str(chain_id)
            .map_err(|e| Error::Wallet(format!("Invalid chain ID: {}", e)))?;

        let sign_doc = SignDoc::new(&tx_body, &auth_info, &chain_id, account_number)
            .map_err(|e| Error::Wallet(format!("Failed to create sign doc: {}", e)))?;

        sign_doc
            .sign(&self.signing_account)
            .map_err(|e| Error::Wallet(format!("Failed to sign transaction: {}", e)))
    }

    /// Get wallet info
    pub fn info(&self) -> Result<WalletInfo, Error> {
        Ok(WalletInfo {
            address: self.address()?.to_string(),
            public_key: hex::encode(self.signing_account.public_key().to_bytes()),
        })
    }

    /// Create a fee object for transactions
    pub fn create_fee(&self, amount: u128, gas_limit: u64, denom: &str) -> Result<Fee, Error> {
        let denom =
            Denom::from_str(denom).map_err(|e| Error::Wallet(format!("Invalid denom: {}", e)))?;

        let coin = CosmosCoin { amount, denom };

        Ok(Fee::from_amount_and_gas(coin, gas_limit))
    }
}
