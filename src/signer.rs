//! Signer provisioning.
//!
//! Binds a signing identity to the cycle. Two mutually exclusive
//! modes: a local keypair loaded from a wallet-state file, or a
//! hardware wallet whose signing is delegated to an external flow (no
//! private key ever materializes in this process). The handle is
//! cycle-scoped: it is provisioned at the start of a cycle, owned by
//! that cycle alone, and dropped when the cycle ends so concurrent
//! cycles can never race on transaction ordering.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use chrono::Utc;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::types::{SignerMode, TraderError};

// ---------------------------------------------------------------------------
// Wallet state file
// ---------------------------------------------------------------------------

/// On-disk wallet state (local mode only). The wallet must be
/// externally pre-funded before live trading.
#[derive(Debug, Serialize, Deserialize)]
struct WalletFile {
    mode: SignerMode,
    address: String,
    private_key_hex: String,
    created_at: String,
}

// ---------------------------------------------------------------------------
// Signer handle
// ---------------------------------------------------------------------------

/// A provisioned signing identity. Closed tagged variant — no open
/// polymorphism, just the two supported modes behind one capability
/// query.
pub enum SignerHandle {
    /// Local keypair. Owns key material for the duration of the cycle.
    Local {
        address: String,
        private_key: Secret<String>,
    },
    /// Hardware wallet. Holds an address only; signing is delegated.
    Ledger { address: String },
}

impl SignerHandle {
    pub fn mode(&self) -> SignerMode {
        match self {
            SignerHandle::Local { .. } => SignerMode::Local,
            SignerHandle::Ledger { .. } => SignerMode::Ledger,
        }
    }

    pub fn address(&self) -> &str {
        match self {
            SignerHandle::Local { address, .. } => address,
            SignerHandle::Ledger { address } => address,
        }
    }

    /// Capability query consumed by the live guard. A provisioned
    /// handle of either mode can sign (locally or by delegation);
    /// provisioning itself fails when the configured mode can't
    /// produce a usable signer.
    pub fn can_sign(&self) -> bool {
        match self {
            SignerHandle::Local { private_key, .. } => !private_key.expose_secret().is_empty(),
            SignerHandle::Ledger { address } => !address.is_empty(),
        }
    }
}

// Key material must never leak through debug logging.
impl std::fmt::Debug for SignerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignerHandle::Local { address, .. } => f
                .debug_struct("SignerHandle::Local")
                .field("address", address)
                .field("private_key", &"<redacted>")
                .finish(),
            SignerHandle::Ledger { address } => f
                .debug_struct("SignerHandle::Ledger")
                .field("address", address)
                .finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Provisioning
// ---------------------------------------------------------------------------

/// Provision a signer for one cycle.
///
/// Local mode loads the wallet-state file at `wallet_path`; ledger
/// mode validates `ledger_address`. Either failure is a
/// `SignerCapability` error, raised before any chain interaction.
pub fn provision(
    mode: SignerMode,
    wallet_path: &Path,
    ledger_address: Option<&str>,
) -> Result<SignerHandle, TraderError> {
    match mode {
        SignerMode::Local => load_local_wallet(wallet_path),
        SignerMode::Ledger => {
            let address = ledger_address.unwrap_or_default().trim();
            if address.is_empty() {
                return Err(TraderError::SignerCapability {
                    mode,
                    reason: "ledger mode requires --ledger-address or wallet.ledger_address"
                        .to_string(),
                });
            }
            let parsed = Address::from_str(address).map_err(|e| TraderError::SignerCapability {
                mode,
                reason: format!("malformed ledger address '{address}': {e}"),
            })?;
            info!(address = %parsed, "Ledger signer provisioned (delegated signing)");
            Ok(SignerHandle::Ledger {
                address: parsed.to_checksum(None),
            })
        }
    }
}

fn load_local_wallet(wallet_path: &Path) -> Result<SignerHandle, TraderError> {
    let mode = SignerMode::Local;
    if !wallet_path.exists() {
        return Err(TraderError::SignerCapability {
            mode,
            reason: format!(
                "wallet file not found: {}. Run `init-wallet` first",
                wallet_path.display()
            ),
        });
    }

    let contents = std::fs::read_to_string(wallet_path).map_err(|e| {
        TraderError::SignerCapability {
            mode,
            reason: format!("failed to read wallet file: {e}"),
        }
    })?;
    let wallet: WalletFile =
        serde_json::from_str(&contents).map_err(|e| TraderError::SignerCapability {
            mode,
            reason: format!("malformed wallet file: {e}"),
        })?;

    if wallet.address.is_empty() || wallet.private_key_hex.is_empty() {
        return Err(TraderError::SignerCapability {
            mode,
            reason: "wallet file is missing required fields".to_string(),
        });
    }

    // The stored key must actually correspond to the stored address.
    let signer = PrivateKeySigner::from_str(wallet.private_key_hex.trim_start_matches("0x"))
        .map_err(|e| TraderError::SignerCapability {
            mode,
            reason: format!("wallet private key is invalid: {e}"),
        })?;
    let derived = signer.address();
    let stored = Address::from_str(&wallet.address).map_err(|e| TraderError::SignerCapability {
        mode,
        reason: format!("wallet address is invalid: {e}"),
    })?;
    if derived != stored {
        return Err(TraderError::SignerCapability {
            mode,
            reason: "wallet address does not match its private key".to_string(),
        });
    }

    info!(address = %derived, "Local signer provisioned");
    Ok(SignerHandle::Local {
        address: derived.to_checksum(None),
        private_key: Secret::new(wallet.private_key_hex),
    })
}

// ---------------------------------------------------------------------------
// Wallet initialisation
// ---------------------------------------------------------------------------

/// Generate a fresh local wallet and write it to `wallet_path`
/// (permissions 0600 on unix). Returns the new address. The wallet
/// must be funded before live trading.
pub fn init_wallet(wallet_path: &Path) -> Result<String, TraderError> {
    let signer = PrivateKeySigner::random();
    let address = signer.address().to_checksum(None);
    let private_key_hex = format!("0x{}", hex_encode(signer.to_bytes().as_slice()));

    let wallet = WalletFile {
        mode: SignerMode::Local,
        address: address.clone(),
        private_key_hex,
        created_at: Utc::now().to_rfc3339(),
    };

    if let Some(parent) = wallet_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| TraderError::Config(format!(
                "failed to create wallet directory: {e}"
            )))?;
        }
    }

    let json = serde_json::to_string_pretty(&wallet)
        .map_err(|e| TraderError::Config(format!("failed to serialise wallet: {e}")))?;
    std::fs::write(wallet_path, format!("{json}\n"))
        .map_err(|e| TraderError::Config(format!("failed to write wallet file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(wallet_path, std::fs::Permissions::from_mode(0o600))
        {
            warn!(error = %e, "Could not restrict wallet file permissions");
        }
    }

    info!(
        path = %wallet_path.display(),
        address = %address,
        "Local wallet generated. Fund this wallet before live trading and keep the key secure."
    );
    Ok(address)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
