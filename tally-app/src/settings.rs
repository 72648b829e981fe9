//! Environment configuration for the console
//!
//! Everything is read once at startup. Endpoints fall back to local
//! defaults; the Solana program id falls back only on devnet, because
//! silently guessing the program on testnet or mainnet would submit
//! orders to the wrong network.

use std::fmt;
use std::str::FromStr;

use tally_core::{TallyError, TallyResult};
use tally_exchange::DEFAULT_API_URL;
use tally_signaling::DEFAULT_WS_URL;

/// Program id used on devnet when PROGRAM_ID is not set
pub const DEVNET_PROGRAM_ID: &str = "BKck65TgoKRokMjQM3datB9oRwJ8rAj2jxPXvHXUvcL6";

/// Solana cluster the console submits to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolanaNetwork {
    Devnet,
    Testnet,
    MainnetBeta,
}

impl SolanaNetwork {
    /// Canonical network name
    pub fn as_str(&self) -> &'static str {
        match self {
            SolanaNetwork::Devnet => "devnet",
            SolanaNetwork::Testnet => "testnet",
            SolanaNetwork::MainnetBeta => "mainnet-beta",
        }
    }

    /// Public RPC endpoint for the cluster, used when no override is set
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            SolanaNetwork::Devnet => "https://api.devnet.solana.com",
            SolanaNetwork::Testnet => "https://api.testnet.solana.com",
            SolanaNetwork::MainnetBeta => "https://api.mainnet-beta.solana.com",
        }
    }
}

impl Default for SolanaNetwork {
    fn default() -> Self {
        SolanaNetwork::Devnet
    }
}

impl fmt::Display for SolanaNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SolanaNetwork {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "devnet" => Ok(SolanaNetwork::Devnet),
            "testnet" => Ok(SolanaNetwork::Testnet),
            "mainnet-beta" => Ok(SolanaNetwork::MainnetBeta),
            other => Err(TallyError::config(format!(
                "unknown SOLANA_NETWORK '{}'; expected devnet, testnet, or mainnet-beta",
                other
            ))),
        }
    }
}

/// Startup configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Realtime gateway endpoint
    pub ws_url: String,
    /// Exchange REST API base
    pub api_url: String,
    /// Solana cluster
    pub network: SolanaNetwork,
    /// RPC endpoint, overridden or the cluster default
    pub rpc_url: String,
    /// On-chain program id orders settle against
    pub program_id: String,
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> TallyResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Tests inject a map
    /// instead of mutating the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> TallyResult<Self> {
        let ws_url = get("WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        let api_url = get("API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let network = match get("SOLANA_NETWORK") {
            Some(raw) => raw.parse()?,
            None => SolanaNetwork::default(),
        };
        let rpc_url = get("SOLANA_RPC_URL").unwrap_or_else(|| network.default_rpc_url().to_string());

        let program_id = match get("PROGRAM_ID") {
            Some(id) => id,
            None if network == SolanaNetwork::Devnet => DEVNET_PROGRAM_ID.to_string(),
            None => {
                return Err(TallyError::config(format!(
                    "PROGRAM_ID must be set for {}; there is no default program on that network",
                    network
                )))
            }
        };

        Ok(Self {
            ws_url,
            api_url,
            network,
            rpc_url,
            program_id,
        })
    }
}
