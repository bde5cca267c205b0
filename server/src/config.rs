//! Configuration management

use anyhow::{bail, Context, Result};
use deepchain_ledger::primitives::{Address, U256};
use deepchain_ledger::{AssetId, ChainConfig};
use std::env;

/// Devnet defaults for the fixed system accounts.
const DEFAULT_OWNER: &str = "0x00000000000000000000000000000000000000a1";
const DEFAULT_BRIDGE: &str = "0x00000000000000000000000000000000000000b1";
const DEFAULT_REPUTATION: &str = "0x00000000000000000000000000000000000000b2";
const DEFAULT_STAKING_TOKEN: &str = "0x00000000000000000000000000000000000000c1";

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub chain_id: u64,
    pub owner_address: Address,
    pub bridge_address: Address,
    pub reputation_address: Address,
    pub oracle_address: Address,
    pub validator_address: Address,
    pub staking_token: Address,
    pub cross_chain_fee_bps: u64,
    /// Assets registered on the bridge at genesis.
    pub registered_tokens: Vec<(AssetId, String)>,
    /// Native balances at genesis.
    pub genesis_balances: Vec<(Address, U256)>,
    /// `(token, holder, amount)` balances at genesis.
    pub genesis_tokens: Vec<(Address, Address, U256)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| lookup(key).with_context(|| format!("{} is required", key));

        let config = Self {
            port: var("PORT", "8080").parse().context("Invalid PORT")?,

            chain_id: var("CHAIN_ID", "31337")
                .parse()
                .context("Invalid CHAIN_ID")?,

            owner_address: parse_address(&var("OWNER_ADDRESS", DEFAULT_OWNER))
                .context("Invalid OWNER_ADDRESS")?,

            bridge_address: parse_address(&var("BRIDGE_ADDRESS", DEFAULT_BRIDGE))
                .context("Invalid BRIDGE_ADDRESS")?,

            reputation_address: parse_address(&var("REPUTATION_ADDRESS", DEFAULT_REPUTATION))
                .context("Invalid REPUTATION_ADDRESS")?,

            oracle_address: parse_address(&required("ORACLE_ADDRESS")?)
                .context("Invalid ORACLE_ADDRESS")?,

            validator_address: parse_address(&required("VALIDATOR_ADDRESS")?)
                .context("Invalid VALIDATOR_ADDRESS")?,

            staking_token: parse_address(&var("STAKING_TOKEN", DEFAULT_STAKING_TOKEN))
                .context("Invalid STAKING_TOKEN")?,

            cross_chain_fee_bps: var("CROSS_CHAIN_FEE_BPS", "50")
                .parse()
                .context("Invalid CROSS_CHAIN_FEE_BPS")?,

            registered_tokens: parse_list(&var("REGISTERED_TOKENS", ""), |item| {
                let (asset, symbol) = split_pair(item)?;
                Ok((AssetId::from(parse_address(asset)?), symbol.to_string()))
            })
            .context("Invalid REGISTERED_TOKENS")?,

            genesis_balances: parse_list(&var("GENESIS_BALANCES", ""), |item| {
                let (account, amount) = split_pair(item)?;
                Ok((parse_address(account)?, parse_amount(amount)?))
            })
            .context("Invalid GENESIS_BALANCES")?,

            genesis_tokens: parse_list(&var("GENESIS_TOKENS", ""), |item| {
                let parts: Vec<&str> = item.split(':').collect();
                let [token, holder, amount] = parts.as_slice() else {
                    bail!("expected token:holder:amount, got {}", item);
                };
                Ok((parse_address(token)?, parse_address(holder)?, parse_amount(amount)?))
            })
            .context("Invalid GENESIS_TOKENS")?,
        };

        if config.oracle_address.is_zero() {
            bail!("ORACLE_ADDRESS must not be the zero address");
        }
        Ok(config)
    }

    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            chain_id: self.chain_id,
            owner: self.owner_address,
            bridge_address: self.bridge_address,
            reputation_address: self.reputation_address,
            oracle: self.oracle_address,
            validator: self.validator_address,
            staking_token: self.staking_token,
            fee_bps: self.cross_chain_fee_bps,
        }
    }
}

fn parse_address(s: &str) -> Result<Address> {
    s.trim()
        .parse()
        .with_context(|| format!("not an address: {}", s))
}

fn parse_amount(s: &str) -> Result<U256> {
    s.trim()
        .parse()
        .with_context(|| format!("not an amount: {}", s))
}

fn split_pair(item: &str) -> Result<(&str, &str)> {
    item.split_once(':')
        .with_context(|| format!("expected a:b, got {}", item))
}

fn parse_list<T>(raw: &str, parse: impl Fn(&str) -> Result<T>) -> Result<Vec<T>> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const ORACLE: &str = "0x0000000000000000000000000000000000000002";
    const VALIDATOR: &str = "0x0000000000000000000000000000000000000003";

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("ORACLE_ADDRESS", ORACLE),
            ("VALIDATOR_ADDRESS", VALIDATOR),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.chain_id, 31337);
        assert_eq!(config.cross_chain_fee_bps, 50);
        assert!(config.registered_tokens.is_empty());
    }

    #[test]
    fn test_oracle_is_required() {
        let err = Config::from_lookup(lookup(&[("VALIDATOR_ADDRESS", VALIDATOR)])).unwrap_err();
        assert!(err.to_string().contains("ORACLE_ADDRESS"));

        let err = Config::from_lookup(lookup(&[
            ("ORACLE_ADDRESS", "0x0000000000000000000000000000000000000000"),
            ("VALIDATOR_ADDRESS", VALIDATOR),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("zero address"));
    }

    #[test]
    fn test_parses_genesis_lists() {
        let config = Config::from_lookup(lookup(&[
            ("ORACLE_ADDRESS", ORACLE),
            ("VALIDATOR_ADDRESS", VALIDATOR),
            (
                "REGISTERED_TOKENS",
                "0x0000000000000000000000000000000000000000:ETH, 0x00000000000000000000000000000000000000c1:DEEP",
            ),
            ("GENESIS_BALANCES", "0x0000000000000000000000000000000000000011:1000"),
            (
                "GENESIS_TOKENS",
                "0x00000000000000000000000000000000000000c1:0x0000000000000000000000000000000000000011:500",
            ),
        ]))
        .unwrap();

        assert_eq!(config.registered_tokens.len(), 2);
        assert_eq!(config.registered_tokens[0], (AssetId::Native, "ETH".to_string()));
        assert_eq!(config.genesis_balances[0].1, U256::from(1000));
        assert_eq!(config.genesis_tokens[0].2, U256::from(500));
    }

    #[test]
    fn test_bad_list_entry_names_variable() {
        let err = Config::from_lookup(lookup(&[
            ("ORACLE_ADDRESS", ORACLE),
            ("VALIDATOR_ADDRESS", VALIDATOR),
            ("GENESIS_BALANCES", "nope"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("GENESIS_BALANCES"));
    }
}
