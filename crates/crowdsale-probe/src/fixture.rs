//! Typed scenario fixtures.
//!
//! Users and crowdsales are described in JSON or YAML files. Missing fields
//! fail at deserialization; semantic rules (address shape, rate bounds, tier
//! ordering) fail in [`Validate::validate`]. Either way [`load_fixture`]
//! reports the file path with the problem.

use crate::result::{ProbeError, ProbeResult};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::debug;

/// Semantic checks run after a fixture is parsed
pub trait Validate {
    /// Describe the first violated rule
    fn validate(&self) -> Result<(), String>;
}

/// Read a fixture, picking the format from the file extension
/// (`.json`, `.yaml`, `.yml`), then validate it.
pub fn load_fixture<T>(path: impl AsRef<Path>) -> ProbeResult<T>
where
    T: DeserializeOwned + Validate,
{
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ProbeError::fixture(path, e.to_string()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let value: T = match ext.as_deref() {
        Some("json") => {
            serde_json::from_str(&text).map_err(|e| ProbeError::fixture(path, e.to_string()))?
        }
        Some("yaml" | "yml") => {
            serde_yaml_ng::from_str(&text).map_err(|e| ProbeError::fixture(path, e.to_string()))?
        }
        _ => {
            return Err(ProbeError::fixture(
                path,
                "unsupported extension (expected .json, .yaml or .yml)",
            ))
        }
    };
    value
        .validate()
        .map_err(|message| ProbeError::fixture(path, message))?;
    debug!(path = %path.display(), "fixture loaded");
    Ok(value)
}

/// `0x` followed by 40 hex digits
#[must_use]
pub fn is_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Amounts appear as numbers or as strings (`"1e6"`) in fixture files
fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }
    match Raw::deserialize(d)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn opt_amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "amount")] f64);
    Ok(Option::<Wrap>::deserialize(d)?.map(|Wrap(v)| v))
}

// =============================================================================
// USER
// =============================================================================

/// A wallet account the harness acts as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFixture {
    /// Address
    pub account: String,
    /// Hex private key, imported into the wallet
    pub private_key: String,
    /// Chain id the account lives on
    #[serde(rename = "networkID", alias = "networkId")]
    pub network_id: u64,
}

impl Validate for UserFixture {
    fn validate(&self) -> Result<(), String> {
        if !is_address(&self.account) {
            return Err(format!("account '{}' is not a 0x address", self.account));
        }
        let key = self.private_key.trim_start_matches("0x");
        if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("privateKey must be 64 hex digits".to_string());
        }
        if self.network_id == 0 {
            return Err("networkID must be positive".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// CROWDSALE
// =============================================================================

/// Crowdsale strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrowdsaleKind {
    /// Fixed-rate tiers, tokens minted on purchase
    Minted,
    /// Price falls from max rate to min rate over a single tier
    DutchAuction,
}

/// Date order the browser's date inputs expect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// `2018-05-21` / `13:30`
    #[default]
    Ymd,
    /// `05/21/2018` / `01:30PM`
    Mdy,
}

/// Whitelisted investor with contribution bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    /// Investor address
    pub address: String,
    /// Minimum purchase in tokens
    #[serde(deserialize_with = "amount")]
    pub min: f64,
    /// Maximum purchase in tokens
    #[serde(deserialize_with = "amount")]
    pub max: f64,
}

/// Unit of a reserved-token entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservedDimension {
    /// Absolute token count
    Tokens,
    /// Percentage of sold tokens
    Percentage,
}

/// Tokens set aside for an address at finalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservedToken {
    /// Beneficiary
    pub address: String,
    /// Unit of `value`
    pub dimension: ReservedDimension,
    /// Amount or percentage
    #[serde(deserialize_with = "amount")]
    pub value: f64,
}

/// One sale tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierFixture {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `HH:MM`
    pub start_time: String,
    /// `YYYY-MM-DD`
    pub end_date: String,
    /// `HH:MM`
    pub end_time: String,
    /// Tokens per ETH (minted)
    #[serde(default, deserialize_with = "opt_amount")]
    pub rate: Option<f64>,
    /// Final tokens per ETH (Dutch)
    #[serde(default, deserialize_with = "opt_amount")]
    pub min_rate: Option<f64>,
    /// Opening tokens per ETH (Dutch)
    #[serde(default, deserialize_with = "opt_amount")]
    pub max_rate: Option<f64>,
    /// Tokens on sale in this tier
    #[serde(deserialize_with = "amount")]
    pub supply: f64,
    /// Only whitelisted addresses may buy
    #[serde(default, rename = "isWhitelisted", alias = "whitelisted")]
    pub whitelisted: bool,
    /// Owner may edit the tier after publishing
    #[serde(default, alias = "isModifiable")]
    pub allow_modify: bool,
    /// Minimum purchase for non-whitelisted tiers
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub min_cap: f64,
    /// Investors allowed in a whitelisted tier
    #[serde(default)]
    pub whitelist: Vec<WhitelistEntry>,
}

fn amount_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(opt_amount(d)?.unwrap_or(0.0))
}

fn parse_moment(date: &str, time: &str) -> Result<NaiveDateTime, String> {
    let d = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| format!("date '{date}': {e}"))?;
    let t = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map_err(|e| format!("time '{time}': {e}"))?;
    Ok(d.and_time(t))
}

impl TierFixture {
    /// Start as a naive UTC datetime
    pub fn starts_at(&self) -> ProbeResult<NaiveDateTime> {
        parse_moment(&self.start_date, &self.start_time).map_err(ProbeError::invalid_config)
    }

    /// End as a naive UTC datetime
    pub fn ends_at(&self) -> ProbeResult<NaiveDateTime> {
        parse_moment(&self.end_date, &self.end_time).map_err(ProbeError::invalid_config)
    }

    /// Start as unix seconds, for [`crate::wait::wait_until_passed`]
    pub fn start_timestamp(&self) -> ProbeResult<i64> {
        Ok(self.starts_at()?.and_utc().timestamp())
    }

    /// End as unix seconds
    pub fn end_timestamp(&self) -> ProbeResult<i64> {
        Ok(self.ends_at()?.and_utc().timestamp())
    }

    /// Start date and time as typed into the wizard's inputs
    pub fn start_input(&self, format: DateFormat) -> ProbeResult<(String, String)> {
        Ok(format_input(self.starts_at()?, format))
    }

    /// End date and time as typed into the wizard's inputs
    pub fn end_input(&self, format: DateFormat) -> ProbeResult<(String, String)> {
        Ok(format_input(self.ends_at()?, format))
    }

    /// Tokens bought with `contribution` ETH at the fixed rate
    #[must_use]
    pub fn tokens_for(&self, contribution: f64) -> Option<f64> {
        self.rate.map(|rate| contribution * rate)
    }

    fn check(&self, kind: CrowdsaleKind) -> Result<(), String> {
        let start = parse_moment(&self.start_date, &self.start_time)?;
        let end = parse_moment(&self.end_date, &self.end_time)?;
        if start >= end {
            return Err(format!("start {start} is not before end {end}"));
        }
        if self.supply <= 0.0 {
            return Err("supply must be positive".to_string());
        }
        match kind {
            CrowdsaleKind::Minted => match self.rate {
                Some(rate) if rate > 0.0 => {}
                Some(_) => return Err("rate must be positive".to_string()),
                None => return Err("minted tier requires rate".to_string()),
            },
            CrowdsaleKind::DutchAuction => match (self.min_rate, self.max_rate) {
                (Some(min), Some(max)) if min > 0.0 && min <= max => {}
                (Some(min), Some(max)) => {
                    return Err(format!("minRate {min} must be positive and not above maxRate {max}"))
                }
                _ => return Err("Dutch auction tier requires minRate and maxRate".to_string()),
            },
        }
        if self.min_cap < 0.0 {
            return Err("minCap must not be negative".to_string());
        }
        for (i, entry) in self.whitelist.iter().enumerate() {
            if !is_address(&entry.address) {
                return Err(format!("whitelist[{i}]: '{}' is not a 0x address", entry.address));
            }
            if entry.min < 0.0 || entry.min > entry.max {
                return Err(format!("whitelist[{i}]: min {} exceeds max {}", entry.min, entry.max));
            }
        }
        Ok(())
    }
}

fn format_input(at: NaiveDateTime, format: DateFormat) -> (String, String) {
    match format {
        DateFormat::Ymd => (
            at.format("%Y-%m-%d").to_string(),
            at.format("%H:%M").to_string(),
        ),
        DateFormat::Mdy => (
            at.format("%m/%d/%Y").to_string(),
            at.format("%I:%M%p").to_string(),
        ),
    }
}

/// A crowdsale the wizard is asked to create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrowdsaleFixture {
    /// Strategy; inferred from the tiers when absent
    #[serde(default)]
    pub kind: Option<CrowdsaleKind>,
    /// Token name
    pub name: String,
    /// Token ticker
    pub ticker: String,
    /// Token decimals
    pub decimals: u32,
    /// Wallet receiving contributions
    pub wallet_address: String,
    /// Gas price in gwei
    #[serde(rename = "gasprice", alias = "gasPrice", deserialize_with = "amount")]
    pub gas_price: f64,
    /// Total supply (Dutch auctions)
    #[serde(default, deserialize_with = "opt_amount")]
    pub total_supply: Option<f64>,
    /// Burn unsold tokens at finalization
    #[serde(default)]
    pub burn_excess: bool,
    /// Sale tiers in order
    pub tiers: Vec<TierFixture>,
    /// Reserved tokens (minted)
    #[serde(default)]
    pub reserved_tokens: Vec<ReservedToken>,
}

impl CrowdsaleFixture {
    /// Explicit kind, or `DutchAuction` when any tier carries a rate range
    #[must_use]
    pub fn kind(&self) -> CrowdsaleKind {
        self.kind.unwrap_or_else(|| {
            if self
                .tiers
                .iter()
                .any(|t| t.min_rate.is_some() || t.max_rate.is_some())
            {
                CrowdsaleKind::DutchAuction
            } else {
                CrowdsaleKind::Minted
            }
        })
    }

    /// Sum of tier supplies
    #[must_use]
    pub fn tier_supply(&self) -> f64 {
        self.tiers.iter().map(|t| t.supply).sum()
    }

    /// Tokens finalization hands back to the owner: the unsold part of the
    /// tier supply, or nothing when the excess is burned. Pairs with the
    /// owner's `balance_delta` across finalization, since the owner already
    /// held `totalSupply` minus the tier supply before the sale.
    #[must_use]
    pub fn unsold_for_owner(&self, sold: f64) -> f64 {
        if self.burn_excess {
            0.0
        } else {
            self.tier_supply() - sold
        }
    }
}

impl Validate for CrowdsaleFixture {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.ticker.is_empty() || !self.ticker.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("ticker '{}' must be alphanumeric", self.ticker));
        }
        if self.decimals > 18 {
            return Err(format!("decimals {} exceeds 18", self.decimals));
        }
        if !is_address(&self.wallet_address) {
            return Err(format!(
                "walletAddress '{}' is not a 0x address",
                self.wallet_address
            ));
        }
        if self.gas_price <= 0.0 {
            return Err("gasprice must be positive".to_string());
        }
        if self.tiers.is_empty() {
            return Err("at least one tier is required".to_string());
        }

        let kind = self.kind();
        if kind == CrowdsaleKind::DutchAuction {
            match self.total_supply {
                Some(total) if total > 0.0 => {
                    if self.tier_supply() > total {
                        return Err(format!(
                            "tier supply {} exceeds totalSupply {total}",
                            self.tier_supply()
                        ));
                    }
                }
                _ => return Err("Dutch auction requires a positive totalSupply".to_string()),
            }
        }

        let mut previous_end: Option<NaiveDateTime> = None;
        for (i, tier) in self.tiers.iter().enumerate() {
            tier.check(kind).map_err(|e| format!("tiers[{i}]: {e}"))?;
            let start = parse_moment(&tier.start_date, &tier.start_time)?;
            if let Some(end) = previous_end.filter(|end| start < *end) {
                return Err(format!("tiers[{i}]: starts before tiers[{}] ends ({end})", i - 1));
            }
            previous_end = Some(parse_moment(&tier.end_date, &tier.end_time)?);
        }

        for (i, reserved) in self.reserved_tokens.iter().enumerate() {
            if !is_address(&reserved.address) {
                return Err(format!(
                    "reservedTokens[{i}]: '{}' is not a 0x address",
                    reserved.address
                ));
            }
            if reserved.value < 0.0 {
                return Err(format!("reservedTokens[{i}]: value must not be negative"));
            }
        }
        Ok(())
    }
}
