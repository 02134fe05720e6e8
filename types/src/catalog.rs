//! Pools and policies that financial actions are validated against.
//!
//! The catalog is static configuration today; it is deserializable so a host can
//! load it from a config file or replace it with data from a read API.

use serde::{Deserialize, Serialize};

use crate::action::{ActionBounds, PendingFinancialAction};
use crate::amount::TokenAmount;
use crate::error::ActionError;

/// Minimum coverage period in days.
pub const MIN_COVERAGE_DAYS: u32 = 1;

/// An insurance product a buyer can purchase coverage under.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub min_amount: TokenAmount,
    pub max_amount: TokenAmount,
    /// Annual premium, in percent of the covered amount.
    pub premium_rate: f64,
}

impl InsurancePolicy {
    pub fn bounds(&self) -> ActionBounds {
        ActionBounds {
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            min_duration_days: MIN_COVERAGE_DAYS,
        }
    }
}

/// A capital pool a provider can stake into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsurancePool {
    pub id: String,
    pub name: String,
    pub min_stake: TokenAmount,
    pub max_stake: TokenAmount,
    /// Minimum lock period in days.
    pub lockup_days: u32,
    /// Current annual yield, in percent.
    pub apy: f64,
}

impl InsurancePool {
    pub fn bounds(&self) -> ActionBounds {
        ActionBounds {
            min_amount: self.min_stake,
            max_amount: self.max_stake,
            min_duration_days: self.lockup_days,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub pools: Vec<InsurancePool>,
    #[serde(default)]
    pub policies: Vec<InsurancePolicy>,
}

impl Catalog {
    pub fn pool(&self, id: &str) -> Option<&InsurancePool> {
        self.pools.iter().find(|p| p.id == id)
    }

    pub fn policy(&self, id: &str) -> Option<&InsurancePolicy> {
        self.policies.iter().find(|p| p.id == id)
    }

    /// Bounds of the pool or policy an action targets.
    pub fn bounds_for(&self, action: &PendingFinancialAction) -> Result<ActionBounds, ActionError> {
        let target = action.target_id();
        let bounds = match action {
            PendingFinancialAction::Stake(_) => self.pool(target).map(InsurancePool::bounds),
            PendingFinancialAction::Coverage(_) => {
                self.policy(target).map(InsurancePolicy::bounds)
            }
        };
        bounds.ok_or_else(|| ActionError::UnknownTarget(target.to_string()))
    }

    /// Resolve the target and check the action against its bounds.
    pub fn validate(&self, action: &PendingFinancialAction) -> Result<(), ActionError> {
        let bounds = self.bounds_for(action)?;
        action.validate(&bounds)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            pools: vec![InsurancePool {
                id: "1".into(),
                name: "Exchange Hack Pool".into(),
                min_stake: TokenAmount::from_whole(1),
                max_stake: TokenAmount::from_whole(100),
                lockup_days: 30,
                apy: 12.5,
            }],
            policies: vec![
                InsurancePolicy {
                    id: "1".into(),
                    name: "Exchange Hack Protection".into(),
                    description: "Coverage against loss of funds due to exchange security breaches"
                        .into(),
                    min_amount: TokenAmount::from_whole(1),
                    max_amount: TokenAmount::from_whole(50),
                    premium_rate: 0.3,
                },
                InsurancePolicy {
                    id: "2".into(),
                    name: "Smart Contract Failure".into(),
                    description:
                        "Coverage against loss of funds due to smart contract security breaches"
                            .into(),
                    min_amount: TokenAmount::from_whole(1),
                    max_amount: TokenAmount::from_whole(50),
                    premium_rate: 0.3,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{CoverageRequest, StakeRequest};

    #[test]
    fn default_catalog_resolves_targets() {
        let catalog = Catalog::default();
        assert!(catalog.pool("1").is_some());
        assert_eq!(catalog.policy("2").unwrap().name, "Smart Contract Failure");
        assert!(catalog.policy("99").is_none());
    }

    #[test]
    fn stake_uses_pool_lockup_as_minimum_duration() {
        let catalog = Catalog::default();
        let action = PendingFinancialAction::Stake(StakeRequest {
            pool_id: "1".into(),
            amount: TokenAmount::from_whole(5),
            duration_days: 15,
        });
        assert_eq!(
            catalog.validate(&action),
            Err(ActionError::DurationTooShort {
                days: 15,
                min_days: 30
            })
        );
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let catalog = Catalog::default();
        let action = PendingFinancialAction::Coverage(CoverageRequest {
            policy_id: "missing".into(),
            amount: TokenAmount::from_whole(5),
            duration_days: 30,
        });
        assert_eq!(
            catalog.validate(&action),
            Err(ActionError::UnknownTarget("missing".into()))
        );
    }

    #[test]
    fn catalog_loads_from_toml() {
        let toml = r#"
            [[policies]]
            id = "wp"
            name = "Wallet Protection"
            min_amount = 0.1
            max_amount = 5
            premium_rate = 1.8
        "#;
        let catalog: Catalog = toml::from_str(toml).unwrap();
        assert!(catalog.pools.is_empty());
        let policy = catalog.policy("wp").unwrap();
        assert_eq!(policy.min_amount, "0.1".parse().unwrap());
        assert_eq!(policy.bounds().min_duration_days, MIN_COVERAGE_DAYS);
    }
}
