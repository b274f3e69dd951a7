//! Plan tier quota and size policy for depot.
//!
//! The enforcer is a lookup table built from configuration; it holds no
//! mutable state. All ceilings are evaluated at creation time and are not
//! re-checked retroactively when a plan changes.

use std::fmt;
use std::str::FromStr;

use crate::config::PlansConfig;
use crate::{DepotError, Result};

/// Subscription plan tier for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlanTier {
    /// Free tier with the smallest ceilings.
    #[default]
    Hobbyist,
    /// Paid tier with larger ceilings.
    Standard,
}

impl PlanTier {
    /// Convert tier to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Hobbyist => "hobbyist",
            PlanTier::Standard => "standard",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hobbyist" => Ok(PlanTier::Hobbyist),
            "standard" => Ok(PlanTier::Standard),
            _ => Err(format!("unknown plan tier: {s}")),
        }
    }
}

impl TryFrom<String> for PlanTier {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Ceilings for one plan tier.
#[derive(Debug, Clone, Copy)]
pub struct TierLimits {
    /// Maximum number of artifacts an owner may hold.
    pub max_artifacts: u32,
    /// Maximum artifact size in whole megabytes.
    pub max_size_mb: u64,
}

/// Immutable plan policy table.
#[derive(Debug, Clone)]
pub struct PlanPolicy {
    hobbyist: TierLimits,
    standard: TierLimits,
}

impl PlanPolicy {
    /// Build the policy table from configuration.
    pub fn from_config(config: &PlansConfig) -> Self {
        Self {
            hobbyist: TierLimits {
                max_artifacts: config.hobbyist.max_artifacts,
                max_size_mb: config.hobbyist.max_size_mb,
            },
            standard: TierLimits {
                max_artifacts: config.standard.max_artifacts,
                max_size_mb: config.standard.max_size_mb,
            },
        }
    }

    /// Get the ceilings for a tier.
    pub fn limits(&self, tier: PlanTier) -> TierLimits {
        match tier {
            PlanTier::Hobbyist => self.hobbyist,
            PlanTier::Standard => self.standard,
        }
    }

    /// Check whether an owner with `existing_count` artifacts may create
    /// another under `tier`.
    pub fn check_create(&self, existing_count: u32, tier: PlanTier) -> Result<()> {
        let limits = self.limits(tier);
        if existing_count >= limits.max_artifacts {
            return Err(DepotError::QuotaExceeded(format!(
                "{} plan allows at most {} artifacts; remove existing artifacts or upgrade",
                tier, limits.max_artifacts
            )));
        }
        Ok(())
    }

    /// Check whether an artifact of `size_mb` fits under `tier`.
    ///
    /// An artifact exactly at the ceiling is accepted.
    pub fn check_size(&self, size_mb: u64, tier: PlanTier) -> Result<()> {
        let limits = self.limits(tier);
        if size_mb > limits.max_size_mb {
            return Err(DepotError::SizeExceeded(format!(
                "artifact is {size_mb}MB but the {} plan allows at most {}MB",
                tier, limits.max_size_mb
            )));
        }
        Ok(())
    }
}

impl Default for PlanPolicy {
    fn default() -> Self {
        Self::from_config(&PlansConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_string_round_trip() {
        assert_eq!(PlanTier::Hobbyist.as_str(), "hobbyist");
        assert_eq!(PlanTier::Standard.as_str(), "standard");
        assert_eq!("hobbyist".parse::<PlanTier>().unwrap(), PlanTier::Hobbyist);
        assert_eq!("Standard".parse::<PlanTier>().unwrap(), PlanTier::Standard);
        assert!("premium".parse::<PlanTier>().is_err());
    }

    #[test]
    fn test_check_create_under_limit() {
        let policy = PlanPolicy::default();
        assert!(policy.check_create(2, PlanTier::Hobbyist).is_ok());
        assert!(policy.check_create(9, PlanTier::Standard).is_ok());
    }

    #[test]
    fn test_check_create_at_limit() {
        let policy = PlanPolicy::default();
        let result = policy.check_create(3, PlanTier::Hobbyist);
        assert!(matches!(result, Err(DepotError::QuotaExceeded(_))));

        let result = policy.check_create(10, PlanTier::Standard);
        assert!(matches!(result, Err(DepotError::QuotaExceeded(_))));
    }

    #[test]
    fn test_check_size_at_ceiling_accepted() {
        let policy = PlanPolicy::default();
        assert!(policy.check_size(100, PlanTier::Hobbyist).is_ok());
        assert!(policy.check_size(200, PlanTier::Standard).is_ok());
    }

    #[test]
    fn test_check_size_one_over_rejected() {
        let policy = PlanPolicy::default();
        let result = policy.check_size(101, PlanTier::Hobbyist);
        assert!(matches!(result, Err(DepotError::SizeExceeded(_))));

        let result = policy.check_size(201, PlanTier::Standard);
        assert!(matches!(result, Err(DepotError::SizeExceeded(_))));
    }

    #[test]
    fn test_configured_ceilings() {
        let config = PlansConfig {
            hobbyist: crate::config::TierLimitsConfig {
                max_artifacts: 1,
                max_size_mb: 10,
            },
            standard: crate::config::TierLimitsConfig {
                max_artifacts: 2,
                max_size_mb: 20,
            },
        };
        let policy = PlanPolicy::from_config(&config);

        assert!(policy.check_create(0, PlanTier::Hobbyist).is_ok());
        assert!(policy.check_create(1, PlanTier::Hobbyist).is_err());
        assert!(policy.check_size(10, PlanTier::Hobbyist).is_ok());
        assert!(policy.check_size(11, PlanTier::Hobbyist).is_err());
    }

    #[test]
    fn test_error_names_the_ceiling() {
        let policy = PlanPolicy::default();
        let err = policy.check_size(150, PlanTier::Hobbyist).unwrap_err();
        assert!(err.to_string().contains("100MB"));

        let err = policy.check_create(3, PlanTier::Hobbyist).unwrap_err();
        assert!(err.to_string().contains('3'));
    }
}
