//! ProviderRecord domain model (spec §3 "ProviderRecord", §4.1).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Static, immutable metadata about one of the 16 external inference
/// providers. Auth material is referenced, never embedded — the ref is an
/// opaque lookup key into a secrets store and is never logged (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub provider_id: String,
    pub tier: u8,
    pub priority: u32,
    pub model_id: String,
    pub endpoint_template: String,
    pub auth_ref: String,
    pub capability_tags: HashSet<String>,
    pub cost_per_input_token_usd: f64,
    pub cost_per_output_token_usd: f64,
    #[serde(with = "duration_secs")]
    pub absolute_timeout: Duration,
    pub max_retries: u32,
    pub enabled: bool,
}

impl ProviderRecord {
    pub fn matches_capability(&self, hint: Option<&str>) -> bool {
        match hint {
            None => true,
            Some(h) => self.capability_tags.iter().any(|t| t == h),
        }
    }

    pub fn expected_cost_usd(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 * self.cost_per_input_token_usd
            + output_tokens as f64 * self.cost_per_output_token_usd
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProviderRecord {
        ProviderRecord {
            provider_id: "p1".into(),
            tier: 1,
            priority: 10,
            model_id: "m1".into(),
            endpoint_template: "https://example.invalid/{model}".into(),
            auth_ref: "secret:p1".into(),
            capability_tags: HashSet::from(["code".to_string()]),
            cost_per_input_token_usd: 0.000_003,
            cost_per_output_token_usd: 0.000_015,
            absolute_timeout: Duration::from_secs(30),
            max_retries: 2,
            enabled: true,
        }
    }

    #[test]
    fn capability_match() {
        let p = sample();
        assert!(p.matches_capability(Some("code")));
        assert!(!p.matches_capability(Some("multilingual")));
        assert!(p.matches_capability(None));
    }

    #[test]
    fn expected_cost_computation() {
        let p = sample();
        let cost = p.expected_cost_usd(1000, 500);
        assert!((cost - (1000.0 * 0.000_003 + 500.0 * 0.000_015)).abs() < 1e-9);
    }
}
