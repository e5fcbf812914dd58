//! QoS negotiation. The general-purpose QoS policy library the real
//! middleware ships is out of scope; this module only models the two axes
//! that matter here — reliability, durability — plus the YAML encode/decode
//! of a profile list.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reliability {
    BestEffort,
    Reliable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Durability {
    Volatile,
    TransientLocal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosProfile {
    pub reliability: Reliability,
    pub durability: Durability,
}

impl Default for QosProfile {
    fn default() -> Self {
        Self {
            reliability: Reliability::Reliable,
            durability: Durability::Volatile,
        }
    }
}

impl QosProfile {
    pub fn best_effort_volatile() -> Self {
        Self {
            reliability: Reliability::BestEffort,
            durability: Durability::Volatile,
        }
    }

    /// Downgrade `self` to whichever of `self`/`other` is weaker on both
    /// axes — an "adapted offer/request" compatible with both sides.
    fn weakest(self, other: QosProfile) -> QosProfile {
        let reliability = if self.reliability == Reliability::BestEffort || other.reliability == Reliability::BestEffort {
            Reliability::BestEffort
        } else {
            Reliability::Reliable
        };
        let durability = if self.durability == Durability::Volatile || other.durability == Durability::Volatile {
            Durability::Volatile
        } else {
            Durability::TransientLocal
        };
        QosProfile { reliability, durability }
    }
}

/// YAML-dump a sequence of QoS profiles for persistence in topic metadata.
pub fn serialize_qos_profiles(profiles: &[QosProfile]) -> String {
    serde_yaml::to_string(profiles).unwrap_or_default()
}

/// Parse a previously-serialized YAML list of QoS profiles. An empty or
/// unparsable string yields no profiles rather than an error: callers treat
/// "no prior profiles" and "malformed prior profiles" the same way (fall
/// back to the default QoS).
pub fn deserialize_qos_profiles(yaml: &str) -> Vec<QosProfile> {
    if yaml.trim().is_empty() {
        return Vec::new();
    }
    serde_yaml::from_str(yaml).unwrap_or_default()
}

/// Pick the QoS a new publisher should offer for `topic`.
pub fn publisher_qos_for_topic(
    topic_name: &str,
    overrides: &std::collections::HashMap<String, QosProfile>,
    offered_qos_profiles_yaml: &str,
) -> QosProfile {
    if let Some(profile) = overrides.get(topic_name) {
        return *profile;
    }
    let recorded = deserialize_qos_profiles(offered_qos_profiles_yaml);
    if recorded.is_empty() {
        return QosProfile::default();
    }
    recorded
        .into_iter()
        .reduce(|a, b| a.weakest(b))
        .unwrap_or_default()
}

/// Pick the QoS a new subscription should request for `topic`, given the
/// profiles currently-live publishers offer.
pub fn subscription_qos_for_topic(
    topic_name: &str,
    overrides: &std::collections::HashMap<String, QosProfile>,
    live_publisher_profiles: &[QosProfile],
) -> QosProfile {
    if let Some(profile) = overrides.get(topic_name) {
        return *profile;
    }
    if live_publisher_profiles.is_empty() {
        return QosProfile::default();
    }
    live_publisher_profiles
        .iter()
        .copied()
        .reduce(|a, b| a.weakest(b))
        .unwrap_or_default()
}

/// QoS incompatibility check for `warn_if_new_qos_for_subscribed_topic`:
/// true if a publisher offering `publisher_qos` would silently fail to
/// deliver to a subscription that requested `subscription_qos`.
pub fn is_incompatible(publisher_qos: QosProfile, subscription_qos: QosProfile) -> bool {
    let reliability_mismatch =
        publisher_qos.reliability == Reliability::BestEffort && subscription_qos.reliability == Reliability::Reliable;
    let durability_mismatch =
        publisher_qos.durability == Durability::Volatile && subscription_qos.durability == Durability::TransientLocal;
    reliability_mismatch || durability_mismatch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_profile_list() {
        let profiles = vec![QosProfile::default(), QosProfile::best_effort_volatile()];
        let yaml = serialize_qos_profiles(&profiles);
        let parsed = deserialize_qos_profiles(&yaml);
        assert_eq!(profiles, parsed);
    }

    #[test]
    fn empty_yaml_yields_no_profiles() {
        assert!(deserialize_qos_profiles("").is_empty());
    }

    #[test]
    fn override_wins_over_recorded_profiles() {
        let mut overrides = std::collections::HashMap::new();
        overrides.insert("/a".to_string(), QosProfile::best_effort_volatile());
        let yaml = serialize_qos_profiles(&[QosProfile::default()]);
        let qos = publisher_qos_for_topic("/a", &overrides, &yaml);
        assert_eq!(qos, QosProfile::best_effort_volatile());
    }

    #[test]
    fn incompatibility_matches_reliability_and_durability_axes() {
        let reliable_request = QosProfile::default();
        let best_effort_offer = QosProfile::best_effort_volatile();
        assert!(is_incompatible(best_effort_offer, reliable_request));
        assert!(!is_incompatible(reliable_request, best_effort_offer));
    }
}
