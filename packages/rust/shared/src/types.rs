//! Core domain types for Prospector targeting missions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for the persisted mission document format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// MissionId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for mission identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MissionId(pub Uuid);

impl MissionId {
    /// Generate a new time-sortable mission identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MissionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// IdealCustomerProfile
// ---------------------------------------------------------------------------

/// The targeting configuration a user defines to describe desired prospects.
///
/// Every array defaults to empty so a partially-filled profile document
/// still deserializes; scoring treats missing arrays as contributing zero
/// to their factor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdealCustomerProfile {
    /// Target industries (substring-matched against candidate industries).
    #[serde(default)]
    pub industries: Vec<String>,
    /// Company-size ranges: `"min-max"` strings or the sentinel `"1000+"`.
    #[serde(default)]
    pub company_sizes: Vec<String>,
    /// Target job titles for contacts.
    #[serde(default)]
    pub job_titles: Vec<String>,
    /// Geographic scope keywords, e.g. "All US", "Remote".
    #[serde(default)]
    pub location_scope: Vec<String>,
    /// Target US states.
    #[serde(default)]
    pub target_states: Vec<String>,
    /// Target cities.
    #[serde(default)]
    pub target_cities: Vec<String>,
    /// Free-text avoid list; interpreted by the avoid-rule table.
    #[serde(default)]
    pub avoid_list: String,
}

impl IdealCustomerProfile {
    /// A profile with no targeting criteria at all cannot drive discovery.
    pub fn is_empty(&self) -> bool {
        self.industries.is_empty()
            && self.company_sizes.is_empty()
            && self.job_titles.is_empty()
            && self.location_scope.is_empty()
            && self.target_states.is_empty()
            && self.target_cities.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// A normalized company-or-contact record from the directory adapter.
///
/// Companies leave `title`/`email` empty; contacts carry their employer's
/// firmographics (industry, employee count, location) flattened in so the
/// scoring engine sees one shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Candidate {
    /// Upstream directory record identifier.
    pub id: String,
    /// Company name, or the contact's full name.
    pub name: String,
    /// Job title (contacts only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Industry label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    /// Employee headcount; `None` when the directory has no estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phone_numbers: Vec<String>,
    /// Company website, used by the domain search strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    /// Upstream organization identifier (exact-lookup strategy).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// Company name of a contact's employer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mission_id_roundtrip() {
        let id = MissionId::new();
        let s = id.to_string();
        let parsed: MissionId = s.parse().expect("parse MissionId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn icp_deserializes_from_partial_document() {
        let json = r#"{"industries": ["SaaS"], "avoid_list": "Acme Corp"}"#;
        let icp: IdealCustomerProfile = serde_json::from_str(json).expect("deserialize");
        assert_eq!(icp.industries, vec!["SaaS"]);
        assert_eq!(icp.avoid_list, "Acme Corp");
        assert!(icp.job_titles.is_empty());
        assert!(icp.target_states.is_empty());
    }

    #[test]
    fn icp_is_empty_ignores_avoid_list() {
        let icp = IdealCustomerProfile {
            avoid_list: "Acme".into(),
            ..Default::default()
        };
        assert!(icp.is_empty());

        let icp = IdealCustomerProfile {
            industries: vec!["SaaS".into()],
            ..Default::default()
        };
        assert!(!icp.is_empty());
    }

    #[test]
    fn candidate_serialization_skips_empty_fields() {
        let candidate = Candidate {
            id: "org-1".into(),
            name: "Vector Labs".into(),
            industry: Some("SaaS".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&candidate).expect("serialize");
        assert!(json.contains("Vector Labs"));
        assert!(!json.contains("linkedin_url"));
        assert!(!json.contains("phone_numbers"));

        let parsed: Candidate = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.industry.as_deref(), Some("SaaS"));
        assert!(parsed.employee_count.is_none());
    }
}
