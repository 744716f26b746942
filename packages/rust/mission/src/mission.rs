//! The mission aggregate: one end-to-end targeting run, persisted as a
//! single document per `(user, slot)`.
//!
//! Every phase transition mutates this document and persists it before the
//! next step runs, so a restart resumes at the last completed step without
//! repeating already-paid-for external calls.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use prospector_scoring::ScoreResult;
use prospector_shared::{CURRENT_SCHEMA_VERSION, Candidate, IdealCustomerProfile, MissionId};

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Mission pipeline phases, in order. `CampaignExport` is terminal once the
/// export output has been persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionPhase {
    Discovery,
    Validation,
    ValidationSummary,
    ContactDiscovery,
    ContactReview,
    CompanySummary,
    CampaignSelection,
    CampaignGeneration,
    CampaignExport,
}

impl std::fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Discovery => "discovery",
            Self::Validation => "validation",
            Self::ValidationSummary => "validation-summary",
            Self::ContactDiscovery => "contact-discovery",
            Self::ContactReview => "contact-review",
            Self::CompanySummary => "company-summary",
            Self::CampaignSelection => "campaign-selection",
            Self::CampaignGeneration => "campaign-generation",
            Self::CampaignExport => "campaign-export",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Decisions and tallies
// ---------------------------------------------------------------------------

/// A human accept/reject call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
}

/// Running tally of validation decisions. Decisions are keyed by candidate
/// id so re-submitting one never double-counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationTally {
    #[serde(default)]
    pub accepted: Vec<String>,
    #[serde(default)]
    pub rejected: Vec<String>,
    #[serde(default)]
    pub reason_counts: BTreeMap<String, u32>,
}

impl ValidationTally {
    /// Whether a candidate already has a decision recorded.
    pub fn decided(&self, candidate_id: &str) -> bool {
        self.accepted.iter().any(|id| id == candidate_id)
            || self.rejected.iter().any(|id| id == candidate_id)
    }

    /// Record a decision. Returns `false` (and changes nothing) when the
    /// candidate was already decided.
    pub fn record(&mut self, candidate_id: &str, decision: Decision, reasons: &[String]) -> bool {
        if self.decided(candidate_id) {
            return false;
        }
        match decision {
            Decision::Accept => self.accepted.push(candidate_id.to_string()),
            Decision::Reject => self.rejected.push(candidate_id.to_string()),
        }
        for reason in reasons {
            *self.reason_counts.entry(reason.clone()).or_insert(0) += 1;
        }
        true
    }

    pub fn total(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }
}

/// A reviewed contact with its decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactDecision {
    pub contact_id: String,
    pub company_id: String,
    pub decision: Decision,
    pub decided_at: DateTime<Utc>,
}

/// Per-company wrap-up recorded when its contact loop completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanySummaryEntry {
    pub company_id: String,
    pub contacts_reviewed: usize,
    pub contacts_accepted: usize,
}

// ---------------------------------------------------------------------------
// Scored candidates and campaign assets
// ---------------------------------------------------------------------------

/// A candidate paired with its match score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: ScoreResult,
}

/// Campaign flavor chosen at the selection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignKind {
    EmailSequence,
    LinkedinMessage,
}

impl std::fmt::Display for CampaignKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmailSequence => write!(f, "email-sequence"),
            Self::LinkedinMessage => write!(f, "linkedin-message"),
        }
    }
}

/// A generated outreach asset for one accepted contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignAsset {
    pub contact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    pub kind: CampaignKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personalization_score: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Mission document
// ---------------------------------------------------------------------------

/// The persisted mission document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub schema_version: u32,
    pub user_id: String,
    pub slot: String,
    pub phase: MissionPhase,
    /// Profile snapshot taken at mission start.
    pub icp: IdealCustomerProfile,

    /// Scored addressable set, ranked best-first.
    #[serde(default)]
    pub discovered: Vec<ScoredCandidate>,
    /// Company ids surfaced so far; the exclusion set for "show more".
    #[serde(default)]
    pub seen_company_ids: Vec<String>,
    /// Next discovery page for "show more" cycles.
    #[serde(default = "default_page")]
    pub discovery_page: u32,

    /// Ordered candidate ids drawn for human validation.
    #[serde(default)]
    pub validation_sample: Vec<String>,
    #[serde(default)]
    pub tally: ValidationTally,

    /// Accepted companies, in validation order.
    #[serde(default)]
    pub selected_companies: Vec<String>,
    /// Index of the company currently in the contact loop.
    #[serde(default)]
    pub company_cursor: usize,
    /// Decisions made within the current company's batch.
    #[serde(default)]
    pub contact_cursor: usize,

    /// Discovered contact batches per company id.
    #[serde(default)]
    pub contact_batches: BTreeMap<String, Vec<ScoredCandidate>>,
    /// Contact decisions keyed by contact id (idempotency guard).
    #[serde(default)]
    pub contact_decisions: BTreeMap<String, ContactDecision>,
    /// Accumulated per-company contact exclusion sets. Never reset.
    #[serde(default)]
    pub seen_contact_ids: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub company_summaries: Vec<CompanySummaryEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_kind: Option<CampaignKind>,
    #[serde(default)]
    pub assets: Vec<CampaignAsset>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

fn default_page() -> u32 {
    1
}

impl Mission {
    /// A fresh mission in the discovery phase.
    pub fn new(user_id: &str, slot: &str, icp: IdealCustomerProfile) -> Self {
        let now = Utc::now();
        Self {
            id: MissionId::new(),
            schema_version: CURRENT_SCHEMA_VERSION,
            user_id: user_id.to_string(),
            slot: slot.to_string(),
            phase: MissionPhase::Discovery,
            icp,
            discovered: Vec::new(),
            seen_company_ids: Vec::new(),
            discovery_page: 1,
            validation_sample: Vec::new(),
            tally: ValidationTally::default(),
            selected_companies: Vec::new(),
            company_cursor: 0,
            contact_cursor: 0,
            contact_batches: BTreeMap::new(),
            contact_decisions: BTreeMap::new(),
            seen_contact_ids: BTreeMap::new(),
            company_summaries: Vec::new(),
            campaign_kind: None,
            assets: Vec::new(),
            created_at: now,
            updated_at: now,
            exported_at: None,
        }
    }

    /// Company id currently in the contact loop, if any remain.
    pub fn current_company(&self) -> Option<&str> {
        self.selected_companies
            .get(self.company_cursor)
            .map(String::as_str)
    }

    /// Look up a discovered company by id.
    pub fn discovered_company(&self, company_id: &str) -> Option<&ScoredCandidate> {
        self.discovered
            .iter()
            .find(|sc| sc.candidate.id == company_id)
    }

    /// Accepted contacts across all companies, in review order.
    pub fn accepted_contacts(&self) -> Vec<&ScoredCandidate> {
        let mut accepted = Vec::new();
        for company_id in &self.selected_companies {
            let Some(batch) = self.contact_batches.get(company_id) else {
                continue;
            };
            for contact in batch {
                let decided_accept = self
                    .contact_decisions
                    .get(&contact.candidate.id)
                    .is_some_and(|d| d.decision == Decision::Accept);
                if decided_accept {
                    accepted.push(contact);
                }
            }
        }
        accepted
    }

    /// An asset already generated for a contact, if any (resume guard).
    pub fn asset_for(&self, contact_id: &str) -> Option<&CampaignAsset> {
        self.assets.iter().find(|a| a.contact_id == contact_id)
    }

    /// Terminal once the export output has been persisted.
    pub fn is_terminal(&self) -> bool {
        self.phase == MissionPhase::CampaignExport && self.exported_at.is_some()
    }
}
