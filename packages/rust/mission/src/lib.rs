//! Mission orchestration for Prospector.
//!
//! This crate ties scoring, directory search, and structured generation
//! into the end-to-end targeting pipeline: market discovery, human
//! validation, per-company contact loops, and campaign generation/export,
//! all resumable from a persisted mission document.

pub mod cancel;
pub mod export;
pub mod mission;
pub mod orchestrator;
pub mod progress;

pub use cancel::{CancelHandle, CancelToken, cancel_channel};
pub use export::ExportBundle;
pub use mission::{
    CampaignAsset, CampaignKind, CompanySummaryEntry, ContactDecision, Decision, Mission,
    MissionPhase, ScoredCandidate, ValidationTally,
};
pub use orchestrator::{
    CampaignFailure, CampaignRunReport, CompanyAdvance, ContactDiscoveryReport,
    ContactReviewProgress, DiscoveryReport, FetchMoreReport, MissionRunner, MissionStatus,
    TargetConfirmation, ValidationProgress,
};
pub use progress::{MissionProgress, SilentProgress};
