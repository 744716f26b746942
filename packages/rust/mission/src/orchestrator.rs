//! The mission runner: a persisted state machine sequencing discovery,
//! human validation, per-company contact discovery/review, and campaign
//! generation.
//!
//! Phases run strictly sequentially, and per-entity work inside a phase is
//! sequential as well, keeping provider spend bounded and review ordering
//! stable. Every transition persists the mission document (with its
//! iteration cursors) before advancing, through version-guarded writes.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::json;
use tracing::{error, info, instrument, warn};

use prospector_directory::{CompanyTarget, DirectoryClient};
use prospector_genai::{
    GenAiClient, GenerationRequest, TEMPERATURE_CLASSIFY, TEMPERATURE_COPY, prompt_hash,
};
use prospector_scoring::score;
use prospector_shared::{
    AppConfig, Candidate, IdealCustomerProfile, MissionId, ProspectorError, Result,
};
use prospector_storage::Storage;

use crate::cancel::CancelToken;
use crate::export::{self, ExportBundle};
use crate::mission::{
    CampaignAsset, CampaignKind, CompanySummaryEntry, ContactDecision, Decision, Mission,
    MissionPhase, ScoredCandidate,
};
use crate::progress::MissionProgress;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of the discovery phase (or a "show more" cycle).
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub mission_id: MissionId,
    pub companies_found: usize,
    pub sample_size: usize,
}

/// Outcome of recording one validation decision.
#[derive(Debug, Clone)]
pub struct ValidationProgress {
    pub decided: usize,
    pub total: usize,
    pub phase: MissionPhase,
}

/// Outcome of confirming validated targets.
#[derive(Debug, Clone)]
pub struct TargetConfirmation {
    pub selected: usize,
}

/// Outcome of a contact-discovery step.
#[derive(Debug, Clone)]
pub struct ContactDiscoveryReport {
    /// Company whose batch is now under review, when one was found.
    pub company_id: Option<String>,
    pub contacts_found: usize,
    pub companies_remaining: usize,
    pub phase: MissionPhase,
    pub cancelled: bool,
}

/// Outcome of recording one contact decision.
#[derive(Debug, Clone)]
pub struct ContactReviewProgress {
    pub decided_in_batch: usize,
    pub batch_size: usize,
    pub phase: MissionPhase,
}

/// Outcome of a "fetch more contacts" cycle.
#[derive(Debug, Clone)]
pub struct FetchMoreReport {
    pub added: usize,
    pub batch_size: usize,
}

/// Outcome of advancing past a company summary.
#[derive(Debug, Clone)]
pub struct CompanyAdvance {
    pub next_company: Option<String>,
    pub phase: MissionPhase,
}

/// One contact's generation failure.
#[derive(Debug, Clone)]
pub struct CampaignFailure {
    pub contact_id: String,
    pub error: String,
}

/// Outcome of a campaign-generation run. A failure aborts remaining work
/// but the partial asset set survives and is reported.
#[derive(Debug, Clone)]
pub struct CampaignRunReport {
    pub generated: usize,
    pub total: usize,
    pub failed: Option<CampaignFailure>,
    pub phase: MissionPhase,
    pub cancelled: bool,
    pub persistence_degraded: bool,
}

/// Point-in-time mission status for the control surface.
#[derive(Debug, Clone)]
pub struct MissionStatus {
    pub phase: MissionPhase,
    pub version: i64,
    pub companies_discovered: usize,
    pub sample_decided: usize,
    pub sample_size: usize,
    pub companies_selected: usize,
    pub company_cursor: usize,
    pub assets: usize,
    pub exported: bool,
}

// ---------------------------------------------------------------------------
// MissionRunner
// ---------------------------------------------------------------------------

/// Drives one mission slot through the pipeline. Single-flow per mission:
/// callers invoke one operation at a time.
pub struct MissionRunner {
    config: AppConfig,
    storage: Storage,
    directory: DirectoryClient,
    genai: GenAiClient,
    cancel: CancelToken,
}

impl MissionRunner {
    pub fn new(
        config: AppConfig,
        storage: Storage,
        directory: DirectoryClient,
        genai: GenAiClient,
    ) -> Self {
        Self {
            config,
            storage,
            directory,
            genai,
            cancel: CancelToken::never(),
        }
    }

    /// Wire up a cooperative stop signal. Loops finish their current unit
    /// of work, persist, and return when it fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    // -----------------------------------------------------------------------
    // Persistence plumbing
    // -----------------------------------------------------------------------

    async fn load(&self, user_id: &str, slot: &str) -> Result<(Mission, i64)> {
        let record = self
            .storage
            .read_mission(user_id, slot)
            .await?
            .ok_or_else(|| {
                ProspectorError::validation(format!("no mission in slot '{slot}'"))
            })?;
        let mission: Mission = serde_json::from_value(record.payload).map_err(|e| {
            ProspectorError::Persistence(format!("corrupt mission document: {e}"))
        })?;
        Ok((mission, record.version))
    }

    async fn persist(&self, mission: &mut Mission, version: i64) -> Result<i64> {
        mission.updated_at = chrono::Utc::now();
        let payload = serde_json::to_value(&*mission)
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;
        self.storage
            .replace_mission(&mission.user_id, &mission.slot, &payload, version)
            .await
    }

    fn expect_phase(mission: &Mission, expected: MissionPhase) -> Result<()> {
        if mission.phase != expected {
            return Err(ProspectorError::validation(format!(
                "mission is in {}, expected {expected}",
                mission.phase
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    /// Start a mission: broad market discovery against the ICP, ranked by
    /// match score, with a fixed-size order-preserving validation sample.
    ///
    /// Pre-flight failures (no ICP, occupied slot) are raised before any
    /// external call.
    #[instrument(skip_all, fields(user_id = %user_id, slot = %slot))]
    pub async fn start(
        &self,
        user_id: &str,
        slot: &str,
        progress: &dyn MissionProgress,
    ) -> Result<DiscoveryReport> {
        let icp = self
            .storage
            .get_icp(user_id)
            .await?
            .ok_or_else(|| ProspectorError::config("no ICP configured for this user"))?;
        if icp.is_empty() {
            return Err(ProspectorError::config(
                "ICP has no targeting criteria; fill it in before starting a mission",
            ));
        }
        if self.storage.read_mission(user_id, slot).await?.is_some() {
            return Err(ProspectorError::validation(format!(
                "mission slot '{slot}' is already occupied; resume or abandon it first"
            )));
        }

        progress.phase("Discovering market");
        let candidates = self
            .directory
            .search_market(&icp, 1, &HashSet::new())
            .await?;

        let scored = rank(candidates, &icp);
        let sample_size = self.config.defaults.validation_sample_size;

        let mut mission = Mission::new(user_id, slot, icp);
        mission.seen_company_ids = scored.iter().map(|sc| sc.candidate.id.clone()).collect();
        mission.validation_sample = scored
            .iter()
            .take(sample_size)
            .map(|sc| sc.candidate.id.clone())
            .collect();
        mission.discovered = scored;
        mission.phase = MissionPhase::Validation;

        let payload = serde_json::to_value(&mission)
            .map_err(|e| ProspectorError::Persistence(e.to_string()))?;
        self.storage.create_mission(user_id, slot, &payload).await?;

        info!(
            mission_id = %mission.id,
            companies = mission.discovered.len(),
            sample = mission.validation_sample.len(),
            "mission started"
        );

        Ok(DiscoveryReport {
            mission_id: mission.id.clone(),
            companies_found: mission.discovered.len(),
            sample_size: mission.validation_sample.len(),
        })
    }

    /// Pull another page of companies into the validation sample, excluding
    /// everything already surfaced.
    #[instrument(skip_all, fields(user_id = %user_id, slot = %slot))]
    pub async fn show_more_companies(
        &self,
        user_id: &str,
        slot: &str,
    ) -> Result<DiscoveryReport> {
        let (mut mission, version) = self.load(user_id, slot).await?;
        Self::expect_phase(&mission, MissionPhase::Validation)?;

        let exclude: HashSet<String> = mission.seen_company_ids.iter().cloned().collect();
        mission.discovery_page += 1;
        let fresh = self
            .directory
            .search_market(&mission.icp, mission.discovery_page, &exclude)
            .await?;

        let scored = rank(fresh, &mission.icp);
        let found = scored.len();
        for sc in &scored {
            mission.seen_company_ids.push(sc.candidate.id.clone());
            mission.validation_sample.push(sc.candidate.id.clone());
        }
        mission.discovered.extend(scored);

        self.persist(&mut mission, version).await?;

        Ok(DiscoveryReport {
            mission_id: mission.id.clone(),
            companies_found: found,
            sample_size: mission.validation_sample.len(),
        })
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Record one accept/reject decision with optional reasons.
    ///
    /// Idempotent: re-submitting a decided candidate changes nothing and
    /// writes nothing. Deciding the last sampled candidate transitions to
    /// the validation summary.
    #[instrument(skip_all, fields(user_id = %user_id, slot = %slot, candidate_id = %candidate_id))]
    pub async fn record_validation(
        &self,
        user_id: &str,
        slot: &str,
        candidate_id: &str,
        decision: Decision,
        reasons: &[String],
    ) -> Result<ValidationProgress> {
        let (mut mission, version) = self.load(user_id, slot).await?;
        Self::expect_phase(&mission, MissionPhase::Validation)?;

        if !mission.validation_sample.iter().any(|id| id == candidate_id) {
            return Err(ProspectorError::validation(format!(
                "candidate '{candidate_id}' is not in the validation sample"
            )));
        }

        if mission.tally.record(candidate_id, decision, reasons) {
            if mission.tally.total() >= mission.validation_sample.len() {
                mission.phase = MissionPhase::ValidationSummary;
                info!(
                    accepted = mission.tally.accepted.len(),
                    rejected = mission.tally.rejected.len(),
                    "validation sample exhausted"
                );
            }
            self.persist(&mut mission, version).await?;
        }

        Ok(ValidationProgress {
            decided: mission.tally.total(),
            total: mission.validation_sample.len(),
            phase: mission.phase,
        })
    }

    /// Move from the validation summary into the per-company contact loop.
    /// Fatal when no company was accepted; raised before any external call.
    #[instrument(skip_all, fields(user_id = %user_id, slot = %slot))]
    pub async fn confirm_targets(&self, user_id: &str, slot: &str) -> Result<TargetConfirmation> {
        let (mut mission, version) = self.load(user_id, slot).await?;
        Self::expect_phase(&mission, MissionPhase::ValidationSummary)?;

        if mission.tally.accepted.is_empty() {
            return Err(ProspectorError::validation(
                "no companies selected for contact discovery",
            ));
        }

        mission.selected_companies = mission.tally.accepted.clone();
        mission.company_cursor = 0;
        mission.contact_cursor = 0;
        mission.phase = MissionPhase::ContactDiscovery;
        self.persist(&mut mission, version).await?;

        Ok(TargetConfirmation {
            selected: mission.selected_companies.len(),
        })
    }

    // -----------------------------------------------------------------------
    // Per-company contact loop
    // -----------------------------------------------------------------------

    /// Discover contacts for the current company, advancing past companies
    /// that yield nothing.
    ///
    /// A zero-result or failing company records an empty selection and the
    /// cursor moves on immediately — the loop never stalls. Each cursor
    /// advance is persisted before the next company is attempted.
    #[instrument(skip_all, fields(user_id = %user_id, slot = %slot))]
    pub async fn discover_contacts(
        &self,
        user_id: &str,
        slot: &str,
        progress: &dyn MissionProgress,
    ) -> Result<ContactDiscoveryReport> {
        let (mut mission, mut version) = self.load(user_id, slot).await?;
        Self::expect_phase(&mission, MissionPhase::ContactDiscovery)?;

        progress.phase("Discovering contacts");
        let total = mission.selected_companies.len();

        loop {
            if mission.company_cursor >= total {
                mission.phase = MissionPhase::CampaignSelection;
                self.persist(&mut mission, version).await?;
                return Ok(ContactDiscoveryReport {
                    company_id: None,
                    contacts_found: 0,
                    companies_remaining: 0,
                    phase: mission.phase,
                    cancelled: false,
                });
            }

            if self.cancel.is_cancelled() {
                info!("contact discovery cancelled, stopping after current unit");
                return Ok(ContactDiscoveryReport {
                    company_id: None,
                    contacts_found: 0,
                    companies_remaining: total - mission.company_cursor,
                    phase: mission.phase,
                    cancelled: true,
                });
            }

            let company_id = mission.selected_companies[mission.company_cursor].clone();
            progress.entity(mission.company_cursor + 1, total, &company_id);

            let batch = self.discover_company_contacts(&mission, &company_id).await;
            let seen = mission.seen_contact_ids.entry(company_id.clone()).or_default();
            for contact in &batch {
                seen.push(contact.candidate.id.clone());
            }

            if batch.is_empty() {
                // Record the empty selection and advance; never stall.
                mission.contact_batches.entry(company_id.clone()).or_default();
                mission.company_summaries.push(CompanySummaryEntry {
                    company_id: company_id.clone(),
                    contacts_reviewed: 0,
                    contacts_accepted: 0,
                });
                mission.company_cursor += 1;
                version = self.persist(&mut mission, version).await?;
                continue;
            }

            let found = batch.len();
            mission.contact_batches.insert(company_id.clone(), batch);
            mission.contact_cursor = 0;
            mission.phase = MissionPhase::ContactReview;
            self.persist(&mut mission, version).await?;

            return Ok(ContactDiscoveryReport {
                company_id: Some(company_id),
                contacts_found: found,
                companies_remaining: total - mission.company_cursor - 1,
                phase: mission.phase,
                cancelled: false,
            });
        }
    }

    /// Contact discovery for a single company. All failures are caught,
    /// logged with the company id, and collapse to an empty batch.
    async fn discover_company_contacts(
        &self,
        mission: &Mission,
        company_id: &str,
    ) -> Vec<ScoredCandidate> {
        let Some(company) = mission.discovered_company(company_id) else {
            warn!(company_id, "company missing from discovered set");
            return Vec::new();
        };

        let exclude: HashSet<String> = mission
            .seen_contact_ids
            .get(company_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();

        // Resolve the upstream organization via the fallback ladder when a
        // prior call never surfaced its identifier.
        let org_id = match &company.candidate.organization_id {
            Some(id) => id.clone(),
            None => {
                let target = CompanyTarget {
                    name: company.candidate.name.clone(),
                    organization_id: None,
                    website_url: company.candidate.website_url.clone(),
                };
                let matches = self.directory.find_companies(&target, &HashSet::new()).await;
                match matches.into_iter().find_map(|c| c.organization_id) {
                    Some(id) => id,
                    None => {
                        warn!(company_id, "could not resolve upstream organization");
                        return Vec::new();
                    }
                }
            }
        };

        let contacts = match self
            .directory
            .find_contacts(&[org_id], &mission.icp.job_titles, 1, &exclude)
            .await
        {
            Ok(contacts) => contacts,
            Err(e) => {
                warn!(company_id, error = %e, "contact discovery failed for company");
                return Vec::new();
            }
        };

        let ordered = self.rank_contacts(contacts).await;
        ordered
            .into_iter()
            .map(|candidate| ScoredCandidate {
                score: score(&candidate, &mission.icp),
                candidate,
            })
            .collect()
    }

    /// Order a contact batch by outreach priority via the generation
    /// service. On any failure the explicit fallback applies: keep the
    /// directory's order.
    async fn rank_contacts(&self, contacts: Vec<Candidate>) -> Vec<Candidate> {
        if contacts.len() < 2 {
            return contacts;
        }

        let roster: Vec<serde_json::Value> = contacts
            .iter()
            .map(|c| json!({"id": c.id, "name": c.name, "title": c.title}))
            .collect();
        let instruction = format!(
            "Rank these contacts by outreach priority for a B2B sales campaign, \
             decision-makers first. Respond with only JSON of the shape \
             {{\"ranked_ids\": [\"id\", ...]}} listing every id exactly once.\n\
             Contacts: {}",
            json!(roster)
        );
        let request = GenerationRequest::new(instruction)
            .with_temperature(TEMPERATURE_CLASSIFY)
            .require("ranked_ids");

        match self.genai.generate_structured(&request).await {
            Ok(value) => reorder_by_ids(contacts, &value["ranked_ids"]),
            Err(e) => {
                warn!(error = %e, "contact ranking failed, keeping directory order");
                contacts
            }
        }
    }

    /// Record one contact accept/reject. Idempotent by contact id.
    /// Exhausting the batch transitions to the company summary.
    #[instrument(skip_all, fields(user_id = %user_id, slot = %slot, contact_id = %contact_id))]
    pub async fn record_contact_decision(
        &self,
        user_id: &str,
        slot: &str,
        contact_id: &str,
        decision: Decision,
    ) -> Result<ContactReviewProgress> {
        let (mut mission, version) = self.load(user_id, slot).await?;
        Self::expect_phase(&mission, MissionPhase::ContactReview)?;

        let company_id = mission
            .current_company()
            .ok_or_else(|| ProspectorError::validation("no company under review"))?
            .to_string();
        let batch = mission
            .contact_batches
            .get(&company_id)
            .cloned()
            .unwrap_or_default();

        if !batch.iter().any(|c| c.candidate.id == contact_id) {
            return Err(ProspectorError::validation(format!(
                "contact '{contact_id}' is not in the current batch"
            )));
        }

        if !mission.contact_decisions.contains_key(contact_id) {
            mission.contact_decisions.insert(
                contact_id.to_string(),
                ContactDecision {
                    contact_id: contact_id.to_string(),
                    company_id: company_id.clone(),
                    decision,
                    decided_at: chrono::Utc::now(),
                },
            );
            mission.contact_cursor = batch
                .iter()
                .filter(|c| mission.contact_decisions.contains_key(&c.candidate.id))
                .count();
            if mission.contact_cursor >= batch.len() {
                mission.phase = MissionPhase::CompanySummary;
            }
            self.persist(&mut mission, version).await?;
        }

        Ok(ContactReviewProgress {
            decided_in_batch: mission.contact_cursor,
            batch_size: batch.len(),
            phase: mission.phase,
        })
    }

    /// Fetch another contact batch for the current company, excluding
    /// everything already seen. The exclusion set only ever grows.
    #[instrument(skip_all, fields(user_id = %user_id, slot = %slot))]
    pub async fn fetch_more_contacts(&self, user_id: &str, slot: &str) -> Result<FetchMoreReport> {
        let (mut mission, version) = self.load(user_id, slot).await?;
        if mission.phase != MissionPhase::ContactReview
            && mission.phase != MissionPhase::CompanySummary
        {
            return Err(ProspectorError::validation(format!(
                "mission is in {}, expected contact-review or company-summary",
                mission.phase
            )));
        }

        let company_id = mission
            .current_company()
            .ok_or_else(|| ProspectorError::validation("no company under review"))?
            .to_string();

        let fresh = self.discover_company_contacts(&mission, &company_id).await;
        if fresh.is_empty() {
            let batch_size = mission
                .contact_batches
                .get(&company_id)
                .map_or(0, Vec::len);
            return Ok(FetchMoreReport {
                added: 0,
                batch_size,
            });
        }

        let seen = mission.seen_contact_ids.entry(company_id.clone()).or_default();
        for contact in &fresh {
            seen.push(contact.candidate.id.clone());
        }

        let added = fresh.len();
        let batch = mission.contact_batches.entry(company_id.clone()).or_default();
        batch.extend(fresh);
        let batch_size = batch.len();

        mission.contact_cursor = mission
            .contact_batches
            .get(&company_id)
            .map_or(0, |batch| {
                batch
                    .iter()
                    .filter(|c| mission.contact_decisions.contains_key(&c.candidate.id))
                    .count()
            });
        mission.phase = MissionPhase::ContactReview;
        self.persist(&mut mission, version).await?;

        Ok(FetchMoreReport { added, batch_size })
    }

    /// Wrap up the current company and advance the cursor.
    #[instrument(skip_all, fields(user_id = %user_id, slot = %slot))]
    pub async fn complete_company(&self, user_id: &str, slot: &str) -> Result<CompanyAdvance> {
        let (mut mission, version) = self.load(user_id, slot).await?;
        Self::expect_phase(&mission, MissionPhase::CompanySummary)?;

        let company_id = mission
            .current_company()
            .ok_or_else(|| ProspectorError::validation("no company under review"))?
            .to_string();

        if !mission
            .company_summaries
            .iter()
            .any(|s| s.company_id == company_id)
        {
            let batch = mission
                .contact_batches
                .get(&company_id)
                .cloned()
                .unwrap_or_default();
            let accepted = batch
                .iter()
                .filter(|c| {
                    mission
                        .contact_decisions
                        .get(&c.candidate.id)
                        .is_some_and(|d| d.decision == Decision::Accept)
                })
                .count();
            mission.company_summaries.push(CompanySummaryEntry {
                company_id: company_id.clone(),
                contacts_reviewed: batch.len(),
                contacts_accepted: accepted,
            });
        }

        mission.company_cursor += 1;
        mission.contact_cursor = 0;
        mission.phase = if mission.company_cursor < mission.selected_companies.len() {
            MissionPhase::ContactDiscovery
        } else {
            MissionPhase::CampaignSelection
        };
        self.persist(&mut mission, version).await?;

        Ok(CompanyAdvance {
            next_company: mission.current_company().map(String::from),
            phase: mission.phase,
        })
    }

    // -----------------------------------------------------------------------
    // Campaign
    // -----------------------------------------------------------------------

    /// Choose the campaign flavor and move into generation.
    /// Re-selecting the already-chosen kind after the transition is a no-op.
    #[instrument(skip_all, fields(user_id = %user_id, slot = %slot, kind = %kind))]
    pub async fn select_campaign(
        &self,
        user_id: &str,
        slot: &str,
        kind: CampaignKind,
    ) -> Result<MissionPhase> {
        let (mut mission, version) = self.load(user_id, slot).await?;

        if mission.phase == MissionPhase::CampaignGeneration
            && mission.campaign_kind == Some(kind)
        {
            return Ok(mission.phase);
        }
        Self::expect_phase(&mission, MissionPhase::CampaignSelection)?;

        mission.campaign_kind = Some(kind);
        mission.phase = MissionPhase::CampaignGeneration;
        self.persist(&mut mission, version).await?;
        Ok(mission.phase)
    }

    /// Generate one asset per accepted contact, strictly sequentially with
    /// an inter-call delay for rate-limit compliance.
    ///
    /// Already-generated contacts are skipped (resume guard), cached
    /// results short-circuit the external call, and a failure on one
    /// contact aborts the rest while surfacing the partial asset set.
    #[instrument(skip_all, fields(user_id = %user_id, slot = %slot))]
    pub async fn generate_campaigns(
        &self,
        user_id: &str,
        slot: &str,
        progress: &dyn MissionProgress,
    ) -> Result<CampaignRunReport> {
        let (mut mission, mut version) = self.load(user_id, slot).await?;
        Self::expect_phase(&mission, MissionPhase::CampaignGeneration)?;
        let kind = mission
            .campaign_kind
            .ok_or_else(|| ProspectorError::validation("no campaign kind selected"))?;

        progress.phase("Generating campaign assets");
        let accepted: Vec<ScoredCandidate> =
            mission.accepted_contacts().into_iter().cloned().collect();
        let total = accepted.len();

        let mut generated = 0;
        let mut failed: Option<CampaignFailure> = None;
        let mut cancelled = false;
        let mut persistence_degraded = false;
        let mut made_live_call = false;

        for (index, contact) in accepted.iter().enumerate() {
            let contact_id = contact.candidate.id.clone();
            if mission.asset_for(&contact_id).is_some() {
                continue;
            }
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            progress.entity(index + 1, total, &contact.candidate.name);

            let request = build_campaign_request(kind, contact, &mission.icp);
            let hash = prompt_hash(&request.instruction, self.genai.model());

            // A cache read failure only costs us a re-paid call.
            let cached = self
                .storage
                .get_generation_cache(user_id, &hash, self.genai.model())
                .await
                .ok()
                .flatten()
                .and_then(|raw| serde_json::from_str(&raw).ok());

            let value = match cached {
                Some(value) => value,
                None => {
                    if made_live_call {
                        tokio::time::sleep(Duration::from_millis(
                            self.config.openrouter.rate_limit_ms,
                        ))
                        .await;
                    }
                    match self.genai.generate_structured(&request).await {
                        Ok(value) => {
                            made_live_call = true;
                            let _ = self
                                .storage
                                .set_generation_cache(
                                    user_id,
                                    &hash,
                                    self.genai.model(),
                                    &value.to_string(),
                                )
                                .await;
                            value
                        }
                        Err(e) => {
                            error!(contact_id = %contact_id, error = %e, "campaign generation failed");
                            failed = Some(CampaignFailure {
                                contact_id,
                                error: e.to_string(),
                            });
                            break;
                        }
                    }
                }
            };

            mission.assets.push(asset_from_value(kind, contact, &value));
            generated += 1;

            match self.persist(&mut mission, version).await {
                Ok(next) => version = next,
                Err(e) => {
                    // The asset set already produced must survive the lost save.
                    error!(error = %e, "failed to persist generated assets");
                    persistence_degraded = true;
                    break;
                }
            }
        }

        let complete = failed.is_none()
            && !cancelled
            && !persistence_degraded
            && accepted
                .iter()
                .all(|c| mission.asset_for(&c.candidate.id).is_some());
        if complete {
            mission.phase = MissionPhase::CampaignExport;
            match self.persist(&mut mission, version).await {
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "failed to persist campaign-export transition");
                    persistence_degraded = true;
                }
            }
        }

        Ok(CampaignRunReport {
            generated,
            total,
            failed,
            phase: mission.phase,
            cancelled,
            persistence_degraded,
        })
    }

    /// Render and persist the final export. The mission becomes terminal
    /// once the export output is saved; a failed save still returns the
    /// rendered bundle, flagged degraded.
    #[instrument(skip_all, fields(user_id = %user_id, slot = %slot))]
    pub async fn export(&self, user_id: &str, slot: &str) -> Result<ExportBundle> {
        let (mut mission, version) = self.load(user_id, slot).await?;
        Self::expect_phase(&mission, MissionPhase::CampaignExport)?;

        let mut bundle = export::render(&mission, self.config.scoring.hot_threshold);

        mission.exported_at = Some(chrono::Utc::now());
        if let Err(e) = self.persist(&mut mission, version).await {
            error!(error = %e, "failed to persist export; returning assets anyway");
            bundle.persistence_degraded = true;
        }

        Ok(bundle)
    }

    // -----------------------------------------------------------------------
    // Control surface helpers
    // -----------------------------------------------------------------------

    /// Current mission status.
    pub async fn status(&self, user_id: &str, slot: &str) -> Result<MissionStatus> {
        let (mission, version) = self.load(user_id, slot).await?;
        Ok(MissionStatus {
            phase: mission.phase,
            version,
            companies_discovered: mission.discovered.len(),
            sample_decided: mission.tally.total(),
            sample_size: mission.validation_sample.len(),
            companies_selected: mission.selected_companies.len(),
            company_cursor: mission.company_cursor,
            assets: mission.assets.len(),
            exported: mission.exported_at.is_some(),
        })
    }

    /// Drop the mission document, freeing its slot.
    pub async fn abandon(&self, user_id: &str, slot: &str) -> Result<()> {
        self.storage.delete_mission(user_id, slot).await
    }
}

// ---------------------------------------------------------------------------
// Free helpers
// ---------------------------------------------------------------------------

/// Score and rank candidates best-first (stable on ties).
fn rank(candidates: Vec<Candidate>, icp: &IdealCustomerProfile) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|candidate| ScoredCandidate {
            score: score(&candidate, icp),
            candidate,
        })
        .collect();
    scored.sort_by(|a, b| b.score.score.cmp(&a.score.score));
    scored
}

/// Reorder contacts by a ranked id list; unmentioned contacts keep their
/// relative order at the tail.
fn reorder_by_ids(contacts: Vec<Candidate>, ranked_ids: &serde_json::Value) -> Vec<Candidate> {
    let Some(ids) = ranked_ids.as_array() else {
        return contacts;
    };
    let order: Vec<&str> = ids.iter().filter_map(|v| v.as_str()).collect();

    let mut remaining = contacts;
    let mut ordered = Vec::with_capacity(remaining.len());
    for id in order {
        if let Some(pos) = remaining.iter().position(|c| c.id == id) {
            ordered.push(remaining.remove(pos));
        }
    }
    ordered.extend(remaining);
    ordered
}

/// Build the generation request for one contact's campaign asset.
fn build_campaign_request(
    kind: CampaignKind,
    contact: &ScoredCandidate,
    icp: &IdealCustomerProfile,
) -> GenerationRequest {
    let candidate = &contact.candidate;
    let company = candidate.company_name.as_deref().unwrap_or("their company");
    let title = candidate.title.as_deref().unwrap_or("a decision maker");
    let highlights = contact.score.match_details.join("; ");
    let industries = icp.industries.join(", ");

    match kind {
        CampaignKind::EmailSequence => GenerationRequest::new(format!(
            "Write a short, personalized cold outreach email to {name}, {title} at \
             {company}. We sell to companies in: {industries}. Match highlights: \
             {highlights}. Respond with only JSON of the shape {{\"subject\": string, \
             \"body\": string, \"personalization_score\": number from 1 to 10}}.",
            name = candidate.name,
        ))
        .with_temperature(TEMPERATURE_COPY)
        .require("subject")
        .require("body")
        .bound("personalization_score", 1.0, 10.0),
        CampaignKind::LinkedinMessage => GenerationRequest::new(format!(
            "Write a short, personalized LinkedIn connection message to {name}, \
             {title} at {company}. We sell to companies in: {industries}. Match \
             highlights: {highlights}. Respond with only JSON of the shape \
             {{\"message\": string, \"personalization_score\": number from 1 to 10}}.",
            name = candidate.name,
        ))
        .with_temperature(TEMPERATURE_COPY)
        .require("message")
        .bound("personalization_score", 1.0, 10.0),
    }
}

/// Turn a validated generation payload into a campaign asset.
fn asset_from_value(
    kind: CampaignKind,
    contact: &ScoredCandidate,
    value: &serde_json::Value,
) -> CampaignAsset {
    let body_key = match kind {
        CampaignKind::EmailSequence => "body",
        CampaignKind::LinkedinMessage => "message",
    };
    CampaignAsset {
        contact_id: contact.candidate.id.clone(),
        company_id: contact.candidate.organization_id.clone(),
        kind,
        subject: value["subject"].as_str().map(String::from),
        body: value[body_key].as_str().unwrap_or_default().to_string(),
        personalization_score: value["personalization_score"].as_f64(),
        generated_at: chrono::Utc::now(),
    }
}
