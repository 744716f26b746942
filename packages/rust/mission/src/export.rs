//! Campaign export rendering: the terminal phase's output assets.

use serde_json::{Value, json};

use crate::mission::{Decision, Mission};

/// The rendered export output.
///
/// `persistence_degraded` is set when the final save failed; the produced
/// assets are still returned.
#[derive(Debug, Clone)]
pub struct ExportBundle {
    /// Human-readable outreach list.
    pub markdown: String,
    /// Machine-readable export document.
    pub json: Value,
    pub asset_count: usize,
    pub persistence_degraded: bool,
}

/// Render the export bundle from a mission in the campaign-export phase.
pub fn render(mission: &Mission, hot_threshold: u8) -> ExportBundle {
    let mut lines = Vec::new();
    lines.push(format!("# Outreach list — mission {}", mission.id));
    lines.push(String::new());
    lines.push(format!(
        "Companies validated: {} accepted / {} reviewed",
        mission.tally.accepted.len(),
        mission.tally.total()
    ));
    lines.push(String::new());

    let mut contact_entries = Vec::new();

    for company_id in &mission.selected_companies {
        let Some(company) = mission.discovered_company(company_id) else {
            continue;
        };
        let label = if company.score.score >= hot_threshold {
            "hot"
        } else {
            "warm"
        };
        lines.push(format!(
            "## {} (score {}, {label})",
            company.candidate.name, company.score.score
        ));

        let Some(batch) = mission.contact_batches.get(company_id) else {
            lines.push("_No contacts surfaced._".into());
            lines.push(String::new());
            continue;
        };

        for contact in batch {
            let accepted = mission
                .contact_decisions
                .get(&contact.candidate.id)
                .is_some_and(|d| d.decision == Decision::Accept);
            if !accepted {
                continue;
            }

            let title = contact.candidate.title.as_deref().unwrap_or("—");
            lines.push(format!(
                "- **{}**, {title} (score {})",
                contact.candidate.name, contact.score.score
            ));
            if let Some(email) = &contact.candidate.email {
                lines.push(format!("  - email: {email}"));
            }
            if let Some(asset) = mission.asset_for(&contact.candidate.id) {
                if let Some(subject) = &asset.subject {
                    lines.push(format!("  - subject: {subject}"));
                }
                lines.push(format!("  - message: {}", asset.body.replace('\n', " ")));
            }

            contact_entries.push(json!({
                "contact": contact.candidate,
                "score": contact.score,
                "company_id": company_id,
                "asset": mission.asset_for(&contact.candidate.id),
            }));
        }
        lines.push(String::new());
    }

    let json = json!({
        "mission_id": mission.id,
        "campaign_kind": mission.campaign_kind,
        "tally": mission.tally,
        "contacts": contact_entries,
        "assets": mission.assets,
    });

    ExportBundle {
        markdown: lines.join("\n"),
        asset_count: mission.assets.len(),
        json,
        persistence_degraded: false,
    }
}
