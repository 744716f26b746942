//! Deterministic multi-factor ICP match scoring.
//!
//! [`score`] is a pure function from a normalized [`Candidate`] and an
//! [`IdealCustomerProfile`] to a 0–100 [`ScoreResult`]. Six weighted factors
//! sum to exactly the total; every branch records an ordered, glyph-prefixed
//! explanation so the user can audit why a prospect ranked where it did.

pub mod rules;

use prospector_shared::{Candidate, IdealCustomerProfile};
use serde::{Deserialize, Serialize};

use rules::{compile_avoid_rules, first_violation};

/// Factor weight caps. Together they sum to 100.
const MAX_TITLE: u8 = 25;
const MAX_INDUSTRY: u8 = 20;
const MAX_SIZE: u8 = 20;
const MAX_LOCATION: u8 = 15;
const MAX_NOT_AVOID: u8 = 10;
const MAX_DATA_QUALITY: u8 = 10;

/// Titles that earn partial credit without matching a target role.
const SENIORITY_KEYWORDS: &[&str] = &[
    "vp",
    "vice president",
    "director",
    "head",
    "chief",
    "manager",
    "ceo",
    "cfo",
    "cto",
    "president",
    "owner",
    "founder",
];

// ---------------------------------------------------------------------------
// ScoreResult
// ---------------------------------------------------------------------------

/// Per-factor point allocation. Each field is bounded by its factor cap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub title: u8,
    pub industry: u8,
    pub size: u8,
    pub location: u8,
    pub not_avoid: u8,
    pub data_quality: u8,
}

impl ScoreBreakdown {
    /// Sum of all factor points.
    pub fn total(&self) -> u8 {
        self.title + self.industry + self.size + self.location + self.not_avoid
            + self.data_quality
    }
}

/// The scored outcome for one candidate against one profile.
///
/// Invariant: `score == breakdown.total()`. Derived and immutable —
/// recomputed whenever candidate or profile data changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: u8,
    pub breakdown: ScoreBreakdown,
    /// Ordered explanations, one per factor branch taken.
    /// Prefixes: "✓" positive, "⚠" partial, "✗" explicit miss.
    pub match_details: Vec<String>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Score a candidate against a profile. Pure and deterministic; no I/O.
pub fn score(candidate: &Candidate, icp: &IdealCustomerProfile) -> ScoreResult {
    let mut details = Vec::new();
    let breakdown = ScoreBreakdown {
        title: score_title(candidate, icp, &mut details),
        industry: score_industry(candidate, icp, &mut details),
        size: score_size(candidate, icp, &mut details),
        location: score_location(candidate, icp, &mut details),
        not_avoid: score_not_avoid(candidate, icp, &mut details),
        data_quality: score_data_quality(candidate, &mut details),
    };

    ScoreResult {
        score: breakdown.total(),
        breakdown,
        match_details: details,
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Substring containment in either direction, case-insensitive.
fn overlaps_ci(a: &str, b: &str) -> bool {
    contains_ci(a, b) || contains_ci(b, a)
}

// --- Title (max 25) --------------------------------------------------------

fn score_title(
    candidate: &Candidate,
    icp: &IdealCustomerProfile,
    details: &mut Vec<String>,
) -> u8 {
    let Some(title) = candidate.title.as_deref().filter(|t| !t.is_empty()) else {
        details.push("✗ No title data".into());
        return 0;
    };

    for target in &icp.job_titles {
        if title.eq_ignore_ascii_case(target) {
            details.push(format!("✓ Title \"{title}\" exactly matches \"{target}\""));
            return MAX_TITLE;
        }
    }

    for target in &icp.job_titles {
        if overlaps_ci(title, target) {
            details.push(format!("✓ Title \"{title}\" closely matches \"{target}\""));
            return 20;
        }
    }

    let lowered = title.to_lowercase();
    if let Some(keyword) = SENIORITY_KEYWORDS.iter().find(|k| lowered.contains(*k)) {
        details.push(format!("⚠ Title \"{title}\" signals seniority ({keyword})"));
        return 12;
    }

    details.push(format!("✗ Title \"{title}\" does not match target roles"));
    0
}

// --- Industry (max 20) -----------------------------------------------------

fn score_industry(
    candidate: &Candidate,
    icp: &IdealCustomerProfile,
    details: &mut Vec<String>,
) -> u8 {
    let Some(industry) = candidate.industry.as_deref().filter(|i| !i.is_empty()) else {
        details.push("✗ No industry data".into());
        return 0;
    };

    for target in &icp.industries {
        if overlaps_ci(industry, target) {
            details.push(format!("✓ Industry \"{industry}\" matches \"{target}\""));
            return MAX_INDUSTRY;
        }
    }

    details.push(format!(
        "⚠ Industry \"{industry}\" is not a target, credit for data presence"
    ));
    8
}

// --- Company size (max 20) -------------------------------------------------

/// A parsed size range: inclusive `min..=max`, or open-ended for "1000+".
#[derive(Debug, Clone, PartialEq, Eq)]
struct SizeRange {
    min: u64,
    max: Option<u64>,
    label: String,
}

impl SizeRange {
    fn contains(&self, count: u64) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

/// Parse a range string of the form "min-max" or "N+". Malformed strings
/// yield `None` and are skipped, never an error.
fn parse_size_range(raw: &str) -> Option<SizeRange> {
    let trimmed = raw.trim();
    if let Some(min) = trimmed.strip_suffix('+') {
        let min = min.trim().parse().ok()?;
        return Some(SizeRange {
            min,
            max: None,
            label: trimmed.to_string(),
        });
    }

    let (min, max) = trimmed.split_once('-')?;
    let min = min.trim().parse().ok()?;
    let max = max.trim().parse().ok()?;
    Some(SizeRange {
        min,
        max: Some(max),
        label: trimmed.to_string(),
    })
}

fn score_size(
    candidate: &Candidate,
    icp: &IdealCustomerProfile,
    details: &mut Vec<String>,
) -> u8 {
    let count = candidate.employee_count.unwrap_or(0);
    if count == 0 {
        details.push("✗ Company size unknown".into());
        return 0;
    }

    let ranges: Vec<SizeRange> = icp
        .company_sizes
        .iter()
        .filter_map(|raw| parse_size_range(raw))
        .collect();

    if let Some(range) = ranges.iter().find(|r| r.contains(count)) {
        details.push(format!(
            "✓ {count} employees within target range {}",
            range.label
        ));
        return MAX_SIZE;
    }

    details.push(format!("⚠ {count} employees outside target ranges"));
    10
}

// --- Location (max 15) -----------------------------------------------------

/// Strip trailing "metro"/"area" qualifiers from a city name.
fn strip_city_suffixes(city: &str) -> String {
    let mut lowered = city.trim().to_lowercase();
    loop {
        let stripped = lowered
            .trim_end_matches("metro")
            .trim_end_matches("area")
            .trim_end()
            .to_string();
        if stripped == lowered {
            return stripped;
        }
        lowered = stripped;
    }
}

fn score_location(
    candidate: &Candidate,
    icp: &IdealCustomerProfile,
    details: &mut Vec<String>,
) -> u8 {
    let nationwide = icp
        .location_scope
        .iter()
        .any(|s| contains_ci(s, "all us") || contains_ci(s, "remote"));
    if nationwide {
        details.push("✓ Nationwide scope covers all locations".into());
        return MAX_LOCATION;
    }

    if let Some(state) = candidate.state.as_deref().filter(|s| !s.is_empty()) {
        if let Some(target) = icp.target_states.iter().find(|t| overlaps_ci(state, t)) {
            details.push(format!("✓ State {state} matches target {target}"));
            return MAX_LOCATION;
        }
    }

    if let Some(city) = candidate.city.as_deref().filter(|c| !c.is_empty()) {
        let stripped = strip_city_suffixes(city);
        if let Some(target) = icp
            .target_cities
            .iter()
            .find(|t| overlaps_ci(&stripped, &strip_city_suffixes(t)))
        {
            details.push(format!("✓ City {city} matches target {target}"));
            return MAX_LOCATION;
        }
    }

    if let Some(country) = candidate.country.as_deref() {
        if contains_ci(country, "united states") {
            details.push("⚠ US-based but outside target regions".into());
            return 5;
        }
    }

    details.push("✗ Location does not match scope".into());
    0
}

// --- Avoid list (max 10, inclusion bonus) ----------------------------------

fn score_not_avoid(
    candidate: &Candidate,
    icp: &IdealCustomerProfile,
    details: &mut Vec<String>,
) -> u8 {
    let rules = compile_avoid_rules(&icp.avoid_list);
    match first_violation(&rules, candidate) {
        Some(reason) => {
            // Degrades the score only; the candidate stays visible.
            details.push(format!("✗ Avoided: {reason}"));
            0
        }
        None => {
            details.push("✓ Not on avoid list".into());
            MAX_NOT_AVOID
        }
    }
}

// --- Data completeness (max 10) --------------------------------------------

fn score_data_quality(candidate: &Candidate, details: &mut Vec<String>) -> u8 {
    let mut points: u8 = 0;
    let mut present = Vec::new();

    if candidate.email.as_deref().is_some_and(|e| !e.is_empty()) {
        points += 5;
        present.push("email");
    }
    if candidate
        .linkedin_url
        .as_deref()
        .is_some_and(|l| !l.is_empty())
    {
        points += 3;
        present.push("linkedin");
    }
    if !candidate.phone_numbers.is_empty() {
        points += 2;
        present.push("phone");
    }

    let points = points.min(MAX_DATA_QUALITY);
    if points == 0 {
        details.push("✗ No contact data (email, linkedin, phone all missing)".into());
    } else {
        details.push(format!("✓ Contact data present: {}", present.join(", ")));
    }
    points
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn saas_icp() -> IdealCustomerProfile {
        IdealCustomerProfile {
            job_titles: vec!["VP Sales".into()],
            industries: vec!["SaaS".into()],
            company_sizes: vec!["51-200".into()],
            location_scope: vec!["All US".into()],
            ..Default::default()
        }
    }

    fn vp_sales() -> Candidate {
        Candidate {
            id: "p-1".into(),
            name: "Jordan Lee".into(),
            title: Some("VP Sales".into()),
            industry: Some("SaaS".into()),
            employee_count: Some(120),
            email: Some("jordan@vectorlabs.io".into()),
            linkedin_url: Some("https://linkedin.com/in/jordanlee".into()),
            ..Default::default()
        }
    }

    #[test]
    fn reference_scenario_scores_98() {
        let result = score(&vp_sales(), &saas_icp());
        assert_eq!(result.breakdown.title, 25);
        assert_eq!(result.breakdown.industry, 20);
        assert_eq!(result.breakdown.size, 20);
        assert_eq!(result.breakdown.location, 15);
        assert_eq!(result.breakdown.not_avoid, 10);
        assert_eq!(result.breakdown.data_quality, 8);
        assert_eq!(result.score, 98);
    }

    #[test]
    fn score_always_equals_breakdown_sum_and_stays_bounded() {
        let icps = [
            saas_icp(),
            IdealCustomerProfile::default(),
            IdealCustomerProfile {
                job_titles: vec!["Head of Growth".into(), "CMO".into()],
                industries: vec!["Fintech".into()],
                company_sizes: vec!["1000+".into(), "garbage".into()],
                target_states: vec!["CA".into()],
                target_cities: vec!["Austin".into()],
                avoid_list: "enterprise, b2c, Initech".into(),
                ..Default::default()
            },
        ];
        let candidates = [
            vp_sales(),
            Candidate::default(),
            Candidate {
                id: "org-9".into(),
                name: "Initech Consumer Goods".into(),
                industry: Some("Consumer Retail".into()),
                employee_count: Some(40_000),
                city: Some("Austin Metro".into()),
                state: Some("TX".into()),
                country: Some("United States of America".into()),
                phone_numbers: vec!["+1 512 555 0100".into()],
                ..Default::default()
            },
        ];

        for icp in &icps {
            for candidate in &candidates {
                let result = score(candidate, icp);
                assert_eq!(result.score, result.breakdown.total());
                assert!(result.score <= 100);
                assert!(result.breakdown.title <= 25);
                assert!(result.breakdown.industry <= 20);
                assert!(result.breakdown.size <= 20);
                assert!(result.breakdown.location <= 15);
                assert!(result.breakdown.not_avoid <= 10);
                assert!(result.breakdown.data_quality <= 10);
                // One explanation per factor, in factor order.
                assert_eq!(result.match_details.len(), 6);
            }
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let a = score(&vp_sales(), &saas_icp());
        let b = score(&vp_sales(), &saas_icp());
        assert_eq!(a.score, b.score);
        assert_eq!(a.match_details, b.match_details);
    }

    #[test]
    fn nationwide_scope_scores_location_regardless_of_candidate() {
        let icp = IdealCustomerProfile {
            location_scope: vec!["All US".into()],
            target_states: vec!["CA".into()],
            ..Default::default()
        };
        for candidate in [
            Candidate::default(),
            Candidate {
                country: Some("Germany".into()),
                city: Some("Berlin".into()),
                ..Default::default()
            },
        ] {
            assert_eq!(score(&candidate, &icp).breakdown.location, 15);
        }
    }

    #[test]
    fn remote_scope_counts_as_nationwide() {
        let icp = IdealCustomerProfile {
            location_scope: vec!["Remote".into()],
            ..Default::default()
        };
        assert_eq!(score(&Candidate::default(), &icp).breakdown.location, 15);
    }

    #[test]
    fn title_ladder_exact_substring_seniority_miss() {
        let icp = IdealCustomerProfile {
            job_titles: vec!["VP Sales".into()],
            ..Default::default()
        };
        let with_title = |t: &str| Candidate {
            title: Some(t.into()),
            ..Default::default()
        };

        assert_eq!(score(&with_title("vp sales"), &icp).breakdown.title, 25);
        assert_eq!(
            score(&with_title("Senior VP Sales EMEA"), &icp).breakdown.title,
            20
        );
        assert_eq!(
            score(&with_title("Director of Marketing"), &icp).breakdown.title,
            12
        );
        assert_eq!(
            score(&with_title("Software Engineer"), &icp).breakdown.title,
            0
        );
        assert_eq!(score(&Candidate::default(), &icp).breakdown.title, 0);
    }

    #[test]
    fn industry_partial_credit_for_presence() {
        let icp = IdealCustomerProfile {
            industries: vec!["SaaS".into()],
            ..Default::default()
        };
        let retail = Candidate {
            industry: Some("Retail".into()),
            ..Default::default()
        };
        let result = score(&retail, &icp);
        assert_eq!(result.breakdown.industry, 8);
        assert!(result.match_details.iter().any(|d| d.starts_with('⚠')));

        assert_eq!(score(&Candidate::default(), &icp).breakdown.industry, 0);
    }

    #[test]
    fn size_sentinel_and_malformed_ranges() {
        let icp = IdealCustomerProfile {
            company_sizes: vec!["oops".into(), "51-".into(), "1000+".into()],
            ..Default::default()
        };
        let big = Candidate {
            employee_count: Some(4000),
            ..Default::default()
        };
        assert_eq!(score(&big, &icp).breakdown.size, 20);

        let small = Candidate {
            employee_count: Some(12),
            ..Default::default()
        };
        assert_eq!(score(&small, &icp).breakdown.size, 10);

        let unknown = Candidate {
            employee_count: None,
            ..Default::default()
        };
        assert_eq!(score(&unknown, &icp).breakdown.size, 0);
    }

    #[test]
    fn parse_size_range_shapes() {
        assert_eq!(
            parse_size_range("51-200"),
            Some(SizeRange {
                min: 51,
                max: Some(200),
                label: "51-200".into()
            })
        );
        assert_eq!(
            parse_size_range(" 1000+ "),
            Some(SizeRange {
                min: 1000,
                max: None,
                label: "1000+".into()
            })
        );
        assert_eq!(parse_size_range("medium"), None);
        assert_eq!(parse_size_range("10-x"), None);
        assert_eq!(parse_size_range(""), None);
    }

    #[test]
    fn city_match_strips_metro_and_area_suffixes() {
        let icp = IdealCustomerProfile {
            target_cities: vec!["Austin".into()],
            ..Default::default()
        };
        let candidate = Candidate {
            city: Some("Austin Metro".into()),
            ..Default::default()
        };
        let result = score(&candidate, &icp);
        assert_eq!(result.breakdown.location, 15);
    }

    #[test]
    fn us_country_earns_partial_location_credit() {
        let icp = IdealCustomerProfile {
            target_states: vec!["CA".into()],
            ..Default::default()
        };
        let candidate = Candidate {
            state: Some("TX".into()),
            country: Some("United States".into()),
            ..Default::default()
        };
        assert_eq!(score(&candidate, &icp).breakdown.location, 5);
    }

    #[test]
    fn avoided_candidate_is_degraded_not_removed() {
        let icp = IdealCustomerProfile {
            industries: vec!["SaaS".into()],
            avoid_list: "Globex".into(),
            ..Default::default()
        };
        let candidate = Candidate {
            id: "org-2".into(),
            name: "Globex SaaS".into(),
            industry: Some("SaaS".into()),
            employee_count: Some(100),
            ..Default::default()
        };
        let result = score(&candidate, &icp);
        assert_eq!(result.breakdown.not_avoid, 0);
        // Still scored on the remaining factors.
        assert!(result.score > 0);
        assert!(
            result
                .match_details
                .iter()
                .any(|d| d.starts_with("✗ Avoided:"))
        );
    }

    #[test]
    fn data_quality_component_weights() {
        let full = Candidate {
            email: Some("a@b.c".into()),
            linkedin_url: Some("https://linkedin.com/in/a".into()),
            phone_numbers: vec!["+1".into()],
            ..Default::default()
        };
        assert_eq!(
            score(&full, &IdealCustomerProfile::default())
                .breakdown
                .data_quality,
            10
        );

        let phone_only = Candidate {
            phone_numbers: vec!["+1".into()],
            ..Default::default()
        };
        assert_eq!(
            score(&phone_only, &IdealCustomerProfile::default())
                .breakdown
                .data_quality,
            2
        );
    }

    #[test]
    fn match_details_keep_factor_order_and_glyphs() {
        let result = score(&vp_sales(), &saas_icp());
        let details = &result.match_details;
        assert!(details[0].contains("Title"));
        assert!(details[1].contains("Industry"));
        assert!(details[2].contains("employees"));
        assert!(details[3].contains("scope"));
        assert!(details[4].contains("avoid list"));
        assert!(details[5].contains("Contact data"));
        for detail in details {
            assert!(
                detail.starts_with('✓') || detail.starts_with('⚠') || detail.starts_with('✗'),
                "unexpected prefix in {detail:?}"
            );
        }
    }
}
