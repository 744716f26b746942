//! Avoid-list rule table.
//!
//! The free-text avoid list compiles into an ordered set of rules, each an
//! independent matcher with a human-readable description. Rules only zero
//! the avoid factor; a matched candidate stays in the result set with a
//! degraded score.

use prospector_shared::Candidate;

/// Employee count above which the "enterprise" keyword triggers.
const ENTERPRISE_HEADCOUNT: u64 = 1000;

/// A single avoid rule: decides whether a candidate is flagged, and says why.
///
/// New rule kinds slot in by implementing this trait and registering in
/// [`compile_avoid_rules`]; the scoring engine never inspects rule internals.
pub trait AvoidRule: Send + Sync {
    /// Whether this rule flags the candidate.
    fn applies(&self, candidate: &Candidate) -> bool;

    /// Human-readable description for match details.
    fn describe(&self) -> String;
}

/// Flags candidates whose company name contains a listed token.
struct NameTokenRule {
    token: String,
}

impl AvoidRule for NameTokenRule {
    fn applies(&self, candidate: &Candidate) -> bool {
        let company = candidate
            .company_name
            .as_deref()
            .unwrap_or(&candidate.name);
        company.to_lowercase().contains(&self.token)
    }

    fn describe(&self) -> String {
        format!("company name contains \"{}\"", self.token)
    }
}

/// Flags enterprise-scale companies when the avoid list says "enterprise".
struct EnterpriseScaleRule;

impl AvoidRule for EnterpriseScaleRule {
    fn applies(&self, candidate: &Candidate) -> bool {
        candidate.employee_count.is_some_and(|n| n > ENTERPRISE_HEADCOUNT)
    }

    fn describe(&self) -> String {
        format!("enterprise scale (over {ENTERPRISE_HEADCOUNT} employees)")
    }
}

/// Flags consumer-market companies when the avoid list says "b2c".
struct ConsumerMarketRule;

impl AvoidRule for ConsumerMarketRule {
    fn applies(&self, candidate: &Candidate) -> bool {
        candidate
            .industry
            .as_deref()
            .is_some_and(|i| i.to_lowercase().contains("consumer"))
    }

    fn describe(&self) -> String {
        "consumer-market industry".into()
    }
}

/// Compile the free-text avoid list into the rule table.
///
/// Comma-split tokens become name-containment rules; the "enterprise" and
/// "b2c" keywords additionally arm their scale/market rules.
pub fn compile_avoid_rules(avoid_list: &str) -> Vec<Box<dyn AvoidRule>> {
    let mut rules: Vec<Box<dyn AvoidRule>> = Vec::new();

    for token in avoid_list.split(',') {
        let token = token.trim().to_lowercase();
        if !token.is_empty() {
            rules.push(Box::new(NameTokenRule { token }));
        }
    }

    let lowered = avoid_list.to_lowercase();
    if lowered.contains("enterprise") {
        rules.push(Box::new(EnterpriseScaleRule));
    }
    if lowered.contains("b2c") {
        rules.push(Box::new(ConsumerMarketRule));
    }

    rules
}

/// First rule flagging the candidate, if any. Returns its description.
pub fn first_violation(rules: &[Box<dyn AvoidRule>], candidate: &Candidate) -> Option<String> {
    rules
        .iter()
        .find(|rule| rule.applies(candidate))
        .map(|rule| rule.describe())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(name: &str, employees: Option<u64>, industry: Option<&str>) -> Candidate {
        Candidate {
            id: "org-1".into(),
            name: name.into(),
            employee_count: employees,
            industry: industry.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn name_token_matches_case_insensitively() {
        let rules = compile_avoid_rules("Acme, Globex");
        let c = company("ACME Holdings", None, None);
        let hit = first_violation(&rules, &c).expect("should be flagged");
        assert!(hit.contains("acme"));
    }

    #[test]
    fn enterprise_keyword_flags_large_companies_only() {
        let rules = compile_avoid_rules("no enterprise accounts");
        assert!(first_violation(&rules, &company("BigCo", Some(5000), None)).is_some());
        assert!(first_violation(&rules, &company("SmallCo", Some(200), None)).is_none());
        assert!(first_violation(&rules, &company("NoData", None, None)).is_none());
    }

    #[test]
    fn b2c_keyword_flags_consumer_industries() {
        let rules = compile_avoid_rules("b2c");
        let flagged = company("ShopCo", None, Some("Consumer Electronics"));
        assert!(first_violation(&rules, &flagged).is_some());
        let clean = company("DevTools Inc", None, Some("Developer Tools"));
        assert!(first_violation(&rules, &clean).is_none());
    }

    #[test]
    fn contact_uses_employer_name() {
        let rules = compile_avoid_rules("globex");
        let contact = Candidate {
            id: "p-1".into(),
            name: "Jordan Lee".into(),
            company_name: Some("Globex Corporation".into()),
            ..Default::default()
        };
        assert!(first_violation(&rules, &contact).is_some());
    }

    #[test]
    fn empty_avoid_list_compiles_no_rules() {
        assert!(compile_avoid_rules("").is_empty());
        assert!(compile_avoid_rules("  ,  , ").is_empty());
    }
}
