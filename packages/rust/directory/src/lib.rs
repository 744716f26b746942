//! Directory search adapter over a third-party company/contact directory.
//!
//! Wraps the provider's HTTP API behind three operations:
//! - [`DirectoryClient::search_market`] — broad company discovery from an ICP
//! - [`DirectoryClient::find_companies`] — resolve one target company via an
//!   ordered fallback ladder (identifier → domain → free-text name)
//! - [`DirectoryClient::find_contacts`] — people search within organizations
//!
//! Ladder rungs are isolated: a failing rung is logged and skipped, and an
//! exhausted ladder returns an empty list rather than an error.

mod ladder;
mod wire;

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument, warn};

use prospector_shared::{ApolloConfig, Candidate, IdealCustomerProfile, ProspectorError, Result};

pub use ladder::CompanyTarget;
use ladder::{SearchStrategy, build_ladder};
use wire::{OrgRecord, OrganizationEnvelope, OrganizationSearchResponse, PeopleSearchResponse};

/// User-Agent string for directory requests.
const USER_AGENT: &str = concat!("Prospector/", env!("CARGO_PKG_VERSION"));

/// Client for the company/contact directory provider.
pub struct DirectoryClient {
    client: Client,
    base_url: String,
    api_key: String,
    result_cap: u32,
}

impl DirectoryClient {
    /// Create a new client from provider config and a resolved API key.
    pub fn new(config: &ApolloConfig, api_key: String, result_cap: u32) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(3))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProspectorError::Upstream(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            result_cap,
        })
    }

    // -----------------------------------------------------------------------
    // Broad market discovery
    // -----------------------------------------------------------------------

    /// Enumerate the addressable company set for a profile.
    ///
    /// One page per call; the caller owns pagination and exclusion
    /// accumulation across "show more" cycles.
    #[instrument(skip_all, fields(page = page, excluded = exclude_ids.len()))]
    pub async fn search_market(
        &self,
        icp: &IdealCustomerProfile,
        page: u32,
        exclude_ids: &HashSet<String>,
    ) -> Result<Vec<Candidate>> {
        let body = json!({
            "q_organization_industry_tag_names": icp.industries,
            "organization_num_employees_ranges": icp.company_sizes,
            "organization_locations": market_locations(icp),
            "page": page,
            "per_page": self.result_cap,
        });

        let response: OrganizationSearchResponse =
            self.post_json("/mixed_companies/search", &body).await?;

        Ok(normalize_orgs(response.organizations, exclude_ids))
    }

    // -----------------------------------------------------------------------
    // Company resolution ladder
    // -----------------------------------------------------------------------

    /// Resolve a target company via the fallback ladder.
    ///
    /// Each strategy runs only if the previous yielded zero usable
    /// (non-excluded) results; a rung failure is caught and logged, never
    /// raised. An exhausted ladder returns an empty list.
    #[instrument(skip_all, fields(target = %target.name))]
    pub async fn find_companies(
        &self,
        target: &CompanyTarget,
        exclude_ids: &HashSet<String>,
    ) -> Vec<Candidate> {
        for strategy in build_ladder(target) {
            match self.run_strategy(&strategy).await {
                Ok(records) => {
                    let usable = normalize_orgs(records, exclude_ids);
                    if !usable.is_empty() {
                        debug!(strategy = %strategy, hits = usable.len(), "strategy matched");
                        return usable;
                    }
                    debug!(strategy = %strategy, "no usable results, falling through");
                }
                Err(e) => {
                    warn!(strategy = %strategy, error = %e, "strategy failed, falling through");
                }
            }
        }
        Vec::new()
    }

    async fn run_strategy(&self, strategy: &SearchStrategy) -> Result<Vec<OrgRecord>> {
        match strategy {
            SearchStrategy::Identifier(id) => {
                let envelope: OrganizationEnvelope =
                    self.get_json(&format!("/organizations/{id}")).await?;
                Ok(envelope.organization.into_iter().collect())
            }
            SearchStrategy::Domain(domain) => {
                let body = json!({
                    "q_organization_domains": [domain],
                    "page": 1,
                    "per_page": self.result_cap,
                });
                let response: OrganizationSearchResponse =
                    self.post_json("/mixed_companies/search", &body).await?;
                Ok(response.organizations)
            }
            SearchStrategy::Name(name) => {
                let body = json!({
                    "q_organization_name": name,
                    "page": 1,
                    "per_page": self.result_cap,
                });
                let response: OrganizationSearchResponse =
                    self.post_json("/mixed_companies/search", &body).await?;
                Ok(response.organizations)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Contact search
    // -----------------------------------------------------------------------

    /// Search people at the given organizations matching any target title.
    #[instrument(skip_all, fields(orgs = organization_ids.len(), page = page))]
    pub async fn find_contacts(
        &self,
        organization_ids: &[String],
        titles: &[String],
        page: u32,
        exclude_ids: &HashSet<String>,
    ) -> Result<Vec<Candidate>> {
        let body = json!({
            "organization_ids": organization_ids,
            "person_titles": titles,
            "page": page,
            "per_page": self.result_cap,
        });

        let response: PeopleSearchResponse =
            self.post_json("/mixed_people/search", &body).await?;

        Ok(response
            .people
            .into_iter()
            .filter(|p| !exclude_ids.contains(&p.id))
            .map(|p| p.into_candidate())
            .collect())
    }

    // -----------------------------------------------------------------------
    // HTTP plumbing
    // -----------------------------------------------------------------------

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProspectorError::Upstream(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProspectorError::Upstream(format!("{url}: HTTP {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProspectorError::Upstream(format!("{url}: invalid response: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProspectorError::Upstream(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProspectorError::Upstream(format!("{url}: HTTP {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProspectorError::Upstream(format!("{url}: invalid response: {e}")))
    }
}

/// Location terms for broad discovery, derived from the profile scope.
fn market_locations(icp: &IdealCustomerProfile) -> Vec<String> {
    let nationwide = icp
        .location_scope
        .iter()
        .any(|s| s.to_lowercase().contains("all us") || s.to_lowercase().contains("remote"));
    if nationwide {
        return vec!["United States".into()];
    }

    let mut locations: Vec<String> = icp.target_states.clone();
    locations.extend(icp.target_cities.iter().cloned());
    locations
}

/// Drop excluded upstream ids, then normalize the rest.
fn normalize_orgs(records: Vec<OrgRecord>, exclude_ids: &HashSet<String>) -> Vec<Candidate> {
    records
        .into_iter()
        .filter(|r| !exclude_ids.contains(&r.id))
        .map(|r| r.into_candidate())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> DirectoryClient {
        let config = ApolloConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        DirectoryClient::new(&config, "test-key".into(), 25).expect("build client")
    }

    fn org_json(id: &str, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "industry": "SaaS",
            "estimated_num_employees": 120,
            "state": "TX",
            "country": "United States"
        })
    }

    #[tokio::test]
    async fn identifier_failure_falls_through_to_domain() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/organizations/org-1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/mixed_companies/search"))
            .and(body_partial_json(json!({
                "q_organization_domains": ["vectorlabs.io"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organizations": [org_json("org-1", "Vector Labs")]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let target = CompanyTarget {
            name: "Vector Labs".into(),
            organization_id: Some("org-1".into()),
            website_url: Some("https://www.vectorlabs.io".into()),
        };

        let results = client.find_companies(&target, &HashSet::new()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Vector Labs");
    }

    #[tokio::test]
    async fn exhausted_ladder_returns_empty_not_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/mixed_companies/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"organizations": []})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let target = CompanyTarget {
            name: "Ghost Startup".into(),
            ..Default::default()
        };

        let results = client.find_companies(&target, &HashSet::new()).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn exclusions_push_ladder_to_next_rung() {
        let server = MockServer::start().await;

        // Domain rung only finds the already-seen org.
        Mock::given(method("POST"))
            .and(path("/mixed_companies/search"))
            .and(body_partial_json(json!({
                "q_organization_domains": ["vectorlabs.io"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organizations": [org_json("org-seen", "Vector Labs")]
            })))
            .mount(&server)
            .await;

        // Name rung surfaces a fresh org.
        Mock::given(method("POST"))
            .and(path("/mixed_companies/search"))
            .and(body_partial_json(json!({
                "q_organization_name": "Vector Labs"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organizations": [org_json("org-seen", "Vector Labs"), org_json("org-2", "Vector Labs Europe")]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let target = CompanyTarget {
            name: "Vector Labs™".into(),
            organization_id: None,
            website_url: Some("vectorlabs.io".into()),
        };
        let excluded: HashSet<String> = ["org-seen".to_string()].into();

        let results = client.find_companies(&target, &excluded).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "org-2");
    }

    #[tokio::test]
    async fn ladder_is_idempotent_under_fixed_exclusions() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/mixed_companies/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organizations": [org_json("org-1", "Vector Labs"), org_json("org-2", "Vector Labs EU")]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let target = CompanyTarget {
            name: "Vector Labs".into(),
            ..Default::default()
        };
        let excluded: HashSet<String> = ["org-2".to_string()].into();

        let first: Vec<String> = client
            .find_companies(&target, &excluded)
            .await
            .into_iter()
            .map(|c| c.id)
            .collect();
        let second: Vec<String> = client
            .find_companies(&target, &excluded)
            .await
            .into_iter()
            .map(|c| c.id)
            .collect();

        assert_eq!(first, vec!["org-1"]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn market_search_filters_exclusions() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/mixed_companies/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organizations": [org_json("org-1", "A"), org_json("org-2", "B")]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let icp = IdealCustomerProfile {
            industries: vec!["SaaS".into()],
            location_scope: vec!["All US".into()],
            ..Default::default()
        };
        let excluded: HashSet<String> = ["org-1".to_string()].into();

        let results = client.search_market(&icp, 1, &excluded).await.expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "org-2");
    }

    #[tokio::test]
    async fn market_search_upstream_failure_propagates() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/mixed_companies/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let result = client
            .search_market(&IdealCustomerProfile::default(), 1, &HashSet::new())
            .await;
        assert!(matches!(result, Err(ProspectorError::Upstream(_))));
    }

    #[tokio::test]
    async fn contact_search_normalizes_and_excludes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/mixed_people/search"))
            .and(body_partial_json(json!({"organization_ids": ["org-1"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "people": [
                    {
                        "id": "p-1",
                        "first_name": "Jordan",
                        "last_name": "Lee",
                        "title": "VP Sales",
                        "email": "jordan@vectorlabs.io",
                        "organization": org_json("org-1", "Vector Labs")
                    },
                    {"id": "p-seen", "name": "Already Seen", "title": "CTO"}
                ]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let excluded: HashSet<String> = ["p-seen".to_string()].into();
        let contacts = client
            .find_contacts(
                &["org-1".to_string()],
                &["VP Sales".to_string()],
                1,
                &excluded,
            )
            .await
            .expect("contacts");

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].name, "Jordan Lee");
        assert_eq!(contacts[0].company_name.as_deref(), Some("Vector Labs"));
    }

    #[test]
    fn market_locations_prefers_nationwide() {
        let icp = IdealCustomerProfile {
            location_scope: vec!["All US".into()],
            target_states: vec!["CA".into()],
            ..Default::default()
        };
        assert_eq!(market_locations(&icp), vec!["United States"]);

        let regional = IdealCustomerProfile {
            target_states: vec!["CA".into()],
            target_cities: vec!["Austin".into()],
            ..Default::default()
        };
        assert_eq!(market_locations(&regional), vec!["CA", "Austin"]);
    }
}
