//! Wire shapes for the directory provider API and normalization into
//! [`Candidate`] records.

use prospector_shared::Candidate;
use serde::Deserialize;

/// Response envelope for company search endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct OrganizationSearchResponse {
    #[serde(default)]
    pub organizations: Vec<OrgRecord>,
}

/// Response envelope for the organization-by-id endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct OrganizationEnvelope {
    pub organization: Option<OrgRecord>,
}

/// Response envelope for people search endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PeopleSearchResponse {
    #[serde(default)]
    pub people: Vec<PersonRecord>,
}

/// An upstream organization record.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct OrgRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub website_url: Option<String>,
    pub primary_domain: Option<String>,
    pub industry: Option<String>,
    pub estimated_num_employees: Option<u64>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub linkedin_url: Option<String>,
    pub primary_phone: Option<PhoneRecord>,
}

/// An upstream phone record.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PhoneRecord {
    pub number: Option<String>,
}

/// An upstream person record, with the employer organization nested.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PersonRecord {
    #[serde(default)]
    pub id: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub linkedin_url: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub phone_numbers: Vec<PhoneRecord>,
    pub organization: Option<OrgRecord>,
}

impl OrgRecord {
    /// Normalize into the shared candidate shape.
    pub(crate) fn into_candidate(self) -> Candidate {
        let phone_numbers = self
            .primary_phone
            .and_then(|p| p.number)
            .into_iter()
            .collect();
        Candidate {
            id: self.id.clone(),
            name: self.name,
            industry: self.industry,
            employee_count: self.estimated_num_employees,
            city: self.city,
            state: self.state,
            country: self.country,
            linkedin_url: self.linkedin_url,
            phone_numbers,
            website_url: self.website_url,
            organization_id: Some(self.id),
            ..Default::default()
        }
    }
}

impl PersonRecord {
    /// Normalize into the shared candidate shape, flattening employer
    /// firmographics so scoring sees one record.
    pub(crate) fn into_candidate(self) -> Candidate {
        let name = self.name.unwrap_or_else(|| {
            let first = self.first_name.unwrap_or_default();
            let last = self.last_name.unwrap_or_default();
            format!("{first} {last}").trim().to_string()
        });

        let phone_numbers = self
            .phone_numbers
            .into_iter()
            .filter_map(|p| p.number)
            .collect();

        let org = self.organization;
        Candidate {
            id: self.id,
            name,
            title: self.title,
            industry: org.as_ref().and_then(|o| o.industry.clone()),
            employee_count: org.as_ref().and_then(|o| o.estimated_num_employees),
            city: self.city.or_else(|| org.as_ref().and_then(|o| o.city.clone())),
            state: self
                .state
                .or_else(|| org.as_ref().and_then(|o| o.state.clone())),
            country: self
                .country
                .or_else(|| org.as_ref().and_then(|o| o.country.clone())),
            email: self.email,
            linkedin_url: self.linkedin_url,
            phone_numbers,
            website_url: org.as_ref().and_then(|o| o.website_url.clone()),
            organization_id: org.as_ref().map(|o| o.id.clone()),
            company_name: org.map(|o| o.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_record_normalizes() {
        let json = r#"{
            "id": "org-1",
            "name": "Vector Labs",
            "website_url": "https://www.vectorlabs.io",
            "industry": "SaaS",
            "estimated_num_employees": 120,
            "city": "Austin",
            "state": "TX",
            "country": "United States",
            "primary_phone": {"number": "+1 512 555 0100"}
        }"#;
        let record: OrgRecord = serde_json::from_str(json).expect("deserialize");
        let candidate = record.into_candidate();
        assert_eq!(candidate.id, "org-1");
        assert_eq!(candidate.organization_id.as_deref(), Some("org-1"));
        assert_eq!(candidate.employee_count, Some(120));
        assert_eq!(candidate.phone_numbers, vec!["+1 512 555 0100"]);
        assert!(candidate.title.is_none());
    }

    #[test]
    fn person_record_flattens_employer() {
        let json = r#"{
            "id": "p-1",
            "first_name": "Jordan",
            "last_name": "Lee",
            "title": "VP Sales",
            "email": "jordan@vectorlabs.io",
            "phone_numbers": [{"number": "+1 512 555 0101"}, {"number": null}],
            "organization": {
                "id": "org-1",
                "name": "Vector Labs",
                "industry": "SaaS",
                "estimated_num_employees": 120,
                "state": "TX"
            }
        }"#;
        let record: PersonRecord = serde_json::from_str(json).expect("deserialize");
        let candidate = record.into_candidate();
        assert_eq!(candidate.name, "Jordan Lee");
        assert_eq!(candidate.title.as_deref(), Some("VP Sales"));
        assert_eq!(candidate.industry.as_deref(), Some("SaaS"));
        assert_eq!(candidate.employee_count, Some(120));
        assert_eq!(candidate.state.as_deref(), Some("TX"));
        assert_eq!(candidate.company_name.as_deref(), Some("Vector Labs"));
        assert_eq!(candidate.phone_numbers.len(), 1);
    }

    #[test]
    fn empty_search_response_deserializes() {
        let response: OrganizationSearchResponse = serde_json::from_str("{}").expect("parse");
        assert!(response.organizations.is_empty());
    }
}
