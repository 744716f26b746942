//! Ordered fallback strategies for resolving a target company upstream.
//!
//! Each rung is tried only when the previous one yields zero usable
//! results; a rung's network or parse failure is caught by the caller and
//! control falls through. Running out of rungs is a normal outcome.

use url::Url;

/// A single rung of the company-resolution ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SearchStrategy {
    /// Exact upstream organization identifier lookup.
    Identifier(String),
    /// Domain-only search on the registrable domain.
    Domain(String),
    /// Free-text organization-name search.
    Name(String),
}

impl std::fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identifier(id) => write!(f, "identifier({id})"),
            Self::Domain(domain) => write!(f, "domain({domain})"),
            Self::Name(name) => write!(f, "name({name})"),
        }
    }
}

/// Target entity for company resolution.
#[derive(Debug, Clone, Default)]
pub struct CompanyTarget {
    /// Company name as the user or a prior phase knows it.
    pub name: String,
    /// Upstream organization identifier, if a prior call surfaced one.
    pub organization_id: Option<String>,
    /// Company website, if known.
    pub website_url: Option<String>,
}

/// Build the ladder for a target: identifier (when present), then domain
/// (when a website parses), then name.
pub(crate) fn build_ladder(target: &CompanyTarget) -> Vec<SearchStrategy> {
    let mut rungs = Vec::new();

    if let Some(id) = target.organization_id.as_deref().filter(|s| !s.is_empty()) {
        rungs.push(SearchStrategy::Identifier(id.to_string()));
    }

    if let Some(domain) = target
        .website_url
        .as_deref()
        .and_then(registrable_domain)
    {
        rungs.push(SearchStrategy::Domain(domain));
    }

    let name = strip_trademark_glyphs(&target.name);
    if !name.is_empty() {
        rungs.push(SearchStrategy::Name(name));
    }

    rungs
}

/// Extract the registrable domain from a website URL: protocol and a
/// leading `www.` stripped, host lowercased.
pub(crate) fn registrable_domain(website: &str) -> Option<String> {
    let trimmed = website.trim();
    if trimmed.is_empty() {
        return None;
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.to_lowercase();
    let domain = host.strip_prefix("www.").unwrap_or(&host);
    if domain.is_empty() {
        None
    } else {
        Some(domain.to_string())
    }
}

/// Remove trademark/registration glyphs from a free-text company name.
pub(crate) fn strip_trademark_glyphs(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '™' | '®' | '©'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_orders_identifier_domain_name() {
        let target = CompanyTarget {
            name: "Vector Labs™".into(),
            organization_id: Some("org-1".into()),
            website_url: Some("https://www.vectorlabs.io/about".into()),
        };
        let rungs = build_ladder(&target);
        assert_eq!(
            rungs,
            vec![
                SearchStrategy::Identifier("org-1".into()),
                SearchStrategy::Domain("vectorlabs.io".into()),
                SearchStrategy::Name("Vector Labs".into()),
            ]
        );
    }

    #[test]
    fn identifier_rung_absent_without_id() {
        let target = CompanyTarget {
            name: "Vector Labs".into(),
            ..Default::default()
        };
        let rungs = build_ladder(&target);
        assert_eq!(rungs, vec![SearchStrategy::Name("Vector Labs".into())]);
    }

    #[test]
    fn registrable_domain_strips_protocol_and_www() {
        assert_eq!(
            registrable_domain("https://www.example.com/path"),
            Some("example.com".into())
        );
        assert_eq!(
            registrable_domain("http://Example.COM"),
            Some("example.com".into())
        );
        assert_eq!(
            registrable_domain("docs.example.io"),
            Some("docs.example.io".into())
        );
        assert_eq!(registrable_domain(""), None);
        assert_eq!(registrable_domain("   "), None);
    }

    #[test]
    fn trademark_glyphs_are_stripped() {
        assert_eq!(strip_trademark_glyphs("Initech® Systems™"), "Initech Systems");
        assert_eq!(strip_trademark_glyphs("Plain Name"), "Plain Name");
        assert_eq!(strip_trademark_glyphs("©"), "");
    }
}
