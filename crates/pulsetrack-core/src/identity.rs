//! Visitor identity parsed from the landing-page URL.

use serde::{Deserialize, Serialize};
use url::Url;

/// Campaign attribution carried by every event.
///
/// Parsed once per session from the page's query string. Each field is
/// `None` when the parameter is absent or empty; when a parameter repeats,
/// the first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitIdentity {
    pub id: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_content: Option<String>,
}

impl VisitIdentity {
    /// Parse the identity from a full page URL.
    ///
    /// An unparseable URL yields an empty identity; tracking carries on
    /// without attribution.
    #[must_use]
    pub fn from_page_url(href: &str) -> Self {
        match Url::parse(href) {
            Ok(url) => Self::from_url(&url),
            Err(e) => {
                tracing::warn!(href, error = %e, "page URL not parseable, identity left empty");
                Self::default()
            }
        }
    }

    /// Parse the identity from an already-parsed URL.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty())
        };

        Self {
            id: param("id"),
            utm_source: param("utm_source"),
            utm_medium: param("utm_medium"),
            utm_campaign: param("utm_campaign"),
            utm_content: param("utm_content"),
        }
    }

    /// Whether any attribution field is present.
    #[must_use]
    pub fn is_attributed(&self) -> bool {
        self.id.is_some()
            || self.utm_source.is_some()
            || self.utm_medium.is_some()
            || self.utm_campaign.is_some()
            || self.utm_content.is_some()
    }
}
