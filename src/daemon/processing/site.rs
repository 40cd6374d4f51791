use std::{borrow::Borrow, fmt::Display, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Canonical `scheme://host` identifier of a website. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Site(Arc<str>);

impl Site {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Site {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Sites the user doesn't want to be tracked. Duplicates are allowed, membership is all that
/// matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoreList(Vec<Site>);

impl IgnoreList {
    pub fn contains(&self, site: &Site) -> bool {
        self.0.iter().any(|ignored| ignored == site)
    }

    pub fn push(&mut self, site: Site) {
        self.0.push(site);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Site> {
        self.0.iter()
    }
}

impl FromIterator<Site> for IgnoreList {
    fn from_iter<T: IntoIterator<Item = Site>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Extracts `scheme://host` from a url without looking at the ignore list.
/// `chrome://extensions/some/other?blah=ffdf` becomes `chrome://extensions`.
///
/// The scheme has to be made of word characters and the host has to be non-empty, everything
/// after the first `/` following the host is dropped.
pub fn extract_site(url: &str) -> Option<Site> {
    let (scheme, rest) = url.split_once("://")?;
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }

    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() || host.contains(['\n', '\r']) {
        return None;
    }

    Some(Site(format!("{scheme}://{host}").into()))
}

/// Returns the site a url belongs to, or `None` when the url is malformed or the site is ignored.
pub fn normalize(url: &str, ignored: &IgnoreList) -> Option<Site> {
    let site = extract_site(url)?;
    if ignored.contains(&site) {
        debug!("Site is on ignore list: {site}");
        return None;
    }
    Some(site)
}

#[cfg(test)]
pub(crate) fn site(value: &str) -> Site {
    Site(value.into())
}

#[cfg(test)]
mod tests {
    use super::{extract_site, normalize, site, IgnoreList};

    #[test]
    fn test_same_host_gives_same_site() {
        let urls = [
            "http://a.com/",
            "http://a.com/x",
            "http://a.com/x/y?z=1#frag",
            "http://a.com",
        ];
        for url in urls {
            assert_eq!(extract_site(url), Some(site("http://a.com")), "{url}");
        }
    }

    #[test]
    fn test_scheme_is_part_of_site() {
        assert_eq!(
            extract_site("chrome://extensions/some/other?blah=ffdf"),
            Some(site("chrome://extensions"))
        );
        assert_ne!(extract_site("https://a.com/"), extract_site("http://a.com/"));
        assert_eq!(
            extract_site("http://localhost:8080/x"),
            Some(site("http://localhost:8080"))
        );
    }

    #[test]
    fn test_malformed_urls() {
        let urls = [
            "",
            "a.com/x",
            "about:blank",
            "http:///path",
            "://a.com/",
            "chrome-extension://abc/page.html",
            "file:///home/user/page.html",
        ];
        for url in urls {
            assert_eq!(extract_site(url), None, "{url}");
        }
    }

    #[test]
    fn test_normalize_filters_ignored_sites() {
        let ignored: IgnoreList = [site("http://b.com")].into_iter().collect();

        assert_eq!(normalize("http://b.com/x", &ignored), None);
        assert_eq!(normalize("http://b.com", &ignored), None);
        assert_eq!(
            normalize("https://b.com/x", &ignored),
            Some(site("https://b.com"))
        );
        assert_eq!(
            normalize("http://a.com/x", &ignored),
            Some(site("http://a.com"))
        );
    }
}
