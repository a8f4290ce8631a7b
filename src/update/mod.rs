//! Update-check gating against the distribution server.

use crate::{
    client::{stored_license_key, REQUEST_TIMEOUT},
    module::{ModuleConfig, ModuleKind, DAY},
    site::Site,
    store::Store,
    tree::Tree,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// A release the host updater should install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingUpdate {
    pub slug: String,
    pub file: String,
    pub version: String,
    pub tested: String,
    pub package: String,
}

pub struct UpdateGate<'a> {
    http: &'a reqwest::Client,
    store: &'a dyn Store,
    site: &'a Site,
    config: &'a ModuleConfig,
}

impl<'a> UpdateGate<'a> {
    pub(crate) fn new(
        http: &'a reqwest::Client,
        store: &'a dyn Store,
        site: &'a Site,
        config: &'a ModuleConfig,
    ) -> Self {
        Self {
            http,
            store,
            site,
            config,
        }
    }

    /// Fetches the latest-version metadata, cached for a day. Failures are
    /// not cached, so the next check retries.
    pub async fn check(&self) -> Option<Tree> {
        let url = self.config.update_check_url()?;
        let cache_key = self.config.storage_key("update_cache");

        if let Some(cached) = self.store.get_transient(&cache_key) {
            if let Some(body) = cached.as_str() {
                debug!(module = %self.config.short_id(), "update cache hit");
                return Some(Tree::parse(body));
            }
        }

        let key = stored_license_key(self.store, self.config).unwrap_or_default();
        let query = [
            ("license_key", key.as_str()),
            ("site_url", self.site.url()),
            ("product_permalink", self.config.short_id()),
            ("host_version", self.site.host_version()),
            ("version", self.config.version()),
        ];

        let response = match self
            .http
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .header("Accept", "application/json")
            .query(&query)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, url, "update check request failed");
                return None;
            }
        };

        if response.status().as_u16() != 200 {
            warn!(
                module = %self.config.short_id(),
                status = response.status().as_u16(),
                "update server answered with an error status"
            );
            return None;
        }

        let body = response.text().await.unwrap_or_default();
        if body.is_empty() {
            return None;
        }

        self.store
            .set_transient(&cache_key, Value::from(body.clone()), DAY);

        Some(Tree::parse(&body))
    }

    /// Trims server metadata down to the fields the host update UI may
    /// see. Theme metadata passes through untrimmed.
    pub fn info(&self, remote: &Tree) -> Tree {
        if self.config.kind() == ModuleKind::Theme {
            return remote.clone();
        }

        let mut trimmed = remote.clone();

        let sections = remote.get("sections");
        trimmed.set(
            "sections",
            json!({
                "description": sections.get("description").value(),
                "installation": sections.get("installation").value(),
                "changelog": sections.get("changelog").value(),
            }),
        );

        if remote.get("banners").is_truthy() {
            let banners = remote.get("banners");
            trimmed.set(
                "banners",
                json!({
                    "low": banners.get("low").value(),
                    "high": banners.get("high").value(),
                }),
            );
        }

        trimmed
    }

    /// The release to surface, or `None` when the module is current or the
    /// environment can't run the remote build.
    pub fn pending(&self, remote: &Tree) -> Option<PendingUpdate> {
        let version = remote.get("version").text();

        if !version_lt(self.config.version(), &version) {
            return None;
        }
        if !version_lt(&remote.get("requires").text(), self.site.host_version()) {
            return None;
        }
        if !version_lt(
            &remote.get("requires_runtime").text(),
            self.site.runtime_version(),
        ) {
            return None;
        }

        Some(PendingUpdate {
            slug: remote.get("slug").text(),
            file: remote.get("file").text(),
            version,
            tested: remote.get("tested").text(),
            package: remote.get("download_url").text(),
        })
    }

    /// Drops the cached metadata; hosts call this from their post-upgrade
    /// hook so the next check isn't served stale data.
    pub fn purge(&self) {
        self.store
            .delete_transient(&self.config.storage_key("update_cache"));
    }
}

/// Dotted version comparison: segment-wise numeric, missing segments are
/// zero, non-numeric segments compare lexically.
pub(crate) fn version_lt(a: &str, b: &str) -> bool {
    cmp_versions(a, b) == Ordering::Less
}

fn cmp_versions(a: &str, b: &str) -> Ordering {
    let a: Vec<&str> = a.trim().split('.').collect();
    let b: Vec<&str> = b.trim().split('.').collect();

    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or("0");
        let y = b.get(i).copied().unwrap_or("0");

        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => x.cmp(y),
        };

        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_segments() {
        assert!(version_lt("1.2.3", "1.2.4"));
        assert!(version_lt("1.9", "1.10"));
        assert!(version_lt("2.0", "10.0"));
        assert!(!version_lt("1.2.4", "1.2.3"));
        assert!(!version_lt("3.1", "3.1"));
    }

    #[test]
    fn missing_segments_are_zero() {
        assert!(version_lt("1.2", "1.2.1"));
        assert!(!version_lt("1.2.0", "1.2"));
        assert!(!version_lt("1.2", "1.2.0"));
    }

    #[test]
    fn empty_versions_sort_first() {
        assert!(version_lt("", "0.1"));
        assert!(version_lt("", "6.4"));
    }

    #[test]
    fn non_numeric_segments_fall_back_to_lexical() {
        assert!(version_lt("1.0-beta", "1.0-rc"));
        assert!(!version_lt("1.0-rc", "1.0-beta"));
    }
}
