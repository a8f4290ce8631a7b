//! Remote license verification with response caching and activation
//! accounting.

use crate::{module::ModuleConfig, site::Site, store::Store, tree::Tree};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a license lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LicenseLookup {
    /// No license key has been stored for the module.
    NoKey,
    /// The licensing server could not be reached, or replied with nothing.
    Unavailable,
    /// Parsed server response; not necessarily a *valid* license.
    Response(Tree),
}

impl LicenseLookup {
    pub fn response(&self) -> Option<&Tree> {
        match self {
            Self::Response(license) => Some(license),
            _ => None,
        }
    }
}

/// Raw server reply, kept verbatim so the cache replays exactly what the
/// server last said.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CachedResponse {
    pub status: u16,
    pub body: String,
}

pub struct LicenseClient<'a> {
    http: &'a reqwest::Client,
    store: &'a dyn Store,
    site: &'a Site,
    config: &'a ModuleConfig,
    default_check_url: &'a str,
}

impl<'a> LicenseClient<'a> {
    pub(crate) fn new(
        http: &'a reqwest::Client,
        store: &'a dyn Store,
        site: &'a Site,
        config: &'a ModuleConfig,
        default_check_url: &'a str,
    ) -> Self {
        Self {
            http,
            store,
            site,
            config,
            default_check_url,
        }
    }

    pub fn license_key(&self) -> Option<String> {
        stored_license_key(self.store, self.config)
    }

    pub fn set_license_key(&self, key: &str) {
        self.store
            .set_option(&self.config.storage_key("license_key"), Value::from(key));
    }

    /// Verifies the stored license key against the licensing server,
    /// serving from the week-long response cache when possible.
    ///
    /// Only HTTP 200 replies are cached and counted toward activation;
    /// other statuses still parse, since the server reports rejections as
    /// structured bodies with error statuses.
    pub async fn verify(&self) -> LicenseLookup {
        let Some(key) = self.license_key() else {
            return LicenseLookup::NoKey;
        };

        let url = self
            .config
            .license_check_url()
            .unwrap_or(self.default_check_url);

        let cache_key = self.config.storage_key("license_cache");
        let activated = self.activated_keys();

        let response = match self.cached_response(&cache_key) {
            Some(response) => {
                debug!(module = %self.config.short_id(), "license cache hit");
                response
            }
            None => {
                let mut fetched = self.request(url, &key, &activated).await;

                // single retry against the stock endpoint
                if fetched.is_none() && url != self.default_check_url {
                    warn!(
                        module = %self.config.short_id(),
                        url,
                        "license endpoint unreachable, retrying the default"
                    );
                    fetched = self
                        .request(self.default_check_url, &key, &activated)
                        .await;
                }

                match fetched {
                    Some(response) => {
                        if response.status == 200 {
                            if let Ok(raw) = serde_json::to_value(&response) {
                                self.store.set_transient(
                                    &cache_key,
                                    raw,
                                    self.config.cache_time(),
                                );
                            }
                        }
                        response
                    }
                    None => return LicenseLookup::Unavailable,
                }
            }
        };

        let license = Tree::parse(&response.body);

        if response.status == 200 && !activated.contains(&key) {
            self.record_activation(&key);
        }

        LicenseLookup::Response(license)
    }

    pub fn purge_cache(&self) {
        self.store
            .delete_transient(&self.config.storage_key("license_cache"));
    }

    async fn request(
        &self,
        url: &str,
        key: &str,
        activated: &[String],
    ) -> Option<CachedResponse> {
        let increment = !activated.iter().any(|k| k == key) && !self.site.is_local();
        let form = [
            ("license_key", key),
            ("product_permalink", self.config.short_id()),
            ("increment_uses_count", if increment { "true" } else { "false" }),
            ("site_url", self.site.url()),
            ("host_version", self.site.host_version()),
            ("version", self.config.version()),
        ];

        let response = match self
            .http
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, url, "license verification request failed");
                return None;
            }
        };

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if body.is_empty() {
            return None;
        }

        Some(CachedResponse { status, body })
    }

    fn cached_response(&self, cache_key: &str) -> Option<CachedResponse> {
        let raw = self.store.get_transient(cache_key)?;
        serde_json::from_value(raw).ok()
    }

    /// Storage key of the per-host activation record.
    fn activation_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(slugify(self.site.hostname()));
        let digest = hex::encode(hasher.finalize());
        self.config.storage_key(&format!("license_keys_{digest}"))
    }

    fn activated_keys(&self) -> Vec<String> {
        self.store
            .get_option(&self.activation_key())
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Appends at most once per key. Concurrent first verifications may
    /// still double-count across processes; the membership re-check keeps
    /// a single process from ever duplicating.
    fn record_activation(&self, key: &str) {
        let storage_key = self.activation_key();
        let mut keys = self.activated_keys();
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
            self.store.set_option(&storage_key, json!(keys));
        }
    }
}

pub(crate) fn stored_license_key(store: &dyn Store, config: &ModuleConfig) -> Option<String> {
    store
        .get_option(&config.storage_key("license_key"))
        .and_then(|v| v.as_str().map(str::to_string))
        .filter(|k| !k.is_empty())
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_hostnames() {
        assert_eq!(slugify("shop.example.com"), "shop-example-com");
        assert_eq!(slugify("LOCALHOST"), "localhost");
        assert_eq!(slugify("weird__Host..name"), "weird-host-name");
        assert_eq!(slugify(".edge."), "edge");
        assert_eq!(slugify(""), "");
    }
}
