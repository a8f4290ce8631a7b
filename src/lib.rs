//! License-key validation, activation accounting, and update gating for
//! plugins and themes distributed outside a marketplace.
//!
//! The host application builds one [`Registry`] at startup with its
//! [`Site`] identity and a [`Store`] implementation, registers each
//! distributed module, and wires the returned [`Module`] handles into its
//! own admin pages and update hooks. All validity decisions come back as a
//! [`Verdict`] with a displayable reason.

mod client;
mod codec;
mod err;
mod licensed;
mod module;
mod site;
mod store;
mod tree;
mod update;

pub use client::{LicenseClient, LicenseLookup};
pub use codec::{decode, encode};
pub use err::Error;
pub use licensed::{
    custom_fields, evaluate, evaluate_at, is_recurring, license_type, LicenseType, Verdict,
};
pub use module::{Callbacks, Hook, ModuleConfig, ModuleKind, ModuleOptions};
pub use site::{cidr_match, Site};
pub use store::{MemoryStore, Store};
pub use tree::Tree;
pub use update::{PendingUpdate, UpdateGate};

use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

pub type Result<T> = std::result::Result<T, Error>;

/// Stock verify endpoint, used when a module doesn't configure its own and
/// as the single fallback when a configured endpoint fails.
pub const DEFAULT_LICENSE_CHECK_URL: &str = "https://api.licensegate.io/v2/licenses/verify";

/// All registered modules plus the shared collaborators they validate
/// through. Built once at startup and passed by handle; there is no global
/// state.
pub struct Registry {
    site: Site,
    store: Arc<dyn Store>,
    http: reqwest::Client,
    default_check_url: String,
    modules: HashMap<String, ModuleConfig>,
}

impl Registry {
    pub fn new(site: Site, store: Arc<dyn Store>) -> Self {
        // default client with user_agent
        let http = reqwest::Client::builder()
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .unwrap_or_default();

        Self {
            site,
            store,
            http,
            default_check_url: DEFAULT_LICENSE_CHECK_URL.into(),
            modules: HashMap::new(),
        }
    }

    /// Overrides the stock verify endpoint for every module without one of
    /// its own.
    pub fn default_check_url(mut self, url: impl Into<String>) -> Self {
        self.default_check_url = url.into();
        self
    }

    pub fn register(
        &mut self,
        file: impl Into<String>,
        short_id: impl Into<String>,
        options: ModuleOptions,
        callbacks: Callbacks,
    ) {
        let short_id = short_id.into();
        let config = ModuleConfig::new(file.into(), short_id.clone(), options, callbacks, false);
        self.modules.insert(short_id, config);
    }

    /// Registers a module from an encoded config blob (see [`encode`]).
    ///
    /// A checksum mismatch halts registration with [`Error::Integrity`];
    /// a tampered config cannot be trusted. Decode failures past the
    /// checksum degrade to an all-defaults config instead.
    pub fn register_encoded(
        &mut self,
        file: impl Into<String>,
        short_id: impl Into<String>,
        blob: &str,
        callbacks: Callbacks,
    ) -> Result<()> {
        let short_id = short_id.into();
        let map = codec::decode(blob, &short_id)
            .map_err(|err| match err {
                Error::Integrity(detail) => Error::Integrity(format!("{short_id}: {detail}")),
                other => other,
            })?;
        let options = serde_json::from_value(Value::Object(map)).unwrap_or_default();
        let config = ModuleConfig::new(file.into(), short_id.clone(), options, callbacks, true);
        self.modules.insert(short_id, config);
        Ok(())
    }

    pub fn module(&self, short_id: &str) -> Result<Module<'_>> {
        self.modules
            .get(short_id)
            .map(|config| Module {
                config,
                site: &self.site,
                store: self.store.as_ref(),
                http: &self.http,
                default_check_url: &self.default_check_url,
            })
            .ok_or_else(|| Error::UnknownModule(short_id.to_string()))
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn configs(&self) -> impl Iterator<Item = &ModuleConfig> {
        self.modules.values()
    }
}

/// Per-module facade: the surface the host wires into its hooks, notices
/// and admin pages.
pub struct Module<'a> {
    config: &'a ModuleConfig,
    site: &'a Site,
    store: &'a dyn Store,
    http: &'a reqwest::Client,
    default_check_url: &'a str,
}

impl Module<'_> {
    pub fn config(&self) -> &ModuleConfig {
        self.config
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub fn slug(&self) -> String {
        self.config.slug()
    }

    pub fn license_page_link(&self) -> String {
        self.config.license_page_link()
    }

    pub fn callback(&self, name: &str) -> Option<&Hook> {
        self.config.callback(name)
    }

    pub fn was_config_encrypted(&self) -> bool {
        self.config.was_encrypted()
    }

    pub fn license_key(&self) -> Option<String> {
        self.client().license_key()
    }

    pub fn set_license_key(&self, key: &str) {
        self.client().set_license_key(key);
    }

    /// Verifies the stored key against the licensing server (or the
    /// week-long cache).
    pub async fn license(&self) -> LicenseLookup {
        self.client().verify().await
    }

    /// Full check: fetch (or replay) the license and evaluate the policy
    /// rules against it.
    pub async fn validate(&self) -> Verdict {
        licensed::evaluate(self.config, &self.license().await)
    }

    /// Evaluates the policy rules against an already-fetched lookup.
    pub fn evaluate(&self, lookup: &LicenseLookup) -> Verdict {
        licensed::evaluate(self.config, lookup)
    }

    pub async fn is_recurring(&self) -> bool {
        self.license()
            .await
            .response()
            .is_some_and(licensed::is_recurring)
    }

    pub async fn license_type(&self) -> Option<LicenseType> {
        self.license().await.response().map(licensed::license_type)
    }

    /// Drops the cached license response; the admin page's re-validate
    /// action goes through here.
    pub fn purge_license_cache(&self) {
        self.client().purge_cache();
    }

    /// Latest-version metadata from the update server, if configured and
    /// reachable.
    pub async fn check_for_update(&self) -> Option<Tree> {
        self.gate().check().await
    }

    /// Allow-list-trimmed update metadata for the host's details UI.
    pub async fn update_info(&self) -> Option<Tree> {
        let remote = self.gate().check().await?;
        Some(self.gate().info(&remote))
    }

    /// The release the host updater should surface, if any.
    pub async fn pending_update(&self) -> Option<PendingUpdate> {
        let remote = self.gate().check().await?;
        self.gate().pending(&remote)
    }

    pub fn purge_update_cache(&self) {
        self.gate().purge();
    }

    /// Whether the host should wire its update hooks for this module:
    /// an update endpoint is configured, and either updates don't require
    /// a license or the current one is valid.
    pub async fn update_checks_enabled(&self) -> bool {
        if self.config.update_check_url().is_none() {
            return false;
        }
        if !self.config.deny_update_without_license() {
            return true;
        }
        self.validate().await.valid
    }

    fn client(&self) -> LicenseClient<'_> {
        LicenseClient::new(
            self.http,
            self.store,
            self.site,
            self.config,
            self.default_check_url,
        )
    }

    fn gate(&self) -> UpdateGate<'_> {
        UpdateGate::new(self.http, self.store, self.site, self.config)
    }
}
