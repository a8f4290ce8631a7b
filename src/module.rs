//! Per-module configuration.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, path::Path, sync::Arc, time::Duration};

pub(crate) const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub(crate) const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Plugin,
    Theme,
}

/// Host-invoked hook, fed the module's config and returning markup or text.
/// The core never calls these; they ride along so admin-page code can
/// customize rendering per module.
pub type Hook = Arc<dyn Fn(&ModuleConfig) -> String + Send + Sync>;

#[derive(Clone, Default)]
pub struct Callbacks(HashMap<String, Hook>);

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        mut self,
        name: impl Into<String>,
        hook: impl Fn(&ModuleConfig) -> String + Send + Sync + 'static,
    ) -> Self {
        self.0.insert(name.into(), Arc::new(hook));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Hook> {
        self.0.get(name)
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Registration options. Every field is optional; [`ModuleConfig`] applies
/// the defaults. Deserializes from decoded config blobs, which may carry
/// extra keys the core ignores.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModuleOptions {
    pub name: Option<String>,
    pub version: Option<String>,
    pub license_check_url: Option<String>,
    pub update_check_url: Option<String>,
    pub max_uses: Option<u32>,
    pub grace_period: Option<i64>,
    /// License-cache TTL in seconds.
    pub cache_time: Option<u64>,
    pub disallow_test_keys: Option<bool>,
    pub deny_update_without_license: Option<bool>,
    pub suppress_notices: Option<bool>,
    pub suppress_key_notice: Option<bool>,
    pub hide_owner_email: Option<bool>,
    pub hide_custom_fields: Option<bool>,
    pub white_label: Option<bool>,
    pub plugins_page_link: Option<bool>,
}

impl ModuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn license_check_url(mut self, url: impl Into<String>) -> Self {
        self.license_check_url = Some(url.into());
        self
    }

    pub fn update_check_url(mut self, url: impl Into<String>) -> Self {
        self.update_check_url = Some(url.into());
        self
    }

    /// `0` disables the activation cap (and with it the early end of
    /// policy evaluation; see [`crate::evaluate`]).
    pub fn max_uses(mut self, max_uses: u32) -> Self {
        self.max_uses = Some(max_uses);
        self
    }

    /// Days a failed subscription payment is tolerated; `0` invalidates
    /// immediately.
    pub fn grace_period(mut self, days: i64) -> Self {
        self.grace_period = Some(days);
        self
    }

    pub fn cache_time(mut self, seconds: u64) -> Self {
        self.cache_time = Some(seconds);
        self
    }

    pub fn disallow_test_keys(mut self, disallow: bool) -> Self {
        self.disallow_test_keys = Some(disallow);
        self
    }

    pub fn deny_update_without_license(mut self, deny: bool) -> Self {
        self.deny_update_without_license = Some(deny);
        self
    }

    pub fn suppress_notices(mut self, suppress: bool) -> Self {
        self.suppress_notices = Some(suppress);
        self
    }

    pub fn suppress_key_notice(mut self, suppress: bool) -> Self {
        self.suppress_key_notice = Some(suppress);
        self
    }

    pub fn hide_owner_email(mut self, hide: bool) -> Self {
        self.hide_owner_email = Some(hide);
        self
    }

    pub fn hide_custom_fields(mut self, hide: bool) -> Self {
        self.hide_custom_fields = Some(hide);
        self
    }

    pub fn white_label(mut self, white_label: bool) -> Self {
        self.white_label = Some(white_label);
        self
    }

    pub fn plugins_page_link(mut self, link: bool) -> Self {
        self.plugins_page_link = Some(link);
        self
    }
}

/// Immutable settings for one registered module. Built once at
/// registration, read-only thereafter.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    short_id: String,
    file: String,
    kind: ModuleKind,
    name: String,
    version: String,
    license_check_url: Option<String>,
    update_check_url: Option<String>,
    max_uses: u32,
    grace_period: i64,
    cache_time: Duration,
    disallow_test_keys: bool,
    deny_update_without_license: bool,
    suppress_notices: bool,
    suppress_key_notice: bool,
    hide_owner_email: bool,
    hide_custom_fields: bool,
    white_label: bool,
    plugins_page_link: bool,
    encrypted: bool,
    callbacks: Callbacks,
}

impl ModuleConfig {
    pub(crate) fn new(
        file: String,
        short_id: String,
        options: ModuleOptions,
        callbacks: Callbacks,
        encrypted: bool,
    ) -> Self {
        // themes are registered by their stylesheet path
        let (kind, file) = if file.contains("/themes/") {
            (ModuleKind::Theme, theme_stylesheet(&file))
        } else {
            (ModuleKind::Plugin, file)
        };

        Self {
            name: options.name.unwrap_or_else(|| short_id.clone()),
            short_id,
            file,
            kind,
            version: options.version.unwrap_or_default(),
            license_check_url: options.license_check_url,
            update_check_url: options.update_check_url,
            max_uses: options.max_uses.unwrap_or(1),
            grace_period: options.grace_period.unwrap_or(7),
            cache_time: options.cache_time.map(Duration::from_secs).unwrap_or(WEEK),
            disallow_test_keys: options.disallow_test_keys.unwrap_or(false),
            deny_update_without_license: options.deny_update_without_license.unwrap_or(false),
            suppress_notices: options.suppress_notices.unwrap_or(false),
            suppress_key_notice: options.suppress_key_notice.unwrap_or(false),
            hide_owner_email: options.hide_owner_email.unwrap_or(false),
            hide_custom_fields: options.hide_custom_fields.unwrap_or(false),
            white_label: options.white_label.unwrap_or(false),
            plugins_page_link: options.plugins_page_link.unwrap_or(true),
            encrypted,
            callbacks,
        }
    }

    pub fn short_id(&self) -> &str {
        &self.short_id
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn license_check_url(&self) -> Option<&str> {
        self.license_check_url.as_deref()
    }

    pub fn update_check_url(&self) -> Option<&str> {
        self.update_check_url.as_deref()
    }

    pub fn max_uses(&self) -> u32 {
        self.max_uses
    }

    pub fn grace_period(&self) -> i64 {
        self.grace_period
    }

    pub fn cache_time(&self) -> Duration {
        self.cache_time
    }

    pub fn disallow_test_keys(&self) -> bool {
        self.disallow_test_keys
    }

    pub fn deny_update_without_license(&self) -> bool {
        self.deny_update_without_license
    }

    pub fn suppress_notices(&self) -> bool {
        self.suppress_notices
    }

    pub fn suppress_key_notice(&self) -> bool {
        self.suppress_key_notice
    }

    pub fn hide_owner_email(&self) -> bool {
        self.hide_owner_email
    }

    pub fn hide_custom_fields(&self) -> bool {
        self.hide_custom_fields
    }

    pub fn white_label(&self) -> bool {
        self.white_label
    }

    pub fn plugins_page_link(&self) -> bool {
        self.plugins_page_link
    }

    pub fn was_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn callback(&self, name: &str) -> Option<&Hook> {
        self.callbacks.get(name)
    }

    /// Stable identifier derived from the module directory; namespaces
    /// every storage key.
    pub fn slug(&self) -> String {
        let path = Path::new(&self.file);
        path.parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                path.file_stem()
                    .and_then(|n| n.to_str())
                    .unwrap_or(&self.short_id)
                    .to_string()
            })
    }

    pub fn storage_key(&self, suffix: &str) -> String {
        format!("{}-{}", self.slug(), suffix)
    }

    /// Relative admin link to the module's license page.
    pub fn license_page_link(&self) -> String {
        let base = match self.kind {
            ModuleKind::Plugin => "options",
            ModuleKind::Theme => "themes",
        };
        format!("{base}?page={}", self.storage_key("license"))
    }
}

fn theme_stylesheet(file: &str) -> String {
    let dir = Path::new(file)
        .parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    format!("{dir}/style.css")
}
