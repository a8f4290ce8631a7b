//! License validity rules.

use crate::{client::LicenseLookup, module::ModuleConfig, tree::Tree};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

const DATE_FORMAT: &str = "%Y-%m-%d (%H:%M)";

/// Outcome of a policy evaluation: whether the license counts as valid and
/// a human-readable reason suitable for the admin page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub valid: bool,
    pub reason: String,
}

impl Verdict {
    fn valid(reason: impl Into<String>) -> Self {
        Self {
            valid: true,
            reason: reason.into(),
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    Recurring,
    Purchase,
}

pub fn evaluate(config: &ModuleConfig, lookup: &LicenseLookup) -> Verdict {
    evaluate_at(config, lookup, Utc::now())
}

/// Applies the validity rules in their fixed order; the first failing rule
/// decides the reason, and later rules assume earlier ones passed.
///
/// Compatibility note: a configured activation cap (`max_uses > 0`, the
/// default) ends the evaluation once the cap check passes, so the
/// refund/dispute/subscription rules only run for modules that set
/// `max_uses` to 0. Deployed installs rely on this order.
pub fn evaluate_at(config: &ModuleConfig, lookup: &LicenseLookup, now: DateTime<Utc>) -> Verdict {
    let license = match lookup {
        LicenseLookup::Unavailable => {
            return Verdict::invalid("Unable to load license information!")
        }
        LicenseLookup::NoKey => return Verdict::invalid("No license key found."),
        LicenseLookup::Response(license) => license,
    };

    if !license.get("success").is_truthy() {
        return Verdict::invalid(license.get("message").text());
    }

    let purchase = license.get("purchase");

    if purchase.get("test").is_truthy() && config.disallow_test_keys() {
        return Verdict::invalid("This is a testing license key and those are not allowed!");
    }

    let max = config.max_uses();
    if max > 0 {
        let uses = license.get("uses").to_i64().unwrap_or(0);
        if uses > i64::from(max) {
            return Verdict::invalid(format!(
                "Maximum number of activations reached! {uses} / {max}"
            ));
        }
        return Verdict::valid("Your license is valid!");
    }

    if purchase.get("refunded").is_truthy() {
        return Verdict::invalid("Your purchase was refunded!");
    }

    if purchase.get("disputed").is_truthy() && !purchase.get("dispute_won").is_truthy() {
        return Verdict::invalid("Your purchase was disputed!");
    }

    let failed_at = purchase.get("subscription_failed_at");
    if failed_at.is_truthy() {
        let Some(failed) = parse_timestamp(&failed_at) else {
            return Verdict::invalid("Your subscription payment failed");
        };

        let grace = config.grace_period();
        if grace > 0 {
            let left = grace - (now - failed).num_days();
            if left > 0 {
                return Verdict::valid(format!(
                    "Your subscription payment failed on {}. Your license will be deactivated in {} days.",
                    failed.format(DATE_FORMAT),
                    left
                ));
            }
        }

        return Verdict::invalid(format!(
            "Your subscription payment failed on {}",
            failed.format(DATE_FORMAT)
        ));
    }

    let ended_at = purchase.get("subscription_ended_at");
    if ended_at.is_truthy() {
        return Verdict::invalid(match parse_timestamp(&ended_at) {
            Some(ended) => format!("Your subscription ended on {}", ended.format(DATE_FORMAT)),
            None => "Your subscription ended".into(),
        });
    }

    let cancelled_at = purchase.get("subscription_cancelled_at");
    if cancelled_at.is_truthy() {
        return Verdict::invalid(match parse_timestamp(&cancelled_at) {
            Some(cancelled) => format!(
                "Your subscription was cancelled on {}",
                cancelled.format(DATE_FORMAT)
            ),
            None => "Your subscription was cancelled".into(),
        });
    }

    Verdict::valid("Your license is valid!")
}

/// Whether the purchase is a subscription rather than a one-off sale.
pub fn is_recurring(license: &Tree) -> bool {
    license.get("purchase").get("recurrence").is_truthy()
}

pub fn license_type(license: &Tree) -> LicenseType {
    if is_recurring(license) {
        LicenseType::Recurring
    } else {
        LicenseType::Purchase
    }
}

/// Purchase custom fields arrive as `"key: value"` lines; entries with
/// empty values are dropped.
pub fn custom_fields(license: &Tree) -> Vec<(String, String)> {
    license
        .get("purchase")
        .get("custom_fields")
        .iter_array()
        .filter_map(|line| {
            let line = line.text();
            let (key, value) = line.split_once(':')?;
            let value = value.strip_prefix(' ').unwrap_or(value);
            (!value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

fn parse_timestamp(node: &Tree) -> Option<DateTime<Utc>> {
    let text = node.text();
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }

    None
}
