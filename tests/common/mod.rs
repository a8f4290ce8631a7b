#![allow(dead_code)]

use licensegate::{Callbacks, MemoryStore, ModuleOptions, Registry, Site};
use serde_json::json;
use std::sync::Arc;

pub const SHORT_ID: &str = "wooplatnica";
pub const FILE: &str = "wooplatnica/wooplatnica.php";

/// Registry backed by a fresh in-memory store, with the stock verify
/// endpoint pointed at the given mock server.
pub fn registry_at(server_url: &str, options: ModuleOptions) -> Registry {
    let site = Site::new("https://shop.example.com", "6.4.2", "8.2.1");
    let mut registry = Registry::new(site, Arc::new(MemoryStore::new()))
        .default_check_url(format!("{server_url}/v2/licenses/verify"));
    registry.register(FILE, SHORT_ID, options, Callbacks::new());
    registry
}

pub fn set_key(registry: &Registry, key: &str) {
    registry.module(SHORT_ID).unwrap().set_license_key(key);
}

/// A healthy verify response for a recurring purchase.
pub fn license_body() -> serde_json::Value {
    json!({
        "success": true,
        "uses": 1,
        "purchase": {
            "email": "owner@example.com",
            "recurrence": "monthly",
            "refunded": false,
            "disputed": false,
            "custom_fields": ["Seats: 4"]
        }
    })
}

/// A publishable update-check response.
pub fn update_body(version: &str) -> serde_json::Value {
    json!({
        "slug": "wooplatnica",
        "file": "wooplatnica/wooplatnica.php",
        "version": version,
        "tested": "6.5",
        "requires": "6.0",
        "requires_runtime": "8.0",
        "download_url": "https://updates.example.com/pkg/wooplatnica.zip",
        "sections": {
            "description": "Pay by bank transfer.",
            "installation": "Unzip and activate.",
            "changelog": "Fixes.",
            "secret_notes": "internal"
        },
        "banners": {
            "low": "https://cdn.example.com/banner-772.png",
            "high": "https://cdn.example.com/banner-1544.png",
            "raw": "drop-me"
        }
    })
}
