mod common;

use common::{license_body, registry_at, set_key, FILE, SHORT_ID};
use licensegate::{Callbacks, LicenseLookup, MemoryStore, ModuleOptions, Registry, Site, Store};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn verifies_and_validates_a_clean_license() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/licenses/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(license_body()))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_at(&server.uri(), ModuleOptions::new());
    set_key(&registry, "ABCD-1234");

    let module = registry.module(SHORT_ID).unwrap();
    let lookup = module.license().await;
    let license = lookup.response().expect("parsed response");
    assert_eq!(
        license.get("purchase").get("email").as_str(),
        Some("owner@example.com")
    );

    let verdict = module.evaluate(&lookup);
    assert!(verdict.valid);
    assert_eq!(verdict.reason, "Your license is valid!");
    assert!(module.is_recurring().await);
}

#[tokio::test]
async fn missing_key_never_calls_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(license_body()))
        .expect(0)
        .mount(&server)
        .await;

    let registry = registry_at(&server.uri(), ModuleOptions::new());
    let module = registry.module(SHORT_ID).unwrap();

    assert_eq!(module.license().await, LicenseLookup::NoKey);
    let verdict = module.validate().await;
    assert!(!verdict.valid);
    assert_eq!(verdict.reason, "No license key found.");
}

#[tokio::test]
async fn warm_cache_skips_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/licenses/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(license_body()))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_at(&server.uri(), ModuleOptions::new());
    set_key(&registry, "ABCD-1234");
    let module = registry.module(SHORT_ID).unwrap();

    let first = module.license().await;
    let second = module.license().await;
    assert_eq!(first, second);
    assert!(module.validate().await.valid);
}

#[tokio::test]
async fn empty_reply_from_the_default_endpoint_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/licenses/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;

    let registry = registry_at(&server.uri(), ModuleOptions::new());
    set_key(&registry, "ABCD-1234");
    let module = registry.module(SHORT_ID).unwrap();

    assert_eq!(module.license().await, LicenseLookup::Unavailable);
    let verdict = module.validate().await;
    assert!(!verdict.valid);
    assert_eq!(verdict.reason, "Unable to load license information!");
}

#[tokio::test]
async fn dead_module_endpoint_falls_back_to_the_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/licenses/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(license_body()))
        .expect(1)
        .mount(&server)
        .await;

    // nothing listens on the discard port, so the configured endpoint
    // fails fast and the client retries the stock one
    let options = ModuleOptions::new().license_check_url("http://127.0.0.1:9/verify");
    let registry = registry_at(&server.uri(), options);
    set_key(&registry, "ABCD-1234");

    let module = registry.module(SHORT_ID).unwrap();
    assert!(module.validate().await.valid);
}

#[tokio::test]
async fn rejections_are_parsed_but_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/licenses/verify"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "message": "That license does not exist for the provided product."
        })))
        .expect(2)
        .mount(&server)
        .await;

    let registry = registry_at(&server.uri(), ModuleOptions::new());
    set_key(&registry, "BOGUS");
    let module = registry.module(SHORT_ID).unwrap();

    let verdict = module.validate().await;
    assert!(!verdict.valid);
    assert_eq!(
        verdict.reason,
        "That license does not exist for the provided product."
    );

    // error statuses must not populate the weekly cache
    let verdict = module.validate().await;
    assert!(!verdict.valid);
}

#[tokio::test]
async fn activation_is_counted_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("increment_uses_count=true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(license_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("increment_uses_count=false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(license_body()))
        .expect(2)
        .mount(&server)
        .await;

    let registry = registry_at(&server.uri(), ModuleOptions::new());
    set_key(&registry, "ABCD-1234");
    let module = registry.module(SHORT_ID).unwrap();

    // first verification activates
    assert!(module.validate().await.valid);

    // later cache-miss verifications must not re-activate
    module.purge_license_cache();
    assert!(module.validate().await.valid);
    module.purge_license_cache();
    assert!(module.validate().await.valid);
}

#[tokio::test]
async fn local_sites_never_increment_the_use_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("increment_uses_count=false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(license_body()))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let site = Site::new("http://localhost:8080", "6.4.2", "8.2.1");
    let mut registry = Registry::new(site, store as Arc<dyn Store>)
        .default_check_url(format!("{}/v2/licenses/verify", server.uri()));
    registry.register(FILE, SHORT_ID, ModuleOptions::new(), Callbacks::new());
    set_key(&registry, "ABCD-1234");

    assert!(registry.module(SHORT_ID).unwrap().validate().await.valid);
}

#[tokio::test]
async fn request_carries_the_module_identity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("license_key=ABCD-1234"))
        .and(body_string_contains("product_permalink=wooplatnica"))
        .and(body_string_contains("version=2.1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(license_body()))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_at(&server.uri(), ModuleOptions::new().version("2.1.0"));
    set_key(&registry, "ABCD-1234");

    assert!(registry.module(SHORT_ID).unwrap().validate().await.valid);
}
