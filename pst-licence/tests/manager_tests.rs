mod common;

use common::{
    CountingStore, EMAIL, LICENCE_KEY, PLUGIN_INIT, PRODUCT_ID, ReadOnlyStore, ScriptedHttp,
    active_record, manager, query_param, seed, table,
};
use pretty_assertions::assert_eq;
use pst_licence::{
    LicenceError, LicenceRecord, LicenceState, MemoryOptionStore, OptionStore, ProductCheck,
    StatusCode,
};
use serde_json::json;
use std::sync::Arc;

// ── Activation ──────────────────────────────────────────────────

#[test]
fn activation_persists_returned_fields() {
    let store = Arc::new(MemoryOptionStore::new());
    let http = ScriptedHttp::new();
    http.reply(json!({
        "activated": true,
        "licence_expires": "2030-01-01",
        "activation_limit": 5,
        "activation_remaining": 4,
        "message": "ok"
    }));
    let manager = manager(store.clone(), http.clone());

    let result = manager.activate(PLUGIN_INIT, EMAIL, LICENCE_KEY).unwrap();
    assert!(result.activated);
    assert_eq!(result.body.as_ref().unwrap()["message"], json!("ok"));

    let record = table(store.as_ref()).get(PRODUCT_ID).cloned().unwrap();
    assert_eq!(
        record,
        LicenceRecord {
            email: EMAIL.into(),
            licence_key: LICENCE_KEY.into(),
            status_code: None,
            activated: true,
            licence_expires: Some("2030-01-01".into()),
            message: Some("ok".into()),
            activation_limit: Some(5),
            activation_remaining: Some(4),
        }
    );
    assert_eq!(result.record, Some(record));
}

#[test]
fn check_uses_stored_credentials_after_activation() {
    let store = Arc::new(MemoryOptionStore::new());
    let http = ScriptedHttp::new();
    http.reply(json!({ "activated": true, "licence_expires": "2030-01-01" }));
    http.reply(json!({ "success": true, "activated": true }));
    let manager = manager(store, http.clone());

    manager
        .activate(PLUGIN_INIT, "  Owner@Example.com ", " KEY-1234\n")
        .unwrap();
    assert!(manager.check(PLUGIN_INIT).unwrap());

    let requests = http.requests();
    assert_eq!(requests.len(), 2);
    let check_url = &requests[1];
    assert!(check_url.contains("request=check"));
    assert_eq!(query_param(check_url, "licence_key").as_deref(), Some(LICENCE_KEY));
    assert_eq!(
        query_param(check_url, "email").as_deref(),
        Some("Owner@Example.com")
    );
    assert_eq!(query_param(check_url, "product_id").as_deref(), Some(PRODUCT_ID));
    assert_eq!(
        query_param(check_url, "instance").as_deref(),
        Some("shop.example.com")
    );
}

#[test]
fn activation_of_unknown_product_fails_without_network() {
    let http = ScriptedHttp::new();
    let manager = manager(Arc::new(MemoryOptionStore::new()), http.clone());

    let err = manager.activate("missing/init.php", EMAIL, LICENCE_KEY).unwrap_err();
    assert!(matches!(err, LicenceError::UnknownProduct(ref init) if init == "missing/init.php"));
    assert_eq!(http.request_count(), 0);
}

#[test]
fn refused_activation_forwards_body_and_keeps_table() {
    let store = CountingStore::new();
    let http = ScriptedHttp::new();
    http.reply(json!({ "activated": false, "error": "Invalid licence key", "code": "101" }));
    let manager = manager(store.clone(), http);

    let result = manager.activate(PLUGIN_INIT, EMAIL, LICENCE_KEY).unwrap();
    assert!(!result.activated);
    assert_eq!(result.record, None);
    assert_eq!(result.body.unwrap()["error"], json!("Invalid licence key"));
    assert_eq!(store.writes(), 0);
}

#[test]
fn activation_transport_failure_returns_empty_body() {
    let store = CountingStore::new();
    let http = ScriptedHttp::new();
    http.fail();
    let manager = manager(store.clone(), http);

    let result = manager.activate(PLUGIN_INIT, EMAIL, LICENCE_KEY).unwrap();
    assert!(!result.activated);
    assert_eq!(result.body, None);
    assert_eq!(store.writes(), 0);
}

#[test]
fn malformed_activation_response_is_not_activated() {
    let store = CountingStore::new();
    let http = ScriptedHttp::new();
    http.reply_raw(200, "<html>maintenance</html>");
    let manager = manager(store.clone(), http);

    let result = manager.activate(PLUGIN_INIT, EMAIL, LICENCE_KEY).unwrap();
    assert!(!result.activated);
    assert_eq!(result.body, None);
    assert_eq!(store.writes(), 0);
}

#[test]
fn reactivation_replaces_expired_record() {
    let store = Arc::new(MemoryOptionStore::new());
    seed(
        store.as_ref(),
        PRODUCT_ID,
        LicenceRecord {
            activated: false,
            status_code: Some(StatusCode::Expired),
            message: Some("expired".into()),
            ..active_record()
        },
    );
    let http = ScriptedHttp::new();
    http.reply(json!({ "activated": "1", "licence_expires": "2031-01-01" }));
    let manager = manager(store.clone(), http);

    assert!(manager.activate(PLUGIN_INIT, EMAIL, "KEY-NEW").unwrap().activated);
    let record = table(store.as_ref()).get(PRODUCT_ID).cloned().unwrap();
    assert_eq!(record.state(), LicenceState::Active);
    assert_eq!(record.status_code, None);
    assert_eq!(record.licence_key, "KEY-NEW");
    assert_eq!(record.message, None);
}

// ── Check ───────────────────────────────────────────────────────

#[test]
fn check_without_record_skips_network() {
    let http = ScriptedHttp::new();
    let manager = manager(Arc::new(MemoryOptionStore::new()), http.clone());

    assert!(!manager.check(PLUGIN_INIT).unwrap());
    assert_eq!(http.request_count(), 0);
}

#[test]
fn check_of_unregistered_product_is_false() {
    let http = ScriptedHttp::new();
    let manager = manager(Arc::new(MemoryOptionStore::new()), http.clone());

    assert!(!manager.check("other/init.php").unwrap());
    assert_eq!(http.request_count(), 0);
}

#[test]
fn check_success_refreshes_record() {
    let store = Arc::new(MemoryOptionStore::new());
    seed(store.as_ref(), PRODUCT_ID, active_record());
    let http = ScriptedHttp::new();
    http.reply(json!({
        "success": true,
        "activated": true,
        "licence_expires": "2031-06-30",
        "activation_remaining": "1",
        "activation_limit": 3
    }));
    let manager = manager(store.clone(), http);

    assert!(manager.check(PLUGIN_INIT).unwrap());
    let record = table(store.as_ref()).get(PRODUCT_ID).cloned().unwrap();
    assert_eq!(record.status_code, Some(StatusCode::Valid));
    assert_eq!(record.licence_expires.as_deref(), Some("2031-06-30"));
    assert_eq!(record.activation_remaining, Some(1));
    assert_eq!(record.activation_limit, Some(3));
}

#[test]
fn check_success_without_activation_reports_false() {
    let store = Arc::new(MemoryOptionStore::new());
    seed(store.as_ref(), PRODUCT_ID, active_record());
    let http = ScriptedHttp::new();
    http.reply(json!({ "success": 1, "activated": 0 }));
    let manager = manager(store.clone(), http);

    assert!(!manager.check(PLUGIN_INIT).unwrap());
    assert!(!table(store.as_ref()).is_activated(PRODUCT_ID));
}

#[test]
fn check_code_101_deletes_record() {
    let store = Arc::new(MemoryOptionStore::new());
    seed(store.as_ref(), PRODUCT_ID, active_record());
    let http = ScriptedHttp::new();
    http.reply(json!({ "success": false, "code": "101" }));
    let manager = manager(store.clone(), http.clone());

    assert!(!manager.check(PLUGIN_INIT).unwrap());
    assert!(!table(store.as_ref()).contains(PRODUCT_ID));

    assert!(!manager.check(PLUGIN_INIT).unwrap());
    assert_eq!(http.request_count(), 1);
}

#[test]
fn check_code_102_deletes_record() {
    let store = Arc::new(MemoryOptionStore::new());
    seed(store.as_ref(), PRODUCT_ID, active_record());
    let http = ScriptedHttp::new();
    http.reply(json!({ "success": false, "code": 102 }));
    let manager = manager(store.clone(), http);

    assert!(!manager.check(PLUGIN_INIT).unwrap());
    assert!(table(store.as_ref()).is_empty());
}

#[test]
fn null_success_with_deleting_code_keeps_record() {
    let store = CountingStore::new();
    seed(store.as_ref(), PRODUCT_ID, active_record());
    let http = ScriptedHttp::new();
    http.reply(json!({ "success": null, "code": "101" }));
    let manager = manager(store.clone(), http);

    assert!(!manager.check(PLUGIN_INIT).unwrap());
    assert_eq!(store.writes(), 1, "only the seed write");
    assert_eq!(table(store.as_ref()).get(PRODUCT_ID), Some(&active_record()));
}

#[test]
fn check_code_106_expires_and_retains_record() {
    let store = Arc::new(MemoryOptionStore::new());
    seed(store.as_ref(), PRODUCT_ID, active_record());
    let http = ScriptedHttp::new();
    http.reply(json!({
        "success": false,
        "code": "106",
        "additional_info": "expired",
        "licence_expires": "2020-01-01"
    }));
    let manager = manager(store.clone(), http);

    assert!(!manager.check(PLUGIN_INIT).unwrap());
    let record = table(store.as_ref()).get(PRODUCT_ID).cloned().unwrap();
    assert!(!record.activated);
    assert_eq!(record.status_code, Some(StatusCode::Expired));
    assert_eq!(record.message.as_deref(), Some("expired"));
    assert_eq!(record.licence_expires.as_deref(), Some("2020-01-01"));
    assert_eq!(record.email, EMAIL);

    let no_active = manager.get_no_active_licence_key().unwrap();
    let expired = &no_active[&StatusCode::Expired];
    assert!(expired.contains_key(PLUGIN_INIT));
    assert!(!no_active.contains_key(&StatusCode::Banned));
}

#[test]
fn check_code_107_bans_and_keeps_expiry() {
    let store = Arc::new(MemoryOptionStore::new());
    seed(store.as_ref(), PRODUCT_ID, active_record());
    let http = ScriptedHttp::new();
    http.reply(json!({
        "success": false,
        "code": "107",
        "additional_info": "banned for abuse",
        "licence_expires": "2020-01-01"
    }));
    let manager = manager(store.clone(), http);

    assert!(!manager.check(PLUGIN_INIT).unwrap());
    let record = table(store.as_ref()).get(PRODUCT_ID).cloned().unwrap();
    assert_eq!(record.state(), LicenceState::Banned);
    assert_eq!(record.message.as_deref(), Some("banned for abuse"));
    assert_eq!(record.licence_expires.as_deref(), Some("2030-01-01"));

    let no_active = manager.get_no_active_licence_key().unwrap();
    assert!(no_active[&StatusCode::Banned].contains_key(PLUGIN_INIT));
}

#[test]
fn display_only_codes_leave_record_unchanged() {
    for code in ["100", "103", "104", "105"] {
        let store = Arc::new(MemoryOptionStore::new());
        seed(store.as_ref(), PRODUCT_ID, active_record());
        let before = store.get_option(pst_licence::PRODUCTS_OPTION).unwrap();
        let http = ScriptedHttp::new();
        http.reply(json!({ "success": false, "code": code }));
        let manager = manager(store.clone(), http);

        assert!(!manager.check(PLUGIN_INIT).unwrap(), "code {code}");
        let after = store.get_option(pst_licence::PRODUCTS_OPTION).unwrap();
        assert_eq!(before, after, "code {code}");
    }
}

#[test]
fn unanswered_checks_do_not_persist() {
    let scripts: [fn(&ScriptedHttp); 4] = [
        |http| http.fail(),
        |http| http.reply_raw(200, "not json"),
        |http| http.reply(json!({ "activated": true })),
        |http| http.reply(json!({ "success": false })),
    ];
    for script in scripts {
        let store = CountingStore::new();
        seed(store.as_ref(), PRODUCT_ID, active_record());
        let http = ScriptedHttp::new();
        script(&http);
        let manager = manager(store.clone(), http);

        assert!(!manager.check(PLUGIN_INIT).unwrap());
        assert_eq!(store.writes(), 1, "only the seed write");
        assert_eq!(table(store.as_ref()).get(PRODUCT_ID), Some(&active_record()));
    }
}

#[test]
fn error_status_still_decodes_body() {
    let store = Arc::new(MemoryOptionStore::new());
    seed(store.as_ref(), PRODUCT_ID, active_record());
    let http = ScriptedHttp::new();
    http.reply_raw(500, r#"{"success":false,"code":"101"}"#);
    let manager = manager(store.clone(), http);

    assert!(!manager.check(PLUGIN_INIT).unwrap());
    assert!(!table(store.as_ref()).contains(PRODUCT_ID));
}

#[test]
fn repeated_check_is_idempotent() {
    let store = Arc::new(MemoryOptionStore::new());
    seed(store.as_ref(), PRODUCT_ID, active_record());
    let http = ScriptedHttp::new();
    let answer = json!({
        "success": true,
        "activated": true,
        "licence_expires": "2031-01-01",
        "activation_remaining": 2,
        "activation_limit": 3
    });
    http.reply(answer.clone());
    http.reply(answer);
    let manager = manager(store.clone(), http);

    manager.check(PLUGIN_INIT).unwrap();
    let first = table(store.as_ref());
    manager.check(PLUGIN_INIT).unwrap();
    assert_eq!(table(store.as_ref()), first);
}

#[test]
fn storage_failure_propagates_from_activation() {
    let store = Arc::new(ReadOnlyStore::default());
    let http = ScriptedHttp::new();
    let manager = manager(store.clone(), http.clone());
    // Nothing stored: the check never reaches the write.
    assert!(!manager.check(PLUGIN_INIT).unwrap());

    http.reply(json!({ "activated": true }));
    let err = manager.activate(PLUGIN_INIT, EMAIL, LICENCE_KEY).unwrap_err();
    assert!(matches!(err, LicenceError::Storage(_)));
}

// ── Refresh ─────────────────────────────────────────────────────

#[test]
fn refresh_continues_past_transport_failure() {
    let store = Arc::new(MemoryOptionStore::new());
    let http = ScriptedHttp::new();
    let mut manager = manager(store.clone(), http.clone());
    // Registry iterates by init: "a-first" before "pst-gateway/init.php".
    manager
        .registry_mut()
        .register("a-first/init.php", "k1", "first");
    seed(store.as_ref(), "first", active_record());
    seed(
        store.as_ref(),
        PRODUCT_ID,
        LicenceRecord {
            licence_expires: Some("2029-01-01".into()),
            ..active_record()
        },
    );

    http.fail();
    http.reply(json!({ "success": true, "activated": true, "licence_expires": "2032-01-01" }));

    let report = manager.update_licence_information();
    assert_eq!(report.results["a-first/init.php"], ProductCheck::Inactive);
    assert_eq!(report.results[PLUGIN_INIT], ProductCheck::Active);
    assert_eq!(report.active_count(), 1);
    assert_eq!(report.failed().count(), 0);

    let stored = table(store.as_ref());
    assert_eq!(stored.get("first"), Some(&active_record()));
    assert_eq!(
        stored.get(PRODUCT_ID).unwrap().licence_expires.as_deref(),
        Some("2032-01-01")
    );
    assert_eq!(http.request_count(), 2);
}

#[test]
fn refresh_records_storage_failures() {
    let store = Arc::new(ReadOnlyStore::with_record(PRODUCT_ID, active_record()));
    let http = ScriptedHttp::new();
    http.reply(json!({ "success": true, "activated": true }));
    let manager = manager(store, http);

    let report = manager.update_licence_information();
    assert!(matches!(
        &report.results[PLUGIN_INIT],
        ProductCheck::Failed { error } if error.contains("read-only")
    ));
    assert_eq!(report.failed().collect::<Vec<_>>(), vec![PLUGIN_INIT]);
}

// ── Queries ─────────────────────────────────────────────────────

#[test]
fn never_activated_products_are_to_active() {
    let manager = manager(Arc::new(MemoryOptionStore::new()), ScriptedHttp::new());

    assert!(manager.get_activated_products().unwrap().is_empty());
    let to_active = manager.get_to_active_products().unwrap();
    assert_eq!(to_active.len(), 1);
    assert_eq!(to_active[PLUGIN_INIT].product_id, PRODUCT_ID);
    assert!(manager.get_no_active_licence_key().unwrap().is_empty());
}

#[test]
fn activated_products_merge_product_and_record() {
    let store = Arc::new(MemoryOptionStore::new());
    seed(store.as_ref(), PRODUCT_ID, active_record());
    let manager = manager(store, ScriptedHttp::new());

    let activated = manager.get_activated_products().unwrap();
    let entry = &activated[PLUGIN_INIT];
    assert_eq!(entry.product.secret_key, common::SECRET_KEY);
    assert_eq!(entry.licence, active_record());
    assert!(manager.get_to_active_products().unwrap().is_empty());
}

#[test]
fn records_for_unregistered_products_are_ignored() {
    let store = Arc::new(MemoryOptionStore::new());
    seed(store.as_ref(), "someone-else", active_record());
    let manager = manager(store, ScriptedHttp::new());

    assert!(manager.get_activated_products().unwrap().is_empty());
    assert_eq!(manager.get_to_active_products().unwrap().len(), 1);
}

// ── Accessors ───────────────────────────────────────────────────

#[test]
fn accessors_expose_endpoint_and_messages() {
    let manager = manager(Arc::new(MemoryOptionStore::new()), ScriptedHttp::new());

    assert_eq!(
        manager.get_api_uri(pst_licence::RequestKind::Check),
        "http://www.thaiepay.com?wc-api=software-api&request=check"
    );
    assert_eq!(manager.get_home_url(), "shop.example.com");
    assert_eq!(
        manager.get_renewing_uri("KEY 1").as_deref(),
        Some("http://thaiepay.com?renewing_key=KEY%201")
    );
    assert_eq!(
        manager.get_error_code_message("106"),
        Some("Licence key has expired")
    );
    assert_eq!(manager.get_error_code_message("999"), None);
    assert_eq!(manager.get_product_id(PLUGIN_INIT), Some(PRODUCT_ID));
}
