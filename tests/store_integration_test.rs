// Results database behavior through the public API

use consentprobe::store::ResultStore;
use consentprobe::types::{
    CmpPingRecord, ConsentDetectionRecord, CookieDialogRecord, DialogMatch, UiElement, Visit,
};
use tempfile::TempDir;

fn visit(id: i64) -> Visit {
    Visit {
        visit_id: id,
        browser_id: 1,
        site_url: format!("http://www.site{id}.example"),
    }
}

#[test]
fn test_visits_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("crawl-data.sqlite");

    {
        let store = ResultStore::open(&path).unwrap();
        store.record_visit(&visit(1)).unwrap();
        store.record_visit(&visit(2)).unwrap();
        assert_eq!(store.visit_count().unwrap(), 2);
    }

    let store = ResultStore::open(&path).unwrap();
    assert_eq!(store.visit_count().unwrap(), 2);
}

#[test]
fn test_one_visit_can_fill_every_table() {
    let dir = TempDir::new().unwrap();
    let store = ResultStore::open(&dir.path().join("crawl-data.sqlite")).unwrap();

    store.record_visit(&visit(1)).unwrap();

    store
        .insert_dark_patterns(&ConsentDetectionRecord {
            visit_id: 1,
            allow: Some(UiElement {
                text: "Alles accepteren".to_string(),
                width: 180,
                height: 44,
                bg_color: "rgb(0, 120, 215)".to_string(),
                bg_color_hex: Some("#0078d7".to_string()),
            }),
            reject: None,
        })
        .unwrap();

    store
        .insert_cmp_ping(&CmpPingRecord {
            visit_id: 1,
            cmp_id: Some(28),
            cmp_name: "OneTrust LLC".to_string(),
            policy_version: Some(2),
            gdpr_applies: Some(true),
        })
        .unwrap();

    store
        .insert_cookie_dialog(&CookieDialogRecord {
            visit_id: 1,
            kind: DialogMatch::Id,
        })
        .unwrap();

    assert_eq!(store.visit_count().unwrap(), 1);
}

#[test]
fn test_not_found_dialog_still_inserts() {
    let dir = TempDir::new().unwrap();
    let store = ResultStore::open(&dir.path().join("crawl-data.sqlite")).unwrap();

    store.record_visit(&visit(1)).unwrap();
    store
        .insert_cookie_dialog(&CookieDialogRecord {
            visit_id: 1,
            kind: DialogMatch::None,
        })
        .unwrap();
}
