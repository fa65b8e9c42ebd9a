mod common;

use bitwarden_alfred_core::auth::{NOT_LOGGED_IN_MSG, NOT_UNLOCKED_MSG};
use bitwarden_alfred_core::cache_crypto::CacheCipher;
use bitwarden_alfred_core::cache_store::{CacheStore, Marker};
use bitwarden_alfred_core::contract::{Feedback, Outcome, RowKind};
use bitwarden_alfred_core::dispatcher::{dispatch, Operation};
use bitwarden_alfred_core::jobs::Job;
use bitwarden_alfred_core::model::VaultItem;
use bitwarden_alfred_core::session::SessionState;
use bitwarden_alfred_core::vault_search::extract_path;
use common::{folder, login_item, FakeJobs, Harness};

fn search(h: &Harness, query: &str, item_id: Option<&str>) -> Feedback {
    let mut wf = h.wf();
    let outcome = dispatch(
        &mut wf,
        Operation::Search {
            query: query.to_string(),
            item_id: item_id.map(str::to_string),
        },
    )
    .unwrap();
    outcome.feedback().unwrap().clone()
}

fn folder_search(h: &Harness, folder_id: Option<&str>) -> Feedback {
    let mut wf = h.wf();
    let outcome = dispatch(
        &mut wf,
        Operation::Folder {
            query: String::new(),
            folder_id: folder_id.map(str::to_string),
        },
    )
    .unwrap();
    outcome.feedback().unwrap().clone()
}

fn data_uids(feedback: &Feedback) -> Vec<String> {
    feedback
        .items
        .iter()
        .filter(|row| row.kind == RowKind::Data)
        .filter_map(|row| row.uid.clone())
        .collect()
}

fn sample_vault() -> Vec<VaultItem> {
    vec![
        login_item("a", "", "GitHub", "octo", "https://github.com/login"),
        login_item("b", "f1", "Gmail", "me", "https://mail.google.com"),
        login_item("c", "f2", "Bank", "acct", "https://bank.example.org"),
    ]
}

#[test]
fn no_cache_and_no_job_offers_exactly_one_sync() {
    let h = Harness::new();

    let feedback = search(&h, "", None);

    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback.items[0].action(), Some("--sync"));
    assert_eq!(feedback.items[0].arg.as_deref(), Some("--background"));
    assert_eq!(feedback.count_kind(RowKind::Data), 0);
}

#[test]
fn running_sync_job_shows_exactly_one_refreshing_row() {
    let mut h = Harness::new();
    assert_eq!(search(&h, "", None).items[0].action(), Some("--sync"));

    h.jobs = FakeJobs::with_running(Job::SYNC);
    let feedback = search(&h, "", None);

    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback.items[0].title, "Refreshing Bitwarden cache…");
    assert_eq!(feedback.items[0].kind, RowKind::Placeholder);
}

#[test]
fn unreadable_item_cache_counts_as_missing() {
    let h = Harness::new().with_fresh_markers();
    h.store.store(Marker::Items, b"{not json").unwrap();
    h.store.store(Marker::Folders, b"[]").unwrap();

    let feedback = search(&h, "", None);

    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback.items[0].action(), Some("--sync"));
}

#[test]
fn stale_icon_cache_offers_icon_refresh_before_rendering() {
    let h = Harness::new().with_vault(&sample_vault(), &[]);

    let feedback = search(&h, "", None);

    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback.items[0].action(), Some("--icons"));
    assert!(!h.store.exists(Marker::LastUsage));
}

#[test]
fn disabled_icon_cache_renders_without_icon_marker() {
    let mut h = Harness::new().with_vault(&sample_vault(), &[]);
    h.config.icon_cache_enabled = false;

    let feedback = search(&h, "", None);

    assert_eq!(data_uids(&feedback), ["a", "b", "c"]);
    assert!(h.store.exists(Marker::LastUsage));
}

#[test]
fn renders_search_folders_row_then_items() {
    let h = Harness::new()
        .with_fresh_markers()
        .with_vault(&sample_vault(), &[]);

    let feedback = search(&h, "", None);

    assert_eq!(feedback.items[0].title, "Search Folders");
    assert_eq!(feedback.items[0].arg.as_deref(), Some(".bwf"));
    assert_eq!(data_uids(&feedback), ["a", "b", "c"]);

    let github = &feedback.items[1];
    assert_eq!(github.subtitle, "octo | github.com");
    assert_eq!(github.arg.as_deref(), Some("login.password"));
    assert_eq!(github.variables["action"], "--getitem");
    assert_eq!(github.variables["action2"], "--id a");
    assert!(feedback.suppress_uids);
    assert_eq!(feedback.max_results, Some(1000));
}

#[test]
fn query_filters_items_by_name_username_and_host() {
    let h = Harness::new()
        .with_fresh_markers()
        .with_vault(&sample_vault(), &[]);

    assert_eq!(data_uids(&search(&h, "github", None)), ["a"]);
    assert_eq!(data_uids(&search(&h, "acct", None)), ["c"]);
    assert_eq!(data_uids(&search(&h, "google", None)), ["b"]);
}

#[test]
fn no_match_shows_no_secrets_found() {
    let h = Harness::new()
        .with_fresh_markers()
        .with_vault(&sample_vault(), &[]);

    let feedback = search(&h, "zzzzqqq", None);

    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback.items[0].title, "No Secrets Found");
    assert_eq!(feedback.items[0].kind, RowKind::Warning);
}

#[test]
fn empty_vault_with_sync_marker_shows_no_secrets_found() {
    let h = Harness::new().with_fresh_markers().with_vault(&[], &[]);

    let feedback = search(&h, "", None);

    assert!(feedback
        .items
        .iter()
        .any(|row| row.title == "No Secrets Found"));
    assert_eq!(feedback.count_kind(RowKind::Data), 0);
}

#[test]
fn logged_out_session_warns_but_still_renders_cached_items() {
    let mut h = Harness::new()
        .with_fresh_markers()
        .with_vault(&sample_vault(), &[]);
    h.session = SessionState::new("", "");

    let feedback = search(&h, "github", None);

    assert_eq!(feedback.items[0].title, NOT_LOGGED_IN_MSG);
    assert!(feedback.items[0].subtitle.contains("reading cached items"));
    assert_eq!(feedback.items[1].action(), Some("--login"));
    assert_eq!(data_uids(&feedback), ["a"]);
}

#[test]
fn logged_out_without_cache_asks_to_login_and_sync() {
    let mut h = Harness::new();
    h.session = SessionState::new("", "");

    let feedback = search(&h, "", None);

    assert_eq!(feedback.items[0].subtitle, "Need to login first.");
    assert_eq!(feedback.items.last().unwrap().action(), Some("--sync"));
}

#[test]
fn locked_session_warns_with_unlock_row() {
    let mut h = Harness::new()
        .with_fresh_markers()
        .with_vault(&sample_vault(), &[]);
    h.session = SessionState::new("user-1", "");

    let feedback = search(&h, "", None);

    assert_eq!(feedback.items[0].title, NOT_UNLOCKED_MSG);
    assert_eq!(feedback.items[1].action(), Some("--unlock"));
    assert_eq!(feedback.count_kind(RowKind::Data), 3);
}

#[test]
fn folder_null_selects_items_without_folder() {
    let h = Harness::new().with_fresh_markers().with_vault(
        &[login_item("a", "", "Alpha", "u", "https://a.example.com")],
        &[folder("", "No Folder")],
    );

    let feedback = folder_search(&h, Some("null"));

    assert_eq!(data_uids(&feedback), ["a"]);
    assert_eq!(feedback.items[0].title, "Back to folder search.");
    assert_eq!(feedback.items[1].title, "Back to normal search.");
}

#[test]
fn concrete_folder_id_selects_only_matching_items() {
    let h = Harness::new()
        .with_fresh_markers()
        .with_vault(&sample_vault(), &[folder("f1", "Mail"), folder("f2", "Money")]);

    assert_eq!(data_uids(&folder_search(&h, Some("f1"))), ["b"]);
    assert_eq!(data_uids(&folder_search(&h, Some("null"))), ["a"]);
    assert!(data_uids(&folder_search(&h, Some("nope"))).is_empty());
}

#[test]
fn folder_list_shows_counts_and_navigation_ids() {
    let h = Harness::new().with_fresh_markers().with_vault(
        &sample_vault(),
        &[folder("f1", "Mail"), folder("", "No Folder")],
    );

    let feedback = folder_search(&h, None);

    assert_eq!(feedback.items[0].title, "Back to normal search.");
    let mail = &feedback.items[1];
    assert_eq!(mail.title, "Mail");
    assert_eq!(mail.subtitle, "Number of items: 1");
    assert_eq!(mail.variables["action"], "--folder");
    assert_eq!(mail.variables["action2"], "--id f1");
    let none = &feedback.items[2];
    assert_eq!(none.uid.as_deref(), Some("null"));
    assert_eq!(none.subtitle, "Number of items: 1");
}

#[test]
fn item_details_hide_secrets_and_offer_totp() {
    let mut item = login_item("a", "", "GitHub", "octo", "https://github.com");
    if let Some(login) = item.login.as_mut() {
        login.totp = Some("otpauth://seed".to_string());
    }
    let h = Harness::new().with_fresh_markers().with_vault(&[item], &[]);

    let feedback = search(&h, "", Some("a"));

    let password = feedback
        .items
        .iter()
        .find(|row| row.subtitle == "Password")
        .unwrap();
    assert_eq!(password.title, "••••••••");
    assert_eq!(password.arg.as_deref(), Some("login.password"));

    let totp = feedback.items.iter().find(|row| row.title == "TOTP").unwrap();
    assert_eq!(totp.variables["action2"], "--id a --totp");

    let url = feedback
        .items
        .iter()
        .find(|row| row.action() == Some("--open"))
        .unwrap();
    assert_eq!(url.arg.as_deref(), Some("https://github.com"));
    assert_eq!(
        feedback.items.last().unwrap().title,
        "Back to normal search."
    );
}

#[test]
fn cached_items_are_redacted() {
    let h = Harness::new().with_vault(&sample_vault(), &[]);

    let cached: Vec<VaultItem> = h.store.load_sealed_json(Marker::Items).unwrap();
    let login = cached[0].login.as_ref().unwrap();
    assert_eq!(login.password.as_deref(), Some(""));
    assert_eq!(login.username.as_deref(), Some("octo"));
}

#[test]
fn stale_auto_fetch_starts_one_icon_job_for_missing_favicons() {
    let h = Harness::new().with_vault(&sample_vault(), &[]);
    h.store.store_timestamp(Marker::IconCache).unwrap();

    let feedback = search(&h, "", None);

    assert_eq!(feedback.count_kind(RowKind::Data), 3);
    assert_eq!(*h.jobs.started.borrow(), [Job::Icons]);
    assert!(h.store.exists(Marker::AutoFetch));

    search(&h, "", None);
    assert_eq!(h.jobs.started.borrow().len(), 1);
}

#[test]
fn folder_listing_leaves_the_auto_fetch_window_open() {
    let h = Harness::new().with_vault(&sample_vault(), &[folder("f1", "Mail")]);
    h.store.store_timestamp(Marker::IconCache).unwrap();

    folder_search(&h, None);
    assert!(!h.store.exists(Marker::AutoFetch));
    assert!(h.jobs.started.borrow().is_empty());

    search(&h, "", None);
    assert!(h.store.exists(Marker::AutoFetch));
    assert_eq!(*h.jobs.started.borrow(), [Job::Icons]);
}

#[test]
fn cached_favicon_is_used_as_row_icon() {
    let h = Harness::new()
        .with_fresh_markers()
        .with_vault(&sample_vault(), &[]);
    let icons_dir = h.config.icons_dir();
    std::fs::create_dir_all(&icons_dir).unwrap();
    std::fs::write(icons_dir.join("github.com.png"), b"png").unwrap();

    let feedback = search(&h, "github", None);

    let row = feedback.items.iter().find(|row| row.uid.as_deref() == Some("a")).unwrap();
    let icon = row.icon.as_ref().unwrap();
    assert!(icon.path.ends_with("github.com.png"));
}

fn get_item(h: &Harness, id: &str, path: &str, totp: bool) -> Outcome {
    let mut wf = h.wf();
    dispatch(
        &mut wf,
        Operation::GetItem {
            id: id.to_string(),
            path: path.to_string(),
            totp,
            attachment: None,
        },
    )
    .unwrap()
}

#[test]
fn get_item_requires_an_id() {
    let h = Harness::new();
    assert_eq!(get_item(&h, " ", "login.password", false).text(), Some("Missing item id."));
    assert!(h.cli.calls.borrow().is_empty());
}

#[test]
fn get_item_fetches_secret_through_the_vault_cli_when_unlocked() {
    let h = Harness::new();
    h.cli.respond(
        "get item a",
        r#"{"id":"a","login":{"username":"octo","password":"s3cret"}}"#,
    );

    let outcome = get_item(&h, "a", "login.password", false);

    assert_eq!(outcome.text(), Some("s3cret"));
    assert_eq!(
        h.cli.call_lines(),
        ["get item a --session session-key --nointeraction"]
    );
}

#[test]
fn locked_get_item_reads_plain_fields_from_cache_only() {
    let mut h = Harness::new().with_vault(&sample_vault(), &[]);
    h.session = SessionState::new("user-1", "");

    assert_eq!(get_item(&h, "a", "login.username", false).text(), Some("octo"));
    assert_eq!(
        get_item(&h, "a", "login.password", false).text(),
        Some(NOT_UNLOCKED_MSG)
    );
    assert_eq!(get_item(&h, "a", "", true).text(), Some(NOT_UNLOCKED_MSG));
    assert!(h.cli.calls.borrow().is_empty());
}

fn secure_note(id: &str, notes: &str) -> VaultItem {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "folderId": null,
        "type": 2,
        "name": "Recovery codes",
        "notes": notes,
        "fields": [{"name": "pin", "value": "VISIBLE-FIELD-SECRET", "type": 0}]
    }))
    .unwrap()
}

#[test]
fn cached_vault_is_sealed_on_disk() {
    let h = Harness::new().with_vault(&[secure_note("n1", "TOP-SECRET-RECOVERY-1234")], &[]);

    let raw = h.store.load(Marker::Items).unwrap();
    let text = String::from_utf8_lossy(&raw);
    assert!(!text.contains("TOP-SECRET-RECOVERY-1234"));
    assert!(!text.contains("VISIBLE-FIELD-SECRET"));
    assert!(!text.contains("Recovery codes"));

    let cached: Vec<VaultItem> = h.store.load_sealed_json(Marker::Items).unwrap();
    assert_eq!(cached[0].notes.as_deref(), Some("TOP-SECRET-RECOVERY-1234"));
}

#[test]
fn locked_get_item_refuses_notes_and_fields() {
    let mut h = Harness::new().with_vault(&[secure_note("n1", "TOP-SECRET-RECOVERY-1234")], &[]);
    h.session = SessionState::new("user-1", "");

    assert_eq!(get_item(&h, "n1", "notes", false).text(), Some(NOT_UNLOCKED_MSG));
    assert_eq!(
        get_item(&h, "n1", "fields.0.value", false).text(),
        Some(NOT_UNLOCKED_MSG)
    );
    assert_eq!(get_item(&h, "n1", "name", false).text(), Some("Recovery codes"));
}

#[test]
fn cache_sealed_under_another_key_counts_as_missing() {
    let h = Harness::new().with_fresh_markers();
    let foreign = CacheStore::open_memory()
        .unwrap()
        .with_cipher(CacheCipher::generate());
    bitwarden_alfred_core::sync::write_cache(&foreign, &sample_vault(), &[]).unwrap();
    for marker in [Marker::Items, Marker::Folders] {
        h.store.store(marker, &foreign.load(marker).unwrap()).unwrap();
    }

    let feedback = search(&h, "", None);

    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback.items[0].action(), Some("--sync"));
}

#[test]
fn get_item_totp_prints_current_code() {
    let h = Harness::new();
    h.cli.respond("get totp a", "123456");

    assert_eq!(get_item(&h, "a", "", true).text(), Some("123456"));
}

#[test]
fn get_item_without_path_renders_details() {
    let h = Harness::new()
        .with_fresh_markers()
        .with_vault(&sample_vault(), &[]);

    let outcome = get_item(&h, "a", "", false);

    let feedback = outcome.feedback().unwrap();
    assert!(feedback.items.iter().any(|row| row.subtitle == "Username"));
}

#[test]
fn get_item_downloads_attachment_into_cache_dir() {
    let h = Harness::new();
    h.cli.respond("get attachment att1", "/tmp/out/file.pdf");
    let mut wf = h.wf();

    let outcome = dispatch(
        &mut wf,
        Operation::GetItem {
            id: "a".to_string(),
            path: String::new(),
            totp: false,
            attachment: Some("att1".to_string()),
        },
    )
    .unwrap();

    assert_eq!(outcome.text(), Some("/tmp/out/file.pdf"));
    let line = &h.cli.call_lines()[0];
    assert!(line.contains("--itemid a"));
    assert!(h.config.attachments_dir().is_dir());
}

#[test]
fn extract_path_walks_objects_and_arrays() {
    let value = serde_json::json!({
        "name": "GitHub",
        "login": {"uris": [{"uri": "https://github.com"}], "totp": null},
        "type": 1
    });

    assert_eq!(extract_path(&value, "name").as_deref(), Some("GitHub"));
    assert_eq!(
        extract_path(&value, "$.login.uris.0.uri").as_deref(),
        Some("https://github.com")
    );
    assert_eq!(extract_path(&value, "type").as_deref(), Some("1"));
    assert_eq!(extract_path(&value, "login.totp"), None);
    assert_eq!(extract_path(&value, "login.uris.5.uri"), None);
    assert_eq!(extract_path(&value, "name.first"), None);
}
