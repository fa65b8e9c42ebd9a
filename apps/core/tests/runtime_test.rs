use bitwarden_alfred_core::dispatcher::Operation;
use bitwarden_alfred_core::runtime::parse_cli_args;
use bitwarden_alfred_core::sync::SyncRequest;

fn parse(raw: &[&str]) -> Operation {
    let args: Vec<String> = raw.iter().map(|arg| arg.to_string()).collect();
    parse_cli_args(&args).unwrap()
}

#[test]
fn empty_invocation_is_an_empty_search() {
    assert_eq!(
        parse(&[]),
        Operation::Search {
            query: String::new(),
            item_id: None,
        }
    );
}

#[test]
fn search_with_id_shows_item_details() {
    assert_eq!(
        parse(&["--search", "--id", "abc", "pass"]),
        Operation::Search {
            query: "pass".to_string(),
            item_id: Some("abc".to_string()),
        }
    );
}

#[test]
fn getitem_uses_query_as_field_path() {
    assert_eq!(
        parse(&["--getitem", "--id", "abc", "login.username"]),
        Operation::GetItem {
            id: "abc".to_string(),
            path: "login.username".to_string(),
            totp: false,
            attachment: None,
        }
    );
    assert_eq!(
        parse(&["--getitem", "--id", "abc", "--attachment", "att"]),
        Operation::GetItem {
            id: "abc".to_string(),
            path: String::new(),
            totp: false,
            attachment: Some("att".to_string()),
        }
    );
}

#[test]
fn setconfigs_splits_key_from_value() {
    assert_eq!(
        parse(&["--setconfigs", "server", "https://vault.example.com"]),
        Operation::SetConfigs {
            key: "server".to_string(),
            value: "https://vault.example.com".to_string(),
        }
    );
    assert_eq!(
        parse(&["--setconfigs", "email"]),
        Operation::SetConfigs {
            key: "email".to_string(),
            value: String::new(),
        }
    );
}

#[test]
fn sync_modifiers_are_carried() {
    assert_eq!(
        parse(&["--sync", "--force", "--background"]),
        Operation::Sync(SyncRequest {
            force: true,
            last: false,
            background: true,
        })
    );
    assert_eq!(
        parse(&["--icons", "--background"]),
        Operation::Icons { background: true }
    );
}

#[test]
fn folder_and_authconfig_take_their_id() {
    assert_eq!(
        parse(&["--folder", "--id", "null"]),
        Operation::Folder {
            query: String::new(),
            folder_id: Some("null".to_string()),
        }
    );
    assert_eq!(
        parse(&["--authconfig", "--id", "on-off-sfa"]),
        Operation::AuthConfig {
            menu: "on-off-sfa".to_string(),
            query: String::new(),
        }
    );
}

#[test]
fn simple_operations_parse() {
    assert_eq!(parse(&["--lock"]), Operation::Lock);
    assert_eq!(parse(&["--unlock"]), Operation::Unlock);
    assert_eq!(parse(&["--logout"]), Operation::Logout);
    assert_eq!(
        parse(&["--login", "123456"]),
        Operation::Login {
            code: "123456".to_string(),
        }
    );
    assert_eq!(
        parse(&["--open", "README.html"]),
        Operation::Open {
            target: "README.html".to_string(),
        }
    );
}

#[test]
fn conflicting_operations_and_unknown_flags_are_rejected() {
    let args: Vec<String> = ["--lock", "--unlock"].iter().map(|a| a.to_string()).collect();
    assert!(parse_cli_args(&args).is_err());

    let args = vec!["--frobnicate".to_string()];
    assert!(parse_cli_args(&args).is_err());
}
