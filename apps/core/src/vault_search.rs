use std::collections::HashSet;

use crate::auth::{NOT_LOGGED_IN_MSG, NOT_UNLOCKED_MSG};
use crate::cache_store::{CacheStore, Marker};
use crate::contract::{Feedback, Icon, Outcome, ResultRecord, RowKind};
use crate::dispatcher::Workflow;
use crate::freshness::{self, Decision};
use crate::icons;
use crate::jobs::{self, Job};
use crate::menus;
use crate::model::{Folder, ItemType, VaultItem};
use crate::vault_cli;

const HIDDEN_VALUE: &str = "••••••••";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultData {
    pub items: Vec<VaultItem>,
    pub folders: Vec<Folder>,
}

impl VaultData {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.folders.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&VaultItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn count_in_folder(&self, folder_id: &str) -> usize {
        self.items.iter().filter(|item| item.in_folder(folder_id)).count()
    }
}

/// Items and folders from the cache, or `None` when either is missing or unreadable.
pub fn load_cached(store: &CacheStore) -> Option<VaultData> {
    if !store.exists(Marker::Items) || !store.exists(Marker::Folders) {
        return None;
    }

    let items = store.load_sealed_json::<Vec<VaultItem>>(Marker::Items);
    let folders = store.load_sealed_json::<Vec<Folder>>(Marker::Folders);
    match (items, folders) {
        (Ok(items), Ok(folders)) => Some(VaultData { items, folders }),
        (Err(error), _) | (_, Err(error)) => {
            crate::logging::error(&format!("cannot load vault cache: {error}"));
            None
        }
    }
}

/// Where a search pass is pointed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope<'q> {
    All,
    Item(&'q str),
    Folders,
    Folder(&'q str),
}

impl<'q> SearchScope<'q> {
    pub fn new(folder_mode: bool, id: Option<&'q str>) -> Self {
        match (folder_mode, id.filter(|id| !id.trim().is_empty())) {
            (false, None) => Self::All,
            (false, Some(id)) => Self::Item(id.trim()),
            (true, None) => Self::Folders,
            (true, Some(id)) => Self::Folder(id.trim()),
        }
    }
}

/// Session warnings that lead every search, regardless of the query.
fn session_rows(wf: &Workflow<'_>, data_cached: bool) -> Vec<ResultRecord> {
    if !wf.session.is_logged_in() {
        let message = if data_cached {
            "Need to login first to get secrets, reading cached items without the secret."
        } else {
            "Need to login first."
        };
        return vec![
            ResultRecord::warning(NOT_LOGGED_IN_MSG, message),
            menus::login_row(&wf.config),
        ];
    }
    if !wf.session.is_unlocked() {
        return vec![
            ResultRecord::warning(
                NOT_UNLOCKED_MSG,
                "Need to unlock first to get secrets, reading cached items without the secrets.",
            ),
            menus::unlock_row(&wf.config),
        ];
    }
    Vec::new()
}

pub fn run_search(wf: &Workflow<'_>, query: &str, scope: SearchScope<'_>) -> Feedback {
    let cached = load_cached(wf.store);
    let data_cached = cached.is_some();
    let header = session_rows(wf, data_cached);

    let mut body = Feedback::new();
    body.suppress_uids = wf.config.reordering_disabled;
    body.max_results = Some(usize::from(wf.config.max_results));

    let fetches_icons = !matches!(scope, SearchScope::Folders);
    let decision =
        freshness::evaluate(wf.store, &wf.config, wf.jobs, data_cached, fetches_icons);
    let auto_fetch = match decision {
        Decision::TriggerSync => {
            body.push(menus::sync_action_row(
                "Cache expired/not existing. Need to run a sync.",
            ));
            return with_header(header, body);
        }
        Decision::Refreshing => {
            body.push(
                ResultRecord::new("Refreshing Bitwarden cache…")
                    .icon(Icon::Reload)
                    .kind(RowKind::Placeholder),
            );
            return with_header(header, body);
        }
        Decision::TriggerIconRefresh => {
            body.push(menus::icons_action_row(
                "Cache expired/not existing. Need to download/update Favicon for URLs",
            ));
            return with_header(header, body);
        }
        Decision::Render { auto_fetch } => auto_fetch,
    };

    let data = cached.unwrap_or_default();
    let cached_icons = icons::cached_hosts(&wf.config.icons_dir());
    let rows = RowBuilder {
        wf,
        cached_icons: &cached_icons,
    };

    match scope {
        SearchScope::Folders => {
            crate::logging::info(&format!("listing {} folders", data.folders.len()));
            body.push(back_to_search_row(wf));
            for folder in &data.folders {
                body.push(folder_row(folder, data.count_in_folder(folder.nav_id())));
            }
            body.filter(query);
            if data.is_empty() {
                body.warn_empty("No Secrets Found", "Try a different query or sync manually.");
            }
            body.warn_empty("No Folders Found", "Try a different query.");
            return with_header(header, body);
        }
        SearchScope::Item(id) => match data.find(id) {
            Some(item) => {
                crate::logging::info(&format!("showing details for item {id}"));
                for row in rows.details(item) {
                    body.push(row);
                }
            }
            None => body.push(ResultRecord::warning(
                "Item not found",
                "The item is not in the local cache. Try a sync.",
            )),
        },
        SearchScope::Folder(folder_id) => {
            crate::logging::info(&format!("searching in folder {folder_id}"));
            body.push(
                ResultRecord::new("Back to folder search.")
                    .subtitle("Go back.")
                    .valid(true)
                    .icon(Icon::Folder)
                    .var("action", "--search")
                    .arg(wf.config.folder_keyword.as_str())
                    .kind(RowKind::Navigation),
            );
            body.push(back_to_search_row(wf));
            for item in data.items.iter().filter(|item| item.in_folder(folder_id)) {
                body.push(rows.item(item));
            }
        }
        SearchScope::All => {
            body.push(
                ResultRecord::new("Search Folders")
                    .subtitle("Find folders and secrets in them.")
                    .valid(true)
                    .icon(Icon::Folder)
                    .var("action", "--search")
                    .arg(wf.config.folder_keyword.as_str())
                    .kind(RowKind::Navigation),
            );
            crate::logging::info(&format!("number of items {}", data.items.len()));
            for item in &data.items {
                body.push(rows.item(item));
            }
        }
    }

    if data.is_empty() {
        body.push(ResultRecord::warning(
            "No Secrets Found",
            "Try a different query or sync manually.",
        ));
    }

    body.filter(query);
    body.warn_empty("No Secrets Found", "Try a different query or sync manually.");

    if auto_fetch && wf.config.icon_cache_enabled {
        fetch_missing_icons(wf, &data.items, &cached_icons);
    }

    with_header(header, body)
}

fn with_header(header: Vec<ResultRecord>, mut body: Feedback) -> Feedback {
    if !header.is_empty() {
        let rows = std::mem::take(&mut body.items);
        body.items = header.into_iter().chain(rows).collect();
    }
    body
}

fn fetch_missing_icons(wf: &Workflow<'_>, items: &[VaultItem], cached: &HashSet<String>) {
    let missing = icons::missing_hosts(items, cached);
    if missing.is_empty() {
        return;
    }
    match jobs::start_unless_running(wf.jobs, Job::Icons) {
        Ok(true) => crate::logging::info(&format!("auto-fetching {} favicons", missing.len())),
        Ok(false) => {}
        Err(error) => crate::logging::warn(&format!("cannot start favicon job: {error}")),
    }
}

fn back_to_search_row(wf: &Workflow<'_>) -> ResultRecord {
    ResultRecord::new("Back to normal search.")
        .subtitle("Go back.")
        .valid(true)
        .icon(Icon::Bitwarden)
        .var("action", "--search")
        .arg(wf.config.search_keyword.as_str())
        .kind(RowKind::Navigation)
}

fn folder_row(folder: &Folder, count: usize) -> ResultRecord {
    let id = folder.nav_id();
    ResultRecord::new(folder.name.as_str())
        .subtitle(format!("Number of items: {count}"))
        .valid(true)
        .uid(id)
        .icon(Icon::FolderOpen)
        .var("action", "--folder")
        .var("action2", format!("--id {id}"))
        .kind(RowKind::Navigation)
}

fn type_icon(kind: ItemType) -> Icon {
    match kind {
        ItemType::Login | ItemType::Other(_) => Icon::Login,
        ItemType::SecureNote => Icon::Note,
        ItemType::Card => Icon::Card,
        ItemType::Identity => Icon::Identity,
    }
}

/// Field path copied when an item row is actioned.
fn primary_path(item: &VaultItem) -> &'static str {
    match item.kind {
        ItemType::Login if item.has_password() => "login.password",
        ItemType::Login if item.username().is_some() => "login.username",
        ItemType::SecureNote => "notes",
        ItemType::Card => "card.number",
        ItemType::Identity => "identity.username",
        _ => "name",
    }
}

fn item_subtitle(item: &VaultItem) -> String {
    match item.kind {
        ItemType::Login => {
            let parts: Vec<String> = item
                .username()
                .map(str::to_string)
                .into_iter()
                .chain(item.first_host())
                .collect();
            if parts.is_empty() {
                "Login".to_string()
            } else {
                parts.join(" | ")
            }
        }
        ItemType::SecureNote => "Secure Note".to_string(),
        ItemType::Card => item
            .card
            .as_ref()
            .and_then(|card| card.brand.clone())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "Card".to_string()),
        ItemType::Identity => item
            .identity
            .as_ref()
            .map(|identity| {
                [identity.first_name.as_deref(), identity.last_name.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "Identity".to_string()),
        ItemType::Other(_) => String::new(),
    }
}

struct RowBuilder<'w, 'a> {
    wf: &'w Workflow<'a>,
    cached_icons: &'w HashSet<String>,
}

impl RowBuilder<'_, '_> {
    fn icon_for(&self, item: &VaultItem) -> Icon {
        if self.wf.config.icon_cache_enabled {
            if let Some(host) = item.first_host().filter(|host| self.cached_icons.contains(host)) {
                return Icon::Favicon(icons::icon_file(&self.wf.config, &host));
            }
        }
        type_icon(item.kind)
    }

    fn get_row(&self, item: &VaultItem, title: &str, label: &str, path: &str) -> ResultRecord {
        ResultRecord::new(title)
            .subtitle(label)
            .valid(true)
            .uid(format!("{}-{path}", item.id))
            .arg(path)
            .var("action", "--getitem")
            .var("action2", format!("--id {}", item.id))
            .var("notification", format!("Copied {label} of {}", item.name))
            .match_on(format!("{label} {title}"))
    }

    fn item(&self, item: &VaultItem) -> ResultRecord {
        let path = primary_path(item);
        let match_text = [
            Some(item.name.clone()),
            item.username().map(str::to_string),
            item.first_host(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

        ResultRecord::new(item.name.as_str())
            .subtitle(item_subtitle(item))
            .valid(true)
            .uid(item.id.as_str())
            .arg(path)
            .icon(self.icon_for(item))
            .var("action", "--getitem")
            .var("action2", format!("--id {}", item.id))
            .var("notification", format!("Copied {path} of {}", item.name))
            .match_on(match_text)
    }

    fn details(&self, item: &VaultItem) -> Vec<ResultRecord> {
        let mut rows = Vec::new();
        let icon = self.icon_for(item);
        rows.push(
            self.get_row(item, &item.name, "Name", "name")
                .icon(icon.clone()),
        );

        if let Some(login) = &item.login {
            if let Some(username) = item.username() {
                rows.push(self.get_row(item, username, "Username", "login.username").icon(icon.clone()));
            }
            if login.password.is_some() {
                rows.push(self.get_row(item, HIDDEN_VALUE, "Password", "login.password").icon(Icon::Password));
            }
            if login.totp.is_some() {
                rows.push(
                    self.get_row(item, "TOTP", "TOTP code", "")
                        .icon(Icon::Totp)
                        .var("action2", format!("--id {} --totp", item.id)),
                );
            }
            for uri in item.uris() {
                rows.push(
                    ResultRecord::new(uri)
                        .subtitle("Open URL")
                        .valid(true)
                        .arg(uri)
                        .icon(Icon::Link)
                        .var("action", "--open")
                        .match_on(format!("url {uri}")),
                );
            }
        }

        if let Some(card) = &item.card {
            if let Some(holder) = card.cardholder_name.as_deref().filter(|v| !v.is_empty()) {
                rows.push(self.get_row(item, holder, "Cardholder", "card.cardholderName").icon(Icon::Card));
            }
            if card.number.is_some() {
                rows.push(self.get_row(item, HIDDEN_VALUE, "Card Number", "card.number").icon(Icon::Card));
            }
            if let (Some(month), Some(year)) = (card.exp_month.as_deref(), card.exp_year.as_deref()) {
                rows.push(self.get_row(item, &format!("{month}/{year}"), "Expiry", "card.expYear").icon(Icon::Calendar));
            }
            if card.code.is_some() {
                rows.push(self.get_row(item, HIDDEN_VALUE, "Security Code", "card.code").icon(Icon::Password));
            }
        }

        if let Some(identity) = &item.identity {
            let fields = [
                ("Email", "identity.email", identity.email.as_deref()),
                ("Phone", "identity.phone", identity.phone.as_deref()),
                ("Username", "identity.username", identity.username.as_deref()),
                ("Company", "identity.company", identity.company.as_deref()),
            ];
            for (label, path, value) in fields {
                if let Some(value) = value.filter(|v| !v.is_empty()) {
                    rows.push(self.get_row(item, value, label, path).icon(Icon::Identity));
                }
            }
        }

        if let Some(notes) = item.notes.as_deref().filter(|v| !v.is_empty()) {
            let first_line = notes.lines().next().unwrap_or_default();
            rows.push(self.get_row(item, first_line, "Notes", "notes").icon(Icon::Note));
        }

        for (index, field) in item.fields.iter().enumerate() {
            let name = field.name.as_deref().unwrap_or("Field");
            let title = if field.is_hidden() {
                HIDDEN_VALUE
            } else {
                field.value.as_deref().unwrap_or_default()
            };
            rows.push(self.get_row(
                item,
                title,
                &format!("Field: {name}"),
                &format!("fields.{index}.value"),
            ));
        }

        for attachment in &item.attachments {
            rows.push(
                ResultRecord::new(attachment.file_name.as_str())
                    .subtitle(format!("Attachment ({})", attachment.size_name))
                    .valid(true)
                    .uid(format!("{}-{}", item.id, attachment.id))
                    .icon(Icon::Attachment)
                    .var("action", "--getitem")
                    .var(
                        "action2",
                        format!("--id {} --attachment {}", item.id, attachment.id),
                    )
                    .var("notification", format!("Downloaded {}", attachment.file_name))
                    .match_on(format!("attachment {}", attachment.file_name)),
            );
        }

        rows.push(back_to_search_row(self.wf));
        rows
    }
}

/// Value at a dotted path such as `login.password`, `fields.0.value` or `$.name`.
/// Objects and arrays come back as JSON; null and missing values as `None`.
pub fn extract_path(value: &serde_json::Value, path: &str) -> Option<String> {
    let path = path.trim();
    let path = path.strip_prefix("$.").or_else(|| path.strip_prefix('$')).unwrap_or(path);

    let mut current = value;
    for segment in path.split('.').filter(|segment| !segment.is_empty()) {
        current = match current {
            serde_json::Value::Array(values) => values.get(segment.parse::<usize>().ok()?)?,
            serde_json::Value::Object(map) => map.get(segment)?,
            _ => return None,
        };
    }

    match current {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

pub struct GetItemRequest<'q> {
    pub id: &'q str,
    pub path: &'q str,
    pub totp: bool,
    pub attachment: Option<&'q str>,
}

/// Item paths a locked session may still read from the cache.
const LOCKED_READABLE_PATHS: [&str; 4] =
    ["name", "login.username", "login.uris", "identity.username"];

fn readable_while_locked(path: &str) -> bool {
    let path = path.strip_prefix("$.").unwrap_or(path);
    LOCKED_READABLE_PATHS.iter().any(|allowed| {
        path.strip_prefix(*allowed)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
    })
}

pub fn run_get_item(wf: &Workflow<'_>, request: GetItemRequest<'_>) -> Outcome {
    let id = request.id.trim();
    if id.is_empty() {
        return Outcome::Text("Missing item id.".to_string());
    }

    let path = request.path.trim();
    let attachment = request.attachment.map(str::trim).filter(|a| !a.is_empty());
    if !request.totp && attachment.is_none() && path.is_empty() {
        return Outcome::Feedback(run_search(wf, "", SearchScope::Item(id)));
    }

    if request.totp {
        let Some(session) = wf.session.session_key() else {
            return Outcome::Text(NOT_UNLOCKED_MSG.to_string());
        };
        return Outcome::Text(match vault_cli::get_totp(wf.cli, session, id) {
            Ok(code) => code,
            Err(error) => {
                crate::logging::error(&format!("get totp failed: {error}"));
                format!("Unable to get TOTP: {}", error.user_message())
            }
        });
    }

    if let Some(attachment_id) = attachment {
        let Some(session) = wf.session.session_key() else {
            return Outcome::Text(NOT_UNLOCKED_MSG.to_string());
        };
        let output_dir = wf.config.attachments_dir();
        if let Err(error) = std::fs::create_dir_all(&output_dir) {
            crate::logging::error(&format!("cannot create attachments dir: {error}"));
            return Outcome::Text(format!("Unable to save attachment: {error}"));
        }
        return Outcome::Text(
            match vault_cli::get_attachment(wf.cli, session, id, attachment_id, &output_dir) {
                Ok(written) => written,
                Err(error) => {
                    crate::logging::error(&format!("get attachment failed: {error}"));
                    format!("Unable to get attachment: {}", error.user_message())
                }
            },
        );
    }

    let value = match wf.session.session_key() {
        Some(session) => match vault_cli::get_item(wf.cli, session, id) {
            Ok(value) => Some(value),
            Err(error) => {
                crate::logging::error(&format!("get item failed: {error}"));
                return Outcome::Text(format!("Unable to get item: {}", error.user_message()));
            }
        },
        None if !readable_while_locked(path) => {
            return Outcome::Text(NOT_UNLOCKED_MSG.to_string());
        }
        None => load_cached(wf.store)
            .and_then(|data| data.find(id).cloned())
            .and_then(|item| serde_json::to_value(item).ok()),
    };

    match value.as_ref().and_then(|value| extract_path(value, path)) {
        Some(found) if !found.is_empty() => Outcome::Text(found),
        _ if !wf.session.is_unlocked() => Outcome::Text(NOT_UNLOCKED_MSG.to_string()),
        _ => Outcome::Text(format!("No value at '{path}'.")),
    }
}
