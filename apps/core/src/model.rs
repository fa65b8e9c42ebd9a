use serde::{Deserialize, Deserializer, Serialize};

/// Folder id used in navigation for items that live outside any folder.
pub const NO_FOLDER_ID: &str = "null";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ItemType {
    Login,
    SecureNote,
    Card,
    Identity,
    Other(u8),
}

impl Default for ItemType {
    fn default() -> Self {
        Self::Login
    }
}

impl From<u8> for ItemType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Login,
            2 => Self::SecureNote,
            3 => Self::Card,
            4 => Self::Identity,
            other => Self::Other(other),
        }
    }
}

impl From<ItemType> for u8 {
    fn from(value: ItemType) -> Self {
        match value {
            ItemType::Login => 1,
            ItemType::SecureNote => 2,
            ItemType::Card => 3,
            ItemType::Identity => 4,
            ItemType::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultItem {
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub folder_id: String,
    #[serde(rename = "type")]
    pub kind: ItemType,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub notes: Option<String>,
    pub login: Option<Login>,
    pub card: Option<Card>,
    pub identity: Option<Identity>,
    #[serde(deserialize_with = "null_as_default")]
    pub fields: Vec<CustomField>,
    #[serde(deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Login {
    pub username: Option<String>,
    pub password: Option<String>,
    pub totp: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub uris: Vec<LoginUri>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginUri {
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Card {
    pub cardholder_name: Option<String>,
    pub brand: Option<String>,
    pub number: Option<String>,
    pub exp_month: Option<String>,
    pub exp_year: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Identity {
    pub title: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub username: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomField {
    pub name: Option<String>,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub kind: u8,
}

impl CustomField {
    pub const HIDDEN: u8 = 1;

    pub fn is_hidden(&self) -> bool {
        self.kind == Self::HIDDEN
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attachment {
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub file_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub size_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Folder {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

impl Folder {
    /// Id used for navigation; the folder without an id becomes `null`.
    pub fn nav_id(&self) -> &str {
        if self.id.is_empty() {
            NO_FOLDER_ID
        } else {
            &self.id
        }
    }
}

impl VaultItem {
    pub fn in_folder(&self, folder_id: &str) -> bool {
        if folder_id == NO_FOLDER_ID {
            self.folder_id.is_empty()
        } else {
            self.folder_id == folder_id
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.login
            .as_ref()
            .and_then(|login| login.username.as_deref())
            .filter(|name| !name.is_empty())
    }

    pub fn has_password(&self) -> bool {
        self.login.as_ref().is_some_and(|login| login.password.is_some())
    }

    pub fn has_totp(&self) -> bool {
        self.login.as_ref().is_some_and(|login| login.totp.is_some())
    }

    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.login
            .iter()
            .flat_map(|login| login.uris.iter())
            .filter_map(|uri| uri.uri.as_deref())
            .filter(|uri| !uri.trim().is_empty())
    }

    pub fn first_host(&self) -> Option<String> {
        self.uris().find_map(uri_host)
    }

    /// Copy of the item with every secret value blanked. Presence is kept so
    /// the detail view can still offer to fetch the value through the vault CLI.
    pub fn redacted(&self) -> Self {
        let mut item = self.clone();
        if let Some(login) = item.login.as_mut() {
            blank(&mut login.password);
            blank(&mut login.totp);
        }
        if let Some(card) = item.card.as_mut() {
            blank(&mut card.number);
            blank(&mut card.code);
        }
        for field in item.fields.iter_mut().filter(|field| field.is_hidden()) {
            blank(&mut field.value);
        }
        item
    }
}

fn blank(value: &mut Option<String>) {
    if let Some(value) = value.as_mut() {
        value.clear();
    }
}

/// Host part of an http(s) or scheme-less URI, lowercased.
pub fn uri_host(uri: &str) -> Option<String> {
    let trimmed = uri.trim();
    let rest = match trimmed.split_once("://") {
        Some((scheme, rest)) => {
            if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
                return None;
            }
            rest
        }
        None => trimmed,
    };

    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    let host = host_port.split(':').next().unwrap_or_default();
    if host.is_empty() || host.chars().any(|c| c.is_whitespace()) || !host.contains('.') {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

pub fn normalize_for_search(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
