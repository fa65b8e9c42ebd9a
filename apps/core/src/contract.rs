//! Result records handed to Alfred. This is the only data contract with the
//! host: one JSON object `{"items": [...]}` on stdout per invocation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowKind {
    /// A vault item or one of its detail fields.
    #[default]
    Data,
    /// Runs another workflow operation when actioned.
    Action,
    Navigation,
    Warning,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Icon {
    Reload,
    Warning,
    Folder,
    FolderOpen,
    Email,
    Server,
    Bitwarden,
    UserClock,
    On,
    Off,
    Help,
    Issue,
    Link,
    Calendar,
    App,
    Yubikey,
    Login,
    Note,
    Card,
    Identity,
    Password,
    Totp,
    Attachment,
    Favicon(PathBuf),
}

impl Icon {
    pub fn path(&self) -> String {
        let file = match self {
            Self::Reload => "reload.png",
            Self::Warning => "warning.png",
            Self::Folder => "folder.png",
            Self::FolderOpen => "folder-open.png",
            Self::Email => "email.png",
            Self::Server => "server.png",
            Self::Bitwarden => "bw.png",
            Self::UserClock => "user-clock.png",
            Self::On => "on.png",
            Self::Off => "off.png",
            Self::Help => "help.png",
            Self::Issue => "issue.png",
            Self::Link => "link.png",
            Self::Calendar => "calendar-day.png",
            Self::App => "app.png",
            Self::Yubikey => "yubikey.png",
            Self::Login => "login.png",
            Self::Note => "note.png",
            Self::Card => "card.png",
            Self::Identity => "identity.png",
            Self::Password => "password.png",
            Self::Totp => "totp.png",
            Self::Attachment => "attachment.png",
            Self::Favicon(path) => return path.to_string_lossy().into_owned(),
        };
        format!("icons/{file}")
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IconRef {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResultRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtitle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg: Option<String>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<IconRef>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
    #[serde(skip)]
    pub kind: RowKind,
    /// Text the query is matched against; defaults to the title.
    #[serde(skip)]
    pub match_text: String,
}

impl ResultRecord {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            uid: None,
            match_text: title.clone(),
            title,
            subtitle: String::new(),
            arg: None,
            valid: false,
            icon: None,
            variables: BTreeMap::new(),
            kind: RowKind::Data,
        }
    }

    /// Invalid row with a warning icon, as shown for auth problems and empty results.
    pub fn warning(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self::new(title)
            .subtitle(subtitle)
            .icon(Icon::Warning)
            .kind(RowKind::Warning)
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arg = Some(arg.into());
        self
    }

    pub fn valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    pub fn icon(mut self, icon: Icon) -> Self {
        self.icon = Some(IconRef { path: icon.path() });
        self
    }

    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.variables.insert(key.to_string(), value.into());
        self
    }

    pub fn kind(mut self, kind: RowKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn match_on(mut self, text: impl Into<String>) -> Self {
        self.match_text = text.into();
        self
    }

    pub fn action(&self) -> Option<&str> {
        self.variables.get("action").map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feedback {
    pub items: Vec<ResultRecord>,
    /// Omit uids so Alfred does not reorder rows by its own usage knowledge.
    pub suppress_uids: bool,
    pub max_results: Option<usize>,
}

#[derive(Serialize)]
struct FeedbackDto<'a> {
    items: Vec<&'a ResultRecord>,
}

impl Feedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: ResultRecord) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count_kind(&self, kind: RowKind) -> usize {
        self.items.iter().filter(|item| item.kind == kind).count()
    }

    /// Keeps only rows matching `query`, best match first. An empty query keeps everything.
    pub fn filter(&mut self, query: &str) {
        let items = std::mem::take(&mut self.items);
        self.items = crate::search::filter(items, query);
    }

    pub fn warn_empty(&mut self, title: &str, subtitle: &str) {
        if self.items.is_empty() {
            self.push(ResultRecord::warning(title, subtitle));
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let limit = self.max_results.unwrap_or(usize::MAX);
        if self.suppress_uids {
            let stripped: Vec<ResultRecord> = self
                .items
                .iter()
                .take(limit)
                .cloned()
                .map(|mut item| {
                    item.uid = None;
                    item
                })
                .collect();
            return serde_json::to_string(&FeedbackDto {
                items: stripped.iter().collect(),
            });
        }

        serde_json::to_string(&FeedbackDto {
            items: self.items.iter().take(limit).collect(),
        })
    }
}

/// What a handler hands back to the runtime for printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Feedback(Feedback),
    /// Plain text for Alfred's notification or clipboard step.
    Text(String),
}

impl Outcome {
    pub fn render(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Feedback(feedback) => feedback.to_json(),
            Self::Text(text) => Ok(text.clone()),
        }
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        match self {
            Self::Feedback(feedback) => Some(feedback),
            Self::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Feedback(_) => None,
            Self::Text(text) => Some(text),
        }
    }
}
