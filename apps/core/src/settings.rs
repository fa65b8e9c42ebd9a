use crate::config::{Config, DEFAULT_SERVER_URL, DEFAULT_WEBUI_URL};

/// Two-factor providers offered in the auth menu, keyed by the id `bw login --method` expects.
pub const SFA_METHODS: [(i32, &str); 3] = [(0, "Authenticator app"), (1, "Email"), (3, "Yubikey")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    Email,
    Server,
    WebUi,
    Sfa,
    SfaMode,
    ApiKey,
}

impl SettingKey {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "email" => Some(Self::Email),
            "server" => Some(Self::Server),
            "webui" => Some(Self::WebUi),
            "2fa" => Some(Self::Sfa),
            "2famode" => Some(Self::SfaMode),
            "apikey" => Some(Self::ApiKey),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Server => "server",
            Self::WebUi => "webui",
            Self::Sfa => "2fa",
            Self::SfaMode => "2famode",
            Self::ApiKey => "apikey",
        }
    }
}

pub fn sfa_method_name(mode: i32) -> &'static str {
    SFA_METHODS
        .iter()
        .find(|(id, _)| *id == mode)
        .map(|(_, name)| *name)
        .unwrap_or("Disabled")
}

pub fn validate_max_results(value: u16) -> Result<(), String> {
    if (5..=1000).contains(&value) {
        Ok(())
    } else {
        Err("Max results must be between 5 and 1000.".to_string())
    }
}

pub fn validate_url(input: &str) -> Result<String, String> {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.chars().any(char::is_whitespace) {
        return Err(format!("URL must not contain spaces: '{trimmed}'"));
    }
    let lower = trimmed.to_ascii_lowercase();
    let host = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .ok_or_else(|| format!("URL must start with http:// or https://: '{trimmed}'"))?;
    if host.is_empty() {
        return Err("URL host is required.".to_string());
    }
    Ok(trimmed.to_string())
}

pub fn parse_bool(input: &str) -> Result<bool, String> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Ok(true),
        "false" | "off" | "0" | "no" => Ok(false),
        other => Err(format!("Expected true or false, got '{other}'.")),
    }
}

pub fn parse_sfa_mode(input: &str) -> Result<i32, String> {
    let mode: i32 = input
        .trim()
        .parse()
        .map_err(|_| format!("2FA mode must be a number, got '{}'.", input.trim()))?;
    if SFA_METHODS.iter().any(|(id, _)| *id == mode) {
        Ok(mode)
    } else {
        Err(format!("Unsupported 2FA mode {mode}."))
    }
}

/// Config menu rows hand on the whole query, so a value may still start
/// with the word that selected the row ("server https://...").
fn without_key_word(value: &str, key: SettingKey) -> &str {
    match value.split_once(char::is_whitespace) {
        Some((first, rest)) if first.eq_ignore_ascii_case(key.as_str()) => rest.trim_start(),
        None if value.eq_ignore_ascii_case(key.as_str()) => "",
        _ => value,
    }
}

/// Turns the raw value typed into Alfred into the value that gets stored.
/// Empty server and web UI values fall back to the hosted Bitwarden URLs.
pub fn normalize_value(key: SettingKey, raw: &str) -> Result<String, String> {
    let value = without_key_word(raw.trim(), key);
    match key {
        SettingKey::Email => {
            if value.is_empty() || !value.contains('@') {
                return Err(format!("Not a valid email address: '{value}'"));
            }
            Ok(value.to_string())
        }
        SettingKey::Server if value.is_empty() => Ok(DEFAULT_SERVER_URL.to_string()),
        SettingKey::WebUi if value.is_empty() => Ok(DEFAULT_WEBUI_URL.to_string()),
        SettingKey::Server | SettingKey::WebUi => validate_url(value),
        SettingKey::Sfa | SettingKey::ApiKey => parse_bool(value).map(|flag| flag.to_string()),
        SettingKey::SfaMode => parse_sfa_mode(value).map(|mode| mode.to_string()),
    }
}

/// Writes an already normalized value into `cfg`.
pub fn apply(cfg: &mut Config, key: SettingKey, value: &str) -> Result<(), String> {
    match key {
        SettingKey::Email => cfg.email = value.to_string(),
        SettingKey::Server => cfg.server = value.to_string(),
        SettingKey::WebUi => cfg.webui = value.to_string(),
        SettingKey::Sfa => cfg.sfa = parse_bool(value)?,
        SettingKey::SfaMode => cfg.sfa_mode = parse_sfa_mode(value)?,
        SettingKey::ApiKey => cfg.use_apikey = parse_bool(value)?,
    }
    Ok(())
}
