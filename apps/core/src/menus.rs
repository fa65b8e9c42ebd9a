use crate::config::Config;
use crate::contract::{Feedback, Icon, ResultRecord, RowKind};
use crate::settings::{sfa_method_name, SFA_METHODS};

pub const ISSUE_TRACKER_URL: &str = "https://github.com/blacs30/bitwarden-alfred-workflow/issues";
pub const HELP_FILE: &str = "README.html";

pub const AUTHCONFIG_SFA_METHOD: &str = "Use";
pub const AUTHCONFIG_SFA_TOGGLE: &str = "on-off-sfa";
pub const AUTHCONFIG_APIKEY_TOGGLE: &str = "on-off-apikey";

fn action_row(title: &str, action: &str) -> ResultRecord {
    ResultRecord::new(title)
        .valid(true)
        .var("action", action)
        .kind(RowKind::Action)
}

pub fn sync_action_row(title: &str) -> ResultRecord {
    action_row(title, "--sync")
        .subtitle("Sync Bitwarden secrets with server.")
        .uid("sync")
        .icon(Icon::Reload)
        .var("action2", "--force")
        .var("notification", "Syncing Bitwarden secrets")
        .arg("--background")
}

pub fn icons_action_row(title: &str) -> ResultRecord {
    action_row(title, "--icons")
        .subtitle("Downloads favicons for URLs")
        .uid("icons")
        .icon(Icon::Reload)
        .var("notification", "Downloading Favicons for URLs")
        .arg("--background")
}

pub fn login_row(cfg: &Config) -> ResultRecord {
    let mode = cfg.effective_sfa_mode();
    action_row("Login to Bitwarden", "--login")
        .subtitle("↩ or ⇥ to login now")
        .uid("login")
        .icon(Icon::On)
        .var("type", "login")
        .var("email", cfg.email.as_str())
        .var("sfamode", mode.to_string())
        .var("mapsfamode", sfa_method_name(mode))
}

pub fn unlock_row(cfg: &Config) -> ResultRecord {
    action_row("Unlock", "--unlock")
        .subtitle("Unlock Bitwarden")
        .uid("unlock")
        .icon(Icon::On)
        .var("type", "unlock")
        .var("email", cfg.email.as_str())
}

fn setconfig_row(title: &str, key: &str, query: &str) -> ResultRecord {
    action_row(title, "--setconfigs")
        .uid(key)
        .var("action2", key)
        .arg(query)
}

fn authconfig_row(title: &str, uid: &str, menu: &str) -> ResultRecord {
    action_row(title, "--authconfig")
        .uid(uid)
        .icon(Icon::UserClock)
        .var("action2", format!("--id {menu}"))
}

/// Filters menu rows by the first query word; the full query is the value
/// handed on to `--setconfigs`.
fn filter_menu(feedback: &mut Feedback, query: &str) {
    if let Some(term) = query.split_whitespace().next() {
        feedback.filter(term);
    }
}

pub fn config_menu(cfg: &Config, query: &str) -> Feedback {
    let mut feedback = Feedback::new();
    feedback.suppress_uids = query.is_empty() || cfg.reordering_disabled;

    feedback.push(
        setconfig_row("Enter your Bitwarden Email", "email", query)
            .subtitle("Configure your Bitwarden login email")
            .icon(Icon::Email)
            .var("notification", format!("Set Email to: \n{query}"))
            .var("title", "Set Email")
            .var(
                "subtitle",
                format!(
                    "Currently set to: {:?} (remove \"email\" from the beginning if exist)",
                    cfg.email
                ),
            ),
    );
    feedback.push(
        setconfig_row("Set Server URL", "server", query)
            .subtitle("Configure your Bitwarden Server URL (Only for selfhosted Bitwarden needed)")
            .icon(Icon::Server)
            .var("notification", format!("Set Server to: \n{query}"))
            .var("title", "Set Server")
            .var("subtitle", format!("Currently set to: {:?}", cfg.server)),
    );
    feedback.push(
        setconfig_row("Set WebUI URL", "webui", query)
            .subtitle("Configure your Bitwarden WebUI URL (Only for selfhosted Bitwarden needed)")
            .icon(Icon::Bitwarden)
            .var("notification", format!("Set WebUI URL to: \n{query}"))
            .var("title", "Set WebUI URL")
            .var("subtitle", format!("Currently set to: {:?}", cfg.webui)),
    );
    feedback.push(
        authconfig_row("Enable or disable 2FA", "sfa", AUTHCONFIG_SFA_TOGGLE)
            .subtitle("Configure Bitwarden to use or not use 2 Factor Authentication"),
    );
    feedback.push(
        authconfig_row(
            "Enable or disable API Key login",
            "apikeyauth",
            AUTHCONFIG_APIKEY_TOGGLE,
        )
        .subtitle("Configure Bitwarden to use API keys to login"),
    );
    feedback.push(
        authconfig_row("Set the 2FA method", "sfamode", AUTHCONFIG_SFA_METHOD)
            .subtitle("Configure which 2 Factor Authentication Method you use"),
    );
    feedback.push(
        action_row("View Help File", "--open")
            .subtitle("Open workflow help in your browser")
            .uid("help")
            .icon(Icon::Help)
            .arg(HELP_FILE),
    );
    feedback.push(
        action_row("Report Issue", "--open")
            .subtitle("Open workflow issue tracker in your browser")
            .uid("issue")
            .icon(Icon::Issue)
            .arg(ISSUE_TRACKER_URL),
    );
    feedback.push(sync_action_row("Sync Bitwarden Secrets"));
    feedback.push(icons_action_row("Download/Update Favicon for URLs"));
    feedback.push(
        action_row("Get date of last Bitwarden secret sync", "--sync")
            .subtitle("Show the date when the last sync happened with the Bitwarden server.")
            .uid("lastsync")
            .icon(Icon::Calendar)
            .var("notification", "Getting last sync date.")
            .arg("--last"),
    );

    filter_menu(&mut feedback, query);
    feedback.warn_empty("No Config Found", "Try a different query?");
    feedback
}

pub fn auth_menu(cfg: &Config, query: &str) -> Feedback {
    let mut feedback = Feedback::new();
    feedback.suppress_uids = query.is_empty();

    feedback.push(login_row(cfg));
    feedback.push(
        action_row("Logout", "--logout")
            .subtitle("Logout from Bitwarden")
            .uid("logout")
            .icon(Icon::Off),
    );
    feedback.push(unlock_row(cfg));
    feedback.push(
        action_row("Lock", "--lock")
            .subtitle("Lock Bitwarden")
            .uid("lock")
            .icon(Icon::Off),
    );

    filter_menu(&mut feedback, query);
    feedback.warn_empty("No Auth Config Found", "Try a different query?");
    feedback
}

/// Sub-menus reached from the config menu. An unknown `menu` id yields no rows.
pub fn authconfig_menu(cfg: &Config, menu: &str, query: &str) -> Feedback {
    let mut feedback = Feedback::new();

    match menu {
        AUTHCONFIG_SFA_METHOD => {
            let current = format!("Currently set to: {:?}", sfa_method_name(cfg.sfa_mode));
            for (mode, name) in SFA_METHODS {
                let (title, uid, icon) = match mode {
                    0 => ("Use Authenticator app", "totp", Icon::App),
                    1 => ("Use Email", "email", Icon::Email),
                    _ => ("Use Yubikey OTP", "yubikey", Icon::Yubikey),
                };
                feedback.push(
                    setconfig_row(title, "2famode", &mode.to_string())
                        .uid(uid)
                        .subtitle(current.as_str())
                        .icon(icon)
                        .var("notification", format!("2FA set to {name}")),
                );
            }
        }
        AUTHCONFIG_SFA_TOGGLE => {
            push_toggle(&mut feedback, "2FA", "2fa", "sfa", cfg.sfa);
        }
        AUTHCONFIG_APIKEY_TOGGLE => {
            push_toggle(&mut feedback, "APIKEY login", "apikey", "apikey", cfg.use_apikey);
        }
        other => crate::logging::warn(&format!("unknown authconfig menu '{other}'")),
    }

    filter_menu(&mut feedback, query);
    feedback
}

fn push_toggle(feedback: &mut Feedback, label: &str, key: &str, uid: &str, current: bool) {
    let subtitle = format!("Currently set to: {current}");
    feedback.push(
        setconfig_row(&format!("ON/OFF: Enable {label} for Bitwarden"), key, "true")
            .uid(format!("{uid}on"))
            .subtitle(subtitle.as_str())
            .icon(Icon::On)
            .var("notification", format!("Enabled {label}")),
    );
    feedback.push(
        setconfig_row(&format!("ON/OFF: Disable {label} for Bitwarden"), key, "false")
            .uid(format!("{uid}off"))
            .subtitle(subtitle)
            .icon(Icon::Off)
            .var("notification", format!("Disabled {label}")),
    );
}
