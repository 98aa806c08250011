use super::challenge::PendingChallenge;
use super::credential::Credential;
use super::error::AuthError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    // ---
    Regex::new(r"^\w+([.+-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,})+$").expect("email regex is valid")
});

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;
pub const PASSWORD_MIN_LEN: usize = 6;

/// The five roles an account can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    // ---
    Admin,
    Manager,
    Supervisor,
    Support,
    Client,
}

impl Role {
    // ---
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Manager,
        Role::Supervisor,
        Role::Support,
        Role::Client,
    ];

    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Supervisor => "supervisor",
            Role::Support => "support",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    // ---
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| AuthError::InvalidAccount(format!("unknown role '{s}'")))
    }
}

/// Request-side facts recorded on every successful login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    // ---
    pub ip: String,
    pub user_agent: String,
}

impl ClientInfo {
    // ---
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        // ---
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// Where and how the account last signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastLogin {
    // ---
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    /// Browser family parsed from the User-Agent.
    pub device: String,
    pub os: String,
}

impl LastLogin {
    // ---
    /// Builds a login record stamped with the current time.
    pub fn from_client(client: &ClientInfo) -> Self {
        // ---
        let (device, os) = parse_user_agent(&client.user_agent);
        Self {
            timestamp: Utc::now(),
            ip: client.ip.clone(),
            device: device.to_string(),
            os: os.to_string(),
        }
    }
}

/// Coarse browser / OS detection. Order matters: Chrome and Edge user
/// agents also contain "Safari".
fn parse_user_agent(user_agent: &str) -> (&'static str, &'static str) {
    // ---
    let browser = if user_agent.contains("Edg") {
        "Edge"
    } else if user_agent.contains("Chrome") {
        "Chrome"
    } else if user_agent.contains("Firefox") {
        "Firefox"
    } else if user_agent.contains("Safari") {
        "Safari"
    } else {
        "Unknown"
    };

    let os = if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("iPhone") || user_agent.contains("iPad") {
        "iOS"
    } else if user_agent.contains("Mac") {
        "macOS"
    } else if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else {
        "Unknown"
    };

    (browser, os)
}

/// A stored account. The password hash is deliberately not part of this
/// type; it is only reachable through `Repository::get_password_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    // ---
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<LastLogin>,

    /// Registered passkeys in registration order.
    pub passkey_credentials: Vec<Credential>,

    /// At most one outstanding ceremony challenge.
    pub current_challenge: Option<PendingChallenge>,
}

impl Account {
    // ---
    pub fn credential(&self, id: &super::CredentialId) -> Option<&Credential> {
        // ---
        self.passkey_credentials.iter().find(|c| &c.id == id)
    }

    pub fn profile(&self) -> AccountProfile {
        // ---
        AccountProfile {
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
            email_verified: self.email_verified,
            last_login: self.last_login.clone(),
            passkey_count: self.passkey_credentials.len(),
        }
    }
}

/// Client-safe view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    // ---
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub email_verified: bool,
    pub last_login: Option<LastLogin>,
    pub passkey_count: usize,
}

/// Input for creating an account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    // ---
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Role,
    #[serde(default)]
    pub email_verified: bool,
}

impl NewAccount {
    // ---
    /// Trims and normalises the fields, then validates them.
    ///
    /// Email is lower-cased so lookups by email are case-insensitive.
    pub fn normalized(mut self) -> Result<Self, AuthError> {
        // ---
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();

        let len = self.username.chars().count();
        if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
            return Err(AuthError::InvalidAccount(format!(
                "username must be {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} characters"
            )));
        }
        if !EMAIL_RE.is_match(&self.email) {
            return Err(AuthError::InvalidAccount("invalid email address".to_string()));
        }
        if self.password.chars().count() < PASSWORD_MIN_LEN {
            return Err(AuthError::InvalidAccount(format!(
                "password must be at least {PASSWORD_MIN_LEN} characters"
            )));
        }

        Ok(self)
    }

    /// Builds the stored record (without secrets) for a validated input.
    pub fn into_account(self) -> Account {
        // ---
        Account {
            id: Uuid::new_v4(),
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role: self.role,
            email_verified: self.email_verified,
            created_at: Utc::now(),
            last_login: None,
            passkey_credentials: Vec::new(),
            current_challenge: None,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn new_account(username: &str, email: &str, password: &str) -> NewAccount {
        // ---
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            first_name: " Alice ".to_string(),
            last_name: String::new(),
            role: Role::Support,
            email_verified: false,
        }
    }

    #[test]
    fn role_round_trips_through_strings() {
        // ---
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Supervisor).unwrap(), "\"supervisor\"");
    }

    #[test]
    fn normalization_trims_and_lowercases() {
        // ---
        let input = new_account("  alice ", " Alice@Example.COM ", "secret1");
        let normalized = input.normalized().unwrap();
        assert_eq!(normalized.username, "alice");
        assert_eq!(normalized.email, "alice@example.com");
        assert_eq!(normalized.first_name, "Alice");
    }

    #[test]
    fn username_length_is_bounded() {
        // ---
        assert!(new_account("ab", "a@b.io", "secret1").normalized().is_err());
        assert!(new_account(&"x".repeat(31), "a@b.io", "secret1")
            .normalized()
            .is_err());
        assert!(new_account(&"x".repeat(30), "a@b.io", "secret1")
            .normalized()
            .is_ok());
    }

    #[test]
    fn bad_email_and_short_password_rejected() {
        // ---
        let err = new_account("alice", "not-an-email", "secret1")
            .normalized()
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidAccount(_)));

        let err = new_account("alice", "alice@example.com", "12345")
            .normalized()
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidAccount(_)));
    }

    #[test]
    fn user_agent_parsing() {
        // ---
        let chrome_mac = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
        assert_eq!(parse_user_agent(chrome_mac), ("Chrome", "macOS"));

        let firefox_linux = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
        assert_eq!(parse_user_agent(firefox_linux), ("Firefox", "Linux"));

        let safari_ios = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Safari/604.1";
        assert_eq!(parse_user_agent(safari_ios), ("Safari", "iOS"));

        assert_eq!(parse_user_agent("curl/8.0"), ("Unknown", "Unknown"));
    }

    #[test]
    fn last_login_records_client() {
        // ---
        let client = ClientInfo::new("10.0.0.7", "Mozilla/5.0 (Windows NT 10.0) Firefox/121.0");
        let login = LastLogin::from_client(&client);
        assert_eq!(login.ip, "10.0.0.7");
        assert_eq!(login.device, "Firefox");
        assert_eq!(login.os, "Windows");
    }
}
