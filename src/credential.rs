//! Mailbox credentials and extraction quotas.
//!
//! A [`Credential`] is what the vendor hands out: an address, its password, an
//! OAuth2 refresh token and the client id the token was issued to. Secrets are
//! stored as [`SecretString`] and never appear in `Debug` output.
//!
//! ```
//! use mailbox_otp::Credential;
//!
//! let credential = Credential::parse_line("user@outlook.com----pw----M.R3_token----client-id")
//!     .expect("well-formed record");
//! assert_eq!(credential.email(), "user@outlook.com");
//! assert_eq!(credential.client_id(), "client-id");
//! ```

use crate::error::{Error, Result};
use email_address::EmailAddress;
use secrecy::{ExposeSecret, SecretString};
use std::str::FromStr;

/// Field separator used by vendor records.
pub const RECORD_DELIMITER: &str = "----";

/// Smallest quantity accepted by a single extraction.
pub const MIN_QUOTA: u32 = 1;
/// Largest quantity accepted by a single extraction.
pub const MAX_QUOTA: u32 = 2000;

/// A refresh token and the OAuth2 client it was issued to.
///
/// This is all the mail resource needs to read a mailbox.
#[derive(Clone)]
pub struct RefreshGrant {
    refresh_token: SecretString,
    client_id: String,
}

impl RefreshGrant {
    /// Creates a grant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingParameter`] if either value is empty.
    pub fn new(refresh_token: impl Into<String>, client_id: impl Into<String>) -> Result<Self> {
        let refresh_token = required("refreshToken", refresh_token.into())?;
        let client_id = required("clientId", client_id.into())?;

        Ok(Self {
            refresh_token: SecretString::from(refresh_token),
            client_id,
        })
    }

    /// Returns the OAuth2 refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        self.refresh_token.expose_secret()
    }

    /// Returns the OAuth2 client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl std::fmt::Debug for RefreshGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshGrant")
            .field("refresh_token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Credentials for one disposable mailbox.
#[derive(Clone)]
pub struct Credential {
    email: EmailAddress,
    password: SecretString,
    grant: RefreshGrant,
}

impl Credential {
    /// Creates a credential from manually entered values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingParameter`] if any field is empty, or
    /// [`Error::InvalidEmailFormat`] if the address does not parse.
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        refresh_token: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Self> {
        let email = required("email", email.into())?;
        let password = required("password", password.into())?;
        let grant = RefreshGrant::new(refresh_token, client_id)?;

        Ok(Self {
            email: validate_email(&email)?,
            password: SecretString::from(password),
            grant,
        })
    }

    /// Parses one `email----password----refreshToken----clientId` vendor record.
    ///
    /// Returns `None` for malformed lines: no delimiter, fewer than four
    /// non-empty fields, or an invalid address. Fields past the fourth are ignored.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.contains(RECORD_DELIMITER) {
            return None;
        }

        let mut fields = line.split(RECORD_DELIMITER).map(str::trim);
        let email = fields.next()?;
        let password = fields.next()?;
        let refresh_token = fields.next()?;
        let client_id = fields.next()?;

        Self::new(email, password, refresh_token, client_id).ok()
    }

    /// Returns the mailbox address.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns the mailbox password.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns the OAuth2 refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        self.grant.refresh_token()
    }

    /// Returns the OAuth2 client id the refresh token belongs to.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.grant.client_id()
    }

    /// Returns the refresh grant used to read this mailbox.
    #[must_use]
    pub fn grant(&self) -> &RefreshGrant {
        &self.grant
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email.as_str())
            .field("password", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("client_id", &self.grant.client_id)
            .finish()
    }
}

fn required(name: &'static str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::MissingParameter { name });
    }
    Ok(trimmed.to_string())
}

fn validate_email(email: &str) -> Result<EmailAddress> {
    EmailAddress::parse_with_options(email, email_address::Options::default()).map_err(|_| {
        Error::InvalidEmailFormat {
            email: email.to_string(),
        }
    })
}

/// Mailbox flavour requested from the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EmailType {
    /// `outlook.com` mailboxes.
    #[default]
    Outlook,
    /// `hotmail.com` mailboxes.
    Hotmail,
}

impl EmailType {
    /// Returns the vendor's name for this mailbox type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EmailType::Outlook => "outlook",
            EmailType::Hotmail => "hotmail",
        }
    }
}

impl std::fmt::Display for EmailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outlook" => Ok(EmailType::Outlook),
            "hotmail" => Ok(EmailType::Hotmail),
            other => Err(Error::InvalidConfig {
                message: format!("unknown email type '{other}'"),
            }),
        }
    }
}

/// How many credentials of which type to pull from the vendor, and with which key.
#[derive(Clone)]
pub struct ExtractionQuota {
    count: u32,
    email_type: EmailType,
    api_key: SecretString,
}

impl ExtractionQuota {
    /// Creates a validated quota.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuota`] if `count` is outside
    /// [`MIN_QUOTA`]`..=`[`MAX_QUOTA`], or [`Error::MissingParameter`] if the
    /// API key is empty.
    pub fn new(count: u32, email_type: EmailType, api_key: impl Into<String>) -> Result<Self> {
        if !(MIN_QUOTA..=MAX_QUOTA).contains(&count) {
            return Err(Error::InvalidQuota {
                requested: count,
                min: MIN_QUOTA,
                max: MAX_QUOTA,
            });
        }

        let api_key = required("apiKey", api_key.into())?;

        Ok(Self {
            count,
            email_type,
            api_key: SecretString::from(api_key),
        })
    }

    /// Number of credentials requested.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Mailbox type requested.
    #[must_use]
    pub fn email_type(&self) -> EmailType {
        self.email_type
    }

    /// Vendor API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

impl std::fmt::Debug for ExtractionQuota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionQuota")
            .field("count", &self.count)
            .field("email_type", &self.email_type)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
