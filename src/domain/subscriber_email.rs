use std::fmt::Display;

use super::escape_html;
use super::ValidationError;

/// RFC 5321 upper bound on the length of a forward path.
pub const MAX_EMAIL_LENGTH: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq)]
/// The sanitized form of a user-typed email address: trimmed, lower-cased and
/// HTML-escaped. This is the only representation that goes over the wire.
///
/// Must be instantiated with `SubscriberEmail::parse`; the raw input is never
/// stored here, the caller keeps it for correction.
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let sanitized = escape_html(&raw.trim().to_lowercase());
        let too_long = sanitized.chars().count() > MAX_EMAIL_LENGTH;
        match !too_long && has_email_shape(&sanitized) {
            true => Ok(Self(sanitized)),
            false => Err(ValidationError::InvalidFormat(raw.to_string())),
        }
    }
}

/// Conservative `local@domain.tld` check: no whitespace anywhere, exactly one
/// `@` with something on both sides, and a `.` inside the domain that is
/// neither its first nor its last character.
fn has_email_shape(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    // a dot at char index 1..=len-2
    let chars: Vec<char> = domain.chars().collect();
    chars.len() >= 3 && chars[1..chars.len() - 1].contains(&'.')
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str { &self.0 }
}

impl Display for SubscriberEmail {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
