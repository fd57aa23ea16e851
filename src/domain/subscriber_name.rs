use unicode_segmentation::UnicodeSegmentation;

use super::escape_html;
use super::ValidationError;

const MIN_NAME_GRAPHEMES: usize = 2;
const MAX_NAME_GRAPHEMES: usize = 100;

/// A person's name as typed into a contact form, trimmed and HTML-escaped.
/// Length is bounded in graphemes (2..=100) on the trimmed input, before
/// escaping, matching what the backend enforces.
///
/// Must be instantiated with `SubscriberName::parse`. The field is left
/// private, to prevent bypassing of `parse`, and mutation of the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberName(String);

impl SubscriberName {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let len = trimmed.graphemes(true).count();
        match (MIN_NAME_GRAPHEMES..=MAX_NAME_GRAPHEMES).contains(&len) {
            true => Ok(Self(escape_html(trimmed))),
            false => Err(ValidationError::InvalidName(raw.to_string())),
        }
    }
}

impl AsRef<str> for SubscriberName {
    fn as_ref(&self) -> &str { &self.0 }
}
