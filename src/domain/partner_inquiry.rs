use serde::Serialize;

use super::escape_html;
use super::SubscriberEmail;
use super::SubscriberName;
use super::ValidationError;

/// Which partnership track an inquiry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerKind {
    Clinic,
    Research,
    Investor,
}

/// The partner contact form exactly as the user filled it in. Kept around
/// unparsed so that a failed submission can be corrected and retried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartnerForm {
    pub name: String,
    pub email: String,
    pub organization: String,
    pub message: String,
    pub kind: Option<PartnerKind>,
}

/// A validated partner inquiry, serialized as the body of
/// `POST /api/partner/contact`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartnerInquiry {
    #[serde(serialize_with = "as_str")]
    pub name: SubscriberName,
    #[serde(serialize_with = "as_str")]
    pub email: SubscriberEmail,
    pub organization: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: PartnerKind,
}

fn as_str<S, T>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: AsRef<str>,
{
    serializer.serialize_str(value.as_ref())
}

impl TryFrom<&PartnerForm> for PartnerInquiry {
    type Error = ValidationError;
    fn try_from(form: &PartnerForm) -> Result<Self, Self::Error> {
        let name = SubscriberName::parse(&form.name)?;
        let email = SubscriberEmail::parse(&form.email)?;
        let kind = form.kind.ok_or(ValidationError::MissingPartnerKind)?;
        let organization = form.organization.trim();
        if organization.is_empty() {
            return Err(ValidationError::EmptyOrganization);
        }
        let message = form.message.trim();
        if message.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        Ok(Self {
            name,
            email,
            organization: escape_html(organization),
            message: escape_html(message),
            kind,
        })
    }
}
