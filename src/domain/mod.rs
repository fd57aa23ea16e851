mod partner_inquiry;
mod sanitize;
mod subscriber_email;
mod subscriber_name;
// allow external `use` statements to skip `subscriber_email` etc
pub use partner_inquiry::PartnerForm;
pub use partner_inquiry::PartnerInquiry;
pub use partner_inquiry::PartnerKind;
pub use sanitize::escape_html;
pub use subscriber_email::SubscriberEmail;
pub use subscriber_email::MAX_EMAIL_LENGTH;
pub use subscriber_name::SubscriberName;

/// Everything that can be wrong with user input before it is allowed near the
/// network.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid email: {0:?}")]
    InvalidFormat(String),
    #[error("Invalid name: {0:?}")]
    InvalidName(String),
    #[error("Organization must not be empty")]
    EmptyOrganization,
    #[error("Message must not be empty")]
    EmptyMessage,
    #[error("No partnership type selected")]
    MissingPartnerKind,
}
