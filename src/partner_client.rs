use std::sync::Arc;

use crate::configuration::BackendSettings;
use crate::domain::PartnerForm;
use crate::domain::PartnerInquiry;
use crate::submission::accept;
use crate::submission::Submission;
use crate::submission::SubmissionError;
use crate::submission::SubmissionState;
use crate::transport::with_timeout;
use crate::transport::HttpTransport;

/// Posts partnership inquiries to `/api/partner/contact`, through the same
/// single-flight state machine as waitlist signups.
pub struct PartnerClient {
    transport: Arc<dyn HttpTransport>,
    backend: BackendSettings,
    inquiry: Submission<PartnerForm>,
}

impl PartnerClient {
    pub fn new(
        backend: BackendSettings,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            backend,
            inquiry: Submission::new(),
        }
    }

    pub fn form(&self) -> PartnerForm { self.inquiry.input() }

    pub fn edit_form(
        &self,
        form: PartnerForm,
    ) {
        self.inquiry.edit(form);
    }

    pub fn state(&self) -> SubmissionState { self.inquiry.state() }

    pub fn is_submitting(&self) -> bool { self.inquiry.is_in_flight() }

    /// Validate and send `form`. Resolves to the backend's message (if any)
    /// only when the backend explicitly confirmed the inquiry; the form is
    /// then cleared. Otherwise the form is kept as typed.
    #[tracing::instrument(
        name = "Sending partner inquiry",
        skip(self, form),
        fields(partner_kind = ?form.kind)
    )]
    pub async fn submit(
        &self,
        form: PartnerForm,
    ) -> Result<Option<String>, SubmissionError> {
        let result = self
            .inquiry
            .run(form, |form| async move {
                let inquiry = PartnerInquiry::try_from(&form)?;
                let body = serde_json::to_value(&inquiry)
                    .map_err(|e| SubmissionError::Network(e.into()))?;
                let url = self.backend.endpoint("/api/partner/contact");
                let response = with_timeout(
                    self.backend.submit_timeout(),
                    self.transport.post_json(&url, &body),
                )
                .await;
                Ok(accept(response)?.message)
            })
            .await;

        if let Err(e) = &result {
            tracing::warn!(
                e.cause_chain=?e,
                "partner inquiry not accepted"
            );
        }
        result
    }
}
