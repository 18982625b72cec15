use conductor_supervisor::{ServiceDescriptor, ServiceStatus};
use serde::Serialize;

/// One service's status as emitted by `status --output json`.
#[derive(Debug, Serialize)]
pub(crate) struct StatusEntry<'a> {
    pub(crate) service: &'a str,
    pub(crate) access_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) status: Option<&'a ServiceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl<'a> StatusEntry<'a> {
    pub(crate) fn new(
        service: &'a ServiceDescriptor,
        result: Result<&'a ServiceStatus, String>,
    ) -> Self {
        let (status, error) = match result {
            Ok(status) => (Some(status), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            service: service.name(),
            access_url: service.access_url(),
            status,
            error,
        }
    }
}
