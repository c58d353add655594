use std::sync::Arc;

use assistant_provider::AssistantBackend;
use assistant_provider_api::ApiBackend;
use assistant_provider_mock::MockBackend;

use crate::config::BackendKind;
use crate::credentials::Credentials;
use crate::error::StartupError;

/// Assistant id used by the mock backend when none is configured.
pub const MOCK_ASSISTANT_ID: &str = "asst_mock";

/// Builds the backend for `kind`; the API backend needs resolved credentials.
pub fn backend_for(
    kind: BackendKind,
    credentials: Option<&Credentials>,
) -> Result<Arc<dyn AssistantBackend>, StartupError> {
    match kind {
        BackendKind::Mock => Ok(Arc::new(MockBackend::new())),
        BackendKind::Api => {
            let credentials = credentials.ok_or_else(|| {
                StartupError::authentication("the api backend needs resolved credentials")
            })?;
            Ok(Arc::new(ApiBackend::new(credentials.api.clone())?))
        }
    }
}
