//! Account management client methods

use super::{ApiClient, ApiRequest, ClientError};
use crate::types::{ChangePasswordRequest, DeleteAccountRequest, MeResponse, StatusResponse};

impl ApiClient {
    /// Fetch the signed-in user's profile through the refresh interceptor
    pub async fn get_me(&self) -> Result<MeResponse, ClientError> {
        self.execute(&ApiRequest::get("/auth/me")).await
    }

    /// Change the account password
    ///
    /// A refusal sent as a `{success: false, error}` envelope comes back as
    /// `Ok` with `success == false`, whatever its status code.
    pub async fn change_password(
        &self,
        current_password: impl Into<String>,
        new_password: impl Into<String>,
    ) -> Result<StatusResponse, ClientError> {
        let request = ApiRequest::post("/auth/change-password").json(&ChangePasswordRequest {
            current_password: current_password.into(),
            new_password: new_password.into(),
        })?;
        rejection_as_status(self.execute(&request).await)
    }

    /// Permanently delete the account. The caller is expected to log out
    /// afterwards.
    pub async fn delete_account(
        &self,
        password: impl Into<String>,
    ) -> Result<StatusResponse, ClientError> {
        let request = ApiRequest::delete("/auth/delete-account").json(&DeleteAccountRequest {
            password: password.into(),
        })?;
        rejection_as_status(self.execute(&request).await)
    }
}

/// Turn an error status carrying a rejection envelope back into the
/// envelope. 401s stay errors; they belong to the interceptor.
fn rejection_as_status(
    result: Result<StatusResponse, ClientError>,
) -> Result<StatusResponse, ClientError> {
    let body = match &result {
        Err(
            ClientError::BadRequest(body)
            | ClientError::Forbidden(body)
            | ClientError::NotFound(body)
            | ClientError::ServerError { message: body, .. },
        ) => body,
        _ => return result,
    };

    match serde_json::from_str::<StatusResponse>(body) {
        Ok(envelope) if !envelope.success => Ok(envelope),
        _ => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_envelope_becomes_status() {
        let result = rejection_as_status(Err(ClientError::BadRequest(
            r#"{"success": false, "error": "Wrong current password"}"#.into(),
        )));
        let status = result.unwrap();
        assert!(!status.success);
        assert_eq!(status.error.as_deref(), Some("Wrong current password"));
    }

    #[test]
    fn test_plain_error_body_stays_an_error() {
        let result = rejection_as_status(Err(ClientError::ServerError {
            status: 502,
            message: "<html>bad gateway</html>".into(),
        }));
        assert!(matches!(result, Err(ClientError::ServerError { status: 502, .. })));

        let result = rejection_as_status(Err(ClientError::AuthenticationFailed(
            r#"{"success": false}"#.into(),
        )));
        assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
    }
}
