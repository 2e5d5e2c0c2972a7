use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::rules::CheckFailure;

/// Asks a remote authority whether a value (email, username, ...) is already in use.
pub trait ExistenceCheck: Send + Sync + 'static {
    fn exists(&self, value: String) -> BoxFuture<'static, Result<bool, CheckFailure>>;
}

impl<F, Fut> ExistenceCheck for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, CheckFailure>> + Send + 'static,
{
    fn exists(&self, value: String) -> BoxFuture<'static, Result<bool, CheckFailure>> {
        Box::pin((self)(value))
    }
}

/// Minimal JSON POST seam; the host application supplies the HTTP client.
pub trait JsonTransport: Send + Sync + 'static {
    fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> BoxFuture<'static, Result<serde_json::Value, CheckFailure>>;
}

pub const CHECK_EMAIL_PATH: &str = "/api/check-email";
pub const CHECK_USERNAME_PATH: &str = "/api/check-username";

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
enum CheckRequest {
    Email { email: String },
    Username { username: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CheckKind {
    Email,
    Username,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

/// [`ExistenceCheck`] backed by one of the `check-*` endpoints.
pub struct CheckEndpoint<T> {
    transport: Arc<T>,
    kind: CheckKind,
}

impl<T> Clone for CheckEndpoint<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            kind: self.kind,
        }
    }
}

impl<T> CheckEndpoint<T>
where
    T: JsonTransport,
{
    pub fn email(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            kind: CheckKind::Email,
        }
    }

    pub fn username(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            kind: CheckKind::Username,
        }
    }

    pub fn path(&self) -> &'static str {
        match self.kind {
            CheckKind::Email => CHECK_EMAIL_PATH,
            CheckKind::Username => CHECK_USERNAME_PATH,
        }
    }

    fn request(&self, value: String) -> CheckRequest {
        match self.kind {
            CheckKind::Email => CheckRequest::Email { email: value },
            CheckKind::Username => CheckRequest::Username { username: value },
        }
    }
}

impl<T> ExistenceCheck for CheckEndpoint<T>
where
    T: JsonTransport,
{
    fn exists(&self, value: String) -> BoxFuture<'static, Result<bool, CheckFailure>> {
        let body = match serde_json::to_value(self.request(value)) {
            Ok(body) => body,
            Err(error) => {
                let failure = CheckFailure::new(format!("failed to encode check request: {error}"));
                return Box::pin(async move { Err(failure) });
            }
        };
        let response = self.transport.post(self.path(), body);
        Box::pin(async move {
            let response = response.await?;
            let decoded = serde_json::from_value::<ExistsResponse>(response).map_err(|error| {
                CheckFailure::new(format!("malformed existence response: {error}"))
            })?;
            Ok(decoded.exists)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        requests: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
        response: serde_json::Value,
    }

    impl JsonTransport for RecordingTransport {
        fn post(
            &self,
            path: &str,
            body: serde_json::Value,
        ) -> BoxFuture<'static, Result<serde_json::Value, CheckFailure>> {
            self.requests
                .lock()
                .expect("requests lock")
                .push((path.to_string(), body));
            let response = self.response.clone();
            Box::pin(async move { Ok(response) })
        }
    }

    #[test]
    fn email_endpoint_posts_email_body() {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let endpoint = CheckEndpoint::email(RecordingTransport {
            requests: requests.clone(),
            response: serde_json::json!({ "exists": true }),
        });

        let exists = block_on(endpoint.exists("sensei@dojo.ru".to_string())).expect("check");
        assert!(exists);
        assert_eq!(
            requests.lock().expect("requests lock").as_slice(),
            &[(
                "/api/check-email".to_string(),
                serde_json::json!({ "email": "sensei@dojo.ru" })
            )]
        );
    }

    #[test]
    fn username_endpoint_rejects_malformed_response() {
        let endpoint = CheckEndpoint::username(RecordingTransport {
            response: serde_json::json!({ "taken": "maybe" }),
            ..RecordingTransport::default()
        });
        assert_eq!(endpoint.path(), CHECK_USERNAME_PATH);
        let error = block_on(endpoint.exists("sensei".to_string())).expect_err("malformed");
        assert!(error.reason().starts_with("malformed existence response"));
    }
}
