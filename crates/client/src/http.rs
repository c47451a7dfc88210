//! Typed calls against the record API.

use std::time::Duration;

use db::{ListQuery, Page, WorkflowRow};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::{ClientError, ClientResult};

/// Request timeout applied to every call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Container format of an archived certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArchiveFormat {
    Pem,
    Pfx,
    Jks,
}

#[derive(Serialize)]
struct ArchiveRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<ArchiveFormat>,
}

/// Error body the record API answers with.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    errors: Option<Value>,
}

/// Client for one certdeck backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base: Url,
}

impl BackendClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:8090`.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Self::with_client(http, base_url).map_err(ClientError::from)
    }

    /// Use a preconfigured `reqwest` client.
    pub fn with_client(http: Client, base_url: &str) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base.join(path)?)
    }

    fn workflow_url(&self, id: Uuid) -> ClientResult<Url> {
        self.endpoint(&format!("api/workflows/{id}"))
    }

    /// One page of workflows.
    ///
    /// Cancelling `cancel` drops the in-flight request and yields
    /// [`ClientError::Cancelled`].
    pub async fn list_workflows(
        &self,
        query: &ListQuery,
        cancel: &CancellationToken,
    ) -> ClientResult<Page<WorkflowRow>> {
        let request = self.http.get(self.endpoint("api/workflows")?).query(query);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("workflow listing cancelled");
                Err(ClientError::Cancelled)
            }
            result = send_json(request) => result,
        }
    }

    pub async fn get_workflow(&self, id: Uuid) -> ClientResult<WorkflowRow> {
        send_json(self.http.get(self.workflow_url(id)?)).await
    }

    /// Merge-patch a workflow and return the stored record.
    ///
    /// `Ok(None)` means the record changed or vanished since it was read and
    /// nothing was written.
    pub async fn save_workflow(&self, id: Uuid, patch: &Value) -> ClientResult<Option<WorkflowRow>> {
        let response = self.http.patch(self.workflow_url(id)?).json(patch).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%id, "workflow is gone");
            return Ok(None);
        }
        if response.status() == StatusCode::CONFLICT {
            let (message, errors) = error_body(response).await;
            // A refused enable carries its report; a stale write carries nothing.
            if errors.is_none() {
                debug!(%id, %message, "workflow changed since it was read");
                return Ok(None);
            }
            return Err(ClientError::Status { status: StatusCode::CONFLICT.as_u16(), message });
        }
        Ok(Some(decode(response).await?))
    }

    /// Delete a workflow. `false` when it was already gone.
    pub async fn delete_workflow(&self, id: Uuid) -> ClientResult<bool> {
        let response = self.http.delete(self.workflow_url(id)?).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(ClientError::Status { status: status.as_u16(), message: error_message(response).await }),
        }
    }

    /// Ask the server to package a certificate for download.
    ///
    /// The answer is an envelope `{code, ...}`; a non-zero `code` or a non-2xx
    /// status is an error carrying the whole body.
    pub async fn archive_certificate(&self, id: &str, format: Option<ArchiveFormat>) -> ClientResult<Value> {
        let mut url = self.endpoint("api/certificates/")?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend([id, "archive"]);

        let response = self.http.post(url).json(&ArchiveRequest { format }).send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        let code = body.get("code").and_then(Value::as_i64);

        match (status.is_success(), code) {
            (true, Some(0)) => Ok(body),
            (true, None) => Err(ClientError::Response { status: status.as_u16(), code: -1, body }),
            (_, code) => {
                let code = code.unwrap_or(i64::from(status.as_u16()));
                warn!(%id, status = status.as_u16(), code, "certificate archive rejected");
                Err(ClientError::Response { status: status.as_u16(), code, body })
            }
        }
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> ClientResult<T> {
    decode(request.send().await?).await
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status { status: status.as_u16(), message: error_message(response).await });
    }
    Ok(response.json().await?)
}

/// The `message` and `errors` of an API error body, or the raw text.
async fn error_body(response: Response) -> (String, Option<Value>) {
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.message, body.errors),
        Err(_) => (text, None),
    }
}

async fn error_message(response: Response) -> String {
    error_body(response).await.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_a_trailing_slash() {
        let client = BackendClient::new("http://localhost:8090/certdeck").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8090/certdeck/");
        let url = client.workflow_url(Uuid::nil()).unwrap();
        assert_eq!(url.path(), format!("/certdeck/api/workflows/{}", Uuid::nil()));
    }

    #[test]
    fn archive_request_omits_missing_format() {
        let body = serde_json::to_value(ArchiveRequest { format: None }).unwrap();
        assert_eq!(body, serde_json::json!({}));
        let body = serde_json::to_value(ArchiveRequest { format: Some(ArchiveFormat::Pfx) }).unwrap();
        assert_eq!(body, serde_json::json!({ "format": "PFX" }));
    }
}
