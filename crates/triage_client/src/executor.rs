use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::Value;
use triage_logging::{triage_debug, triage_trace};
use url::Url;

use crate::error::service_error;
use crate::{ClientError, ClientSettings};

/// Raw response body of a long-lived request.
pub type ByteStream = BoxStream<'static, Result<Bytes, ClientError>>;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    /// A `_json` metadata field followed by a `file` field.
    Multipart {
        json: Value,
        file_name: String,
        contents: Vec<u8>,
    },
}

/// A request relative to the service root.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(RequestBody::Json(body))
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of the first query parameter named `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Issues requests against the service.
///
/// Non-2xx responses are surfaced as [`ClientError::Service`].
#[async_trait::async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Runs a request and decodes the response body as JSON. An empty body
    /// decodes to `Value::Null`.
    async fn execute(&self, request: ApiRequest) -> Result<Value, ClientError>;

    /// Opens a request whose body is consumed incrementally.
    async fn open_stream(&self, request: ApiRequest) -> Result<ByteStream, ClientError>;
}

/// [`RequestExecutor`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    settings: ClientSettings,
    root: Url,
    client: reqwest::Client,
}

impl ReqwestExecutor {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        let root = Url::parse(&settings.root_url).map_err(|err| {
            ClientError::Transport(format!("invalid root url {:?}: {err}", settings.root_url))
        })?;
        // No overall timeout on the client: event streams are long-lived.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(ClientError::from_reqwest)?;
        Ok(Self {
            settings,
            root,
            client,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn url_for(&self, request: &ApiRequest) -> Url {
        let mut url = self.root.clone();
        let base = self.root.path().trim_end_matches('/');
        url.set_path(&format!("{base}{}", request.path));
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    fn build(&self, request: ApiRequest) -> Result<reqwest::RequestBuilder, ClientError> {
        let url = self.url_for(&request);
        triage_debug!("{} {}", request.method, url);
        let builder = self
            .client
            .request(request.method, url)
            .bearer_auth(&self.settings.token);
        let builder = match request.body {
            None => builder,
            Some(RequestBody::Json(value)) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(&value)?),
            Some(RequestBody::Multipart {
                json,
                file_name,
                contents,
            }) => {
                let form = Form::new()
                    .text("_json", json.to_string())
                    .part("file", Part::bytes(contents).file_name(file_name));
                builder.multipart(form)
            }
        };
        Ok(builder)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = builder.send().await.map_err(ClientError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            let body = error_body(status.as_u16(), response.bytes().await);
            return Err(service_error(status.as_u16(), &body));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl RequestExecutor for ReqwestExecutor {
    async fn execute(&self, request: ApiRequest) -> Result<Value, ClientError> {
        let builder = self.build(request)?.timeout(self.settings.request_timeout);
        let response = self.send(builder).await?;
        let body = response.bytes().await.map_err(ClientError::from_reqwest)?;
        triage_trace!("response body {} bytes", body.len());
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn open_stream(&self, request: ApiRequest) -> Result<ByteStream, ClientError> {
        let response = self.send(self.build(request)?).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ClientError::from_reqwest))
            .boxed())
    }
}

/// The body of a failed response. A body that cannot be read still leaves
/// the status to report.
fn error_body<E: std::fmt::Display>(status: u16, body: Result<Bytes, E>) -> Bytes {
    match body {
        Ok(body) => body,
        Err(err) => {
            triage_debug!("could not read body of {} response: {}", status, err);
            Bytes::new()
        }
    }
}
