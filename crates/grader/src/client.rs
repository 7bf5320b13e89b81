use axum::body::Body;
use axum::http::{header, Request as HttpRequest};
use http_body_util::BodyExt;
use tellerkit_web::{serve, App};
use tower::ServiceExt;
use url::form_urlencoded;

use crate::error::{CheckError, HarnessError};

/// What the simulated client got back.
#[derive(Debug, Clone)]
pub struct SimResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub location: Option<String>,
    pub text: String,
}

type Expectation = Box<dyn FnOnce(&SimResponse) -> Result<(), CheckError>>;

/// Sends requests to an application in process, through its axum router.
pub struct SimulatedClient {
    app: App,
}

impl SimulatedClient {
    pub fn new(app: App) -> Self {
        SimulatedClient { app }
    }

    pub fn get(&self, path: &str) -> PendingRequest {
        PendingRequest::new(self.app.clone(), "GET", path)
    }

    pub fn post(&self, path: &str) -> PendingRequest {
        PendingRequest::new(self.app.clone(), "POST", path)
    }
}

pub struct PendingRequest {
    app: App,
    method: &'static str,
    path: String,
    form: Vec<(String, String)>,
    expectations: Vec<Expectation>,
}

impl PendingRequest {
    fn new(app: App, method: &'static str, path: &str) -> Self {
        PendingRequest {
            app,
            method,
            path: path.to_string(),
            form: Vec::new(),
            expectations: Vec::new(),
        }
    }

    /// Add a urlencoded form field.
    pub fn field(mut self, key: &str, value: &str) -> Self {
        self.form.push((key.to_string(), value.to_string()));
        self
    }

    /// Check the response once it arrives. Expectations run in order and the
    /// first failure stops the request.
    pub fn expect(
        mut self,
        check: impl FnOnce(&SimResponse) -> Result<(), CheckError> + 'static,
    ) -> Self {
        self.expectations.push(Box::new(check));
        self
    }

    /// Send the request and run the expectations.
    pub fn end(self) -> Result<SimResponse, CheckError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| HarnessError::Runtime(e.to_string()))?;
        let response = runtime.block_on(self.send())?;
        for check in self.expectations {
            check(&response)?;
        }
        Ok(response)
    }

    async fn send(&self) -> Result<SimResponse, HarnessError> {
        let mut builder = HttpRequest::builder().method(self.method).uri(&self.path);
        let body = if self.form.is_empty() {
            Body::empty()
        } else {
            builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.form)
                .finish();
            Body::from(encoded)
        };
        let request = builder
            .body(body)
            .map_err(|e| HarnessError::Runtime(e.to_string()))?;

        let response = serve::router(self.app.clone())
            .oneshot(request)
            .await
            .map_err(|e| HarnessError::Runtime(e.to_string()))?;

        let status = response.status().as_u16();
        let header_text = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header_text(header::CONTENT_TYPE);
        let location = header_text(header::LOCATION);
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| HarnessError::Runtime(e.to_string()))?
            .to_bytes();

        Ok(SimResponse {
            status,
            content_type,
            location,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}
