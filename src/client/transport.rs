use std::sync::Arc;

use http::{Request, Response};
use ureq::{
    tls::{RootCerts, TlsConfig},
    Agent,
};

use super::TransportError;

/// Sends one HTTP request and buffers the whole response body.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> {
        (**self).send(request)
    }
}

pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: Agent::config_builder()
                .user_agent(concat!("backupmonitor-cli/", env!("CARGO_PKG_VERSION")))
                .http_status_as_error(false)
                .tls_config(
                    TlsConfig::builder()
                        .root_certs(RootCerts::PlatformVerifier)
                        .build(),
                )
                .build()
                .new_agent(),
        }
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> {
        // Bodiless requests go out without a Content-Length header
        let response = if request.body().is_empty() {
            self.agent.run(request.map(|_| ()))?
        } else {
            self.agent.run(request)?
        };

        let (parts, mut body) = response.into_parts();
        // Backup downloads can be large, so lift the default body limit
        let bytes = body.with_config().limit(u64::MAX).read_to_vec()?;
        Ok(Response::from_parts(parts, bytes))
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use http::{header::AUTHORIZATION, Method, StatusCode};

    use super::*;

    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub method: Method,
        pub path: String,
        pub authorization: Option<String>,
        pub body: Vec<u8>,
    }

    impl RecordedRequest {
        pub fn json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.body).unwrap()
        }
    }

    type Handler =
        dyn Fn(&Method, &str) -> Result<Response<Vec<u8>>, TransportError> + Send + Sync;

    /// Answers requests from a routing closure and remembers what was sent.
    pub struct FakeTransport {
        handler: Box<Handler>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl FakeTransport {
        pub fn new(
            handler: impl Fn(&Method, &str) -> Result<Response<Vec<u8>>, TransportError>
                + Send
                + Sync
                + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                handler: Box::new(handler),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn last(&self) -> RecordedRequest {
            self.requests().pop().expect("no request was sent")
        }
    }

    impl Transport for FakeTransport {
        fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> {
            let path = request.uri().path().to_owned();
            let authorization = request
                .headers()
                .get(AUTHORIZATION)
                .map(|v| v.to_str().unwrap().to_owned());
            let method = request.method().clone();
            self.requests.lock().unwrap().push(RecordedRequest {
                method: method.clone(),
                path: path.clone(),
                authorization,
                body: request.into_body(),
            });
            (self.handler)(&method, &path)
        }
    }

    pub fn json(status: StatusCode, body: serde_json::Value) -> Result<Response<Vec<u8>>, TransportError> {
        Ok(Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&body).unwrap())
            .unwrap())
    }

    pub fn empty(status: StatusCode) -> Result<Response<Vec<u8>>, TransportError> {
        Ok(Response::builder().status(status).body(Vec::new()).unwrap())
    }
}
