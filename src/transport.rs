//! The request/response channel to a bridge.
//!
//! The core only needs "send this request, give me JSON or an error". It adds
//! its own ordering and rate limiting on top, so a [`Transport`] makes no
//! promises about either.

use std::sync::{Arc, Mutex, PoisonError};

use log::{trace, warn};
use serde_json::Value;
use strum_macros::{Display, IntoStaticStr};

use crate::errors::Error;
use crate::history::{MessageHistory, MessageType};
use crate::runtime::BoxFuture;

type Result<T> = std::result::Result<T, Error>;

/// HTTP method of a bridge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

/// A request to the bridge's REST API.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Absolute path on the bridge, e.g. `/api/<credential>/lights/1/state`.
    pub path: String,
    pub body: Option<Value>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Request {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Request {
            method: Method::Put,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Request {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Request {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }

    /// `METHOD path`, used for logs and history.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Sends a request and resolves to the decoded JSON body.
///
/// Implementations report connection problems as [`Error::Transport`] and
/// undecodable bodies as [`Error::JsonLoad`].
pub trait Transport: Send + Sync {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Value>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Value>> {
        (**self).send(request)
    }
}

/// A [`Transport`] over HTTP using reqwest.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: String,
}

#[cfg(feature = "http")]
impl HttpTransport {
    /// Talk to `host`, which may be a bare address or a full base URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_rs::HttpTransport;
    ///
    /// let transport = HttpTransport::new("192.168.1.2");
    /// assert_eq!(transport.base_url(), "http://192.168.1.2");
    /// ```
    pub fn new(host: &str) -> Self {
        Self::with_client(reqwest::Client::new(), host)
    }

    pub fn with_client(client: reqwest::Client, host: &str) -> Self {
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", host.trim_end_matches('/'))
        };
        HttpTransport { client, base }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }
}

#[cfg(feature = "http")]
impl Transport for HttpTransport {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let url = format!("{}{}", self.base, request.path);
            let builder = match request.method {
                Method::Get => self.client.get(&url),
                Method::Put => self.client.put(&url),
                Method::Post => self.client.post(&url),
                Method::Delete => self.client.delete(&url),
            };
            let builder = match &request.body {
                Some(body) => builder.json(body),
                None => builder,
            };

            let response = builder
                .send()
                .await
                .map_err(|e| Error::transport("send", e))?;
            let status = response.status();
            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::transport("receive", e))?;

            match serde_json::from_slice(&bytes) {
                Ok(json) => Ok(json),
                Err(_) if !status.is_success() => {
                    Err(Error::transport("receive", format!("HTTP {status}")))
                }
                Err(e) => Err(Error::JsonLoad(e)),
            }
        })
    }
}

/// Wraps a transport and records every exchange into a bridge's history.
pub(crate) struct Recorded {
    inner: Arc<dyn Transport>,
    history: Arc<Mutex<MessageHistory>>,
}

impl Recorded {
    pub fn new(inner: Arc<dyn Transport>, history: Arc<Mutex<MessageHistory>>) -> Self {
        Recorded { inner, history }
    }

    fn record(&self, msg_type: MessageType, label: &str, message: &Value) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(msg_type, label, message);
    }
}

impl Transport for Recorded {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let label = request.label();
            trace!("-> {label} {:?}", request.body);
            self.record(
                MessageType::Send,
                &label,
                request.body.as_ref().unwrap_or(&Value::Null),
            );

            match self.inner.send(request).await {
                Ok(response) => {
                    trace!("<- {label} {response}");
                    self.record(MessageType::Receive, &label, &response);
                    Ok(response)
                }
                Err(e) => {
                    warn!("{label} failed: {e}");
                    self.history
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .record_error(&label, &e.to_string());
                    Err(e)
                }
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::future::Future;

    use serde_json::{Map, json};

    use super::*;
    use crate::runtime::Instant;

    type Handler = Box<dyn Fn(&Request) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

    /// A scripted bridge that records when each request arrived.
    pub struct MockTransport {
        handler: Handler,
        sent: Mutex<Vec<(Instant, Request)>>,
    }

    impl MockTransport {
        pub fn new<F, Fut>(handler: F) -> Arc<Self>
        where
            F: Fn(&Request) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<Value>> + Send + 'static,
        {
            let handler: Handler = Box::new(
                move |request: &Request| -> BoxFuture<'static, Result<Value>> {
                    Box::pin(handler(request))
                },
            );
            Arc::new(MockTransport {
                handler,
                sent: Mutex::new(Vec::new()),
            })
        }

        pub fn replying<F>(reply: F) -> Arc<Self>
        where
            F: Fn(&Request) -> Result<Value> + Send + Sync + 'static,
        {
            Self::new(move |request| {
                let result = reply(request);
                async move { result }
            })
        }

        pub fn requests(&self) -> Vec<Request> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, r)| r.clone())
                .collect()
        }

        pub fn sent(&self) -> Vec<(Instant, Request)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        fn send(&self, request: Request) -> BoxFuture<'_, Result<Value>> {
            self.sent
                .lock()
                .unwrap()
                .push((Instant::now(), request.clone()));
            (self.handler)(&request)
        }
    }

    /// The reply a bridge gives when it applies every field of `request`.
    pub fn accept_all(request: &Request) -> Value {
        let Some(Value::Object(body)) = &request.body else {
            return json!([]);
        };
        let items: Vec<Value> = body
            .iter()
            .map(|(key, value)| {
                let mut entry = Map::new();
                entry.insert(format!("{}/{}", request.path, key), value.clone());
                json!({ "success": entry })
            })
            .collect();
        Value::Array(items)
    }
}
