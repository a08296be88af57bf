//! Transport abstraction layer
//!
//! Exchange HTTP/WebSocket clients sit behind [`Transport`]. The gateway only
//! sees raw JSON payloads; signing, sessions and sockets belong to the
//! transport implementation. [`channel::ChannelTransport`] is the in-process
//! implementation used for tests and paper setups.

pub mod channel;

use async_trait::async_trait;
use meridian_ports::TransportError;
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

/// HTTP verb of a REST call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestMethod {
    Get,
    Post,
}

impl RestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestMethod::Get => "GET",
            RestMethod::Post => "POST",
        }
    }
}

/// One REST request, described independently of any HTTP client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestCall {
    pub method: RestMethod,
    pub path: String,
    pub params: Vec<(String, String)>,
    /// Requires the account credentials held by the transport
    pub signed: bool,
}

impl RestCall {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: RestMethod::Get,
            path: path.into(),
            params: Vec::new(),
            signed: false,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: RestMethod::Post,
            path: path.into(),
            params: Vec::new(),
            signed: false,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    /// Value of the first parameter named `key`
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for RestCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

/// A streaming channel for one symbol: `depth:ETHBTC`, `ticker:tBTCUSD`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamTopic {
    pub channel: String,
    pub symbol: String,
}

impl StreamTopic {
    pub fn new(channel: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for StreamTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.symbol)
    }
}

/// Item delivered on a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Payload(Value),
    /// The underlying connection dropped; no more payloads will follow
    Disconnected(String),
}

/// Exchange transport client
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a REST call and return the decoded JSON body
    async fn call(&self, call: RestCall) -> Result<Value, TransportError>;

    /// Open a subscription; payloads arrive on the returned receiver
    async fn subscribe(
        &self,
        topic: &StreamTopic,
    ) -> Result<mpsc::Receiver<StreamMessage>, TransportError>;

    /// Close a subscription; its receiver yields `None` afterwards
    async fn unsubscribe(&self, topic: &StreamTopic);
}
