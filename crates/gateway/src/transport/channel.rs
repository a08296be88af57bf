//! Tokio channel-based transport for single-process mode
//!
//! REST replies are scripted per path and streams are fed by hand with
//! [`ChannelTransport::push`]. No network, no serialization overhead.

use crate::transport::{RestCall, StreamMessage, StreamTopic, Transport};
use async_trait::async_trait;
use log::debug;
use meridian_ports::TransportError;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
enum Reply {
    Ok(Value),
    Err(TransportError),
    /// Never answers
    Hang,
}

/// Call count and most recent call for one path
struct CallLog {
    count: usize,
    last: RestCall,
}

/// In-process transport with scripted REST replies and pushable streams
pub struct ChannelTransport {
    capacity: usize,
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<HashMap<String, CallLog>>,
    streams: Mutex<HashMap<StreamTopic, mpsc::Sender<StreamMessage>>>,
    subscriptions: Mutex<HashMap<StreamTopic, usize>>,
    refused: Mutex<HashMap<StreamTopic, TransportError>>,
}

impl ChannelTransport {
    /// Create a transport whose streams buffer up to `capacity` messages
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            streams: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            refused: Mutex::new(HashMap::new()),
        }
    }

    /// Answer every call to `path` with `value`
    pub fn reply(&self, path: impl Into<String>, value: Value) {
        self.replies.lock().insert(path.into(), Reply::Ok(value));
    }

    /// Fail every call to `path` with `error`
    pub fn fail(&self, path: impl Into<String>, error: TransportError) {
        self.replies.lock().insert(path.into(), Reply::Err(error));
    }

    /// Leave every call to `path` pending forever
    pub fn hang(&self, path: impl Into<String>) {
        self.replies.lock().insert(path.into(), Reply::Hang);
    }

    /// Number of calls made to `path`
    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().get(path).map_or(0, |log| log.count)
    }

    /// Total number of calls made to any path
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().map(|log| log.count).sum()
    }

    /// Most recent call made to `path`
    pub fn last_call(&self, path: &str) -> Option<RestCall> {
        self.calls.lock().get(path).map(|log| log.last.clone())
    }

    /// Deliver a payload to the current subscriber of `topic`
    ///
    /// Returns false if nobody is subscribed or the buffer is full.
    pub fn push(&self, topic: &StreamTopic, payload: Value) -> bool {
        let streams = self.streams.lock();
        match streams.get(topic) {
            Some(tx) => tx.try_send(StreamMessage::Payload(payload)).is_ok(),
            None => false,
        }
    }

    /// Simulate a dropped connection on `topic`
    pub fn disconnect(&self, topic: &StreamTopic, reason: &str) -> bool {
        match self.streams.lock().remove(topic) {
            Some(tx) => tx
                .try_send(StreamMessage::Disconnected(reason.to_string()))
                .is_ok(),
            None => false,
        }
    }

    /// Refuse subscriptions to `topic` until [`allow`](Self::allow) is called
    pub fn refuse(&self, topic: &StreamTopic, error: TransportError) {
        self.refused.lock().insert(topic.clone(), error);
    }

    pub fn allow(&self, topic: &StreamTopic) {
        self.refused.lock().remove(topic);
    }

    /// How many times `topic` has been subscribed
    pub fn subscriptions(&self, topic: &StreamTopic) -> usize {
        self.subscriptions.lock().get(topic).copied().unwrap_or(0)
    }

    /// Whether `topic` currently has an open subscriber
    pub fn is_subscribed(&self, topic: &StreamTopic) -> bool {
        self.streams
            .lock()
            .get(topic)
            .is_some_and(|tx| !tx.is_closed())
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn call(&self, call: RestCall) -> Result<Value, TransportError> {
        debug!("channel transport call {call}");
        let path = call.path.clone();
        match self.calls.lock().entry(path.clone()) {
            Entry::Occupied(mut entry) => {
                let log = entry.get_mut();
                log.count += 1;
                log.last = call;
            }
            Entry::Vacant(entry) => {
                entry.insert(CallLog {
                    count: 1,
                    last: call,
                });
            }
        }

        let reply = self.replies.lock().get(&path).cloned();
        match reply {
            Some(Reply::Ok(value)) => Ok(value),
            Some(Reply::Err(err)) => Err(err),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(TransportError::Request(format!("no reply scripted for {path}"))),
        }
    }

    async fn subscribe(
        &self,
        topic: &StreamTopic,
    ) -> Result<mpsc::Receiver<StreamMessage>, TransportError> {
        if let Some(err) = self.refused.lock().get(topic) {
            return Err(err.clone());
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        self.streams.lock().insert(topic.clone(), tx);
        *self.subscriptions.lock().entry(topic.clone()).or_insert(0) += 1;
        debug!("channel transport subscribed {topic}");
        Ok(rx)
    }

    async fn unsubscribe(&self, topic: &StreamTopic) {
        // dropping the sender closes the receiver
        self.streams.lock().remove(topic);
        debug!("channel transport unsubscribed {topic}");
    }
}
