use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    ack::Acknowledger,
    client::{SlackClient, TransportError},
    socket::SocketError,
};

#[derive(Clone, Debug, PartialEq)]
pub enum ApiCall {
    PostMessage { channel: String, content: Value },
    UpdateMessage { channel: String, ts: String, content: Value },
    OpenView { trigger_id: String, view: Value },
    UpdateView { view_id: String, hash: Option<String>, view: Value },
    PublishView { user_id: String, view: Value },
    Respond { response_url: String, content: Value },
}

impl ApiCall {
    pub fn method(&self) -> &'static str {
        match self {
            Self::PostMessage { .. } => "chat.postMessage",
            Self::UpdateMessage { .. } => "chat.update",
            Self::OpenView { .. } => "views.open",
            Self::UpdateView { .. } => "views.update",
            Self::PublishView { .. } => "views.publish",
            Self::Respond { .. } => "response_url",
        }
    }
}

/// In-memory client that records every call and fails the configured methods.
#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<ApiCall>>,
    failing_methods: HashSet<&'static str>,
}

impl RecordingClient {
    pub fn failing(methods: &[&'static str]) -> Self {
        Self { calls: Mutex::default(), failing_methods: methods.iter().copied().collect() }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: ApiCall) -> Result<Value, TransportError> {
        let method = call.method();
        self.calls.lock().expect("calls lock").push(call);
        if self.failing_methods.contains(method) {
            return Err(TransportError::Api {
                method: method.to_owned(),
                error: "scripted_failure".to_owned(),
            });
        }
        Ok(json!({ "ok": true }))
    }
}

#[async_trait]
impl SlackClient for RecordingClient {
    async fn post_message(&self, channel: &str, content: Value) -> Result<Value, TransportError> {
        self.record(ApiCall::PostMessage { channel: channel.to_owned(), content })
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        content: Value,
    ) -> Result<Value, TransportError> {
        self.record(ApiCall::UpdateMessage {
            channel: channel.to_owned(),
            ts: ts.to_owned(),
            content,
        })
    }

    async fn open_view(&self, trigger_id: &str, view: Value) -> Result<Value, TransportError> {
        self.record(ApiCall::OpenView { trigger_id: trigger_id.to_owned(), view })
    }

    async fn update_view(
        &self,
        view_id: &str,
        hash: Option<&str>,
        view: Value,
    ) -> Result<Value, TransportError> {
        self.record(ApiCall::UpdateView {
            view_id: view_id.to_owned(),
            hash: hash.map(str::to_owned),
            view,
        })
    }

    async fn publish_view(&self, user_id: &str, view: Value) -> Result<Value, TransportError> {
        self.record(ApiCall::PublishView { user_id: user_id.to_owned(), view })
    }

    async fn respond(&self, response_url: &str, content: Value) -> Result<Value, TransportError> {
        self.record(ApiCall::Respond { response_url: response_url.to_owned(), content })
    }
}

#[derive(Default)]
pub struct RecordingAcknowledger {
    acknowledged: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingAcknowledger {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().expect("ack lock").clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Acknowledger for RecordingAcknowledger {
    async fn acknowledge(
        &self,
        envelope_id: &str,
        _payload: Option<Value>,
    ) -> Result<(), SocketError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SocketError::Acknowledge("socket closed".to_owned()));
        }
        self.acknowledged.lock().expect("ack lock").push(envelope_id.to_owned());
        Ok(())
    }
}
