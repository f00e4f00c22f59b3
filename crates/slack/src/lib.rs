//! Slack Integration - event-to-action dispatch for the You360 bot
//!
//! This crate provides the Slack side of u360:
//! - **Envelopes** (`envelope`) - normalized inbound occurrences (events, actions, commands)
//! - **Matchers** (`matcher`) - literal and pattern predicates over an envelope payload
//! - **Dispatch** (`dispatch`) - registration table and the failure-isolating dispatcher
//! - **Context** (`context`) - what a handler sees: envelope, client, `say`, `respond`, `ack`
//! - **Client** (`client`, `web_api`) - outbound Web API capability and its reqwest implementation
//! - **Block Kit** (`blocks`) - message and view builders
//! - **Listeners** (`app`) - the You360 mention, home tab, modal, button and command handlers
//! - **Socket Mode** (`socket`, `websocket`) - envelope pump loop with reconnection logic and
//!   the `apps.connections.open` websocket transport
//!
//! # Architecture
//!
//! ```text
//! SocketTransport → SocketModeRunner → EventDispatcher → Registrations (kind + matcher)
//!                        ↓ ack                                 ↓
//!                   AckHandle  ←──────────────  Context → SlackClient (Web API)
//! ```
//!
//! # Key Types
//!
//! - `EventDispatcher` - invokes every matching handler, isolating failures
//! - `RegistrationTable` - append-only list of `(kind, matcher, handler)`
//! - `Context` - per-invocation handler view with injected client
//! - `SocketModeRunner` - pumps envelopes from a transport into the dispatcher

pub mod ack;
pub mod app;
pub mod blocks;
pub mod client;
pub mod context;
pub mod dispatch;
pub mod envelope;
pub mod matcher;
pub mod socket;
pub mod web_api;
pub mod websocket;

#[cfg(test)]
pub(crate) mod testing;

pub use ack::{AckError, AckHandle, Acknowledger};
pub use client::{SlackClient, TransportError};
pub use context::Context;
pub use dispatch::{
    handler_fn, BotIdentity, DispatchOutcome, EventDispatcher, EventHandler, HandlerError,
    HandlerFailure, Registration, RegistrationTable,
};
pub use envelope::{AckMode, EventEnvelope};
pub use matcher::Matcher;
pub use socket::{
    NoopSocketTransport, ReconnectPolicy, SocketError, SocketModeRunner, SocketTransport,
};
pub use web_api::WebApiClient;
pub use websocket::WebSocketTransport;
