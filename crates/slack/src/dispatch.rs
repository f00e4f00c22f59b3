use std::{any::Any, future::Future, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{future::join_all, FutureExt};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    ack::{AckError, AckHandle},
    client::{SlackClient, TransportError},
    context::Context,
    envelope::{kind, AckMode, EventEnvelope},
    matcher::Matcher,
};

pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Ack(#[from] AckError),
    #[error("payload is missing `{0}`")]
    MissingField(&'static str),
    #[error("could not encode outbound document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0}")]
    Handler(String),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: Context) -> Result<(), HandlerError>;
}

/// Adapts an async function or closure into an [`EventHandler`].
pub fn handler_fn<F, Fut>(handler: F) -> FnHandler<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    FnHandler { handler }
}

pub struct FnHandler<F> {
    handler: F,
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, ctx: Context) -> Result<(), HandlerError> {
        (self.handler)(ctx).await
    }
}

#[derive(Clone)]
pub struct Registration {
    pub index: usize,
    pub kind: String,
    pub matcher: Option<Matcher>,
    pub handler: Arc<dyn EventHandler>,
}

/// Append-only list of registrations. Several registrations may share a kind;
/// none replaces another.
#[derive(Clone, Default)]
pub struct RegistrationTable {
    registrations: Vec<Registration>,
}

impl RegistrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, kind: impl Into<String>, matcher: Option<Matcher>, handler: H)
    where
        H: EventHandler + 'static,
    {
        let index = self.registrations.len();
        self.registrations.push(Registration {
            index,
            kind: kind.into(),
            matcher,
            handler: Arc::new(handler),
        });
    }

    /// Registrations for `kind`, in registration order.
    pub fn lookup<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Registration> + 'a {
        self.registrations.iter().filter(move |registration| registration.kind == kind)
    }

    pub fn event<H>(&mut self, kind: impl Into<String>, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.register(kind, None, handler);
    }

    pub fn message<H>(&mut self, matcher: Matcher, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.register(kind::MESSAGE, Some(matcher), handler);
    }

    /// Block action whose first action carries `action_id`, optionally
    /// narrowed by `extra`.
    pub fn action<H>(&mut self, action_id: &str, extra: Option<Matcher>, handler: H)
    where
        H: EventHandler + 'static,
    {
        let by_id = Matcher::exact("/actions/0/action_id", action_id);
        let matcher = match extra {
            Some(extra) => Matcher::all([by_id, extra]),
            None => by_id,
        };
        self.register(kind::BLOCK_ACTIONS, Some(matcher), handler);
    }

    pub fn command<H>(&mut self, command: &str, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.register(kind::SLASH_COMMAND, Some(Matcher::exact("/command", command)), handler);
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FailureReason {
    #[error("{0}")]
    Error(String),
    #[error("handler panicked: {0}")]
    Panicked(String),
    #[error("handler did not finish within {0:?}")]
    TimedOut(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerFailure {
    pub registration: usize,
    pub reason: FailureReason,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub matched: usize,
    pub succeeded: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchOutcome {
    pub fn is_ignored(&self) -> bool {
        self.matched == 0
    }
}

/// Membership events still dispatch when the bot itself joins or leaves.
const SELF_EVENTS_KEPT: [&str; 2] = ["member_joined_channel", "member_left_channel"];

/// The app's own Slack identity, as reported by `auth.test`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: Option<String>,
    pub bot_id: Option<String>,
}

impl BotIdentity {
    /// True for Events API deliveries caused by the app itself. Interactive
    /// payloads and commands always come from people and are never matched.
    pub fn authored(&self, envelope: &EventEnvelope) -> bool {
        if envelope.ack_mode != AckMode::Automatic {
            return false;
        }

        let same = |own: &Option<String>, pointer: &str| {
            own.as_deref().is_some_and(|own| envelope.str_at(pointer) == Some(own))
        };
        if same(&self.bot_id, "/bot_id") {
            return true;
        }
        same(&self.user_id, "/user") && !SELF_EVENTS_KEPT.contains(&envelope.kind.as_str())
    }
}

pub struct EventDispatcher {
    table: RegistrationTable,
    client: Arc<dyn SlackClient>,
    handler_timeout: Duration,
    identity: Option<BotIdentity>,
}

impl EventDispatcher {
    pub fn new(table: RegistrationTable, client: Arc<dyn SlackClient>) -> Self {
        Self { table, client, handler_timeout: DEFAULT_HANDLER_TIMEOUT, identity: None }
    }

    /// Drops events the app caused itself before any matcher runs.
    pub fn with_bot_identity(mut self, identity: BotIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn bot_identity(&self) -> Option<&BotIdentity> {
        self.identity.as_ref()
    }

    pub fn with_handler_timeout(mut self, handler_timeout: Duration) -> Self {
        self.handler_timeout = handler_timeout;
        self
    }

    pub fn registration_count(&self) -> usize {
        self.table.len()
    }

    pub fn table(&self) -> &RegistrationTable {
        &self.table
    }

    /// Invokes every registration whose kind and matcher accept the envelope.
    ///
    /// Handlers start in registration order and then run concurrently. Errors,
    /// panics and timeouts are logged and reported in the outcome; they never
    /// reach the caller or sibling handlers.
    pub async fn dispatch(&self, envelope: EventEnvelope, ack: Arc<AckHandle>) -> DispatchOutcome {
        if self.identity.as_ref().is_some_and(|identity| identity.authored(&envelope)) {
            debug!(
                envelope_id = %envelope.envelope_id,
                kind = %envelope.kind,
                "ignoring event authored by this app"
            );
            return DispatchOutcome::default();
        }

        let envelope = Arc::new(envelope);

        let invocations: Vec<_> = self
            .table
            .lookup(&envelope.kind)
            .filter_map(|registration| {
                let matches = match &registration.matcher {
                    Some(matcher) => matcher.evaluate(&envelope.payload),
                    None => Some(Vec::new()),
                };
                if matches.is_none() {
                    debug!(
                        envelope_id = %envelope.envelope_id,
                        kind = %envelope.kind,
                        registration = registration.index,
                        "matcher rejected envelope"
                    );
                }
                matches.map(|matches| {
                    let ctx =
                        Context::new(envelope.clone(), matches, self.client.clone(), ack.clone());
                    self.invoke(registration, ctx)
                })
            })
            .collect();

        let mut outcome =
            DispatchOutcome { matched: invocations.len(), ..DispatchOutcome::default() };
        if outcome.is_ignored() {
            debug!(
                envelope_id = %envelope.envelope_id,
                kind = %envelope.kind,
                "no registration matched envelope"
            );
            return outcome;
        }

        for result in join_all(invocations).await {
            match result {
                Ok(()) => outcome.succeeded += 1,
                Err(failure) => {
                    error!(
                        event_name = "dispatch.handler.failed",
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        kind = %envelope.kind,
                        registration = failure.registration,
                        error = %failure.reason,
                        "event handler failed; continuing"
                    );
                    outcome.failures.push(failure);
                }
            }
        }

        if envelope.ack_mode == AckMode::Handler && !ack.is_acknowledged() {
            warn!(
                event_name = "dispatch.envelope.unacknowledged",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                kind = %envelope.kind,
                "handlers finished without acknowledging; slack may redeliver"
            );
        }

        info!(
            event_name = "dispatch.envelope.completed",
            envelope_id = %envelope.envelope_id,
            correlation_id = %envelope.envelope_id,
            kind = %envelope.kind,
            matched = outcome.matched,
            failed = outcome.failures.len(),
            "envelope dispatched"
        );

        outcome
    }

    async fn invoke(
        &self,
        registration: &Registration,
        ctx: Context,
    ) -> Result<(), HandlerFailure> {
        let call = AssertUnwindSafe(registration.handler.handle(ctx)).catch_unwind();
        let reason = match tokio::time::timeout(self.handler_timeout, call).await {
            Ok(Ok(Ok(()))) => return Ok(()),
            Ok(Ok(Err(error))) => FailureReason::Error(error.to_string()),
            Ok(Err(panic)) => FailureReason::Panicked(panic_message(panic.as_ref())),
            Err(_) => FailureReason::TimedOut(self.handler_timeout),
        };
        Err(HandlerFailure { registration: registration.index, reason })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
