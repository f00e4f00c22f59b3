//! The You360 listeners: mention replies, home tabs, the ticket modal, button
//! clicks and slash commands.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    blocks::{self, FIRST_BUTTON_ACTION_ID, MODAL_BUTTON_ACTION_ID},
    client::{text_content, SlackClient},
    context::Context,
    dispatch::{handler_fn, EventDispatcher, HandlerError, RegistrationTable},
    envelope::kind,
    matcher::Matcher,
};

pub const GREETING_PATTERN: &str = "^(hi|hello|hey|:wave:).*";

/// Registers every listener in the order the app declares them. Both
/// `app_home_opened` listeners fire on each home visit; the two `button_abc`
/// listeners are split by where the button lives (modal vs. message).
/// Message listeners ignore bot posts so the app never answers itself.
pub fn register_listeners(table: &mut RegistrationTable) -> Result<(), regex::Error> {
    table.event(kind::APP_MENTION, handler_fn(reply_to_mention));
    table.event(kind::APP_HOME_OPENED, handler_fn(publish_welcome_home));
    table.message(from_people(Matcher::text("hello")), handler_fn(offer_fancy_button));
    table.action(FIRST_BUTTON_ACTION_ID, None, handler_fn(thank_for_click));
    table.message(from_people(Matcher::text("knock knock")), handler_fn(answer_knock_knock));
    table.message(
        from_people(Matcher::text_pattern(GREETING_PATTERN)?),
        handler_fn(greet_back),
    );
    table.command("/ticket", handler_fn(open_ticket_modal));
    table.action(
        MODAL_BUTTON_ACTION_ID,
        Some(Matcher::has_field("/view/id")),
        handler_fn(update_ticket_modal),
    );
    table.event(kind::APP_HOME_OPENED, handler_fn(publish_home_greeting));
    table.command("/mirror", handler_fn(mirror_command_text));
    table.command("/u360", handler_fn(post_onboarding));
    table.action(
        MODAL_BUTTON_ACTION_ID,
        Some(Matcher::has_field("/message/ts")),
        handler_fn(mark_message_clicked),
    );
    Ok(())
}

fn from_people(matcher: Matcher) -> Matcher {
    Matcher::all([Matcher::not_from_bot(), matcher])
}

pub fn default_dispatcher(client: Arc<dyn SlackClient>) -> Result<EventDispatcher, regex::Error> {
    let mut table = RegistrationTable::new();
    register_listeners(&mut table)?;
    Ok(EventDispatcher::new(table, client))
}

async fn reply_to_mention(ctx: Context) -> Result<(), HandlerError> {
    let user = ctx.field("/user")?;
    ctx.say(text_content(blocks::mention_reply_text(user))).await?;
    Ok(())
}

async fn publish_welcome_home(ctx: Context) -> Result<(), HandlerError> {
    let user = ctx.field("/user")?;
    let result = ctx.client().publish_view(user, blocks::welcome_home_view().to_value()?).await?;
    debug!(user_id = user, response = %result, "published welcome home tab");
    Ok(())
}

async fn offer_fancy_button(ctx: Context) -> Result<(), HandlerError> {
    let user = ctx.field("/user")?;
    ctx.say(blocks::button_prompt_message(user).to_content()?).await?;
    Ok(())
}

async fn thank_for_click(ctx: Context) -> Result<(), HandlerError> {
    ctx.ack().await?;
    ctx.say(text_content("Thanks for clicking the fancy button")).await?;
    Ok(())
}

async fn answer_knock_knock(ctx: Context) -> Result<(), HandlerError> {
    ctx.say(text_content("_Who's there?_")).await?;
    Ok(())
}

async fn greet_back(ctx: Context) -> Result<(), HandlerError> {
    let greeting = ctx.matches().get(1).map(String::as_str).unwrap_or_default();
    let user = ctx.field("/user")?;
    debug!(greeting, user_id = user, "greeting matched");
    // Mentions the author; the matched greeting is only logged.
    ctx.say(text_content(format!("<@{user}>, how are you?"))).await?;
    Ok(())
}

async fn open_ticket_modal(ctx: Context) -> Result<(), HandlerError> {
    ctx.ack().await?;
    let trigger_id = ctx.field("/trigger_id")?;
    let result = ctx.client().open_view(trigger_id, blocks::ticket_modal().to_value()?).await?;
    info!(response = %result, "opened ticket modal");
    Ok(())
}

async fn update_ticket_modal(ctx: Context) -> Result<(), HandlerError> {
    ctx.ack().await?;
    let view_id = ctx.field("/view/id")?;
    let hash = ctx.envelope().str_at("/view/hash");
    let result = ctx
        .client()
        .update_view(view_id, hash, blocks::updated_ticket_modal().to_value()?)
        .await?;
    info!(response = %result, "updated ticket modal");
    Ok(())
}

async fn publish_home_greeting(ctx: Context) -> Result<(), HandlerError> {
    let user = ctx.field("/user")?;
    let result =
        ctx.client().publish_view(user, blocks::home_greeting_view(user).to_value()?).await?;
    info!(response = %result, "published home greeting");
    Ok(())
}

async fn mirror_command_text(ctx: Context) -> Result<(), HandlerError> {
    ctx.ack().await?;
    let text = ctx.envelope().str_at("/text").unwrap_or_default().to_owned();
    ctx.respond(text_content(text)).await?;
    Ok(())
}

async fn post_onboarding(ctx: Context) -> Result<(), HandlerError> {
    ctx.ack().await?;
    let result = ctx.say(blocks::onboarding_message().to_content()?).await?;
    info!(response = %result, "posted onboarding message");
    Ok(())
}

async fn mark_message_clicked(ctx: Context) -> Result<(), HandlerError> {
    ctx.ack().await?;
    let channel = ctx.field("/channel/id")?;
    let ts = ctx.field("/message/ts")?;
    let result = ctx
        .client()
        .update_message(channel, ts, blocks::button_clicked_message().to_content()?)
        .await?;
    info!(response = %result, "marked message as clicked");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::default_dispatcher;
    use crate::{
        ack::AckHandle,
        blocks,
        client::text_content,
        dispatch::{DispatchOutcome, EventDispatcher},
        envelope::{kind, EventEnvelope},
        testing::{ApiCall, RecordingAcknowledger, RecordingClient},
    };

    struct Harness {
        client: Arc<RecordingClient>,
        acknowledger: Arc<RecordingAcknowledger>,
        dispatcher: EventDispatcher,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_client(RecordingClient::default())
        }

        fn with_client(client: RecordingClient) -> Self {
            let client = Arc::new(client);
            let dispatcher = default_dispatcher(client.clone()).expect("listeners register");
            Self { client, acknowledger: Arc::new(RecordingAcknowledger::default()), dispatcher }
        }

        async fn event(&self, event_kind: &str, payload: Value) -> DispatchOutcome {
            let envelope = EventEnvelope::new(event_kind, payload);
            let ack = Arc::new(AckHandle::acknowledged(envelope.envelope_id.clone()));
            self.dispatcher.dispatch(envelope, ack).await
        }

        async fn interactive(&self, event_kind: &str, payload: Value) -> DispatchOutcome {
            let envelope = EventEnvelope::new(event_kind, payload).requiring_ack();
            let ack =
                Arc::new(AckHandle::new(envelope.envelope_id.clone(), self.acknowledger.clone()));
            self.dispatcher.dispatch(envelope, ack).await
        }
    }

    #[test]
    fn registers_every_listener() {
        let harness = Harness::new();
        assert_eq!(harness.dispatcher.registration_count(), 12);
    }

    #[tokio::test]
    async fn mention_gets_thanked_in_channel() {
        let harness = Harness::new();
        let outcome = harness
            .event(kind::APP_MENTION, json!({ "user": "U1", "channel": "C1", "text": "<@B1>" }))
            .await;

        assert_eq!(outcome.succeeded, 1);
        assert_eq!(
            harness.client.calls(),
            vec![ApiCall::PostMessage {
                channel: "C1".to_owned(),
                content: text_content("Thanks for the mention, <@U1>!"),
            }]
        );
    }

    #[tokio::test]
    async fn home_opened_publishes_both_home_tabs_in_order() {
        let harness = Harness::new();
        let outcome = harness.event(kind::APP_HOME_OPENED, json!({ "user": "U2" })).await;

        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(
            harness.client.calls(),
            vec![
                ApiCall::PublishView {
                    user_id: "U2".to_owned(),
                    view: blocks::welcome_home_view().to_value().expect("view"),
                },
                ApiCall::PublishView {
                    user_id: "U2".to_owned(),
                    view: blocks::home_greeting_view("U2").to_value().expect("view"),
                },
            ]
        );
    }

    #[tokio::test]
    async fn failing_home_publish_does_not_stop_sibling() {
        let harness = Harness::with_client(RecordingClient::failing(&["views.publish"]));
        let outcome = harness.event(kind::APP_HOME_OPENED, json!({ "user": "U2" })).await;

        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(harness.client.calls().len(), 2);
    }

    #[tokio::test]
    async fn hello_triggers_button_prompt_and_greeting() {
        let harness = Harness::new();
        let outcome = harness
            .event(kind::MESSAGE, json!({ "user": "U3", "channel": "C3", "text": "hello" }))
            .await;

        assert_eq!(outcome.matched, 2, "exact `hello` and the greeting pattern both accept");
        let calls = harness.client.calls();
        assert_eq!(
            calls[0],
            ApiCall::PostMessage {
                channel: "C3".to_owned(),
                content: blocks::button_prompt_message("U3").to_content().expect("content"),
            }
        );
        assert_eq!(
            calls[1],
            ApiCall::PostMessage {
                channel: "C3".to_owned(),
                content: text_content("<@U3>, how are you?"),
            }
        );
    }

    #[tokio::test]
    async fn bot_posts_do_not_trigger_message_listeners() {
        let harness = Harness::new();
        let payload = json!({
            "subtype": "bot_message",
            "bot_id": "B1",
            "channel": "C1",
            "text": "hello"
        });
        let outcome = harness.event(kind::MESSAGE, payload).await;

        assert_eq!(outcome.matched, 0);
        assert!(harness.client.calls().is_empty());
    }

    #[tokio::test]
    async fn mirrored_reply_from_the_app_is_not_answered() {
        let harness = Harness::new();
        let outcome = harness
            .event(kind::MESSAGE, json!({ "bot_id": "BBOT", "channel": "C1", "text": "hi there" }))
            .await;

        assert!(outcome.is_ignored());
    }

    #[tokio::test]
    async fn knock_knock_asks_who_is_there() {
        let harness = Harness::new();
        harness
            .event(kind::MESSAGE, json!({ "user": "U4", "channel": "C4", "text": "knock knock" }))
            .await;

        assert_eq!(
            harness.client.calls(),
            vec![ApiCall::PostMessage {
                channel: "C4".to_owned(),
                content: text_content("_Who's there?_"),
            }]
        );
    }

    #[tokio::test]
    async fn unrelated_message_is_ignored() {
        let harness = Harness::new();
        let outcome = harness
            .event(kind::MESSAGE, json!({ "user": "U4", "channel": "C4", "text": "lunch?" }))
            .await;

        assert!(outcome.is_ignored());
        assert!(harness.client.calls().is_empty());
    }

    #[tokio::test]
    async fn first_button_is_acknowledged_then_thanked() {
        let harness = Harness::new();
        let outcome = harness
            .interactive(
                kind::BLOCK_ACTIONS,
                json!({
                    "user": { "id": "U5" },
                    "channel": { "id": "C5" },
                    "actions": [{ "action_id": "first_button", "value": "click_me_123" }]
                }),
            )
            .await;

        assert_eq!(outcome.succeeded, 1);
        assert_eq!(harness.acknowledger.attempts(), 1);
        assert_eq!(
            harness.client.calls(),
            vec![ApiCall::PostMessage {
                channel: "C5".to_owned(),
                content: text_content("Thanks for clicking the fancy button"),
            }]
        );
    }

    #[tokio::test]
    async fn ticket_command_opens_modal_after_ack() {
        let harness = Harness::new();
        let outcome = harness
            .interactive(
                kind::SLASH_COMMAND,
                json!({ "command": "/ticket", "trigger_id": "T-1", "channel_id": "C6" }),
            )
            .await;

        assert_eq!(outcome.succeeded, 1);
        assert_eq!(harness.acknowledger.attempts(), 1);
        assert_eq!(
            harness.client.calls(),
            vec![ApiCall::OpenView {
                trigger_id: "T-1".to_owned(),
                view: blocks::ticket_modal().to_value().expect("view"),
            }]
        );
    }

    #[tokio::test]
    async fn modal_button_updates_view_with_hash() {
        let harness = Harness::new();
        let outcome = harness
            .interactive(
                kind::BLOCK_ACTIONS,
                json!({
                    "user": { "id": "U7" },
                    "view": { "id": "V1", "hash": "h-1" },
                    "actions": [{ "action_id": "button_abc" }]
                }),
            )
            .await;

        assert_eq!(outcome.matched, 1, "message variant must not match a modal button");
        assert_eq!(harness.acknowledger.attempts(), 1);
        assert_eq!(
            harness.client.calls(),
            vec![ApiCall::UpdateView {
                view_id: "V1".to_owned(),
                hash: Some("h-1".to_owned()),
                view: blocks::updated_ticket_modal().to_value().expect("view"),
            }]
        );
    }

    #[tokio::test]
    async fn message_button_updates_original_message() {
        let harness = Harness::new();
        let outcome = harness
            .interactive(
                kind::BLOCK_ACTIONS,
                json!({
                    "user": { "id": "U8" },
                    "channel": { "id": "C8" },
                    "message": { "ts": "1730000000.0001" },
                    "actions": [{ "action_id": "button_abc" }]
                }),
            )
            .await;

        assert_eq!(outcome.matched, 1);
        assert_eq!(
            harness.client.calls(),
            vec![ApiCall::UpdateMessage {
                channel: "C8".to_owned(),
                ts: "1730000000.0001".to_owned(),
                content: blocks::button_clicked_message().to_content().expect("content"),
            }]
        );
    }

    #[tokio::test]
    async fn mirror_command_echoes_text_via_response_url() {
        let harness = Harness::new();
        harness
            .interactive(
                kind::SLASH_COMMAND,
                json!({
                    "command": "/mirror",
                    "text": "repeat after me",
                    "response_url": "https://hooks.example/mirror"
                }),
            )
            .await;

        assert_eq!(harness.acknowledger.attempts(), 1);
        assert_eq!(
            harness.client.calls(),
            vec![ApiCall::Respond {
                response_url: "https://hooks.example/mirror".to_owned(),
                content: text_content("repeat after me"),
            }]
        );
    }

    #[tokio::test]
    async fn u360_command_posts_onboarding_to_channel() {
        let harness = Harness::new();
        harness
            .interactive(kind::SLASH_COMMAND, json!({ "command": "/u360", "channel_id": "C9" }))
            .await;

        assert_eq!(
            harness.client.calls(),
            vec![ApiCall::PostMessage {
                channel: "C9".to_owned(),
                content: blocks::onboarding_message().to_content().expect("content"),
            }]
        );
    }

    #[tokio::test]
    async fn ticket_without_trigger_is_acknowledged_and_logged_as_failure() {
        let harness = Harness::new();
        let outcome =
            harness.interactive(kind::SLASH_COMMAND, json!({ "command": "/ticket" })).await;

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(harness.acknowledger.attempts(), 1);
        assert!(harness.client.calls().is_empty());
    }
}
