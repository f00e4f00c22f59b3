use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        emoji: Option<bool>,
    },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into(), emoji: None }
    }

    pub fn plain_emoji(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into(), emoji: Some(true) }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "button")]
pub struct ButtonElement {
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(text: TextObject) -> Self {
        Self { text, action_id: None, style: None, value: None }
    }

    pub fn action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "multi_conversations_select")]
pub struct MultiConversationsSelect {
    pub placeholder: TextObject,
    pub action_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Accessory {
    Button(ButtonElement),
    MultiConversationsSelect(MultiConversationsSelect),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputElement {
    PlainTextInput {
        action_id: String,
        multiline: bool,
    },
    Timepicker {
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_time: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<TextObject>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Accessory>,
    },
    Divider,
    Actions {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        elements: Vec<ButtonElement>,
    },
    Input {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        label: TextObject,
        element: InputElement,
    },
    Image {
        image_url: String,
        alt_text: String,
    },
    Context {
        elements: Vec<TextObject>,
    },
}

#[derive(Default)]
pub struct SectionBuilder {
    block_id: Option<String>,
    text: Option<TextObject>,
    accessory: Option<Accessory>,
}

impl SectionBuilder {
    pub fn block_id(&mut self, block_id: impl Into<String>) -> &mut Self {
        self.block_id = Some(block_id.into());
        self
    }

    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.accessory = Some(Accessory::Button(button));
        self
    }

    pub fn accessory(&mut self, accessory: Accessory) -> &mut Self {
        self.accessory = Some(accessory);
        self
    }

    fn build(self) -> Block {
        Block::Section {
            block_id: self.block_id,
            text: self.text.unwrap_or_else(|| TextObject::plain("")),
            accessory: self.accessory,
        }
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Block-list building shared by messages and views.
pub trait BlockContainer: Sized {
    fn push_block(&mut self, block: Block);

    fn section<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.push_block(builder.build());
        self
    }

    fn divider(mut self) -> Self {
        self.push_block(Block::Divider);
        self
    }

    fn actions<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.push_block(Block::Actions { block_id: None, elements: builder.build() });
        self
    }

    fn input(mut self, block_id: Option<&str>, label: TextObject, element: InputElement) -> Self {
        self.push_block(Block::Input { block_id: block_id.map(str::to_owned), label, element });
        self
    }

    fn image(mut self, image_url: impl Into<String>, alt_text: impl Into<String>) -> Self {
        self.push_block(Block::Image { image_url: image_url.into(), alt_text: alt_text.into() });
        self
    }

    fn context<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.push_block(Block::Context { elements: builder.build() });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(rename = "text")]
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// Message content as accepted by `chat.postMessage` and friends.
    pub fn to_content(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

impl BlockContainer for MessageBuilder {
    fn push_block(&mut self, block: Block) {
        self.blocks.push(block);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Home,
    Modal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct View {
    #[serde(rename = "type")]
    pub kind: ViewKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<TextObject>,
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit: Option<TextObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<TextObject>,
}

impl View {
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

pub struct ViewBuilder {
    view: View,
}

impl ViewBuilder {
    pub fn home() -> Self {
        Self::with_kind(ViewKind::Home, None)
    }

    pub fn modal(title: TextObject) -> Self {
        Self::with_kind(ViewKind::Modal, Some(title))
    }

    fn with_kind(kind: ViewKind, title: Option<TextObject>) -> Self {
        Self {
            view: View {
                kind,
                callback_id: None,
                title,
                blocks: Vec::new(),
                submit: None,
                close: None,
            },
        }
    }

    pub fn callback_id(mut self, callback_id: impl Into<String>) -> Self {
        self.view.callback_id = Some(callback_id.into());
        self
    }

    pub fn submit(mut self, submit: TextObject) -> Self {
        self.view.submit = Some(submit);
        self
    }

    pub fn close(mut self, close: TextObject) -> Self {
        self.view.close = Some(close);
        self
    }

    pub fn build(self) -> View {
        self.view
    }
}

impl BlockContainer for ViewBuilder {
    fn push_block(&mut self, block: Block) {
        self.view.blocks.push(block);
    }
}

pub const HOME_CALLBACK_ID: &str = "home_view";
pub const TICKET_MODAL_CALLBACK_ID: &str = "view_1";
pub const FIRST_BUTTON_ACTION_ID: &str = "first_button";
pub const MODAL_BUTTON_ACTION_ID: &str = "button_abc";
const UPDATED_MODAL_IMAGE_URL: &str = "https://media.giphy.com/media/SVZGEcYt7brkFUyU90/giphy.gif";

pub fn mention_reply_text(user_id: &str) -> String {
    format!("Thanks for the mention, <@{user_id}>!")
}

pub fn welcome_home_view() -> View {
    ViewBuilder::home()
        .callback_id(HOME_CALLBACK_ID)
        .section(|section| {
            section.mrkdwn("*Welcome to your _App's Home_* :tada:");
        })
        .divider()
        .section(|section| {
            section.mrkdwn(
                "This button won't do much for now but you can set up a listener for it using \
                 the `actions()` method and passing its unique `action_id`. See an example in \
                 the `examples` folder within your Bolt app.",
            );
        })
        .actions(|actions| {
            actions.button(ButtonElement::new(TextObject::plain("Click me!")));
        })
        .build()
}

pub fn home_greeting_view(user_id: &str) -> View {
    ViewBuilder::home()
        .section(|section| {
            section.mrkdwn(format!("*Welcome home, <@{user_id}> :house:*"));
        })
        .section(|section| {
            section.mrkdwn(
                "Learn how home tabs can be more useful and interactive \
                 <https://api.slack.com/surfaces/tabs/using|*in the documentation*>.",
            );
        })
        .build()
}

pub fn button_prompt_message(user_id: &str) -> MessageTemplate {
    MessageBuilder::new(format!("Thanks for the mention <@{user_id}>!"))
        .section(|section| {
            section
                .mrkdwn(format!("Thanks for the mention <@{user_id}>! Click my fancy button"))
                .button(
                    ButtonElement::new(TextObject::plain_emoji("Button"))
                        .value("click_me_123")
                        .action_id(FIRST_BUTTON_ACTION_ID),
                );
        })
        .build()
}

pub fn ticket_modal() -> View {
    ViewBuilder::modal(TextObject::plain("Modal title"))
        .callback_id(TICKET_MODAL_CALLBACK_ID)
        .section(|section| {
            section.mrkdwn("Welcome to a modal with _blocks_").button(
                ButtonElement::new(TextObject::plain("Click me!"))
                    .action_id(MODAL_BUTTON_ACTION_ID),
            );
        })
        .input(
            Some("input_c"),
            TextObject::plain("What are your hopes and dreams?"),
            InputElement::PlainTextInput { action_id: "dreamy_input".to_owned(), multiline: true },
        )
        .submit(TextObject::plain("Submit"))
        .build()
}

pub fn updated_ticket_modal() -> View {
    ViewBuilder::modal(TextObject::plain("Updated modal"))
        .callback_id(TICKET_MODAL_CALLBACK_ID)
        .section(|section| {
            section.plain("You updated the modal!");
        })
        .image(UPDATED_MODAL_IMAGE_URL, "Yay! The modal was updated")
        .build()
}

pub fn onboarding_message() -> MessageTemplate {
    MessageBuilder::new("Welcome to You360")
        .section(|section| {
            section.mrkdwn("Hi there :wave:");
        })
        .section(|section| {
            section.mrkdwn(
                "Great to see you here! App helps you to stay up-to-date with your meetings and \
                 events right here within Slack. These are just a few things which you will be \
                 able to do:",
            );
        })
        .section(|section| {
            section.mrkdwn(
                "• Schedule meetings \n • Manage and update attendees \n • Get notified about \
                 changes of your meetings",
            );
        })
        .section(|section| {
            section.mrkdwn(
                "But before you can do all these amazing things, we need you to connect your \
                 calendar to App. Simply click the button below:",
            );
        })
        .actions(|actions| {
            actions.button(
                ButtonElement::new(TextObject::plain_emoji("Connect account")).value("click_me_123"),
            );
        })
        .input(
            None,
            TextObject::plain_emoji("Label"),
            InputElement::Timepicker {
                action_id: "timepicker-action".to_owned(),
                initial_time: Some("13:37".to_owned()),
                placeholder: Some(TextObject::plain_emoji("Select time")),
            },
        )
        .section(|section| {
            section.mrkdwn("Test block with multi conversations select").accessory(
                Accessory::MultiConversationsSelect(MultiConversationsSelect {
                    placeholder: TextObject::plain_emoji("Select conversations"),
                    action_id: "multi_conversations_select-action".to_owned(),
                }),
            );
        })
        .build()
}

pub fn button_clicked_message() -> MessageTemplate {
    MessageBuilder::new("Message from Test App")
        .section(|section| {
            section.mrkdwn("*The button was clicked!*");
        })
        .build()
}
