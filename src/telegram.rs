//! Minimal blocking client for the Telegram Bot API and the long-polling loop
//! that feeds updates to [`Bot`].

use std::thread::sleep;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::bot::{Bot, Format, Incoming, Reply, Request};
use crate::error::{Result, ToolError};
use crate::io::users::{UserId, UserStore};
use crate::source::DatasetSource;

const API_BASE: &str = "https://api.telegram.org";
const RETRY_PAUSE: Duration = Duration::from_secs(5);
/// Maximum message length accepted by `sendMessage`, in UTF-16 code units.
pub const MESSAGE_LIMIT: usize = 4096;
const SEND_FAILED: &str = "❗ Не вдалося надіслати відповідь. Спробуйте звузити запит.";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub first_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// An update reduced to what the dispatcher needs, plus where to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub chat_id: i64,
    pub callback_id: Option<String>,
    pub request: Request,
}

impl Envelope {
    /// Extracts a request from an update. Updates without text, sender, or
    /// chat are not actionable and yield `None`.
    pub fn from_update(update: &Update) -> Option<Self> {
        if let Some(message) = &update.message {
            let from = message.from.as_ref()?;
            let text = message.text.as_deref()?;
            return Some(Self {
                chat_id: message.chat.id,
                callback_id: None,
                request: Request {
                    user: from.id,
                    first_name: from.first_name.clone(),
                    input: Incoming::from_text(text),
                },
            });
        }

        let callback = update.callback_query.as_ref()?;
        let chat_id = callback.message.as_ref()?.chat.id;
        Some(Self {
            chat_id,
            callback_id: Some(callback.id.clone()),
            request: Request {
                user: callback.from.id,
                first_name: callback.from.first_name.clone(),
                input: Incoming::Callback(callback.data.clone().unwrap_or_default()),
            },
        })
    }
}

/// Builds the `sendMessage` payload for a reply.
pub fn send_message_payload(chat_id: i64, reply: &Reply) -> Value {
    let mut payload = json!({
        "chat_id": chat_id,
        "text": reply.text,
    });
    if reply.format == Format::Html {
        payload["parse_mode"] = json!("HTML");
    }
    if let Some(button) = &reply.button {
        payload["reply_markup"] = json!({
            "inline_keyboard": [[{
                "text": button.label,
                "callback_data": button.callback,
            }]]
        });
    }
    payload
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

/// Blocking Bot API client.
pub struct TelegramClient {
    http: HttpClient,
    base_url: String,
}

impl TelegramClient {
    /// `poll_timeout` is the long-polling window; the HTTP timeout is set a
    /// little above it.
    pub fn new(token: &str, poll_timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{API_BASE}/bot{token}"),
        })
    }

    fn call<P: Serialize, T: DeserializeOwned>(&self, method: &str, params: &P) -> Result<T> {
        let url = format!("{}/{method}", self.base_url);
        let response: ApiResponse<T> = self.http.post(url).json(params).send()?.json()?;
        into_result(method, response)
    }

    pub fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: timeout.as_secs(),
                allowed_updates: ["message", "callback_query"],
            },
        )
    }

    pub fn send_message(&self, chat_id: i64, reply: &Reply) -> Result<()> {
        let _: Value = self.call("sendMessage", &send_message_payload(chat_id, reply))?;
        Ok(())
    }

    pub fn answer_callback_query(&self, callback_id: &str) -> Result<()> {
        let _: Value = self.call(
            "answerCallbackQuery",
            &json!({ "callback_query_id": callback_id }),
        )?;
        Ok(())
    }
}

fn into_result<T>(method: &str, response: ApiResponse<T>) -> Result<T> {
    match response {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse { description, .. } => Err(ToolError::Telegram {
            method: method.to_string(),
            description: description.unwrap_or_else(|| "no description".into()),
        }),
    }
}

/// Splits a reply into messages of at most `limit` UTF-16 units, cutting on
/// line boundaries. Only a single line longer than `limit` is cut mid-line.
/// The button, if any, goes with the last message.
pub fn split_reply(reply: &Reply, limit: usize) -> Vec<Reply> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for line in reply.text.split_inclusive('\n') {
        for piece in split_line(line, limit) {
            let len = utf16_len(piece);
            if current_len + len > limit && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push_str(piece);
            current_len += len;
        }
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }

    let last = chunks.len() - 1;
    chunks
        .into_iter()
        .enumerate()
        .map(|(idx, text)| Reply {
            text,
            format: reply.format,
            button: if idx == last {
                reply.button.clone()
            } else {
                None
            },
        })
        .collect()
}

fn split_line(line: &str, limit: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut len = 0;
    for (idx, c) in line.char_indices() {
        let width = c.len_utf16();
        if len + width > limit && idx > start {
            pieces.push(&line[start..idx]);
            start = idx;
            len = 0;
        }
        len += width;
    }
    if start < line.len() || pieces.is_empty() {
        pieces.push(&line[start..]);
    }
    pieces
}

fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Polls for updates forever, handling each one to completion before the
/// next. Transport errors are logged and retried after a pause.
pub fn serve<S: UserStore, D: DatasetSource>(
    client: &TelegramClient,
    bot: &mut Bot<S, D>,
    poll_timeout: Duration,
) -> Result<()> {
    let mut offset = 0;
    info!("polling for updates");
    loop {
        let updates = match client.get_updates(offset, poll_timeout) {
            Ok(updates) => updates,
            Err(err) => {
                warn!(error = %err, "getUpdates failed, retrying");
                sleep(RETRY_PAUSE);
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(envelope) = Envelope::from_update(&update) else {
                debug!(update_id = update.update_id, "skipping update");
                continue;
            };
            dispatch(client, bot, &envelope);
        }
    }
}

fn dispatch<S: UserStore, D: DatasetSource>(
    client: &TelegramClient,
    bot: &mut Bot<S, D>,
    envelope: &Envelope,
) {
    if let Some(callback_id) = &envelope.callback_id {
        if let Err(err) = client.answer_callback_query(callback_id) {
            warn!(error = %err, "failed to answer callback query");
        }
    }

    let Some(reply) = bot.handle(&envelope.request) else {
        return;
    };
    for part in split_reply(&reply, MESSAGE_LIMIT) {
        if let Err(err) = client.send_message(envelope.chat_id, &part) {
            error!(error = %err, chat_id = envelope.chat_id, "failed to send reply");
            if let Err(err) = client.send_message(envelope.chat_id, &Reply::plain(SEND_FAILED)) {
                error!(error = %err, chat_id = envelope.chat_id, "failed to send fallback reply");
            }
            return;
        }
    }
}
