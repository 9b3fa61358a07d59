//! Telegram adapter
//!
//! The only module that knows the Bot API exists. [`TelegramTransport`]
//! implements the outbound [`ChatTransport`] seam; [`TelegramPoller`] runs
//! the getUpdates long-poll loop and maps each update onto the relay's
//! inbound types. Everything past this file speaks [`InboundContent`] and
//! [`Command`], never Telegram.

use crate::normalize::InboundContent;
use crate::relay::{Command, MessageRelay, SenderProfile};
use crate::transport::{ChatTransport, TransportError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Long-poll hold time the server is asked for, seconds
const POLL_TIMEOUT_SECS: u64 = 30;
/// Pause after a failed poll before retrying
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

// ========== Bot API payloads (the subset we read) ==========

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    from: Option<TgUser>,
    chat: Chat,
    text: Option<String>,
    caption: Option<String>,
    photo: Option<Vec<PhotoSize>>,
    sticker: Option<Sticker>,
    document: Option<Document>,
    contact: Option<Contact>,
    location: Option<Location>,
    poll: Option<Poll>,
    audio: Option<serde_json::Value>,
    voice: Option<serde_json::Value>,
    video: Option<serde_json::Value>,
    video_note: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    first_name: String,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct PhotoSize {
    file_id: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct Sticker {
    file_id: String,
    #[serde(default)]
    is_animated: bool,
    #[serde(default)]
    is_video: bool,
}

#[derive(Debug, Deserialize)]
struct Document {
    file_id: String,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Contact {
    phone_number: String,
    first_name: String,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct Poll {
    question: String,
    options: Vec<PollOption>,
}

#[derive(Debug, Deserialize)]
struct PollOption {
    text: String,
}

#[derive(Debug, Deserialize)]
struct TgFile {
    file_path: Option<String>,
}

// ========== Outbound transport ==========

/// Bot API client for the outbound side
pub struct TelegramTransport {
    client: reqwest::Client,
    token: String,
}

impl TelegramTransport {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.token, method)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TransportError> {
        let resp = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError(format!("{} request failed: {}", method, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(TransportError(format!(
                "{} returned {}: {}",
                method, status, text
            )));
        }

        let parsed: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| TransportError(format!("{} invalid response: {}", method, e)))?;

        if !parsed.ok {
            let msg = parsed.description.unwrap_or_else(|| "unknown".to_string());
            return Err(TransportError(format!("{} rejected: {}", method, msg)));
        }
        parsed
            .result
            .ok_or_else(|| TransportError(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn reply(&self, recipient: i64, text: &str) -> Result<(), TransportError> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                json!({ "chat_id": recipient, "text": text }),
            )
            .await?;
        Ok(())
    }

    async fn fetch_attachment(&self, reference: &str) -> Result<Vec<u8>, TransportError> {
        let file: TgFile = self
            .call("getFile", json!({ "file_id": reference }))
            .await?;
        let path = file
            .file_path
            .ok_or_else(|| TransportError("getFile returned no file_path".to_string()))?;

        let resp = self
            .client
            .get(format!(
                "https://api.telegram.org/file/bot{}/{}",
                self.token, path
            ))
            .send()
            .await
            .map_err(|e| TransportError(format!("file download failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(TransportError(format!(
                "file download returned {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransportError(format!("file download failed: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

// ========== Inbound poller ==========

/// getUpdates long-poll loop feeding the relay
pub struct TelegramPoller {
    transport: Arc<TelegramTransport>,
    relay: Arc<MessageRelay>,
    shutdown: CancellationToken,
}

impl TelegramPoller {
    pub fn new(
        transport: Arc<TelegramTransport>,
        relay: Arc<MessageRelay>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            transport,
            relay,
            shutdown,
        }
    }

    /// Run until the shutdown token fires. Poll failures are logged and
    /// retried; the loop never exits on its own.
    pub async fn run(&self) {
        info!("telegram poller started");
        let mut offset: i64 = 0;

        loop {
            let poll = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("telegram poller stopping");
                    return;
                }
                result = self.fetch_updates(offset) => result,
            };

            let updates = match poll {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "getUpdates failed, retrying");
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return,
                        _ = tokio::time::sleep(POLL_RETRY_DELAY) => continue,
                    }
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                if let Some(message) = update.message {
                    self.dispatch(message).await;
                }
            }
        }
    }

    async fn fetch_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        self.transport
            .call(
                "getUpdates",
                json!({ "offset": offset, "timeout": POLL_TIMEOUT_SECS }),
            )
            .await
    }

    /// Map one message onto the relay. Errors end with this update; the
    /// poll loop keeps going.
    async fn dispatch(&self, message: Message) {
        let Some(sender) = sender_profile(&message) else {
            debug!("update without a sender, skipped");
            return;
        };

        // Commands bypass the content pipeline
        if let Some(text) = message.text.as_deref() {
            if text.starts_with('/') {
                match parse_command(text) {
                    Some(cmd) => {
                        if let Err(e) = self.relay.handle_command(&sender, cmd).await {
                            error!(sender = sender.id, error = %e, "command handling failed");
                        }
                    }
                    None => {
                        if let Err(e) = self
                            .transport
                            .reply(message.chat.id, "Unknown command, see /help")
                            .await
                        {
                            warn!(error = %e, "could not reply to unknown command");
                        }
                    }
                }
                return;
            }
        }

        let Some(content) = inbound_content(message) else {
            debug!(sender = sender.id, "unsupported update content, skipped");
            return;
        };

        if let Err(e) = self.relay.handle_inbound(&sender, content).await {
            error!(sender = sender.id, error = %e, "message handling failed");
        }
    }
}

/// Resolve the sender without consuming the message, which is still needed
/// whole for content mapping
fn sender_profile(message: &Message) -> Option<SenderProfile> {
    message.from.as_ref().map(|from| SenderProfile {
        id: from.id,
        display_name: display_name(from),
    })
}

fn display_name(user: &TgUser) -> String {
    match &user.last_name {
        Some(last) => format!("{} {}", user.first_name, last),
        None => user.first_name.clone(),
    }
}

/// Map a Bot API message onto relay content. Returns `None` for updates
/// with nothing printable or acknowledgeable in them.
fn inbound_content(message: Message) -> Option<InboundContent> {
    if let Some(photo) = message.photo {
        // Telegram sends every thumbnail size; take the largest
        let best = photo.into_iter().max_by_key(|p| p.width * p.height)?;
        return Some(InboundContent::Image {
            attachment: best.file_id,
            caption: message.caption,
            animated: false,
        });
    }

    if let Some(sticker) = message.sticker {
        return Some(InboundContent::Image {
            attachment: sticker.file_id,
            caption: None,
            animated: sticker.is_animated || sticker.is_video,
        });
    }

    if let Some(document) = message.document {
        // Image files sent "as file" still print; everything else is
        // acknowledged as unsupported
        let is_image = document
            .mime_type
            .as_deref()
            .is_some_and(|m| m.starts_with("image/"));
        return Some(if is_image {
            InboundContent::Image {
                attachment: document.file_id,
                caption: message.caption,
                animated: false,
            }
        } else {
            InboundContent::Document
        });
    }

    if let Some(contact) = message.contact {
        return Some(InboundContent::Contact {
            first_name: contact.first_name,
            last_name: contact.last_name,
            phone: contact.phone_number,
        });
    }

    if let Some(location) = message.location {
        return Some(InboundContent::Location {
            latitude: location.latitude,
            longitude: location.longitude,
        });
    }

    if let Some(poll) = message.poll {
        return Some(InboundContent::Poll {
            question: poll.question,
            options: poll.options.into_iter().map(|o| o.text).collect(),
        });
    }

    if message.audio.is_some() || message.voice.is_some() {
        return Some(InboundContent::Audio);
    }
    if message.video.is_some() || message.video_note.is_some() {
        return Some(InboundContent::Video);
    }

    message.text.map(InboundContent::Text)
}

/// Parse a slash command. `/cmd@BotName arg` forms are accepted.
fn parse_command(text: &str) -> Option<Command> {
    let mut parts = text.split_whitespace();
    let head = parts.next()?;
    let name = head.split('@').next()?;
    let arg = parts.next();

    match name {
        "/start" => Some(Command::Start),
        "/help" => Some(Command::Help),
        "/stats" => Some(Command::Stats),
        "/anonymous" => match arg {
            None => Some(Command::Anonymous(None)),
            Some("true") => Some(Command::Anonymous(Some(true))),
            Some("false") => Some(Command::Anonymous(Some(false))),
            Some(_) => None,
        },
        "/listusers" => Some(Command::ListUsers),
        "/givepermission" => parse_id_arg(arg).map(Command::GivePermission),
        "/removepermission" => parse_id_arg(arg).map(Command::RemovePermission),
        "/printqueue" => Some(Command::PrintQueue),
        "/clearqueue" => Some(Command::ClearQueue),
        _ => None,
    }
}

/// `None` arg means "default target"; a present but unparsable id is a
/// malformed command
fn parse_id_arg(arg: Option<&str>) -> Option<Option<i64>> {
    match arg {
        None => Some(None),
        Some(raw) => raw.parse().ok().map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command("/help@SkaldBot"), Some(Command::Help));
        assert_eq!(
            parse_command("/anonymous true"),
            Some(Command::Anonymous(Some(true)))
        );
        assert_eq!(parse_command("/anonymous"), Some(Command::Anonymous(None)));
        assert_eq!(
            parse_command("/givepermission 42"),
            Some(Command::GivePermission(Some(42)))
        );
        assert_eq!(
            parse_command("/removepermission"),
            Some(Command::RemovePermission(None))
        );
        assert_eq!(parse_command("/givepermission bogus"), None);
        assert_eq!(parse_command("/frobnicate"), None);
    }

    #[test]
    fn test_largest_photo_size_wins() {
        let message = Message {
            from: None,
            chat: Chat { id: 1 },
            text: None,
            caption: Some("look".to_string()),
            photo: Some(vec![
                PhotoSize {
                    file_id: "small".to_string(),
                    width: 90,
                    height: 60,
                },
                PhotoSize {
                    file_id: "big".to_string(),
                    width: 1280,
                    height: 960,
                },
            ]),
            sticker: None,
            document: None,
            contact: None,
            location: None,
            poll: None,
            audio: None,
            voice: None,
            video: None,
            video_note: None,
        };

        match inbound_content(message) {
            Some(InboundContent::Image {
                attachment,
                caption,
                animated,
            }) => {
                assert_eq!(attachment, "big");
                assert_eq!(caption.as_deref(), Some("look"));
                assert!(!animated);
            }
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_animated_sticker_flagged() {
        let message = Message {
            from: None,
            chat: Chat { id: 1 },
            text: None,
            caption: None,
            photo: None,
            sticker: Some(Sticker {
                file_id: "anim".to_string(),
                is_animated: true,
                is_video: false,
            }),
            document: None,
            contact: None,
            location: None,
            poll: None,
            audio: None,
            voice: None,
            video: None,
            video_note: None,
        };

        match inbound_content(message) {
            Some(InboundContent::Image { animated, .. }) => assert!(animated),
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_sender_and_content_from_one_update() {
        let message = Message {
            from: Some(TgUser {
                id: 7,
                first_name: "Ada".to_string(),
                last_name: Some("Lovelace".to_string()),
            }),
            chat: Chat { id: 7 },
            text: Some("hello".to_string()),
            caption: None,
            photo: None,
            sticker: None,
            document: None,
            contact: None,
            location: None,
            poll: None,
            audio: None,
            voice: None,
            video: None,
            video_note: None,
        };

        // Sender first, content second, off the same message
        let sender = sender_profile(&message).unwrap();
        assert_eq!(sender.id, 7);
        assert_eq!(sender.display_name, "Ada Lovelace");

        match inbound_content(message) {
            Some(InboundContent::Text(text)) => assert_eq!(text, "hello"),
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_update_payload_decodes() {
        let raw = r#"{
            "ok": true,
            "result": [{
                "update_id": 12,
                "message": {
                    "message_id": 5,
                    "from": {"id": 7, "is_bot": false, "first_name": "Ada", "last_name": "Lovelace"},
                    "chat": {"id": 7, "type": "private"},
                    "text": "hello"
                }
            }]
        }"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        assert!(parsed.ok);
        let updates = parsed.result.unwrap();
        assert_eq!(updates[0].update_id, 12);
        let msg = updates[0].message.as_ref().unwrap();
        assert_eq!(msg.from.as_ref().unwrap().id, 7);
        assert_eq!(display_name(msg.from.as_ref().unwrap()), "Ada Lovelace");
    }
}
