//! Message relay - the pipeline entry points
//!
//! `handle_inbound` runs one message through the gate, normalizer, durable
//! queue and the immediate print attempt. `handle_command` serves the user
//! and admin commands. Every rejection path sends exactly one reply; every
//! device failure sends one reply and one admin notification, and the
//! message stays in the backlog for an explicit replay.

use crate::error::{Rejection, RelayError, RelayResult};
use crate::normalize::{InboundContent, NormalizeError, Normalizer, Outcome};
use crate::printing::{BacklogIndicator, PrintEngine, PrintFailure};
use crate::queue::{MessageQueue, QueuedMessage};
use crate::registry::{RegistryError, UserRegistry};
use crate::store::{MessageKind, Stats};
use crate::transport::ChatTransport;
use chrono::Utc;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{error, info, warn};

const GREETING: &str = "Hi! This is Skald the receipt printer. The bot is named after the old \
     Norse court poets. Here's some info about the bot:";

const HELP_TEXT: &str = "Everything sent to this bot will be printed on a thermal receipt printer.\n\n\
    Currently the following message types are supported:\n\
    - Text (emojis are printed as their description, like [FLUSHED FACE] or [SNOWMAN WITHOUT SNOW]. \
    When the text contains a url, a QR code pointing to it is printed after the text.)\n\
    - Images (non-animated stickers also work)\n\
    - Contacts\n\
    - Polls (votes are not printed)\n\
    - Location (prints latitude, longitude and a QR code to the map)\n\n\
    Things the printer can't print:\n\
    - Voice messages\n\
    - Videos (including animated stickers)\n\
    - Documents\n\n\
    The bot supports the following commands:\n  \
    /help - Prints this message\n  \
    /start - Prints hi and then this message\n  \
    /stats - Prints stats about the printer\n  \
    /anonymous - Check/Enable/Disable anonymous mode. In anonymous mode your name isn't \
    printed above your message";

const ADMIN_HELP_TEXT: &str = "You are the admin, so you can also use:\n  \
    /listusers - Lists all users with their names, id and permission to print\n  \
    /givepermission [id] - Gives a user permission to print. Defaults to the last registered user\n  \
    /removepermission [id] - Revokes permission to print. Defaults to the last registered user\n  \
    /printqueue - Prints every unprinted message in the backlog\n  \
    /clearqueue - Marks the whole backlog as printed without printing it";

const PRINT_FAILED_REPLY: &str =
    "Failed to print your message :( There appears to be something wrong...";

const NOT_ALLOWED_REPLY: &str = "You are not allowed to use this command";

/// Sender identity as reported by the chat transport for one update
#[derive(Debug, Clone)]
pub struct SenderProfile {
    pub id: i64,
    pub display_name: String,
}

/// Parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    Stats,
    Anonymous(Option<bool>),
    ListUsers,
    GivePermission(Option<i64>),
    RemovePermission(Option<i64>),
    PrintQueue,
    ClearQueue,
}

/// The relay core, one per process
pub struct MessageRelay {
    registry: UserRegistry,
    queue: Arc<MessageQueue>,
    engine: Arc<PrintEngine>,
    normalizer: Normalizer,
    indicator: Arc<BacklogIndicator>,
    transport: Arc<dyn ChatTransport>,
    admin_id: i64,
}

impl MessageRelay {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: UserRegistry,
        queue: Arc<MessageQueue>,
        engine: Arc<PrintEngine>,
        normalizer: Normalizer,
        indicator: Arc<BacklogIndicator>,
        transport: Arc<dyn ChatTransport>,
        admin_id: i64,
    ) -> Self {
        Self {
            registry,
            queue,
            engine,
            normalizer,
            indicator,
            transport,
            admin_id,
        }
    }

    /// Single entry point for inbound printable content
    pub async fn handle_inbound(
        &self,
        sender: &SenderProfile,
        content: InboundContent,
    ) -> RelayResult<()> {
        let now = Utc::now();

        // Spam gate first: unregistered senders are rejected, not counted
        if let Some(rejection) = self.registry.check_throttle(sender.id, now)? {
            self.transport.reply(sender.id, &rejection.to_string()).await?;
            return Ok(());
        }

        // The gate passed, so the sender is on the roster; an empty lookup
        // here is an internal inconsistency, not a user-facing rejection
        let resolved = self
            .registry
            .lookup(sender.id, &sender.display_name)?
            .ok_or(RegistryError::NotFound)?;

        if !resolved.permission_to_print {
            self.transport
                .reply(sender.id, &Rejection::Forbidden.to_string())
                .await?;
            return Ok(());
        }

        info!(sender = sender.id, name = %resolved.name, "message accepted for printing");

        // Fetch the attachment only after the gates
        let attachment = match content.attachment_ref() {
            Some(reference) => Some(self.transport.fetch_attachment(reference).await?),
            None => None,
        };

        let unit = match self.normalizer.normalize(&content, attachment.as_deref()) {
            Ok(Outcome::Printable(unit)) => unit,
            Ok(Outcome::Acknowledge(text)) => {
                self.transport.reply(sender.id, text).await?;
                return Ok(());
            }
            Err(e @ (NormalizeError::Animated | NormalizeError::Decode(_))) => {
                let rejection = Rejection::Unprintable(e.to_string());
                self.transport.reply(sender.id, &rejection.to_string()).await?;
                return Ok(());
            }
            Err(NormalizeError::Spool(e)) => return Err(RelayError::Spool(e)),
            Err(NormalizeError::MissingAttachment) => {
                return Err(RelayError::Transport(
                    "attachment was not fetched".to_string(),
                ));
            }
        };

        // Durable first, printer second: past this point the message can
        // only degrade to unprinted backlog, never to loss
        let msg = QueuedMessage::new(now, &resolved.name, unit);
        self.queue.enqueue(msg.clone())?;

        self.attempt_print(&msg, sender.id).await
    }

    /// Immediate print attempt for a freshly queued message
    async fn attempt_print(&self, msg: &QueuedMessage, sender_id: i64) -> RelayResult<()> {
        match self.engine.print(msg).await {
            Ok(()) => {
                self.queue.mark_printed(&msg.id)?;
                self.registry_store_record(msg.kind)?;
                self.transport.reply(sender_id, printed_reply(msg.kind)).await?;
                if self.queue.backlog_len()? == 0 {
                    self.indicator.stop();
                }
                Ok(())
            }
            Err(e) => {
                error!(id = %msg.id, error = %e, "print transaction failed, message kept in backlog");
                self.transport.reply(sender_id, PRINT_FAILED_REPLY).await?;
                self.transport
                    .notify(
                        self.admin_id,
                        &format!(
                            "Failed to print a {} message from {}.",
                            msg.kind, msg.sender_name
                        ),
                    )
                    .await?;
                self.indicator.start();
                Ok(())
            }
        }
    }

    /// Entry point for parsed commands
    pub async fn handle_command(&self, sender: &SenderProfile, cmd: Command) -> RelayResult<()> {
        match cmd {
            Command::Start => self.cmd_start(sender).await,
            Command::Help => self.cmd_help(sender).await,
            Command::Stats => self.cmd_stats(sender).await,
            Command::Anonymous(value) => self.cmd_anonymous(sender, value).await,
            Command::ListUsers => self.cmd_list_users(sender).await,
            Command::GivePermission(target) => self.cmd_set_permission(sender, target, true).await,
            Command::RemovePermission(target) => {
                self.cmd_set_permission(sender, target, false).await
            }
            Command::PrintQueue => self.cmd_print_queue(sender).await,
            Command::ClearQueue => self.cmd_clear_queue(sender).await,
        }
    }

    async fn cmd_start(&self, sender: &SenderProfile) -> RelayResult<()> {
        let outcome = self.registry.register(sender.id, &sender.display_name)?;
        if outcome.already_registered {
            self.transport
                .reply(sender.id, "You are already registered")
                .await?;
            return Ok(());
        }

        self.transport.reply(sender.id, GREETING).await?;
        self.cmd_help(sender).await?;
        self.transport
            .notify(
                self.admin_id,
                &format!("{} ({}) started the bot.", sender.display_name, sender.id),
            )
            .await?;
        Ok(())
    }

    async fn cmd_help(&self, sender: &SenderProfile) -> RelayResult<()> {
        self.transport.reply(sender.id, HELP_TEXT).await?;
        if self.registry.is_admin(sender.id)? {
            self.transport.reply(sender.id, ADMIN_HELP_TEXT).await?;
        }
        Ok(())
    }

    async fn cmd_stats(&self, sender: &SenderProfile) -> RelayResult<()> {
        let stats = self.registry_store_stats()?;
        let text = format!(
            "Total amount of messages printed: {}\n\
             Text messages printed: {}\n\
             Images printed: {}\n\
             Contacts printed: {}\n\
             Polls printed: {}\n\
             Locations printed: {}",
            stats.total_prints,
            stats.text_prints,
            stats.image_prints,
            stats.contact_prints,
            stats.poll_prints,
            stats.location_prints,
        );
        self.transport.reply(sender.id, &text).await?;
        Ok(())
    }

    async fn cmd_anonymous(&self, sender: &SenderProfile, value: Option<bool>) -> RelayResult<()> {
        match value {
            None => {
                let Some(user) = self.registry.get(sender.id)? else {
                    self.transport
                        .reply(sender.id, &Rejection::Unregistered.to_string())
                        .await?;
                    return Ok(());
                };
                self.transport
                    .reply(
                        sender.id,
                        &format!(
                            "Anonymous: {}\nYou can enable or disable anonymous messages \
                             with /anonymous true/false",
                            user.anonymous
                        ),
                    )
                    .await?;
            }
            Some(v) => match self.registry.set_anonymous(sender.id, v) {
                Ok(current) => {
                    self.transport
                        .reply(sender.id, &format!("Anonymous setting set to: {}", current))
                        .await?;
                }
                Err(RegistryError::NotFound) => {
                    self.transport
                        .reply(sender.id, &Rejection::Unregistered.to_string())
                        .await?;
                }
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }

    async fn cmd_list_users(&self, sender: &SenderProfile) -> RelayResult<()> {
        if !self.require_admin(sender).await? {
            return Ok(());
        }

        let mut text = String::from("Name | User ID | Permission to print\n");
        for user in self.registry.list()? {
            let _ = writeln!(
                text,
                "{} | {} | {}",
                user.name, user.id, user.permission_to_print
            );
        }
        self.transport.reply(sender.id, text.trim_end()).await?;
        Ok(())
    }

    async fn cmd_set_permission(
        &self,
        sender: &SenderProfile,
        target: Option<i64>,
        granted: bool,
    ) -> RelayResult<()> {
        if !self.require_admin(sender).await? {
            return Ok(());
        }

        let target = match target {
            Some(id) => id,
            None => self.registry.last_registered()?,
        };

        match self.registry.set_permission(target, granted) {
            Ok(name) => {
                let user_note = if granted {
                    "You now have permission to print :D"
                } else {
                    "You no longer have permission to print..."
                };
                if let Err(e) = self.transport.reply(target, user_note).await {
                    warn!(target, error = %e, "could not notify user of permission change");
                }
                self.transport
                    .reply(
                        sender.id,
                        &format!("Permission to print of {} set to {}", name, granted),
                    )
                    .await?;
            }
            Err(RegistryError::NotFound) => {
                self.transport.reply(sender.id, "User id not found").await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Replay the backlog: the durable-retry path after device failures
    async fn cmd_print_queue(&self, sender: &SenderProfile) -> RelayResult<()> {
        if !self.require_admin(sender).await? {
            return Ok(());
        }

        let backlog = self.queue.list_unprinted()?;
        if backlog.is_empty() {
            self.transport.reply(sender.id, "The backlog is empty").await?;
            return Ok(());
        }

        let mut printed = 0usize;
        let mut skipped = 0usize;
        for msg in &backlog {
            match self.engine.print(msg).await {
                Ok(()) => {
                    self.queue.mark_printed(&msg.id)?;
                    self.registry_store_record(msg.kind)?;
                    printed += 1;
                }
                // An unreadable spool file is permanent for that entry and
                // says nothing about the device; it must not pin the rest
                // of the backlog.
                Err(e @ PrintFailure::Spool { .. }) => {
                    error!(id = %msg.id, error = %e, "skipping backlog entry with unreadable spool file");
                    skipped += 1;
                }
                Err(e) => {
                    error!(id = %msg.id, error = %e, "backlog replay stopped on device failure");
                    self.transport
                        .reply(
                            sender.id,
                            &format!(
                                "Printed {} of {} queued messages, then the printer failed: {}",
                                printed,
                                backlog.len(),
                                e
                            ),
                        )
                        .await?;
                    return Ok(());
                }
            }
        }

        if self.queue.backlog_len()? == 0 {
            self.indicator.stop();
        }
        let summary = if skipped > 0 {
            format!(
                "Printed {} queued messages, skipped {} with unreadable image files",
                printed, skipped
            )
        } else {
            format!("Printed {} queued messages", printed)
        };
        self.transport.reply(sender.id, &summary).await?;
        Ok(())
    }

    async fn cmd_clear_queue(&self, sender: &SenderProfile) -> RelayResult<()> {
        if !self.require_admin(sender).await? {
            return Ok(());
        }

        let flipped = self.queue.mark_all_printed()?;
        self.indicator.stop();
        self.transport
            .reply(
                sender.id,
                &format!("Marked {} queued messages as printed", flipped),
            )
            .await?;
        Ok(())
    }

    async fn require_admin(&self, sender: &SenderProfile) -> RelayResult<bool> {
        if self.registry.is_admin(sender.id)? {
            Ok(true)
        } else {
            self.transport.reply(sender.id, NOT_ALLOWED_REPLY).await?;
            Ok(false)
        }
    }

    fn registry_store_record(&self, kind: MessageKind) -> RelayResult<()> {
        self.registry.store().record_print(kind)?;
        Ok(())
    }

    fn registry_store_stats(&self) -> RelayResult<Stats> {
        Ok(self.registry.store().stats()?)
    }

    /// Number of unprinted messages (startup indicator decision)
    pub fn backlog_len(&self) -> RelayResult<usize> {
        Ok(self.queue.backlog_len()?)
    }
}

fn printed_reply(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Text => "Printed!",
        MessageKind::Image => "Image printed!",
        MessageKind::Contact => "Contact printed",
        MessageKind::Location => "Location printed",
        MessageKind::Poll => "Poll printed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RosterStore;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use skald_printer::{DeviceError, DeviceResult, DeviceSession, ReceiptDevice};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration as StdDuration;

    const ADMIN: i64 = 1;

    /// Records every outgoing reply as (recipient, text)
    #[derive(Default)]
    struct FakeTransport {
        sent: StdMutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        async fn reply(&self, recipient: i64, text: &str) -> Result<(), TransportError> {
            self.sent
                .lock()
                .unwrap()
                .push((recipient, text.to_string()));
            Ok(())
        }

        async fn fetch_attachment(&self, _reference: &str) -> Result<Vec<u8>, TransportError> {
            Err(TransportError("no attachments in this fake".to_string()))
        }
    }

    impl FakeTransport {
        fn sent_to(&self, recipient: i64) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(r, _)| *r == recipient)
                .map(|(_, t)| t.clone())
                .collect()
        }
    }

    /// Device whose sessions fail every write while `broken` is set
    struct SwitchableDevice {
        broken: Arc<AtomicBool>,
        writes: Arc<StdMutex<usize>>,
    }

    impl SwitchableDevice {
        fn new(broken: bool) -> Self {
            Self {
                broken: Arc::new(AtomicBool::new(broken)),
                writes: Arc::new(StdMutex::new(0)),
            }
        }
    }

    #[async_trait]
    impl ReceiptDevice for SwitchableDevice {
        async fn open(&self) -> DeviceResult<Box<dyn DeviceSession>> {
            Ok(Box::new(SwitchableSession {
                broken: self.broken.load(Ordering::SeqCst),
                writes: self.writes.clone(),
            }))
        }

        async fn is_online(&self) -> bool {
            !self.broken.load(Ordering::SeqCst)
        }
    }

    struct SwitchableSession {
        broken: bool,
        writes: Arc<StdMutex<usize>>,
    }

    #[async_trait]
    impl DeviceSession for SwitchableSession {
        async fn write(&mut self, _data: &[u8]) -> DeviceResult<()> {
            if self.broken {
                return Err(DeviceError::Connection("printer unplugged".to_string()));
            }
            *self.writes.lock().unwrap() += 1;
            Ok(())
        }

        async fn close(self: Box<Self>) -> DeviceResult<()> {
            Ok(())
        }
    }

    struct Harness {
        relay: MessageRelay,
        transport: Arc<FakeTransport>,
        device: Arc<SwitchableDevice>,
        queue: Arc<MessageQueue>,
        registry: UserRegistry,
        _dir: tempfile::TempDir,
    }

    fn harness(broken_device: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RosterStore::open(dir.path().join("saves.json"), ADMIN).unwrap());
        let registry = UserRegistry::new(store, true);
        let queue = Arc::new(MessageQueue::open(dir.path().join("backlog.json")).unwrap());
        let device = Arc::new(SwitchableDevice::new(broken_device));
        let engine = Arc::new(
            PrintEngine::new(device.clone(), 48).with_settle(StdDuration::ZERO),
        );
        let indicator = Arc::new(BacklogIndicator::new(
            engine.clone(),
            StdDuration::from_secs(60),
        ));
        let transport = Arc::new(FakeTransport::default());
        let relay = MessageRelay::new(
            registry.clone(),
            queue.clone(),
            engine,
            Normalizer::new(dir.path().join("spool")),
            indicator,
            transport.clone(),
            ADMIN,
        );
        Harness {
            relay,
            transport,
            device,
            queue,
            registry,
            _dir: dir,
        }
    }

    fn sender(id: i64) -> SenderProfile {
        SenderProfile {
            id,
            display_name: format!("User {}", id),
        }
    }

    #[tokio::test]
    async fn test_unregistered_sender_rejected() {
        let h = harness(false);
        h.relay
            .handle_inbound(&sender(7), InboundContent::Text("hi".to_string()))
            .await
            .unwrap();

        let replies = h.transport.sent_to(7);
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("/start"));
        assert_eq!(h.queue.backlog_len().unwrap(), 0);
        assert_eq!(*h.device.writes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_forbidden_sender_never_touches_device() {
        let h = harness(false);
        h.registry.register(7, "User 7").unwrap();
        h.registry.set_permission(7, false).unwrap();

        h.relay
            .handle_inbound(&sender(7), InboundContent::Text("hi".to_string()))
            .await
            .unwrap();

        let replies = h.transport.sent_to(7);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0], Rejection::Forbidden.to_string());
        assert_eq!(h.queue.backlog_len().unwrap(), 0);
        assert_eq!(*h.device.writes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_text_printed_and_counted() {
        let h = harness(false);
        h.registry.register(7, "User 7").unwrap();

        h.relay
            .handle_inbound(&sender(7), InboundContent::Text("hello printer".to_string()))
            .await
            .unwrap();

        assert_eq!(h.transport.sent_to(7), vec!["Printed!".to_string()]);
        assert_eq!(h.queue.backlog_len().unwrap(), 0);
        let stats = h.registry.store().stats().unwrap();
        assert_eq!(stats.total_prints, 1);
        assert_eq!(stats.text_prints, 1);
    }

    #[tokio::test]
    async fn test_device_failure_keeps_backlog_and_notifies_admin() {
        let h = harness(true);
        h.registry.register(7, "User 7").unwrap();

        h.relay
            .handle_inbound(&sender(7), InboundContent::Text("hello".to_string()))
            .await
            .unwrap();

        assert_eq!(h.transport.sent_to(7), vec![PRINT_FAILED_REPLY.to_string()]);
        let admin_msgs = h.transport.sent_to(ADMIN);
        assert_eq!(admin_msgs.len(), 1);
        assert!(admin_msgs[0].contains("Failed to print a text message"));

        // Still durable; nothing counted as printed
        assert_eq!(h.queue.backlog_len().unwrap(), 1);
        assert_eq!(h.registry.store().stats().unwrap().total_prints, 0);
    }

    #[tokio::test]
    async fn test_print_queue_replays_backlog() {
        let h = harness(true);
        h.registry.register(7, "User 7").unwrap();

        h.relay
            .handle_inbound(&sender(7), InboundContent::Text("one".to_string()))
            .await
            .unwrap();
        assert_eq!(h.queue.backlog_len().unwrap(), 1);

        // Printer comes back; admin replays
        h.device.broken.store(false, Ordering::SeqCst);
        h.relay
            .handle_command(&sender(ADMIN), Command::PrintQueue)
            .await
            .unwrap();

        assert_eq!(h.queue.backlog_len().unwrap(), 0);
        assert_eq!(h.registry.store().stats().unwrap().total_prints, 1);
        let admin_msgs = h.transport.sent_to(ADMIN);
        assert!(admin_msgs.last().unwrap().contains("Printed 1 queued messages"));
    }

    #[tokio::test]
    async fn test_print_queue_skips_unreadable_spool_entries() {
        use crate::normalize::NormalizedMessage;

        let h = harness(false);
        h.registry.register(7, "User 7").unwrap();

        // An image entry whose spool file vanished, followed by a healthy
        // text entry
        let bad = QueuedMessage::new(
            chrono::Utc::now(),
            "User 7",
            NormalizedMessage {
                kind: MessageKind::Image,
                body: String::new(),
                qr: Vec::new(),
                image: Some(std::path::PathBuf::from("/nonexistent/gone.png")),
                caption: None,
            },
        );
        let good = QueuedMessage::new(
            chrono::Utc::now(),
            "User 7",
            NormalizedMessage {
                kind: MessageKind::Text,
                body: "still here".to_string(),
                qr: Vec::new(),
                image: None,
                caption: None,
            },
        );
        h.queue.enqueue(bad.clone()).unwrap();
        h.queue.enqueue(good.clone()).unwrap();

        h.relay
            .handle_command(&sender(ADMIN), Command::PrintQueue)
            .await
            .unwrap();

        // The bad entry did not pin the good one behind it
        let remaining = h.queue.list_unprinted().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, bad.id);
        assert_eq!(h.registry.store().stats().unwrap().text_prints, 1);

        let admin_msgs = h.transport.sent_to(ADMIN);
        assert!(
            admin_msgs
                .last()
                .unwrap()
                .contains("Printed 1 queued messages, skipped 1")
        );
    }

    #[tokio::test]
    async fn test_admin_commands_gated() {
        let h = harness(false);
        h.registry.register(7, "User 7").unwrap();

        h.relay
            .handle_command(&sender(7), Command::ListUsers)
            .await
            .unwrap();

        assert_eq!(h.transport.sent_to(7), vec![NOT_ALLOWED_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn test_start_greets_and_notifies_admin() {
        let h = harness(false);

        h.relay
            .handle_command(&sender(7), Command::Start)
            .await
            .unwrap();

        let replies = h.transport.sent_to(7);
        assert_eq!(replies.len(), 2);
        assert!(replies[0].contains("Skald"));
        assert!(replies[1].contains("/anonymous"));
        let admin_msgs = h.transport.sent_to(ADMIN);
        assert_eq!(admin_msgs.len(), 1);
        assert!(admin_msgs[0].contains("started the bot"));
    }

    #[tokio::test]
    async fn test_anonymous_toggle() {
        let h = harness(false);
        h.registry.register(7, "User 7").unwrap();

        h.relay
            .handle_command(&sender(7), Command::Anonymous(Some(true)))
            .await
            .unwrap();
        assert!(h.registry.get(7).unwrap().unwrap().anonymous);
        assert_eq!(
            h.transport.sent_to(7),
            vec!["Anonymous setting set to: true".to_string()]
        );
    }

    #[tokio::test]
    async fn test_give_permission_defaults_to_last_registered() {
        let h = harness(false);
        h.registry.register(7, "User 7").unwrap();
        h.registry.set_permission(7, false).unwrap();

        h.relay
            .handle_command(&sender(ADMIN), Command::GivePermission(None))
            .await
            .unwrap();

        assert!(h.registry.get(7).unwrap().unwrap().permission_to_print);
        assert_eq!(
            h.transport.sent_to(7),
            vec!["You now have permission to print :D".to_string()]
        );
    }
}
