use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use snaps_types::models::{Channel, ChatMessage, UnreadCounts};

use crate::api::ChatApi;
use crate::timer::{Tick, TimerDriver, TokioTimer};
use crate::unread::aggregate;
use crate::ChatError;

/// Polling tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No session; no timer.
    Stopped,
    /// Chat screen open in the foreground.
    Active,
    /// Logged in, foreground, chat screen closed.
    Background,
    /// App in the background.
    Inactive,
}

/// Host events that can change the polling tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    AppForegrounded,
    AppBackgrounded,
    ChatOpened,
    ChatClosed,
}

/// What the host app is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presence {
    pub app_foreground: bool,
    pub chat_open: bool,
}

impl Default for Presence {
    fn default() -> Self {
        Self {
            app_foreground: true,
            chat_open: false,
        }
    }
}

impl Presence {
    pub fn apply(self, event: SyncEvent) -> Self {
        match event {
            SyncEvent::AppForegrounded => Self { app_foreground: true, ..self },
            SyncEvent::AppBackgrounded => Self { app_foreground: false, ..self },
            SyncEvent::ChatOpened => Self { chat_open: true, ..self },
            SyncEvent::ChatClosed => Self { chat_open: false, ..self },
        }
    }

    /// Tier a running session polls at.
    pub fn tier(self) -> PollState {
        if !self.app_foreground {
            PollState::Inactive
        } else if self.chat_open {
            PollState::Active
        } else {
            PollState::Background
        }
    }
}

/// Next state for a session in `current` once the host shows `presence`.
/// A stopped session stays stopped until initialized.
pub fn next_state(current: PollState, presence: Presence) -> PollState {
    match current {
        PollState::Stopped => PollState::Stopped,
        _ => presence.tier(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub active: Duration,
    pub background: Duration,
    pub inactive: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            active: Duration::from_secs(10),
            background: Duration::from_secs(60),
            inactive: Duration::from_secs(300),
        }
    }
}

impl PollConfig {
    pub fn interval(&self, state: PollState) -> Option<Duration> {
        match state {
            PollState::Stopped => None,
            PollState::Active => Some(self.active),
            PollState::Background => Some(self.background),
            PollState::Inactive => Some(self.inactive),
        }
    }
}

#[derive(Debug, Default)]
struct ChatData {
    me: Option<String>,
    channels: Vec<Channel>,
    selected_channel: Option<String>,
    messages: Vec<ChatMessage>,
    unread: UnreadCounts,
    chat_open: bool,
    last_error: Option<String>,
}

/// State reachable from timer ticks.
struct SyncShared<A> {
    api: Arc<A>,
    data: RwLock<ChatData>,
    /// Bumped on every start and stop; a poll only writes results if the
    /// session it started in is still the current one.
    session: AtomicU64,
    running: AtomicBool,
}

impl<A: ChatApi> SyncShared<A> {
    fn is_current(&self, session: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.session.load(Ordering::SeqCst) == session
    }

    /// One sync round. Failures are logged; the next tick retries.
    async fn poll(&self) {
        let session = self.session.load(Ordering::SeqCst);
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        let unread = self.api.unread().await;

        let selected = {
            let data = self.data.read().await;
            if data.chat_open { data.selected_channel.clone() } else { None }
        };
        let messages = match selected {
            Some(channel_id) => {
                let result = self.api.messages(&channel_id).await;
                Some((channel_id, result))
            }
            None => None,
        };

        if !self.is_current(session) {
            debug!("Discarding poll results from an ended session");
            return;
        }

        let mut data = self.data.write().await;
        match unread {
            Ok(summary) => {
                data.unread = aggregate(&summary, &data.channels);
                debug!(
                    "Unread: {} total, {} community, {} direct",
                    data.unread.total, data.unread.community, data.unread.direct
                );
            }
            Err(e) => warn!("Unread poll failed: {}", e),
        }
        if let Some((channel_id, result)) = messages {
            match result {
                Ok(messages) if data.selected_channel.as_deref() == Some(channel_id.as_str()) => {
                    data.messages = messages;
                }
                Ok(_) => debug!("Channel changed during poll, dropping messages for {}", channel_id),
                Err(e) => warn!("Message poll for {} failed: {}", channel_id, e),
            }
        }
    }
}

struct Control<T> {
    state: PollState,
    presence: Presence,
    user: Option<String>,
    timer: T,
}

/// Keeps unread counts, and the open channel's messages, fresh by polling
/// at a rate that follows what the user is looking at.
pub struct Synchronizer<A, T = TokioTimer> {
    shared: Arc<SyncShared<A>>,
    control: Mutex<Control<T>>,
    config: PollConfig,
}

impl<A: ChatApi> Synchronizer<A, TokioTimer> {
    pub fn new(api: Arc<A>, config: PollConfig) -> Self {
        Self::with_timer(api, config, TokioTimer::new())
    }
}

impl<A: ChatApi, T: TimerDriver> Synchronizer<A, T> {
    pub fn with_timer(api: Arc<A>, config: PollConfig, timer: T) -> Self {
        Self {
            shared: Arc::new(SyncShared {
                api,
                data: RwLock::new(ChatData::default()),
                session: AtomicU64::new(0),
                running: AtomicBool::new(false),
            }),
            control: Mutex::new(Control {
                state: PollState::Stopped,
                presence: Presence::default(),
                user: None,
                timer,
            }),
            config,
        }
    }

    pub fn api(&self) -> &A {
        &self.shared.api
    }

    /// Starts a session for `username`.
    ///
    /// Repeated calls for the running user are no-ops; a different user
    /// replaces the running session. On failure the error is kept in
    /// [`last_error`](Self::last_error) and the synchronizer stays stopped.
    pub async fn initialize(&self, username: &str, access_token: Option<&str>) -> Result<(), ChatError> {
        let mut control = self.control.lock().await;
        if control.state != PollState::Stopped {
            if control.user.as_deref() == Some(username) {
                debug!("Chat already running for {}", username);
                return Ok(());
            }
            self.shutdown(&mut control);
        }

        let session = match self.shared.api.bootstrap(username, access_token).await {
            Ok(session) => session,
            Err(e) => {
                error!("Chat initialization for {} failed: {}", username, e);
                self.shared.data.write().await.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        let channels = match self.shared.api.channels().await {
            Ok(channels) => channels,
            Err(e) => {
                warn!("Loading channels failed: {}", e);
                Vec::new()
            }
        };

        {
            let mut data = self.shared.data.write().await;
            let chat_open = data.chat_open;
            *data = ChatData {
                me: Some(if session.user_id.is_empty() {
                    username.to_string()
                } else {
                    session.user_id
                }),
                channels,
                chat_open,
                ..ChatData::default()
            };
        }

        self.shared.session.fetch_add(1, Ordering::SeqCst);
        self.shared.running.store(true, Ordering::SeqCst);
        control.user = Some(username.to_string());
        self.shared.poll().await;

        let next = control.presence.tier();
        self.transition(&mut control, next);
        info!("Chat sync started for {}", username);
        Ok(())
    }

    /// Cancels the timer. Requests already in flight finish but their
    /// results are discarded.
    pub async fn stop(&self) {
        let mut control = self.control.lock().await;
        self.shutdown(&mut control);
    }

    fn shutdown(&self, control: &mut Control<T>) {
        self.transition(control, PollState::Stopped);
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.session.fetch_add(1, Ordering::SeqCst);
        control.user = None;
    }

    /// Feeds a host event through the state machine.
    pub async fn handle(&self, event: SyncEvent) {
        let mut control = self.control.lock().await;
        control.presence = control.presence.apply(event);
        self.shared.data.write().await.chat_open = control.presence.chat_open;

        let next = next_state(control.state, control.presence);
        self.transition(&mut control, next);
    }

    /// The only place the timer is touched: the running timer is always
    /// cancelled before the next one starts.
    fn transition(&self, control: &mut Control<T>, next: PollState) {
        let previous = control.state;
        if previous == next {
            return;
        }

        if control.timer.is_running() {
            control.timer.cancel();
        }
        control.state = next;

        if let Some(period) = self.config.interval(next) {
            // Coming back to the foreground catches up right away.
            let fire_immediately = previous == PollState::Inactive;
            control.timer.start(period, fire_immediately, self.tick());
        }
        info!("Chat polling {:?} -> {:?}", previous, next);
    }

    fn tick(&self) -> Tick {
        let shared = self.shared.clone();
        Arc::new(move || {
            let shared = shared.clone();
            async move { shared.poll().await }.boxed()
        })
    }

    /// Runs one sync round now.
    pub async fn poll(&self) {
        self.shared.poll().await;
    }

    pub async fn state(&self) -> PollState {
        self.control.lock().await.state
    }

    pub async fn presence(&self) -> Presence {
        self.control.lock().await.presence
    }

    pub async fn unread(&self) -> UnreadCounts {
        self.shared.data.read().await.unread
    }

    pub async fn channels(&self) -> Vec<Channel> {
        self.shared.data.read().await.channels.clone()
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.shared.data.read().await.messages.clone()
    }

    pub async fn selected_channel(&self) -> Option<String> {
        self.shared.data.read().await.selected_channel.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.shared.data.read().await.last_error.clone()
    }

    fn ensure_running(&self) -> Result<u64, ChatError> {
        if !self.shared.running.load(Ordering::SeqCst) {
            return Err(ChatError::NotInitialized);
        }
        Ok(self.shared.session.load(Ordering::SeqCst))
    }

    async fn require_channel(&self) -> Result<String, ChatError> {
        self.shared
            .data
            .read()
            .await
            .selected_channel
            .clone()
            .ok_or(ChatError::NoChannel)
    }

    /// Switches the open conversation and loads its messages.
    /// `None` closes the conversation.
    pub async fn select_channel(&self, channel_id: Option<&str>) -> Result<(), ChatError> {
        {
            let mut data = self.shared.data.write().await;
            data.selected_channel = channel_id.map(str::to_string);
            data.messages.clear();
        }
        let Some(channel_id) = channel_id else {
            return Ok(());
        };

        let session = self.ensure_running()?;
        let messages = self.shared.api.messages(channel_id).await?;
        if self.shared.is_current(session) {
            let mut data = self.shared.data.write().await;
            if data.selected_channel.as_deref() == Some(channel_id) {
                data.messages = messages;
            }
        }
        Ok(())
    }

    pub async fn send_message(&self, body: &str) -> Result<ChatMessage, ChatError> {
        let session = self.ensure_running()?;
        let channel_id = self.require_channel().await?;
        let message = self.shared.api.send_message(&channel_id, body).await?;

        if self.shared.is_current(session) {
            let mut data = self.shared.data.write().await;
            if data.selected_channel.as_deref() == Some(channel_id.as_str())
                && !data.messages.iter().any(|m| m.id == message.id)
            {
                data.messages.push(message.clone());
            }
        }
        Ok(message)
    }

    pub async fn edit_message(&self, message_id: &str, body: &str) -> Result<ChatMessage, ChatError> {
        let session = self.ensure_running()?;
        let edited = self.shared.api.edit_message(message_id, body).await?;

        if self.shared.is_current(session) {
            let mut data = self.shared.data.write().await;
            if let Some(existing) = data.messages.iter_mut().find(|m| m.id == message_id) {
                *existing = edited.clone();
            }
        }
        Ok(edited)
    }

    pub async fn delete_message(&self, message_id: &str) -> Result<(), ChatError> {
        let session = self.ensure_running()?;
        self.shared.api.delete_message(message_id).await?;

        if self.shared.is_current(session) {
            let mut data = self.shared.data.write().await;
            if let Some(existing) = data.messages.iter_mut().find(|m| m.id == message_id) {
                existing.deleted = true;
            }
        }
        Ok(())
    }

    /// Adds the reaction if the session user hasn't made it yet, otherwise
    /// removes it. Returns whether it was added.
    pub async fn toggle_reaction(&self, message_id: &str, emoji: &str) -> Result<bool, ChatError> {
        let session = self.ensure_running()?;
        let (me, add) = {
            let data = self.shared.data.read().await;
            let me = data.me.clone().ok_or(ChatError::NotInitialized)?;
            let message = data
                .messages
                .iter()
                .find(|m| m.id == message_id)
                .ok_or_else(|| ChatError::UnknownMessage(message_id.to_string()))?;
            let add = !message.reacted(emoji, &me);
            (me, add)
        };

        self.shared.api.react(message_id, emoji, add).await?;

        if self.shared.is_current(session) {
            let mut data = self.shared.data.write().await;
            if let Some(message) = data.messages.iter_mut().find(|m| m.id == message_id) {
                let users = message.reactions.entry(emoji.to_string()).or_default();
                users.retain(|u| u != &me);
                if add {
                    users.push(me);
                } else if users.is_empty() {
                    message.reactions.remove(emoji);
                }
            }
        }
        Ok(add)
    }

    /// Moves the channel's last-viewed marker to now and refreshes the
    /// unread counts.
    pub async fn mark_channel_viewed(&self, channel_id: &str) -> Result<(), ChatError> {
        let session = self.ensure_running()?;
        self.shared.api.mark_viewed(channel_id).await?;

        if self.shared.is_current(session) {
            let mut data = self.shared.data.write().await;
            if let Some(channel) = data.channels.iter_mut().find(|c| c.id == channel_id) {
                channel.last_viewed_at = Some(Utc::now());
            }
        }
        self.shared.poll().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Session;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use snaps_types::models::{ChannelKind, ChannelUnread, UnreadSummary};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct MockApi {
        reject_bootstrap: bool,
        fail_polls: AtomicBool,
        bootstraps: AtomicUsize,
        unread_calls: AtomicUsize,
        message_calls: AtomicUsize,
        summary: StdMutex<UnreadSummary>,
        history: StdMutex<HashMap<String, Vec<ChatMessage>>>,
        reactions: StdMutex<Vec<(String, String, bool)>>,
    }

    fn message(id: &str, channel_id: &str, author: &str) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            channel_id: channel_id.into(),
            author: author.into(),
            body: format!("body of {}", id),
            created_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            edited_at: None,
            deleted: false,
            reactions: BTreeMap::new(),
        }
    }

    impl MockApi {
        fn new() -> Self {
            let api = Self::default();
            *api.summary.lock().unwrap() = UnreadSummary {
                total_unread: Some(7),
                channels: vec![
                    ChannelUnread { channel_id: "town".into(), unread_count: 4 },
                    ChannelUnread { channel_id: "dm-bob".into(), unread_count: 3 },
                ],
            };
            api.history.lock().unwrap().insert(
                "town".into(),
                vec![message("m1", "town", "bob"), message("m2", "town", "carol")],
            );
            api
        }

        fn count(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }

        fn check_poll(&self) -> Result<(), ChatError> {
            if self.fail_polls.load(Ordering::SeqCst) {
                return Err(ChatError::Status { status: 503, body: "unavailable".into() });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ChatApi for MockApi {
        async fn bootstrap(&self, username: &str, _access_token: Option<&str>) -> Result<Session, ChatError> {
            self.bootstraps.fetch_add(1, Ordering::SeqCst);
            if self.reject_bootstrap {
                return Err(ChatError::Bootstrap("invalid token".into()));
            }
            Ok(Session { user_id: username.to_string(), token: "t".into() })
        }

        async fn channels(&self) -> Result<Vec<Channel>, ChatError> {
            Ok(vec![
                Channel { id: "town".into(), kind: ChannelKind::Community, display_name: "Town".into(), last_viewed_at: None },
                Channel { id: "dm-bob".into(), kind: ChannelKind::Direct, display_name: "bob".into(), last_viewed_at: None },
            ])
        }

        async fn messages(&self, channel_id: &str) -> Result<Vec<ChatMessage>, ChatError> {
            self.message_calls.fetch_add(1, Ordering::SeqCst);
            self.check_poll()?;
            Ok(self.history.lock().unwrap().get(channel_id).cloned().unwrap_or_default())
        }

        async fn send_message(&self, channel_id: &str, body: &str) -> Result<ChatMessage, ChatError> {
            let mut sent = message("m-new", channel_id, "alice");
            sent.body = body.to_string();
            Ok(sent)
        }

        async fn edit_message(&self, message_id: &str, body: &str) -> Result<ChatMessage, ChatError> {
            let mut edited = message(message_id, "town", "alice");
            edited.body = body.to_string();
            edited.edited_at = Some(Utc::now());
            Ok(edited)
        }

        async fn delete_message(&self, _message_id: &str) -> Result<(), ChatError> {
            Ok(())
        }

        async fn react(&self, message_id: &str, emoji: &str, add: bool) -> Result<(), ChatError> {
            self.reactions.lock().unwrap().push((message_id.into(), emoji.into(), add));
            Ok(())
        }

        async fn mark_viewed(&self, _channel_id: &str) -> Result<(), ChatError> {
            Ok(())
        }

        async fn unread(&self) -> Result<UnreadSummary, ChatError> {
            self.unread_calls.fetch_add(1, Ordering::SeqCst);
            self.check_poll()?;
            Ok(self.summary.lock().unwrap().clone())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum TimerCall {
        Start { period: Duration, immediate: bool },
        Cancel,
    }

    /// Records calls and fails the test if two timers would overlap.
    #[derive(Clone, Default)]
    struct SpyTimer {
        calls: Arc<StdMutex<Vec<TimerCall>>>,
        running: Arc<AtomicBool>,
    }

    impl SpyTimer {
        fn calls(&self) -> Vec<TimerCall> {
            self.calls.lock().unwrap().clone()
        }

        fn starts(&self) -> Vec<(Duration, bool)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    TimerCall::Start { period, immediate } => Some((period, immediate)),
                    TimerCall::Cancel => None,
                })
                .collect()
        }
    }

    impl TimerDriver for SpyTimer {
        fn start(&mut self, period: Duration, fire_immediately: bool, _tick: Tick) {
            assert!(
                !self.running.swap(true, Ordering::SeqCst),
                "timer started while another was running"
            );
            self.calls.lock().unwrap().push(TimerCall::Start { period, immediate: fire_immediately });
        }

        fn cancel(&mut self) {
            self.running.store(false, Ordering::SeqCst);
            self.calls.lock().unwrap().push(TimerCall::Cancel);
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    fn config() -> PollConfig {
        PollConfig {
            active: Duration::from_secs(5),
            background: Duration::from_secs(30),
            inactive: Duration::from_secs(120),
        }
    }

    fn sync_with(api: MockApi) -> (Synchronizer<MockApi, SpyTimer>, SpyTimer) {
        let spy = SpyTimer::default();
        let sync = Synchronizer::with_timer(Arc::new(api), config(), spy.clone());
        (sync, spy)
    }

    #[test]
    fn tier_follows_presence() {
        let p = Presence::default();
        assert_eq!(p.tier(), PollState::Background);
        assert_eq!(p.apply(SyncEvent::ChatOpened).tier(), PollState::Active);
        assert_eq!(
            p.apply(SyncEvent::ChatOpened).apply(SyncEvent::AppBackgrounded).tier(),
            PollState::Inactive
        );
        assert_eq!(next_state(PollState::Stopped, p), PollState::Stopped);
        assert_eq!(next_state(PollState::Inactive, p), PollState::Background);
    }

    #[tokio::test]
    async fn failed_initialize_stays_stopped() {
        let (sync, spy) = sync_with(MockApi { reject_bootstrap: true, ..MockApi::new() });

        let result = sync.initialize("alice", None).await;

        assert!(matches!(result, Err(ChatError::Bootstrap(_))));
        assert_eq!(sync.state().await, PollState::Stopped);
        assert!(sync.last_error().await.unwrap().contains("invalid token"));
        assert!(spy.calls().is_empty());
        assert!(matches!(sync.send_message("hi").await, Err(ChatError::NotInitialized)));
    }

    #[tokio::test]
    async fn initialize_polls_and_starts_background_timer() {
        let (sync, spy) = sync_with(MockApi::new());

        sync.initialize("alice", None).await.unwrap();

        assert_eq!(sync.state().await, PollState::Background);
        assert_eq!(spy.starts(), vec![(config().background, false)]);
        assert_eq!(
            sync.unread().await,
            UnreadCounts { total: 7, community: 4, direct: 3 }
        );
        assert_eq!(sync.channels().await.len(), 2);
        assert!(sync.last_error().await.is_none());
    }

    #[tokio::test]
    async fn first_timer_start_is_not_preceded_by_cancel() {
        let (sync, spy) = sync_with(MockApi::new());
        sync.handle(SyncEvent::ChatOpened).await;
        sync.initialize("alice", None).await.unwrap();

        assert_eq!(
            spy.calls(),
            vec![TimerCall::Start { period: config().active, immediate: false }]
        );
        assert!(spy.is_running());
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let (sync, spy) = sync_with(MockApi::new());
        sync.initialize("alice", None).await.unwrap();
        sync.initialize("alice", None).await.unwrap();

        assert_eq!(MockApi::count(&sync.api().bootstraps), 1);
        assert_eq!(spy.starts().len(), 1);
    }

    #[tokio::test]
    async fn new_user_replaces_session() {
        let (sync, spy) = sync_with(MockApi::new());
        sync.initialize("alice", None).await.unwrap();
        sync.initialize("bob", None).await.unwrap();

        assert_eq!(MockApi::count(&sync.api().bootstraps), 2);
        assert_eq!(
            spy.calls(),
            vec![
                TimerCall::Start { period: config().background, immediate: false },
                TimerCall::Cancel,
                TimerCall::Start { period: config().background, immediate: false },
            ]
        );
    }

    #[tokio::test]
    async fn opening_chat_shortens_interval() {
        let (sync, spy) = sync_with(MockApi::new());
        sync.initialize("alice", None).await.unwrap();

        sync.handle(SyncEvent::ChatOpened).await;
        assert_eq!(sync.state().await, PollState::Active);
        sync.handle(SyncEvent::ChatClosed).await;
        assert_eq!(sync.state().await, PollState::Background);

        assert_eq!(
            spy.calls(),
            vec![
                TimerCall::Start { period: config().background, immediate: false },
                TimerCall::Cancel,
                TimerCall::Start { period: config().active, immediate: false },
                TimerCall::Cancel,
                TimerCall::Start { period: config().background, immediate: false },
            ]
        );
    }

    #[tokio::test]
    async fn returning_to_foreground_polls_immediately() {
        let (sync, spy) = sync_with(MockApi::new());
        sync.initialize("alice", None).await.unwrap();

        sync.handle(SyncEvent::AppBackgrounded).await;
        assert_eq!(sync.state().await, PollState::Inactive);
        sync.handle(SyncEvent::AppForegrounded).await;

        assert_eq!(
            spy.starts(),
            vec![
                (config().background, false),
                (config().inactive, false),
                (config().background, true),
            ]
        );
    }

    #[tokio::test]
    async fn repeated_event_does_not_restart_timer() {
        let (sync, spy) = sync_with(MockApi::new());
        sync.initialize("alice", None).await.unwrap();
        sync.handle(SyncEvent::ChatOpened).await;
        sync.handle(SyncEvent::ChatOpened).await;
        assert_eq!(spy.starts().len(), 2);
    }

    #[tokio::test]
    async fn events_before_initialize_only_record_presence() {
        let (sync, spy) = sync_with(MockApi::new());
        sync.handle(SyncEvent::ChatOpened).await;
        assert_eq!(sync.state().await, PollState::Stopped);
        assert!(spy.calls().is_empty());

        sync.initialize("alice", None).await.unwrap();
        assert_eq!(sync.state().await, PollState::Active);
        assert_eq!(spy.starts(), vec![(config().active, false)]);
    }

    #[tokio::test]
    async fn poll_failure_keeps_state_and_counts() {
        let (sync, _spy) = sync_with(MockApi::new());
        sync.initialize("alice", None).await.unwrap();
        let before = sync.unread().await;

        sync.api().fail_polls.store(true, Ordering::SeqCst);
        sync.poll().await;

        assert_eq!(sync.state().await, PollState::Background);
        assert_eq!(sync.unread().await, before);

        sync.api().fail_polls.store(false, Ordering::SeqCst);
        sync.api().summary.lock().unwrap().total_unread = Some(9);
        sync.poll().await;
        assert_eq!(sync.unread().await.total, 9);
    }

    #[tokio::test]
    async fn open_chat_with_channel_refreshes_messages() {
        let (sync, _spy) = sync_with(MockApi::new());
        sync.initialize("alice", None).await.unwrap();

        sync.poll().await;
        assert_eq!(MockApi::count(&sync.api().message_calls), 0);

        sync.handle(SyncEvent::ChatOpened).await;
        sync.select_channel(Some("town")).await.unwrap();
        assert_eq!(sync.messages().await.len(), 2);

        sync.api()
            .history
            .lock()
            .unwrap()
            .get_mut("town")
            .unwrap()
            .push(message("m3", "town", "dave"));
        sync.poll().await;

        assert_eq!(sync.messages().await.len(), 3);
        assert_eq!(MockApi::count(&sync.api().message_calls), 2);
    }

    #[tokio::test]
    async fn stop_cancels_and_ignores_late_polls() {
        let (sync, spy) = sync_with(MockApi::new());
        sync.initialize("alice", None).await.unwrap();
        let unread_calls = MockApi::count(&sync.api().unread_calls);

        sync.stop().await;
        assert_eq!(sync.state().await, PollState::Stopped);
        assert_eq!(spy.calls().last(), Some(&TimerCall::Cancel));
        assert!(!spy.is_running());

        sync.poll().await;
        assert_eq!(MockApi::count(&sync.api().unread_calls), unread_calls);

        sync.stop().await;
        assert_eq!(spy.calls().iter().filter(|c| **c == TimerCall::Cancel).count(), 1);
    }

    #[tokio::test]
    async fn user_actions_update_open_conversation() {
        let (sync, _spy) = sync_with(MockApi::new());
        sync.initialize("alice", None).await.unwrap();

        assert!(matches!(sync.send_message("hi").await, Err(ChatError::NoChannel)));

        sync.select_channel(Some("town")).await.unwrap();
        let sent = sync.send_message("hello town").await.unwrap();
        assert_eq!(sent.body, "hello town");
        assert_eq!(sync.messages().await.last().unwrap().id, "m-new");

        let edited = sync.edit_message("m1", "edited").await.unwrap();
        assert!(edited.edited_at.is_some());
        assert_eq!(sync.messages().await[0].body, "edited");

        sync.delete_message("m2").await.unwrap();
        assert!(sync.messages().await[1].deleted);

        sync.mark_channel_viewed("town").await.unwrap();
        let town = sync.channels().await.into_iter().find(|c| c.id == "town").unwrap();
        assert!(town.last_viewed_at.is_some());
    }

    #[tokio::test]
    async fn toggle_reaction_adds_then_removes() {
        let (sync, _spy) = sync_with(MockApi::new());
        sync.initialize("alice", None).await.unwrap();
        sync.select_channel(Some("town")).await.unwrap();

        assert!(sync.toggle_reaction("m1", "fire").await.unwrap());
        assert!(sync.messages().await[0].reacted("fire", "alice"));

        assert!(!sync.toggle_reaction("m1", "fire").await.unwrap());
        assert!(!sync.messages().await[0].reactions.contains_key("fire"));

        assert_eq!(
            *sync.api().reactions.lock().unwrap(),
            vec![
                ("m1".to_string(), "fire".to_string(), true),
                ("m1".to_string(), "fire".to_string(), false)
            ]
        );
        assert!(matches!(
            sync.toggle_reaction("nope", "fire").await,
            Err(ChatError::UnknownMessage(_))
        ));
    }
}
