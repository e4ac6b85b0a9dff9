//! UseCase: チャットルーム
//!
//! アクティブなチャットごとに 1 つの `Room` が動きます。
//! 制御タスクが接続中クライアントの集合を所有し、参加・退出、ブロードキャスト、
//! 停止を直列に処理します。フラッシュタスクは定期的に、または履歴からの要求で
//! 履歴をメッセージストアへ保存します。
//!
//! ブロードキャストするメッセージは 1 度だけ JSON に変換し、同じ文字列を
//! 各クライアントのメールボックスに積みます。メールボックスは容量制限付きで、
//! 満杯の場合はそのクライアント宛てのメッセージだけを破棄します。

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use chrono::{DateTime, Utc};
use hiroba_shared::time::Clock;
use tokio::{
    sync::{Mutex, mpsc, oneshot, watch},
    time::{Instant, interval_at, sleep},
};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    config::{ChatConfig, SessionConfig},
    domain::{
        Chat, ChatMessage, History, MessageRepository, MessageUpdate, RepositoryError, UserId,
    },
};

use super::{
    client::{Client, PreparedMessage},
    error::RoomError,
};

const CLOSED_NOTICE: &str = "Chat room is closed!";

fn joined_notice(username: &str) -> String {
    format!("{username} has joined the chat!")
}

fn left_notice(username: &str) -> String {
    format!("{username} has left the chat!")
}

enum Membership {
    /// クライアントを参加させる（履歴スナップショットを積んだ時点で ack）
    Add(Arc<Client>, oneshot::Sender<()>),
    /// クライアントのセッションが正常終了した
    Logout(Arc<Client>),
    /// セッションが失敗した（除外して接続を閉じる）
    Kick(Arc<Client>),
}

enum Broadcast {
    /// ユーザーのメッセージ（履歴に追加）
    Chat(ChatMessage),
    /// ルームからの通知（保存しない）
    System(String),
}

enum CloseRequest {
    /// 処理時点でクライアントがいなければ停止する（停止するかどうかを返す）
    Idle(oneshot::Sender<bool>),
    Shutdown,
}

pub struct Room {
    chat: Chat,
    history: Arc<History>,
    messages: Arc<dyn MessageRepository>,
    clock: Arc<dyn Clock>,
    config: ChatConfig,
    span: tracing::Span,
    membership_tx: mpsc::Sender<Membership>,
    broadcast_tx: mpsc::Sender<Broadcast>,
    close_tx: mpsc::Sender<CloseRequest>,
    stash_tx: mpsc::Sender<()>,
    /// read_new / 保存 / mark_flushed を直列化する
    stash_lock: Mutex<()>,
    active_clients: AtomicUsize,
    closing: AtomicBool,
    stopped_tx: watch::Sender<bool>,
}

impl Room {
    /// `chat` のルームを開始し、`seed`（古い順）で履歴を初期化する
    ///
    /// 初期メッセージは保存済みとして扱う。ルームは `shutdown` が `true` になったとき、
    /// `close` が呼ばれたとき、またはアイドル停止要求時にクライアントがいないときに停止する。
    pub fn spawn(
        chat: Chat,
        seed: Vec<ChatMessage>,
        messages: Arc<dyn MessageRepository>,
        clock: Arc<dyn Clock>,
        config: ChatConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Arc<Self> {
        let (membership_tx, membership_rx) = mpsc::channel(64);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_capacity.max(1));
        let (close_tx, close_rx) = mpsc::channel(4);
        let (stash_tx, stash_rx) = mpsc::channel(1);
        let (stopped_tx, _) = watch::channel(false);
        let (flush_stop_tx, flush_stop_rx) = watch::channel(false);

        let history = Arc::new(History::with_flush_trigger(stash_tx.clone()));
        let seeded = seed.len();
        history.add_batch(seed);
        history.mark_flushed(seeded);

        let span = tracing::info_span!("room", chat_id = %chat.id, chat_name = %chat.name);

        let room = Arc::new(Self {
            chat,
            history,
            messages,
            clock,
            config,
            span: span.clone(),
            membership_tx,
            broadcast_tx,
            close_tx,
            stash_tx,
            stash_lock: Mutex::new(()),
            active_clients: AtomicUsize::new(0),
            closing: AtomicBool::new(false),
            stopped_tx,
        });

        let control = ControlLoop {
            room: Arc::clone(&room),
            clients: HashMap::new(),
            membership_rx,
            broadcast_rx,
            close_rx,
            shutdown,
            flush_stop: flush_stop_tx,
        };
        tokio::spawn(control.run().instrument(span.clone()));
        tokio::spawn(flush_loop(Arc::clone(&room), stash_rx, flush_stop_rx).instrument(span));

        tracing::info!(parent: &room.span, "Room started with {} messages in history", seeded);
        room
    }

    pub fn chat(&self) -> &Chat {
        &self.chat
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub(crate) fn session_config(&self) -> &SessionConfig {
        &self.config.session
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// 参加中のクライアント数
    pub fn active_clients(&self) -> usize {
        self.active_clients.load(Ordering::Acquire)
    }

    /// 停止処理が始まっていれば `true`
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped_tx.borrow()
    }

    /// ルームが完全に停止するまで待つ
    pub async fn stopped(&self) {
        let mut stopped = self.stopped_tx.subscribe();
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }

    /// `client` を参加させる
    ///
    /// 履歴スナップショットがメールボックスに積まれた後に戻る。
    pub async fn add(&self, client: Arc<Client>) -> Result<(), RoomError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.membership_tx
            .send(Membership::Add(client, ack_tx))
            .await
            .map_err(|_| RoomError::Closed)?;
        ack_rx.await.map_err(|_| RoomError::Closed)
    }

    /// 正常終了したクライアントを除外する
    pub async fn logout(&self, client: &Arc<Client>) {
        if self
            .membership_tx
            .send(Membership::Logout(Arc::clone(client)))
            .await
            .is_err()
        {
            tracing::debug!(parent: &self.span, "Room already stopped, logout ignored");
        }
    }

    /// セッションが失敗したクライアントを除外し、接続を閉じる
    pub async fn kick(&self, client: &Arc<Client>) {
        if self
            .membership_tx
            .send(Membership::Kick(Arc::clone(client)))
            .await
            .is_err()
        {
            client.close();
        }
    }

    /// ユーザーのメッセージを配信キューに積む（キューが満杯の間は待つ）
    pub async fn broadcast(&self, msg: ChatMessage) -> Result<(), RoomError> {
        self.broadcast_tx
            .send(Broadcast::Chat(msg))
            .await
            .map_err(|_| RoomError::Closed)
    }

    /// ルームに停止を要求する
    pub fn close(&self) {
        if self.close_tx.try_send(CloseRequest::Shutdown).is_err() {
            tracing::debug!(parent: &self.span, "Close already requested");
        }
    }

    /// クライアントがいなければルームを停止する
    ///
    /// 停止中または停止済みなら `true`、クライアントがいて継続するなら `false`。
    pub async fn close_if_idle(&self) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.close_tx.send(CloseRequest::Idle(ack_tx)).await.is_err() {
            return true;
        }
        ack_rx.await.unwrap_or(true)
    }

    /// フラッシュタスクに即時保存を要求する（未処理の要求とはまとめられる）
    pub fn request_stash(&self) {
        let _ = self.stash_tx.try_send(());
    }

    /// 未保存の履歴をすべて保存し、保存件数を返す
    pub async fn stash_history(&self) -> Result<usize, RepositoryError> {
        let _guard = self.stash_lock.lock().await;

        let batch = self.history.read_new();
        if batch.is_empty() {
            tracing::debug!(parent: &self.span, "No new messages to stash");
            return Ok(0);
        }

        let flushed = batch.len();
        self.messages.save_messages(batch).await?;
        self.history.mark_flushed(flushed);
        tracing::info!(parent: &self.span, "Stashed {} messages", flushed);
        Ok(flushed)
    }

    /// リトライ付きの `stash_history`（失敗はログに残すだけ）
    pub async fn stash_with_retry(&self) -> bool {
        let attempts = self.config.flush_retries + 1;
        for attempt in 1..=attempts {
            match self.stash_history().await {
                Ok(_) => return true,
                Err(e) => {
                    tracing::warn!(
                        parent: &self.span,
                        "Failed to stash history (attempt {}/{}): {}",
                        attempt,
                        attempts,
                        e
                    );
                    if attempt < attempts {
                        sleep(self.config.flush_backoff).await;
                    }
                }
            }
        }
        tracing::error!(
            parent: &self.span,
            "Giving up stashing history after {} attempts",
            attempts
        );
        false
    }

    /// 保存後にストアのメッセージを編集し、履歴のコピーにも反映する
    pub async fn update_message(&self, update: MessageUpdate) -> Result<ChatMessage, RoomError> {
        self.stash_history().await?;
        let updated = self
            .messages
            .update_message_content(&self.chat.id, update)
            .await?;

        let history = Arc::clone(&self.history);
        let (message_id, content) = (updated.id.clone(), updated.content.clone());
        tokio::spawn(
            async move {
                if !history.update_content(&message_id, &content) {
                    tracing::debug!("Edited message '{}' is no longer in history", message_id);
                }
            }
            .instrument(self.span.clone()),
        );

        Ok(updated)
    }

    /// 保存後にストアのメッセージを削除し、履歴からも取り除く
    pub async fn delete_message(&self, message_id: &str, author_id: &UserId) -> Result<(), RoomError> {
        self.stash_history().await?;
        self.messages
            .delete_message(&self.chat.id, message_id, author_id)
            .await?;

        let history = Arc::clone(&self.history);
        let message_id = message_id.to_string();
        tokio::spawn(
            async move {
                if !history.remove(&message_id) {
                    tracing::debug!("Deleted message '{}' is no longer in history", message_id);
                }
            }
            .instrument(self.span.clone()),
        );

        Ok(())
    }
}

struct ControlLoop {
    room: Arc<Room>,
    clients: HashMap<Uuid, Arc<Client>>,
    membership_rx: mpsc::Receiver<Membership>,
    broadcast_rx: mpsc::Receiver<Broadcast>,
    close_rx: mpsc::Receiver<CloseRequest>,
    shutdown: watch::Receiver<bool>,
    flush_stop: watch::Sender<bool>,
}

impl ControlLoop {
    async fn run(mut self) {
        if !*self.shutdown.borrow_and_update() {
            loop {
                tokio::select! {
                    _ = self.shutdown.changed() => break,
                    Some(request) = self.close_rx.recv() => match request {
                        CloseRequest::Shutdown => break,
                        CloseRequest::Idle(ack) => {
                            if self.clients.is_empty() {
                                self.room.closing.store(true, Ordering::Release);
                                let _ = ack.send(true);
                                break;
                            }
                            tracing::debug!("Idle close ignored, {} clients connected", self.clients.len());
                            let _ = ack.send(false);
                        }
                    },
                    Some(event) = self.membership_rx.recv() => self.handle_membership(event),
                    Some(event) = self.broadcast_rx.recv() => self.dispatch(event),
                }
            }
        }
        self.stop().await;
    }

    fn handle_membership(&mut self, event: Membership) {
        match event {
            Membership::Add(client, ack) => {
                let username = client.user().username.clone();
                self.clients.insert(client.id(), Arc::clone(&client));
                self.sync_active_clients();
                tracing::info!("Client '{}' ({}) joined", username, client.user().id);

                self.send_history(&client);
                let _ = ack.send(());
                self.dispatch(Broadcast::System(joined_notice(&username)));
            }
            Membership::Logout(client) => {
                if self.clients.remove(&client.id()).is_some() {
                    self.sync_active_clients();
                    tracing::info!("Client '{}' left", client.user().id);
                    self.dispatch(Broadcast::System(left_notice(&client.user().username)));
                }
            }
            Membership::Kick(client) => {
                client.close();
                if self.clients.remove(&client.id()).is_some() {
                    self.sync_active_clients();
                    tracing::info!("Client '{}' kicked", client.user().id);
                    self.dispatch(Broadcast::System(left_notice(&client.user().username)));
                }
            }
        }
    }

    fn send_history(&self, client: &Client) {
        let snapshot = self.room.history.read();
        if snapshot.is_empty() {
            return;
        }
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                if let Err(e) = client.send(Arc::from(json)) {
                    tracing::warn!("Failed to send history to '{}': {}", client.user().id, e);
                }
            }
            Err(e) => tracing::error!("Failed to serialize history: {}", e),
        }
    }

    /// 1 度だけ JSON に変換し、ユーザーのメッセージは履歴に追加して全クライアントへ配信する
    fn dispatch(&self, event: Broadcast) {
        let msg = match event {
            Broadcast::Chat(msg) => msg,
            Broadcast::System(content) => {
                ChatMessage::system(self.room.chat.id.clone(), content, self.room.now())
            }
        };

        let prepared: PreparedMessage = match serde_json::to_string(&msg) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::error!("Failed to serialize message '{}': {}", msg.id, e);
                return;
            }
        };

        if !msg.is_system() {
            self.room.history.add(msg);
        }

        for client in self.clients.values() {
            if let Err(e) = client.send(Arc::clone(&prepared)) {
                tracing::warn!("Failed to deliver to '{}': {}", client.user().id, e);
            }
        }
    }

    fn sync_active_clients(&self) {
        self.room
            .active_clients
            .store(self.clients.len(), Ordering::Release);
    }

    async fn stop(&mut self) {
        tracing::info!("Stopping room");
        self.room.closing.store(true, Ordering::Release);

        self.room.stash_with_retry().await;

        self.dispatch(Broadcast::System(CLOSED_NOTICE.to_string()));
        for (_, client) in self.clients.drain() {
            client.close_mailbox();
            client.close();
        }
        self.sync_active_clients();

        let _ = self.flush_stop.send(true);
        self.room.stopped_tx.send_replace(true);
        tracing::info!("Room stopped");
    }
}

async fn flush_loop(
    room: Arc<Room>,
    mut trigger: mpsc::Receiver<()>,
    mut stop: watch::Receiver<bool>,
) {
    let period = room.config.flush_interval;
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.tick() => {
                tracing::debug!("Periodic history stash");
                if let Err(e) = room.stash_history().await {
                    tracing::warn!("Periodic stash failed: {}", e);
                }
            }
            Some(()) = trigger.recv() => {
                tracing::debug!("Requested history stash");
                room.stash_with_retry().await;
            }
        }
    }
    tracing::debug!("Flush task stopped");
}
