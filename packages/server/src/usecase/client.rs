//! UseCase: クライアントセッション
//!
//! 接続中の参加者 1 人を表します。`Client` はルームが書き込みセッションが読み出す
//! 容量制限付きの送信メールボックスと、2 つのセッションループを持ちます。
//!
//! - pusher: メールボックス → コネクション、ping 送信、クローズフレーム
//! - receiver: コネクション → ルームへのブロードキャスト、pong の監視、受信期限
//!
//! どちらかのループが終了した時点でセッションは終了します。

use std::sync::{
    Arc, Mutex, PoisonError, Weak,
    atomic::{AtomicU8, AtomicU64, Ordering},
};

use tokio::{
    sync::{mpsc, watch},
    time::{Instant, interval_at, timeout, timeout_at},
};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    config::SessionConfig,
    domain::{ChatId, ChatMessage, Connection, Frame, FrameSink, FrameStream, User},
    infrastructure::dto::websocket::IncomingMessage,
};

use super::{
    error::{ClientError, SessionError},
    room::Room,
};

/// ルームで 1 度だけシリアライズされ、全受信者で共有されるメッセージ
pub type PreparedMessage = Arc<str>;

/// 履歴スナップショットが 1 スロットに収まるよう、メールボックスはバッチ単位
type Batch = Vec<PreparedMessage>;

/// クライアントセッションの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionState {
    Connected = 0,
    Active = 1,
    Closing = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connected,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

pub struct Client {
    id: Uuid,
    user: User,
    chat_id: ChatId,
    room: Weak<Room>,
    config: SessionConfig,
    /// ルームがメールボックスを閉じた後は `None`
    mailbox: Mutex<Option<mpsc::Sender<Batch>>>,
    /// セッション開始時に取り出される
    inbox: Mutex<Option<mpsc::Receiver<Batch>>>,
    state: AtomicU8,
    close_tx: watch::Sender<bool>,
    dropped: AtomicU64,
}

impl Client {
    /// `room` に紐づくクライアントを作成（セッションは未開始）
    pub fn new(user: User, room: &Arc<Room>) -> Arc<Self> {
        let config = room.session_config().clone();
        let (mailbox, inbox) = mpsc::channel(config.mailbox_capacity.max(1));
        let (close_tx, _) = watch::channel(false);

        Arc::new(Self {
            id: Uuid::new_v4(),
            user,
            chat_id: room.chat().id.clone(),
            room: Arc::downgrade(room),
            config,
            mailbox: Mutex::new(Some(mailbox)),
            inbox: Mutex::new(Some(inbox)),
            state: AtomicU8::new(SessionState::Connected as u8),
            close_tx,
            dropped: AtomicU64::new(0),
        })
    }

    /// 接続ごとに一意なセッション ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// メールボックスが満杯で破棄されたメッセージ数
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// メッセージを 1 件、待たずにキューへ積む
    pub fn send(&self, msg: PreparedMessage) -> Result<(), ClientError> {
        self.push(vec![msg])
    }

    /// 複数メッセージを 1 エントリとして積む（順序通りに配信）
    pub fn send_batch(&self, msgs: Vec<PreparedMessage>) -> Result<(), ClientError> {
        if msgs.is_empty() {
            return Ok(());
        }
        self.push(msgs)
    }

    fn push(&self, batch: Batch) -> Result<(), ClientError> {
        if self.state() >= SessionState::Closing {
            return Err(ClientError::ClientUnavailable);
        }

        let mailbox = self.mailbox.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = mailbox.as_ref() else {
            return Err(ClientError::ClientUnavailable);
        };

        match tx.try_send(batch) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    "Mailbox of client '{}' is full, dropping message (dropped so far: {})",
                    self.user.id,
                    dropped
                );
                Err(ClientError::MailboxFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ClientError::ClientUnavailable),
        }
    }

    /// 送信メールボックスを閉じる
    ///
    /// pusher は積まれた分を送り切ってからクローズフレームを送り、
    /// `SessionError::RoomClosed` でセッションを終了する。
    pub fn close_mailbox(&self) {
        let sender = self
            .mailbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);
    }

    /// セッションの終了を要求する（冪等）
    pub fn close(&self) {
        let _ = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            (current < SessionState::Closing as u8).then_some(SessionState::Closing as u8)
        });
        self.close_tx.send_replace(true);
    }

    /// `connection` 上で両方のセッションループを実行し、どちらかが終わるまで待つ
    ///
    /// `Ok(())` は相手が正常に切断したことを表す。セッションは 1 度しか開始できない。
    pub async fn start_session<C: Connection>(
        self: &Arc<Self>,
        connection: C,
    ) -> Result<(), SessionError> {
        let span = tracing::info_span!(
            "session",
            session_id = %self.id,
            chat_id = %self.chat_id,
            user_id = %self.user.id,
            username = %self.user.username,
        );

        async move {
            let inbox = self
                .inbox
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .ok_or(SessionError::ClientUnavailable)?;

            let mut close_rx = self.close_tx.subscribe();
            if *close_rx.borrow_and_update() {
                self.state.store(SessionState::Closed as u8, Ordering::Release);
                return Err(SessionError::Closed);
            }

            let _ = self.state.compare_exchange(
                SessionState::Connected as u8,
                SessionState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            tracing::info!("Session started");

            let (sink, stream) = connection.split();
            let result = tokio::select! {
                result = self.pusher_loop(inbox, sink, close_rx) => result,
                result = self.receiver_loop(stream) => result,
            };

            self.state.store(SessionState::Closed as u8, Ordering::Release);
            match &result {
                Ok(()) => tracing::info!("Session ended"),
                Err(e) => tracing::info!("Session ended: {}", e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn pusher_loop<S: FrameSink>(
        &self,
        mut inbox: mpsc::Receiver<Batch>,
        mut sink: S,
        mut close_rx: watch::Receiver<bool>,
    ) -> Result<(), SessionError> {
        let ping_period = self.config.ping_period();
        let mut ping = interval_at(Instant::now() + ping_period, ping_period);

        loop {
            tokio::select! {
                biased;

                batch = inbox.recv() => {
                    let Some(batch) = batch else {
                        let _ = self.write(&mut sink, Frame::Close).await;
                        return Err(SessionError::RoomClosed);
                    };
                    for msg in batch {
                        self.write(&mut sink, Frame::Text(msg.to_string())).await?;
                    }
                }
                _ = close_rx.changed() => {
                    let _ = self.write(&mut sink, Frame::Close).await;
                    return Err(SessionError::Closed);
                }
                _ = ping.tick() => {
                    tracing::trace!("Sending ping");
                    self.write(&mut sink, Frame::Ping(Vec::new()))
                        .await
                        .map_err(|_| SessionError::ClientUnavailable)?;
                }
            }
        }
    }

    async fn write<S: FrameSink>(&self, sink: &mut S, frame: Frame) -> Result<(), SessionError> {
        match timeout(self.config.write_wait, sink.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Write(e)),
            Err(_) => Err(SessionError::WriteTimeout),
        }
    }

    async fn receiver_loop<R: FrameStream>(&self, mut stream: R) -> Result<(), SessionError> {
        let mut deadline = Instant::now() + self.config.pong_wait;

        loop {
            let frame = match timeout_at(deadline, stream.next()).await {
                Err(_) => return Err(SessionError::ReadTimeout),
                Ok(None) => return Ok(()),
                Ok(Some(Err(e))) => {
                    tracing::warn!("Failed to read message: {}", e);
                    return Err(SessionError::Read(e));
                }
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Frame::Text(text) => self.publish(&text).await?,
                Frame::Pong(_) => deadline = Instant::now() + self.config.pong_wait,
                Frame::Ping(_) => tracing::trace!("Received ping"),
                Frame::Close => {
                    tracing::debug!("Peer sent close frame");
                    return Ok(());
                }
            }
        }
    }

    /// 受信フレームをデコードしてルームに渡す
    async fn publish(&self, text: &str) -> Result<(), SessionError> {
        let incoming = match serde_json::from_str::<IncomingMessage>(text) {
            Ok(incoming) => incoming,
            Err(e) => {
                tracing::warn!("Skipping malformed message: {}", e);
                return Ok(());
            }
        };

        let room = self.room.upgrade().ok_or(SessionError::RoomClosed)?;
        let msg = ChatMessage::new(
            &self.user,
            self.chat_id.clone(),
            incoming.content,
            room.now(),
        );
        room.broadcast(msg)
            .await
            .map_err(|_| SessionError::RoomClosed)
    }

    #[cfg(test)]
    pub(crate) fn take_inbox(&self) -> Option<mpsc::Receiver<Vec<PreparedMessage>>> {
        self.inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
