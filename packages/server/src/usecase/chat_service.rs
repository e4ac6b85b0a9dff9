//! UseCase: チャットサービス
//!
//! アクティブなルームのレジストリであり、トランスポート層からの操作
//! （チャット作成、ユーザー接続、保存済みメッセージの取得・編集）の入り口です。
//! 1 つのチャットに登録されるルームは高々 1 つです。

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};

use futures_util::future::join_all;
use hiroba_shared::time::Clock;
use tokio::{
    sync::{RwLock, watch},
    time::{Instant, interval_at},
};
use tracing::Instrument;

use crate::{
    config::ChatConfig,
    domain::{
        Chat, ChatId, ChatMessage, ChatRepository, Connection, HISTORY_CAPACITY,
        MessageRepository, MessageUpdate, User, UserId,
    },
};

use super::{
    client::Client,
    error::{ChatServiceError, RoomError, SessionError},
    room::Room,
};

/// 参加中にルームが停止した場合の試行回数
const MAX_JOIN_ATTEMPTS: usize = 3;

pub struct ChatService {
    rooms: RwLock<HashMap<ChatId, Arc<Room>>>,
    chats: Arc<dyn ChatRepository>,
    messages: Arc<dyn MessageRepository>,
    clock: Arc<dyn Clock>,
    config: ChatConfig,
    shutdown: watch::Sender<bool>,
}

impl ChatService {
    /// サービスを作成し、アイドルルームの回収タスクを開始する
    ///
    /// Tokio ランタイム内で呼ぶこと。
    pub fn new(
        chats: Arc<dyn ChatRepository>,
        messages: Arc<dyn MessageRepository>,
        clock: Arc<dyn Clock>,
        config: ChatConfig,
    ) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        let service = Arc::new(Self {
            rooms: RwLock::new(HashMap::new()),
            chats,
            messages,
            clock,
            config,
            shutdown,
        });

        let sweep = idle_sweep(
            Arc::downgrade(&service),
            service.config.idle_check_interval,
            service.shutdown.subscribe(),
        );
        tokio::spawn(sweep.instrument(tracing::info_span!("idle_sweep")));

        service
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// チャットを保存し、そのルームを即座に開始する
    pub async fn create_chat(&self, chat: Chat) -> Result<ChatId, ChatServiceError> {
        let name = chat.name.clone();
        let chat_id = self
            .chats
            .create_chat(chat)
            .await
            .map_err(|e| ChatServiceError::from_repository("create chat", e))?;

        let chat = Chat::with_id(chat_id.clone(), name);
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(chat_id.clone())
            .or_insert_with(|| self.spawn_room(chat, Vec::new()));

        tracing::info!("Chat '{}' created", chat_id);
        Ok(chat_id)
    }

    pub async fn get_chat(&self, chat_id: &ChatId) -> Result<Chat, ChatServiceError> {
        self.chats
            .get_chat_by_id(chat_id)
            .await
            .map_err(|e| ChatServiceError::from_repository("get chat", e))
    }

    pub async fn get_all_chats(&self) -> Result<Vec<Chat>, ChatServiceError> {
        self.chats
            .get_all_chats()
            .await
            .map_err(|e| ChatServiceError::from_repository("get all chats", e))
    }

    /// ルームが登録されているチャットを名前順で取得
    pub async fn get_active_chats(&self) -> Vec<Chat> {
        let rooms = self.rooms.read().await;
        let mut chats: Vec<Chat> = rooms.values().map(|room| room.chat().clone()).collect();
        chats.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        chats
    }

    /// チャットに登録されているルームを取得
    pub async fn active_room(&self, chat_id: &ChatId) -> Option<Arc<Room>> {
        self.rooms.read().await.get(chat_id).cloned()
    }

    /// `chat_id` を解決し、`connection` 上で `user` のセッションを実行する
    ///
    /// セッション終了まで戻らない。
    pub async fn connect_by_id<C: Connection>(
        &self,
        chat_id: &ChatId,
        user: User,
        connection: C,
    ) -> Result<(), ChatServiceError> {
        let chat = self.get_chat(chat_id).await?;
        self.join(chat, user, connection).await
    }

    /// `user` を `chat` のルームに参加させ、セッションを実行する
    pub async fn join<C: Connection>(
        &self,
        chat: Chat,
        user: User,
        connection: C,
    ) -> Result<(), ChatServiceError> {
        let (room, client) = self.admit(&chat, user).await?;

        match client.start_session(connection).await {
            Ok(()) => {
                room.logout(&client).await;
                Ok(())
            }
            Err(SessionError::RoomClosed) => Err(SessionError::RoomClosed.into()),
            Err(e) => {
                tracing::warn!(
                    chat_id = %chat.id,
                    "Session of '{}' failed: {}",
                    client.user().id,
                    e
                );
                room.kick(&client).await;
                client.close();
                Err(e.into())
            }
        }
    }

    async fn admit(&self, chat: &Chat, user: User) -> Result<(Arc<Room>, Arc<Client>), ChatServiceError> {
        for _ in 0..MAX_JOIN_ATTEMPTS {
            let room = self.find_or_create_room(chat).await?;
            let client = Client::new(user.clone(), &room);
            match room.add(Arc::clone(&client)).await {
                Ok(()) => return Ok((room, client)),
                Err(RoomError::Closed) => {
                    tracing::debug!(chat_id = %chat.id, "Room stopped during admission, retrying");
                    room.stopped().await;
                    self.remove_room(&room).await;
                }
                Err(e) => return Err(ChatServiceError::from_room("join room", e)),
            }
        }
        Err(ChatServiceError::RoomClosed)
    }

    async fn find_or_create_room(&self, chat: &Chat) -> Result<Arc<Room>, ChatServiceError> {
        loop {
            let stale = {
                let mut rooms = self.rooms.write().await;
                match rooms.get(&chat.id) {
                    Some(room) if !room.is_closing() => return Ok(Arc::clone(room)),
                    Some(room) => Arc::clone(room),
                    None => {
                        let seed = self.load_history(&chat.id).await?;
                        let room = self.spawn_room(chat.clone(), seed);
                        rooms.insert(chat.id.clone(), Arc::clone(&room));
                        return Ok(room);
                    }
                }
            };

            // 履歴を読み直す前に、前のルームの最終フラッシュを待つ
            stale.stopped().await;
            self.remove_room(&stale).await;
        }
    }

    /// チャットの保存済み最新メッセージを古い順に取得
    async fn load_history(&self, chat_id: &ChatId) -> Result<Vec<ChatMessage>, ChatServiceError> {
        let messages = self
            .messages
            .get_chat_messages(chat_id)
            .await
            .map_err(|e| ChatServiceError::from_repository("load history", e))?;
        Ok(chronological(messages, HISTORY_CAPACITY))
    }

    fn spawn_room(&self, chat: Chat, seed: Vec<ChatMessage>) -> Arc<Room> {
        Room::spawn(
            chat,
            seed,
            Arc::clone(&self.messages),
            Arc::clone(&self.clock),
            self.config.clone(),
            self.shutdown.subscribe(),
        )
    }

    /// `room` の登録を解除する（既に別のルームに置き換わっていれば何もしない）
    async fn remove_room(&self, room: &Arc<Room>) {
        let mut rooms = self.rooms.write().await;
        let chat_id = &room.chat().id;
        if rooms
            .get(chat_id)
            .is_some_and(|registered| Arc::ptr_eq(registered, room))
        {
            rooms.remove(chat_id);
            tracing::info!("Room '{}' unregistered", chat_id);
        }
    }

    /// チャットの保存済みメッセージを古い順に取得
    ///
    /// アクティブなルームがあれば、先に未保存の履歴を保存する。
    pub async fn get_messages(&self, chat_id: &ChatId) -> Result<Vec<ChatMessage>, ChatServiceError> {
        let chat = self.get_chat(chat_id).await?;

        if let Some(room) = self.active_room(&chat.id).await {
            room.stash_history()
                .await
                .map_err(|e| ChatServiceError::from_repository("stash history", e))?;
        }

        let messages = self
            .messages
            .get_chat_messages(&chat.id)
            .await
            .map_err(|e| ChatServiceError::from_repository("get messages", e))?;
        Ok(chronological(messages, usize::MAX))
    }

    /// メッセージ内容を編集（作者本人のみ）
    pub async fn update_message(
        &self,
        chat_id: &ChatId,
        update: MessageUpdate,
    ) -> Result<ChatMessage, ChatServiceError> {
        let chat = self.get_chat(chat_id).await?;

        match self.active_room(&chat.id).await {
            Some(room) => room
                .update_message(update)
                .await
                .map_err(|e| ChatServiceError::from_room("update message", e)),
            None => self
                .messages
                .update_message_content(&chat.id, update)
                .await
                .map_err(|e| ChatServiceError::from_repository("update message", e)),
        }
    }

    /// メッセージを削除（作者本人のみ）
    pub async fn delete_message(
        &self,
        chat_id: &ChatId,
        message_id: &str,
        author_id: &UserId,
    ) -> Result<(), ChatServiceError> {
        let chat = self.get_chat(chat_id).await?;

        match self.active_room(&chat.id).await {
            Some(room) => room
                .delete_message(message_id, author_id)
                .await
                .map_err(|e| ChatServiceError::from_room("delete message", e)),
            None => self
                .messages
                .delete_message(&chat.id, message_id, author_id)
                .await
                .map_err(|e| ChatServiceError::from_repository("delete message", e)),
        }
    }

    /// クライアントのいないルームを停止し、停止後に登録を解除する。回収したルーム数を返す
    pub async fn reclaim_idle_rooms(&self) -> usize {
        let idle: Vec<Arc<Room>> = {
            let rooms = self.rooms.read().await;
            rooms
                .values()
                .filter(|room| room.active_clients() == 0 && !room.is_closing())
                .cloned()
                .collect()
        };

        let reclaimed = join_all(idle.iter().map(|room| async move {
            if !room.close_if_idle().await {
                return false;
            }
            tracing::info!("Closing idle room '{}'", room.chat().id);
            room.stopped().await;
            self.remove_room(room).await;
            true
        }))
        .await;

        reclaimed.into_iter().filter(|closed| *closed).count()
    }

    /// 全ルームを停止し、完了を待つ
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down chat service");
        self.shutdown.send_replace(true);

        let rooms: Vec<Arc<Room>> = self.rooms.write().await.drain().map(|(_, room)| room).collect();
        join_all(rooms.iter().map(|room| room.stopped())).await;
        tracing::info!("Stopped {} rooms", rooms.len());
    }
}

/// 古い順に並べ、最新 `limit` 件を残す
fn chronological(mut messages: Vec<ChatMessage>, limit: usize) -> Vec<ChatMessage> {
    messages.sort_by_key(|msg| msg.created_at);
    let excess = messages.len().saturating_sub(limit);
    messages.drain(..excess);
    messages
}

async fn idle_sweep(
    service: Weak<ChatService>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let Some(service) = service.upgrade() else { break };
                let reclaimed = service.reclaim_idle_rooms().await;
                tracing::debug!("Idle sweep closed {} rooms", reclaimed);
            }
        }
    }
    tracing::debug!("Idle sweep stopped");
}
