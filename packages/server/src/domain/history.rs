//! ルームのメッセージ履歴
//!
//! ルームごとの直近メッセージを保持する固定長リングバッファと、
//! まだ永続化されていないエントリ数を管理します。
//! 容量を超えると最も古いスロットを黙って上書きします。

use std::sync::{
    PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    atomic::{AtomicUsize, Ordering},
};

use tokio::sync::mpsc;

use super::entity::ChatMessage;

/// ルーム履歴のスロット数
pub const HISTORY_CAPACITY: usize = 100;

/// 臨時フラッシュを要求する未保存件数（容量の 80%）
pub const HIGH_WATER_MARK: usize = HISTORY_CAPACITY * 4 / 5;

struct Ring {
    slots: Box<[Option<ChatMessage>; HISTORY_CAPACITY]>,
    /// 最後に書き込んだスロットの位置
    cursor: usize,
    /// 使用中のスロット数（`HISTORY_CAPACITY` を超えない）
    count: usize,
}

impl Ring {
    fn new() -> Self {
        Self {
            slots: Box::new(std::array::from_fn(|_| None)),
            cursor: HISTORY_CAPACITY - 1,
            count: 0,
        }
    }

    fn push(&mut self, msg: ChatMessage) {
        self.cursor = (self.cursor + 1) % HISTORY_CAPACITY;
        self.slots[self.cursor] = Some(msg);
        if self.count < HISTORY_CAPACITY {
            self.count += 1;
        }
    }

    /// 最新 `n` 件を古い順に返す
    fn latest(&self, n: usize) -> Vec<ChatMessage> {
        let n = n.min(self.count);
        let start = (self.cursor + HISTORY_CAPACITY + 1 - n) % HISTORY_CAPACITY;
        (0..n)
            .filter_map(|i| self.slots[(start + i) % HISTORY_CAPACITY].clone())
            .collect()
    }
}

/// ルームごとの履歴バッファ
pub struct History {
    ring: RwLock<Ring>,
    /// 最後のフラッシュ成功以降に追加された件数（上書き済みを含む）
    pending: AtomicUsize,
    flush_trigger: Option<mpsc::Sender<()>>,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// フラッシュ要求先を持たない履歴を作成
    pub fn new() -> Self {
        Self {
            ring: RwLock::new(Ring::new()),
            pending: AtomicUsize::new(0),
            flush_trigger: None,
        }
    }

    /// 未保存件数がハイウォーターマークに達したら `trigger` にフラッシュを要求する履歴を作成
    pub fn with_flush_trigger(trigger: mpsc::Sender<()>) -> Self {
        Self {
            flush_trigger: Some(trigger),
            ..Self::new()
        }
    }

    pub fn add(&self, msg: ChatMessage) {
        let crossed = {
            let mut ring = self.write_ring();
            ring.push(msg);
            self.note_added(1)
        };
        if crossed {
            self.request_flush();
        }
    }

    /// 各メッセージを順に `add` するのと同じ
    pub fn add_batch(&self, msgs: Vec<ChatMessage>) {
        if msgs.is_empty() {
            return;
        }
        let crossed = {
            let mut ring = self.write_ring();
            let added = msgs.len();
            for msg in msgs {
                ring.push(msg);
            }
            self.note_added(added)
        };
        if crossed {
            self.request_flush();
        }
    }

    /// バッファ内の全メッセージのスナップショット（古い順）
    pub fn read(&self) -> Vec<ChatMessage> {
        let ring = self.read_ring();
        ring.latest(ring.count)
    }

    /// 未保存メッセージのスナップショット（古い順）
    ///
    /// 保存前に上書きされたエントリはもう読めないため、ここで未保存件数から外す。
    pub fn read_new(&self) -> Vec<ChatMessage> {
        let ring = self.read_ring();
        let pending = self.pending.fetch_min(ring.count, Ordering::AcqRel);
        ring.latest(pending)
    }

    /// `read_new` で取得して保存した `flushed` 件を保存済みにする
    ///
    /// 保存中に追加されたエントリは未保存のまま残る。
    pub fn mark_flushed(&self, flushed: usize) {
        let _ring = self.write_ring();
        let pending = self.pending.load(Ordering::Acquire);
        self.pending
            .store(pending.saturating_sub(flushed), Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.read_ring().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 未保存件数（ロックを取らないため、並行書き込み中は概算）
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// バッファ内のメッセージに編集を反映する。リングに残っていなければ `false`
    pub fn update_content(&self, message_id: &str, content: &str) -> bool {
        let mut ring = self.write_ring();
        let slot = ring
            .slots
            .iter_mut()
            .flatten()
            .find(|msg| msg.id == message_id);
        match slot {
            Some(msg) => {
                msg.content = content.to_string();
                msg.is_edited = true;
                true
            }
            None => false,
        }
    }

    /// バッファからメッセージを削除し、残りの順序は保つ。リングに残っていなければ `false`
    pub fn remove(&self, message_id: &str) -> bool {
        let mut ring = self.write_ring();
        let mut messages = ring.latest(ring.count);
        let Some(position) = messages.iter().position(|msg| msg.id == message_id) else {
            return false;
        };

        let pending = self.pending.load(Ordering::Acquire);
        if position >= messages.len() - pending.min(messages.len()) {
            self.pending.store(pending - 1, Ordering::Release);
        }

        messages.remove(position);
        *ring = Ring::new();
        for msg in messages {
            ring.push(msg);
        }
        true
    }

    /// リングの書き込みロックを保持した状態で呼ぶこと。ハイウォーターマークを跨いだかを返す
    fn note_added(&self, added: usize) -> bool {
        let previous = self.pending.fetch_add(added, Ordering::AcqRel);
        let current = previous + added;
        previous < HIGH_WATER_MARK && current >= HIGH_WATER_MARK
    }

    fn request_flush(&self) {
        let Some(trigger) = &self.flush_trigger else {
            return;
        };
        match trigger.try_send(()) {
            // Full: フラッシュ要求は既に積まれている
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {
                tracing::debug!("History reached high-water mark, flush requested");
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                tracing::warn!("History reached high-water mark but flush task is gone");
            }
        }
    }

    fn read_ring(&self) -> RwLockReadGuard<'_, Ring> {
        self.ring.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_ring(&self) -> RwLockWriteGuard<'_, Ring> {
        self.ring.write().unwrap_or_else(PoisonError::into_inner)
    }
}
