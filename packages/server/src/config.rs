//! チャットエンジンの設定
//!
//! ルームエンジンのタイミングと容量の設定値をまとめます。
//! デフォルト値は本番用の値で、バイナリは一部を CLI フラグで上書きし、
//! テストはタイマーを短くして使います。
//! 履歴の容量とハイウォーターマークは固定長リングの型に組み込まれているため、
//! `domain::history` の定数として定義しています。

use std::time::Duration;

/// ルームエンジンの設定
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// 履歴の定期フラッシュ間隔
    /// デフォルト: 10 分
    pub flush_interval: Duration,

    /// 要求フラッシュ失敗時のリトライ回数（試行回数 = 1 + リトライ回数）
    /// デフォルト: 3
    pub flush_retries: u32,

    /// フラッシュ試行間の固定待機時間
    /// デフォルト: 1 秒
    pub flush_backoff: Duration,

    /// クライアントのいないルームを探す間隔
    /// デフォルト: 60 分
    pub idle_check_interval: Duration,

    /// ルームのブロードキャストキューの容量
    /// デフォルト: 100
    pub broadcast_capacity: usize,

    /// 接続ごとの設定
    pub session: SessionConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(10 * 60),
            flush_retries: 3,
            flush_backoff: Duration::from_secs(1),
            idle_check_interval: Duration::from_secs(60 * 60),
            broadcast_capacity: 100,
            session: SessionConfig::default(),
        }
    }
}

/// クライアントセッションの設定
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 1 回の送信の期限
    /// デフォルト: 10 秒
    pub write_wait: Duration,

    /// 受信の期限（pong を受け取るたびに延長）
    /// デフォルト: 60 秒
    pub pong_wait: Duration,

    /// 送信メールボックスの容量（バッチ単位）
    /// デフォルト: 256
    pub mailbox_capacity: usize,

    /// トランスポートが受け付ける最大受信フレームサイズ（バイト）
    /// デフォルト: 512
    pub max_message_size: usize,
}

impl SessionConfig {
    /// ping の送信間隔（pong 待ち時間の 9/10）
    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            write_wait: Duration::from_secs(10),
            pong_wait: Duration::from_secs(60),
            mailbox_capacity: 256,
            max_message_size: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_period_is_nine_tenths_of_pong_wait() {
        // テスト項目: ping 間隔は pong 待ち時間の 9/10 になる
        // given (前提条件):
        let session = SessionConfig::default();

        // when (操作):
        let ping_period = session.ping_period();

        // then (期待する結果):
        assert_eq!(ping_period, Duration::from_secs(54));
        assert!(ping_period < session.pong_wait);
    }

    #[test]
    fn test_default_flush_policy() {
        // テスト項目: デフォルトのフラッシュ設定（10 分周期、3 回リトライ、1 秒待機）
        // given (前提条件):

        // when (操作):
        let config = ChatConfig::default();

        // then (期待する結果):
        assert_eq!(config.flush_interval, Duration::from_secs(600));
        assert_eq!(config.flush_retries, 3);
        assert_eq!(config.flush_backoff, Duration::from_secs(1));
        assert_eq!(config.idle_check_interval, Duration::from_secs(3600));
    }
}
