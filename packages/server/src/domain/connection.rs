//! 双方向コネクションの抽象化
//!
//! セッションのループはフレームの送信と受信だけを必要とします。
//! トランスポートのハンドシェイクは `Connection` の生成前に完了しており、
//! WebSocket 用のアダプターは `infrastructure::transport` にあります。

use async_trait::async_trait;

use super::error::ConnectionError;

/// クライアントセッションから見たトランスポートのフレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// コネクションの送信側
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: Frame) -> Result<(), ConnectionError>;
}

/// コネクションの受信側
#[async_trait]
pub trait FrameStream: Send {
    /// 次の受信フレーム。相手が切断した後は `None`
    async fn next(&mut self) -> Option<Result<Frame, ConnectionError>>;
}

/// 確立済みの双方向コネクション（両側を drop すると解放される）
pub trait Connection: Send + 'static {
    type Sink: FrameSink + 'static;
    type Stream: FrameStream + 'static;

    fn split(self) -> (Self::Sink, Self::Stream);
}
