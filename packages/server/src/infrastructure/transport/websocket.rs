//! axum WebSocket を使った Connection 実装
//!
//! WebSocket の upgrade は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は upgrade 済みのソケットを受け取り、送信側・受信側に分割して
//! セッションに渡します。

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};

use crate::domain::{Connection, ConnectionError, Frame, FrameSink, FrameStream};

/// upgrade 済みの WebSocket
pub struct WebSocketConnection {
    socket: WebSocket,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl Connection for WebSocketConnection {
    type Sink = WebSocketSink;
    type Stream = WebSocketStream;

    fn split(self) -> (Self::Sink, Self::Stream) {
        let (sink, stream) = self.socket.split();
        (WebSocketSink { sink }, WebSocketStream { stream })
    }
}

pub struct WebSocketSink {
    sink: SplitSink<WebSocket, Message>,
}

pub struct WebSocketStream {
    stream: SplitStream<WebSocket>,
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Ping(payload) => Message::Ping(payload.into()),
        Frame::Pong(payload) => Message::Pong(payload.into()),
        Frame::Close => Message::Close(None),
    }
}

fn to_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        // バイナリは UTF-8 テキストとして（不正なバイトは置換して）読む
        Message::Binary(bytes) => Frame::Text(String::from_utf8_lossy(&bytes).into_owned()),
        Message::Ping(payload) => Frame::Ping(payload.to_vec()),
        Message::Pong(payload) => Frame::Pong(payload.to_vec()),
        Message::Close(_) => Frame::Close,
    }
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        self.sink
            .send(to_message(frame))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }
}

#[async_trait]
impl FrameStream for WebSocketStream {
    async fn next(&mut self) -> Option<Result<Frame, ConnectionError>> {
        match self.stream.next().await? {
            Ok(message) => Some(Ok(to_frame(message))),
            Err(e) => Some(Err(ConnectionError::Transport(e.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frame_round_trips_through_message() {
        // テスト項目: テキストフレームは WebSocket のテキストメッセージとして送受信される
        // given (前提条件):
        let frame = Frame::Text(r#"{"content":"hi"}"#.to_string());

        // when (操作):
        let message = to_message(frame.clone());

        // then (期待する結果):
        assert!(matches!(message, Message::Text(_)));
        assert_eq!(to_frame(message), frame);
    }

    #[test]
    fn test_binary_message_is_read_as_text() {
        // テスト項目: バイナリメッセージは UTF-8 テキストとして読み取られる
        // given (前提条件):
        let message = Message::Binary(b"{\"content\":\"hi\"}".to_vec().into());

        // when (操作):
        let frame = to_frame(message);

        // then (期待する結果):
        assert_eq!(frame, Frame::Text(r#"{"content":"hi"}"#.to_string()));
    }

    #[test]
    fn test_close_frame_maps_to_close_message() {
        // テスト項目: クローズフレームは WebSocket のクローズメッセージになる
        // given (前提条件):
        let frame = Frame::Close;

        // when (操作):
        let message = to_message(frame);

        // then (期待する結果):
        assert!(matches!(message, Message::Close(None)));
        assert_eq!(to_frame(message), Frame::Close);
    }
}
