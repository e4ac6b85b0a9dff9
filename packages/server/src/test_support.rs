//! In-process connection for driving sessions in tests.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{Connection, ConnectionError, Frame, FrameSink, FrameStream};

pub(crate) struct ChannelConnection {
    outbound: mpsc::UnboundedSender<Frame>,
    inbound: mpsc::UnboundedReceiver<Result<Frame, ConnectionError>>,
}

pub(crate) struct ChannelSink(mpsc::UnboundedSender<Frame>);

pub(crate) struct ChannelStream(mpsc::UnboundedReceiver<Result<Frame, ConnectionError>>);

/// The remote end of a `ChannelConnection`. Dropping it disconnects the peer.
pub(crate) struct Peer {
    /// Frames written by the server
    pub sent: mpsc::UnboundedReceiver<Frame>,
    tx: Option<mpsc::UnboundedSender<Result<Frame, ConnectionError>>>,
}

impl Peer {
    pub fn send(&self, frame: Frame) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Ok(frame));
        }
    }

    /// Deliver a transport failure to the session's receiver.
    pub fn fail(&self, error: ConnectionError) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Err(error));
        }
    }

    /// End the inbound stream while still accepting outbound frames.
    pub fn hang_up(&mut self) {
        self.tx.take();
    }

    pub fn send_text(&self, text: &str) {
        self.send(Frame::Text(text.to_string()));
    }
}

pub(crate) fn channel_connection() -> (ChannelConnection, Peer) {
    let (outbound, sent) = mpsc::unbounded_channel();
    let (tx, inbound) = mpsc::unbounded_channel();
    (
        ChannelConnection { outbound, inbound },
        Peer { sent, tx: Some(tx) },
    )
}

/// Collect the next `n` text frames written to `peer`, skipping pings.
pub(crate) async fn text_frames(peer: &mut Peer, n: usize) -> Vec<String> {
    let mut texts = Vec::with_capacity(n);
    while texts.len() < n {
        let frame = tokio::time::timeout(Duration::from_secs(5), peer.sent.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed");
        if let Frame::Text(text) = frame {
            texts.push(text);
        }
    }
    texts
}

impl Connection for ChannelConnection {
    type Sink = ChannelSink;
    type Stream = ChannelStream;

    fn split(self) -> (Self::Sink, Self::Stream) {
        (ChannelSink(self.outbound), ChannelStream(self.inbound))
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        self.0.send(frame).map_err(|_| ConnectionError::Closed)
    }
}

#[async_trait]
impl FrameStream for ChannelStream {
    async fn next(&mut self) -> Option<Result<Frame, ConnectionError>> {
        self.0.recv().await
    }
}
