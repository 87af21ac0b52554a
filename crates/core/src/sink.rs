//! Output sinks: where user-visible content goes.
//!
//! Action handlers never talk to a transport directly. They emit [`Content`]
//! through the [`OutputSink`] passed into their execution context, and the
//! host routes it to whatever transport originated the message.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SinkError;
use crate::message::Content;

/// A destination for emitted content.
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Deliver one piece of content.
    async fn emit(&self, content: Content) -> Result<(), SinkError>;
}

/// Forwards emissions into an unbounded channel.
///
/// Transports hold the receiving half and deliver each item as it arrives.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Content>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Content>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl OutputSink for ChannelSink {
    async fn emit(&self, content: Content) -> Result<(), SinkError> {
        self.tx.send(content).map_err(|_| SinkError::Closed)
    }
}

/// Discards everything.
pub struct NullSink;

#[async_trait]
impl OutputSink for NullSink {
    async fn emit(&self, _content: Content) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Wraps another sink and keeps a copy of every successful emission.
pub struct RecordingSink<'a> {
    inner: &'a dyn OutputSink,
    recorded: Mutex<Vec<Content>>,
}

impl<'a> RecordingSink<'a> {
    pub fn new(inner: &'a dyn OutputSink) -> Self {
        Self {
            inner,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Everything emitted so far, in emission order.
    pub fn into_recorded(self) -> Vec<Content> {
        self.recorded
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl OutputSink for RecordingSink<'_> {
    async fn emit(&self, content: Content) -> Result<(), SinkError> {
        self.inner.emit(content.clone()).await?;
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(content);
        Ok(())
    }
}

/// A sink that collects emissions in a shared buffer.
///
/// Cloning shares the buffer, so a host can hand one clone to the runtime
/// and read the other afterwards.
#[derive(Clone, Default)]
pub struct BufferSink {
    buffer: Arc<Mutex<Vec<Content>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<Content> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl OutputSink for BufferSink {
    async fn emit(&self, content: Content) -> Result<(), SinkError> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(content);
        Ok(())
    }
}
