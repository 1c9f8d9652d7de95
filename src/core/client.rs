//! Transport seam between components and the browser.
//!
//! Components never own a socket. They write frames into a [`Client`], and
//! whoever hosts the page decides how those frames reach the browser.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::Result;

/// Fire-and-forget writer for one client connection.
pub trait Client {
    fn write_text(&mut self, text: &str) -> Result<()>;

    fn write_binary(&mut self, data: &[u8]) -> Result<()>;

    /// Plain write; text frames unless a transport says otherwise.
    fn write(&mut self, text: &str) -> Result<()> {
        self.write_text(text)
    }
}

/// Serialize `msg` and send it as one text frame.
pub fn send_json<T: Serialize + ?Sized>(client: &mut dyn Client, msg: &T) -> Result<()> {
    let text = serde_json::to_string(msg)?;
    client.write(&text)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// In-memory client. Clones share one queue, so a host can hand a clone
/// to a widget as its fast transport and drain both from one place.
#[derive(Debug, Clone, Default)]
pub struct BufferedClient {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl BufferedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued frame, oldest first.
    pub fn drain(&self) -> Vec<Frame> {
        std::mem::take(&mut *self.frames.lock())
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Queued text frames parsed as JSON. Non-JSON text is skipped.
    pub fn json_messages(&self) -> Vec<serde_json::Value> {
        self.frames
            .lock()
            .iter()
            .filter_map(|f| match f {
                Frame::Text(t) => serde_json::from_str(t).ok(),
                Frame::Binary(_) => None,
            })
            .collect()
    }

    pub fn binary_frames(&self) -> Vec<Vec<u8>> {
        self.frames
            .lock()
            .iter()
            .filter_map(|f| match f {
                Frame::Binary(b) => Some(b.clone()),
                Frame::Text(_) => None,
            })
            .collect()
    }
}

impl Client for BufferedClient {
    fn write_text(&mut self, text: &str) -> Result<()> {
        self.frames.lock().push(Frame::Text(text.to_string()));
        Ok(())
    }

    fn write_binary(&mut self, data: &[u8]) -> Result<()> {
        self.frames.lock().push(Frame::Binary(data.to_vec()));
        Ok(())
    }
}
