//! Components with a second, high-rate transport.
//!
//! Plots stream binary samples separately from the JSON control channel.
//! That transport is attached after construction; until then every access
//! reports [`VizError::NotAttached`].

use std::ops::{Deref, DerefMut};

use crate::client::Client;
use crate::error::{Result, VizError};

pub type FastClient = Box<dyn Client + Send>;

#[derive(Default)]
pub struct Widget {
    fast_client: Option<FastClient>,
}

impl Widget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, fast_client: FastClient) {
        self.fast_client = Some(fast_client);
    }

    pub fn detach(&mut self) -> Option<FastClient> {
        self.fast_client.take()
    }

    pub fn is_attached(&self) -> bool {
        self.fast_client.is_some()
    }

    pub fn fast_client(&mut self) -> Result<&mut (dyn Client + Send + 'static)> {
        self.fast_client.as_deref_mut().ok_or(VizError::NotAttached)
    }
}

impl std::fmt::Debug for Widget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Widget")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Marker for widgets that draw data series.
#[derive(Debug, Default)]
pub struct Plot {
    widget: Widget,
}

impl Plot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Deref for Plot {
    type Target = Widget;

    fn deref(&self) -> &Widget {
        &self.widget
    }
}

impl DerefMut for Plot {
    fn deref_mut(&mut self) -> &mut Widget {
        &mut self.widget
    }
}
