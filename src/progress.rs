use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub percent: f32,
    pub message: String,
}

/// One-way progress channel shared by every phase of a run.
///
/// A reporter covers a band of the overall 0..=100 range; phases report in
/// their own 0..=100 scale and [`Progress::band`] maps that into the parent.
/// Reported values never decrease across the whole run, whichever band they
/// come from.
#[derive(Debug, Clone)]
pub struct Progress {
    sender: Option<UnboundedSender<ProgressEvent>>,
    start: f32,
    end: f32,
    last: Arc<Mutex<f32>>,
}

impl Progress {
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_sender(Some(tx)), rx)
    }

    pub fn silent() -> Self {
        Self::with_sender(None)
    }

    fn with_sender(sender: Option<UnboundedSender<ProgressEvent>>) -> Self {
        Self {
            sender,
            start: 0.0,
            end: 100.0,
            last: Arc::new(Mutex::new(0.0)),
        }
    }

    pub fn band(&self, start: f32, end: f32) -> Self {
        Self {
            sender: self.sender.clone(),
            start: self.map(start),
            end: self.map(end),
            last: Arc::clone(&self.last),
        }
    }

    pub fn report(&self, percent: f32, message: impl Into<String>) {
        let mapped = self.map(percent);
        let percent = {
            let mut last = self.last.lock().unwrap_or_else(|err| err.into_inner());
            let value = mapped.max(*last);
            *last = value;
            value
        };
        let message = message.into();
        tracing::debug!(percent, message = %message, "progress");
        if let Some(sender) = &self.sender {
            // A dropped receiver only means nobody is watching.
            let _ = sender.send(ProgressEvent { percent, message });
        }
    }

    fn map(&self, local: f32) -> f32 {
        let local = if local.is_nan() { 0.0 } else { local.clamp(0.0, 100.0) };
        if local >= 100.0 {
            return self.end;
        }
        self.start + (self.end - self.start) * (local / 100.0)
    }
}
