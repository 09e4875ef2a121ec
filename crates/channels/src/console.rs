//! Terminal sink: answers on stdout, progress notices on stderr.

use async_trait::async_trait;
use asklab_core::channel::{ChatSink, ProgressEvent};
use asklab_core::error::ChannelError;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

pub struct ConsoleSink {
    out: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    err: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    show_progress: bool,
}

impl ConsoleSink {
    pub fn new(show_progress: bool) -> Self {
        Self::with_writers(Box::new(tokio::io::stdout()), Box::new(tokio::io::stderr()), show_progress)
    }

    pub fn with_writers(
        out: Box<dyn AsyncWrite + Send + Unpin>,
        err: Box<dyn AsyncWrite + Send + Unpin>,
        show_progress: bool,
    ) -> Self {
        Self {
            out: Mutex::new(out),
            err: Mutex::new(err),
            show_progress,
        }
    }
}

async fn write_line(
    writer: &Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    text: &str,
) -> Result<(), ChannelError> {
    let mut writer = writer.lock().await;
    let delivery = |e: std::io::Error| ChannelError::DeliveryFailed {
        channel: "cli".into(),
        reason: e.to_string(),
    };
    writer.write_all(text.as_bytes()).await.map_err(delivery)?;
    writer.write_all(b"\n").await.map_err(delivery)?;
    writer.flush().await.map_err(delivery)
}

#[async_trait]
impl ChatSink for ConsoleSink {
    async fn send(&self, text: &str) -> Result<(), ChannelError> {
        write_line(&self.out, text).await
    }

    async fn progress(&self, event: &ProgressEvent) -> Result<(), ChannelError> {
        if !self.show_progress {
            return Ok(());
        }
        write_line(&self.err, &event.render()).await
    }
}
