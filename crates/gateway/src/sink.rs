//! Destinations for shell output units.

use std::{
    io::Write,
    sync::{Arc, Mutex, PoisonError},
};

use {naia_protocol::shell::ShellChunk, tokio::sync::mpsc, tracing::warn};

/// Receives output units in emission order.
pub trait OutputSink: Send + Sync {
    fn write_line(&self, chunk: ShellChunk);
}

impl<S: OutputSink + ?Sized> OutputSink for Arc<S> {
    fn write_line(&self, chunk: ShellChunk) {
        (**self).write_line(chunk);
    }
}

impl OutputSink for mpsc::UnboundedSender<ShellChunk> {
    fn write_line(&self, chunk: ShellChunk) {
        let _ = self.send(chunk);
    }
}

/// Buffers every unit in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    chunks: Arc<Mutex<Vec<ShellChunk>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> Vec<ShellChunk> {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Concatenated `text` units.
    pub fn text(&self) -> String {
        self.chunks()
            .iter()
            .filter_map(|chunk| match chunk {
                ShellChunk::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .concat()
    }

    pub fn terminal_count(&self) -> usize {
        self.chunks().iter().filter(|c| c.is_terminal()).count()
    }
}

impl OutputSink for CollectingSink {
    fn write_line(&self, chunk: ShellChunk) {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(chunk);
    }
}

/// Writes one JSON object per line, flushing after each.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> OutputSink for JsonLinesSink<W> {
    fn write_line(&self, chunk: ShellChunk) {
        let line = match serde_json::to_string(&chunk) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to encode output unit");
                return;
            },
        };
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(writer, "{line}").and_then(|()| writer.flush()) {
            warn!(error = %e, "failed to write output unit");
        }
    }
}
