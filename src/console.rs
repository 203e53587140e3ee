use crate::widgets::Surface;
use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

/// Writes face updates to stdout as JSON lines, mirroring the event format
/// read from stdin. Images are reported by size only.
pub struct ConsoleSurface {
    out: Mutex<Stdout>,
}

impl Default for ConsoleSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleSurface {
    pub fn new() -> Self {
        Self { out: Mutex::new(tokio::io::stdout()) }
    }

    async fn emit(&self, value: serde_json::Value) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(&value)?;
        line.push(b'\n');
        let mut out = self.out.lock().await;
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Surface for ConsoleSurface {
    async fn set_title(&self, id: &str, title: &str) -> anyhow::Result<()> {
        self.emit(json!({"face": "title", "id": id, "title": title})).await
    }

    async fn set_image(&self, id: &str, image: &str) -> anyhow::Result<()> {
        self.emit(json!({"face": "image", "id": id, "bytes": image.len()})).await
    }

    async fn set_state(&self, id: &str, state: u8) -> anyhow::Result<()> {
        self.emit(json!({"face": "state", "id": id, "state": state})).await
    }

    async fn show_ok(&self, id: &str) -> anyhow::Result<()> {
        self.emit(json!({"face": "ok", "id": id})).await
    }

    async fn show_alert(&self, id: &str) -> anyhow::Result<()> {
        self.emit(json!({"face": "alert", "id": id})).await
    }
}
