//! OCR engine seam: the engine internals are treated as a black-box
//! text extractor. `OcrEngine` is the only contract the Worker Pool
//! depends on; the concrete engine shells out to an external
//! `tesseract`-compatible binary over stdin/stdout, the same
//! subprocess-as-black-box shape `readur`'s `EnhancedOcrService` wraps.
//!
//! GPU workers try the GPU binary first; on failure, if
//! `OCR_AUTOFALLBACK` is enabled, CPU OCR runs in-process for the same
//! attempt rather than requeuing onto the CPU family.

use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String>;
}

/// Invokes an external OCR binary, feeding the document bytes on stdin
/// and reading extracted text from stdout. `binary` defaults to
/// `tesseract` (`- - -l <lang>`, the CLI convention for stdin/stdout
/// processing); GPU deployments point it at a GPU-accelerated build.
pub struct SubprocessOcrEngine {
    binary: String,
    lang: String,
}

impl SubprocessOcrEngine {
    pub fn cpu(lang: impl Into<String>) -> Self {
        Self {
            binary: "tesseract".to_string(),
            lang: lang.into(),
        }
    }

    pub fn gpu(lang: impl Into<String>) -> Self {
        Self {
            binary: "tesseract-gpu".to_string(),
            lang: lang.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for SubprocessOcrEngine {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        let mut child = Command::new(&self.binary)
            .arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn OCR engine '{}'", self.binary))?;

        let mut stdin = child.stdin.take().context("OCR engine stdin unavailable")?;
        stdin.write_all(bytes).await.context("failed to write document to OCR engine")?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("failed to read OCR engine output")?;

        if !output.status.success() {
            anyhow::bail!(
                "OCR engine '{}' exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        String::from_utf8(output.stdout).context("OCR engine produced non-UTF-8 output")
    }
}

/// GPU-first with CPU in-process fallback on any GPU engine failure.
pub struct GpuWithCpuFallback {
    gpu: SubprocessOcrEngine,
    cpu: SubprocessOcrEngine,
    autofallback: bool,
}

impl GpuWithCpuFallback {
    pub fn new(lang: impl Into<String>, autofallback: bool) -> Self {
        let lang = lang.into();
        Self {
            gpu: SubprocessOcrEngine::gpu(lang.clone()),
            cpu: SubprocessOcrEngine::cpu(lang),
            autofallback,
        }
    }
}

#[async_trait]
impl OcrEngine for GpuWithCpuFallback {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        match self.gpu.extract_text(bytes).await {
            Ok(text) => Ok(text),
            Err(err) if self.autofallback => {
                tracing::warn!(error = %err, "GPU OCR failed, falling back to CPU OCR for this attempt");
                self.cpu.extract_text(bytes).await
            }
            Err(err) => Err(err),
        }
    }
}
