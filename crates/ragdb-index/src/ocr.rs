//! Process-wide OCR engine.
//!
//! OCR models are expensive to load, so the first `acquire` builds the engine
//! and every later call gets the same instance. A failed init leaves the slot
//! empty so the next caller can retry.

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::info;

use ragdb_core::traits::Loader;
use ragdb_core::types::Document;

pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image: &[u8]) -> anyhow::Result<String>;
}

pub type OcrInit = fn() -> anyhow::Result<Box<dyn OcrBackend>>;

pub struct OcrEngine {
    backend: Box<dyn OcrBackend>,
}

static ENGINE: OnceCell<Arc<OcrEngine>> = OnceCell::new();

impl OcrEngine {
    pub fn acquire(init: OcrInit) -> anyhow::Result<Arc<OcrEngine>> {
        ENGINE
            .get_or_try_init(|| {
                info!("initializing OCR engine");
                Ok::<_, anyhow::Error>(Arc::new(OcrEngine { backend: init()? }))
            })
            .cloned()
    }

    /// The engine if some caller already initialized it.
    pub fn get() -> Option<Arc<OcrEngine>> { ENGINE.get().cloned() }

    pub fn recognize(&self, image: &[u8]) -> anyhow::Result<String> { self.backend.recognize(image) }
}

/// Image loader: one document with the recognized text.
pub struct OcrImageLoader {
    init: OcrInit,
}

impl OcrImageLoader {
    pub fn new(init: OcrInit) -> Self { Self { init } }
}

impl Loader for OcrImageLoader {
    fn load(&self, path: &Path) -> anyhow::Result<Vec<Document>> {
        let bytes = std::fs::read(path)?;
        let text = OcrEngine::acquire(self.init)?.recognize(&bytes)?;
        Ok(vec![Document::new(text)])
    }
}
