//! Un limpiador por categoría y despacho según la clasificación.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::classify::{Category, classify};
use crate::cleaners::Cleaner;
use crate::cleaners::image::ImageCleaner;
use crate::cleaners::media::{FfmpegTool, MediaCleaner};
use crate::cleaners::office::ArchiveRewriter;
use crate::cleaners::pdf::PdfCleaner;
use crate::cleaners::text::TextCleaner;
use crate::config::EngineConfig;
use crate::error::{CleanError, Result};

#[derive(Clone, Default)]
pub struct CleanerRegistry {
    cleaners: HashMap<Category, Arc<dyn Cleaner>>,
}

impl CleanerRegistry {
    /// Registro vacío; cualquier categoría devuelve `NoCleaner` hasta registrarla.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Limpiadores incorporados. Audio y video solo se registran si ffmpeg y
    /// ffprobe están disponibles.
    pub fn with_defaults(config: &EngineConfig) -> Result<Self> {
        let mut registry = Self::empty();
        registry.register(Category::DocumentArchive, Arc::new(ArchiveRewriter));
        registry.register(Category::PageDescription, Arc::new(PdfCleaner));
        registry.register(Category::RasterImage, Arc::new(ImageCleaner));
        registry.register(Category::PlainText, Arc::new(TextCleaner));

        if let Some(tool) = FfmpegTool::locate(config)? {
            for category in [Category::Audio, Category::Video] {
                registry.register(category, Arc::new(MediaCleaner::new(tool.clone(), category)));
            }
        }
        Ok(registry)
    }

    /// Registra `cleaner` para `category`, reemplazando el anterior.
    pub fn register(&mut self, category: Category, cleaner: Arc<dyn Cleaner>) {
        if category == Category::Unsupported {
            tracing::warn!("se ignora el limpiador {} para archivos no soportados", cleaner.name());
            return;
        }
        tracing::debug!("limpiador {} registrado para {category}", cleaner.name());
        self.cleaners.insert(category, cleaner);
    }

    pub fn get(&self, category: Category) -> Result<Arc<dyn Cleaner>> {
        self.cleaners
            .get(&category)
            .cloned()
            .ok_or(CleanError::NoCleaner(category))
    }

    /// Limpiador para `path`. Un archivo no soportado es un error de entrada.
    pub fn resolve(&self, path: &Path) -> Result<(Category, Arc<dyn Cleaner>)> {
        let category = classify(path);
        if category == Category::Unsupported {
            return Err(CleanError::Unsupported(path.to_path_buf()));
        }
        Ok((category, self.get(category)?))
    }

    pub fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self.cleaners.keys().copied().collect();
        categories.sort();
        categories
    }
}
