//! Clasificación de archivos por categoría de capacidad a partir de su extensión.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const DOCUMENT_ARCHIVE_EXTENSIONS: &[&str] = &["docx", "xlsx", "pptx", "odt", "ods", "odp"];
const PAGE_DESCRIPTION_EXTENSIONS: &[&str] = &["pdf"];
const RASTER_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "gif", "bmp", "webp"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "m4a", "ogg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv"];
const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "rtf"];

/// Categoría de capacidad de un archivo. Se asigna una sola vez por operación.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    DocumentArchive,
    PageDescription,
    RasterImage,
    Audio,
    Video,
    PlainText,
    Unsupported,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::DocumentArchive,
        Category::PageDescription,
        Category::RasterImage,
        Category::Audio,
        Category::Video,
        Category::PlainText,
        Category::Unsupported,
    ];

    /// Resuelve la categoría de una extensión (sin distinguir mayúsculas, con o sin punto).
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.trim_start_matches('.').to_lowercase();
        let ext = ext.as_str();

        if DOCUMENT_ARCHIVE_EXTENSIONS.contains(&ext) {
            Category::DocumentArchive
        } else if PAGE_DESCRIPTION_EXTENSIONS.contains(&ext) {
            Category::PageDescription
        } else if RASTER_IMAGE_EXTENSIONS.contains(&ext) {
            Category::RasterImage
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            Category::Audio
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            Category::Video
        } else if PLAIN_TEXT_EXTENSIONS.contains(&ext) {
            Category::PlainText
        } else {
            Category::Unsupported
        }
    }

    pub fn is_supported(self) -> bool {
        self != Category::Unsupported
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::DocumentArchive => "document-archive",
            Category::PageDescription => "page-description",
            Category::RasterImage => "raster-image",
            Category::Audio => "audio",
            Category::Video => "video",
            Category::PlainText => "plain-text",
            Category::Unsupported => "unsupported",
        }
    }

    /// Extensiones reconocidas para la categoría.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Category::DocumentArchive => DOCUMENT_ARCHIVE_EXTENSIONS,
            Category::PageDescription => PAGE_DESCRIPTION_EXTENSIONS,
            Category::RasterImage => RASTER_IMAGE_EXTENSIONS,
            Category::Audio => AUDIO_EXTENSIONS,
            Category::Video => VIDEO_EXTENSIONS,
            Category::PlainText => PLAIN_TEXT_EXTENSIONS,
            Category::Unsupported => &[],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clasifica un archivo según su extensión. Las extensiones desconocidas devuelven
/// `Category::Unsupported`; decidir si eso es un error corresponde al llamador.
pub fn classify(path: &Path) -> Category {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(Category::from_extension)
        .unwrap_or(Category::Unsupported)
}

pub fn is_supported_file(path: &Path) -> bool {
    classify(path).is_supported()
}

/// Extensión en minúsculas, cadena vacía si no existe.
pub(crate) fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}
