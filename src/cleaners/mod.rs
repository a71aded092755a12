//! Limpiadores por categoría y el contrato que todos cumplen.

pub mod image;
pub mod media;
pub mod office;
pub mod pdf;
pub mod text;

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::policy::CleaningLevel;

/// Campo de metadata → valor.
pub type MetadataMap = BTreeMap<String, String>;

/// Lo que un limpiador informa tras una limpieza correcta.
#[derive(Clone, Debug, Default)]
pub struct CleanReport {
    /// Solo los campos realmente eliminados, con su valor previo.
    pub metadata_removed: MetadataMap,
    pub warnings: Vec<String>,
}

impl CleanReport {
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

pub trait Cleaner: Send + Sync {
    fn name(&self) -> &str;

    /// Metadata visible en `path`. Nunca falla: un archivo ilegible devuelve un mapa vacío.
    fn extract_metadata(&self, path: &Path) -> MetadataMap;

    /// Escribe en `output` una versión limpia de `input`. `input` y `output` pueden
    /// coincidir; si la limpieza falla `output` queda intacto.
    fn clean(&self, input: &Path, output: &Path, level: CleaningLevel) -> Result<CleanReport>;
}

/// Inserta sin pisar claves repetidas: la segunda aparición recibe el sufijo `#2`.
pub(crate) fn insert_unique(map: &mut MetadataMap, key: String, value: String) {
    if !map.contains_key(&key) {
        map.insert(key, value);
        return;
    }
    let mut index = 2;
    while map.contains_key(&format!("{key}#{index}")) {
        index += 1;
    }
    map.insert(format!("{key}#{index}"), value);
}

/// Recorta un valor a `limit` caracteres.
pub fn truncate_value(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}
