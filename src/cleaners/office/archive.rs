use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::classify::lowercase_extension;
use crate::error::{CleanError, Result};

use super::constants::{CONTENT_TYPES_PART, ODF_MANIFEST_PART, ODF_MIMETYPE_PART};

/// Familia del contenedor, deducida de su manifiesto o, en su defecto, de la extensión.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArchiveFlavor {
    OfficeOpenXml,
    OpenDocument,
}

impl ArchiveFlavor {
    pub fn manifest_part(self) -> &'static str {
        match self {
            ArchiveFlavor::OfficeOpenXml => CONTENT_TYPES_PART,
            ArchiveFlavor::OpenDocument => ODF_MANIFEST_PART,
        }
    }
}

/// Entrada del contenedor. El contenido se trata como bytes opacos.
#[derive(Clone, Debug)]
pub struct ArchivePart {
    pub name: String,
    pub data: Vec<u8>,
    pub is_dir: bool,
}

/// Conjunto ordenado de partes de un documento basado en ZIP.
#[derive(Clone, Debug)]
pub struct ArchiveDocument {
    flavor: ArchiveFlavor,
    parts: Vec<ArchivePart>,
}

impl ArchiveDocument {
    /// Lee todas las partes del contenedor. Una entrada que no es ZIP es un error de entrada.
    pub fn read(path: &Path) -> Result<Self> {
        let source_file = File::open(path).map_err(|e| CleanError::io(path, e))?;
        let mut archive = ZipArchive::new(source_file)
            .map_err(|e| CleanError::unreadable(path, format!("no es un contenedor ZIP válido: {e}")))?;

        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(|e| {
                CleanError::ArchiveCorruption(format!("entrada {i} ilegible: {e}"))
            })?;
            let name = file.name().to_string();

            if file.is_dir() {
                parts.push(ArchivePart {
                    name,
                    data: Vec::new(),
                    is_dir: true,
                });
                continue;
            }

            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| CleanError::ArchiveCorruption(format!("{name}: {e}")))?;
            parts.push(ArchivePart {
                name,
                data,
                is_dir: false,
            });
        }

        let flavor = detect_flavor(&parts, path);
        tracing::debug!(
            "{}: {} partes, contenedor {:?}",
            path.display(),
            parts.len(),
            flavor
        );
        Ok(Self { flavor, parts })
    }

    pub fn flavor(&self) -> ArchiveFlavor {
        self.flavor
    }

    pub fn parts(&self) -> &[ArchivePart] {
        &self.parts
    }

    pub fn part(&self, name: &str) -> Option<&ArchivePart> {
        self.parts.iter().find(|part| part.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.part(name).is_some()
    }

    /// `true` si existe la parte o un directorio implícito con ese prefijo.
    pub fn contains_path(&self, path: &str) -> bool {
        if path.ends_with('/') {
            self.parts.iter().any(|part| part.name.starts_with(path))
        } else {
            self.contains(path)
        }
    }

    pub fn replace(&mut self, name: &str, data: Vec<u8>) {
        if let Some(part) = self.parts.iter_mut().find(|part| part.name == name) {
            part.data = data;
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.parts.len();
        self.parts.retain(|part| part.name != name);
        before != self.parts.len()
    }

    /// Elimina las partes cuyo nombre empieza por `prefix` y devuelve sus nombres.
    pub fn remove_prefixed(&mut self, prefix: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.parts.retain(|part| {
            if part.name.starts_with(prefix) {
                removed.push(part.name.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Empaqueta las partes en un ZIP nuevo. Fechas y permisos se normalizan y la
    /// compresión es siempre la misma; `mimetype` va primero y sin comprimir.
    pub fn write(&self, output_path: &Path, sort_entries: bool) -> Result<()> {
        let target_file = File::create(output_path).map_err(|e| CleanError::io(output_path, e))?;
        let mut writer = ZipWriter::new(target_file);

        let mut ordered: Vec<&ArchivePart> = self.parts.iter().collect();
        if sort_entries {
            ordered.sort_by(|a, b| a.name.cmp(&b.name));
        }
        ordered.sort_by_key(|part| part.name != ODF_MIMETYPE_PART);

        for part in ordered {
            let method = if part.name == ODF_MIMETYPE_PART {
                CompressionMethod::Stored
            } else {
                CompressionMethod::Deflated
            };
            let options = FileOptions::<'_, ()>::default()
                .compression_method(method)
                .last_modified_time(zip::DateTime::default())
                .unix_permissions(if part.is_dir { 0o755 } else { 0o644 });

            if part.is_dir {
                writer
                    .add_directory(part.name.as_str(), options)
                    .map_err(|e| CleanError::cleaner("archive", format!("{}: {e}", part.name)))?;
                continue;
            }

            writer
                .start_file(part.name.as_str(), options)
                .map_err(|e| CleanError::cleaner("archive", format!("{}: {e}", part.name)))?;
            writer
                .write_all(&part.data)
                .map_err(|e| CleanError::io(output_path, e))?;
        }

        writer
            .finish()
            .map_err(|e| CleanError::cleaner("archive", format!("no se pudo cerrar el ZIP: {e}")))?;
        Ok(())
    }
}

fn detect_flavor(parts: &[ArchivePart], path: &Path) -> ArchiveFlavor {
    let has = |name: &str| parts.iter().any(|part| part.name == name);
    if has(CONTENT_TYPES_PART) {
        ArchiveFlavor::OfficeOpenXml
    } else if has(ODF_MANIFEST_PART) || has(ODF_MIMETYPE_PART) {
        ArchiveFlavor::OpenDocument
    } else if matches!(lowercase_extension(path).as_str(), "odt" | "ods" | "odp") {
        ArchiveFlavor::OpenDocument
    } else {
        ArchiveFlavor::OfficeOpenXml
    }
}
