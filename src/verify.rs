//! Comprobaciones de viabilidad del archivo limpio.
//!
//! Un fallo de verificación nunca es fatal: el motor lo registra como advertencia.

use std::fs;
use std::path::Path;

use crate::classify::{Category, classify};
use crate::cleaners::office::check_archive_consistency;

pub trait IntegrityVerifier: Send + Sync {
    fn name(&self) -> &str;

    /// `true` si `cleaned` parece utilizable después de limpiar `original`.
    fn verify(&self, original: &Path, cleaned: &Path) -> bool;
}

/// El archivo limpio existe y no está vacío.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShallowVerifier;

impl IntegrityVerifier for ShallowVerifier {
    fn name(&self) -> &str {
        "shallow"
    }

    fn verify(&self, _original: &Path, cleaned: &Path) -> bool {
        match fs::metadata(cleaned) {
            Ok(metadata) => metadata.is_file() && metadata.len() > 0,
            Err(error) => {
                tracing::debug!("verificación: {} inaccesible: {error}", cleaned.display());
                false
            }
        }
    }
}

/// Añade a la comprobación superficial la apertura del contenedor ZIP y la
/// coherencia del manifiesto para documentos basados en archivo.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchiveAwareVerifier;

impl IntegrityVerifier for ArchiveAwareVerifier {
    fn name(&self) -> &str {
        "archive-aware"
    }

    fn verify(&self, original: &Path, cleaned: &Path) -> bool {
        if !ShallowVerifier.verify(original, cleaned) {
            return false;
        }
        if classify(cleaned) != Category::DocumentArchive {
            return true;
        }

        match check_archive_consistency(cleaned) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("verificación de {} fallida: {error}", cleaned.display());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_rejects_empty_and_missing() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let empty = dir.path().join("vacio.txt");
        fs::write(&empty, b"")?;
        let full = dir.path().join("lleno.txt");
        fs::write(&full, b"x")?;

        assert!(!ShallowVerifier.verify(&empty, &empty));
        assert!(!ShallowVerifier.verify(&full, &dir.path().join("no.txt")));
        assert!(ShallowVerifier.verify(&full, &full));
        Ok(())
    }

    #[test]
    fn archive_aware_rejects_non_zip_docx() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempfile::tempdir()?;
        let fake = dir.path().join("falso.docx");
        fs::write(&fake, b"esto no es un zip")?;

        assert!(ShallowVerifier.verify(&fake, &fake));
        assert!(!ArchiveAwareVerifier.verify(&fake, &fake));
        Ok(())
    }

    #[test]
    fn archive_aware_defers_to_shallow_for_other_categories()
    -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let text = dir.path().join("notas.txt");
        fs::write(&text, b"hola")?;
        assert!(ArchiveAwareVerifier.verify(&text, &text));
        Ok(())
    }
}
