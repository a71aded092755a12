//! Espacio temporal por tarea y reemplazo atómico del archivo de salida.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{CleanError, Result};

/// Prefijo de los directorios temporales; el recorrido de carpetas los ignora.
pub const SCRATCH_PREFIX: &str = ".metaclean-";

/// Directorio temporal junto a la salida, para que el `rename` final no cruce
/// sistemas de archivos. Se elimina al soltarse, por cualquier camino de salida.
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    pub fn beside(output: &Path) -> Result<Self> {
        let parent = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| CleanError::io(parent, e))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Ruta de trabajo con el mismo nombre de archivo que `output`.
    pub fn staged_path(&self, output: &Path) -> PathBuf {
        let name = output
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "salida".into());
        self.dir.path().join(name)
    }

    /// Mueve el archivo preparado sobre `output`. Si `output` ya existe, el
    /// reemplazo hereda sus permisos.
    pub fn commit(self, staged: &Path, output: &Path) -> Result<()> {
        if !staged.is_file() {
            return Err(CleanError::cleaner(
                "scratch",
                format!("no se generó el archivo de salida {}", staged.display()),
            ));
        }
        if let Ok(existing) = fs::metadata(output) {
            fs::set_permissions(staged, existing.permissions())
                .map_err(|e| CleanError::io(staged, e))?;
        }
        fs::rename(staged, output).map_err(|e| CleanError::io(output, e))?;
        tracing::debug!("salida reemplazada: {}", output.display());
        Ok(())
    }
}

/// Ejecuta `write` sobre una ruta temporal y solo entonces reemplaza `output`.
/// Si `write` falla, `output` no se toca.
pub fn write_atomically<T, F>(output: &Path, write: F) -> Result<T>
where
    F: FnOnce(&Path) -> Result<T>,
{
    let scratch = ScratchSpace::beside(output)?;
    let staged = scratch.staged_path(output);
    let value = write(&staged)?;
    scratch.commit(&staged, output)?;
    Ok(value)
}
