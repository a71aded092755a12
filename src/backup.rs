//! Copias de seguridad con sello de tiempo previas a cualquier paso destructivo.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use crate::error::{CleanError, Result};

/// Carpeta que se crea junto al archivo cuando no se indica otra.
pub const BACKUP_DIR_NAME: &str = "metadata_cleaner_backups";

const MAX_COLLISION_SUFFIX: u32 = 10_000;

#[derive(Clone, Debug, Default)]
pub struct BackupManager {
    default_dir: Option<PathBuf>,
}

impl BackupManager {
    pub fn new(default_dir: Option<PathBuf>) -> Self {
        Self { default_dir }
    }

    /// Directorio donde terminaría la copia de `path`.
    pub fn backup_dir_for(&self, path: &Path, dir: Option<&Path>) -> PathBuf {
        dir.map(Path::to_path_buf)
            .or_else(|| self.default_dir.clone())
            .unwrap_or_else(|| {
                path.parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(BACKUP_DIR_NAME)
            })
    }

    /// Copia `path` byte a byte. Nunca sobrescribe una copia previa: si el nombre ya
    /// existe se añade un sufijo numérico.
    pub fn backup(&self, path: &Path, dir: Option<&Path>) -> Result<PathBuf> {
        let mut source = File::open(path).map_err(|source| CleanError::Backup {
            path: path.to_path_buf(),
            source,
        })?;

        let backup_dir = self.backup_dir_for(path, dir);
        fs::create_dir_all(&backup_dir).map_err(|source| CleanError::Backup {
            path: path.to_path_buf(),
            source,
        })?;

        let stem = path.file_stem().unwrap_or_default().to_string_lossy();
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let timestamp = Local::now().format("%Y%m%d_%H%M%S_%6f");
        let base_name = format!("{stem}_{timestamp}");

        for attempt in 0..MAX_COLLISION_SUFFIX {
            let name = if attempt == 0 {
                format!("{base_name}{extension}")
            } else {
                format!("{base_name}_{attempt}{extension}")
            };
            let candidate = backup_dir.join(name);

            let mut target = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(CleanError::Backup {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            };

            if let Err(source) = copy_contents(&mut source, &mut target, path) {
                let _ = fs::remove_file(&candidate);
                return Err(CleanError::Backup {
                    path: path.to_path_buf(),
                    source,
                });
            }

            tracing::info!("copia de seguridad creada: {}", candidate.display());
            return Ok(candidate);
        }

        Err(CleanError::Backup {
            path: path.to_path_buf(),
            source: io::Error::new(
                ErrorKind::AlreadyExists,
                "no quedan nombres libres para la copia",
            ),
        })
    }
}

fn copy_contents(source: &mut File, target: &mut File, original: &Path) -> io::Result<()> {
    io::copy(source, target)?;

    let metadata = fs::metadata(original)?;
    if let Err(error) = target.set_permissions(metadata.permissions()) {
        tracing::warn!(
            "no se copiaron los permisos de {} a la copia: {error}",
            original.display()
        );
    }
    if let Ok(modified) = metadata.modified()
        && let Err(error) = target.set_modified(modified)
    {
        tracing::warn!(
            "no se conservó la fecha de modificación de {}: {error}",
            original.display()
        );
    }
    target.sync_all()
}
