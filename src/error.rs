//! Errores del motor de limpieza y su discriminador de tipo.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::classify::Category;

pub type Result<T> = std::result::Result<T, CleanError>;

/// Clase de error que se reporta junto a cada mensaje en un `CleaningResult`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    InputError,
    BackupError,
    CleanerError,
    VerificationWarning,
    ConfigError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InputError => "InputError",
            ErrorKind::BackupError => "BackupError",
            ErrorKind::CleanerError => "CleanerError",
            ErrorKind::VerificationWarning => "VerificationWarning",
            ErrorKind::ConfigError => "ConfigError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("archivo no encontrado: {}", .0.display())]
    NotFound(PathBuf),

    #[error("tipo de archivo no soportado: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("no se pudo leer {}: {reason}", path.display())]
    UnreadableInput { path: PathBuf, reason: String },

    #[error("no se pudo crear la copia de seguridad de {}: {source}", path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no hay limpiador registrado para la categoría {0}")]
    NoCleaner(Category),

    #[error("{cleaner}: {reason}")]
    Cleaner { cleaner: &'static str, reason: String },

    #[error("contenedor inconsistente: {0}")]
    ArchiveCorruption(String),

    #[error("error de E/S en {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("el proceso externo superó el tiempo límite de {secs} s: {program}")]
    Timeout { program: String, secs: u64 },

    #[error("configuración inválida: {0}")]
    Config(String),
}

impl CleanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CleanError::NotFound(_)
            | CleanError::Unsupported(_)
            | CleanError::UnreadableInput { .. } => ErrorKind::InputError,
            CleanError::Backup { .. } => ErrorKind::BackupError,
            CleanError::NoCleaner(_)
            | CleanError::Cleaner { .. }
            | CleanError::ArchiveCorruption(_)
            | CleanError::Io { .. }
            | CleanError::Timeout { .. } => ErrorKind::CleanerError,
            CleanError::Config(_) => ErrorKind::ConfigError,
        }
    }

    pub fn unreadable(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        CleanError::UnreadableInput {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn cleaner(cleaner: &'static str, reason: impl fmt::Display) -> Self {
        CleanError::Cleaner {
            cleaner,
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CleanError::Io {
            path: path.into(),
            source,
        }
    }

    /// Mensaje con el prefijo de clase, tal como se guarda en los resultados.
    pub fn report_line(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}
