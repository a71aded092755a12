//! Configuración del motor, cargable desde TOML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CleanError, Result};
use crate::policy::CleaningLevel;

/// Parámetros de una operación de limpieza individual.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanOptions {
    #[serde(default)]
    pub level: CleaningLevel,
    /// Crea una copia de seguridad antes de cualquier paso destructivo.
    #[serde(default = "default_true")]
    pub backup: bool,
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub verify: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            level: CleaningLevel::default(),
            backup: true,
            backup_dir: None,
            verify: true,
        }
    }
}

impl CleanOptions {
    pub fn with_level(mut self, level: CleaningLevel) -> Self {
        self.level = level;
        self
    }

    pub fn without_backup(mut self) -> Self {
        self.backup = false;
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub level: CleaningLevel,
    #[serde(default = "default_true")]
    pub backup: bool,
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub verify: bool,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Sigue enlaces simbólicos al recorrer carpetas.
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Límite para cada invocación de ffmpeg/ffprobe.
    #[serde(default = "default_external_timeout")]
    pub external_timeout_secs: u64,
    /// Falla al construir el motor si ffmpeg o ffprobe no están disponibles.
    #[serde(default)]
    pub require_media_tools: bool,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: PathBuf,
    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: PathBuf,
    /// Longitud máxima de cada valor de metadata guardado en los resultados.
    #[serde(default = "default_value_limit")]
    pub value_limit: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_workers() -> usize {
    4
}

fn default_external_timeout() -> u64 {
    300
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_value_limit() -> usize {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            level: CleaningLevel::default(),
            backup: true,
            backup_dir: None,
            verify: true,
            max_workers: default_max_workers(),
            follow_symlinks: false,
            external_timeout_secs: default_external_timeout(),
            require_media_tools: false,
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
            value_limit: default_value_limit(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| CleanError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CleanError::Config(format!("no se pudo leer {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("configuración cargada desde {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(CleanError::Config(
                "max_workers debe ser al menos 1".to_string(),
            ));
        }
        if self.value_limit == 0 {
            return Err(CleanError::Config(
                "value_limit debe ser al menos 1".to_string(),
            ));
        }
        if self.external_timeout_secs == 0 {
            return Err(CleanError::Config(
                "external_timeout_secs debe ser mayor que cero".to_string(),
            ));
        }
        Ok(())
    }

    /// Opciones por archivo derivadas de la configuración.
    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions {
            level: self.level,
            backup: self.backup,
            backup_dir: self.backup_dir.clone(),
            verify: self.verify,
        }
    }
}
