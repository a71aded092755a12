//! Resultados de limpieza y su contrato de reporte JSON.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CleanError, Result};

/// Resultado de limpiar un archivo. Se construye una sola vez al final del pipeline.
#[derive(Clone, Debug)]
pub struct CleaningResult {
    pub file_path: PathBuf,
    pub success: bool,
    pub original_size: u64,
    pub cleaned_size: u64,
    /// Campo eliminado → valor previo truncado.
    pub metadata_removed: BTreeMap<String, String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub processing_time: Duration,
    pub backup_path: Option<PathBuf>,
    pub content_hash_before: Option<String>,
    pub content_hash_after: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl CleaningResult {
    /// Resultado aún no exitoso que el pipeline va completando.
    pub fn pending(path: &Path) -> Self {
        Self {
            file_path: path.to_path_buf(),
            success: false,
            original_size: 0,
            cleaned_size: 0,
            metadata_removed: BTreeMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            processing_time: Duration::ZERO,
            backup_path: None,
            content_hash_before: None,
            content_hash_after: None,
            timestamp: Local::now(),
        }
    }

    /// Resultado fallido sin trabajo previo, con un único error.
    pub fn failure(path: &Path, error: &CleanError, elapsed: Duration) -> Self {
        let mut result = Self::pending(path);
        result.errors.push(error.report_line());
        result.processing_time = elapsed;
        result
    }

    pub fn size_reduction(&self) -> i64 {
        self.original_size as i64 - self.cleaned_size as i64
    }

    pub fn size_reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        self.size_reduction() as f64 / self.original_size as f64 * 100.0
    }

    pub fn metadata_count(&self) -> usize {
        self.metadata_removed.len()
    }

    pub fn to_report(&self) -> CleaningReport {
        CleaningReport {
            file_path: self.file_path.display().to_string(),
            success: self.success,
            original_size: self.original_size,
            cleaned_size: self.cleaned_size,
            size_reduction: self.size_reduction(),
            size_reduction_percent: round_to(self.size_reduction_percent(), 2),
            metadata_removed: self.metadata_removed.clone(),
            metadata_count: self.metadata_count(),
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
            processing_time: round_to(self.processing_time.as_secs_f64(), 3),
            backup_path: self
                .backup_path
                .as_ref()
                .map(|path| path.display().to_string()),
            content_hash_before: self.content_hash_before.clone(),
            content_hash_after: self.content_hash_after.clone(),
            timestamp: self.timestamp.to_rfc3339(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_report())
            .map_err(|e| CleanError::cleaner("reporte", e))
    }
}

/// Forma serializada de un `CleaningResult`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CleaningReport {
    pub file_path: String,
    pub success: bool,
    pub original_size: u64,
    pub cleaned_size: u64,
    pub size_reduction: i64,
    pub size_reduction_percent: f64,
    pub metadata_removed: BTreeMap<String, String>,
    pub metadata_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub processing_time: f64,
    pub backup_path: Option<String>,
    pub content_hash_before: Option<String>,
    pub content_hash_after: Option<String>,
    pub timestamp: String,
}

/// Agregado de un lote. Solo el colector del orquestador lo modifica.
#[derive(Clone, Debug, Default)]
pub struct BatchCleaningResult {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_time: Duration,
    /// Suma de reducciones de los archivos limpiados con éxito.
    pub total_size_reduction: i64,
    pub results: Vec<CleaningResult>,
}

impl BatchCleaningResult {
    pub fn add_result(&mut self, result: CleaningResult) {
        self.total_files += 1;
        if result.success {
            self.successful += 1;
            self.total_size_reduction += result.size_reduction();
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    /// Contabiliza archivos que no se procesaron (no soportados o cancelados).
    pub fn add_skipped(&mut self, count: usize) {
        self.total_files += count;
        self.skipped += count;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total_files as f64 * 100.0
    }

    pub fn to_report(&self) -> BatchReport {
        BatchReport {
            total_files: self.total_files,
            successful: self.successful,
            failed: self.failed,
            skipped: self.skipped,
            success_rate: round_to(self.success_rate(), 2),
            total_time: round_to(self.total_time.as_secs_f64(), 3),
            total_size_reduction: self.total_size_reduction,
            results: self.results.iter().map(CleaningResult::to_report).collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_report())
            .map_err(|e| CleanError::cleaner("reporte", e))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub success_rate: f64,
    pub total_time: f64,
    pub total_size_reduction: i64,
    pub results: Vec<CleaningReport>,
}

/// Escribe el reporte JSON en `path`.
pub fn save_report<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    let content =
        serde_json::to_string_pretty(report).map_err(|e| CleanError::cleaner("reporte", e))?;
    std::fs::write(path, content).map_err(|e| CleanError::io(path, e))?;
    tracing::info!("reporte guardado en {}", path.display());
    Ok(())
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
