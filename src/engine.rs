//! Punto de entrada del motor: pipeline de un archivo y delegación de lotes.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::backup::BackupManager;
use crate::batch::{BatchOrchestrator, collect_folder_files};
use crate::cleaners::{MetadataMap, truncate_value};
use crate::config::{CleanOptions, EngineConfig};
use crate::error::{CleanError, ErrorKind, Result};
use crate::hashing::content_hash;
use crate::registry::CleanerRegistry;
use crate::result::{BatchCleaningResult, CleaningResult};
use crate::verify::{ArchiveAwareVerifier, IntegrityVerifier};

pub struct MetadataCleaner {
    config: EngineConfig,
    registry: CleanerRegistry,
    backups: BackupManager,
    verifier: Arc<dyn IntegrityVerifier>,
}

impl MetadataCleaner {
    /// Valida la configuración y registra los limpiadores incorporados.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let registry = CleanerRegistry::with_defaults(&config)?;
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: EngineConfig, registry: CleanerRegistry) -> Result<Self> {
        config.validate()?;
        let backups = BackupManager::new(config.backup_dir.clone());
        Ok(Self {
            config,
            registry,
            backups,
            verifier: Arc::new(ArchiveAwareVerifier),
        })
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn IntegrityVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &CleanerRegistry {
        &self.registry
    }

    /// Opciones por defecto derivadas de la configuración.
    pub fn default_options(&self) -> CleanOptions {
        self.config.clean_options()
    }

    pub fn extract_metadata(&self, path: &Path) -> Result<MetadataMap> {
        if !path.exists() {
            return Err(CleanError::NotFound(path.to_path_buf()));
        }
        let (_, cleaner) = self.registry.resolve(path)?;
        Ok(cleaner.extract_metadata(path))
    }

    /// Limpia `path` y escribe en `output`, o sobre el mismo archivo si es `None`.
    /// Nunca falla: los errores quedan en el resultado.
    pub fn clean_file(
        &self,
        path: &Path,
        output: Option<&Path>,
        options: &CleanOptions,
    ) -> CleaningResult {
        let started = Instant::now();
        let mut result = CleaningResult::pending(path);

        match self.run_pipeline(path, output, options, &mut result) {
            Ok(()) => {
                result.success = true;
                tracing::info!(
                    "{} limpiado: {} campos eliminados, {} bytes menos",
                    path.display(),
                    result.metadata_count(),
                    result.size_reduction()
                );
            }
            Err(error) => {
                tracing::error!("{}: {error}", path.display());
                result.errors.push(error.report_line());
            }
        }

        result.processing_time = started.elapsed();
        result
    }

    fn run_pipeline(
        &self,
        path: &Path,
        output: Option<&Path>,
        options: &CleanOptions,
        result: &mut CleaningResult,
    ) -> Result<()> {
        if !path.exists() {
            return Err(CleanError::NotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(CleanError::unreadable(path, "no es un archivo regular"));
        }

        let (category, cleaner) = self.registry.resolve(path)?;
        tracing::debug!("{} → {category} ({})", path.display(), cleaner.name());

        result.original_size = file_size(path)?;
        result.content_hash_before = Some(content_hash(path)?);

        if options.backup {
            let backup = self.backups.backup(path, options.backup_dir.as_deref())?;
            result.backup_path = Some(backup);
        }

        let output = output.unwrap_or(path);
        let report = cleaner.clean(path, output, options.level)?;

        result.cleaned_size = file_size(output)?;
        match content_hash(output) {
            Ok(hash) => result.content_hash_after = Some(hash),
            Err(error) => result.warnings.push(error.report_line()),
        }

        let limit = self.config.value_limit;
        result.metadata_removed = report
            .metadata_removed
            .into_iter()
            .map(|(field, value)| (field, truncate_value(&value, limit)))
            .collect();
        result.warnings.extend(report.warnings);

        if options.verify {
            let original = result.backup_path.as_deref().unwrap_or(path);
            if !self.verifier.verify(original, output) {
                tracing::warn!("{} no superó la verificación", output.display());
                result.warnings.push(format!(
                    "{}: la verificación {} rechazó {}",
                    ErrorKind::VerificationWarning,
                    self.verifier.name(),
                    output.display()
                ));
            }
        }
        Ok(())
    }

    /// Limpia `paths` en un lote con hasta `max_workers` tareas simultáneas.
    pub fn clean_files(
        &self,
        paths: Vec<PathBuf>,
        options: &CleanOptions,
        max_workers: usize,
    ) -> BatchCleaningResult {
        BatchOrchestrator::new(self, max_workers).run(paths, options)
    }

    pub fn clean_folder(
        &self,
        dir: &Path,
        recursive: bool,
        options: &CleanOptions,
        max_workers: usize,
    ) -> Result<BatchCleaningResult> {
        let files = collect_folder_files(dir, recursive, self.config.follow_symlinks)?;
        Ok(self.clean_files(files, options, max_workers))
    }
}

fn file_size(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .map(|metadata| metadata.len())
        .map_err(|e| CleanError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CleaningLevel;

    fn engine() -> std::result::Result<MetadataCleaner, Box<dyn std::error::Error>> {
        let config = EngineConfig {
            ffmpeg_path: "/no/existe/ffmpeg".into(),
            ffprobe_path: "/no/existe/ffprobe".into(),
            ..EngineConfig::default()
        };
        Ok(MetadataCleaner::new(config)?)
    }

    struct RejectAll;

    impl IntegrityVerifier for RejectAll {
        fn name(&self) -> &str {
            "reject-all"
        }

        fn verify(&self, _original: &Path, _cleaned: &Path) -> bool {
            false
        }
    }

    const RTF: &str = r"{\rtf1{\info{\author Ana}{\title Plan}}Hola}";

    #[test]
    fn missing_file_is_reported_not_raised() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let engine = engine()?;
        let result = engine.clean_file(Path::new("/no/existe.docx"), None, &CleanOptions::default());
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("InputError: "));
        Ok(())
    }

    #[test]
    fn unsupported_file_is_an_input_error() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("datos.bin");
        fs::write(&path, b"\x00\x01")?;

        let result = engine()?.clean_file(&path, None, &CleanOptions::default());
        assert!(!result.success);
        assert!(result.errors[0].starts_with("InputError: "));
        assert!(result.backup_path.is_none());
        Ok(())
    }

    #[test]
    fn successful_clean_fills_the_result() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("carta.rtf");
        fs::write(&path, RTF)?;

        let result = engine()?.clean_file(&path, None, &CleanOptions::default());

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.metadata_removed.len(), 2);
        assert_eq!(result.original_size, RTF.len() as u64);
        assert!(result.cleaned_size < result.original_size);
        assert_ne!(result.content_hash_before, result.content_hash_after);
        let backup = result.backup_path.ok_or("falta la copia")?;
        assert_eq!(fs::read_to_string(backup)?, RTF);
        Ok(())
    }

    #[test]
    fn output_path_leaves_input_untouched() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("carta.rtf");
        let output = dir.path().join("carta_limpia.rtf");
        fs::write(&path, RTF)?;

        let options = CleanOptions::default()
            .with_level(CleaningLevel::Basic)
            .without_backup();
        let result = engine()?.clean_file(&path, Some(&output), &options);

        assert!(result.success);
        assert_eq!(fs::read_to_string(&path)?, RTF);
        assert!(fs::read_to_string(&output)?.contains(r"\title Plan"));
        assert!(!dir.path().join(crate::backup::BACKUP_DIR_NAME).exists());
        Ok(())
    }

    #[test]
    fn values_are_truncated_to_the_configured_limit()
    -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("largo.rtf");
        let author = "x".repeat(250);
        fs::write(&path, format!(r"{{\rtf1{{\info{{\author {author}}}}}Hola}}"))?;

        let result = engine()?.clean_file(&path, None, &CleanOptions::default().without_backup());
        assert_eq!(
            result.metadata_removed.get("RTF.author").map(String::len),
            Some(100)
        );
        Ok(())
    }

    #[test]
    fn failed_verification_is_only_a_warning() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("carta.rtf");
        fs::write(&path, RTF)?;

        let engine = engine()?.with_verifier(Arc::new(RejectAll));
        let result = engine.clean_file(&path, None, &CleanOptions::default().without_backup());

        assert!(result.success);
        assert!(result.errors.is_empty());
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.starts_with("VerificationWarning: "))
        );
        Ok(())
    }

    #[test]
    fn invalid_config_fails_construction() {
        let config = EngineConfig {
            max_workers: 0,
            ..EngineConfig::default()
        };
        let err = MetadataCleaner::new(config).err().map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::ConfigError));
    }
}
