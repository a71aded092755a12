mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;

use common::{TestResult, create_docx, create_rtf, engine, offline_config};
use metaclean::cleaners::text::TextCleaner;
use metaclean::{
    BatchEvent, BatchOrchestrator, CancelToken, Category, CleanOptions, CleanReport, Cleaner,
    CleanerRegistry, CleaningLevel, MetadataCleaner, MetadataMap,
};

fn five_valid_files(dir: &Path) -> TestResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for index in 0..3 {
        let path = dir.join(format!("doc{index}.docx"));
        create_docx(&path, &format!("Autor {index}"))?;
        paths.push(path);
    }
    for index in 0..2 {
        let path = dir.join(format!("notas{index}.rtf"));
        create_rtf(&path, "Alice")?;
        paths.push(path);
    }
    Ok(paths)
}

#[test]
fn five_files_with_two_workers() -> TestResult {
    let dir = tempfile::tempdir()?;
    let paths = five_valid_files(dir.path())?;

    let batch = engine()?.clean_files(paths.clone(), &CleanOptions::default(), 2);

    assert_eq!(batch.total_files, 5);
    assert_eq!(batch.successful, 5);
    assert_eq!(
        batch.total_size_reduction,
        batch.results.iter().map(|r| r.size_reduction()).sum::<i64>()
    );
    let ordered: Vec<&PathBuf> = batch.results.iter().map(|r| &r.file_path).collect();
    assert_eq!(ordered, paths.iter().collect::<Vec<_>>());
    Ok(())
}

#[test]
fn unsupported_files_are_skipped() -> TestResult {
    let dir = tempfile::tempdir()?;
    let mut paths = five_valid_files(dir.path())?;
    let unsupported = dir.path().join("datos.xyz");
    fs::write(&unsupported, b"sin metadata")?;
    paths.insert(2, unsupported.clone());

    let batch = engine()?.clean_files(paths, &CleanOptions::default().without_backup(), 3);

    assert_eq!(batch.total_files, 6);
    assert_eq!(batch.skipped, 1);
    assert_eq!(batch.successful + batch.failed, 5);
    assert_eq!(fs::read(&unsupported)?, b"sin metadata");
    Ok(())
}

#[test]
fn one_broken_file_does_not_stop_the_batch() -> TestResult {
    let dir = tempfile::tempdir()?;
    let mut paths = five_valid_files(dir.path())?;
    let broken = dir.path().join("roto.docx");
    fs::write(&broken, b"esto no es un zip")?;
    paths.push(broken.clone());

    let batch = engine()?.clean_files(paths, &CleanOptions::default().without_backup(), 4);

    assert_eq!(batch.total_files, 6);
    assert_eq!(batch.successful, 5);
    assert_eq!(batch.failed, 1);
    let failure = batch.results.last().ok_or("sin resultados")?;
    assert_eq!(failure.file_path, broken);
    assert!(failure.errors[0].starts_with("InputError"));
    assert_eq!(fs::read(&broken)?, b"esto no es un zip");
    Ok(())
}

#[test]
fn folder_batch_ignores_backups_from_previous_runs() -> TestResult {
    let dir = tempfile::tempdir()?;
    five_valid_files(dir.path())?;
    let engine = engine()?;

    let first = engine.clean_folder(dir.path(), true, &CleanOptions::default(), 2)?;
    assert_eq!(first.successful, 5);

    let second = engine.clean_folder(dir.path(), true, &CleanOptions::default(), 2)?;
    assert_eq!(second.total_files, 5);
    assert!(second.results.iter().all(|r| r.metadata_count() == 0));
    Ok(())
}

/// Entra en pánico con los archivos llamados `boom.txt`.
struct PanickyCleaner;

impl Cleaner for PanickyCleaner {
    fn name(&self) -> &str {
        "panicky"
    }

    fn extract_metadata(&self, _path: &Path) -> MetadataMap {
        MetadataMap::new()
    }

    fn clean(
        &self,
        input: &Path,
        output: &Path,
        level: CleaningLevel,
    ) -> metaclean::Result<CleanReport> {
        if input.file_name().is_some_and(|name| name == "boom.txt") {
            panic!("limpiador defectuoso");
        }
        TextCleaner.clean(input, output, level)
    }
}

#[test]
fn a_panicking_cleaner_fails_only_its_file() -> TestResult {
    let dir = tempfile::tempdir()?;
    let mut paths = Vec::new();
    for name in ["a.txt", "boom.txt", "c.txt"] {
        let path = dir.path().join(name);
        fs::write(&path, name)?;
        paths.push(path);
    }

    let mut registry = CleanerRegistry::empty();
    registry.register(Category::PlainText, Arc::new(PanickyCleaner));
    let engine = MetadataCleaner::with_registry(offline_config(), registry)?;

    let batch = engine.clean_files(paths, &CleanOptions::default().without_backup(), 2);

    assert_eq!(batch.total_files, 3);
    assert_eq!(batch.successful, 2);
    assert_eq!(batch.failed, 1);
    assert!(!batch.results[1].success);
    assert!(batch.results[1].errors[0].contains("limpiador defectuoso"));
    Ok(())
}

/// Cancela el lote al limpiar el primer archivo.
struct CancellingCleaner {
    token: CancelToken,
}

impl Cleaner for CancellingCleaner {
    fn name(&self) -> &str {
        "cancelling"
    }

    fn extract_metadata(&self, _path: &Path) -> MetadataMap {
        MetadataMap::new()
    }

    fn clean(
        &self,
        input: &Path,
        output: &Path,
        level: CleaningLevel,
    ) -> metaclean::Result<CleanReport> {
        self.token.cancel();
        TextCleaner.clean(input, output, level)
    }
}

#[test]
fn cancelled_batch_counts_queued_files_as_skipped() -> TestResult {
    let dir = tempfile::tempdir()?;
    let mut paths = Vec::new();
    for index in 0..5 {
        let path = dir.path().join(format!("nota{index}.txt"));
        fs::write(&path, "texto")?;
        paths.push(path);
    }

    let token = CancelToken::new();
    let mut registry = CleanerRegistry::empty();
    registry.register(
        Category::PlainText,
        Arc::new(CancellingCleaner {
            token: token.clone(),
        }),
    );
    let engine = MetadataCleaner::with_registry(offline_config(), registry)?;
    let (tx, rx) = mpsc::channel();

    let batch = BatchOrchestrator::new(&engine, 1)
        .with_cancel_token(token)
        .with_events(tx)
        .run(paths, &CleanOptions::default().without_backup());

    assert_eq!(batch.total_files, 5);
    assert_eq!(batch.successful, 1);
    assert_eq!(batch.skipped, 4);

    let events: Vec<BatchEvent> = rx.iter().collect();
    assert_eq!(events.first(), Some(&BatchEvent::Started { total: 5 }));
    assert_eq!(
        events.last(),
        Some(&BatchEvent::Finished {
            successful: 1,
            failed: 0,
            skipped: 4,
        })
    );
    let skipped = events
        .iter()
        .filter(|event| matches!(event, BatchEvent::Skipped { .. }))
        .count();
    assert_eq!(skipped, 4);
    Ok(())
}
