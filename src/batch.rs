//! Ejecución por lotes: cola compartida, trabajadores de tamaño fijo y un único
//! colector que pliega los resultados.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use walkdir::WalkDir;

use crate::backup::BACKUP_DIR_NAME;
use crate::classify::{Category, classify};
use crate::config::CleanOptions;
use crate::engine::MetadataCleaner;
use crate::error::{CleanError, Result};
use crate::result::{BatchCleaningResult, CleaningResult};
use crate::scratch::SCRATCH_PREFIX;

/// Señal de parada cooperativa. Las tareas ya despachadas terminan; las que siguen
/// en cola se cuentan como omitidas.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progreso de un lote, para interfaces que quieran mostrarlo.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchEvent {
    Started { total: usize },
    Processing { index: usize, total: usize, path: PathBuf },
    Success { path: PathBuf, metadata_count: usize },
    Failure { path: PathBuf, errors: Vec<String> },
    Skipped { path: PathBuf, reason: String },
    Finished { successful: usize, failed: usize, skipped: usize },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchPhase {
    Collecting,
    Dispatching,
    AwaitingCompletions,
    Aggregated,
}

impl BatchPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchPhase::Collecting => "collecting",
            BatchPhase::Dispatching => "dispatching",
            BatchPhase::AwaitingCompletions => "awaiting-completions",
            BatchPhase::Aggregated => "aggregated",
        }
    }
}

type Job = (usize, PathBuf);

pub struct BatchOrchestrator<'a> {
    engine: &'a MetadataCleaner,
    max_workers: usize,
    cancel: CancelToken,
    events: Option<Sender<BatchEvent>>,
}

impl<'a> BatchOrchestrator<'a> {
    /// `max_workers` se eleva a 1 si llega en cero.
    pub fn new(engine: &'a MetadataCleaner, max_workers: usize) -> Self {
        Self {
            engine,
            max_workers: max_workers.max(1),
            cancel: CancelToken::new(),
            events: None,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: Sender<BatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn enter(&self, phase: BatchPhase) {
        tracing::debug!("lote: fase {}", phase.as_str());
    }

    pub fn run(&self, paths: Vec<PathBuf>, options: &CleanOptions) -> BatchCleaningResult {
        let started = Instant::now();
        let mut batch = BatchCleaningResult::default();

        self.enter(BatchPhase::Collecting);
        self.emit(BatchEvent::Started { total: paths.len() });
        let (jobs, unsupported): (Vec<PathBuf>, Vec<PathBuf>) = paths
            .into_iter()
            .partition(|path| classify(path) != Category::Unsupported);
        for path in unsupported {
            tracing::warn!("se omite {}: tipo no soportado", path.display());
            self.emit(BatchEvent::Skipped {
                path,
                reason: "tipo de archivo no soportado".to_string(),
            });
            batch.add_skipped(1);
        }

        self.enter(BatchPhase::Dispatching);
        let total = jobs.len();
        let queue: Mutex<VecDeque<Job>> = Mutex::new(jobs.into_iter().enumerate().collect());
        let workers = self.max_workers.min(total);
        let mut collected: Vec<(usize, CleaningResult)> = Vec::with_capacity(total);

        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<(usize, CleaningResult)>();
            for _ in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || self.work(queue, total, options, tx));
            }
            drop(tx);

            self.enter(BatchPhase::AwaitingCompletions);
            for (index, result) in rx {
                if result.success {
                    self.emit(BatchEvent::Success {
                        path: result.file_path.clone(),
                        metadata_count: result.metadata_count(),
                    });
                } else {
                    self.emit(BatchEvent::Failure {
                        path: result.file_path.clone(),
                        errors: result.errors.clone(),
                    });
                }
                collected.push((index, result));
            }
        });

        let cancelled: Vec<Job> = queue.into_inner().into_iter().collect();
        for (_, path) in &cancelled {
            self.emit(BatchEvent::Skipped {
                path: path.clone(),
                reason: "lote cancelado".to_string(),
            });
        }
        batch.add_skipped(cancelled.len());

        self.enter(BatchPhase::Aggregated);
        collected.sort_by_key(|(index, _)| *index);
        for (_, result) in collected {
            batch.add_result(result);
        }
        batch.total_time = started.elapsed();

        tracing::info!(
            "lote terminado: {} archivos, {} limpios, {} fallidos, {} omitidos",
            batch.total_files,
            batch.successful,
            batch.failed,
            batch.skipped
        );
        self.emit(BatchEvent::Finished {
            successful: batch.successful,
            failed: batch.failed,
            skipped: batch.skipped,
        });
        batch
    }

    fn work(
        &self,
        queue: &Mutex<VecDeque<Job>>,
        total: usize,
        options: &CleanOptions,
        tx: Sender<(usize, CleaningResult)>,
    ) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let Some((index, path)) = queue.lock().pop_front() else {
                break;
            };
            self.emit(BatchEvent::Processing {
                index: index + 1,
                total,
                path: path.clone(),
            });

            let started = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.engine.clean_file(&path, None, options)
            }));
            let result = outcome.unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                tracing::error!("{}: la tarea entró en pánico: {message}", path.display());
                let error = CleanError::cleaner("batch", format!("pánico en la tarea: {message}"));
                CleaningResult::failure(&path, &error, started.elapsed())
            });

            if tx.send((index, result)).is_err() {
                break;
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "sin mensaje".to_string()
    }
}

fn is_internal_dir(name: &str) -> bool {
    name == BACKUP_DIR_NAME || name.starts_with(SCRATCH_PREFIX)
}

/// Archivos regulares de `dir`, omitiendo copias de seguridad y directorios de trabajo.
pub fn collect_folder_files(dir: &Path, recursive: bool, follow_links: bool) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(CleanError::NotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(CleanError::unreadable(dir, "la ruta proporcionada no es un directorio"));
    }

    let mut walker = WalkDir::new(dir).follow_links(follow_links).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    let entries = walker.into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !entry.file_type().is_dir()
            || !is_internal_dir(&entry.file_name().to_string_lossy())
    });
    for entry in entries {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(error) => tracing::warn!("entrada ilegible durante el recorrido: {error}"),
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn folder_walk_skips_internal_directories() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("a.txt"), "a")?;
        fs::create_dir(dir.path().join(BACKUP_DIR_NAME))?;
        fs::write(dir.path().join(BACKUP_DIR_NAME).join("a_1.txt"), "a")?;
        fs::create_dir(dir.path().join(".metaclean-x1"))?;
        fs::write(dir.path().join(".metaclean-x1").join("b.txt"), "b")?;
        fs::create_dir(dir.path().join("sub"))?;
        fs::write(dir.path().join("sub").join("c.txt"), "c")?;

        let flat = collect_folder_files(dir.path(), false, false)?;
        assert_eq!(flat, vec![dir.path().join("a.txt")]);

        let deep = collect_folder_files(dir.path(), true, false)?;
        assert_eq!(
            deep,
            vec![dir.path().join("a.txt"), dir.path().join("sub").join("c.txt")]
        );
        Ok(())
    }

    #[test]
    fn missing_folder_is_an_input_error() {
        let err = collect_folder_files(Path::new("/no/existe"), true, false)
            .err()
            .map(|e| e.kind());
        assert_eq!(err, Some(crate::error::ErrorKind::InputError));
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload = panic::catch_unwind(|| panic!("fallo {}", 7)).err();
        let message = payload.map(|p| panic_message(p.as_ref()));
        assert_eq!(message.as_deref(), Some("fallo 7"));
    }
}
