//! Motor de limpieza de metadata por niveles.
//!
//! Clasifica cada archivo por extensión, despacha al limpiador de su categoría y
//! envuelve la operación con copia de seguridad, escritura atómica y verificación.
//! Los lotes se reparten entre un número fijo de trabajadores y cada archivo falla
//! de forma aislada.

pub mod backup;
pub mod batch;
pub mod classify;
pub mod cleaners;
pub mod config;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod policy;
pub mod registry;
pub mod result;
pub mod scratch;
pub mod verify;

pub use batch::{BatchEvent, BatchOrchestrator, BatchPhase, CancelToken};
pub use classify::{Category, classify, is_supported_file};
pub use cleaners::{CleanReport, Cleaner, MetadataMap};
pub use config::{CleanOptions, EngineConfig};
pub use engine::MetadataCleaner;
pub use error::{CleanError, ErrorKind, Result};
pub use policy::{CleaningLevel, CleaningPolicy, DomainSet, MetadataDomain};
pub use registry::CleanerRegistry;
pub use result::{BatchCleaningResult, BatchReport, CleaningReport, CleaningResult, save_report};
pub use verify::{ArchiveAwareVerifier, IntegrityVerifier, ShallowVerifier};
