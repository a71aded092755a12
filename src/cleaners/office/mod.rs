//! Limpieza de documentos basados en ZIP (OOXML y OpenDocument).

mod archive;
mod clean;
mod constants;
mod extract;
mod manifest;
mod revision;
mod sanitize;
mod verify;
mod xml;


pub use archive::{ArchiveDocument, ArchiveFlavor, ArchivePart};
pub use clean::ArchiveRewriter;
pub use verify::check_archive_consistency;
