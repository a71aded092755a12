use std::path::Path;

use crate::error::{CleanError, Result};

use super::archive::{ArchiveDocument, ArchiveFlavor};
use super::constants::ODF_MIMETYPE_PART;
use super::manifest::ensure_consistent;

/// Comprueba que un documento limpio abre como ZIP y que su manifiesto solo
/// referencia partes existentes.
pub fn check_archive_consistency(path: &Path) -> Result<()> {
    let doc = ArchiveDocument::read(path)?;
    ensure_consistent(&doc)?;

    if doc.flavor() == ArchiveFlavor::OpenDocument
        && doc.contains(ODF_MIMETYPE_PART)
        && doc.parts().first().map(|part| part.name.as_str()) != Some(ODF_MIMETYPE_PART)
    {
        return Err(CleanError::ArchiveCorruption(
            "la entrada mimetype no es la primera del contenedor".to_string(),
        ));
    }

    Ok(())
}
