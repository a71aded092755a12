use std::collections::BTreeSet;
use std::path::Path;

use crate::classify::Category;
use crate::cleaners::{CleanReport, Cleaner, MetadataMap, insert_unique};
use crate::error::Result;
use crate::policy::{CleaningLevel, CleaningPolicy, MetadataDomain};
use crate::scratch::write_atomically;

use super::archive::{ArchiveDocument, ArchiveFlavor};
use super::constants::{
    ODF_BODY_PARTS, ODF_METADATA_PARTS, ODF_STRUCTURAL_PREFIXES, OOXML_BODY_PARTS,
    OOXML_METADATA_PARTS, OOXML_STRUCTURAL_PREFIXES,
};
use super::extract::collect_fields;
use super::manifest::{ensure_consistent, prune_references};
use super::revision::strip_revision_markers;
use super::sanitize::blank_fields;

fn metadata_parts(flavor: ArchiveFlavor) -> &'static [(&'static str, &'static str)] {
    match flavor {
        ArchiveFlavor::OfficeOpenXml => &OOXML_METADATA_PARTS,
        ArchiveFlavor::OpenDocument => &ODF_METADATA_PARTS,
    }
}

fn body_parts(flavor: ArchiveFlavor) -> &'static [&'static str] {
    match flavor {
        ArchiveFlavor::OfficeOpenXml => &OOXML_BODY_PARTS,
        ArchiveFlavor::OpenDocument => &ODF_BODY_PARTS,
    }
}

fn structural_prefixes(flavor: ArchiveFlavor) -> &'static [&'static str] {
    match flavor {
        ArchiveFlavor::OfficeOpenXml => &OOXML_STRUCTURAL_PREFIXES,
        ArchiveFlavor::OpenDocument => &ODF_STRUCTURAL_PREFIXES,
    }
}

/// Limpiador de documentos OOXML y ODF: reescribe el contenedor ZIP parte por parte.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchiveRewriter;

impl ArchiveRewriter {
    /// Aplica la política de `level` al documento en memoria.
    pub fn rewrite(&self, doc: &mut ArchiveDocument, level: CleaningLevel) -> Result<CleanReport> {
        let domains = CleaningPolicy::domains(Category::DocumentArchive, level);
        let flavor = doc.flavor();
        let mut report = CleanReport::default();
        let mut removed_parts = BTreeSet::new();

        for &(part_name, label) in metadata_parts(flavor) {
            let Some(part) = doc.part(part_name) else {
                continue;
            };

            if CleaningPolicy::drops_metadata_parts(level) {
                match collect_fields(part_name, label, &part.data) {
                    Ok(fields) => report.metadata_removed.extend(fields),
                    Err(error) => report.warn(format!("{part_name} ilegible, se elimina igualmente: {error}")),
                }
                doc.remove(part_name);
                removed_parts.insert(part_name.to_string());
                tracing::debug!("parte de metadata eliminada: {part_name}");
                continue;
            }

            let (bytes, removed) = blank_fields(part_name, label, part.data.clone(), domains)?;
            if !removed.is_empty() {
                doc.replace(part_name, bytes);
                report.metadata_removed.extend(removed);
            }
        }

        if domains.has(MetadataDomain::RevisionHistory) {
            for &part_name in body_parts(flavor) {
                let Some(part) = doc.part(part_name) else {
                    continue;
                };
                let (bytes, count) = strip_revision_markers(part.data.clone());
                if count > 0 {
                    doc.replace(part_name, bytes);
                    report
                        .metadata_removed
                        .insert(format!("Revision.{part_name}"), format!("{count} marcadores rsid"));
                    tracing::debug!("{part_name}: {count} marcadores rsid eliminados");
                }
            }
        }

        if domains.has(MetadataDomain::StructuralExtras) {
            for &prefix in structural_prefixes(flavor) {
                for name in doc.remove_prefixed(prefix) {
                    if !name.ends_with('/') {
                        insert_unique(
                            &mut report.metadata_removed,
                            format!("Structure.{name}"),
                            "parte eliminada".to_string(),
                        );
                    }
                    removed_parts.insert(name);
                }
            }
        }

        for rewritten in prune_references(doc, &removed_parts)? {
            tracing::debug!("referencias actualizadas en {rewritten}");
        }
        ensure_consistent(doc)?;

        Ok(report)
    }

    /// Todos los campos no vacíos de las partes de metadata.
    pub fn read_metadata(&self, doc: &ArchiveDocument) -> MetadataMap {
        let mut fields = MetadataMap::new();
        for &(part_name, label) in metadata_parts(doc.flavor()) {
            let Some(part) = doc.part(part_name) else {
                continue;
            };
            match collect_fields(part_name, label, &part.data) {
                Ok(found) => fields.extend(found),
                Err(error) => tracing::debug!("{part_name}: {error}"),
            }
        }
        fields
    }
}

impl Cleaner for ArchiveRewriter {
    fn name(&self) -> &str {
        "archive"
    }

    fn extract_metadata(&self, path: &Path) -> MetadataMap {
        match ArchiveDocument::read(path) {
            Ok(doc) => self.read_metadata(&doc),
            Err(error) => {
                tracing::debug!("no se pudo leer {}: {error}", path.display());
                MetadataMap::new()
            }
        }
    }

    fn clean(&self, input: &Path, output: &Path, level: CleaningLevel) -> Result<CleanReport> {
        let mut doc = ArchiveDocument::read(input)?;
        let report = self.rewrite(&mut doc, level)?;

        let sort_entries = CleaningPolicy::rebuilds_container(level);
        write_atomically(output, |staged| doc.write(staged, sort_entries))?;

        tracing::debug!(
            "{}: {} campos eliminados",
            input.display(),
            report.metadata_removed.len()
        );
        Ok(report)
    }
}
