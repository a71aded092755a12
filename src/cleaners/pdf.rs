//! Limpieza de PDF sobre `lopdf`: diccionario Info, XMP, scripts y extras estructurales.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::classify::Category;
use crate::cleaners::{CleanReport, Cleaner, MetadataMap, insert_unique};
use crate::error::{CleanError, Result};
use crate::policy::{CleaningLevel, CleaningPolicy, MetadataDomain, field_domain};
use crate::scratch::write_atomically;

const SCRIPT_CATALOG_KEYS: [&[u8]; 2] = [b"OpenAction", b"AA"];
const STRUCTURAL_CATALOG_KEYS: [&[u8]; 2] = [b"PageLabels", b"OCProperties"];

fn object_to_string(doc: &Document, obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).trim().to_string()),
        Object::Name(name) => Some(String::from_utf8_lossy(name).trim().to_string()),
        Object::Integer(value) => Some(value.to_string()),
        Object::Reference(reference) => doc
            .get_object(*reference)
            .ok()
            .and_then(|inner| object_to_string(doc, inner)),
        _ => None,
    }
}

fn deref_dictionary<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Reference(reference) => doc.get_dictionary(*reference).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn key_name(key: &[u8]) -> String {
    String::from_utf8_lossy(key).to_string()
}

fn catalog_id(doc: &Document) -> Result<ObjectId> {
    doc.trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|e| CleanError::cleaner("pdf", format!("catálogo no encontrado: {e}")))
}

fn catalog_mut(doc: &mut Document) -> Result<&mut Dictionary> {
    let id = catalog_id(doc)?;
    doc.get_object_mut(id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| CleanError::cleaner("pdf", format!("catálogo ilegible: {e}")))
}

/// Identificador del objeto al que apunta `key` en `dict`, si es una referencia.
fn referenced_id(dict: &Dictionary, key: &[u8]) -> Option<ObjectId> {
    dict.get(key).ok().and_then(|obj| obj.as_reference().ok())
}

/// En Info, `Creator` nombra la aplicación de origen y no a una persona.
fn info_key_domain(key: &[u8]) -> MetadataDomain {
    if key == b"Creator" {
        return MetadataDomain::Descriptive;
    }
    field_domain(&key_name(key))
}

/// Campos del diccionario Info como `Info.<clave>`.
fn info_fields(doc: &Document) -> MetadataMap {
    let mut fields = MetadataMap::new();
    let Some(info) = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| deref_dictionary(doc, obj))
    else {
        return fields;
    };
    for (key, value) in info.iter() {
        if let Some(text) = object_to_string(doc, value)
            && !text.is_empty()
        {
            insert_unique(&mut fields, format!("Info.{}", key_name(key)), text);
        }
    }
    fields
}

fn catalog_markers(doc: &Document) -> MetadataMap {
    let mut markers = MetadataMap::new();
    let Some(catalog) = catalog_id(doc)
        .ok()
        .and_then(|id| doc.get_dictionary(id).ok())
    else {
        return markers;
    };

    if catalog.has(b"Metadata") {
        markers.insert("XMP.Metadata".to_string(), "presente".to_string());
    }
    let has_javascript = catalog
        .get(b"Names")
        .ok()
        .and_then(|names| deref_dictionary(doc, names))
        .is_some_and(|names| names.has(b"JavaScript"));
    if has_javascript {
        markers.insert("Catalog.JavaScript".to_string(), "presente".to_string());
    }
    for key in SCRIPT_CATALOG_KEYS.iter().chain(STRUCTURAL_CATALOG_KEYS.iter()) {
        if catalog.has(key) {
            markers.insert(format!("Catalog.{}", key_name(key)), "presente".to_string());
        }
    }
    markers
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PdfCleaner;

impl PdfCleaner {
    /// Aplica la política de `level` al documento cargado.
    pub fn scrub(&self, doc: &mut Document, level: CleaningLevel) -> Result<CleanReport> {
        let domains = CleaningPolicy::domains(Category::PageDescription, level);
        let mut report = CleanReport::default();

        self.scrub_info(doc, level, &mut report);

        let xmp_present = catalog_mut(doc)?.has(b"Metadata");
        if domains.has(MetadataDomain::Descriptive) {
            let catalog = catalog_mut(doc)?;
            let xmp_id = referenced_id(catalog, b"Metadata");
            if catalog.remove(b"Metadata").is_some() {
                report
                    .metadata_removed
                    .insert("XMP.Metadata".to_string(), "presente".to_string());
            }
            if let Some(id) = xmp_id {
                doc.objects.remove(&id);
            }
        } else if xmp_present {
            report.warn(format!(
                "se conserva el flujo XMP /Metadata en nivel {level}; puede repetir autor y fechas"
            ));
        }

        if domains.has(MetadataDomain::EmbeddedScripts) {
            self.remove_javascript_tree(doc, &mut report)?;
            let catalog = catalog_mut(doc)?;
            for key in SCRIPT_CATALOG_KEYS {
                if catalog.remove(key).is_some() {
                    report
                        .metadata_removed
                        .insert(format!("Catalog.{}", key_name(key)), "eliminado".to_string());
                }
            }
        }

        if domains.has(MetadataDomain::StructuralExtras) {
            let catalog = catalog_mut(doc)?;
            for key in STRUCTURAL_CATALOG_KEYS {
                if catalog.remove(key).is_some() {
                    report
                        .metadata_removed
                        .insert(format!("Catalog.{}", key_name(key)), "eliminado".to_string());
                }
            }
        }

        if CleaningPolicy::rebuilds_container(level) {
            if doc.trailer.remove(b"ID").is_some() {
                report
                    .metadata_removed
                    .insert("Trailer.ID".to_string(), "eliminado".to_string());
            }
            let pruned = doc.prune_objects();
            tracing::debug!("{} objetos huérfanos eliminados", pruned.len());
            doc.renumber_objects();
            doc.compress();
        }

        Ok(report)
    }

    fn scrub_info(&self, doc: &mut Document, level: CleaningLevel, report: &mut CleanReport) {
        let domains = CleaningPolicy::domains(Category::PageDescription, level);
        let fields = info_fields(doc);
        let Ok(info_obj) = doc.trailer.get(b"Info") else {
            return;
        };
        let info_ref = info_obj.as_reference().ok();

        if CleaningPolicy::drops_metadata_parts(level) {
            report.metadata_removed.extend(fields);
            doc.trailer.remove(b"Info");
            if let Some(id) = info_ref {
                doc.objects.remove(&id);
            }
            return;
        }

        let strip: Vec<Vec<u8>> = {
            let Some(info) = doc
                .trailer
                .get(b"Info")
                .ok()
                .and_then(|obj| deref_dictionary(doc, obj))
            else {
                return;
            };
            info.iter()
                .filter(|(key, _)| domains.has(info_key_domain(key)))
                .map(|(key, _)| key.clone())
                .collect()
        };
        if strip.is_empty() {
            return;
        }

        let info = match info_ref {
            Some(id) => doc.get_object_mut(id).and_then(Object::as_dict_mut).ok(),
            None => doc
                .trailer
                .get_mut(b"Info")
                .and_then(Object::as_dict_mut)
                .ok(),
        };
        let Some(info) = info else {
            return;
        };
        for key in strip {
            info.remove(&key);
            let name = format!("Info.{}", key_name(&key));
            if let Some(value) = fields.get(&name) {
                report.metadata_removed.insert(name, value.clone());
            } else {
                report.metadata_removed.insert(name, String::new());
            }
        }
    }

    fn remove_javascript_tree(&self, doc: &mut Document, report: &mut CleanReport) -> Result<()> {
        let names_ref = referenced_id(catalog_mut(doc)?, b"Names");
        let names = match names_ref {
            Some(id) => doc.get_object_mut(id).and_then(Object::as_dict_mut).ok(),
            None => catalog_mut(doc)?
                .get_mut(b"Names")
                .and_then(Object::as_dict_mut)
                .ok(),
        };
        if let Some(names) = names
            && names.remove(b"JavaScript").is_some()
        {
            report
                .metadata_removed
                .insert("Catalog.JavaScript".to_string(), "eliminado".to_string());
        }
        Ok(())
    }
}

impl Cleaner for PdfCleaner {
    fn name(&self) -> &str {
        "pdf"
    }

    fn extract_metadata(&self, path: &Path) -> MetadataMap {
        match Document::load(path) {
            Ok(doc) => {
                let mut fields = info_fields(&doc);
                fields.extend(catalog_markers(&doc));
                fields
            }
            Err(error) => {
                tracing::debug!("no se pudo leer {}: {error}", path.display());
                MetadataMap::new()
            }
        }
    }

    fn clean(&self, input: &Path, output: &Path, level: CleaningLevel) -> Result<CleanReport> {
        let mut doc = Document::load(input)
            .map_err(|e| CleanError::unreadable(input, format!("PDF ilegible: {e}")))?;
        if doc.is_encrypted() {
            return Err(CleanError::cleaner("pdf", "los PDF cifrados no están soportados"));
        }

        let report = self.scrub(&mut doc, level)?;

        write_atomically(output, |staged| {
            doc.save(staged)
                .map(|_| ())
                .map_err(|e| CleanError::cleaner("pdf", format!("no se pudo guardar: {e}")))
        })?;
        Ok(report)
    }
}
