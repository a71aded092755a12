//! Manifiesto del contenedor (`[Content_Types].xml` o `META-INF/manifest.xml`) y
//! relaciones de paquete.

use std::collections::BTreeSet;

use quick_xml::events::BytesStart;

use crate::error::{CleanError, Result};

use super::archive::{ArchiveDocument, ArchiveFlavor};
use super::constants::PACKAGE_RELS_PART;
use super::xml::{ChildAction, Container, qualified_attr, rewrite_children, root_children};

const ODF_FILE_ENTRY: &[u8] = b"manifest:file-entry";
const ODF_FULL_PATH: &str = "manifest:full-path";

/// Parte a la que apunta una entrada del manifiesto, sin barra inicial.
fn manifest_entry_target(flavor: ArchiveFlavor, element: &BytesStart<'_>) -> Option<String> {
    match flavor {
        ArchiveFlavor::OfficeOpenXml if element.name().as_ref() == b"Override" => {
            qualified_attr(element, "PartName").map(|name| name.trim_start_matches('/').to_string())
        }
        ArchiveFlavor::OpenDocument if element.name().as_ref() == ODF_FILE_ENTRY => {
            qualified_attr(element, ODF_FULL_PATH).filter(|path| path != "/")
        }
        _ => None,
    }
}

fn relationship_target(element: &BytesStart<'_>) -> Option<String> {
    if element.name().as_ref() != b"Relationship" {
        return None;
    }
    let external = qualified_attr(element, "TargetMode")
        .is_some_and(|mode| mode.eq_ignore_ascii_case("external"));
    if external {
        return None;
    }
    qualified_attr(element, "Target").map(|target| target.trim_start_matches('/').to_string())
}

/// Entrada de `META-INF/manifest.xml` sin el prefijo `manifest:` en su nombre o
/// en su ruta.
fn malformed_odf_entry(element: &BytesStart<'_>) -> Option<String> {
    if element.local_name().as_ref() != b"file-entry" {
        return None;
    }
    if element.name().as_ref() == ODF_FILE_ENTRY && qualified_attr(element, ODF_FULL_PATH).is_some()
    {
        return None;
    }
    Some(format!(
        "<{}> sin {ODF_FULL_PATH}",
        String::from_utf8_lossy(element.name().as_ref())
    ))
}

/// Una entrada de directorio solo se descarta cuando ya no le quedan partes.
fn should_drop(target: &str, removed: &BTreeSet<String>, remaining: &ArchiveDocument) -> bool {
    if target.ends_with('/') {
        removed.iter().any(|name| name.starts_with(target)) && !remaining.contains_path(target)
    } else {
        removed.contains(target)
    }
}

/// Quita del XML los hijos cuyo destino (según `target_of`) fue eliminado. El
/// resto del documento se conserva byte a byte.
fn prune_children(
    part: &str,
    contents: &[u8],
    removed: &BTreeSet<String>,
    target_of: impl Fn(&BytesStart<'_>) -> Option<String>,
    remaining: &ArchiveDocument,
) -> Result<Option<Vec<u8>>> {
    rewrite_children(part, contents, Container::Root, |child| match target_of(child) {
        Some(target) if should_drop(&target, removed, remaining) => ChildAction::Drop,
        _ => ChildAction::Keep,
    })
}

/// Elimina del manifiesto y de las relaciones de paquete las referencias a partes
/// borradas. Devuelve las partes reescritas.
pub(crate) fn prune_references(
    doc: &mut ArchiveDocument,
    removed: &BTreeSet<String>,
) -> Result<Vec<&'static str>> {
    let mut rewritten = Vec::new();
    if removed.is_empty() {
        return Ok(rewritten);
    }

    let flavor = doc.flavor();
    let manifest = flavor.manifest_part();
    if let Some(part) = doc.part(manifest) {
        let pruned = prune_children(
            manifest,
            &part.data,
            removed,
            |element| manifest_entry_target(flavor, element),
            doc,
        )?;
        if let Some(bytes) = pruned {
            doc.replace(manifest, bytes);
            rewritten.push(manifest);
        }
    } else {
        tracing::debug!("sin manifiesto {manifest}, se omite su actualización");
    }

    if flavor == ArchiveFlavor::OfficeOpenXml
        && let Some(part) = doc.part(PACKAGE_RELS_PART)
    {
        let pruned = prune_children(
            PACKAGE_RELS_PART,
            &part.data,
            removed,
            relationship_target,
            doc,
        )?;
        if let Some(bytes) = pruned {
            doc.replace(PACKAGE_RELS_PART, bytes);
            rewritten.push(PACKAGE_RELS_PART);
        }
    }

    Ok(rewritten)
}

/// Referencias del manifiesto y de las relaciones de paquete que no apuntan a
/// ninguna parte existente, y entradas ODF que perdieron su espacio de nombres.
/// Las entradas de directorio no se comprueban.
pub(crate) fn dangling_references(doc: &ArchiveDocument) -> Result<Vec<String>> {
    let flavor = doc.flavor();
    let mut dangling = Vec::new();

    if let Some(part) = doc.part(flavor.manifest_part()) {
        for child in root_children(flavor.manifest_part(), &part.data)? {
            if flavor == ArchiveFlavor::OpenDocument
                && let Some(problem) = malformed_odf_entry(&child)
            {
                dangling.push(problem);
                continue;
            }
            if let Some(target) = manifest_entry_target(flavor, &child)
                && !target.ends_with('/')
                && !doc.contains(&target)
            {
                dangling.push(target);
            }
        }
    }

    if flavor == ArchiveFlavor::OfficeOpenXml
        && let Some(part) = doc.part(PACKAGE_RELS_PART)
    {
        for child in root_children(PACKAGE_RELS_PART, &part.data)? {
            if let Some(target) = relationship_target(&child)
                && !doc.contains(&target)
            {
                dangling.push(target);
            }
        }
    }

    Ok(dangling)
}

/// Falla con `ArchiveCorruption` si alguna referencia quedó colgando.
pub(crate) fn ensure_consistent(doc: &ArchiveDocument) -> Result<()> {
    let dangling = dangling_references(doc)?;
    if dangling.is_empty() {
        return Ok(());
    }
    Err(CleanError::ArchiveCorruption(format!(
        "el manifiesto referencia partes inexistentes: {}",
        dangling.join(", ")
    )))
}
