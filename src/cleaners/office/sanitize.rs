use crate::cleaners::{MetadataMap, insert_unique};
use crate::error::Result;
use crate::policy::{DomainSet, MetadataDomain, field_domain};

use super::extract::{custom_property_name, field_key};
use super::xml::{
    ChildAction, Container, child_elements, element_text_content, element_value, is_leaf,
    meta_container, parse, properties_container, rewrite_children,
};

/// Vacía los campos de una parte de propiedades cuyo dominio está en `domains` y
/// conserva la parte. Si no se elimina nada se devuelven los bytes originales.
pub(crate) fn blank_fields(
    part: &str,
    label: &str,
    contents: Vec<u8>,
    domains: DomainSet,
) -> Result<(Vec<u8>, MetadataMap)> {
    let root = parse(part, &contents)?;
    let strip_custom = domains.has(MetadataDomain::Descriptive);

    let mut removed = MetadataMap::new();
    let mut actions = Vec::new();
    for child in child_elements(properties_container(&root)) {
        if let Some(name) = custom_property_name(child) {
            if strip_custom {
                insert_unique(&mut removed, format!("Custom.{name}"), element_value(child));
                actions.push(ChildAction::Drop);
            } else {
                actions.push(ChildAction::Keep);
            }
            continue;
        }

        let value = element_text_content(child);
        if !is_leaf(child) || value.is_empty() || !domains.has(field_domain(&child.name)) {
            actions.push(ChildAction::Keep);
            continue;
        }
        insert_unique(&mut removed, field_key(label, child), value);
        actions.push(ChildAction::Blank);
    }

    if removed.is_empty() {
        return Ok((contents, removed));
    }

    let container = if meta_container(&root).is_some() {
        Container::RootChild(b"meta")
    } else {
        Container::Root
    };
    let mut actions = actions.into_iter();
    let rewritten = rewrite_children(part, &contents, container, |_| {
        actions.next().unwrap_or(ChildAction::Keep)
    })?;

    tracing::debug!("{part}: {} campos vaciados", removed.len());
    Ok((rewritten.unwrap_or(contents), removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Category;
    use crate::policy::{CleaningLevel, CleaningPolicy};

    const CORE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
    <dc:creator>Ana</dc:creator>
    <dcterms:created xsi:type="dcterms:W3CDTF">2024-01-01T00:00:00Z</dcterms:created>
    <dc:title>Plan &amp; presupuesto</dc:title>
</cp:coreProperties>
"#;

    #[test]
    fn blanking_keeps_every_tag_byte_for_byte() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let domains = CleaningPolicy::domains(Category::DocumentArchive, CleaningLevel::Basic);
        let (bytes, removed) =
            blank_fields("docProps/core.xml", "Core", CORE.as_bytes().to_vec(), domains)?;
        let text = String::from_utf8(bytes)?;

        assert_eq!(removed.len(), 2);
        assert!(text.contains(r#"<dcterms:created xsi:type="dcterms:W3CDTF"></dcterms:created>"#));
        assert!(text.contains("<dc:creator></dc:creator>"));
        assert!(text.contains("<dc:title>Plan &amp; presupuesto</dc:title>"));
        assert_eq!(text, CORE.replace("Ana", "").replace("2024-01-01T00:00:00Z", ""));
        Ok(())
    }

    #[test]
    fn nothing_to_blank_returns_the_input() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let (bytes, removed) =
            blank_fields("docProps/core.xml", "Core", CORE.as_bytes().to_vec(), DomainSet::empty())?;
        assert!(removed.is_empty());
        assert_eq!(bytes, CORE.as_bytes());
        Ok(())
    }
}
