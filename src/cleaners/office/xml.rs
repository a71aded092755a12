use std::io::Cursor;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use xmltree::{Element, XMLNode};

use crate::error::{CleanError, Result};

use super::constants::{CUSTOM_NS, ODF_OFFICE_NS};

/// Describe cómo localizar un elemento por nombre local y espacio de nombres.
#[derive(Clone, Copy)]
pub(crate) struct FieldSpec<'a> {
    pub(crate) local_name: &'a str,
    pub(crate) namespace: Option<&'a str>,
}

const ODF_META_CONTAINER: FieldSpec<'static> = FieldSpec {
    local_name: "meta",
    namespace: Some(ODF_OFFICE_NS),
};

const CUSTOM_PROPERTY: FieldSpec<'static> = FieldSpec {
    local_name: "property",
    namespace: Some(CUSTOM_NS),
};

pub(crate) fn parse(part: &str, contents: &[u8]) -> Result<Element> {
    Element::parse(Cursor::new(contents))
        .map_err(|e| CleanError::ArchiveCorruption(format!("{part}: XML inválido: {e}")))
}

/// Comprueba si un elemento coincide con la especificación de búsqueda.
pub(crate) fn element_matches(element: &Element, spec: &FieldSpec<'_>) -> bool {
    if element.name != spec.local_name {
        return false;
    }

    match (spec.namespace, element.namespace.as_deref()) {
        (Some(expected), Some(actual)) => expected == actual,
        (Some(_), None) => false,
        (None, _) => true,
    }
}

pub(crate) fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

pub(crate) fn is_leaf(element: &Element) -> bool {
    child_elements(element).next().is_none()
}

/// `office:meta` de un documento ODF, si existe.
pub(crate) fn meta_container(root: &Element) -> Option<&Element> {
    child_elements(root).find(|child| element_matches(child, &ODF_META_CONTAINER))
}

/// Elemento que agrupa las propiedades: `office:meta` en ODF, la raíz en OOXML.
pub(crate) fn properties_container(root: &Element) -> &Element {
    meta_container(root).unwrap_or(root)
}

pub(crate) fn is_custom_property(element: &Element) -> bool {
    element_matches(element, &CUSTOM_PROPERTY)
}

/// Devuelve el texto plano contenido dentro de un elemento.
pub(crate) fn element_text_content(element: &Element) -> String {
    let mut content = String::new();
    for node in &element.children {
        match node {
            XMLNode::Text(text) | XMLNode::CData(text) => content.push_str(text),
            _ => {}
        }
    }
    content.trim().to_string()
}

/// Texto de un elemento o, si no tiene, el de su primer hijo (valores `vt:*`).
pub(crate) fn element_value(element: &Element) -> String {
    let own = element_text_content(element);
    if !own.is_empty() {
        return own;
    }
    child_elements(element)
        .map(element_text_content)
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

pub(crate) fn get_attr_value(element: &Element, key: &str) -> Option<String> {
    for (attr_key, value) in &element.attributes {
        if attr_key == key || attr_key.ends_with(&format!(":{key}")) {
            return Some(value.to_string());
        }
    }
    None
}

/// Qué hacer con un hijo directo del contenedor al reescribir una parte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChildAction {
    Keep,
    /// Conserva la etiqueta y descarta su texto.
    Blank,
    Drop,
}

/// Elemento cuyos hijos directos se someten a `rewrite_children`.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Container<'a> {
    Root,
    /// Primer hijo de la raíz con este nombre local.
    RootChild(&'a [u8]),
}

fn read_error(part: &str, error: quick_xml::Error) -> CleanError {
    CleanError::ArchiveCorruption(format!("{part}: XML inválido: {error}"))
}

fn is_blank_text(text: &[u8]) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

/// Reescribe una parte evento a evento: los hijos del contenedor pasan por
/// `decide` y todo lo demás se copia tal cual, atributos y prefijos incluidos.
/// Devuelve `None` si nada cambió.
pub(crate) fn rewrite_children(
    part: &str,
    contents: &[u8],
    container: Container<'_>,
    mut decide: impl FnMut(&BytesStart<'_>) -> ChildAction,
) -> Result<Option<Vec<u8>>> {
    let mut reader = Reader::from_reader(contents);
    let mut writer = Writer::new(Vec::with_capacity(contents.len()));
    let mut depth = 0usize;
    let mut container_depth: Option<usize> = None;
    let mut active: Option<(usize, ChildAction)> = None;
    let mut pending_space: Vec<Event<'static>> = Vec::new();
    let mut changed = false;

    loop {
        let event = reader.read_event().map_err(|e| read_error(part, e))?;
        let dropping = matches!(active, Some((_, ChildAction::Drop)));
        match event {
            Event::Eof => break,
            Event::Start(start) => {
                depth += 1;
                if dropping {
                    continue;
                }
                if container_depth.is_none() && is_container(container, depth, &start) {
                    container_depth = Some(depth);
                } else if container_depth == Some(depth - 1) {
                    let action = decide(&start);
                    if action == ChildAction::Drop {
                        pending_space.clear();
                        active = Some((depth, action));
                        changed = true;
                        continue;
                    }
                    if action == ChildAction::Blank {
                        active = Some((depth, action));
                    }
                }
                write_event(part, &mut writer, &mut pending_space, Event::Start(start))?;
            }
            Event::Empty(start) => {
                if dropping {
                    continue;
                }
                if container_depth == Some(depth) && decide(&start) == ChildAction::Drop {
                    pending_space.clear();
                    changed = true;
                    continue;
                }
                write_event(part, &mut writer, &mut pending_space, Event::Empty(start))?;
            }
            Event::End(end) => {
                let closes_active = matches!(active, Some((level, _)) if level == depth);
                depth = depth.saturating_sub(1);
                if closes_active {
                    active = None;
                    if dropping {
                        continue;
                    }
                } else if dropping {
                    continue;
                }
                write_event(part, &mut writer, &mut pending_space, Event::End(end))?;
            }
            Event::Text(text) => {
                if dropping {
                    continue;
                }
                if matches!(active, Some((level, ChildAction::Blank)) if level == depth) {
                    changed |= !is_blank_text(&text);
                    continue;
                }
                if is_blank_text(&text) {
                    pending_space.push(Event::Text(text.into_owned()));
                    continue;
                }
                write_event(part, &mut writer, &mut pending_space, Event::Text(text))?;
            }
            Event::CData(data) => {
                if dropping {
                    continue;
                }
                if matches!(active, Some((level, ChildAction::Blank)) if level == depth) {
                    changed |= !data.is_empty();
                    continue;
                }
                write_event(part, &mut writer, &mut pending_space, Event::CData(data))?;
            }
            other => {
                if !dropping {
                    write_event(part, &mut writer, &mut pending_space, other)?;
                }
            }
        }
    }

    if !changed {
        return Ok(None);
    }
    flush_pending(part, &mut writer, &mut pending_space)?;
    Ok(Some(writer.into_inner()))
}

fn flush_pending(
    part: &str,
    writer: &mut Writer<Vec<u8>>,
    pending: &mut Vec<Event<'static>>,
) -> Result<()> {
    for space in pending.drain(..) {
        writer
            .write_event(space)
            .map_err(|e| CleanError::cleaner("archive", format!("{part}: {e}")))?;
    }
    Ok(())
}

/// Escribe `event` precedido del espacio en blanco pendiente.
fn write_event(
    part: &str,
    writer: &mut Writer<Vec<u8>>,
    pending: &mut Vec<Event<'static>>,
    event: Event<'_>,
) -> Result<()> {
    flush_pending(part, writer, pending)?;
    writer
        .write_event(event)
        .map_err(|e| CleanError::cleaner("archive", format!("{part}: {e}")))
}

fn is_container(container: Container<'_>, depth: usize, start: &BytesStart<'_>) -> bool {
    match container {
        Container::Root => depth == 1,
        Container::RootChild(name) => depth == 2 && start.local_name().as_ref() == name,
    }
}

/// Hijos directos de la raíz, con el nombre y los atributos tal como aparecen.
pub(crate) fn root_children(part: &str, contents: &[u8]) -> Result<Vec<BytesStart<'static>>> {
    let mut reader = Reader::from_reader(contents);
    let mut depth = 0usize;
    let mut children = Vec::new();
    loop {
        match reader.read_event().map_err(|e| read_error(part, e))? {
            Event::Eof => break,
            Event::Start(start) => {
                if depth == 1 {
                    children.push(start.into_owned());
                }
                depth += 1;
            }
            Event::Empty(start) if depth == 1 => children.push(start.into_owned()),
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(children)
}

/// Valor de un atributo por su nombre calificado exacto (`manifest:full-path`).
pub(crate) fn qualified_attr(start: &BytesStart<'_>, name: &str) -> Option<String> {
    start
        .try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|value| value.into_owned()))
}
