//! Texto plano y RTF. El texto plano no tiene metadata y se copia tal cual; en RTF se
//! eliminan los subgrupos del grupo `{\info ...}` según el nivel.

use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::bytes::Regex;

use crate::classify::{Category, lowercase_extension};
use crate::cleaners::{CleanReport, Cleaner, MetadataMap, insert_unique};
use crate::error::{CleanError, Result};
use crate::policy::{CleaningLevel, CleaningPolicy, field_domain};
use crate::scratch::write_atomically;

static FIELD_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{(?:\\\*)?\\(?P<field>[A-Za-z]+) ?").expect("patrón de campo RTF válido")
});

static EMPTY_INFO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\\info\s*\}$").expect("patrón de grupo vacío válido"));

const INFO_GROUP: &[u8] = b"{\\info";

/// Posición del `}` que cierra el grupo abierto en `open`. Los escapes `\{`,
/// `\}` y `\\` no cuentan.
fn group_end(content: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0_usize;
    let mut index = open;
    while index < content.len() {
        match content[index] {
            b'\\' => index += 1,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
        index += 1;
    }
    None
}

/// Rango del grupo `{\info ...}` completo, llaves incluidas.
fn info_group_range(content: &[u8]) -> Option<Range<usize>> {
    let start = content
        .windows(INFO_GROUP.len())
        .enumerate()
        .find(|(index, window)| {
            *window == INFO_GROUP
                && !content
                    .get(index + INFO_GROUP.len())
                    .is_some_and(u8::is_ascii_alphabetic)
        })
        .map(|(index, _)| index)?;
    group_end(content, start).map(|end| start..end + 1)
}

/// Subgrupo directo de `{\info ...}`.
struct InfoField {
    name: String,
    value: String,
    range: Range<usize>,
}

/// Subgrupos directos del grupo de información, con sus valores completos
/// aunque lleven llaves escapadas o grupos anidados.
fn info_fields(group: &[u8]) -> Vec<InfoField> {
    let mut fields = Vec::new();
    let mut index = INFO_GROUP.len();
    while index < group.len().saturating_sub(1) {
        match group[index] {
            b'\\' => index += 2,
            b'{' => {
                let Some(end) = group_end(group, index) else {
                    break;
                };
                let field = &group[index..=end];
                if let Some(caps) = FIELD_HEADER.captures(field) {
                    let header = caps.get(0).map_or(0, |m| m.end());
                    fields.push(InfoField {
                        name: String::from_utf8_lossy(&caps["field"]).to_string(),
                        value: String::from_utf8_lossy(&field[header..field.len() - 1])
                            .trim()
                            .to_string(),
                        range: index..end + 1,
                    });
                }
                index = end + 1;
            }
            _ => index += 1,
        }
    }
    fields
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TextCleaner;

impl TextCleaner {
    fn is_rtf(path: &Path) -> bool {
        lowercase_extension(path) == "rtf"
    }

    /// Elimina campos del grupo de información y devuelve el RTF resultante.
    pub fn strip_rtf(&self, content: &[u8], level: CleaningLevel) -> (Vec<u8>, MetadataMap) {
        let mut removed = MetadataMap::new();
        let Some(range) = info_group_range(content) else {
            return (content.to_vec(), removed);
        };

        let domains = CleaningPolicy::domains(Category::PlainText, level);
        let group = &content[range.clone()];
        let mut cleaned = Vec::with_capacity(group.len());
        let mut copied = 0;
        for field in info_fields(group) {
            if !domains.has(field_domain(&field.name)) {
                continue;
            }
            cleaned.extend_from_slice(&group[copied..field.range.start]);
            copied = field.range.end;
            insert_unique(&mut removed, format!("RTF.{}", field.name), field.value);
        }
        cleaned.extend_from_slice(&group[copied..]);

        let mut output = Vec::with_capacity(content.len());
        output.extend_from_slice(&content[..range.start]);
        if !(CleaningPolicy::drops_metadata_parts(level) && EMPTY_INFO.is_match(&cleaned)) {
            output.extend_from_slice(&cleaned);
        }
        output.extend_from_slice(&content[range.end..]);
        (output, removed)
    }
}

impl Cleaner for TextCleaner {
    fn name(&self) -> &str {
        "text"
    }

    fn extract_metadata(&self, path: &Path) -> MetadataMap {
        let mut fields = MetadataMap::new();
        if !Self::is_rtf(path) {
            return fields;
        }
        let Ok(content) = fs::read(path) else {
            return fields;
        };
        let Some(range) = info_group_range(&content) else {
            return fields;
        };
        for field in info_fields(&content[range]) {
            insert_unique(&mut fields, format!("RTF.{}", field.name), field.value);
        }
        fields
    }

    fn clean(&self, input: &Path, output: &Path, level: CleaningLevel) -> Result<CleanReport> {
        let content = fs::read(input).map_err(|e| CleanError::io(input, e))?;

        let mut report = CleanReport::default();
        let cleaned = if Self::is_rtf(input) {
            let (cleaned, removed) = self.strip_rtf(&content, level);
            report.metadata_removed = removed;
            cleaned
        } else {
            content
        };

        write_atomically(output, |staged| {
            fs::write(staged, &cleaned).map_err(|e| CleanError::io(staged, e))
        })?;
        Ok(report)
    }
}
