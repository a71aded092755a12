//! Nombres de partes y espacios de nombres de los contenedores OOXML y ODF.

pub const CUSTOM_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/custom-properties";
pub const ODF_META_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:meta:1.0";
pub const ODF_OFFICE_NS: &str = "urn:oasis:names:tc:opendocument:xmlns:office:1.0";

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PACKAGE_RELS_PART: &str = "_rels/.rels";
pub const ODF_MANIFEST_PART: &str = "META-INF/manifest.xml";
pub const ODF_MIMETYPE_PART: &str = "mimetype";

pub const CORE_PART: &str = "docProps/core.xml";
pub const APP_PART: &str = "docProps/app.xml";
pub const CUSTOM_PART: &str = "docProps/custom.xml";
pub const ODF_META_PART: &str = "meta.xml";

/// Partes de metadata y la etiqueta con la que se reportan sus campos.
pub const OOXML_METADATA_PARTS: [(&str, &str); 3] =
    [(CORE_PART, "Core"), (APP_PART, "App"), (CUSTOM_PART, "Custom")];
pub const ODF_METADATA_PARTS: [(&str, &str); 1] = [(ODF_META_PART, "Meta")];

/// Partes de cuerpo donde se buscan marcadores de sesión de edición.
pub const OOXML_BODY_PARTS: [&str; 3] = [
    "word/document.xml",
    "xl/workbook.xml",
    "ppt/presentation.xml",
];
pub const ODF_BODY_PARTS: [&str; 2] = ["content.xml", "styles.xml"];

/// Prefijos de partes estructurales opcionales.
pub const OOXML_STRUCTURAL_PREFIXES: [&str; 1] = ["docProps/thumbnail"];
pub const ODF_STRUCTURAL_PREFIXES: [&str; 3] = ["Thumbnails/", "settings.xml", "Configurations2/"];
