#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use metaclean::{EngineConfig, MetadataCleaner};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
    <Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
    <Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>
</Types>
"#;

pub const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
    <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
    <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>
"#;

pub const DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p w:rsidR="00A1B2C3"><w:r><w:t>Contenido visible</w:t></w:r></w:p></w:body></w:document>
"#;

pub const APP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>Microsoft Word</Application><Company>Acme</Company></Properties>
"#;

pub const WORD_MEDIA: &[u8] = b"\x89PNG\r\n\x1a\nimagen incrustada";

pub fn core_xml(creator: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:creator>{creator}</dc:creator><dc:title>Informe</dc:title><dcterms:created xsi:type="dcterms:W3CDTF">2024-03-01T09:00:00Z</dcterms:created></cp:coreProperties>
"#
    )
}

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) -> TestResult {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::<'_, ()>::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(data)?;
    }
    zip.finish()?;
    Ok(())
}

/// DOCX mínimo cuyo `docProps/core.xml` lleva `creator`.
pub fn create_docx(path: &Path, creator: &str) -> TestResult {
    let core = core_xml(creator);
    write_zip(
        path,
        &[
            ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
            ("_rels/.rels", RELS_XML.as_bytes()),
            ("word/document.xml", DOCUMENT_XML.as_bytes()),
            ("word/media/image1.png", WORD_MEDIA),
            ("docProps/core.xml", core.as_bytes()),
            ("docProps/app.xml", APP_XML.as_bytes()),
        ],
    )
}

pub fn create_rtf(path: &Path, author: &str) -> TestResult {
    fs::write(
        path,
        format!(r"{{\rtf1\ansi{{\info{{\author {author}}}{{\title Notas}}}}\pard Texto\par}}"),
    )?;
    Ok(())
}

pub fn read_entry(path: &Path, name: &str) -> TestResult<Option<Vec<u8>>> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    let mut data = Vec::new();
    entry.read_to_end(&mut data)?;
    Ok(Some(data))
}

pub fn entry_names(path: &Path) -> TestResult<Vec<String>> {
    let archive = ZipArchive::new(File::open(path)?)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// Motor sin ffmpeg, para que las pruebas no dependan del entorno.
pub fn engine() -> TestResult<MetadataCleaner> {
    Ok(MetadataCleaner::new(offline_config())?)
}

pub fn offline_config() -> EngineConfig {
    EngineConfig {
        ffmpeg_path: PathBuf::from("/no/existe/ffmpeg"),
        ffprobe_path: PathBuf::from("/no/existe/ffprobe"),
        ..EngineConfig::default()
    }
}
