//! Tabla de niveles de limpieza: qué dominios de metadata elimina cada nivel por categoría.
//!
//! Es la única fuente de verdad sobre el significado de Basic, Deep y Paranoid. Los
//! limpiadores consultan esta tabla en lugar de decidir por su cuenta qué eliminar.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::classify::Category;

/// Nivel de agresividad. El orden es significativo: cada nivel elimina un
/// superconjunto de lo que eliminan los niveles inferiores.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CleaningLevel {
    Basic,
    #[default]
    Deep,
    Paranoid,
}

impl CleaningLevel {
    pub const ALL: [CleaningLevel; 3] = [
        CleaningLevel::Basic,
        CleaningLevel::Deep,
        CleaningLevel::Paranoid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CleaningLevel::Basic => "basic",
            CleaningLevel::Deep => "deep",
            CleaningLevel::Paranoid => "paranoid",
        }
    }
}

impl fmt::Display for CleaningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CleaningLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "basic" => Ok(CleaningLevel::Basic),
            "deep" => Ok(CleaningLevel::Deep),
            "paranoid" => Ok(CleaningLevel::Paranoid),
            other => Err(format!("nivel de limpieza desconocido: {other}")),
        }
    }
}

/// Grupo de campos de metadata relacionados, independiente del formato.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MetadataDomain {
    /// Autor, creador, empresa, responsable.
    Identity,
    /// Fechas de creación, modificación e impresión.
    Timestamps,
    /// Contadores de revisión y marcadores de sesión de edición.
    RevisionHistory,
    EmbeddedScripts,
    /// Títulos, asuntos, palabras clave, software, propiedades personalizadas.
    Descriptive,
    /// Etiquetas de página, capas opcionales, capítulos, miniaturas.
    StructuralExtras,
}

impl MetadataDomain {
    pub const ALL: [MetadataDomain; 6] = [
        MetadataDomain::Identity,
        MetadataDomain::Timestamps,
        MetadataDomain::RevisionHistory,
        MetadataDomain::EmbeddedScripts,
        MetadataDomain::Descriptive,
        MetadataDomain::StructuralExtras,
    ];

    pub fn flag(self) -> DomainSet {
        match self {
            MetadataDomain::Identity => DomainSet::IDENTITY,
            MetadataDomain::Timestamps => DomainSet::TIMESTAMPS,
            MetadataDomain::RevisionHistory => DomainSet::REVISION_HISTORY,
            MetadataDomain::EmbeddedScripts => DomainSet::EMBEDDED_SCRIPTS,
            MetadataDomain::Descriptive => DomainSet::DESCRIPTIVE,
            MetadataDomain::StructuralExtras => DomainSet::STRUCTURAL_EXTRAS,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct DomainSet: u8 {
        const IDENTITY = 1 << 0;
        const TIMESTAMPS = 1 << 1;
        const REVISION_HISTORY = 1 << 2;
        const EMBEDDED_SCRIPTS = 1 << 3;
        const DESCRIPTIVE = 1 << 4;
        const STRUCTURAL_EXTRAS = 1 << 5;
    }
}

impl DomainSet {
    pub fn has(self, domain: MetadataDomain) -> bool {
        self.contains(domain.flag())
    }
}

/// Dominios que elimina cada nivel antes de restringirlos por categoría.
const fn level_domains(level: CleaningLevel) -> DomainSet {
    let basic = DomainSet::IDENTITY.union(DomainSet::TIMESTAMPS);
    let deep = basic
        .union(DomainSet::REVISION_HISTORY)
        .union(DomainSet::EMBEDDED_SCRIPTS)
        .union(DomainSet::DESCRIPTIVE);
    match level {
        CleaningLevel::Basic => basic,
        CleaningLevel::Deep => deep,
        CleaningLevel::Paranoid => deep.union(DomainSet::STRUCTURAL_EXTRAS),
    }
}

/// Dominios que una categoría puede transportar.
const fn applicable_domains(category: Category) -> DomainSet {
    match category {
        Category::DocumentArchive | Category::PageDescription => DomainSet::all(),
        Category::RasterImage => DomainSet::IDENTITY
            .union(DomainSet::TIMESTAMPS)
            .union(DomainSet::REVISION_HISTORY)
            .union(DomainSet::DESCRIPTIVE)
            .union(DomainSet::STRUCTURAL_EXTRAS),
        Category::Audio | Category::Video => DomainSet::IDENTITY
            .union(DomainSet::TIMESTAMPS)
            .union(DomainSet::DESCRIPTIVE)
            .union(DomainSet::STRUCTURAL_EXTRAS),
        Category::PlainText => DomainSet::IDENTITY
            .union(DomainSet::TIMESTAMPS)
            .union(DomainSet::REVISION_HISTORY)
            .union(DomainSet::DESCRIPTIVE),
        Category::Unsupported => DomainSet::empty(),
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CleaningPolicy;

impl CleaningPolicy {
    /// Conjunto de dominios que se eliminan para `category` en `level`.
    pub fn domains(category: Category, level: CleaningLevel) -> DomainSet {
        level_domains(level).intersection(applicable_domains(category))
    }

    pub fn strips(category: Category, level: CleaningLevel, domain: MetadataDomain) -> bool {
        Self::domains(category, level).has(domain)
    }

    /// Paranoid reconstruye el contenedor en lugar de parchearlo.
    pub fn rebuilds_container(level: CleaningLevel) -> bool {
        level == CleaningLevel::Paranoid
    }

    /// Las partes de metadata completas se eliminan en lugar de editarse campo a campo.
    pub fn drops_metadata_parts(level: CleaningLevel) -> bool {
        level >= CleaningLevel::Deep
    }
}

/// Asigna un campo de metadata conocido a su dominio. Los nombres se comparan sin
/// prefijo de espacio de nombres y sin distinguir mayúsculas; los campos que no
/// aparecen en la tabla se consideran descriptivos.
pub fn field_domain(name: &str) -> MetadataDomain {
    let local = name.rsplit([':', '.']).next().unwrap_or(name).to_lowercase();

    match local.as_str() {
        "creator" | "author" | "lastmodifiedby" | "initial-creator" | "printed-by"
        | "company" | "manager" | "operator" | "artist" | "album_artist" | "albumartist"
        | "composer" | "performer" | "encoded_by" | "encodedby" | "lyricist" | "publisher"
        | "owner" | "cameraownername" => MetadataDomain::Identity,
        "created" | "modified" | "lastprinted" | "creation-date" | "date" | "print-date"
        | "creationdate" | "moddate" | "creatim" | "revtim" | "printim" | "buptim"
        | "creation_time" | "year" | "datetime" | "datetimeoriginal" | "datetimedigitized" => {
            MetadataDomain::Timestamps
        }
        "revision" | "editing-cycles" | "editing-duration" | "totaltime" | "version"
        | "vern" | "edmins" | "rsid" => MetadataDomain::RevisionHistory,
        "javascript" | "openaction" | "aa" => MetadataDomain::EmbeddedScripts,
        "pagelabels" | "ocproperties" | "chapters" | "thumbnail" => {
            MetadataDomain::StructuralExtras
        }
        _ => MetadataDomain::Descriptive,
    }
}
