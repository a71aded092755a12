use xmltree::Element;

use crate::cleaners::{MetadataMap, insert_unique};
use crate::error::Result;

use super::constants::ODF_META_NS;
use super::xml::{
    FieldSpec, child_elements, element_matches, element_text_content, element_value,
    get_attr_value, is_custom_property, is_leaf, parse, properties_container,
};

const ODF_USER_DEFINED: FieldSpec<'static> = FieldSpec {
    local_name: "user-defined",
    namespace: Some(ODF_META_NS),
};

/// Nombre de una propiedad personalizada (`custom.xml` u ODF `meta:user-defined`).
pub(crate) fn custom_property_name(element: &Element) -> Option<String> {
    if is_custom_property(element) || element_matches(element, &ODF_USER_DEFINED) {
        return get_attr_value(element, "name");
    }
    None
}

pub(crate) fn field_key(label: &str, element: &Element) -> String {
    format!("{label}.{}", element.name)
}

/// Campos no vacíos de una parte de propiedades.
pub(crate) fn collect_fields(part: &str, label: &str, contents: &[u8]) -> Result<MetadataMap> {
    let root = parse(part, contents)?;
    let container = properties_container(&root);

    let mut fields = MetadataMap::new();
    for child in child_elements(container) {
        if let Some(name) = custom_property_name(child) {
            insert_unique(&mut fields, format!("Custom.{name}"), element_value(child));
            continue;
        }
        if !is_leaf(child) {
            continue;
        }
        let value = element_text_content(child);
        if !value.is_empty() {
            insert_unique(&mut fields, field_key(label, child), value);
        }
    }
    Ok(fields)
}
