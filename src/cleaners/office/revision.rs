//! Marcadores de sesión de edición (`w:rsid*`, `officeooo:rsid`) en partes de cuerpo.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::bytes::{Captures, Regex};

// Solo se inspecciona el interior de etiquetas; los nodos de texto no se tocan.
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^<>!?]*>").expect("patrón de etiqueta válido"));

static RSID_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+(?:w:rsid\w*|officeooo:(?:paragraph-)?rsid)="[^"]*""#)
        .expect("patrón rsid válido")
});

/// Elimina los atributos rsid y devuelve cuántos se quitaron. Con cero
/// eliminaciones los bytes originales se devuelven tal cual.
pub(crate) fn strip_revision_markers(contents: Vec<u8>) -> (Vec<u8>, usize) {
    let mut removed = 0_usize;
    let rewritten = TAG.replace_all(&contents, |caps: &Captures<'_>| {
        let tag = &caps[0];
        let count = RSID_ATTRIBUTE.find_iter(tag).count();
        if count == 0 {
            return tag.to_vec();
        }
        removed += count;
        RSID_ATTRIBUTE.replace_all(tag, &b""[..]).into_owned()
    });

    match rewritten {
        Cow::Owned(bytes) if removed > 0 => (bytes, removed),
        _ => (contents, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_rsid_attributes_inside_tags() {
        let xml = br#"<w:p w:rsidR="00A1" w:rsidRDefault="00B2"><w:r w:rsidRPr="00C3"><w:t>Hola</w:t></w:r></w:p>"#;
        let (out, count) = strip_revision_markers(xml.to_vec());
        assert_eq!(count, 3);
        assert_eq!(out, br#"<w:p><w:r><w:t>Hola</w:t></w:r></w:p>"#.to_vec());
    }

    #[test]
    fn text_that_looks_like_an_attribute_is_kept() {
        let xml = br#"<w:t> w:rsidR="texto literal"</w:t>"#;
        let (out, count) = strip_revision_markers(xml.to_vec());
        assert_eq!(count, 0);
        assert_eq!(out, xml.to_vec());
    }

    #[test]
    fn odf_rsid_attributes_are_removed() {
        let xml = br##"<style:text-properties officeooo:rsid="0012" officeooo:paragraph-rsid="0013" fo:color="#000000"/>"##;
        let (out, count) = strip_revision_markers(xml.to_vec());
        assert_eq!(count, 2);
        assert_eq!(out, br##"<style:text-properties fo:color="#000000"/>"##.to_vec());
    }
}
