//! Imágenes rasterizadas: se decodifican y vuelven a codificar, lo que descarta
//! EXIF, XMP y los bloques de texto del contenedor original.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::cleaners::{CleanReport, Cleaner, MetadataMap, insert_unique};
use crate::error::{CleanError, Result};
use crate::policy::{CleaningLevel, CleaningPolicy};
use crate::scratch::write_atomically;

const JPEG_QUALITY: u8 = 95;

/// Campos EXIF como `EXIF.<etiqueta>`.
fn exif_fields(path: &Path) -> MetadataMap {
    let mut fields = MetadataMap::new();
    let Ok(file) = File::open(path) else {
        return fields;
    };
    let mut reader = BufReader::new(file);
    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => {
            for field in exif.fields() {
                let value = field.display_value().with_unit(&exif).to_string();
                let value = value.trim_matches('"').trim().to_string();
                if !value.is_empty() {
                    insert_unique(&mut fields, format!("EXIF.{}", field.tag), value);
                }
            }
        }
        Err(exif::Error::NotFound(_)) | Err(exif::Error::BlankValue(_)) => {}
        Err(error) => tracing::debug!("EXIF ilegible en {}: {error}", path.display()),
    }
    fields
}

fn encode(img: &DynamicImage, format: ImageFormat, staged: &Path) -> Result<()> {
    let encode_error = |e: image::ImageError| {
        CleanError::cleaner("image", format!("no se pudo guardar la imagen limpia: {e}"))
    };
    if format == ImageFormat::Jpeg {
        let file = File::create(staged).map_err(|e| CleanError::io(staged, e))?;
        let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY);
        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(encoder)
            .map_err(encode_error)
    } else {
        img.save_with_format(staged, format).map_err(encode_error)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ImageCleaner;

impl Cleaner for ImageCleaner {
    fn name(&self) -> &str {
        "image"
    }

    fn extract_metadata(&self, path: &Path) -> MetadataMap {
        exif_fields(path)
    }

    fn clean(&self, input: &Path, output: &Path, level: CleaningLevel) -> Result<CleanReport> {
        let reader = ImageReader::open(input)
            .map_err(|e| CleanError::unreadable(input, format!("no se pudo abrir la imagen: {e}")))?
            .with_guessed_format()
            .map_err(|e| CleanError::unreadable(input, e))?;
        let Some(format) = reader.format() else {
            return Err(CleanError::unreadable(input, "formato de imagen desconocido"));
        };
        let img = reader.decode().map_err(|e| {
            CleanError::unreadable(input, format!("no se pudo decodificar la imagen: {e}"))
        })?;

        let mut report = CleanReport {
            metadata_removed: exif_fields(input),
            warnings: Vec::new(),
        };
        if !CleaningPolicy::drops_metadata_parts(level) && !report.metadata_removed.is_empty() {
            report.warn(format!(
                "la recodificación elimina todos los bloques de metadata, no solo los del nivel {level}"
            ));
        }
        if format == ImageFormat::Gif {
            report.warn("solo se conserva el primer cuadro del GIF");
        }

        write_atomically(output, |staged| encode(&img, format, staged))?;
        tracing::debug!("imagen recodificada como {format:?}: {}", output.display());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;

    /// Segmento APP1 con un único campo `Artist`.
    fn exif_segment() -> Vec<u8> {
        let mut tiff = b"II\x2a\x00\x08\x00\x00\x00".to_vec();
        tiff.extend_from_slice(&[0x01, 0x00]);
        tiff.extend_from_slice(&[0x3b, 0x01, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00]);
        tiff.extend_from_slice(b"Ana\0");
        tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(&tiff);
        let length = (payload.len() + 2) as u16;

        let mut segment = vec![0xff, 0xe1];
        segment.extend_from_slice(&length.to_be_bytes());
        segment.extend_from_slice(&payload);
        segment
    }

    fn create_jpeg_with_exif(path: &Path) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let img = RgbImage::from_pixel(8, 8, Rgb([200, 30, 30]));
        let plain = path.with_extension("plain.jpg");
        img.save(&plain)?;

        let bytes = fs::read(&plain)?;
        let mut with_exif = bytes[..2].to_vec();
        with_exif.extend_from_slice(&exif_segment());
        with_exif.extend_from_slice(&bytes[2..]);
        fs::write(path, with_exif)?;
        fs::remove_file(plain)?;
        Ok(())
    }

    #[test]
    fn reencoding_drops_exif() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("foto.jpg");
        create_jpeg_with_exif(&path)?;
        assert_eq!(
            ImageCleaner.extract_metadata(&path).get("EXIF.Artist").map(String::as_str),
            Some("Ana")
        );

        let report = ImageCleaner.clean(&path, &path, CleaningLevel::Deep)?;

        assert!(report.metadata_removed.contains_key("EXIF.Artist"));
        assert!(ImageCleaner.extract_metadata(&path).is_empty());
        let cleaned = image::open(&path)?;
        assert_eq!((cleaned.width(), cleaned.height()), (8, 8));
        Ok(())
    }

    #[test]
    fn basic_warns_that_everything_goes() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("foto.jpg");
        create_jpeg_with_exif(&path)?;

        let report = ImageCleaner.clean(&path, &path, CleaningLevel::Basic)?;
        assert_eq!(report.warnings.len(), 1);
        Ok(())
    }

    #[test]
    fn png_keeps_its_format() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("icono.png");
        let output = dir.path().join("icono_limpio.png");
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 255])).save(&input)?;

        let report = ImageCleaner.clean(&input, &output, CleaningLevel::Paranoid)?;

        assert!(report.metadata_removed.is_empty());
        assert_eq!(image::ImageFormat::from_path(&output)?, ImageFormat::Png);
        assert_eq!(
            image::open(&output)?.to_rgb8().get_pixel(0, 0),
            &Rgb([0, 0, 255])
        );
        Ok(())
    }

    #[test]
    fn corrupt_image_is_left_untouched() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("rota.png");
        fs::write(&path, b"\x89PNG\r\n\x1a\nbasura")?;

        let err = ImageCleaner
            .clean(&path, &path, CleaningLevel::Deep)
            .expect_err("debe fallar");
        assert_eq!(err.kind(), crate::error::ErrorKind::InputError);
        assert_eq!(fs::read(&path)?, b"\x89PNG\r\n\x1a\nbasura");
        Ok(())
    }
}
