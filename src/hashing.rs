//! Hash SHA-256 de contenido para comparar el archivo antes y después de limpiar.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{CleanError, Result};

/// Calcula el SHA-256 del archivo leyendo en bloques de 8 KiB.
pub fn content_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| CleanError::io(path, e))?;

    let mut sha256 = Sha256::new();
    let mut buffer = [0_u8; 8192];
    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(bytes_read) => sha256.update(&buffer[..bytes_read]),
            Err(error) => return Err(CleanError::io(path, error)),
        }
    }

    Ok(format!("{:x}", sha256.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_known_digest() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vacio.txt");
        std::fs::write(&path, b"")?;
        assert_eq!(
            content_hash(&path)?,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(content_hash(Path::new("/no/existe/archivo.bin")).is_err());
    }
}
