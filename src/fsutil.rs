//! Output-file helpers. Every output is created with `create_new`, so an
//! existing destination file is reported as `AlreadyExists` instead of being
//! overwritten.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

fn create_new(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

pub fn write_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = create_new(path)?;
    file.write_all(bytes)?;
    file.flush()
}

/// Byte-for-byte copy into a file that must not exist yet.
pub fn copy_new(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut reader = File::open(src)?;
    let mut writer = create_new(dst)?;
    let copied = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    Ok(copied)
}

/// File size in bytes.
pub fn file_size(path: &Path) -> io::Result<u64> {
    fs::metadata(path).map(|m| m.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_new_refuses_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.bin");
        write_new(&path, b"first").unwrap();

        let err = write_new(&path, b"second").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&path).unwrap(), b"first");
    }

    #[test]
    fn copy_new_is_byte_exact() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.txt");
        let dst = tmp.path().join("b.txt");
        fs::write(&src, b"hello\0world").unwrap();

        assert_eq!(copy_new(&src, &dst).unwrap(), 11);
        assert_eq!(fs::read(&dst).unwrap(), b"hello\0world");
        assert_eq!(file_size(&dst).unwrap(), 11);
        assert!(copy_new(&src, &dst).is_err());
    }
}
