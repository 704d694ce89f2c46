//! EN-014: BLAKE3 fingerprints for module directories.
//!
//! A fingerprint identifies exactly which module sources a run tested.
//! Tool state (`.terraform/`, `*.tfstate*`) is not part of the module and is
//! left out, so a run does not change the fingerprint of the next one.

use crate::core::error::{Error, Result};
use crate::workspace::walk_module;
use std::io::Read;
use std::path::Path;

const STREAM_BUF_SIZE: usize = 65536;

/// Hash a file's contents. Returns `"blake3:{hex}"`.
pub fn hash_file(path: &Path) -> Result<String> {
    let read_err = |source| Error::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(read_err)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; STREAM_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(read_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

/// Hash a module directory (sorted walk, relative paths included in hash).
/// Covers the same files an isolated copy receives: symlinks resolved,
/// transient tool state skipped.
pub fn hash_directory(path: &Path) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    for entry in walk_module(path)? {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(path)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let file_hash = hash_file(entry.path())?;
        hasher.update(rel.as_bytes());
        hasher.update(b"\0");
        hasher.update(file_hash.as_bytes());
        hasher.update(b"\n");
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

/// Stable state-directory key for a module: `{basename}-{8 hex of path hash}`.
///
/// Two modules with the same basename in different places get different keys.
pub fn module_key(module_dir: &Path) -> String {
    let absolute = std::fs::canonicalize(module_dir).unwrap_or_else(|_| module_dir.to_path_buf());
    let base = absolute
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "module".to_string());
    let digest = blake3::hash(absolute.to_string_lossy().as_bytes()).to_hex();
    format!("{}-{}", sanitize(&base), &digest.as_str()[..8])
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_en014_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.tf");
        std::fs::write(&path, "resource \"a\" \"b\" {}").unwrap();
        let h = hash_file(&path).unwrap();
        assert!(h.starts_with("blake3:"));
        assert_eq!(h.len(), 7 + 64); // "blake3:" + 64 hex chars
        assert_eq!(h, hash_file(&path).unwrap());
    }

    #[test]
    fn test_en014_hash_file_not_found() {
        let err = hash_file(Path::new("/nonexistent/file.tf")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn test_en014_hash_directory_order_independent_of_creation() {
        let d1 = tempfile::tempdir().unwrap();
        std::fs::write(d1.path().join("outputs.tf"), "o").unwrap();
        std::fs::write(d1.path().join("variables.tf"), "v").unwrap();

        let d2 = tempfile::tempdir().unwrap();
        std::fs::write(d2.path().join("variables.tf"), "v").unwrap();
        std::fs::write(d2.path().join("outputs.tf"), "o").unwrap();

        assert_eq!(hash_directory(d1.path()).unwrap(), hash_directory(d2.path()).unwrap());
    }

    #[test]
    fn test_en014_hash_directory_sees_content_and_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.tf"), "a").unwrap();
        let h1 = hash_directory(dir.path()).unwrap();
        std::fs::write(dir.path().join("main.tf"), "b").unwrap();
        let h2 = hash_directory(dir.path()).unwrap();
        assert_ne!(h1, h2);
        std::fs::rename(dir.path().join("main.tf"), dir.path().join("other.tf")).unwrap();
        let h3 = hash_directory(dir.path()).unwrap();
        assert_ne!(h2, h3);
    }

    #[test]
    fn test_en014_hash_directory_ignores_tool_state() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.tf"), "a").unwrap();
        let before = hash_directory(dir.path()).unwrap();

        std::fs::create_dir(dir.path().join(".terraform")).unwrap();
        std::fs::write(dir.path().join(".terraform/provider"), "bin").unwrap();
        std::fs::write(dir.path().join("terraform.tfstate"), "{}").unwrap();
        assert_eq!(before, hash_directory(dir.path()).unwrap());

        std::fs::create_dir(dir.path().join("modules")).unwrap();
        std::fs::write(dir.path().join("modules/child.tf"), "c").unwrap();
        assert_ne!(before, hash_directory(dir.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_en014_hash_directory_follows_symlinks() {
        let root = tempfile::tempdir().unwrap();
        let shared = root.path().join("shared.tf");
        std::fs::write(&shared, "a").unwrap();
        let dir = root.path().join("m");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("main.tf"), "a").unwrap();
        let before = hash_directory(&dir).unwrap();

        std::os::unix::fs::symlink(&shared, dir.join("versions.tf")).unwrap();
        let linked = hash_directory(&dir).unwrap();
        assert_ne!(before, linked);

        std::fs::write(&shared, "b").unwrap();
        assert_ne!(linked, hash_directory(&dir).unwrap());

        std::os::unix::fs::symlink("..", dir.join("loop")).unwrap();
        assert!(hash_directory(&dir).is_ok());
    }

    #[test]
    fn test_en014_module_key() {
        let root = tempfile::tempdir().unwrap();
        let a = root.path().join("a/storage");
        let b = root.path().join("b/storage");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();

        let ka = module_key(&a);
        let kb = module_key(&b);
        assert!(ka.starts_with("storage-"));
        assert_eq!(ka.len(), "storage-".len() + 8);
        assert_ne!(ka, kb);
        assert_eq!(ka, module_key(&a));
    }

    #[test]
    fn test_en014_module_key_sanitized() {
        let root = tempfile::tempdir().unwrap();
        let odd = root.path().join("my module.v2");
        std::fs::create_dir_all(&odd).unwrap();
        assert!(module_key(&odd).starts_with("my_module_v2-"));
    }
}
