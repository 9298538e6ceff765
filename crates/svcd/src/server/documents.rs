//! Read-only access to files under a service's root directory.
//!
//! Names arrive from the network and are resolved strictly beneath the
//! root: absolute components and `..` are refused before any filesystem
//! access happens.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Why a requested document or directory could not be served. The display
/// text is sent to the client verbatim.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document name cannot be empty")]
    EmptyName,

    #[error("Invalid document name {0}")]
    InvalidName(String),

    #[error("File {0} does not exist")]
    FileNotFound(String),

    #[error("File {0} is not a text file")]
    NotText(String),

    #[error("Directory {0} does not exist")]
    DirectoryNotFound(String),

    #[error("Failed to read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Resolves a client-supplied name to a path under `root`.
///
/// A leading `/` is optional and refers to `root` itself. Empty names, a
/// bare `/`, and names containing `..` are refused.
pub fn resolve(root: &Path, name: &str) -> Result<PathBuf, DocumentError> {
    let relative = name.trim_start_matches('/');
    if relative.is_empty() {
        return Err(DocumentError::EmptyName);
    }

    let mut path = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(DocumentError::InvalidName(name.to_string()));
            }
        }
    }

    Ok(path)
}

/// Reads the text file `name` beneath `root`.
pub async fn read_document(root: &Path, name: &str) -> Result<String, DocumentError> {
    let path = resolve(root, name)?;

    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => Ok(contents),
        Err(e) => Err(match e.kind() {
            io::ErrorKind::NotFound => DocumentError::FileNotFound(name.to_string()),
            io::ErrorKind::InvalidData => DocumentError::NotText(name.to_string()),
            _ if path.is_dir() => DocumentError::FileNotFound(name.to_string()),
            _ => DocumentError::Io {
                name: name.to_string(),
                source: e,
            },
        }),
    }
}

/// Lists the `.txt` files directly inside directory `name` beneath `root`,
/// sorted by file name.
pub async fn list_text_files(root: &Path, name: &str) -> Result<Vec<PathBuf>, DocumentError> {
    let dir = resolve(root, name)?;
    if !dir.is_dir() {
        return Err(DocumentError::DirectoryNotFound(name.to_string()));
    }

    let io_err = |source| DocumentError::Io {
        name: name.to_string(),
        source,
    };

    let mut entries = tokio::fs::read_dir(&dir).await.map_err(io_err)?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && path.extension().is_some_and(|ext| ext == "txt") {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_strips_leading_slash() {
        let root = Path::new("/srv/docs");
        assert_eq!(
            resolve(root, "/site/index.html").unwrap(),
            PathBuf::from("/srv/docs/site/index.html")
        );
        assert_eq!(resolve(root, "notes").unwrap(), PathBuf::from("/srv/docs/notes"));
    }

    #[test]
    fn test_resolve_rejects_empty_and_bare_slash() {
        let root = Path::new("/srv");
        assert!(matches!(resolve(root, ""), Err(DocumentError::EmptyName)));
        assert!(matches!(resolve(root, "/"), Err(DocumentError::EmptyName)));
        assert!(matches!(resolve(root, "//"), Err(DocumentError::EmptyName)));
    }

    #[test]
    fn test_resolve_rejects_parent_components() {
        let root = Path::new("/srv");
        assert!(matches!(
            resolve(root, "/../etc/passwd"),
            Err(DocumentError::InvalidName(_))
        ));
        assert!(matches!(
            resolve(root, "/a/../../b"),
            Err(DocumentError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_read_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hi\nthere").unwrap();

        assert_eq!(
            read_document(dir.path(), "/hello.txt").await.unwrap(),
            "hi\nthere"
        );
        assert!(matches!(
            read_document(dir.path(), "/missing.txt").await,
            Err(DocumentError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_read_document_rejects_binary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00]).unwrap();

        assert!(matches!(
            read_document(dir.path(), "/blob.bin").await,
            Err(DocumentError::NotText(_))
        ));
    }

    #[tokio::test]
    async fn test_list_text_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("docs");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("b.txt"), "b").unwrap();
        std::fs::write(sub.join("a.txt"), "a").unwrap();
        std::fs::write(sub.join("image.png"), "png").unwrap();
        std::fs::create_dir(sub.join("nested.txt")).unwrap();

        let files = list_text_files(dir.path(), "docs").await.unwrap();
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name())
            .filter_map(|n| n.to_str())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_list_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_text_files(dir.path(), "nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Directory nope does not exist");
    }
}
