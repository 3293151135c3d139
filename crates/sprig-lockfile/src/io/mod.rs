//! Reading and writing sprig.lock on disk
//!
//! Writes go to a temporary sibling file that is synced and then renamed
//! over the lock file, so readers never observe a half-written lock.

use std::fs;
use std::io::{ErrorKind, Write};

use camino::Utf8Path;
use sprig_core::error::SprigError;
use tracing::{debug, info};

use crate::model::Lockfile;
use crate::{LockfileResult, CURRENT_VERSION};

const HEADER: &str = "# This file is generated by sprig. Do not edit it by hand.\n\n";

impl Lockfile {
    /// Serialized form, identical for identical lock contents
    pub fn to_toml_string(&self) -> LockfileResult<String> {
        let body = toml::to_string(self).map_err(|e| SprigError::LockfileParse {
            message: format!("cannot serialize lock file: {}", e),
        })?;
        Ok(format!("{}{}", HEADER, body))
    }

    /// Parse lock file contents
    pub fn parse(content: &str) -> LockfileResult<Self> {
        let lockfile: Lockfile = toml::from_str(content).map_err(|e| SprigError::LockfileParse {
            message: e.to_string(),
        })?;
        if lockfile.version > CURRENT_VERSION {
            return Err(SprigError::LockfileParse {
                message: format!(
                    "lock format version {} is newer than the supported version {}; upgrade sprig",
                    lockfile.version, CURRENT_VERSION
                ),
            });
        }
        Ok(lockfile)
    }

    /// Read the lock file at `path`, or `None` if there is none
    pub fn read(path: &Utf8Path) -> LockfileResult<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no lock file at {}", path);
                return Ok(None);
            },
            Err(e) => return Err(SprigError::io(format!("cannot read {}", path), e)),
        };
        Self::parse(&content).map(Some)
    }

    /// Write the lock file to `path`. Returns `false` when the file already
    /// held exactly this content and was left untouched.
    pub fn write(&self, path: &Utf8Path) -> LockfileResult<bool> {
        let content = self.to_toml_string()?;
        if let Ok(existing) = fs::read_to_string(path) {
            if existing == content {
                debug!("{} is up to date", path);
                return Ok(false);
            }
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| SprigError::io(format!("cannot create {}", parent), e))?;
        }

        let temp_path = path.with_extension("lock.tmp");
        {
            let mut file = fs::File::create(&temp_path)
                .map_err(|e| SprigError::io(format!("cannot create {}", temp_path), e))?;
            file.write_all(content.as_bytes())
                .map_err(|e| SprigError::io(format!("cannot write {}", temp_path), e))?;
            file.sync_all()
                .map_err(|e| SprigError::io(format!("cannot sync {}", temp_path), e))?;
        }
        fs::rename(&temp_path, path)
            .map_err(|e| SprigError::io(format!("cannot replace {}", path), e))?;

        info!("wrote {} ({} packages)", path, self.packages.len());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{provider, resolution};
    use crate::LOCKFILE_NAME;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn locked() -> Lockfile {
        let provider = provider();
        Lockfile::from_resolution(&resolution(&provider), &provider, "blake3:feed").unwrap()
    }

    #[test]
    fn test_serialized_layout() {
        let text = locked().to_toml_string().unwrap();
        assert!(text.starts_with(HEADER));
        assert!(text.contains("version = 1"));
        assert!(text.contains("[metadata]\ncontent-hash = \"blake3:feed\""));
        assert_eq!(text.matches("[[package]]").count(), 3);

        let app = text.find("name = \"app\"").unwrap();
        let http = text.find("name = \"http\"").unwrap();
        let log = text.find("name = \"log\"").unwrap();
        assert!(app < http && http < log);
    }

    #[test]
    fn test_reserialization_is_byte_identical() {
        let text = locked().to_toml_string().unwrap();
        let parsed = Lockfile::parse(&text).unwrap();
        assert_eq!(parsed, locked());
        assert_eq!(parsed.to_toml_string().unwrap(), text);
    }

    #[test]
    fn test_resolving_twice_gives_the_same_file() {
        let first = locked().to_toml_string().unwrap();
        let second = locked().to_toml_string().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_newer_format() {
        let text = "version = 2\n\n[metadata]\ncontent-hash = \"x\"\n";
        assert!(matches!(
            Lockfile::parse(text),
            Err(SprigError::LockfileParse { message }) if message.contains("newer")
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            Lockfile::parse("[[package]\nname ="),
            Err(SprigError::LockfileParse { .. })
        ));
        let bad_fingerprint = "version = 1\n\n[metadata]\ncontent-hash = \"x\"\n\n\
            [[package]]\nname = \"a\"\nversion = \"1.0.0\"\nfingerprint = \"nohash\"\n";
        assert!(Lockfile::parse(bad_fingerprint).is_err());
    }

    #[test]
    fn test_read_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp.path().join(LOCKFILE_NAME)).unwrap();
        assert!(Lockfile::read(&path).unwrap().is_none());
    }

    #[test]
    fn test_write_and_read() {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp.path().join(LOCKFILE_NAME)).unwrap();
        let lock = locked();

        assert!(lock.write(&path).unwrap());
        assert!(!path.with_extension("lock.tmp").exists());
        assert_eq!(Lockfile::read(&path).unwrap(), Some(lock.clone()));

        // Unchanged content is not rewritten
        assert!(!lock.write(&path).unwrap());

        let mut changed = lock;
        changed.metadata.content_hash = "blake3:beef".to_string();
        assert!(changed.write(&path).unwrap());
        assert_eq!(
            Lockfile::read(&path).unwrap().unwrap().metadata.content_hash,
            "blake3:beef"
        );
    }
}
