// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Resolution of signing key references into keyring paths.

Sources only store the path of the keyring that signs them (`Signed-By`).
Users refer to keys in several ways, which a [KeyStore] turns into a path:

* A path to an existing keyring.
* ASCII armored key data.
* A URL the key can be downloaded from.
* A fingerprint to look up on a keyserver.

Network backed resolution requires the `http` feature.
*/

use {
    crate::error::{Result, SourcesError},
    log::{debug, warn},
    std::path::{Path, PathBuf},
};

/// Default keyserver for fingerprint lookups.
pub const DEFAULT_KEYSERVER: &str = "https://keyserver.ubuntu.com/";

/// Path on a keyserver to fetch a key by fingerprint. The fingerprint is appended.
pub const KEYSERVER_LOOKUP_PATH: &str = "pks/lookup?op=get&options=mr&exact=on&search=0x";

const ARMOR_HEADER: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";

/// A reference to a signing key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KeyReference {
    /// Path to a keyring file.
    Path(PathBuf),
    /// A key fingerprint, normalized to upper case hex without spaces or `0x`.
    Fingerprint(String),
    /// URL serving the key.
    Url(String),
    /// ASCII armored key data.
    Armored(String),
}

impl KeyReference {
    /// Classify a user supplied string.
    pub fn detect(value: &str) -> Self {
        let value = value.trim();

        if value.contains(ARMOR_HEADER) {
            return Self::Armored(value.to_string());
        }

        if value.starts_with("https://") || value.starts_with("http://") {
            return Self::Url(value.to_string());
        }

        if let Some(fingerprint) = normalize_fingerprint(value) {
            return Self::Fingerprint(fingerprint);
        }

        Self::Path(PathBuf::from(value))
    }
}

fn normalize_fingerprint(value: &str) -> Option<String> {
    let compact = value.split_whitespace().collect::<String>();
    let compact = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);

    if compact.len() >= 8 && compact.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(compact.to_ascii_uppercase())
    } else {
        None
    }
}

/// Turns key references into keyring paths suitable for `Signed-By`.
pub trait KeyStore {
    /// Resolve a key reference for the source named `name`.
    ///
    /// Keys that need to be stored are named after `name`.
    fn resolve(&self, name: &str, reference: &KeyReference) -> Result<PathBuf>;
}

/// A [KeyStore] storing keys as files in a directory.
#[derive(Clone, Debug)]
pub struct FilesystemKeyStore {
    keys_dir: PathBuf,
    keyserver: String,
    #[cfg(feature = "http")]
    client: reqwest::blocking::Client,
}

impl FilesystemKeyStore {
    /// Construct an instance storing keys in `keys_dir`.
    pub fn new(keys_dir: impl AsRef<Path>) -> Self {
        Self {
            keys_dir: keys_dir.as_ref().to_path_buf(),
            keyserver: DEFAULT_KEYSERVER.to_string(),
            #[cfg(feature = "http")]
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Use a different keyserver for fingerprint lookups.
    #[must_use]
    pub fn with_keyserver(mut self, keyserver: impl ToString) -> Self {
        self.keyserver = keyserver.to_string();
        self
    }

    pub fn keys_dir(&self) -> &Path {
        &self.keys_dir
    }

    /// The path a key for the source `name` is stored at.
    ///
    /// Armored keys use `.asc`, binary keyrings `.gpg`.
    pub fn key_path(&self, name: &str, armored: bool) -> PathBuf {
        self.keys_dir.join(format!(
            "{}-archive-keyring.{}",
            name,
            if armored { "asc" } else { "gpg" }
        ))
    }

    fn store(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let armored = data
            .windows(ARMOR_HEADER.len())
            .any(|w| w == ARMOR_HEADER.as_bytes());

        if !armored && data.first().map_or(true, |b| b & 0x80 == 0) {
            return Err(SourcesError::KeyUnresolvable(format!(
                "data for {} is not a PGP key",
                name
            )));
        }

        let path = self.key_path(name, armored);

        std::fs::create_dir_all(&self.keys_dir)
            .map_err(|e| SourcesError::IoPath(format!("{}", self.keys_dir.display()), e))?;
        std::fs::write(&path, data)
            .map_err(|e| SourcesError::IoPath(format!("{}", path.display()), e))?;

        debug!("stored signing key for {} at {}", name, path.display());

        Ok(path)
    }

    #[cfg(feature = "http")]
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let url = url::Url::parse(url)?;

        debug!("fetching signing key from {}", url);

        let response = self.client.get(url).send()?.error_for_status()?;

        Ok(response.bytes()?.to_vec())
    }

    #[cfg(feature = "http")]
    fn fingerprint_url(&self, fingerprint: &str) -> Result<String> {
        let base = url::Url::parse(&self.keyserver)?;

        Ok(base
            .join(&format!("{}{}", KEYSERVER_LOOKUP_PATH, fingerprint))?
            .to_string())
    }
}

impl KeyStore for FilesystemKeyStore {
    fn resolve(&self, name: &str, reference: &KeyReference) -> Result<PathBuf> {
        match reference {
            KeyReference::Path(path) => {
                if path.exists() {
                    Ok(path.clone())
                } else {
                    warn!("signing key {} does not exist", path.display());
                    Err(SourcesError::KeyUnresolvable(path.display().to_string()))
                }
            }
            KeyReference::Armored(data) => self.store(name, data.as_bytes()),
            #[cfg(feature = "http")]
            KeyReference::Url(url) => {
                let data = self.fetch(url)?;
                self.store(name, &data)
            }
            #[cfg(feature = "http")]
            KeyReference::Fingerprint(fingerprint) => {
                let data = self.fetch(&self.fingerprint_url(fingerprint)?)?;
                self.store(name, &data)
            }
            #[cfg(not(feature = "http"))]
            KeyReference::Url(value) | KeyReference::Fingerprint(value) => Err(
                SourcesError::KeyUnresolvable(format!("{} (network support is disabled)", value)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, indoc::indoc};

    const ARMORED: &str = indoc! {"
        -----BEGIN PGP PUBLIC KEY BLOCK-----

        mQINBFlL+3MBEADQJrd0nGv3v8ZzV5fWq3kq9b2x
        =abcd
        -----END PGP PUBLIC KEY BLOCK-----
    "};

    #[test]
    fn detect() {
        assert_eq!(
            KeyReference::detect("/usr/share/keyrings/x.gpg"),
            KeyReference::Path("/usr/share/keyrings/x.gpg".into())
        );
        assert_eq!(
            KeyReference::detect("https://example.com/key.asc"),
            KeyReference::Url("https://example.com/key.asc".into())
        );
        assert_eq!(
            KeyReference::detect("0x63c46df0140d738961429f4e204dd8aec33a7aff"),
            KeyReference::Fingerprint("63C46DF0140D738961429F4E204DD8AEC33A7AFF".into())
        );
        assert_eq!(
            KeyReference::detect("63C4 6DF0 140D 7389"),
            KeyReference::Fingerprint("63C46DF0140D7389".into())
        );
        assert!(matches!(
            KeyReference::detect(ARMORED),
            KeyReference::Armored(_)
        ));
    }

    #[test]
    fn existing_path() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        let key = td.path().join("existing.gpg");
        std::fs::write(&key, [0x99u8, 0x01])?;

        let store = FilesystemKeyStore::new(td.path().join("keys"));
        assert_eq!(store.resolve("x", &KeyReference::Path(key.clone()))?, key);

        assert!(matches!(
            store.resolve("x", &KeyReference::Path(td.path().join("missing.gpg"))),
            Err(SourcesError::KeyUnresolvable(_))
        ));

        Ok(())
    }

    #[test]
    fn armored_is_stored() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        let store = FilesystemKeyStore::new(td.path().join("keys"));

        let path = store.resolve("ppa-system76-pop", &KeyReference::detect(ARMORED))?;
        assert_eq!(
            path,
            td.path().join("keys").join("ppa-system76-pop-archive-keyring.asc")
        );
        assert_eq!(std::fs::read_to_string(&path)?, ARMORED.trim());

        Ok(())
    }

    #[test]
    fn garbage_is_rejected() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        let store = FilesystemKeyStore::new(td.path());

        assert!(matches!(
            store.resolve("x", &KeyReference::Armored("not a key".into())),
            Err(SourcesError::KeyUnresolvable(_))
        ));

        Ok(())
    }

    #[cfg(feature = "http")]
    #[test]
    fn fingerprint_lookup_url() -> Result<()> {
        let store = FilesystemKeyStore::new("/nonexistent");

        assert_eq!(
            store.fingerprint_url("63C46DF0140D7389")?,
            "https://keyserver.ubuntu.com/pks/lookup?op=get&options=mr&exact=on&search=0x63C46DF0140D7389"
        );

        Ok(())
    }
}
