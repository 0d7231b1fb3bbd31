// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Shortcut notations that expand into full sources.

Two notations are understood:

* `ppa:<owner>/<name>` for Launchpad personal package archives.
* A raw one-line format entry, e.g. `deb http://example.com/ubuntu jammy main`.
*/

use {
    crate::{
        error::{Result, SourcesError},
        fields::SourceType,
        key_store::{KeyReference, KeyStore},
        one_line::{is_one_line_entry, parse_line},
        source::Source,
    },
    log::{debug, warn},
};

/// Base URL of Launchpad PPA repositories.
pub const PPA_BASE_URL: &str = "https://ppa.launchpad.net";

const PPA_PREFIX: &str = "ppa:";

/// Metadata describing a hosted package archive.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ArchiveMetadata {
    pub display_name: String,
    pub description: String,
    pub signing_key_fingerprint: Option<String>,
}

/// Fetches metadata about hosted package archives.
pub trait MetadataProvider {
    fn fetch(&self, owner: &str, archive: &str) -> Result<ArchiveMetadata>;
}

/// A [MetadataProvider] backed by the Launchpad web service.
#[cfg(feature = "http")]
#[derive(Clone, Debug)]
pub struct LaunchpadMetadataProvider {
    client: reqwest::blocking::Client,
    api_root: url::Url,
}

#[cfg(feature = "http")]
#[derive(serde::Deserialize)]
struct LaunchpadArchive {
    #[serde(default)]
    displayname: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    signing_key_fingerprint: Option<String>,
}

#[cfg(feature = "http")]
impl LaunchpadMetadataProvider {
    /// The production Launchpad API root.
    pub const API_ROOT: &'static str = "https://api.launchpad.net/devel/";

    pub fn new() -> Result<Self> {
        Self::with_api_root(Self::API_ROOT)
    }

    /// Construct an instance talking to a different API root.
    pub fn with_api_root(api_root: &str) -> Result<Self> {
        Ok(Self {
            client: reqwest::blocking::Client::new(),
            api_root: url::Url::parse(api_root)?,
        })
    }

    /// The API URL describing an archive.
    pub fn archive_url(&self, owner: &str, archive: &str) -> Result<url::Url> {
        Ok(self
            .api_root
            .join(&format!("~{}/+archive/{}", owner, archive))?)
    }
}

#[cfg(feature = "http")]
impl MetadataProvider for LaunchpadMetadataProvider {
    fn fetch(&self, owner: &str, archive: &str) -> Result<ArchiveMetadata> {
        let url = self.archive_url(owner, archive)?;

        debug!("fetching archive metadata from {}", url);

        let archive: LaunchpadArchive = self
            .client
            .get(url)
            .send()?
            .error_for_status()?
            .json()?;

        Ok(ArchiveMetadata {
            display_name: archive.displayname,
            description: archive.description.unwrap_or_default(),
            signing_key_fingerprint: archive
                .signing_key_fingerprint
                .filter(|fp| !fp.is_empty()),
        })
    }
}

/// A `ppa:<owner>/<name>` shortcut.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PpaShortcut {
    owner: String,
    name: String,
}

impl PpaShortcut {
    /// Whether a string looks like a PPA shortcut.
    pub fn matches(value: &str) -> bool {
        value.trim().starts_with(PPA_PREFIX)
    }

    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || SourcesError::InvalidShortcut(value.to_string());

        let rest = value.trim().strip_prefix(PPA_PREFIX).ok_or_else(invalid)?;
        let (owner, name) = rest.split_once('/').ok_or_else(invalid)?;

        if owner.is_empty()
            || name.is_empty()
            || name.contains('/')
            || rest.contains(char::is_whitespace)
        {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ident, and file name, used for this PPA.
    pub fn ident(&self) -> String {
        format!("ppa-{}-{}", self.owner, self.name)
    }

    pub fn uri(&self) -> String {
        format!("{}/{}/{}/ubuntu", PPA_BASE_URL, self.owner, self.name)
    }

    /// Expand into a source for the distribution release `codename`.
    ///
    /// The result is a one-line style twin source with source code disabled.
    /// When a metadata provider is given, its display name becomes the source
    /// name and the archive signing key is resolved through `key_store`.
    pub fn into_source(
        &self,
        codename: &str,
        provider: Option<&dyn MetadataProvider>,
        key_store: Option<&dyn KeyStore>,
    ) -> Result<Source> {
        let ident = self.ident();
        debug!("expanding ppa:{}/{} for {}", self.owner, self.name, codename);

        let mut source = Source::new();
        source.set_ident(&ident);
        source.set_uris(vec![self.uri()])?;
        source.set_suites(vec![codename.to_string()]);
        source.set_components(vec!["main".to_string()]);
        source.set_types([SourceType::Binary]);
        source.set_twin_source(true);
        source.set_enabled(true);

        if let Some(provider) = provider {
            let metadata = provider.fetch(&self.owner, &self.name)?;

            if !metadata.display_name.is_empty() {
                source.set_name(&metadata.display_name);
            }

            match (metadata.signing_key_fingerprint, key_store) {
                (Some(fingerprint), Some(key_store)) => {
                    let reference = KeyReference::detect(&fingerprint);
                    source.set_signed_by(Some(key_store.resolve(&ident, &reference)?));
                }
                (Some(fingerprint), None) => {
                    warn!(
                        "no key store available; not installing signing key {} for {}",
                        fingerprint, ident
                    );
                }
                (None, _) => {
                    warn!("archive {} publishes no signing key", ident);
                }
            }
        }

        Ok(source)
    }
}

/// A raw one-line format entry used as a shortcut.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DebLineShortcut {
    line: String,
}

impl DebLineShortcut {
    pub fn matches(value: &str) -> bool {
        is_one_line_entry(value)
    }

    pub fn parse(value: &str) -> Result<Self> {
        if !Self::matches(value) {
            return Err(SourcesError::InvalidShortcut(value.to_string()));
        }

        // Validate eagerly so errors surface at parse time.
        parse_line(value)?;

        Ok(Self {
            line: value.trim().to_string(),
        })
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    /// Expand into a source.
    ///
    /// Lines without an `X-Repolib-ID` marker get an ident generated from their
    /// URI and type, prefixed with `deb-`.
    pub fn into_source(&self) -> Result<Source> {
        let mut source = Source::from_parsed_line(parse_line(&self.line)?);

        if source.ident().is_empty() {
            source.generate_default_ident("deb-");
        }

        Ok(source)
    }
}

/// Any recognized shortcut.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Shortcut {
    Ppa(PpaShortcut),
    DebLine(DebLineShortcut),
}

impl Shortcut {
    /// Parse a shortcut of any recognized notation.
    pub fn parse(value: &str) -> Result<Self> {
        if PpaShortcut::matches(value) {
            Ok(Self::Ppa(PpaShortcut::parse(value)?))
        } else if DebLineShortcut::matches(value) {
            Ok(Self::DebLine(DebLineShortcut::parse(value)?))
        } else {
            Err(SourcesError::InvalidShortcut(value.to_string()))
        }
    }

    /// Expand into a source.
    ///
    /// `codename` is only used by notations that do not name a suite.
    pub fn into_source(
        &self,
        codename: &str,
        provider: Option<&dyn MetadataProvider>,
        key_store: Option<&dyn KeyStore>,
    ) -> Result<Source> {
        match self {
            Self::Ppa(ppa) => ppa.into_source(codename, provider, key_store),
            Self::DebLine(line) => line.into_source(),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::error::ParseError,
        std::{cell::RefCell, path::PathBuf},
    };

    struct StaticProvider(ArchiveMetadata);

    impl MetadataProvider for StaticProvider {
        fn fetch(&self, _owner: &str, _archive: &str) -> Result<ArchiveMetadata> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingKeyStore {
        requests: RefCell<Vec<(String, KeyReference)>>,
    }

    impl KeyStore for RecordingKeyStore {
        fn resolve(&self, name: &str, reference: &KeyReference) -> Result<PathBuf> {
            self.requests
                .borrow_mut()
                .push((name.to_string(), reference.clone()));

            Ok(PathBuf::from(format!(
                "/etc/apt/keyrings/{}-archive-keyring.gpg",
                name
            )))
        }
    }

    #[test]
    fn parse_ppa() -> Result<()> {
        let ppa = PpaShortcut::parse("ppa:system76/pop")?;
        assert_eq!(ppa.owner(), "system76");
        assert_eq!(ppa.name(), "pop");
        assert_eq!(ppa.ident(), "ppa-system76-pop");
        assert_eq!(ppa.uri(), "https://ppa.launchpad.net/system76/pop/ubuntu");

        for bad in ["ppa:system76", "ppa:/pop", "ppa:system76/", "ppa:a/b/c", "system76/pop"] {
            assert!(matches!(
                PpaShortcut::parse(bad),
                Err(SourcesError::InvalidShortcut(_))
            ));
        }

        Ok(())
    }

    #[test]
    fn ppa_without_metadata() -> Result<()> {
        let source = PpaShortcut::parse("ppa:system76/pop")?.into_source("jammy", None, None)?;

        assert_eq!(source.ident(), "ppa-system76-pop");
        assert_eq!(source.name(), "ppa-system76-pop");
        assert_eq!(source.suites(), &["jammy"]);
        assert_eq!(source.components(), &["main"]);
        assert!(source.twin_source());
        assert!(!source.sourcecode_enabled());
        assert!(source.enabled());

        assert_eq!(
            source.to_legacy()?,
            "deb https://ppa.launchpad.net/system76/pop/ubuntu jammy main  \
             ## X-Repolib-Name: ppa-system76-pop # X-Repolib-ID: ppa-system76-pop\n\
             # deb-src https://ppa.launchpad.net/system76/pop/ubuntu jammy main  \
             ## X-Repolib-Name: ppa-system76-pop # X-Repolib-ID: ppa-system76-pop"
        );

        Ok(())
    }

    #[test]
    fn ppa_with_metadata() -> Result<()> {
        let provider = StaticProvider(ArchiveMetadata {
            display_name: "Pop!_OS PPA".into(),
            description: "Packages for Pop!_OS".into(),
            signing_key_fingerprint: Some("63C46DF0140D738961429F4E204DD8AEC33A7AFF".into()),
        });
        let key_store = RecordingKeyStore::default();

        let source = PpaShortcut::parse("ppa:system76/pop")?.into_source(
            "jammy",
            Some(&provider),
            Some(&key_store),
        )?;

        assert_eq!(source.name(), "Pop!_OS PPA");
        assert_eq!(
            source.signed_by(),
            Some(std::path::Path::new(
                "/etc/apt/keyrings/ppa-system76-pop-archive-keyring.gpg"
            ))
        );
        assert_eq!(
            key_store.requests.borrow().as_slice(),
            &[(
                "ppa-system76-pop".to_string(),
                KeyReference::Fingerprint("63C46DF0140D738961429F4E204DD8AEC33A7AFF".into())
            )]
        );

        Ok(())
    }

    #[test]
    fn deb_line() -> Result<()> {
        let shortcut = Shortcut::parse("deb http://example.com/ubuntu jammy main")?;
        let source = shortcut.into_source("ignored", None, None)?;

        assert_eq!(source.ident(), "deb-example-com-ubuntu-binary");
        assert_eq!(source.suites(), &["jammy"]);

        let source = Shortcut::parse("deb http://example.com/ubuntu jammy main # X-Repolib-ID: mine")?
            .into_source("ignored", None, None)?;
        assert_eq!(source.ident(), "mine");

        assert!(matches!(
            DebLineShortcut::parse("deb not-a-uri jammy main"),
            Err(SourcesError::Parse(ParseError::BadUri { .. }))
        ));
        assert!(matches!(
            Shortcut::parse("flatpak:something"),
            Err(SourcesError::InvalidShortcut(_))
        ));

        Ok(())
    }

    #[cfg(feature = "http")]
    #[test]
    fn launchpad_archive_url() -> Result<()> {
        let provider = LaunchpadMetadataProvider::new()?;

        assert_eq!(
            provider.archive_url("system76", "pop")?.as_str(),
            "https://api.launchpad.net/devel/~system76/+archive/pop"
        );

        Ok(())
    }
}
