// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The system wide collection of sources files.

A [Catalog] loads every sources file in a directory and indexes their sources
by ident. Loading is resilient: a file that fails to load is recorded in
[Catalog::errors] and does not prevent other files from loading.
*/

use {
    crate::{
        error::{Result, SourcesError},
        fields::SourceFormat,
        privileged::PrivilegedWriter,
        source::Source,
        source_file::SourceFile,
    },
    log::{debug, warn},
    std::{
        collections::BTreeMap,
        path::{Path, PathBuf},
    },
};

/// Default directory holding sources files.
pub const DEFAULT_SOURCES_DIR: &str = "/etc/apt/sources.list.d";

/// Default directory holding signing keys.
pub const DEFAULT_KEYS_DIR: &str = "/etc/apt/keyrings";

/// Default name of the file holding the distribution's own sources.
pub const DEFAULT_SYSTEM_FILE_NAME: &str = "system";

/// Locations used by a [Catalog].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CatalogConfig {
    sources_dir: PathBuf,
    keys_dir: PathBuf,
    system_file_name: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            sources_dir: PathBuf::from(DEFAULT_SOURCES_DIR),
            keys_dir: PathBuf::from(DEFAULT_KEYS_DIR),
            system_file_name: DEFAULT_SYSTEM_FILE_NAME.to_string(),
        }
    }
}

impl CatalogConfig {
    #[must_use]
    pub fn with_sources_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.sources_dir = path.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub fn with_keys_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.keys_dir = path.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub fn with_system_file_name(mut self, name: impl ToString) -> Self {
        self.system_file_name = name.to_string();
        self
    }

    pub fn sources_dir(&self) -> &Path {
        &self.sources_dir
    }

    pub fn keys_dir(&self) -> &Path {
        &self.keys_dir
    }

    pub fn system_file_name(&self) -> &str {
        &self.system_file_name
    }
}

/// All sources files in a directory.
#[derive(Debug, Default)]
pub struct Catalog {
    config: CatalogConfig,
    files: BTreeMap<String, SourceFile>,
    /// Ident to the name of the file holding it.
    index: BTreeMap<String, String>,
    errors: BTreeMap<PathBuf, SourcesError>,
}

impl Catalog {
    /// Construct an empty instance. Nothing is loaded until [Self::load_all].
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Load every sources file, replacing anything previously loaded.
    ///
    /// `*.sources` files are loaded first. A `*.list` file whose name was already
    /// loaded from a `*.sources` file is skipped. Errors loading individual files
    /// are recorded in [Self::errors]; only a failure to read the directory
    /// itself is returned.
    pub fn load_all(&mut self) -> Result<()> {
        self.files.clear();
        self.index.clear();
        self.errors.clear();

        let dir = self.config.sources_dir.clone();
        debug!("loading sources from {}", dir.display());

        let mut paths = std::fs::read_dir(&dir)
            .map_err(|e| SourcesError::IoPath(format!("{}", dir.display()), e))?
            .map(|entry| {
                entry
                    .map(|e| e.path())
                    .map_err(|e| SourcesError::IoPath(format!("{}", dir.display()), e))
            })
            .collect::<Result<Vec<_>>>()?;
        paths.sort();

        for format in [SourceFormat::Structured, SourceFormat::Legacy] {
            for path in paths
                .iter()
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(format.extension()))
            {
                let name = match path.file_stem().and_then(|s| s.to_str()) {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => continue,
                };

                if self.files.contains_key(&name) {
                    debug!("{} already loaded; skipping {}", name, path.display());
                    continue;
                }

                match SourceFile::open(&name, &dir) {
                    Ok(file) => {
                        self.files.insert(name, file);
                    }
                    Err(e) => {
                        warn!("failed to load {}: {}", path.display(), e);
                        self.errors.insert(path.clone(), e);
                    }
                }
            }
        }

        self.reindex();

        Ok(())
    }

    /// Rebuild the ident index, renaming sources whose ident is already taken.
    ///
    /// A colliding ident is prefixed with its file name, then suffixed with a
    /// counter until unique.
    fn reindex(&mut self) {
        self.index.clear();

        for (file_name, file) in self.files.iter_mut() {
            for source in file.sources_mut() {
                if self.index.contains_key(source.ident()) {
                    let ident = unique_ident(&self.index, file_name, source.ident());
                    debug!(
                        "ident {} already used; renaming to {}",
                        source.ident(),
                        ident
                    );
                    source.set_ident(ident);
                }

                self.index
                    .insert(source.ident().to_string(), file_name.clone());
            }
        }
    }

    /// Errors encountered loading files, keyed by path.
    pub fn errors(&self) -> &BTreeMap<PathBuf, SourcesError> {
        &self.errors
    }

    /// Obtain a loaded file by name.
    pub fn file(&self, name: &str) -> Option<&SourceFile> {
        self.files.get(name)
    }

    pub fn file_mut(&mut self, name: &str) -> Option<&mut SourceFile> {
        self.files.get_mut(name)
    }

    /// The file holding the distribution's own sources, if loaded.
    pub fn system_file(&self) -> Option<&SourceFile> {
        self.files.get(&self.config.system_file_name)
    }

    /// Iterate over loaded files, ordered by name.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    /// Iterate over all sources in all files.
    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.files.values().flat_map(|f| f.sources())
    }

    /// Find a source by ident.
    pub fn source(&self, ident: &str) -> Option<&Source> {
        let file = self.index.get(ident)?;

        self.files.get(file)?.get_source_by_ident(ident).ok()
    }

    pub fn source_mut(&mut self, ident: &str) -> Option<&mut Source> {
        let file = self.index.get(ident)?;

        self.files
            .get_mut(file)?
            .get_source_by_ident_mut(ident)
            .ok()
    }

    /// Add a source to the file `file_name`, creating the file if needed.
    ///
    /// A source without an ident takes the file name. If the ident is already
    /// in use it is made unique. Returns the ident the source was stored under.
    /// Nothing is written to disk; see [Self::save_file].
    pub fn add_source(&mut self, file_name: &str, mut source: Source) -> Result<String> {
        if file_name.is_empty() {
            return Err(SourcesError::MissingFileName);
        }

        if source.ident().is_empty() {
            source.set_ident(file_name);
        }
        if self.index.contains_key(source.ident()) {
            let ident = unique_ident(&self.index, file_name, source.ident());
            source.set_ident(ident);
        }

        if !self.files.contains_key(file_name) {
            let file = SourceFile::open(file_name, &self.config.sources_dir)?;
            self.files.insert(file_name.to_string(), file);
        }

        let ident = source.ident().to_string();

        if let Some(file) = self.files.get_mut(file_name) {
            file.add_source(source);
        }
        self.index.insert(ident.clone(), file_name.to_string());

        Ok(ident)
    }

    /// Remove a source from its file, returning it.
    ///
    /// Nothing is written to disk; see [Self::save_file].
    pub fn remove_source(&mut self, ident: &str) -> Result<Source> {
        let file_name = self
            .index
            .get(ident)
            .cloned()
            .ok_or_else(|| SourcesError::UnknownSource(ident.to_string()))?;

        let file = self
            .files
            .get_mut(&file_name)
            .ok_or_else(|| SourcesError::UnknownFile(file_name.clone()))?;

        let source = file.remove_source(ident)?;
        self.index.remove(ident);

        Ok(source)
    }

    /// Write the named file to disk.
    pub fn save_file(&self, name: &str, privileged: &dyn PrivilegedWriter) -> Result<()> {
        self.files
            .get(name)
            .ok_or_else(|| SourcesError::UnknownFile(name.to_string()))?
            .save(privileged)
    }
}

fn unique_ident(index: &BTreeMap<String, String>, file_name: &str, ident: &str) -> String {
    let base = format!("{}-{}", file_name, ident);
    let mut candidate = base.clone();
    let mut counter = 1;

    while index.contains_key(&candidate) {
        candidate = format!("{}-{}", base, counter);
        counter += 1;
    }

    candidate
}
