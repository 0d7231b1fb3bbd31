// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Sources files on disk.

A [SourceFile] models one file in the sources directory as an ordered list of
literal text fragments and [Source] records. Literal fragments (comments and
blank lines) are preserved when the file is written back.

A file is either in the structured format (`<name>.sources`) or the one-line
format (`<name>.list`). Mixing the two within one file is an error.
*/

use {
    crate::{
        control::{ControlParagraph, ControlParagraphParser},
        dedup::{find_unique_ident, Resolution},
        error::{RenderError, Result, SourcesError},
        fields::{is_structured_field_line, SourceFormat, FIELD_NAME},
        one_line::{is_one_line_entry, OneLineParser},
        privileged::PrivilegedWriter,
        source::Source,
    },
    log::{debug, warn},
    std::{
        collections::HashMap,
        io::ErrorKind,
        path::{Path, PathBuf},
    },
};

/// Comment placed at the top of newly created files.
pub const FILE_COMMENT: &str = "## Added/managed by repolib ##";

/// An item in a sources file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SourceFileEntry {
    /// A literal line of text, without its newline.
    Text(String),
    Source(Source),
}

impl SourceFileEntry {
    pub fn as_source(&self) -> Option<&Source> {
        match self {
            Self::Source(source) => Some(source),
            Self::Text(_) => None,
        }
    }

    pub fn as_source_mut(&mut self) -> Option<&mut Source> {
        match self {
            Self::Source(source) => Some(source),
            Self::Text(_) => None,
        }
    }
}

/// A sources file.
#[derive(Clone, Debug)]
pub struct SourceFile {
    name: String,
    dir: PathBuf,
    path: PathBuf,
    alt_path: PathBuf,
    format: SourceFormat,
    contents: Vec<SourceFileEntry>,
}

impl SourceFile {
    /// Construct an instance for the file `name` in `dir`.
    ///
    /// `name` is the file name without its extension. The structured format is
    /// preferred: if `<name>.sources` exists it is used, else `<name>.list` if it
    /// exists, else a new structured file is assumed. Nothing is read from disk;
    /// see [Self::open].
    pub fn new(name: impl ToString, dir: impl AsRef<Path>) -> Result<Self> {
        let name = name.to_string();
        if name.is_empty() {
            return Err(SourcesError::MissingFileName);
        }

        let dir = dir.as_ref().to_path_buf();

        let format = if dir
            .join(format!("{}.{}", name, SourceFormat::Structured.extension()))
            .exists()
        {
            SourceFormat::Structured
        } else if dir
            .join(format!("{}.{}", name, SourceFormat::Legacy.extension()))
            .exists()
        {
            SourceFormat::Legacy
        } else {
            SourceFormat::Structured
        };

        let mut file = Self {
            name,
            dir,
            path: PathBuf::new(),
            alt_path: PathBuf::new(),
            format,
            contents: vec![
                SourceFileEntry::Text(FILE_COMMENT.to_string()),
                SourceFileEntry::Text("#".to_string()),
            ],
        };
        file.set_format(format);

        Ok(file)
    }

    /// Construct an instance and load it from disk if the file exists.
    pub fn open(name: impl ToString, dir: impl AsRef<Path>) -> Result<Self> {
        let mut file = Self::new(name, dir)?;

        if file.path.exists() {
            file.load()?;
        }

        Ok(file)
    }

    /// The file name without extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The path this file is read from and written to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path the file would have in the other format.
    pub fn alt_path(&self) -> &Path {
        &self.alt_path
    }

    /// The path a superseded file in the other format is moved to on save.
    pub fn save_path(&self) -> PathBuf {
        self.dir.join(format!("{}.save", self.name))
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Change the format of this file.
    ///
    /// [Self::path] and [Self::alt_path] follow the format.
    pub fn set_format(&mut self, format: SourceFormat) {
        self.format = format;
        self.path = self
            .dir
            .join(format!("{}.{}", self.name, format.extension()));
        self.alt_path = self
            .dir
            .join(format!("{}.{}", self.name, format.alternate().extension()));
    }

    pub fn contents(&self) -> &[SourceFileEntry] {
        &self.contents
    }

    /// Iterate over sources in this file.
    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.contents.iter().filter_map(|e| e.as_source())
    }

    /// Iterate over mutable sources in this file.
    pub fn sources_mut(&mut self) -> impl Iterator<Item = &mut Source> {
        self.contents.iter_mut().filter_map(|e| e.as_source_mut())
    }

    /// Whether this file contains any sources.
    pub fn has_sources(&self) -> bool {
        self.sources().next().is_some()
    }

    /// Find a source by its ident.
    pub fn get_source_by_ident(&self, ident: &str) -> Result<&Source> {
        debug!("looking up ident {} in {}", ident, self.name);

        self.sources()
            .find(|s| s.ident() == ident)
            .ok_or_else(|| self.not_found(ident))
    }

    /// Find a mutable source by its ident.
    pub fn get_source_by_ident_mut(&mut self, ident: &str) -> Result<&mut Source> {
        let err = self.not_found(ident);

        self.sources_mut()
            .find(|s| s.ident() == ident)
            .ok_or(err)
    }

    fn not_found(&self, ident: &str) -> SourcesError {
        SourcesError::SourceNotFound {
            path: self.path.display().to_string(),
            ident: ident.to_string(),
        }
    }

    /// Add a source to the end of this file.
    ///
    /// Adding a source equal to one already present does nothing.
    pub fn add_source(&mut self, mut source: Source) {
        source.set_file(Some(self.name.clone()));

        if !self.sources().any(|s| s == &source) {
            self.contents.push(SourceFileEntry::Source(source));
        }
    }

    /// Remove the source with the given ident, returning it.
    pub fn remove_source(&mut self, ident: &str) -> Result<Source> {
        let position = self
            .contents
            .iter()
            .position(|e| matches!(e, SourceFileEntry::Source(s) if s.ident() == ident))
            .ok_or_else(|| self.not_found(ident))?;

        match self.contents.remove(position) {
            SourceFileEntry::Source(mut source) => {
                source.set_file(None);
                Ok(source)
            }
            SourceFileEntry::Text(_) => Err(self.not_found(ident)),
        }
    }

    /// Load this file from [Self::path], replacing the current contents.
    pub fn load(&mut self) -> Result<()> {
        debug!("loading source file {}", self.path.display());

        let data = std::fs::read_to_string(&self.path)
            .map_err(|e| SourcesError::IoPath(format!("{}", self.path.display()), e))?;

        self.load_str(&data)?;

        debug!("file {} loaded", self.path.display());

        Ok(())
    }

    /// Load this file from a string, replacing the current contents.
    ///
    /// The string is interpreted according to [Self::format].
    pub fn load_str(&mut self, data: &str) -> Result<()> {
        let mut state = LoadState {
            contents: vec![],
            idents: HashMap::new(),
            pending_name: None,
        };
        let mut paragraphs = ControlParagraphParser::default();
        let mut lines = OneLineParser::default();

        for line in data.lines() {
            if paragraphs.in_paragraph() {
                if let Some(paragraph) = paragraphs.write_line(line)? {
                    self.push_paragraph(&mut state, &paragraph)?;
                }
                continue;
            }

            let trimmed = line.trim();

            if trimmed.is_empty() {
                state.contents.push(SourceFileEntry::Text(String::new()));
            } else if is_one_line_entry(trimmed) {
                self.require_format(SourceFormat::Legacy)?;

                match lines.parse_line(trimmed) {
                    Ok(parsed) => self.push_source(&mut state, Source::from_parsed_line(parsed)),
                    Err(e) => {
                        warn!(
                            "{}: keeping unparsable line as a comment: {} (after: {})",
                            self.path.display(),
                            e,
                            lines.previous_line().unwrap_or("<start of file>")
                        );
                        state.contents.push(SourceFileEntry::Text(trimmed.to_string()));
                    }
                }
            } else if trimmed.starts_with('#') {
                if trimmed.contains(FIELD_NAME) {
                    state.pending_name = trimmed
                        .split_once(':')
                        .map(|(_, name)| name.trim().to_string())
                        .filter(|name| !name.is_empty());
                } else {
                    state.contents.push(SourceFileEntry::Text(trimmed.to_string()));
                }
            } else if is_structured_field_line(line) {
                self.require_format(SourceFormat::Structured)?;
                paragraphs.write_line(line)?;
            } else {
                state.contents.push(SourceFileEntry::Text(trimmed.to_string()));
            }
        }

        if let Some(paragraph) = paragraphs.finish()? {
            self.push_paragraph(&mut state, &paragraph)?;
        }

        if state
            .contents
            .iter()
            .filter_map(|e| e.as_source())
            .any(|s| !s.has_required_parts())
        {
            return Err(SourcesError::FileCorrupt(self.path.display().to_string()));
        }

        self.contents = state.contents;

        Ok(())
    }

    fn require_format(&self, found: SourceFormat) -> Result<()> {
        if self.format == found {
            Ok(())
        } else {
            Err(SourcesError::FormatConsistency {
                path: self.path.display().to_string(),
                declared: self.format.description(),
                found: found.description(),
            })
        }
    }

    fn push_paragraph(&self, state: &mut LoadState, paragraph: &ControlParagraph) -> Result<()> {
        self.push_source(state, Source::from_paragraph(paragraph)?);
        state.contents.push(SourceFileEntry::Text(String::new()));

        Ok(())
    }

    /// Append a newly parsed source, resolving ident collisions.
    fn push_source(&self, state: &mut LoadState, mut source: Source) {
        if source.explicit_name().is_none() {
            if let Some(name) = &state.pending_name {
                source.set_name(name);
            }
        }
        if source.ident().is_empty() {
            source.set_ident(&self.name);
        }
        source.set_file(Some(self.name.clone()));

        let incoming_index = state.contents.iter().filter(|e| e.as_source().is_some()).count();

        if let Some(position) = state.idents.remove(source.ident()) {
            let existing_index = state.contents[..position]
                .iter()
                .filter(|e| e.as_source().is_some())
                .count();

            if let Some(existing) = state.contents[position].as_source_mut() {
                let resolution = find_unique_ident(
                    self.format,
                    existing,
                    existing_index,
                    &mut source,
                    incoming_index,
                );

                // A rename can land on the ident of a third source.
                let ident = unused_ident(&state.idents, existing.ident());
                existing.set_ident(&ident);
                state.idents.insert(ident, position);

                if resolution == Resolution::Discard {
                    return;
                }
            }
        }

        let ident = unused_ident(&state.idents, source.ident());
        source.set_ident(&ident);

        state.idents.insert(ident, state.contents.len());
        state.contents.push(SourceFileEntry::Source(source));
    }

    /// Render the file in its own format.
    pub fn output(&self) -> std::result::Result<String, RenderError> {
        match self.format {
            SourceFormat::Structured => Ok(self.render_structured()),
            SourceFormat::Legacy => self.render_legacy(),
        }
    }

    /// Render the file in the structured format.
    pub fn render_structured(&self) -> String {
        let mut output = String::new();
        let mut previous_was_source = false;

        for entry in &self.contents {
            match entry {
                SourceFileEntry::Source(source) => {
                    // Adjacent paragraphs need a separating blank line.
                    if previous_was_source {
                        output.push('\n');
                    }
                    output.push_str(&source.to_structured());
                }
                SourceFileEntry::Text(text) => {
                    output.push_str(text);
                    output.push('\n');
                }
            }

            previous_was_source = entry.as_source().is_some();
        }

        output
    }

    /// Render the file in the one-line format.
    pub fn render_legacy(&self) -> std::result::Result<String, RenderError> {
        let mut output = String::new();

        for entry in &self.contents {
            match entry {
                SourceFileEntry::Source(source) => output.push_str(&source.to_legacy()?),
                SourceFileEntry::Text(text) => output.push_str(text),
            }
            output.push('\n');
        }

        Ok(output)
    }

    /// Render a human readable summary of the sources in this file.
    pub fn render_ui(&self) -> String {
        self.sources()
            .map(|s| s.to_ui())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Write this file to disk.
    ///
    /// If a file in the other format exists, it is moved to [Self::save_path].
    /// A file without sources is removed from disk in both formats. Operations
    /// failing for lack of permission are retried through `privileged`.
    ///
    /// The file is rendered before anything is written, so a render error leaves
    /// the disk untouched.
    pub fn save(&self, privileged: &dyn PrivilegedWriter) -> Result<()> {
        debug!("saving source file to {}", self.path.display());

        let save_path = self.save_path();

        if !self.has_sources() {
            for path in [&self.path, &self.alt_path, &save_path] {
                match std::fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                        privileged.delete(path)?;
                    }
                    Err(e) => {
                        return Err(SourcesError::IoPath(format!("{}", path.display()), e));
                    }
                }
            }

            debug!("file {} removed", self.path.display());
            return Ok(());
        }

        let output = self.output()?;

        if !self.dir.exists() {
            if let Err(e) = std::fs::create_dir_all(&self.dir) {
                warn!(
                    "sources directory {} cannot be created: {}",
                    self.dir.display(),
                    e
                );
            }
        }

        match std::fs::write(&self.path, &output) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                privileged.write(&self.path, &output)?;
            }
            Err(e) => {
                return Err(SourcesError::IoPath(format!("{}", self.path.display()), e));
            }
        }

        if self.alt_path.exists() {
            self.retire_alt_path(&save_path, privileged)?;
        }

        debug!("file {} saved", self.path.display());

        Ok(())
    }

    /// Move the file in the other format out of apt's way, to `save_path`.
    fn retire_alt_path(&self, save_path: &Path, privileged: &dyn PrivilegedWriter) -> Result<()> {
        let alt_error =
            |e: std::io::Error| SourcesError::IoPath(format!("{}", self.alt_path.display()), e);

        match std::fs::rename(&self.alt_path, save_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                let previous = std::fs::read_to_string(&self.alt_path).map_err(alt_error)?;
                privileged.write(save_path, &previous)?;
                privileged.delete(&self.alt_path)
            }
            Err(e) => Err(alt_error(e)),
        }
    }
}

/// `ident`, or `ident-<n>` for the first `n` not already taken.
fn unused_ident(idents: &HashMap<String, usize>, ident: &str) -> String {
    let mut candidate = ident.to_string();
    let mut counter = 1;

    while idents.contains_key(&candidate) {
        candidate = format!("{}-{}", ident, counter);
        counter += 1;
    }

    candidate
}

struct LoadState {
    contents: Vec<SourceFileEntry>,
    /// Ident to index in `contents`.
    idents: HashMap<String, usize>,
    /// Name from a stand-alone `X-Repolib-Name:` comment line.
    pending_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{fields::SourceType, privileged::DenyPrivilegedWriter},
        indoc::indoc,
        std::cell::RefCell,
    };

    const PPA_LIST: &str = include_str!("testdata/ppa-system76-pop.list");
    const POP_SOURCES: &str = include_str!("testdata/pop-os.sources");
    const SYSTEM_LIST: &str = include_str!("testdata/system.list");

    fn parse(name: &str, format: SourceFormat, data: &str) -> Result<SourceFile> {
        let mut file = SourceFile::new(name, "/nonexistent")?;
        file.set_format(format);
        file.load_str(data)?;

        Ok(file)
    }

    #[test]
    fn new_file_header() -> Result<()> {
        let file = SourceFile::new("example", "/nonexistent")?;

        assert_eq!(file.format(), SourceFormat::Structured);
        assert_eq!(file.path(), Path::new("/nonexistent/example.sources"));
        assert_eq!(file.alt_path(), Path::new("/nonexistent/example.list"));
        assert_eq!(file.render_structured(), "## Added/managed by repolib ##\n#\n");
        assert!(!file.has_sources());

        assert!(matches!(
            SourceFile::new("", "/nonexistent"),
            Err(SourcesError::MissingFileName)
        ));

        Ok(())
    }

    #[test]
    fn legacy_twin_with_pending_name() -> Result<()> {
        let file = parse("ppa-system76-pop", SourceFormat::Legacy, PPA_LIST)?;

        let sources = file.sources().collect::<Vec<_>>();
        assert_eq!(sources.len(), 1);

        let source = sources[0];
        assert_eq!(source.ident(), "ppa-system76-pop");
        assert_eq!(source.name(), "Pop!_OS PPA");
        assert_eq!(source.file(), Some("ppa-system76-pop"));
        assert!(source.twin_source());
        assert!(source.enabled());
        assert!(!source.sourcecode_enabled());

        assert_eq!(
            file.output()?,
            indoc! {"
                ## Added/managed by repolib ##
                #
                deb http://ppa.launchpad.net/system76/pop/ubuntu jammy main  ## X-Repolib-Name: Pop!_OS PPA # X-Repolib-ID: ppa-system76-pop
                # deb-src http://ppa.launchpad.net/system76/pop/ubuntu jammy main  ## X-Repolib-Name: Pop!_OS PPA # X-Repolib-ID: ppa-system76-pop
            "}
        );

        Ok(())
    }

    #[test]
    fn inline_name_beats_pending_name() -> Result<()> {
        let file = parse(
            "names",
            SourceFormat::Legacy,
            indoc! {"
                ## X-Repolib-Name: Pending
                deb http://a.example/ focal main ## X-Repolib-Name: Inline # X-Repolib-ID: a
                deb http://b.example/ focal main # X-Repolib-ID: b
                deb http://c.example/ focal main
            "},
        )?;

        let names = file.sources().map(|s| s.name()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Inline", "b", "Pending"]);

        Ok(())
    }

    #[test]
    fn legacy_rename_avoids_taken_idents() -> Result<()> {
        let file = parse(
            "renames",
            SourceFormat::Legacy,
            indoc! {"
                deb http://a.example/ focal main # X-Repolib-ID: x-focal
                deb http://b.example/ focal main # X-Repolib-ID: x
                deb http://b.example/ focal-updates main # X-Repolib-ID: x
            "},
        )?;

        let idents = file.sources().map(|s| s.ident()).collect::<Vec<_>>();
        assert_eq!(idents, vec!["x-focal", "x-focal-1", "x-focal-updates"]);

        let reloaded = parse("renames", SourceFormat::Legacy, &file.output()?)?;
        assert_eq!(
            reloaded.sources().map(|s| s.ident()).collect::<Vec<_>>(),
            idents
        );

        Ok(())
    }

    #[test]
    fn structured_round_trip() -> Result<()> {
        let file = parse("pop-os", SourceFormat::Structured, POP_SOURCES)?;

        let sources = file.sources().collect::<Vec<_>>();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].ident(), "pop-os-apps");
        assert_eq!(
            sources[0].signed_by(),
            Some(Path::new("/usr/share/keyrings/pop-keyring-2017-archive.gpg"))
        );
        assert!(!sources[1].enabled());
        assert_eq!(sources[1].types().len(), 2);

        assert_eq!(file.output()?, POP_SOURCES);

        Ok(())
    }

    #[test]
    fn structured_as_legacy() -> Result<()> {
        let file = parse("pop-os", SourceFormat::Structured, POP_SOURCES)?;

        assert_eq!(
            file.render_legacy()?,
            indoc! {"
                ## Added/managed by repolib ##
                #
                deb [signed-by=/usr/share/keyrings/pop-keyring-2017-archive.gpg] http://apt.pop-os.org/proprietary jammy main  ## X-Repolib-Name: Pop!_OS Apps # X-Repolib-ID: pop-os-apps

                # deb http://apt.pop-os.org/release jammy main  ## X-Repolib-Name: Pop!_OS Release Sources # X-Repolib-ID: pop-os-release
                deb-src http://apt.pop-os.org/release jammy main  ## X-Repolib-Name: Pop!_OS Release Sources # X-Repolib-ID: pop-os-release

            "}
        );

        Ok(())
    }

    #[test]
    fn structured_merges_duplicate_idents() -> Result<()> {
        let file = parse(
            "dupes",
            SourceFormat::Structured,
            indoc! {"
                X-Repolib-ID: dupe
                URIs: http://a.example/
                Suites: focal
                Components: main

                X-Repolib-ID: dupe
                URIs: http://b.example/
                Suites: focal
                Components: main universe
            "},
        )?;

        let sources = file.sources().collect::<Vec<_>>();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].uris(), &["http://a.example/", "http://b.example/"]);
        assert_eq!(sources[0].components(), &["main", "universe"]);

        Ok(())
    }

    #[test]
    fn structured_paragraph_comments() -> Result<()> {
        let file = parse(
            "commented",
            SourceFormat::Structured,
            indoc! {"
                # A file comment

                X-Repolib-ID: commented
                # inside the paragraph
                URIs: http://a.example/
                Suites: focal
                Components: main
            "},
        )?;

        let source = file.get_source_by_ident("commented")?;
        assert_eq!(source.comments(), &["inside the paragraph"]);
        assert_eq!(
            file.contents()[0],
            SourceFileEntry::Text("# A file comment".into())
        );

        Ok(())
    }

    #[test]
    fn system_list() -> Result<()> {
        let file = parse("system", SourceFormat::Legacy, SYSTEM_LIST)?;

        let idents = file.sources().map(|s| s.ident()).collect::<Vec<_>>();
        assert_eq!(
            idents,
            vec![
                "system-jammy",
                "system-jammy-updates",
                "system-http__us-archive-ubuntu-com_ubuntu_",
                "system-http__security-ubuntu-com_ubuntu",
            ]
        );

        let first = file.get_source_by_ident("system-jammy")?;
        assert!(first.twin_source());
        assert!(!first.sourcecode_enabled());

        let disabled = file.get_source_by_ident("system-http__us-archive-ubuntu-com_ubuntu_")?;
        assert_eq!(disabled.types().iter().next(), Some(&SourceType::SourceCode));
        assert!(!disabled.enabled());

        // The cdrom line cannot be parsed and is preserved as text.
        assert!(file.contents().iter().any(|e| matches!(
            e,
            SourceFileEntry::Text(t) if t.starts_with("deb cdrom:")
        )));

        Ok(())
    }

    #[test]
    fn format_consistency() {
        assert!(matches!(
            parse(
                "mixed",
                SourceFormat::Structured,
                "deb http://a.example/ focal main\n"
            ),
            Err(SourcesError::FormatConsistency {
                declared: "DEB822",
                found: "one-line",
                ..
            })
        ));

        assert!(matches!(
            parse("mixed", SourceFormat::Legacy, POP_SOURCES),
            Err(SourcesError::FormatConsistency {
                declared: "one-line",
                found: "DEB822",
                ..
            })
        ));
    }

    #[test]
    fn file_corrupt() {
        assert!(matches!(
            parse(
                "corrupt",
                SourceFormat::Structured,
                indoc! {"
                    X-Repolib-ID: corrupt
                    URIs: http://a.example/
                    Components: main
                "}
            ),
            Err(SourcesError::FileCorrupt(_))
        ));
    }

    #[test]
    fn add_and_remove() -> Result<()> {
        let mut file = SourceFile::new("example", "/nonexistent")?;

        let mut source = Source::new();
        source.set_ident("example");
        source.set_uris(vec!["http://example.com/ubuntu".into()])?;
        source.set_suites(vec!["jammy".into()]);
        source.set_components(vec!["main".into()]);

        file.add_source(source.clone());
        file.add_source(source);
        assert_eq!(file.sources().count(), 1);
        assert_eq!(file.get_source_by_ident("example")?.file(), Some("example"));

        file.get_source_by_ident_mut("example")?.set_enabled(false);
        assert!(!file.get_source_by_ident("example")?.enabled());

        let removed = file.remove_source("example")?;
        assert_eq!(removed.ident(), "example");
        assert_eq!(removed.file(), None);
        assert!(matches!(
            file.remove_source("example"),
            Err(SourcesError::SourceNotFound { .. })
        ));

        Ok(())
    }

    #[test]
    fn path_resolution() -> Result<()> {
        let td = tempfile::TempDir::new()?;

        std::fs::write(td.path().join("legacy.list"), PPA_LIST)?;
        std::fs::write(td.path().join("both.list"), PPA_LIST)?;
        std::fs::write(td.path().join("both.sources"), POP_SOURCES)?;

        let legacy = SourceFile::new("legacy", td.path())?;
        assert_eq!(legacy.format(), SourceFormat::Legacy);
        assert_eq!(legacy.path(), td.path().join("legacy.list"));
        assert_eq!(legacy.alt_path(), td.path().join("legacy.sources"));

        let both = SourceFile::open("both", td.path())?;
        assert_eq!(both.format(), SourceFormat::Structured);
        assert_eq!(both.sources().count(), 2);

        let fresh = SourceFile::new("fresh", td.path())?;
        assert_eq!(fresh.format(), SourceFormat::Structured);

        Ok(())
    }

    #[test]
    fn save_converts_and_deletes() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        std::fs::write(td.path().join("ppa-system76-pop.list"), PPA_LIST)?;

        let mut file = SourceFile::open("ppa-system76-pop", td.path())?;
        assert_eq!(file.format(), SourceFormat::Legacy);

        file.set_format(SourceFormat::Structured);
        file.save(&DenyPrivilegedWriter)?;

        let structured = td.path().join("ppa-system76-pop.sources");
        assert!(structured.exists());
        assert!(!td.path().join("ppa-system76-pop.list").exists());
        assert!(td.path().join("ppa-system76-pop.save").exists());

        let reloaded = SourceFile::open("ppa-system76-pop", td.path())?;
        assert_eq!(reloaded.format(), SourceFormat::Structured);
        let source = reloaded.get_source_by_ident("ppa-system76-pop")?;
        assert_eq!(source.name(), "Pop!_OS PPA");
        assert_eq!(source.types().len(), 1);

        file.remove_source("ppa-system76-pop")?;
        file.save(&DenyPrivilegedWriter)?;

        assert!(!structured.exists());
        assert!(!td.path().join("ppa-system76-pop.save").exists());

        Ok(())
    }

    #[derive(Default)]
    struct RecordingWriter {
        writes: RefCell<Vec<(PathBuf, String)>>,
        deletes: RefCell<Vec<PathBuf>>,
    }

    impl PrivilegedWriter for RecordingWriter {
        fn write(&self, path: &Path, content: &str) -> Result<()> {
            self.writes
                .borrow_mut()
                .push((path.to_path_buf(), content.to_string()));
            Ok(())
        }

        fn delete(&self, path: &Path) -> Result<()> {
            self.deletes.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    /// Make `dir` read-only, returning false if writes still succeed (e.g. as root).
    #[cfg(unix)]
    fn make_read_only(dir: &Path) -> Result<bool> {
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o555))?;

        let check = dir.join("access-check");
        if std::fs::write(&check, "").is_ok() {
            std::fs::remove_file(&check)?;
            restore_writable(dir)?;
            return Ok(false);
        }

        Ok(true)
    }

    #[cfg(unix)]
    fn restore_writable(dir: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755))?;

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn save_falls_back_to_privileged_writer() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        std::fs::write(td.path().join("ppa-system76-pop.list"), PPA_LIST)?;

        let mut file = SourceFile::open("ppa-system76-pop", td.path())?;
        file.set_format(SourceFormat::Structured);
        let expected = file.output()?;

        if !make_read_only(td.path())? {
            return Ok(());
        }

        let writer = RecordingWriter::default();
        let res = file.save(&writer);
        restore_writable(td.path())?;
        res?;

        assert_eq!(
            writer.writes.borrow().as_slice(),
            &[
                (td.path().join("ppa-system76-pop.sources"), expected),
                (td.path().join("ppa-system76-pop.save"), PPA_LIST.to_string()),
            ]
        );
        assert_eq!(
            writer.deletes.borrow().as_slice(),
            &[td.path().join("ppa-system76-pop.list")]
        );
        assert!(!td.path().join("ppa-system76-pop.sources").exists());

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn delete_falls_back_to_privileged_writer() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        std::fs::write(td.path().join("ppa-system76-pop.list"), PPA_LIST)?;

        let mut file = SourceFile::open("ppa-system76-pop", td.path())?;
        file.remove_source("ppa-system76-pop")?;

        if !make_read_only(td.path())? {
            return Ok(());
        }

        let writer = RecordingWriter::default();
        let res = file.save(&writer);
        restore_writable(td.path())?;
        res?;

        assert!(writer.writes.borrow().is_empty());
        assert_eq!(
            writer.deletes.borrow().as_slice(),
            &[td.path().join("ppa-system76-pop.list")]
        );

        file.save(&DenyPrivilegedWriter)?;
        assert!(!td.path().join("ppa-system76-pop.list").exists());

        Ok(())
    }

    #[test]
    fn save_render_error_writes_nothing() -> Result<()> {
        let td = tempfile::TempDir::new()?;

        let mut file = SourceFile::new("multi", td.path())?;
        file.set_format(SourceFormat::Legacy);

        let mut source = Source::new();
        source.set_ident("multi");
        source.set_uris(vec!["http://a.example/".into(), "http://b.example/".into()])?;
        source.set_suites(vec!["focal".into()]);
        file.add_source(source);

        assert!(matches!(
            file.save(&DenyPrivilegedWriter),
            Err(SourcesError::Render(RenderError::TooManyValues { .. }))
        ));
        assert!(!file.path().exists());

        Ok(())
    }
}
