// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The software source record.

A [Source] is the uniform in-memory representation of one entry in a sources
file, regardless of whether it was read from a one-line format line or a
structured paragraph.
*/

use {
    crate::{
        control::ControlParagraph,
        error::{Result, SourcesError},
        fields::{
            canonical_option_name, SourceType, FIELD_COMMENTS, FIELD_COMPONENTS,
            FIELD_DEFAULT_MIRROR, FIELD_ENABLED, FIELD_IDENT, FIELD_NAME, FIELD_PREFS,
            FIELD_SIGNED_BY, FIELD_SUITES, FIELD_TYPES, FIELD_URIS,
        },
        one_line::ParsedLine,
        validation::{scrub_filename, validate_uri},
    },
    std::{
        collections::{BTreeMap, BTreeSet},
        path::{Path, PathBuf},
        str::FromStr,
    },
};

/// A single software source.
///
/// Field values are validated on assignment: idents are scrubbed so they can be
/// used as file names and URIs must validate. Whether a source is enabled is
/// derived on every read from the stored flag and the presence of the required
/// fields (URIs, suites, and ident).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Source {
    ident: String,
    name: Option<String>,
    enabled: bool,
    types: BTreeSet<SourceType>,
    uris: Vec<String>,
    suites: Vec<String>,
    components: Vec<String>,
    /// Known options keyed by canonical field name. Never holds `Signed-By`.
    options: BTreeMap<String, String>,
    signed_by: Option<PathBuf>,
    comments: Vec<String>,
    prefs: Option<PathBuf>,
    default_mirror: Option<String>,
    /// Fields this crate does not know, preserved verbatim.
    extra_fields: BTreeMap<String, String>,
    twin_source: bool,
    /// Name of the file this source belongs to.
    file: Option<String>,
}

impl Default for Source {
    fn default() -> Self {
        Self {
            ident: String::new(),
            name: None,
            enabled: true,
            types: BTreeSet::from([SourceType::Binary]),
            uris: vec![],
            suites: vec![],
            components: vec![],
            options: BTreeMap::new(),
            signed_by: None,
            comments: vec![],
            prefs: None,
            default_mirror: None,
            extra_fields: BTreeMap::new(),
            twin_source: false,
            file: None,
        }
    }
}

impl Source {
    /// Construct an empty, enabled, binary source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct an instance from a parsed one-line format entry.
    pub fn from_parsed_line(line: ParsedLine) -> Self {
        let mut source = Self {
            enabled: line.enabled,
            name: line.name,
            types: BTreeSet::from([line.repo_type]),
            uris: vec![line.uri],
            suites: vec![line.suite],
            components: line.components,
            comments: line.comments,
            ..Default::default()
        };

        if let Some(ident) = line.ident {
            source.set_ident(ident);
        }

        for (key, value) in line.options {
            source.set_option(&key, value);
        }

        source
    }

    /// Construct an instance from a structured format paragraph.
    pub fn from_paragraph(paragraph: &ControlParagraph) -> Result<Self> {
        let mut source = Self::default();

        for field in paragraph.iter_fields() {
            let name = field.name();
            let value = field.value_str();

            let is = |key: &str| name.eq_ignore_ascii_case(key);

            if is(FIELD_IDENT) {
                source.set_ident(value);
            } else if is(FIELD_NAME) {
                source.set_name(value);
            } else if is(FIELD_ENABLED) {
                source.enabled = paragraph.field_bool(name).unwrap_or(true);
            } else if is(FIELD_TYPES) {
                source.types = field
                    .iter_words()
                    .map(|t| {
                        SourceType::from_str(t).map_err(|_| {
                            SourcesError::ControlParseError(format!("unknown source type: {}", t))
                        })
                    })
                    .collect::<Result<_>>()?;
            } else if is(FIELD_URIS) {
                source.set_uris(field.iter_words().map(String::from).collect())?;
            } else if is(FIELD_SUITES) {
                source.set_suites(field.iter_words().map(String::from).collect());
            } else if is(FIELD_COMPONENTS) {
                source.set_components(field.iter_words().map(String::from).collect());
            } else if is(FIELD_COMMENTS) {
                source.comments = field
                    .iter_lines()
                    .map(|c| c.strip_prefix('#').unwrap_or(c).trim())
                    .filter(|c| !c.is_empty())
                    .map(String::from)
                    .collect();
            } else if is(FIELD_PREFS) {
                source.set_prefs(Some(PathBuf::from(value)));
            } else if is(FIELD_DEFAULT_MIRROR) {
                source.set_default_mirror(Some(value.to_string()));
            } else if is(FIELD_SIGNED_BY) && value.contains('\n') {
                // An inline key block is not a path. Keep it verbatim.
                source
                    .extra_fields
                    .insert(FIELD_SIGNED_BY.to_string(), value.to_string());
            } else {
                source.set_option(name, value);
            }
        }

        source
            .comments
            .extend(paragraph.comments().iter().cloned());

        Ok(source)
    }

    /// The ident of this source. Unique within its file.
    pub fn ident(&self) -> &str {
        &self.ident
    }

    /// Set the ident, scrubbing characters not usable in file names.
    pub fn set_ident(&mut self, ident: impl AsRef<str>) {
        self.ident = scrub_filename(ident.as_ref().trim());
    }

    /// The human readable name of this source.
    ///
    /// Falls back to the ident if no name was set.
    pub fn name(&self) -> &str {
        match &self.name {
            Some(name) if !name.is_empty() => name,
            _ => &self.ident,
        }
    }

    /// The explicitly set name, if any.
    pub fn explicit_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    pub fn set_name(&mut self, name: impl ToString) {
        let name = name.to_string().trim().to_string();
        self.name = if name.is_empty() { None } else { Some(name) };
    }

    /// Description of this source for UIs.
    pub fn description(&self) -> &str {
        self.name()
    }

    /// Whether this source is enabled.
    ///
    /// Always [false] if a required field is missing, regardless of the stored flag.
    pub fn enabled(&self) -> bool {
        self.enabled && self.has_required_parts()
    }

    /// The stored enabled flag, without required field checks.
    pub fn enabled_flag(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether URIs, suites, and an ident are all present.
    pub fn has_required_parts(&self) -> bool {
        !self.uris.is_empty() && !self.suites.is_empty() && !self.ident.is_empty()
    }

    /// Whether apt would accept this source.
    ///
    /// Suites must either all be exact paths (ending in `/`) with no components,
    /// or be distribution names with at least one component.
    pub fn is_valid(&self) -> bool {
        let exact_paths = self.suites.iter().all(|s| s.ends_with('/'));

        !self.uris.is_empty() && !self.suites.is_empty() && exact_paths != !self.components.is_empty()
    }

    pub fn types(&self) -> &BTreeSet<SourceType> {
        &self.types
    }

    pub fn set_types(&mut self, types: impl IntoIterator<Item = SourceType>) {
        self.types = types.into_iter().collect();
    }

    /// Whether this source provides source code packages.
    pub fn sourcecode_enabled(&self) -> bool {
        self.types.contains(&SourceType::SourceCode)
    }

    /// Enable or disable source code packages for this source.
    ///
    /// Binary packages are always provided afterwards.
    pub fn set_sourcecode_enabled(&mut self, enabled: bool) {
        self.types = BTreeSet::from([SourceType::Binary]);
        if enabled {
            self.types.insert(SourceType::SourceCode);
        }
    }

    pub fn uris(&self) -> &[String] {
        &self.uris
    }

    /// Set the URIs. Every URI must validate.
    pub fn set_uris(&mut self, uris: Vec<String>) -> Result<()> {
        if let Some(bad) = uris.iter().find(|u| !validate_uri(u)) {
            return Err(SourcesError::InvalidUri(bad.clone()));
        }

        self.uris = uris;
        Ok(())
    }

    /// Append a URI if not already present.
    pub fn push_uri(&mut self, uri: impl ToString) -> Result<()> {
        let uri = uri.to_string();
        if !validate_uri(&uri) {
            return Err(SourcesError::InvalidUri(uri));
        }

        if !self.uris.contains(&uri) {
            self.uris.push(uri);
        }

        Ok(())
    }

    pub fn suites(&self) -> &[String] {
        &self.suites
    }

    pub fn set_suites(&mut self, suites: Vec<String>) {
        self.suites = suites;
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn set_components(&mut self, components: Vec<String>) {
        self.components = components;
    }

    /// Enable or disable a component (e.g. `main`).
    ///
    /// Enabling a component also enables the source. Errors if the component is
    /// already in the requested state.
    pub fn set_component_enabled(&mut self, component: &str, enabled: bool) -> Result<()> {
        let present = self.components.iter().any(|c| c == component);

        match (enabled, present) {
            (false, true) => self.components.retain(|c| c != component),
            (true, false) => {
                self.enabled = true;
                self.components.push(component.to_string());
            }
            _ => {
                return Err(SourcesError::ToggleNoop {
                    kind: "component",
                    value: component.to_string(),
                    enabled,
                })
            }
        }

        Ok(())
    }

    /// Enable or disable a suite (e.g. `jammy-updates`).
    ///
    /// Enabling a suite also enables the source. Errors if the suite is already
    /// in the requested state.
    pub fn set_suite_enabled(&mut self, suite: &str, enabled: bool) -> Result<()> {
        let present = self.suites.iter().any(|s| s == suite);

        match (enabled, present) {
            (false, true) => self.suites.retain(|s| s != suite),
            (true, false) => {
                self.enabled = true;
                self.suites.push(suite.to_string());
            }
            _ => {
                return Err(SourcesError::ToggleNoop {
                    kind: "suite",
                    value: suite.to_string(),
                    enabled,
                })
            }
        }

        Ok(())
    }

    /// Known options, keyed by canonical field name.
    ///
    /// `Signed-By` is not included; see [Self::signed_by].
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Obtain an option by either its one-line token or structured field name.
    ///
    /// Unknown names are looked up in the extra fields.
    pub fn option(&self, name: &str) -> Option<&str> {
        match canonical_option_name(name) {
            Some(FIELD_SIGNED_BY) => None,
            Some(canonical) => self.options.get(canonical).map(|v| v.as_str()),
            None => self
                .extra_fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
        }
    }

    /// Set an option by either its one-line token or structured field name.
    ///
    /// `Signed-By` is routed to [Self::set_signed_by]. Unknown names are stored as
    /// extra fields. An empty value removes the option.
    pub fn set_option(&mut self, name: &str, value: impl ToString) {
        let value = value.to_string();
        let value = value.trim();

        match canonical_option_name(name) {
            Some(FIELD_SIGNED_BY) => {
                self.set_signed_by(if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                });
            }
            Some(canonical) => {
                if value.is_empty() {
                    self.options.remove(canonical);
                } else {
                    self.options.insert(canonical.to_string(), value.to_string());
                }
            }
            None => {
                self.extra_fields
                    .retain(|k, _| !k.eq_ignore_ascii_case(name));
                if !value.is_empty() {
                    self.extra_fields.insert(name.to_string(), value.to_string());
                }
            }
        }
    }

    /// The `Architectures` option.
    pub fn architectures(&self) -> Option<&str> {
        self.option("Architectures")
    }

    pub fn set_architectures(&mut self, value: impl ToString) {
        self.set_option("Architectures", value);
    }

    /// The `Languages` option.
    pub fn languages(&self) -> Option<&str> {
        self.option("Languages")
    }

    pub fn set_languages(&mut self, value: impl ToString) {
        self.set_option("Languages", value);
    }

    /// The `Targets` option.
    pub fn targets(&self) -> Option<&str> {
        self.option("Targets")
    }

    /// The `Trusted` option.
    pub fn trusted(&self) -> Option<&str> {
        self.option("Trusted")
    }

    /// Path to the keyring which signs this source.
    pub fn signed_by(&self) -> Option<&Path> {
        self.signed_by.as_deref()
    }

    pub fn set_signed_by(&mut self, path: Option<PathBuf>) {
        self.signed_by = path;
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn add_comment(&mut self, comment: impl ToString) {
        self.comments.push(comment.to_string());
    }

    pub fn set_comments(&mut self, comments: Vec<String>) {
        self.comments = comments;
    }

    /// Path to an apt preferences file associated with this source.
    pub fn prefs(&self) -> Option<&Path> {
        self.prefs.as_deref()
    }

    pub fn set_prefs(&mut self, prefs: Option<PathBuf>) {
        self.prefs = prefs.filter(|p| !p.as_os_str().is_empty());
    }

    /// The default mirror URI for this source.
    pub fn default_mirror(&self) -> Option<&str> {
        self.default_mirror.as_deref()
    }

    pub fn set_default_mirror(&mut self, mirror: Option<String>) {
        self.default_mirror = mirror.filter(|m| !m.is_empty());
    }

    /// Fields not otherwise understood, keyed by their original name.
    pub fn extra_fields(&self) -> &BTreeMap<String, String> {
        &self.extra_fields
    }

    /// Whether one-line output emits separate `deb` and `deb-src` lines.
    pub fn twin_source(&self) -> bool {
        self.twin_source
    }

    pub fn set_twin_source(&mut self, twin: bool) {
        self.twin_source = twin;
    }

    /// Name of the file this source belongs to.
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub(crate) fn set_file(&mut self, file: Option<String>) {
        self.file = file;
    }

    /// Whether two sources carry the same repository data.
    ///
    /// Bookkeeping fields (ident, name, comments, enabled, types) are ignored.
    pub fn same_content(&self, other: &Source) -> bool {
        self.uris == other.uris
            && self.suites == other.suites
            && self.components == other.components
            && self.options == other.options
            && self.signed_by == other.signed_by
            && self.prefs == other.prefs
            && self.default_mirror == other.default_mirror
            && self.extra_fields == other.extra_fields
    }

    /// Fold the repository data of another source into this one.
    ///
    /// Multi-value fields are unioned token-wise, keeping existing order.
    /// Single-value fields are only adopted when unset here.
    pub(crate) fn absorb(&mut self, other: &Source) {
        fn union(ours: &mut Vec<String>, theirs: &[String]) {
            for value in theirs {
                if !ours.contains(value) {
                    ours.push(value.clone());
                }
            }
        }

        fn union_words(ours: &mut BTreeMap<String, String>, theirs: &BTreeMap<String, String>) {
            for (key, value) in theirs {
                // Multiline values (inline key blocks) are not word lists.
                if value.contains('\n') {
                    ours.entry(key.clone()).or_insert_with(|| value.clone());
                    continue;
                }

                let entry = ours.entry(key.clone()).or_default();
                let mut words = entry
                    .split_whitespace()
                    .map(String::from)
                    .collect::<Vec<_>>();
                union(
                    &mut words,
                    &value
                        .split_whitespace()
                        .map(String::from)
                        .collect::<Vec<_>>(),
                );
                *entry = words.join(" ");
            }
        }

        union(&mut self.uris, &other.uris);
        union(&mut self.suites, &other.suites);
        union(&mut self.components, &other.components);
        union_words(&mut self.options, &other.options);
        union_words(&mut self.extra_fields, &other.extra_fields);

        if self.signed_by.is_none() {
            self.signed_by = other.signed_by.clone();
        }
        if self.prefs.is_none() {
            self.prefs = other.prefs.clone();
        }
        if self.default_mirror.is_none() {
            self.default_mirror = other.default_mirror.clone();
        }
    }

    /// Generate an ident from the first URI and type.
    ///
    /// e.g. `http://example.com/ubuntu` yields `example-com-ubuntu-binary`. The
    /// ident is stored if this source does not have one yet.
    pub fn generate_default_ident(&mut self, prefix: &str) -> String {
        let mut ident = String::new();

        if let Some(uri) = self.uris.first() {
            let location = uri.split('/').filter(|s| !s.is_empty()).skip(1);
            ident = format!(
                "{}{}",
                prefix,
                scrub_filename(&location.collect::<Vec<_>>().join("-"))
            );
        }

        let suffix = self
            .types
            .iter()
            .next()
            .copied()
            .unwrap_or(SourceType::Binary)
            .ident_suffix();
        ident = format!("{}-{}", ident, suffix);

        if self.ident.is_empty() {
            self.set_ident(&ident);
        }

        ident
    }
}
