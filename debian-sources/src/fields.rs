// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Field names, source types, and the option alias table. */

use strum::{Display, EnumString};

pub const FIELD_IDENT: &str = "X-Repolib-ID";
pub const FIELD_NAME: &str = "X-Repolib-Name";
pub const FIELD_ENABLED: &str = "Enabled";
pub const FIELD_TYPES: &str = "Types";
pub const FIELD_URIS: &str = "URIs";
pub const FIELD_SUITES: &str = "Suites";
pub const FIELD_COMPONENTS: &str = "Components";
pub const FIELD_SIGNED_BY: &str = "Signed-By";
pub const FIELD_COMMENTS: &str = "X-Repolib-Comments";
pub const FIELD_PREFS: &str = "X-Repolib-Prefs";
pub const FIELD_DEFAULT_MIRROR: &str = "X-Repolib-Default-Mirror";

/// Fields emitted first in structured output, in this order.
pub const CANONICAL_FIELD_ORDER: &[&str] = &[
    FIELD_IDENT,
    FIELD_NAME,
    FIELD_ENABLED,
    FIELD_TYPES,
    FIELD_URIS,
    FIELD_SUITES,
    FIELD_COMPONENTS,
];

/// Fields omitted from the UI summary.
pub const UI_SKIP_FIELDS: &[&str] = &[FIELD_IDENT, FIELD_PREFS];

/// Display names substituted in the UI summary.
pub const UI_FIELD_NAMES: &[(&str, &str)] = &[(FIELD_NAME, "Name")];

/// Mapping of one-line format option tokens to structured format field names.
pub const OPTION_ALIASES: &[(&str, &str)] = &[
    ("arch", "Architectures"),
    ("lang", "Languages"),
    ("target", "Targets"),
    ("pdiffs", "PDiffs"),
    ("by-hash", "By-Hash"),
    ("allow-insecure", "Allow-Insecure"),
    ("allow-weak", "Allow-Weak"),
    ("allow-downgrade-to-insecure", "Allow-Downgrade-To-Insecure"),
    ("trusted", "Trusted"),
    ("signed-by", FIELD_SIGNED_BY),
    ("check-valid-until", "Check-Valid-Until"),
    ("valid-until-min", "Valid-Until-Min"),
    ("valid-until-max", "Valid-Until-Max"),
];

/// Resolve a one-line option token (e.g. `arch`) to its structured field name.
pub fn option_long_name(short: &str) -> Option<&'static str> {
    OPTION_ALIASES
        .iter()
        .find(|(s, _)| *s == short)
        .map(|(_, long)| *long)
}

/// Resolve a structured option field name to its one-line option token.
///
/// The comparison is case insensitive, as field names are.
pub fn option_short_name(long: &str) -> Option<&'static str> {
    OPTION_ALIASES
        .iter()
        .find(|(_, l)| l.eq_ignore_ascii_case(long))
        .map(|(short, _)| *short)
}

/// Resolve either spelling of a known option to its canonical field name.
pub fn canonical_option_name(name: &str) -> Option<&'static str> {
    OPTION_ALIASES
        .iter()
        .find(|(short, long)| *short == name || long.eq_ignore_ascii_case(name))
        .map(|(_, long)| *long)
}

/// Whether a line begins a field of a known structured format key.
///
/// This is the cheap check used to detect the start of a paragraph.
pub fn is_structured_field_line(line: &str) -> bool {
    let (name, _) = match line.split_once(':') {
        Some(v) => v,
        None => return false,
    };

    if name.is_empty() || name.starts_with(char::is_whitespace) {
        return false;
    }

    let name = name.trim_end();

    CANONICAL_FIELD_ORDER
        .iter()
        .chain(
            [
                FIELD_SIGNED_BY,
                FIELD_COMMENTS,
                FIELD_PREFS,
                FIELD_DEFAULT_MIRROR,
            ]
            .iter(),
        )
        .any(|key| key.eq_ignore_ascii_case(name))
        || canonical_option_name(name).is_some()
}

/// The class of packages a source provides.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SourceType {
    #[strum(serialize = "deb")]
    Binary,
    #[strum(serialize = "deb-src")]
    SourceCode,
}

impl SourceType {
    /// Suffix used when generating default idents.
    pub fn ident_suffix(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::SourceCode => "source",
        }
    }
}

/// On-disk format of a sources file.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SourceFormat {
    /// DEB822 paragraphs in a `.sources` file.
    Structured,
    /// One-line entries in a `.list` file.
    Legacy,
}

impl Default for SourceFormat {
    fn default() -> Self {
        Self::Structured
    }
}

impl SourceFormat {
    /// The file extension used by this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Structured => "sources",
            Self::Legacy => "list",
        }
    }

    /// The other format.
    pub fn alternate(&self) -> Self {
        match self {
            Self::Structured => Self::Legacy,
            Self::Legacy => Self::Structured,
        }
    }

    /// Human readable description for messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Structured => "DEB822",
            Self::Legacy => "one-line",
        }
    }
}
