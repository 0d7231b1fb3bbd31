// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use thiserror::Error;

/// Errors raised when parsing a single one-line format source line.
///
/// These are local to the line being parsed. When encountered while loading a
/// whole file, the offending line is retained as literal text.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ParseError {
    #[error("line is empty")]
    Empty,

    #[error("line is not a repository line: {0}")]
    NotARepoLine(String),

    #[error("invalid repository type in line: {0}")]
    BadType(String),

    #[error("option {option} in line '{line}' is not a valid repository option or is unsupported")]
    BadOption { line: String, option: String },

    #[error("line '{line}' has invalid URI: {uri}")]
    BadUri { line: String, uri: String },

    #[error("line '{0}' does not have enough pieces to be valid")]
    Incomplete(String),

    #[error("could not parse repository {field} from comment '{comment}'; make sure there is a space after the colon")]
    MissingMetadata {
        field: &'static str,
        comment: String,
    },

    #[error("cdrom sources are not supported: {0}")]
    Cdrom(String),
}

/// Errors raised when rendering a source to text.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum RenderError {
    #[error("source {ident} has too many {field}; one-line format sources support one only")]
    TooManyValues { ident: String, field: &'static str },

    #[error("source {ident} has no {field}; one-line format sources require one")]
    MissingValue { ident: String, field: &'static str },

    #[error("source {0} uses a preferences file, which only structured format sources support")]
    PrefsRequireStructured(String),
}

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum SourcesError {
    #[error("one-line source parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("control file parse error: {0}")]
    ControlParseError(String),

    #[error("file {path} is a {declared} file but contains {found} sources; please fix the file manually")]
    FormatConsistency {
        path: String,
        declared: &'static str,
        found: &'static str,
    },

    #[error("file {0} is malformed: a source lacks URIs, suites, or an ident")]
    FileCorrupt(String),

    #[error("the file {path} does not contain the source {ident}")]
    SourceNotFound { path: String, ident: String },

    #[error("no source with ident {0}")]
    UnknownSource(String),

    #[error("no sources file named {0}")]
    UnknownFile(String),

    #[error("invalid URI: {0}")]
    InvalidUri(String),

    #[error("invalid shortcut: {0}")]
    InvalidShortcut(String),

    #[error("could not toggle {kind} {value} to {enabled}")]
    ToggleNoop {
        kind: &'static str,
        value: String,
        enabled: bool,
    },

    #[error("a file name is required")]
    MissingFileName,

    #[error("signing key reference cannot be resolved: {0}")]
    KeyUnresolvable(String),

    #[error("permission denied on {0} and no privileged writer is available")]
    PrivilegeEscalationUnavailable(String),

    #[error("I/O error on path {0}: {1:?}")]
    IoPath(String, std::io::Error),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0:?}")]
    Reqwest(#[from] reqwest::Error),

    #[cfg(feature = "http")]
    #[error("URL error: {0:?}")]
    Url(#[from] url::ParseError),
}

impl SourcesError {
    /// Whether this error was caused by a lack of filesystem permissions.
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            Self::IoPath(_, e) | Self::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied
        )
    }
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, SourcesError>;
