// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Fallback for writes the current process lacks permission to perform.

Sources files usually live in a root owned directory. When a direct write or
delete fails with a permission error, the operation is handed to a
[PrivilegedWriter], which may forward it to a service running with elevated
privileges. It is never used for reads.
*/

use {
    crate::error::{Result, SourcesError},
    std::path::Path,
};

/// Performs single file writes and deletes with elevated privileges.
pub trait PrivilegedWriter {
    /// Write `content` to `path`, replacing any existing file.
    fn write(&self, path: &Path, content: &str) -> Result<()>;

    /// Delete the file at `path`.
    fn delete(&self, path: &Path) -> Result<()>;
}

/// A [PrivilegedWriter] that refuses every operation.
///
/// Use this when no privilege escalation mechanism is available.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenyPrivilegedWriter;

impl PrivilegedWriter for DenyPrivilegedWriter {
    fn write(&self, path: &Path, _content: &str) -> Result<()> {
        Err(SourcesError::PrivilegeEscalationUnavailable(
            path.display().to_string(),
        ))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        Err(SourcesError::PrivilegeEscalationUnavailable(
            path.display().to_string(),
        ))
    }
}
