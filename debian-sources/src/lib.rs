// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! APT software source management.

This crate reads, deduplicates, and writes the software source files consumed by
`apt` on Debian-flavored Linux distributions. Sources are stored in
`/etc/apt/sources.list.d` in one of two formats:

* The legacy *one-line format* (`*.list` files), where each line such as
  `deb [arch=amd64] http://archive.ubuntu.com/ubuntu jammy main` describes one
  repository.
* The *structured format* (`*.sources` files), where each repository is a
  paragraph of `Key: value` fields, the same syntax as Debian control files.

Both formats are parsed into one uniform type, [source::Source]. Each source in
a file gets a stable ident, recoverable from either format through the
`X-Repolib-ID` field or trailing comment marker.

The canonical home of this crate is <https://github.com/indygreg/PyOxidizer>. Please file issues
and pull requests there.

# A Tour of Functionality

The [one_line] module parses one-line format entries. [one_line::parse_line] is the main
entry point and yields a [one_line::ParsedLine]. The tokenizer understands option lists
(`[arch=amd64 lang=en]`) and URIs which legally contain brackets.

The [control] module parses structured format paragraphs.
[control::ControlParagraph] defines a paragraph, which consists of [control::ControlField].
[control::ControlParagraphParser] is a line-oriented parser emitting paragraphs.

[source::Source] is the record type. Field names and the option alias table
(`arch` <-> `Architectures`, etc.) live in [fields]. [validation] scrubs idents
and validates URIs. The [render] module implements the structured, one-line, and
human readable projections of a source.

[source_file::SourceFile] models a file on disk, preserving comments and blank lines
between sources. When two sources in a file claim the same ident,
[dedup::find_unique_ident] merges or renames them.

[catalog::Catalog] loads every file in a sources directory, recording per-file
failures instead of aborting, and keeps idents unique across files.

Some operations need outside help. [key_store::KeyStore] turns key references
(paths, armored data, URLs, fingerprints) into keyring paths.
[privileged::PrivilegedWriter] performs writes the current process lacks permission
for. [shortcut::MetadataProvider] fetches metadata for `ppa:` shortcuts, which
[shortcut] expands into full sources.

# Crate Features

The optional and enabled-by-default `http` feature enables HTTP client support for
downloading signing keys and fetching Launchpad archive metadata.
*/

pub mod catalog;
pub mod control;
pub mod dedup;
pub mod error;
pub mod fields;
pub mod key_store;
pub mod one_line;
pub mod privileged;
pub mod render;
pub mod shortcut;
pub mod source;
pub mod source_file;
pub mod validation;
