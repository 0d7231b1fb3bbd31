// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Resolution of ident collisions within one sources file.

When two sources in a file claim the same ident, one of three things happens:

1. In structured files, the incoming source is merged into the existing one.
2. In one-line files, a `deb` and `deb-src` line describing the same repository
   are merged into a single twin source.
3. Otherwise both sources are renamed: first by the first URI, suite, or
   component distinguishing them, and failing that by their position in the file.
*/

use {
    crate::{
        fields::{SourceFormat, SourceType},
        source::Source,
        validation::scrub_filename,
    },
    log::debug,
};

/// The outcome of an ident collision.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Resolution {
    /// The incoming source was absorbed into the existing one and must be dropped.
    Discard,
    /// Both sources were renamed and should be kept.
    KeepBoth,
}

/// Resolve an ident collision between an existing and an incoming source.
///
/// `existing_index` and `incoming_index` are the positions of the two sources
/// among the file's sources and are only used when nothing else distinguishes
/// them.
pub fn find_unique_ident(
    format: SourceFormat,
    existing: &mut Source,
    existing_index: usize,
    incoming: &mut Source,
    incoming_index: usize,
) -> Resolution {
    debug!(
        "idents {} and {} conflict; resolving as {}",
        existing.ident(),
        incoming.ident(),
        format.description()
    );

    match format {
        SourceFormat::Structured => {
            existing.absorb(incoming);
            Resolution::Discard
        }
        SourceFormat::Legacy => {
            if merge_twins(existing, incoming) {
                return Resolution::Discard;
            }

            if !rename_by_difference(existing, incoming) {
                let base = existing.ident().to_string();
                existing.set_ident(format!("{}-{}", base, existing_index));
                incoming.set_ident(format!("{}-{}", base, incoming_index));
            }

            debug!("renamed to {} and {}", existing.ident(), incoming.ident());

            Resolution::KeepBoth
        }
    }
}

/// Merge a `deb` / `deb-src` pair into one twin source.
///
/// Returns whether the merge happened.
fn merge_twins(existing: &mut Source, incoming: &Source) -> bool {
    if existing.types().len() != 1
        || incoming.types().len() != 1
        || !existing.same_content(incoming)
    {
        return false;
    }

    let existing_is_source = existing.types().contains(&SourceType::SourceCode);
    let incoming_is_source = incoming.types().contains(&SourceType::SourceCode);

    let (binary_enabled, sourcecode_enabled) = if existing_is_source && !incoming_is_source {
        (incoming.enabled(), existing.enabled())
    } else {
        (existing.enabled(), incoming.enabled())
    };

    existing.set_sourcecode_enabled(sourcecode_enabled);
    existing.set_twin_source(true);
    existing.set_enabled(binary_enabled);

    true
}

/// Append the first distinguishing token of each source to its ident.
///
/// Returns whether the resulting idents differ.
fn rename_by_difference(existing: &mut Source, incoming: &mut Source) -> bool {
    fn first_missing(ours: &[String], theirs: &[String]) -> Option<String> {
        ours.iter().find(|v| !theirs.contains(v)).cloned()
    }

    let mut ident_existing = existing.ident().to_string();
    let mut ident_incoming = incoming.ident().to_string();

    for (ours, theirs) in [
        (existing.uris(), incoming.uris()),
        (existing.suites(), incoming.suites()),
        (existing.components(), incoming.components()),
    ] {
        if let Some(token) = first_missing(ours, theirs) {
            ident_existing.push_str(&format!("-{}", token));
        }
        if let Some(token) = first_missing(theirs, ours) {
            ident_incoming.push_str(&format!("-{}", token));
        }

        if ident_existing != ident_incoming {
            break;
        }
    }

    if scrub_filename(&ident_existing) == scrub_filename(&ident_incoming) {
        return false;
    }

    existing.set_ident(ident_existing);
    incoming.set_ident(ident_incoming);

    true
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::Result, one_line::parse_line},
    };

    fn legacy(line: &str, ident: &str) -> Result<Source> {
        let mut source = Source::from_parsed_line(parse_line(line)?);
        source.set_ident(ident);
        Ok(source)
    }

    #[test]
    fn twin_merge() -> Result<()> {
        let mut existing = legacy("deb http://x.example/ focal main", "x")?;
        let mut incoming = legacy("deb-src http://x.example/ focal main", "x")?;

        assert_eq!(
            find_unique_ident(SourceFormat::Legacy, &mut existing, 0, &mut incoming, 1),
            Resolution::Discard
        );
        assert_eq!(existing.ident(), "x");
        assert!(existing.twin_source());
        assert!(existing.sourcecode_enabled());
        assert!(existing.enabled());
        assert_eq!(existing.types().len(), 2);

        Ok(())
    }

    #[test]
    fn twin_merge_disabled_source_code() -> Result<()> {
        let mut existing = legacy("deb http://x.example/ focal main", "x")?;
        let mut incoming = legacy("# deb-src http://x.example/ focal main", "x")?;

        find_unique_ident(SourceFormat::Legacy, &mut existing, 0, &mut incoming, 1);
        assert!(existing.twin_source());
        assert!(existing.enabled());
        assert!(!existing.sourcecode_enabled());

        Ok(())
    }

    #[test]
    fn twin_merge_source_code_first() -> Result<()> {
        let mut existing = legacy("deb-src http://x.example/ focal main", "x")?;
        let mut incoming = legacy("# deb http://x.example/ focal main", "x")?;

        assert_eq!(
            find_unique_ident(SourceFormat::Legacy, &mut existing, 0, &mut incoming, 1),
            Resolution::Discard
        );
        assert!(existing.twin_source());
        assert!(existing.sourcecode_enabled());
        assert!(!existing.enabled());

        Ok(())
    }

    #[test]
    fn rename_by_uri() -> Result<()> {
        let mut existing = legacy("deb http://a.example/ focal main", "x")?;
        let mut incoming = legacy("deb http://b.example/ focal main", "x")?;

        assert_eq!(
            find_unique_ident(SourceFormat::Legacy, &mut existing, 0, &mut incoming, 1),
            Resolution::KeepBoth
        );
        assert_eq!(existing.ident(), "x-http__a-example_");
        assert_eq!(incoming.ident(), "x-http__b-example_");

        Ok(())
    }

    #[test]
    fn rename_by_suite_and_component() -> Result<()> {
        let mut existing = legacy("deb http://a.example/ focal main", "x")?;
        let mut incoming = legacy("deb http://a.example/ focal-updates main", "x")?;

        find_unique_ident(SourceFormat::Legacy, &mut existing, 0, &mut incoming, 1);
        assert_eq!(existing.ident(), "x-focal");
        assert_eq!(incoming.ident(), "x-focal-updates");

        let mut existing = legacy("deb http://a.example/ focal main", "x")?;
        let mut incoming = legacy("deb http://a.example/ focal universe", "x")?;

        find_unique_ident(SourceFormat::Legacy, &mut existing, 0, &mut incoming, 1);
        assert_eq!(existing.ident(), "x-main");
        assert_eq!(incoming.ident(), "x-universe");

        Ok(())
    }

    #[test]
    fn positional_fallback() -> Result<()> {
        let mut existing = legacy("deb [arch=amd64] http://a.example/ focal main", "x")?;
        let mut incoming = legacy("deb [arch=i386] http://a.example/ focal main", "x")?;

        assert_eq!(
            find_unique_ident(SourceFormat::Legacy, &mut existing, 0, &mut incoming, 3),
            Resolution::KeepBoth
        );
        assert_eq!(existing.ident(), "x-0");
        assert_eq!(incoming.ident(), "x-3");

        Ok(())
    }

    #[test]
    fn structured_merge_is_deterministic() -> Result<()> {
        let build = || -> Result<(Source, Source)> {
            let mut a = Source::new();
            a.set_ident("x");
            a.set_uris(vec!["http://a.example/".into()])?;
            a.set_suites(vec!["focal".into()]);
            a.set_components(vec!["main".into()]);
            a.set_architectures("amd64");

            let mut b = Source::new();
            b.set_ident("x");
            b.set_uris(vec!["http://b.example/".into()])?;
            b.set_suites(vec!["focal".into(), "focal-updates".into()]);
            b.set_components(vec!["main".into()]);
            b.set_architectures("amd64 i386");
            b.set_signed_by(Some("/etc/apt/keyrings/x.gpg".into()));

            Ok((a, b))
        };

        let mut results = vec![];
        for _ in 0..2 {
            let (mut a, mut b) = build()?;
            assert_eq!(
                find_unique_ident(SourceFormat::Structured, &mut a, 0, &mut b, 1),
                Resolution::Discard
            );
            results.push(a);
        }

        assert_eq!(results[0], results[1]);

        let merged = &results[0];
        assert_eq!(merged.uris(), &["http://a.example/", "http://b.example/"]);
        assert_eq!(merged.suites(), &["focal", "focal-updates"]);
        assert_eq!(merged.components(), &["main"]);
        assert_eq!(merged.architectures(), Some("amd64 i386"));
        assert_eq!(
            merged.signed_by(),
            Some(std::path::Path::new("/etc/apt/keyrings/x.gpg"))
        );

        Ok(())
    }
}
