// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Identifier scrubbing and URI validation. */

use url::Url;

/// URI schemes that address local paths and need no host.
const LOCAL_SCHEMES: &[&str] = &["file", "copy"];

/// Make a string usable as a file name component.
///
/// Characters are removed or replaced according to a fixed table; everything
/// else passes through unchanged.
pub fn scrub_filename(s: &str) -> String {
    s.chars()
        .filter_map(|c| match c {
            '!' | '(' | ')' | '[' | ']' | '\\' | '{' | '}' | '?' | '`' | '~' | ':' | ';' => None,
            '@' | '#' | '$' | '%' | '^' | '&' | '*' | '+' | '=' | '.' => Some('-'),
            '|' | '/' | '<' | '>' | ',' | ' ' => Some('_'),
            c => Some(c),
        })
        .collect()
}

fn valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();

    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn is_local_scheme(scheme: &str) -> bool {
    let scheme = scheme.to_ascii_lowercase();
    // mirror+file and similar wrappers.
    let base = scheme.rsplit('+').next().unwrap_or(&scheme);

    LOCAL_SCHEMES.contains(&base)
}

/// Whether a string is acceptable as a source URI.
///
/// A URI needs a scheme and a host, or a scheme and a path for local schemes.
///
/// apt is more lenient than strict URL parsing: hosts and paths in the wild
/// contain characters like `[` and `]`. Strings [Url] rejects are checked
/// structurally instead.
pub fn validate_uri(uri: &str) -> bool {
    if let Ok(url) = Url::parse(uri) {
        if matches!(url.host_str(), Some(host) if !host.is_empty()) {
            return true;
        }

        return is_local_scheme(url.scheme()) && url.path().len() > 1;
    }

    let (scheme, rest) = match uri.split_once("://") {
        Some(v) => v,
        None => return false,
    };

    if !valid_scheme(scheme) {
        return false;
    }

    let (netloc, path) = rest.split_once('/').unwrap_or((rest, ""));

    !netloc.is_empty() || (is_local_scheme(scheme) && !path.is_empty())
}
