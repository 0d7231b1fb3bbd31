// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Parsing of one-line format (`sources.list`) entries.

The grammar is

```text
[#] (deb|deb-src) [[opt=val[,val...] ...]] <uri> <suite> [component ...] [# comment]
```

A trailing comment may carry the source's name and ident as
`X-Repolib-Name: <name>` and `X-Repolib-ID: <ident>` markers. Square brackets
delimit the option list, but may also appear literally inside URIs.
*/

use {
    crate::{
        error::ParseError,
        fields::{option_long_name, SourceType, FIELD_IDENT, FIELD_NAME},
        validation::validate_uri,
    },
    std::{collections::BTreeMap, str::FromStr},
};

/// The structured result of parsing one line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedLine {
    pub enabled: bool,
    /// Name recovered from an `X-Repolib-Name` marker.
    pub name: Option<String>,
    /// Ident recovered from an `X-Repolib-ID` marker.
    pub ident: Option<String>,
    pub comments: Vec<String>,
    pub repo_type: SourceType,
    pub uri: String,
    pub suite: String,
    pub components: Vec<String>,
    /// Options keyed by their structured format field name.
    pub options: BTreeMap<String, String>,
}

/// Strip leading `#` characters and whitespace.
pub(crate) fn strip_hashes(s: &str) -> &str {
    s.trim_start_matches(|c: char| c == '#' || c.is_whitespace())
}

/// Cheap check for whether a line looks like a (possibly disabled) one-line entry.
///
/// This does not validate the rest of the line.
pub fn is_one_line_entry(line: &str) -> bool {
    matches!(
        strip_hashes(line.trim()).split_whitespace().next(),
        Some("deb") | Some("deb-src")
    )
}

/// Whitespace-delimited words along with their byte offsets.
fn words_with_offsets(s: &str) -> Vec<(usize, &str)> {
    let mut words = vec![];
    let mut start = None;

    for (i, c) in s.char_indices() {
        if c.is_whitespace() {
            if let Some(st) = start.take() {
                words.push((st, &s[st..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(st) = start {
        words.push((st, &s[st..]));
    }

    words
}

/// Find the byte offset of the `#` starting a trailing comment.
///
/// `#` inside an option list or inside a URI does not start a comment.
fn find_comment_start(line: &str) -> Option<usize> {
    let mut in_options = false;

    for (start, word) in words_with_offsets(line) {
        if !in_options && validate_uri(word) {
            continue;
        }

        for (i, c) in word.char_indices() {
            match c {
                '[' => in_options = true,
                ']' => in_options = false,
                '#' if !in_options => return Some(start + i),
                _ => {}
            }
        }
    }

    None
}

/// Split a line into tokens, treating a `[...]` option list as one token.
///
/// Words that validate as URIs are taken verbatim, so brackets inside them do
/// not open an option list.
pub fn split_tokens(line: &str) -> Vec<String> {
    let mut pieces = vec![];
    let mut current = String::new();
    let mut in_options = false;

    for word in line.split_whitespace() {
        if !in_options && validate_uri(word) {
            pieces.push(word.to_string());
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);

        for c in word.chars() {
            match c {
                '[' => in_options = true,
                ']' => in_options = false,
                _ => {}
            }
        }

        if !in_options {
            pieces.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

/// Metadata recovered from a trailing comment.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommentMetadata {
    pub name: Option<String>,
    pub ident: Option<String>,
    pub comments: Vec<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Capture {
    Comment,
    Name,
    Ident,
}

/// Parse the text following a line's comment `#`.
///
/// The name runs until the next marker or stand-alone `#`. The ident is a single
/// word. Remaining text is split into comments at stand-alone `#` words.
pub fn parse_comment(tail: &str) -> Result<CommentMetadata, ParseError> {
    let tail = strip_hashes(tail.trim());

    let has_name = tail.contains(FIELD_NAME);
    let has_ident = tail.contains(FIELD_IDENT);

    let mut capture = Capture::Comment;
    let mut name_words = vec![];
    let mut ident = String::new();
    let mut comments = vec![];
    let mut segment: Vec<&str> = vec![];

    let mut flush_segment = |segment: &mut Vec<&str>| {
        if !segment.is_empty() {
            comments.push(segment.join(" "));
            segment.clear();
        }
    };

    for item in tail.split_whitespace() {
        let bare = item.trim_matches('#');

        if bare.starts_with(FIELD_NAME) {
            flush_segment(&mut segment);
            capture = Capture::Name;
            continue;
        }
        if bare.starts_with(FIELD_IDENT) {
            flush_segment(&mut segment);
            capture = Capture::Ident;
            continue;
        }

        // Only a word made of `#` alone separates segments; `C#` is a word.
        if bare.is_empty() {
            flush_segment(&mut segment);
            capture = Capture::Comment;
            continue;
        }

        match capture {
            Capture::Name => name_words.push(item),
            Capture::Ident => {
                ident = item.to_string();
                capture = Capture::Comment;
            }
            Capture::Comment => segment.push(item),
        }
    }
    flush_segment(&mut segment);

    let mut name = name_words.join(" ");

    if has_name && name.is_empty() {
        return Err(ParseError::MissingMetadata {
            field: "name",
            comment: tail.to_string(),
        });
    }
    if has_ident && ident.is_empty() {
        return Err(ParseError::MissingMetadata {
            field: "ident",
            comment: tail.to_string(),
        });
    }

    if name.is_empty() && !ident.is_empty() {
        name = ident.clone();
    }

    Ok(CommentMetadata {
        name: if name.is_empty() { None } else { Some(name) },
        ident: if ident.is_empty() { None } else { Some(ident) },
        comments,
    })
}

/// Parse a bracketed option list into structured field names and values.
///
/// Multiple values for one option are joined with a single space.
pub fn parse_options(token: &str, line: &str) -> Result<BTreeMap<String, String>, ParseError> {
    let inner = token.trim();
    let inner = inner.strip_prefix('[').unwrap_or(inner);
    let inner = inner.strip_suffix(']').unwrap_or(inner);

    let mut options = BTreeMap::new();

    for opt in inner.split_whitespace() {
        let bad_option = || ParseError::BadOption {
            line: line.to_string(),
            option: opt.to_string(),
        };

        let (key, values) = opt.split_once('=').ok_or_else(bad_option)?;
        let long = option_long_name(key).ok_or_else(bad_option)?;

        let value = values
            .split(',')
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        options.insert(long.to_string(), value);
    }

    Ok(options)
}

/// Parser for one-line format entries.
///
/// The parser remembers the previously parsed line so callers can report
/// context when a line fails to parse.
#[derive(Clone, Debug, Default)]
pub struct OneLineParser {
    previous: Option<String>,
    current: Option<String>,
}

impl OneLineParser {
    /// The line parsed before the current one.
    pub fn previous_line(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    /// The line most recently passed to [Self::parse_line].
    pub fn current_line(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Parse a single line.
    pub fn parse_line(&mut self, line: &str) -> Result<ParsedLine, ParseError> {
        let trimmed = line.trim();
        self.previous = self.current.replace(trimmed.to_string());

        if trimmed.is_empty() || trimmed == "#" {
            return Err(ParseError::Empty);
        }

        let mut enabled = true;
        let mut body = trimmed;

        if trimmed.starts_with('#') {
            enabled = false;
            body = strip_hashes(trimmed);

            if !is_one_line_entry(body) {
                return Err(ParseError::NotARepoLine(trimmed.to_string()));
            }
        }

        let metadata = match find_comment_start(body) {
            Some(index) => {
                let metadata = parse_comment(&body[index + 1..])?;
                body = &body[..index];
                metadata
            }
            None => CommentMetadata::default(),
        };

        let incomplete = || ParseError::Incomplete(trimmed.to_string());

        let mut tokens = split_tokens(body).into_iter();

        let repo_type = tokens.next().ok_or_else(incomplete)?;
        let repo_type = SourceType::from_str(&repo_type)
            .map_err(|_| ParseError::BadType(trimmed.to_string()))?;

        let mut token = tokens.next().ok_or_else(incomplete)?;
        let mut options = BTreeMap::new();

        if token.starts_with('[') {
            options = parse_options(&token, trimmed)?;
            token = tokens.next().ok_or_else(incomplete)?;
        }

        if token.starts_with("cdrom:") {
            return Err(ParseError::Cdrom(trimmed.to_string()));
        }

        if !validate_uri(&token) {
            return Err(ParseError::BadUri {
                line: trimmed.to_string(),
                uri: token,
            });
        }
        let uri = token;

        let suite = tokens.next().ok_or_else(incomplete)?;
        let components = tokens.collect();

        Ok(ParsedLine {
            enabled,
            name: metadata.name,
            ident: metadata.ident,
            comments: metadata.comments,
            repo_type,
            uri,
            suite,
            components,
            options,
        })
    }
}

/// Parse a single line without retaining parser context.
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    OneLineParser::default().parse_line(line)
}
