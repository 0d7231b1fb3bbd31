// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Control paragraph primitives for structured (DEB822) source files.

See <https://manpages.debian.org/unstable/apt/sources.list.5.en.html#DEB822-STYLE_FORMAT>
for how apt reads these files. The syntax is that of Debian control files, with
the addition that lines starting with `#` are comments.
*/

use {
    crate::error::{Result, SourcesError},
    std::io::Write,
};

/// A field in a control paragraph.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ControlField {
    name: String,
    value: String,
}

impl ControlField {
    /// Construct an instance from a field name and value.
    pub fn new(name: impl ToString, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// The name of this field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value of this field.
    ///
    /// Continuation lines are joined with `\n`; leading whitespace is preserved.
    pub fn value_str(&self) -> &str {
        &self.value
    }

    /// Obtain an iterator of words in the value.
    pub fn iter_words(&self) -> impl Iterator<Item = &str> {
        self.value.split_ascii_whitespace()
    }

    /// Obtain an iterator of lines in the value.
    ///
    /// Leading whitespace from each line is stripped.
    pub fn iter_lines(&self) -> impl Iterator<Item = &str> {
        self.value.lines().map(|x| x.trim_start())
    }

    /// Write the contents of this field to a writer.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(self.name.as_bytes())?;
        writer.write_all(b": ")?;
        writer.write_all(self.value.as_bytes())?;
        writer.write_all(b"\n")
    }
}

impl std::fmt::Display for ControlField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}: {}", self.name, self.value)
    }
}

/// A paragraph in a structured sources file.
///
/// A paragraph is an ordered series of control fields. Field names are case
/// insensitive on read and case preserving on set. A field can only occur once;
/// setting a field that already exists replaces it.
///
/// Comment lines encountered inside the paragraph are retained separately from
/// fields, without their leading `#`.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ControlParagraph {
    fields: Vec<ControlField>,
    comments: Vec<String>,
}

impl ControlParagraph {
    /// Whether the paragraph has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Set the value of a field via a [ControlField].
    ///
    /// An existing field with the same name (case insensitive compare) is removed
    /// and the incoming field is appended.
    pub fn set_field(&mut self, field: ControlField) {
        self.fields
            .retain(|cf| !cf.name.eq_ignore_ascii_case(&field.name));
        self.fields.push(field);
    }

    /// Set the value of a field defined via strings.
    pub fn set_field_from_string(&mut self, name: impl ToString, value: impl ToString) {
        self.set_field(ControlField::new(name, value));
    }

    /// Remove a field, returning it if present.
    pub fn remove_field(&mut self, name: &str) -> Option<ControlField> {
        let index = self
            .fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))?;

        Some(self.fields.remove(index))
    }

    /// Whether a named field is present in this paragraph.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Iterate over fields in this paragraph, in insertion order.
    pub fn iter_fields(&self) -> impl Iterator<Item = &ControlField> {
        self.fields.iter()
    }

    /// Obtain the field with a given name in this paragraph.
    pub fn field(&self, name: &str) -> Option<&ControlField> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Obtain the raw string value of the named field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value_str())
    }

    /// Obtain the value of a field, evaluated as a boolean.
    ///
    /// apt accepts `yes`, `true`, `on`, and `1` as true values.
    pub fn field_bool(&self, name: &str) -> Option<bool> {
        self.field_str(name).map(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "yes" | "true" | "on" | "1"
            )
        })
    }

    /// Obtain the words of the named field, collected into owned strings.
    ///
    /// A missing field yields an empty list.
    pub fn field_words(&self, name: &str) -> Vec<String> {
        self.field(name)
            .map(|f| f.iter_words().map(|w| w.to_string()).collect())
            .unwrap_or_default()
    }

    /// Record a comment line.
    pub fn add_comment(&mut self, comment: impl ToString) {
        self.comments.push(comment.to_string());
    }

    /// Comment lines seen inside this paragraph.
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Serialize the paragraph's fields to a writer.
    ///
    /// Each field ends with a newline. No terminating blank line is written.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for field in &self.fields {
            field.write(writer)?;
        }

        Ok(())
    }
}

impl std::fmt::Display for ControlParagraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for field in &self.fields {
            write!(f, "{}", field)?;
        }

        Ok(())
    }
}

/// Holds parsing state for structured sources paragraphs.
///
/// Instances are fed lines of text and emit a [ControlParagraph] when a blank
/// line terminates one.
#[derive(Clone, Debug, Default)]
pub struct ControlParagraphParser {
    paragraph: ControlParagraph,
    field: Option<String>,
}

impl ControlParagraphParser {
    /// Whether the parser holds any state for an unfinished paragraph.
    pub fn in_paragraph(&self) -> bool {
        self.field.is_some() || !self.paragraph.is_empty()
    }

    /// Write a line to the parser.
    ///
    /// The line should not contain its trailing newline. If the line terminates
    /// an in-progress paragraph, that paragraph is returned.
    pub fn write_line(&mut self, line: &str) -> Result<Option<ControlParagraph>> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);

        if line.trim().is_empty() {
            if let Some(field) = self.field.take() {
                self.flush_field(field)?;
            }

            return Ok(if self.paragraph.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut self.paragraph))
            });
        }

        if let Some(comment) = line.strip_prefix('#') {
            self.paragraph.add_comment(comment.trim());
            return Ok(None);
        }

        let is_continuation = line.starts_with(&[' ', '\t'][..]);

        match (self.field.take(), is_continuation) {
            (Some(v), false) => {
                self.flush_field(v)?;
                self.field = Some(line.to_string());
            }
            (Some(v), true) => {
                self.field = Some(format!("{}\n{}", v, line));
            }
            (None, true) => {
                return Err(SourcesError::ControlParseError(format!(
                    "continuation line without a field: '{}'",
                    line
                )));
            }
            (None, false) => {
                self.field = Some(line.to_string());
            }
        }

        Ok(None)
    }

    /// Finish parsing, consuming self.
    ///
    /// Returns the unterminated paragraph, if any.
    pub fn finish(mut self) -> Result<Option<ControlParagraph>> {
        if let Some(field) = self.field.take() {
            self.flush_field(field)?;
        }

        Ok(if self.paragraph.is_empty() {
            None
        } else {
            Some(self.paragraph)
        })
    }

    fn flush_field(&mut self, v: String) -> Result<()> {
        let (name, value) = v.split_once(':').ok_or_else(|| {
            SourcesError::ControlParseError(format!("error parsing line '{}'; missing colon", v))
        })?;

        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(SourcesError::ControlParseError(format!(
                "invalid field name in '{}'",
                v
            )));
        }

        self.paragraph
            .set_field_from_string(name, value.trim());

        Ok(())
    }
}

/// Parse all paragraphs in a string.
pub fn parse_paragraphs(s: &str) -> Result<Vec<ControlParagraph>> {
    let mut parser = ControlParagraphParser::default();
    let mut paragraphs = vec![];

    for line in s.lines() {
        if let Some(paragraph) = parser.write_line(line)? {
            paragraphs.push(paragraph);
        }
    }

    if let Some(paragraph) = parser.finish()? {
        paragraphs.push(paragraph);
    }

    Ok(paragraphs)
}
