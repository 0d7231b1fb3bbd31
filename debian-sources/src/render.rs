// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Text projections of sources.

A [Source] can be rendered three ways:

* As a structured (DEB822) paragraph via [Source::to_structured].
* As one or two one-line format lines via [Source::to_legacy].
* As a human readable summary via [Source::to_ui]. This is for display only and
  is not guaranteed to parse.

Rendering never mutates the source.
*/

use {
    crate::{
        control::ControlParagraph,
        error::RenderError,
        fields::{
            SourceType, FIELD_COMMENTS, FIELD_COMPONENTS, FIELD_DEFAULT_MIRROR, FIELD_ENABLED,
            FIELD_IDENT, FIELD_NAME, FIELD_PREFS, FIELD_SIGNED_BY, FIELD_SUITES, FIELD_TYPES,
            FIELD_URIS, OPTION_ALIASES, UI_FIELD_NAMES, UI_SKIP_FIELDS,
        },
        source::Source,
    },
    log::warn,
    std::collections::BTreeMap,
};

impl Source {
    /// Fields in structured output order.
    ///
    /// Canonical fields come first, then everything else sorted by name.
    fn ordered_fields(&self, default_name: bool) -> Vec<(String, String)> {
        let mut fields = vec![];

        if !self.ident().is_empty() {
            fields.push((FIELD_IDENT.to_string(), self.ident().to_string()));
        }

        let name = if default_name {
            Some(self.name()).filter(|n| !n.is_empty())
        } else {
            self.explicit_name()
        };
        if let Some(name) = name {
            fields.push((FIELD_NAME.to_string(), name.to_string()));
        }

        fields.push((
            FIELD_ENABLED.to_string(),
            if self.enabled_flag() { "yes" } else { "no" }.to_string(),
        ));

        if !self.types().is_empty() {
            let types = self
                .types()
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>();
            fields.push((FIELD_TYPES.to_string(), types.join(" ")));
        }

        for (key, values) in [
            (FIELD_URIS, self.uris()),
            (FIELD_SUITES, self.suites()),
            (FIELD_COMPONENTS, self.components()),
        ] {
            if !values.is_empty() {
                fields.push((key.to_string(), values.join(" ")));
            }
        }

        let mut rest = BTreeMap::new();

        for (key, value) in self.options() {
            rest.insert(key.clone(), value.clone());
        }
        if let Some(path) = self.signed_by() {
            rest.insert(FIELD_SIGNED_BY.to_string(), path.display().to_string());
        }
        if !self.comments().is_empty() {
            rest.insert(
                FIELD_COMMENTS.to_string(),
                // One comment per line so `#` inside a comment survives.
                self.comments()
                    .iter()
                    .map(|c| format!("# {}", c))
                    .collect::<Vec<_>>()
                    .join("\n "),
            );
        }
        if let Some(prefs) = self.prefs() {
            rest.insert(FIELD_PREFS.to_string(), prefs.display().to_string());
        }
        if let Some(mirror) = self.default_mirror() {
            rest.insert(FIELD_DEFAULT_MIRROR.to_string(), mirror.to_string());
        }
        for (key, value) in self.extra_fields() {
            rest.entry(key.clone()).or_insert_with(|| value.clone());
        }

        fields.extend(rest);

        fields
    }

    /// Obtain the structured format paragraph for this source.
    pub fn to_paragraph(&self) -> ControlParagraph {
        let mut paragraph = ControlParagraph::default();

        for (key, value) in self.ordered_fields(false) {
            paragraph.set_field_from_string(key, value);
        }

        paragraph
    }

    /// Render this source as a structured format paragraph.
    ///
    /// Every line ends with a newline. The terminating blank line is not included.
    pub fn to_structured(&self) -> String {
        self.to_paragraph().to_string()
    }

    /// Render this source in one-line format.
    ///
    /// Sources with both binary and source code types render as two lines.
    /// Sources with more than one URI or suite cannot be expressed in this format.
    ///
    /// The `deb-src` line follows [Source::sourcecode_enabled], not the
    /// source's enabled flag. A disabled structured source with both types
    /// therefore renders a commented `deb` line and an active `deb-src` line.
    pub fn to_legacy(&self) -> Result<String, RenderError> {
        if self.prefs().is_some() {
            return Err(RenderError::PrefsRequireStructured(self.ident().to_string()));
        }

        for (field, values) in [("uris", self.uris()), ("suites", self.suites())] {
            if values.len() > 1 {
                return Err(RenderError::TooManyValues {
                    ident: self.ident().to_string(),
                    field,
                });
            }
            if values.is_empty() {
                return Err(RenderError::MissingValue {
                    ident: self.ident().to_string(),
                    field,
                });
            }
        }

        if !self.extra_fields().is_empty() || self.default_mirror().is_some() {
            warn!(
                "source {} has fields one-line format cannot express; they are omitted",
                self.ident()
            );
        }

        let twin = self.twin_source() || self.types().len() > 1;

        let first_type = if twin || self.types().contains(&SourceType::Binary) {
            SourceType::Binary
        } else {
            self.types()
                .iter()
                .next()
                .copied()
                .unwrap_or(SourceType::Binary)
        };

        let mut output = self.legacy_line(first_type, self.enabled());

        if twin {
            output.push('\n');
            output.push_str(&self.legacy_line(SourceType::SourceCode, self.sourcecode_enabled()));
        }

        Ok(output)
    }

    fn legacy_options(&self) -> Vec<String> {
        OPTION_ALIASES
            .iter()
            .filter_map(|(short, long)| {
                let value = if *long == FIELD_SIGNED_BY {
                    self.signed_by().map(|p| p.display().to_string())
                } else {
                    self.options().get(*long).cloned()
                }?;

                let values = value.split_whitespace().collect::<Vec<_>>();
                if values.is_empty() {
                    None
                } else {
                    Some(format!("{}={}", short, values.join(",")))
                }
            })
            .collect()
    }

    fn legacy_line(&self, source_type: SourceType, enabled: bool) -> String {
        let mut parts = vec![source_type.to_string()];

        let options = self.legacy_options();
        if !options.is_empty() {
            parts.push(format!("[{}]", options.join(" ")));
        }

        // Callers verified exactly one URI and suite exist.
        parts.extend(self.uris().iter().take(1).cloned());
        parts.extend(self.suites().iter().take(1).cloned());
        parts.extend(self.components().iter().cloned());

        let mut line = format!("{}{} ", if enabled { "" } else { "# " }, parts.join(" "));

        let mut metadata = vec![];
        if !self.name().is_empty() {
            metadata.push(format!("{}: {}", FIELD_NAME, self.name()));
        }
        if !self.ident().is_empty() {
            metadata.push(format!("{}: {}", FIELD_IDENT, self.ident()));
        }
        metadata.extend(self.comments().iter().cloned());

        if !metadata.is_empty() {
            let comment = metadata
                .iter()
                .map(|m| format!("# {}", m))
                .collect::<Vec<_>>()
                .join(" ");
            line.push_str(&format!(" #{}", comment));
        }

        line.trim_end().to_string()
    }

    /// Render a human readable summary of this source.
    pub fn to_ui(&self) -> String {
        let mut output = format!("{}:\n", self.ident());

        for (key, value) in self.ordered_fields(true) {
            if UI_SKIP_FIELDS.contains(&key.as_str()) {
                continue;
            }

            let key = UI_FIELD_NAMES
                .iter()
                .find(|(field, _)| *field == key)
                .map(|(_, display)| display.to_string())
                .unwrap_or(key);

            output.push_str(&format!("{}: {}\n", key, value));
        }

        output
    }
}
