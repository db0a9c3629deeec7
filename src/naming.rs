//! Target-name → source-name translation.
//!
//! Target names are separator-delimited (`client_x`); source names follow the
//! medial-capitalization convention (`clientX`). Translation only runs in that
//! direction: medial-caps names do not reverse unambiguously (`tiltX` could be
//! `tilt_x` or `tilt_X`), so fields that need a different source name carry an
//! explicit override instead.

use serde::{Deserialize, Serialize};

/// Separator between segments of a target-side name.
pub const SEPARATOR: char = '_';

/// How a registry derives source names from target names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Convention {
    /// `client_x` → `clientX`
    #[default]
    MedialCaps,
    /// source name = target name
    Verbatim,
}

impl Convention {
    pub fn source_name(self, target: &str) -> String {
        match self {
            Convention::MedialCaps => to_medial_caps(target),
            Convention::Verbatim => target.to_owned(),
        }
    }
}

/// Translate with the default [`SEPARATOR`].
pub fn to_medial_caps(name: &str) -> String {
    to_medial_caps_with(name, SEPARATOR)
}

/// Leading and trailing separator runs are preserved verbatim; a name made up
/// only of separators comes back unchanged.
pub fn to_medial_caps_with(name: &str, separator: char) -> String {
    let body = name.trim_matches(separator);
    if body.is_empty() {
        return name.to_owned();
    }

    let leading = &name[..name.len() - name.trim_start_matches(separator).len()];
    let trailing = &name[name.trim_end_matches(separator).len()..];

    let mut out = String::with_capacity(name.len());
    out.push_str(leading);
    for (i, segment) in body.split(separator).enumerate() {
        if i == 0 {
            out.push_str(segment);
        } else {
            push_capitalized(&mut out, segment);
        }
    }
    out.push_str(trailing);
    out
}

/// Title-case a segment: a cased character following another cased character
/// is lowercased, any other cased character is uppercased (`HTML` → `Html`,
/// `x2y` → `X2Y`).
fn push_capitalized(out: &mut String, segment: &str) {
    let mut after_cased = false;
    for c in segment.chars() {
        let cased = c.is_lowercase() || c.is_uppercase();
        if !cased {
            out.push(c);
        } else if after_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        after_cased = cased;
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn basic_names() {
        assert_eq!(to_medial_caps("x"), "x");
        assert_eq!(to_medial_caps("client_x"), "clientX");
        assert_eq!(to_medial_caps("default_prevented"), "defaultPrevented");
        assert_eq!(to_medial_caps("got_pointer_capture"), "gotPointerCapture");
    }

    #[test]
    fn separator_runs_survive() {
        assert_eq!(to_medial_caps("_private_field"), "_privateField");
        assert_eq!(to_medial_caps("__dunder__"), "__dunder__");
        assert_eq!(to_medial_caps("type_"), "type_");
        assert_eq!(to_medial_caps("__a_b__"), "__aB__");
    }

    #[test]
    fn only_separators_unchanged() {
        assert_eq!(to_medial_caps(""), "");
        assert_eq!(to_medial_caps("_"), "_");
        assert_eq!(to_medial_caps("____"), "____");
    }

    #[test]
    fn empty_internal_segments() {
        assert_eq!(to_medial_caps("a__b"), "aB");
    }

    #[test]
    fn later_segments_are_title_cased() {
        assert_eq!(to_medial_caps("inner_HTML"), "innerHtml");
        assert_eq!(to_medial_caps("tilt_x2"), "tiltX2");
        assert_eq!(to_medial_caps("a_x2y"), "aX2Y");
        assert_eq!(to_medial_caps("on_dbl-click"), "onDbl-Click");
        // the first segment is kept as written
        assert_eq!(to_medial_caps("HTML_for"), "HTMLFor");
    }

    #[test]
    fn custom_separator() {
        assert_eq!(to_medial_caps_with("-data-set-", '-'), "-dataSet-");
    }

    #[test]
    fn verbatim_convention() {
        assert_eq!(Convention::Verbatim.source_name("class_name"), "class_name");
        assert_eq!(Convention::MedialCaps.source_name("class_name"), "className");
    }

    proptest! {
        #[test]
        fn translation_is_deterministic(name in "_{0,2}[a-z][a-z0-9]{0,6}(_[a-z][a-z0-9]{0,6}){0,4}_{0,2}") {
            prop_assert_eq!(to_medial_caps(&name), to_medial_caps(&name));
        }

        #[test]
        fn well_formed_names_lose_internal_separators(
            lead in "_{0,3}",
            body in "[a-z][a-z0-9]{0,6}(_[a-z][a-z0-9]{0,6}){0,4}",
            trail in "_{0,3}",
        ) {
            let name = format!("{lead}{body}{trail}");
            let out = to_medial_caps(&name);
            prop_assert!(out.starts_with(&lead));
            prop_assert!(out.ends_with(&trail));
            let middle = &out[lead.len()..out.len() - trail.len()];
            prop_assert!(!middle.contains(SEPARATOR));
            prop_assert_eq!(middle.to_lowercase(), body.replace(SEPARATOR, ""));
        }
    }
}
