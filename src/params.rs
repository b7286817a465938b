//! Build-parameter cleanup and query encoding.
//!
//! Cleanup strips blanks and comments; no character encoding happens at that
//! step. All encoding happens in [`encode_query_string`].

use crate::urls::encode_value;
use std::io::{self, BufRead};

/// Where a run's parameter lines come from.
#[derive(Clone, Debug)]
pub enum ParameterSource {
    /// Raw multi-line text entered with the trigger step.
    Inline(String),
    /// Lines loaded from an external parameter file.
    Lines(Vec<String>),
}

impl Default for ParameterSource {
    fn default() -> Self {
        Self::Inline(String::new())
    }
}

impl ParameterSource {
    /// Read a line-oriented parameter resource in full.
    pub fn from_reader(reader: impl BufRead) -> io::Result<Self> {
        let lines = reader.lines().collect::<io::Result<Vec<_>>>()?;
        Ok(Self::Lines(lines))
    }

    pub(crate) fn raw_lines(&self) -> Vec<String> {
        match self {
            Self::Inline(text) => text.split('\n').map(str::to_owned).collect(),
            Self::Lines(lines) => lines.clone(),
        }
    }

    /// Whether this source makes the trigger count as locally parameterized.
    ///
    /// Only the raw inline text counts; file-loaded parameters do not switch
    /// the trigger from `/build` to `/buildWithParameters` on their own.
    pub(crate) fn counts_as_parameterized(&self) -> bool {
        match self {
            Self::Inline(text) => !text.is_empty(),
            Self::Lines(_) => false,
        }
    }
}

/// Drop blank and comment lines, preserving the order of the rest.
///
/// Blank means the exact strings `""` or `" "`; a two-space line survives.
/// Comment means the first character is `#`.
pub fn normalize_parameters<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .map(|line| line.as_ref().to_owned())
        .filter(|line| line != "" && line != " ")
        .filter(|line| !line.starts_with('#'))
        .collect()
}

/// Encode `key=value` pairs into a `&`-joined query string.
///
/// Each pair is split on every `=` and the pieces are encoded independently,
/// then rejoined with literal `=`. A value containing `=` therefore comes
/// back piecewise-encoded; kept for wire compatibility.
pub fn encode_query_string(parameters: &[String]) -> String {
    parameters
        .iter()
        .map(|parameter| {
            parameter
                .split('=')
                .map(encode_value)
                .collect::<Vec<_>>()
                .join("=")
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn normalization_drops_blanks_and_comments_in_order() {
        let cleaned = normalize_parameters([
            "first=1",
            "",
            " ",
            "# a comment",
            "#also a comment",
            "second=2",
        ]);
        assert_eq!(cleaned, owned(&["first=1", "second=2"]));
    }

    #[test]
    fn normalization_keeps_two_space_lines() {
        let cleaned = normalize_parameters(["  ", "a=b"]);
        assert_eq!(cleaned, owned(&["  ", "a=b"]));
    }

    #[test]
    fn simple_pairs_round_trip() {
        let encoded = encode_query_string(&owned(&["a=b", "c=d"]));
        assert_eq!(encoded, "a=b&c=d");
    }

    #[test]
    fn value_with_equals_is_split_and_rejoined() {
        let encoded = encode_query_string(&owned(&["a=b=c"]));
        assert_eq!(encoded, "a=b=c");
    }

    #[test]
    fn spaces_encode_as_percent_twenty() {
        let encoded = encode_query_string(&owned(&["msg=hello world"]));
        assert_eq!(encoded, "msg=hello%20world");
    }

    #[test]
    fn reserved_characters_are_encoded_per_piece() {
        let encoded = encode_query_string(&owned(&["q=a&b", "plus=1+1"]));
        assert_eq!(encoded, "q=a%26b&plus=1%2B1");
    }

    #[test]
    fn inline_source_splits_on_newlines() {
        let source = ParameterSource::Inline("a=1\n\nb=2".into());
        assert_eq!(source.raw_lines(), owned(&["a=1", "", "b=2"]));
        assert!(source.counts_as_parameterized());
    }

    #[test]
    fn empty_inline_source_is_not_parameterized() {
        assert!(!ParameterSource::default().counts_as_parameterized());
    }

    #[test]
    fn file_lines_do_not_flip_the_build_type() {
        let source = ParameterSource::Lines(owned(&["a=1"]));
        assert!(!source.counts_as_parameterized());
    }

    #[test]
    fn from_reader_collects_lines() {
        let source = ParameterSource::from_reader("a=1\n# skip\nb=2\n".as_bytes()).unwrap();
        assert_eq!(source.raw_lines(), owned(&["a=1", "# skip", "b=2"]));
    }
}
