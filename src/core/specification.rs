use std::collections::HashMap;
use std::sync::OnceLock;

use indexmap::IndexSet;
use regex::Regex;

use crate::error::BindingError;

/// `{{` and `}}` escape a brace, anything else between braces is a field.
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{|\}\}|\{([^{}]*)\}").expect("placeholder pattern is valid"))
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    /// Index into `Specification::parameters`.
    Placeholder(usize),
}

/// Circuit description text with `{name}` placeholders.
///
/// Parameters are kept in order of first occurrence in the text; a parameter
/// vector binds positionally against that order. The text is tokenized once
/// at parse time and never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Specification {
    text: String,
    parameters: IndexSet<String>,
    segments: Vec<Segment>,
}

impl Specification {
    /// Tokenize `text`.
    ///
    /// A `:format` or `!conversion` suffix inside braces is not part of the
    /// name. Empty `{}` is kept as literal text and does not declare a
    /// parameter. No other syntax is validated.
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut parameters = IndexSet::new();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in placeholder_pattern().captures_iter(&text) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            literal.push_str(&text[last..whole.start]);
            last = whole.end;

            let Some(field) = caps.get(1) else {
                // escaped brace: keep one of the pair
                literal.push_str(&text[whole.start..whole.start + 1]);
                continue;
            };

            let field = field.as_str();
            let name = field.split([':', '!']).next().unwrap_or_default();
            if name.is_empty() {
                literal.push_str(&text[whole]);
                continue;
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            let (index, _) = parameters.insert_full(name.to_string());
            segments.push(Segment::Placeholder(index));
        }

        literal.push_str(&text[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        tracing::debug!(
            count = parameters.len(),
            parameters = ?parameters,
            "parsed circuit specification"
        );

        Self {
            text,
            parameters,
            segments,
        }
    }

    /// Raw text as given to [`Specification::parse`].
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &IndexSet<String> {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.parameters.get_index_of(name)
    }

    /// Substitute `values` positionally, one per entry of [`parameters`](Self::parameters).
    pub fn bind(&self, values: &[f64]) -> Result<String, BindingError> {
        if values.len() != self.parameters.len() {
            return Err(BindingError::CountMismatch {
                expected: self.parameters.len(),
                received: values.len(),
                names: self.parameters.iter().cloned().collect(),
            });
        }
        self.render(|index| Ok(values[index]))
    }

    /// Substitute values looked up by placeholder name. Extra entries are ignored.
    pub fn bind_named(&self, values: &HashMap<String, f64>) -> Result<String, BindingError> {
        self.render(|index| {
            let name = &self.parameters[index];
            values
                .get(name)
                .copied()
                .ok_or_else(|| BindingError::MissingValue { name: name.clone() })
        })
    }

    fn render<F>(&self, value_of: F) -> Result<String, BindingError>
    where
        F: Fn(usize) -> Result<f64, BindingError>,
    {
        let mut out = String::with_capacity(self.text.len() + 8 * self.parameters.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(index) => out.push_str(&format_value(value_of(*index)?)),
            }
        }
        Ok(out)
    }
}

/// Shortest scientific notation that parses back to the same `f64`.
pub fn format_value(value: f64) -> String {
    format!("{value:e}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_follow_first_occurrence() {
        let spec = Specification::parse("M1 d g s b nmos w={w1} l={l} \nM2 d g s b nmos w={w2} l={l}");
        let names: Vec<&str> = spec.parameters().iter().map(String::as_str).collect();
        assert_eq!(names, ["w1", "l", "w2"]);
        assert_eq!(spec.index_of("w2"), Some(2));
        assert_eq!(spec.index_of("missing"), None);
    }

    #[test]
    fn escapes_and_empty_fields_are_literal() {
        let spec = Specification::parse(".func f(x) {{x*2}} {} R1 a b {r:.3}");
        assert_eq!(spec.len(), 1);
        let text = spec.bind(&[1500.0]).unwrap();
        assert_eq!(text, ".func f(x) {x*2} {} R1 a b 1.5e3");
    }

    #[test]
    fn conversion_suffix_is_not_part_of_the_name() {
        let spec = Specification::parse("C1 a 0 {c!r} C2 b 0 {c}");
        assert_eq!(spec.len(), 1);
        assert_eq!(spec.bind(&[1e-12]).unwrap(), "C1 a 0 1e-12 C2 b 0 1e-12");
    }

    #[test]
    fn bound_values_round_trip_exactly() {
        let spec = Specification::parse("{a} {b} {c}");
        let values = [0.1 + 0.2, -3.3e-7, 1.0 / 3.0];
        let text = spec.bind(&values).unwrap();
        let parsed: Vec<f64> = text.split(' ').map(|v| v.parse().unwrap()).collect();
        assert_eq!(parsed, values);
    }

    #[test]
    fn count_mismatch_reports_expected_names() {
        let spec = Specification::parse("R1 a b {r1}\nR2 b c {r2}");
        let err = spec.bind(&[1.0]).unwrap_err();
        assert_eq!(
            err,
            BindingError::CountMismatch {
                expected: 2,
                received: 1,
                names: vec!["r1".into(), "r2".into()],
            }
        );
        assert!(err.to_string().contains("r1, r2"));
    }

    #[test]
    fn bind_named_requires_every_placeholder() {
        let spec = Specification::parse("V1 in 0 {vdd} R1 in out {r}");
        let mut values = HashMap::from([("vdd".to_string(), 1.8), ("unused".to_string(), 0.0)]);
        assert!(matches!(
            spec.bind_named(&values),
            Err(BindingError::MissingValue { name }) if name == "r"
        ));

        values.insert("r".into(), 1e3);
        assert_eq!(spec.bind_named(&values).unwrap(), "V1 in 0 1.8e0 R1 in out 1e3");
    }

    #[test]
    fn text_without_placeholders_binds_to_itself() {
        let spec = Specification::parse("* empty deck\n.end");
        assert!(spec.is_empty());
        assert_eq!(spec.bind(&[]).unwrap(), "* empty deck\n.end");
    }
}
