use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

pub const MAX_LABEL_LEN: usize = 64;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("static regex"));
static VALID_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]{0,63}$").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid relation label {raw:?}")]
pub struct InvalidLabel {
    pub raw: String,
}

/// A relation name reduced to `^[A-Z][A-Z0-9_]{0,63}$`.
///
/// Labels come from untrusted extraction output. Anything that does not
/// normalize into that shape is rejected rather than escaped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationLabel(String);

impl RelationLabel {
    /// Normalize a free-form relation name: runs of non-alphanumeric
    /// characters become `_`, surrounding `_` are trimmed, then upper-cased.
    pub fn parse(raw: &str) -> Result<Self, InvalidLabel> {
        let replaced = NON_ALNUM.replace_all(raw.trim(), "_");
        let normalized = replaced.trim_matches('_').to_ascii_uppercase();

        if !VALID_LABEL.is_match(&normalized) {
            return Err(InvalidLabel {
                raw: raw.to_string(),
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(RelationLabel::parse("works for").unwrap().as_str(), "WORKS_FOR");
        assert_eq!(RelationLabel::parse("  acquired! ").unwrap().as_str(), "ACQUIRED");
        assert_eq!(RelationLabel::parse("located-in").unwrap().as_str(), "LOCATED_IN");
        assert_eq!(RelationLabel::parse("CEO_of").unwrap().as_str(), "CEO_OF");
    }

    #[test]
    fn test_injection_is_neutralized() {
        let label = RelationLabel::parse("KNOWS]->(x) DETACH DELETE x //").unwrap();
        assert_eq!(label.as_str(), "KNOWS_X_DETACH_DELETE_X");
    }

    #[test]
    fn test_rejects_unusable_labels() {
        assert!(RelationLabel::parse("").is_err());
        assert!(RelationLabel::parse("---").is_err());
        assert!(RelationLabel::parse("2nd_largest").is_err());
        assert!(RelationLabel::parse("日本").is_err());
        assert!(RelationLabel::parse(&"a".repeat(MAX_LABEL_LEN + 1)).is_err());
        assert!(RelationLabel::parse(&"a".repeat(MAX_LABEL_LEN)).is_ok());
    }
}
