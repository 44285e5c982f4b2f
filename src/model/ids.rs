//! Stable identifiers for model entities.
//!
//! Every descriptor entity carries one or more identifiers that must stay
//! stable across regeneration so the platform can match artifacts to its
//! internal registry. They are lowercase hyphenated UUIDs (`8-4-4-4-12`).

use uuid::Uuid;

/// A stable entity identifier, lowercase hyphenated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StableId(String);

impl StableId {
    /// Mint a fresh v4 identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().as_hyphenated().to_string())
    }

    /// Wrap an existing identifier without validating it. Use
    /// [`StableId::is_well_formed`] first when the source is untrusted.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `raw` is a lowercase hex `8-4-4-4-12` group string.
    pub fn is_well_formed(raw: &str) -> bool {
        let groups: Vec<&str> = raw.split('-').collect();
        if groups.len() != 5 {
            return false;
        }
        let widths = [8usize, 4, 4, 4, 12];
        groups.iter().zip(widths).all(|(g, w)| {
            g.len() == w
                && g.chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        })
    }
}

impl std::fmt::Display for StableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for StableId {
    fn default() -> Self {
        Self::generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_well_formed() {
        let id = StableId::generate();
        assert!(StableId::is_well_formed(id.as_str()), "{id}");
    }

    #[test]
    fn rejects_uppercase_and_bad_shapes() {
        assert!(StableId::is_well_formed(
            "550e8400-e29b-41d4-a716-446655440000"
        ));
        assert!(!StableId::is_well_formed(
            "550E8400-e29b-41d4-a716-446655440000"
        ));
        assert!(!StableId::is_well_formed("550e8400-e29b-41d4-a716"));
        assert!(!StableId::is_well_formed(
            "550e8400e29b-41d4-a716-446655440000-00"
        ));
    }
}
