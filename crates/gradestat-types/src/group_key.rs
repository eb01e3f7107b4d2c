//! Grouping keys.
//!
//! Keys are hashable and totally ordered so accumulator tables can be
//! finalized in a deterministic order.

use std::fmt;

/// One component of a grouping key.
///
/// Buckets order by `rank` (their threshold position) rather than by label,
/// so `"0-4" < "5-9" < "10+"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Int(i64),
    Bucket { rank: usize, label: String },
    Text(String),
}

impl KeyPart {
    pub fn bucket(rank: usize, label: impl Into<String>) -> Self {
        KeyPart::Bucket {
            rank,
            label: label.into(),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Int(i) => write!(f, "{}", i),
            KeyPart::Bucket { label, .. } => f.write_str(label),
            KeyPart::Text(s) => f.write_str(s),
        }
    }
}

/// A possibly composite grouping key. Composite keys render as `(a, b)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(pub Vec<KeyPart>);

impl GroupKey {
    pub fn single(part: KeyPart) -> Self {
        GroupKey(vec![part])
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Rendered key, as used for lookups and output.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [only] = self.0.as_slice() {
            return write!(f, "{}", only);
        }
        f.write_str("(")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", part)?;
        }
        f.write_str(")")
    }
}
