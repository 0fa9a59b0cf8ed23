//! Field paths used as filter operands.

use std::fmt;

/// A dotted reference to a field within a platform record.
///
/// Segments are joined with `.` as-is; no escaping or identifier validation
/// is applied.
///
/// # Example
/// ```
/// use flowthings::member;
///
/// let m = member("elems").field("temp").field("value");
/// assert_eq!(m.to_string(), "elems.temp.value");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    path: String,
}

impl Member {
    pub fn new(name: impl Into<String>) -> Self {
        Self { path: name.into() }
    }

    /// Navigate to a named sub-field.
    pub fn field(&self, name: impl AsRef<str>) -> Member {
        Member {
            path: format!("{}.{}", self.path, name.as_ref()),
        }
    }

    /// Navigate to an indexed element. Indices render like any other segment.
    pub fn index(&self, index: impl fmt::Display) -> Member {
        Member {
            path: format!("{}.{}", self.path, index),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl From<&str> for Member {
    fn from(name: &str) -> Self {
        Member::new(name)
    }
}

impl From<String> for Member {
    fn from(name: String) -> Self {
        Member::new(name)
    }
}

impl From<&Member> for Member {
    fn from(member: &Member) -> Self {
        member.clone()
    }
}

/// Create a member reference rooted at `name`.
pub fn member(name: impl Into<String>) -> Member {
    Member::new(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_renders_name() {
        assert_eq!(member("foo").to_string(), "foo");
        assert_eq!(member("foo").as_str(), "foo");
    }

    #[test]
    fn test_nested_fields() {
        let root = member("a");
        let nested = root.field("b").field("c");
        assert_eq!(nested.to_string(), "a.b.c");
        // parent is untouched
        assert_eq!(root.to_string(), "a");
    }

    #[test]
    fn test_index_segment() {
        assert_eq!(member("tags").index(0).to_string(), "tags.0");
        assert_eq!(member("elems").index("x").field("y").to_string(), "elems.x.y");
    }

    #[test]
    fn test_no_escaping() {
        assert_eq!(member("a b").field("c.d").to_string(), "a b.c.d");
    }
}
