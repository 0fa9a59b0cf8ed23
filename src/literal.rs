//! Literal operands and their filter-grammar text form.

use std::fmt;

use serde_json::{Number, Value};

use crate::error::{Error, Result};
use crate::member::Member;

/// A regex literal, rendered as `/pattern/flags`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regex {
    pub pattern: String,
    pub flags: String,
}

impl Regex {
    pub fn new(pattern: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            flags: flags.into(),
        }
    }
}

impl fmt::Display for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern.replace('/', "\\/"), self.flags)
    }
}

/// A value usable as a predicate operand.
///
/// `Json` holds a dynamic value whose validity is only known when the
/// filter is rendered: strings, numbers and booleans are accepted, anything
/// else is rejected with [`Error::InvalidPrimitive`].
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Number(Number),
    Bool(bool),
    Member(Member),
    Regex(Regex),
    Json(Value),
}

impl Literal {
    pub fn render(&self) -> Result<String> {
        match self {
            Literal::Str(s) => Ok(quote(s)),
            Literal::Number(n) => Ok(n.to_string()),
            Literal::Bool(b) => Ok(render_bool(*b).to_string()),
            Literal::Member(m) => Ok(m.to_string()),
            Literal::Regex(re) => Ok(re.to_string()),
            Literal::Json(value) => match value {
                Value::String(s) => Ok(quote(s)),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(render_bool(*b).to_string()),
                other => Err(Error::InvalidPrimitive(other.to_string())),
            },
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "\\'"))
}

fn render_bool(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Render a plain number the way the filter grammar expects (`5`, `1.5`).
pub(crate) fn render_number(n: f64) -> String {
    n.to_string()
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Str(s)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

macro_rules! literal_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Literal {
                fn from(n: $t) -> Self {
                    Literal::Number(Number::from(n))
                }
            }
        )*
    };
}

literal_from_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        // NaN and infinities have no JSON form and fail at render time
        match Number::from_f64(n) {
            Some(n) => Literal::Number(n),
            None => Literal::Json(Value::Null),
        }
    }
}

impl From<f32> for Literal {
    fn from(n: f32) -> Self {
        Literal::from(f32_to_f64(n))
    }
}

/// Widen through the shortest decimal form, so `0.1f32` stays `0.1`.
pub(crate) fn f32_to_f64(n: f32) -> f64 {
    n.to_string().parse().unwrap_or(f64::NAN)
}

impl From<Number> for Literal {
    fn from(n: Number) -> Self {
        Literal::Number(n)
    }
}

impl From<Member> for Literal {
    fn from(m: Member) -> Self {
        Literal::Member(m)
    }
}

impl From<&Member> for Literal {
    fn from(m: &Member) -> Self {
        Literal::Member(m.clone())
    }
}

impl From<Regex> for Literal {
    fn from(re: Regex) -> Self {
        Literal::Regex(re)
    }
}

impl From<Value> for Literal {
    fn from(value: Value) -> Self {
        Literal::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::member;
    use serde_json::json;

    #[test]
    fn test_bool_rendering() {
        assert_eq!(Literal::from(true).render().unwrap(), "true");
        assert_eq!(Literal::from(false).render().unwrap(), "false");
        assert_eq!(Literal::from(json!(true)).render().unwrap(), "true");
    }

    #[test]
    fn test_string_quoting() {
        assert_eq!(Literal::from("foo").render().unwrap(), "'foo'");
        assert_eq!(Literal::from("it's").render().unwrap(), r"'it\'s'");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(Literal::from(42).render().unwrap(), "42");
        assert_eq!(Literal::from(-3i64).render().unwrap(), "-3");
        assert_eq!(Literal::from(1.5).render().unwrap(), "1.5");
    }

    #[test]
    fn test_f32_renders_as_written() {
        assert_eq!(Literal::from(0.1f32).render().unwrap(), "0.1");
        assert_eq!(Literal::from(2.5f32).render().unwrap(), "2.5");
        assert!(Literal::from(f32::NAN).render().is_err());
    }

    #[test]
    fn test_member_and_regex() {
        assert_eq!(Literal::from(member("a").field("b")).render().unwrap(), "a.b");
        assert_eq!(Literal::from(Regex::new("a/b", "gi")).render().unwrap(), r"/a\/b/gi");
    }

    #[test]
    fn test_invalid_primitives() {
        for value in [json!(null), json!([1, 2]), json!({"a": 1})] {
            let err = Literal::from(value).render().unwrap_err();
            assert!(matches!(err, Error::InvalidPrimitive(_)));
        }
        assert!(Literal::from(f64::NAN).render().is_err());
    }
}
