//! Filter expression builder for flowthings queries
//!
//! Builds predicates over record fields and renders them to the platform's
//! textual filter grammar, e.g. `(temp > 30) && (EXISTS location)`.

use std::fmt;

use crate::error::{Error, Result};
use crate::literal::{f32_to_f64, render_number, Literal, Regex};
use crate::member::Member;

/// Relational comparison, shared by field and age predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        };
        f.write_str(op)
    }
}

/// Operator of a [`Filter::Binary`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Compare(Comparison),
    /// `=~`
    Matches,
}

impl From<Comparison> for Operator {
    fn from(cmp: Comparison) -> Self {
        Operator::Compare(cmp)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Compare(cmp) => fmt::Display::fmt(cmp, f),
            Operator::Matches => f.write_str("=~"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOperator {
    In,
    Contains,
}

impl fmt::Display for ListOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListOperator::In => f.write_str("IN"),
            ListOperator::Contains => f.write_str("CONTAINS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => f.write_str("&&"),
            LogicalOperator::Or => f.write_str("||"),
        }
    }
}

/// Default distance unit for [`Member::within_miles`].
pub const DEFAULT_UNIT: &str = "MILES";

/// Center of a geo-radius search.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Coordinates(Vec<f64>),
    Zip(String),
}

impl Location {
    /// A coordinate sequence, usually `[lat, lon]`. Must be non-empty and
    /// finite.
    pub fn coordinates(coords: impl IntoIterator<Item = f64>) -> Result<Self> {
        let coords: Vec<f64> = coords.into_iter().collect();
        if coords.is_empty() {
            return Err(Error::InvalidArgument(
                "coordinates must not be empty".to_string(),
            ));
        }
        if let Some(bad) = coords.iter().find(|c| !c.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "coordinates must be finite, got {}",
                bad
            )));
        }
        Ok(Location::Coordinates(coords))
    }

    pub fn zip(zip: impl fmt::Display) -> Self {
        Location::Zip(zip.to_string())
    }

    /// Build a location from optional coordinates and zip code; exactly one
    /// of them must be given.
    pub fn from_parts(coords: Option<Vec<f64>>, zip: Option<String>) -> Result<Self> {
        match (coords, zip) {
            (Some(coords), None) => Location::coordinates(coords),
            (None, Some(zip)) => Ok(Location::Zip(zip)),
            (Some(_), Some(_)) => Err(Error::InvalidArgument(
                "location takes either coordinates or a zip code, not both".to_string(),
            )),
            (None, None) => Err(Error::InvalidArgument(
                "location requires coordinates or a zip code".to_string(),
            )),
        }
    }
}

impl Location {
    /// Text between the brackets of `OF [..]`. Coordinates built directly
    /// through the enum variant are checked here as well.
    fn render(&self) -> Result<String> {
        match self {
            Location::Coordinates(coords) if coords.is_empty() => Err(Error::InvalidArgument(
                "coordinates must not be empty".to_string(),
            )),
            Location::Coordinates(coords) => {
                let parts = coords
                    .iter()
                    .map(|c| finite_number(*c, "coordinate"))
                    .collect::<Result<Vec<_>>>()?;
                Ok(parts.join(","))
            }
            Location::Zip(zip) => Ok(format!("ZIP={}", zip)),
        }
    }
}

fn finite_number(n: f64, what: &str) -> Result<String> {
    if n.is_finite() {
        Ok(render_number(n))
    } else {
        Err(Error::InvalidPrimitive(format!("{} {}", what, n)))
    }
}

/// A positive duration in milliseconds, the operand of age predicates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Millis(f64);

impl Millis {
    pub fn new(ms: f64) -> Result<Self> {
        if ms.is_finite() && ms > 0.0 {
            Ok(Millis(ms))
        } else {
            Err(Error::InvalidArgument(format!(
                "age must be a number greater than 0, got {}",
                ms
            )))
        }
    }

    pub fn get(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_number(self.0))
    }
}

/// Conversion into a validated [`Millis`].
pub trait IntoMillis {
    fn into_millis(self) -> Result<Millis>;
}

macro_rules! into_millis_as_f64 {
    ($($t:ty),*) => {
        $(
            impl IntoMillis for $t {
                fn into_millis(self) -> Result<Millis> {
                    Millis::new(self as f64)
                }
            }
        )*
    };
}

into_millis_as_f64!(i32, i64, u32, u64, usize, f64);

impl IntoMillis for f32 {
    fn into_millis(self) -> Result<Millis> {
        Millis::new(f32_to_f64(self))
    }
}

impl IntoMillis for Millis {
    fn into_millis(self) -> Result<Millis> {
        Ok(self)
    }
}

impl IntoMillis for std::time::Duration {
    fn into_millis(self) -> Result<Millis> {
        Millis::new(self.as_millis() as f64)
    }
}

impl IntoMillis for chrono::Duration {
    fn into_millis(self) -> Result<Millis> {
        Millis::new(self.num_milliseconds() as f64)
    }
}

/// A filter expression node.
///
/// Nodes are immutable once built; combine them with [`Filter::and`],
/// [`Filter::or`] and [`not`], and turn them into query text with
/// [`Filter::render`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Binary {
        member: Member,
        operator: Operator,
        operand: Literal,
    },
    List {
        member: Member,
        operator: ListOperator,
        operands: Vec<Literal>,
    },
    Within {
        member: Member,
        radius: f64,
        unit: String,
        location: Location,
    },
    Exists(Member),
    Matches(Regex),
    Has(String),
    Not(Box<Filter>),
    Logical {
        left: Box<Filter>,
        operator: LogicalOperator,
        right: Box<Filter>,
    },
    Age {
        member: Option<Member>,
        comparison: Comparison,
        millis: Millis,
    },
}

impl Filter {
    pub fn and(self, other: Filter) -> Filter {
        Filter::Logical {
            left: Box::new(self),
            operator: LogicalOperator::And,
            right: Box::new(other),
        }
    }

    pub fn or(self, other: Filter) -> Filter {
        Filter::Logical {
            left: Box::new(self),
            operator: LogicalOperator::Or,
            right: Box::new(other),
        }
    }

    /// Fold filters left-to-right with AND. `None` for an empty input.
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Option<Filter> {
        filters.into_iter().reduce(Filter::and)
    }

    /// Fold filters left-to-right with OR. `None` for an empty input.
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Option<Filter> {
        filters.into_iter().reduce(Filter::or)
    }

    /// Render to the platform filter grammar.
    ///
    /// Fails only when a [`Literal::Json`] operand holds a value that has no
    /// filter representation.
    pub fn render(&self) -> Result<String> {
        match self {
            Filter::Binary {
                member,
                operator,
                operand,
            } => Ok(format!("{} {} {}", member, operator, operand.render()?)),
            Filter::List {
                member,
                operator,
                operands,
            } => {
                let parts = operands
                    .iter()
                    .map(Literal::render)
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("{} {} [{}]", member, operator, parts.join(",")))
            }
            Filter::Within {
                member,
                radius,
                unit,
                location,
            } => {
                if *radius <= 0.0 {
                    return Err(Error::InvalidArgument(format!(
                        "radius must be greater than 0, got {}",
                        radius
                    )));
                }
                Ok(format!(
                    "{} WITHIN {} {} OF [{}]",
                    member,
                    finite_number(*radius, "radius")?,
                    unit,
                    location.render()?
                ))
            }
            Filter::Exists(member) => Ok(format!("EXISTS {}", member)),
            Filter::Matches(re) => Ok(format!("MATCHES {}", re)),
            Filter::Has(type_name) => Ok(format!("HAS {}", type_name)),
            Filter::Not(inner) => Ok(format!("NOT {}", inner.render()?)),
            Filter::Logical {
                left,
                operator,
                right,
            } => Ok(format!(
                "({}) {} ({})",
                left.render()?,
                operator,
                right.render()?
            )),
            Filter::Age {
                member: None,
                comparison,
                millis,
            } => Ok(format!("AGE {} {}", comparison, millis)),
            Filter::Age {
                member: Some(member),
                comparison,
                millis,
            } => Ok(format!("AGE({}) {} {}", member, comparison, millis)),
        }
    }
}

impl Member {
    fn binary(&self, operator: impl Into<Operator>, operand: impl Into<Literal>) -> Filter {
        Filter::Binary {
            member: self.clone(),
            operator: operator.into(),
            operand: operand.into(),
        }
    }

    pub fn eq(&self, value: impl Into<Literal>) -> Filter {
        self.binary(Comparison::Eq, value)
    }

    pub fn ne(&self, value: impl Into<Literal>) -> Filter {
        self.binary(Comparison::Ne, value)
    }

    pub fn gt(&self, value: impl Into<Literal>) -> Filter {
        self.binary(Comparison::Gt, value)
    }

    pub fn gte(&self, value: impl Into<Literal>) -> Filter {
        self.binary(Comparison::Gte, value)
    }

    pub fn lt(&self, value: impl Into<Literal>) -> Filter {
        self.binary(Comparison::Lt, value)
    }

    pub fn lte(&self, value: impl Into<Literal>) -> Filter {
        self.binary(Comparison::Lte, value)
    }

    /// Regex match against this field: `m =~ /pattern/flags`.
    pub fn re(&self, pattern: impl Into<String>, flags: impl Into<String>) -> Filter {
        self.binary(Operator::Matches, Regex::new(pattern, flags))
    }

    fn list<L: Into<Literal>>(
        &self,
        operator: ListOperator,
        values: impl IntoIterator<Item = L>,
    ) -> Filter {
        Filter::List {
            member: self.clone(),
            operator,
            operands: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Field value is one of `values`. An empty list renders as `[]`.
    pub fn is_in<L: Into<Literal>>(&self, values: impl IntoIterator<Item = L>) -> Filter {
        self.list(ListOperator::In, values)
    }

    /// Field (a list) contains `values`.
    pub fn contains<L: Into<Literal>>(&self, values: impl IntoIterator<Item = L>) -> Filter {
        self.list(ListOperator::Contains, values)
    }

    /// Geo-radius search around `location`. The radius must be finite and
    /// positive; this is checked when the filter is rendered.
    pub fn within(&self, radius: f64, unit: impl Into<String>, location: Location) -> Filter {
        Filter::Within {
            member: self.clone(),
            radius,
            unit: unit.into(),
            location,
        }
    }

    pub fn within_miles(&self, radius: f64, location: Location) -> Filter {
        self.within(radius, DEFAULT_UNIT, location)
    }
}

/// Age predicate factory; see [`age`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Age {
    member: Option<Member>,
}

impl Age {
    /// Scope the age predicate to a field. Chaining appends path segments:
    /// `age().field("a").field("b")` targets `a.b`.
    pub fn field(&self, name: impl AsRef<str>) -> Age {
        let member = match &self.member {
            None => Member::new(name.as_ref()),
            Some(parent) => parent.field(name),
        };
        Age {
            member: Some(member),
        }
    }

    fn compare(&self, comparison: Comparison, ms: impl IntoMillis) -> Result<Filter> {
        Ok(Filter::Age {
            member: self.member.clone(),
            comparison,
            millis: ms.into_millis()?,
        })
    }

    pub fn eq(&self, ms: impl IntoMillis) -> Result<Filter> {
        self.compare(Comparison::Eq, ms)
    }

    pub fn ne(&self, ms: impl IntoMillis) -> Result<Filter> {
        self.compare(Comparison::Ne, ms)
    }

    pub fn gt(&self, ms: impl IntoMillis) -> Result<Filter> {
        self.compare(Comparison::Gt, ms)
    }

    pub fn gte(&self, ms: impl IntoMillis) -> Result<Filter> {
        self.compare(Comparison::Gte, ms)
    }

    pub fn lt(&self, ms: impl IntoMillis) -> Result<Filter> {
        self.compare(Comparison::Lt, ms)
    }

    pub fn lte(&self, ms: impl IntoMillis) -> Result<Filter> {
        self.compare(Comparison::Lte, ms)
    }
}

/// Record-level age predicate factory. Use `.field(..)` to target a field.
pub fn age() -> Age {
    Age::default()
}

/// Field is present.
pub fn exists(member: impl Into<Member>) -> Filter {
    Filter::Exists(member.into())
}

/// Whole-record regex match.
pub fn matches(pattern: impl Into<String>, flags: impl Into<String>) -> Filter {
    Filter::Matches(Regex::new(pattern, flags))
}

/// Record carries the given type.
pub fn has(type_name: impl Into<String>) -> Filter {
    Filter::Has(type_name.into())
}

/// Negate a filter
pub fn not(filter: Filter) -> Filter {
    Filter::Not(Box::new(filter))
}

/// Combine filters with AND
pub fn and(filters: impl IntoIterator<Item = Filter>) -> Option<Filter> {
    Filter::all(filters)
}

/// Combine filters with OR
pub fn or(filters: impl IntoIterator<Item = Filter>) -> Option<Filter> {
    Filter::any(filters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::member;
    use serde_json::json;

    #[test]
    fn test_comparisons() {
        let m = member("foo");
        assert_eq!(m.eq(1).render().unwrap(), "foo == 1");
        assert_eq!(m.ne(1).render().unwrap(), "foo != 1");
        assert_eq!(m.gt(1).render().unwrap(), "foo > 1");
        assert_eq!(m.gte(1).render().unwrap(), "foo >= 1");
        assert_eq!(m.lt(1).render().unwrap(), "foo < 1");
        assert_eq!(m.lte(1).render().unwrap(), "foo <= 1");
    }

    #[test]
    fn test_regex_escapes_slash() {
        let f = member("foo").re("/foo", "i");
        assert_eq!(f.render().unwrap(), r"foo =~ /\/foo/i");
    }

    #[test]
    fn test_list_operators() {
        assert_eq!(member("foo").is_in([1, 2, 3]).render().unwrap(), "foo IN [1,2,3]");
        assert_eq!(
            member("foo").contains(["a", "b"]).render().unwrap(),
            "foo CONTAINS ['a','b']"
        );
        let empty: [i32; 0] = [];
        assert_eq!(member("foo").is_in(empty).render().unwrap(), "foo IN []");
    }

    #[test]
    fn test_list_rejects_invalid_operand_at_render() {
        let f = member("foo").is_in(vec![json!(1), json!({"x": 1})]);
        assert!(matches!(f.render(), Err(Error::InvalidPrimitive(_))));
    }

    #[test]
    fn test_within() {
        let coords = Location::coordinates([1.0, 2.0]).unwrap();
        assert_eq!(
            member("foo").within(5.0, "KM", coords).render().unwrap(),
            "foo WITHIN 5 KM OF [1,2]"
        );
        assert_eq!(
            member("foo").within(5.0, "KM", Location::zip(123)).render().unwrap(),
            "foo WITHIN 5 KM OF [ZIP=123]"
        );
        assert_eq!(
            member("loc")
                .within_miles(2.5, Location::zip("10001"))
                .render()
                .unwrap(),
            "loc WITHIN 2.5 MILES OF [ZIP=10001]"
        );
    }

    #[test]
    fn test_within_rejects_bad_radius() {
        let f = member("x").within(f64::NAN, "KM", Location::zip(1));
        assert!(matches!(f.render(), Err(Error::InvalidPrimitive(_))));
        let f = member("x").within(f64::INFINITY, "KM", Location::zip(1));
        assert!(f.render().is_err());
        let f = member("x").within(-3.0, "KM", Location::zip(1));
        assert!(matches!(f.render(), Err(Error::InvalidArgument(_))));
        let f = member("x").within(0.0, "KM", Location::zip(1));
        assert!(matches!(f.render(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_within_rejects_non_finite_coordinates() {
        assert!(matches!(
            Location::coordinates([f64::INFINITY, 2.0]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(Location::from_parts(Some(vec![f64::NAN]), None).is_err());

        // the variant can still be built by hand
        let f = member("x").within(1.0, "KM", Location::Coordinates(vec![1.0, f64::NAN]));
        assert!(matches!(f.render(), Err(Error::InvalidPrimitive(_))));
        let f = member("x").within(1.0, "KM", Location::Coordinates(Vec::new()));
        assert!(f.render().is_err());
    }

    #[test]
    fn test_f32_age_keeps_written_value() {
        let f = age().gt(0.1f32).unwrap();
        assert_eq!(f.render().unwrap(), "AGE > 0.1");
    }

    #[test]
    fn test_location_from_parts() {
        assert!(Location::from_parts(Some(vec![1.0]), None).is_ok());
        assert!(Location::from_parts(None, Some("1".into())).is_ok());
        assert!(Location::from_parts(Some(vec![1.0]), Some("1".into())).is_err());
        assert!(Location::from_parts(None, None).is_err());
        assert!(Location::coordinates(Vec::new()).is_err());
    }

    #[test]
    fn test_age() {
        assert_eq!(age().eq(123).unwrap().render().unwrap(), "AGE == 123");
        assert_eq!(age().lte(123).unwrap().render().unwrap(), "AGE <= 123");
        assert_eq!(
            age().field("field").gt(5).unwrap().render().unwrap(),
            "AGE(field) > 5"
        );
        assert_eq!(
            age().field("a").field("b").lt(7).unwrap().render().unwrap(),
            "AGE(a.b) < 7"
        );
    }

    #[test]
    fn test_age_rejects_non_positive() {
        assert!(matches!(age().eq(0), Err(Error::InvalidArgument(_))));
        assert!(age().gt(-5).is_err());
        assert!(age().gt(f64::NAN).is_err());
        assert!(age().gt(std::time::Duration::ZERO).is_err());
    }

    #[test]
    fn test_age_from_durations() {
        let f = age().lt(std::time::Duration::from_secs(60)).unwrap();
        assert_eq!(f.render().unwrap(), "AGE < 60000");
        let f = age().gte(chrono::Duration::minutes(1)).unwrap();
        assert_eq!(f.render().unwrap(), "AGE >= 60000");
    }

    #[test]
    fn test_prefix_filters() {
        assert_eq!(exists("foo").render().unwrap(), "EXISTS foo");
        assert_eq!(exists(member("foo")).render().unwrap(), "EXISTS foo");
        assert_eq!(matches("foo", "i").render().unwrap(), "MATCHES /foo/i");
        assert_eq!(matches("a/b", "").render().unwrap(), r"MATCHES /a\/b/");
        assert_eq!(has("foo").render().unwrap(), "HAS foo");
        assert_eq!(not(member("foo").eq(1)).render().unwrap(), "NOT foo == 1");
    }

    #[test]
    fn test_logical() {
        let f = member("foo").eq(1).and(member("bar").eq(2));
        assert_eq!(f.render().unwrap(), "(foo == 1) && (bar == 2)");
        let f = member("foo").eq(1).or(member("bar").eq(2));
        assert_eq!(f.render().unwrap(), "(foo == 1) || (bar == 2)");
    }

    #[test]
    fn test_not_of_logical_keeps_inner_parens() {
        let f = not(member("a").eq(1).or(member("b").eq(2)));
        assert_eq!(f.render().unwrap(), "NOT (a == 1) || (b == 2)");
    }

    #[test]
    fn test_fold_matches_explicit_and() {
        let f1 = member("a").eq(1);
        let f2 = member("b").eq(2);
        let f3 = member("c").eq(3);
        let folded = Filter::all([f1.clone(), f2.clone(), f3.clone()]).unwrap();
        assert_eq!(folded, f1.and(f2).and(f3));
        assert_eq!(
            folded.render().unwrap(),
            "((a == 1) && (b == 2)) && (c == 3)"
        );
        assert!(Filter::all(Vec::new()).is_none());
    }

    #[test]
    fn test_or_fold() {
        let f = or([member("a").eq(1), member("b").eq(2)]).unwrap();
        assert_eq!(f.render().unwrap(), "(a == 1) || (b == 2)");
        let f = and([member("a").eq(1)]).unwrap();
        assert_eq!(f.render().unwrap(), "a == 1");
    }
}
