use chrono::{NaiveDate, NaiveDateTime};
use std::cmp::Ordering;
use std::fmt;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const TIMESTAMP_FORMAT_SPACE: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single cell produced by a query or a derived view.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Column without a single non-null value.
    Null,
    Int,
    Float,
    Text,
    Date,
    Timestamp,
}

impl ValueType {
    /// Widen two column types into one that can hold both.
    pub fn unify(self, other: ValueType) -> ValueType {
        use ValueType::*;
        match (self, other) {
            (Null, t) | (t, Null) => t,
            (a, b) if a == b => a,
            (Int, Float) | (Float, Int) => Float,
            _ => Text,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Text => "text",
            ValueType::Date => "date",
            ValueType::Timestamp => "timestamp",
        }
    }
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Text(_) => ValueType::Text,
            Value::Date(_) => ValueType::Date,
            Value::Timestamp(_) => ValueType::Timestamp,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            _ => None,
        }
    }

    /// Parse `text` as a value of the given type. Empty text is always null.
    pub fn parse_as(text: &str, typ: ValueType) -> Option<Value> {
        if text.is_empty() {
            return Some(Value::Null);
        }
        match typ {
            ValueType::Null => None,
            ValueType::Int => text.parse().ok().map(Value::Int),
            ValueType::Float => text
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(Value::Float),
            ValueType::Text => Some(Value::Text(text.to_string())),
            ValueType::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(Value::Date),
            ValueType::Timestamp => parse_timestamp(text).map(Value::Timestamp),
        }
    }

    /// Guess the most specific value for a bare piece of text.
    ///
    /// A guess only stands when the value prints back as the same text, so
    /// `08123`, `+62` or `1.50` stay text.
    pub fn infer(text: &str) -> Value {
        const ORDER: [ValueType; 4] = [
            ValueType::Int,
            ValueType::Float,
            ValueType::Date,
            ValueType::Timestamp,
        ];
        ORDER
            .iter()
            .filter_map(|t| Value::parse_as(text, *t))
            .find(|v| v.prints_as(text))
            .unwrap_or_else(|| Value::Text(text.to_string()))
    }

    fn prints_as(&self, text: &str) -> bool {
        match self {
            Value::Timestamp(ts) => {
                ts.format(TIMESTAMP_FORMAT).to_string() == text
                    || ts.format(TIMESTAMP_FORMAT_SPACE).to_string() == text
            }
            v => v.to_string() == text,
        }
    }

    /// Ordering used by sorts: numbers compare across Int/Float, nulls sort last.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Greater,
            (_, Value::Null) => Ordering::Less,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Date(a), Value::Timestamp(b)) => a.and_hms_opt(0, 0, 0).cmp(&Some(*b)),
            (Value::Timestamp(a), Value::Date(b)) => Some(*a).cmp(&b.and_hms_opt(0, 0, 0)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => type_rank(a).cmp(&type_rank(b)),
            },
        }
    }

    /// Hashable identity used for grouping and distinct counting.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Int(n) => ValueKey::Int(*n),
            Value::Float(f) => ValueKey::Float(f.to_bits()),
            Value::Text(s) => ValueKey::Text(s.clone()),
            Value::Date(d) => ValueKey::Date(*d),
            Value::Timestamp(ts) => ValueKey::Timestamp(*ts),
        }
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Int(_) | Value::Float(_) => 0,
        Value::Date(_) | Value::Timestamp(_) => 1,
        Value::Text(_) => 2,
        Value::Null => 3,
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT_SPACE))
        .ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Int(i64),
    Float(u64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(n) => write!(f, "{}", n),
            // Debug keeps a trailing ".0" so whole floats re-parse as floats.
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Round to two decimals, halves away from zero.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keeps_float_marker() {
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(0.1).to_string(), "0.1");
        assert_eq!(Value::Int(3).to_string(), "3");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn test_dates_are_iso() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(Value::Date(d).to_string(), "2024-03-01");
        let ts = d.and_hms_opt(10, 30, 0).unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "2024-03-01T10:30:00");
    }

    #[test]
    fn test_infer() {
        assert_eq!(Value::infer("42"), Value::Int(42));
        assert_eq!(Value::infer("4.5"), Value::Float(4.5));
        assert_eq!(
            Value::infer("1990-05-17"),
            Value::Date(NaiveDate::from_ymd_opt(1990, 5, 17).unwrap())
        );
        assert!(matches!(Value::infer("2024-01-02 08:00:00"), Value::Timestamp(_)));
        assert_eq!(Value::infer("Rendang"), Value::Text("Rendang".into()));
        assert_eq!(Value::infer(""), Value::Null);
    }

    #[test]
    fn test_infer_keeps_non_canonical_text() {
        assert_eq!(Value::infer("08123"), Value::from("08123"));
        assert_eq!(Value::infer("+62"), Value::from("+62"));
        assert_eq!(Value::infer("1.50"), Value::from("1.50"));
        assert_eq!(Value::infer("2024-1-5"), Value::from("2024-1-5"));
        assert_eq!(Value::infer("-7"), Value::Int(-7));
    }

    #[test]
    fn test_non_finite_floats_are_text() {
        for text in ["inf", "-inf", "Infinity", "NaN", "nan"] {
            assert_eq!(Value::parse_as(text, ValueType::Float), None);
            assert_eq!(Value::infer(text), Value::from(text));
        }
    }

    #[test]
    fn test_unify() {
        assert_eq!(ValueType::Int.unify(ValueType::Float), ValueType::Float);
        assert_eq!(ValueType::Null.unify(ValueType::Date), ValueType::Date);
        assert_eq!(ValueType::Int.unify(ValueType::Text), ValueType::Text);
    }

    #[test]
    fn test_total_cmp_nulls_last() {
        assert_eq!(Value::Null.total_cmp(&Value::Int(1)), Ordering::Greater);
        assert_eq!(Value::Int(2).total_cmp(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(
            Value::from("salt").total_cmp(&Value::from("sugar")),
            Ordering::Less
        );
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(33.333333), 33.33);
        assert_eq!(round2(66.666666), 66.67);
        assert_eq!(round2(-1.005_000_1), -1.01);
    }
}
