use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Store-style typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Number (stored as decimal text for precision)
    N(String),
    /// String
    S(String),
    /// Binary
    B(Bytes),
    /// Boolean
    Bool(bool),
    /// Null
    Null,
    /// List
    L(Vec<Value>),
    /// Map
    M(HashMap<String, Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::S(s.into())
    }

    pub fn number(n: impl ToString) -> Self {
        Value::N(n.to_string())
    }

    pub fn binary(b: impl Into<Bytes>) -> Self {
        Value::B(b.into())
    }

    pub fn map(m: HashMap<String, Value>) -> Self {
        Value::M(m)
    }

    /// Short type descriptor, matching the store's attribute type letters
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::N(_) => "N",
            Value::S(_) => "S",
            Value::B(_) => "B",
            Value::Bool(_) => "BOOL",
            Value::Null => "NULL",
            Value::L(_) => "L",
            Value::M(_) => "M",
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::S(s) => Some(s),
            _ => None,
        }
    }

    /// Raw decimal text of a number
    pub fn as_number(&self) -> Option<&str> {
        match self {
            Value::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().and_then(|n| n.parse().ok())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(|n| n.parse().ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            Value::B(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::L(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::M(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::S(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::S(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::N(n.to_string())
                }
            }
        )*
    };
}

number_from!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::B(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::B(Bytes::from(b))
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::B(Bytes::copy_from_slice(b))
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::L(l)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(m: HashMap<String, Value>) -> Self {
        Value::M(m)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Builds a `Vec<Value>` of statement parameters from plain Rust values.
///
/// ```
/// use dynql_core::{params, Value};
///
/// let p = params!["1", true, 2.5];
/// assert_eq!(p[1], Value::Bool(true));
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($v:expr),+ $(,)?) => {
        vec![$($crate::Value::from($v)),+]
    };
}

/// Item - a map of attribute names to values
pub type Item = HashMap<String, Value>;

/// Largest exponent magnitude accepted in `1e<exp>` notation
pub const MAX_NUMBER_EXPONENT: i64 = 400;

/// Canonical decimal text for a number, or None if `text` is not a number.
///
/// Exponents are expanded into plain digits, and leading `+`, redundant
/// leading zeros and trailing fractional zeros are dropped, so equal numbers
/// address the same key (`1e3`, `1000` and `1.0E3` all become `1000`).
pub fn canonical_number(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || text.parse::<f64>().is_err() {
        return None;
    }
    // Reject inf/nan spellings that f64 accepts
    if !text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return None;
    }

    let (mantissa, exponent) = match text.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i64>().ok()?),
        None => (text, 0),
    };
    if exponent.abs() > MAX_NUMBER_EXPONENT {
        return None;
    }

    let (negative, mantissa) = match mantissa.as_bytes().first() {
        Some(b'-') => (true, &mantissa[1..]),
        Some(b'+') => (false, &mantissa[1..]),
        _ => (false, mantissa),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    // All significant digits, with the decimal point `point` digits from the left
    let digits = format!("{}{}", int_part, frac_part);
    let leading = digits.len() - digits.trim_start_matches('0').len();
    let digits = digits.trim_start_matches('0').trim_end_matches('0');
    if digits.is_empty() {
        return Some("0".to_string());
    }
    let point = int_part.len() as i64 - leading as i64 + exponent;

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if point <= 0 {
        out.push_str("0.");
        out.push_str(&"0".repeat(point.unsigned_abs() as usize));
        out.push_str(digits);
    } else if point as usize >= digits.len() {
        out.push_str(digits);
        out.push_str(&"0".repeat(point as usize - digits.len()));
    } else {
        let (int_digits, frac_digits) = digits.split_at(point as usize);
        out.push_str(int_digits);
        out.push('.');
        out.push_str(frac_digits);
    }
    Some(out)
}

/// Declared type of a key attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    String,
    Number,
    Binary,
}

impl KeyType {
    /// Parses `string|number|binary` or the single-letter `S|N|B`, any case
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "s" => Some(KeyType::String),
            "number" | "n" => Some(KeyType::Number),
            "binary" | "b" => Some(KeyType::Binary),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            KeyType::String => "S",
            KeyType::Number => "N",
            KeyType::Binary => "B",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyType::String => "string",
            KeyType::Number => "number",
            KeyType::Binary => "binary",
        };
        f.write_str(s)
    }
}

/// A key attribute value. Only strings, numbers and binaries can be keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyValue {
    S(String),
    /// Canonical decimal text
    N(String),
    B(Bytes),
}

impl KeyValue {
    /// Converts an attribute value into a key of the declared type.
    /// Returns None when the value has the wrong type.
    pub fn from_value(value: &Value, key_type: KeyType) -> Option<Self> {
        match (key_type, value) {
            (KeyType::String, Value::S(s)) => Some(KeyValue::S(s.clone())),
            (KeyType::Number, Value::N(n)) => canonical_number(n).map(KeyValue::N),
            (KeyType::Binary, Value::B(b)) => Some(KeyValue::B(b.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            KeyValue::S(s) => Value::S(s.clone()),
            KeyValue::N(n) => Value::N(n.clone()),
            KeyValue::B(b) => Value::B(b.clone()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            KeyValue::S(_) => 0,
            KeyValue::N(_) => 1,
            KeyValue::B(_) => 2,
        }
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyValue::S(a), KeyValue::S(b)) => a.cmp(b),
            (KeyValue::B(a), KeyValue::B(b)) => a.cmp(b),
            (KeyValue::N(a), KeyValue::N(b)) => {
                let fa: f64 = a.parse().unwrap_or(f64::NAN);
                let fb: f64 = b.parse().unwrap_or(f64::NAN);
                // Numeric order first; text breaks ties so Ord agrees with Eq
                fa.partial_cmp(&fb)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.cmp(b))
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::S(s) => write!(f, "'{}'", s),
            KeyValue::N(n) => f.write_str(n),
            KeyValue::B(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Composite primary key: partition key + optional sort key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub pk: KeyValue,
    pub sk: Option<KeyValue>,
}

impl Key {
    pub fn new(pk: KeyValue) -> Self {
        Self { pk, sk: None }
    }

    pub fn with_sk(pk: KeyValue, sk: KeyValue) -> Self {
        Self { pk, sk: Some(sk) }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sk {
            Some(sk) => write!(f, "({}, {})", self.pk, sk),
            None => write!(f, "({})", self.pk),
        }
    }
}

/// A named, typed key attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAttribute {
    pub name: String,
    pub key_type: KeyType,
}

impl KeyAttribute {
    pub fn new(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
        }
    }
}

/// Primary key layout of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
}

impl KeySchema {
    pub fn new(partition_key: KeyAttribute) -> Self {
        Self {
            partition_key,
            sort_key: None,
        }
    }

    pub fn with_sort_key(mut self, sort_key: KeyAttribute) -> Self {
        self.sort_key = Some(sort_key);
        self
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.partition_key.name == name
            || self.sort_key.as_ref().is_some_and(|sk| sk.name == name)
    }

    /// Extracts the primary key from an item. None if a key attribute is
    /// missing or has the wrong type.
    pub fn key_of(&self, item: &Item) -> Option<Key> {
        let pk = item
            .get(&self.partition_key.name)
            .and_then(|v| KeyValue::from_value(v, self.partition_key.key_type))?;
        let sk = match &self.sort_key {
            Some(attr) => Some(
                item.get(&attr.name)
                    .and_then(|v| KeyValue::from_value(v, attr.key_type))?,
            ),
            None => None,
        };
        Some(Key { pk, sk })
    }

    /// Writes the key attributes of `key` into `item`.
    pub fn stamp_key(&self, key: &Key, item: &mut Item) {
        item.insert(self.partition_key.name.clone(), key.pk.to_value());
        if let (Some(attr), Some(sk)) = (&self.sort_key, &key.sk) {
            item.insert(attr.name.clone(), sk.to_value());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from("a"), Value::S("a".into()));
        assert_eq!(Value::from(2), Value::N("2".into()));
        assert_eq!(Value::from(1.2), Value::N("1.2".into()));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(vec![1u8, 2]), Value::B(Bytes::from_static(&[1, 2])));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_params_macro() {
        let p = params!["1", 2, false];
        assert_eq!(p.len(), 3);
        assert_eq!(p[0].as_string(), Some("1"));
        assert_eq!(p[1].as_i64(), Some(2));
        assert!(params![].is_empty());
    }

    #[test]
    fn test_canonical_number() {
        assert_eq!(canonical_number("1").as_deref(), Some("1"));
        assert_eq!(canonical_number("+001.500").as_deref(), Some("1.5"));
        assert_eq!(canonical_number("-0.0").as_deref(), Some("0"));
        assert_eq!(canonical_number(".25").as_deref(), Some("0.25"));
        assert_eq!(canonical_number("1e3").as_deref(), Some("1000"));
        assert_eq!(canonical_number("1.0E3").as_deref(), Some("1000"));
        assert_eq!(canonical_number("+12.5e1").as_deref(), Some("125"));
        assert_eq!(canonical_number("-1.5e-3").as_deref(), Some("-0.0015"));
        assert_eq!(canonical_number("0.001").as_deref(), Some("0.001"));
        assert_eq!(canonical_number("0e10").as_deref(), Some("0"));
        assert_eq!(canonical_number("1e999"), None);
        assert_eq!(canonical_number("abc"), None);
        assert_eq!(canonical_number("inf"), None);
        assert_eq!(canonical_number(""), None);
    }

    #[test]
    fn test_exponent_numbers_address_the_same_key() {
        let plain = KeyValue::from_value(&Value::N("1000".into()), KeyType::Number);
        let exponent = KeyValue::from_value(&Value::N("1e3".into()), KeyType::Number);
        assert!(plain.is_some());
        assert_eq!(plain, exponent);
    }

    #[test]
    fn test_key_type_parse() {
        assert_eq!(KeyType::parse("string"), Some(KeyType::String));
        assert_eq!(KeyType::parse("NUMBER"), Some(KeyType::Number));
        assert_eq!(KeyType::parse("b"), Some(KeyType::Binary));
        assert_eq!(KeyType::parse("bool"), None);
    }

    #[test]
    fn test_number_keys_order_numerically() {
        let two = KeyValue::N("2".into());
        let ten = KeyValue::N("10".into());
        assert!(two < ten);
        assert_eq!(
            KeyValue::from_value(&Value::N("2.0".into()), KeyType::Number),
            Some(two)
        );
    }

    #[test]
    fn test_key_of_item() {
        let schema = KeySchema::new(KeyAttribute::new("id", KeyType::String))
            .with_sort_key(KeyAttribute::new("ts", KeyType::Number));

        let mut item = Item::new();
        item.insert("id".into(), Value::string("a"));
        assert!(schema.key_of(&item).is_none());

        item.insert("ts".into(), Value::number(5));
        let key = schema.key_of(&item).unwrap();
        assert_eq!(key.pk, KeyValue::S("a".into()));
        assert_eq!(key.sk, Some(KeyValue::N("5".into())));

        item.insert("id".into(), Value::number(1));
        assert!(schema.key_of(&item).is_none());
    }

    #[test]
    fn test_is_key_column() {
        let schema = KeySchema::new(KeyAttribute::new("id", KeyType::String));
        assert!(schema.is_key_column("id"));
        assert!(!schema.is_key_column("name"));
    }
}
