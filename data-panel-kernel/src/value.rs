use std::convert::TryFrom;
use std::fmt;

/// A bound parameter or a literal lifted out of the statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SQLValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Exact decimal kept in its textual form, e.g. `12.50`.
    Decimal(String),
    Text(String),
}

impl SQLValue {
    /// Integer view used by sharding algorithms.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SQLValue::Int(v) => Some(*v),
            SQLValue::Bool(v) => Some(*v as i64),
            SQLValue::Decimal(v) => {
                let (integral, fraction) = match v.find('.') {
                    Some(pos) => (&v[..pos], &v[pos + 1..]),
                    None => (v.as_str(), ""),
                };
                if fraction.chars().all(|c| c == '0') {
                    integral.parse().ok()
                } else {
                    None
                }
            }
            SQLValue::Text(v) => v.trim().parse().ok(),
            SQLValue::Null => None,
        }
    }

    /// Non-negative integer view, wide enough for `LIMIT 18446744073709551615`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SQLValue::Decimal(v) | SQLValue::Text(v) => v.trim().parse::<u64>().ok().or_else(|| self.as_i64().and_then(|each| u64::try_from(each).ok())),
            other => other.as_i64().and_then(|each| u64::try_from(each).ok()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SQLValue::Null)
    }

    /// Plain textual content, without SQL quoting.
    pub fn as_plain_string(&self) -> String {
        match self {
            SQLValue::Null => String::new(),
            SQLValue::Bool(v) => v.to_string(),
            SQLValue::Int(v) => v.to_string(),
            SQLValue::Decimal(v) | SQLValue::Text(v) => v.clone(),
        }
    }

    /// Render as a literal that can be spliced into SQL text.
    pub fn to_sql_literal(&self) -> String {
        match self {
            SQLValue::Null => "NULL".to_string(),
            SQLValue::Bool(true) => "TRUE".to_string(),
            SQLValue::Bool(false) => "FALSE".to_string(),
            SQLValue::Int(v) => v.to_string(),
            SQLValue::Decimal(v) => v.clone(),
            SQLValue::Text(v) => format!("'{}'", v.replace('\'', "''")),
        }
    }
}

impl fmt::Display for SQLValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SQLValue::Null => f.write_str("null"),
            other => f.write_str(&other.as_plain_string()),
        }
    }
}

impl From<i64> for SQLValue {
    fn from(v: i64) -> Self {
        SQLValue::Int(v)
    }
}

impl From<&str> for SQLValue {
    fn from(v: &str) -> Self {
        SQLValue::Text(v.to_string())
    }
}

impl From<String> for SQLValue {
    fn from(v: String) -> Self {
        SQLValue::Text(v)
    }
}

impl From<bool> for SQLValue {
    fn from(v: bool) -> Self {
        SQLValue::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use crate::value::SQLValue;

    #[test]
    fn test_as_i64() {
        assert_eq!(SQLValue::Int(7).as_i64(), Some(7));
        assert_eq!(SQLValue::Decimal("12.00".to_string()).as_i64(), Some(12));
        assert_eq!(SQLValue::Decimal("12.5".to_string()).as_i64(), None);
        assert_eq!(SQLValue::from(" 42 ").as_i64(), Some(42));
        assert_eq!(SQLValue::from("abc").as_i64(), None);
        assert_eq!(SQLValue::Null.as_i64(), None);
    }

    #[test]
    fn test_as_u64() {
        assert_eq!(SQLValue::Decimal("18446744073709551615".to_string()).as_u64(), Some(u64::MAX));
        assert_eq!(SQLValue::Decimal("5.0".to_string()).as_u64(), Some(5));
        assert_eq!(SQLValue::Int(-1).as_u64(), None);
        assert_eq!(SQLValue::Int(i64::MAX).as_u64(), Some(i64::MAX as u64));
    }

    #[test]
    fn test_to_sql_literal() {
        assert_eq!(SQLValue::from("it's").to_sql_literal(), "'it''s'");
        assert_eq!(SQLValue::Null.to_sql_literal(), "NULL");
        assert_eq!(SQLValue::Int(-3).to_sql_literal(), "-3");
        assert_eq!(SQLValue::Bool(true).to_sql_literal(), "TRUE");
    }
}
