use crate::schema::AttrType;
use crate::{Error, Result};

/// A dynamically typed scalar as it moves between declared attributes and
/// the backend.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum Value {
    /// Boolean value
    Bool(bool),

    /// Signed 64-bit integer
    I64(i64),

    /// 64-bit float
    F64(f64),

    /// String value
    String(String),

    /// A timestamp or date in the backend's textual form
    Timestamp(String),

    /// Null value
    #[default]
    Null,

    /// A list of values of the same type
    List(Vec<Value>),
}

impl Value {
    pub const fn null() -> Self {
        Self::Null
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn to_bool(self) -> Result<bool> {
        match self {
            Self::Bool(v) => Ok(v),
            _ => Err(Error::type_conversion(self, "bool")),
        }
    }

    pub fn to_i64(self) -> Result<i64> {
        match self {
            Self::I64(v) => Ok(v),
            _ => Err(Error::type_conversion(self, "i64")),
        }
    }

    pub fn to_f64(self) -> Result<f64> {
        match self {
            Self::F64(v) => Ok(v),
            Self::I64(v) => Ok(v as f64),
            _ => Err(Error::type_conversion(self, "f64")),
        }
    }

    pub fn into_string(self) -> Result<String> {
        match self {
            Self::String(v) | Self::Timestamp(v) => Ok(v),
            _ => Err(Error::type_conversion(self, "String")),
        }
    }

    /// Coerces a backend-returned value to the given declared type.
    ///
    /// Backends frequently hand back text; numeric coercion first tries an
    /// integer parse and falls back to float, so `AVG` results survive a cast
    /// to an integer-typed attribute.
    pub fn cast(self, ty: AttrType) -> Result<Self> {
        use AttrType::*;

        if self.is_null() {
            return Ok(Self::Null);
        }

        Ok(match ty {
            Int | BigInt => match self {
                Self::I64(v) => Self::I64(v),
                Self::Bool(v) => Self::I64(v as i64),
                Self::F64(v) => Self::F64(v),
                Self::String(s) => match s.trim().parse::<i64>() {
                    Ok(v) => Self::I64(v),
                    Err(_) => Self::F64(s.trim().parse::<f64>().map_err(|_| {
                        Error::type_conversion(&s, "i64")
                    })?),
                },
                other => return Err(Error::type_conversion(other, "i64")),
            },
            Float => match self {
                Self::F64(v) => Self::F64(v),
                Self::I64(v) => Self::F64(v as f64),
                Self::String(s) => Self::F64(
                    s.trim()
                        .parse::<f64>()
                        .map_err(|_| Error::type_conversion(&s, "f64"))?,
                ),
                other => return Err(Error::type_conversion(other, "f64")),
            },
            Bool => match self {
                Self::Bool(v) => Self::Bool(v),
                Self::I64(v) => Self::Bool(v != 0),
                Self::String(s) => match s.as_str() {
                    "t" | "true" | "1" => Self::Bool(true),
                    "f" | "false" | "0" | "" => Self::Bool(false),
                    _ => return Err(Error::type_conversion(&s, "bool")),
                },
                other => return Err(Error::type_conversion(other, "bool")),
            },
            Timestamp | Date => match self {
                Self::Timestamp(v) => Self::Timestamp(v),
                Self::String(v) => Self::Timestamp(v),
                other => other,
            },
            Text | Blob => self,
        })
    }
}

impl From<bool> for Value {
    fn from(src: bool) -> Self {
        Self::Bool(src)
    }
}

impl From<i64> for Value {
    fn from(src: i64) -> Self {
        Self::I64(src)
    }
}

impl From<i32> for Value {
    fn from(src: i32) -> Self {
        Self::I64(src as i64)
    }
}

impl From<f64> for Value {
    fn from(src: f64) -> Self {
        Self::F64(src)
    }
}

impl From<&str> for Value {
    fn from(src: &str) -> Self {
        Self::String(src.to_string())
    }
}

impl From<String> for Value {
    fn from(src: String) -> Self {
        Self::String(src)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(src: Option<T>) -> Self {
        match src {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(src: Vec<T>) -> Self {
        Self::List(src.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_numeric_from_text() {
        assert_eq!(
            Value::String("42".into()).cast(AttrType::Int).unwrap(),
            Value::I64(42)
        );
        // AVG over integers comes back fractional
        assert_eq!(
            Value::String("20.5".into()).cast(AttrType::Int).unwrap(),
            Value::F64(20.5)
        );
    }

    #[test]
    fn cast_bool() {
        assert_eq!(
            Value::String("t".into()).cast(AttrType::Bool).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(Value::I64(0).cast(AttrType::Bool).unwrap(), Value::Bool(false));
    }

    #[test]
    fn cast_null_is_identity() {
        assert_eq!(Value::Null.cast(AttrType::Int).unwrap(), Value::Null);
    }

    #[test]
    fn option_into_value() {
        let v: Value = None::<i64>.into();
        assert!(v.is_null());
        let v: Value = Some("hi").into();
        assert_eq!(v, Value::String("hi".into()));
    }
}
