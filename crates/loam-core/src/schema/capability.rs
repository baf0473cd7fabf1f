use super::{AttrType, Attribute};
use crate::stmt::Value;
use crate::{Error, Result};

use indexmap::IndexMap;
use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

/// A composable capability attached to a model descriptor.
///
/// Each capability explicitly contributes attribute declarations and
/// lifecycle hooks; a model holds an ordered list of them. Hooks see the
/// instance's attribute values by name.
pub trait Capability: Debug + Send + Sync {
    /// Attributes this capability adds to the model.
    fn attributes(&self) -> Vec<Attribute> {
        vec![]
    }

    /// Runs before an INSERT is issued.
    fn before_insert(&self, _values: &mut IndexMap<String, Value>) {}

    /// Runs before an UPDATE is issued.
    fn before_update(&self, _values: &mut IndexMap<String, Value>) {}

    /// Rejecting here short-circuits insert/update before any SQL is
    /// issued.
    fn validate(&self, _values: &IndexMap<String, Value>) -> Result<()> {
        Ok(())
    }
}

/// Maintains `create_time` / `update_time` epoch-second columns.
#[derive(Debug, Default)]
pub struct Timestamps;

impl Timestamps {
    fn now() -> Value {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Value::I64(secs)
    }
}

impl Capability for Timestamps {
    fn attributes(&self) -> Vec<Attribute> {
        vec![
            Attribute::new("create_time", AttrType::BigInt),
            Attribute::new("update_time", AttrType::BigInt),
        ]
    }

    fn before_insert(&self, values: &mut IndexMap<String, Value>) {
        let now = Self::now();
        values.insert("create_time".to_string(), now.clone());
        values.insert("update_time".to_string(), now);
    }

    fn before_update(&self, values: &mut IndexMap<String, Value>) {
        values.insert("update_time".to_string(), Self::now());
    }
}

/// Requires a set of attributes to be non-null before insert/update.
#[derive(Debug)]
pub struct Required {
    attributes: Vec<String>,
}

impl Required {
    pub fn new(attributes: &[&str]) -> Self {
        Self {
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl Capability for Required {
    fn validate(&self, values: &IndexMap<String, Value>) -> Result<()> {
        for name in &self.attributes {
            let missing = values.get(name).map(Value::is_null).unwrap_or(true);
            if missing {
                return Err(Error::validation(format!("{name} is required")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_fill_both_columns_on_insert() {
        let cap = Timestamps;
        let mut values = IndexMap::new();
        cap.before_insert(&mut values);
        assert!(matches!(values["create_time"], Value::I64(secs) if secs > 0));
        assert_eq!(values["create_time"], values["update_time"]);
    }

    #[test]
    fn required_rejects_null() {
        let cap = Required::new(&["name"]);
        let mut values = IndexMap::new();
        values.insert("name".to_string(), Value::Null);
        assert!(cap.validate(&values).unwrap_err().is_validation());

        values.insert("name".to_string(), "gm".into());
        assert!(cap.validate(&values).is_ok());
    }
}
