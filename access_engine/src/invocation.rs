/// Access Kernel: Invocation Definitions
///
/// An invocation is a named operation plus positional string arguments,
/// exactly as the boundary delivers them. It carries no logic beyond
/// argument extraction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::access::{parse_expiry, AccessMask};
use crate::error::{AccessError, AccessResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub operation: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(operation: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operation: operation.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// An invocation with no arguments.
    pub fn bare(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            args: Vec::new(),
        }
    }

    /// Fail unless exactly `names.len()` arguments were supplied.
    pub fn expect_arity(&self, names: &[&str]) -> AccessResult<()> {
        if self.args.len() != names.len() {
            return Err(AccessError::Validation(format!(
                "{} expects {} argument(s) ({}), got {}",
                self.operation,
                names.len(),
                names.join(", "),
                self.args.len()
            )));
        }
        Ok(())
    }

    pub fn str_arg(&self, index: usize, name: &str) -> AccessResult<&str> {
        self.args.get(index).map(|s| s.as_str()).ok_or_else(|| {
            AccessError::Validation(format!("{}: missing argument {:?}", self.operation, name))
        })
    }

    pub fn mask_arg(&self, index: usize, name: &str) -> AccessResult<AccessMask> {
        AccessMask::parse_arg(name, self.str_arg(index, name)?)
    }

    pub fn expiry_arg(&self, index: usize, name: &str) -> AccessResult<i64> {
        parse_expiry(self.str_arg(index, name)?)
    }

    /// Parse from a JSON fixture: `{"operation": "...", "args": [...]}`.
    /// Non-string scalar args are stringified the way the boundary would.
    pub fn from_value(v: &Value) -> AccessResult<Self> {
        let operation = v
            .get("operation")
            .and_then(|o| o.as_str())
            .ok_or_else(|| AccessError::Validation("invocation has no operation".to_string()))?;
        let args = match v.get("args") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|a| match a {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(_) => {
                return Err(AccessError::Validation(
                    "invocation args must be an array".to_string(),
                ))
            }
        };
        Ok(Self {
            operation: operation.to_string(),
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arity_is_checked() {
        let inv = Invocation::new("addOrg", ["A", "Alpha"]);
        let err = inv.expect_arity(&["id", "name", "access"]).unwrap_err();
        assert!(err.to_string().contains("expects 3"));
    }

    #[test]
    fn typed_args() {
        let inv = Invocation::new("updateOrgDatasetAccess", ["d1", "16", "-1", "s3://x"]);
        assert_eq!(inv.mask_arg(1, "access").unwrap(), AccessMask::READ);
        assert_eq!(inv.expiry_arg(2, "expiredAt").unwrap(), -1);
        assert!(inv.mask_arg(0, "access").is_err());
        assert!(inv.str_arg(9, "nope").is_err());
    }

    #[test]
    fn from_value_stringifies_numbers() {
        let inv = Invocation::from_value(&json!({"operation": "addOrg", "args": ["A", "Alpha", 16]}))
            .unwrap();
        assert_eq!(inv.args, vec!["A", "Alpha", "16"]);
        let inv = Invocation::from_value(&json!({"operation": "init"})).unwrap();
        assert!(inv.args.is_empty());
        assert!(Invocation::from_value(&json!({"args": []})).is_err());
    }
}
