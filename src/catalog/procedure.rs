//! Stored procedure definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::DataType;
use crate::error::{Error, Result};
use crate::query::Select;
use crate::storage::Value;

/// Typed procedure parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub data_type: DataType,
}

impl Parameter {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// `CREATE PROCEDURE name(params) BEGIN <select> END`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureDef {
    pub name: String,
    pub params: Vec<Parameter>,
    /// Parameterized read query
    pub body: Select,
}

impl ProcedureDef {
    pub fn new(name: impl Into<String>, params: Vec<Parameter>, body: Select) -> Self {
        Self {
            name: name.into(),
            params,
            body,
        }
    }

    /// Validate call arguments and pair them with parameter names
    ///
    /// NULL is accepted for any parameter type.
    pub fn bind_arguments(&self, args: Vec<Value>) -> Result<HashMap<String, Value>> {
        if args.len() != self.params.len() {
            return Err(Error::ArityMismatch {
                procedure: self.name.clone(),
                expected: self.params.len(),
                found: args.len(),
            });
        }
        let mut bound = HashMap::with_capacity(args.len());
        for (param, arg) in self.params.iter().zip(args) {
            if !param.data_type.accepts(&arg) {
                return Err(Error::TypeMismatch {
                    expected: format!("{} for parameter '{}'", param.data_type, param.name),
                    found: arg.type_name().to_string(),
                });
            }
            bound.insert(param.name.clone(), arg);
        }
        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Predicate;

    fn get_user_posts() -> ProcedureDef {
        ProcedureDef::new(
            "GetUserPosts",
            vec![Parameter::new("userId", DataType::Varchar(36))],
            Select::from("posts").filter(Predicate::eq_param("user_id", "userId")),
        )
    }

    #[test]
    fn test_arity_mismatch() {
        let proc = get_user_posts();
        assert!(matches!(
            proc.bind_arguments(vec![]),
            Err(Error::ArityMismatch {
                expected: 1,
                found: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let proc = get_user_posts();
        assert!(matches!(
            proc.bind_arguments(vec![Value::Integer(1)]),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_bind_arguments() {
        let proc = get_user_posts();
        let args = proc.bind_arguments(vec![Value::from("u1")]).unwrap();
        assert_eq!(args.get("userId"), Some(&Value::from("u1")));
    }
}
