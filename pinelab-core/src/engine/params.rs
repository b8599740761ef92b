//! Parameter resolution: merge caller overrides with schema defaults and
//! validate bounds.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::pine::{InputParam, ParamValue};

#[derive(Debug, Clone, Error)]
#[error("parameter '{name}' = {value} violates {bound}")]
pub struct ParamError {
    pub name: String,
    pub value: String,
    pub bound: String,
}

/// Merge overrides with defaults. Every schema entry resolves to a value;
/// overrides for unknown names are ignored; int/float bounds are enforced.
pub fn resolve_params(
    schema: &BTreeMap<String, InputParam>,
    overrides: &HashMap<String, ParamValue>,
) -> Result<HashMap<String, ParamValue>, ParamError> {
    let mut resolved = HashMap::with_capacity(schema.len());

    for (name, input) in schema {
        let value = overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| input.default_value());

        match input {
            InputParam::Int { min, max, .. } => {
                check_bounds(name, &value, min.map(|v| v as f64), max.map(|v| v as f64))?;
            }
            InputParam::Float { min, max, .. } => {
                check_bounds(name, &value, *min, *max)?;
            }
            _ => {}
        }

        resolved.insert(name.clone(), value);
    }

    Ok(resolved)
}

fn check_bounds(
    name: &str,
    value: &ParamValue,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<(), ParamError> {
    let Some(v) = value.as_f64() else {
        return Err(ParamError {
            name: name.to_string(),
            value: format!("{value:?}"),
            bound: "numeric type".to_string(),
        });
    };
    if let Some(min) = min {
        if v < min {
            return Err(ParamError {
                name: name.to_string(),
                value: v.to_string(),
                bound: format!("minval = {min}"),
            });
        }
    }
    if let Some(max) = max {
        if v > max {
            return Err(ParamError {
                name: name.to_string(),
                value: v.to_string(),
                bound: format!("maxval = {max}"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pine::compile;

    fn schema() -> BTreeMap<String, InputParam> {
        compile("len = input.int(14, \"L\", minval=1, maxval=100)\n")
            .unwrap()
            .input_schema
    }

    #[test]
    fn defaults_fill_missing() {
        let params = resolve_params(&schema(), &HashMap::new()).unwrap();
        assert_eq!(params["len"], ParamValue::Int(14));
    }

    #[test]
    fn override_applies() {
        let mut overrides = HashMap::new();
        overrides.insert("len".to_string(), ParamValue::Int(21));
        let params = resolve_params(&schema(), &overrides).unwrap();
        assert_eq!(params["len"], ParamValue::Int(21));
    }

    #[test]
    fn out_of_range_rejected() {
        let mut overrides = HashMap::new();
        overrides.insert("len".to_string(), ParamValue::Int(500));
        let err = resolve_params(&schema(), &overrides).unwrap_err();
        assert_eq!(err.name, "len");
        assert!(err.bound.contains("maxval"));
    }

    #[test]
    fn unknown_override_ignored() {
        let mut overrides = HashMap::new();
        overrides.insert("nope".to_string(), ParamValue::Int(1));
        let params = resolve_params(&schema(), &overrides).unwrap();
        assert!(!params.contains_key("nope"));
    }
}
