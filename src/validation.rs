//! Configuration validation against a [`Schema`].
//!
//! Checks required attributes, value types, nested-block cardinality and
//! each attribute's declarative [`Validator`](crate::schema::Validator)s.
//!
//! ```
//! use tencentcloud_vpc_provider::schema::{Attribute, Schema, Validator};
//! use tencentcloud_vpc_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("cidr_block", Attribute::required_string().with_validator(Validator::Cidr));
//!
//! assert!(validate(&schema, &json!({"cidr_block": "10.0.0.0/16"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"cidr_block": "10.0.0.0"}));
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("cidr_block"));
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema,
};

/// Validate `value` against `schema`. An empty result means valid.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Like [`validate`], returning `Err` with the diagnostics when invalid.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.iter().any(Diagnostic::is_error) {
        Err(diagnostics)
    } else {
        Ok(())
    }
}

pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    !validate(schema, value).iter().any(Diagnostic::is_error)
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int64",
        Value::Number(_) => "float64",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn type_error(path: &str, expected: &str, value: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(value)))
        .with_attribute_if_not_empty(path)
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        other => {
            diagnostics.push(type_error(path, "object", other));
            return;
        },
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, nested) in &block.blocks {
        validate_nested_block(nested, obj.get(name), &join_path(path, name), diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        return;
    }

    let Some(value) = value.filter(|v| !v.is_null()) else {
        if attr.flags.required {
            diagnostics.push(
                Diagnostic::error(format!("Missing required attribute '{}'", path))
                    .with_detail("This attribute is required and must be provided")
                    .with_attribute(path),
            );
        }
        return;
    };

    let before = diagnostics.len();
    validate_attribute_type(&attr.attr_type, value, path, diagnostics);
    if diagnostics.len() > before {
        return;
    }

    for validator in &attr.validators {
        let failures: Vec<(String, String)> = match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| {
                    validator.check(item).err().map(|msg| (index_path(path, i), msg))
                })
                .collect(),
            other => validator
                .check(other)
                .err()
                .map(|msg| (path.to_string(), msg))
                .into_iter()
                .collect(),
        };

        for (at, msg) in failures {
            diagnostics.push(
                Diagnostic::error(format!("Invalid value for '{}'", at))
                    .with_detail(msg)
                    .with_attribute(at),
            );
        }
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (attr_type, value) {
        (AttributeType::Dynamic, _) => {},
        (AttributeType::String, Value::String(_)) => {},
        (AttributeType::Int64, v) if is_int64(v) => {},
        (AttributeType::Float64, Value::Number(_)) => {},
        (AttributeType::Bool, Value::Bool(_)) => {},
        (AttributeType::List(element) | AttributeType::Set(element), Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                validate_attribute_type(element, item, &index_path(path, i), diagnostics);
            }
        },
        (AttributeType::Map(element), Value::Object(obj)) => {
            for (key, item) in obj {
                validate_attribute_type(element, item, &join_path(path, key), diagnostics);
            }
        },
        (AttributeType::Object(attrs), Value::Object(obj)) => {
            validate_object_type(attrs, obj, path, diagnostics);
        },
        (expected, other) => diagnostics.push(type_error(path, expected.type_name(), other)),
    }
}

fn validate_object_type(
    attrs: &BTreeMap<String, AttributeType>,
    obj: &Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name).filter(|v| !v.is_null()) {
            validate_attribute_type(attr_type, value, &join_path(path, name), diagnostics);
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let value = value.filter(|v| !v.is_null());
    let count = match (nested.nesting_mode, value) {
        (_, None) => 0,
        (BlockNestingMode::Single, Some(v)) => {
            validate_block(&nested.block, v, path, diagnostics);
            1
        },
        (BlockNestingMode::List | BlockNestingMode::Set, Some(Value::Array(items))) => {
            for (i, item) in items.iter().enumerate() {
                validate_block(&nested.block, item, &index_path(path, i), diagnostics);
            }
            items.len()
        },
        (BlockNestingMode::Map, Some(Value::Object(obj))) => {
            for (key, item) in obj {
                validate_block(&nested.block, item, &join_path(path, key), diagnostics);
            }
            obj.len()
        },
        (mode, Some(other)) => {
            let expected = match mode {
                BlockNestingMode::Map => "map",
                _ => "list",
            };
            diagnostics.push(type_error(path, expected, other));
            return;
        },
    };

    let count = count as u32;
    if count < nested.min_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' requires at least {} item(s), got {}",
                path, nested.min_items, count
            ))
            .with_attribute(path),
        );
    }
    if nested.max_items > 0 && count > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, count
            ))
            .with_attribute(path),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Validator;
    use serde_json::json;

    fn subnet_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("vpc_id", Attribute::required_string())
            .with_attribute(
                "cidr_block",
                Attribute::required_string().with_validator(Validator::Cidr),
            )
            .with_attribute("is_multicast", Attribute::optional_bool())
            .with_attribute("tags", Attribute::optional_string_map())
            .with_attribute(
                "dns_servers",
                Attribute::optional_string_set().with_validator(Validator::Ip),
            )
    }

    #[test]
    fn test_valid_config() {
        let config = json!({
            "vpc_id": "vpc-1",
            "cidr_block": "10.0.1.0/24",
            "is_multicast": false,
            "tags": {"env": "dev"},
            "dns_servers": ["119.29.29.29"]
        });
        assert!(validate(&subnet_schema(), &config).is_empty());
        assert!(is_valid(&subnet_schema(), &config));
    }

    #[test]
    fn test_missing_required() {
        let diagnostics = validate(&subnet_schema(), &json!({"cidr_block": "10.0.1.0/24"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("vpc_id"));
    }

    #[test]
    fn test_computed_only_is_ignored() {
        let config = json!({"id": 5, "vpc_id": "vpc-1", "cidr_block": "10.0.1.0/24"});
        assert!(validate(&subnet_schema(), &config).is_empty());
    }

    #[test]
    fn test_type_mismatch() {
        let config = json!({"vpc_id": "vpc-1", "cidr_block": "10.0.1.0/24", "is_multicast": "yes", "tags": {"a": 1}});
        let diagnostics = validate(&subnet_schema(), &config);
        let attrs: Vec<_> = diagnostics.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert!(attrs.contains(&"is_multicast"));
        assert!(attrs.contains(&"tags.a"));
    }

    #[test]
    fn test_validators_run_on_values_and_list_elements() {
        let config = json!({
            "vpc_id": "vpc-1",
            "cidr_block": "10.0.1.0",
            "dns_servers": ["8.8.8.8", "dns.example"]
        });
        let diagnostics = validate(&subnet_schema(), &config);
        let attrs: Vec<_> = diagnostics.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert_eq!(attrs, vec!["cidr_block", "dns_servers[1]"]);
    }

    #[test]
    fn test_nested_block_cardinality() {
        let schema = Schema::v0().with_block(
            "ipv4s",
            NestedBlock::set(
                Block::new()
                    .with_attribute("ip", Attribute::required_string().with_validator(Validator::Ip))
                    .with_attribute("primary", Attribute::required_bool()),
            )
            .with_min_items(1)
            .with_max_items(2),
        );

        assert!(validate(&schema, &json!({"ipv4s": [{"ip": "10.0.0.2", "primary": true}]})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let too_many = json!({"ipv4s": [
            {"ip": "10.0.0.2", "primary": true},
            {"ip": "10.0.0.3", "primary": false},
            {"ip": "10.0.0.4", "primary": false}
        ]});
        assert!(validate(&schema, &too_many)[0].summary.contains("at most 2"));

        let bad_item = json!({"ipv4s": [{"ip": "nope", "primary": true}]});
        assert_eq!(
            validate(&schema, &bad_item)[0].attribute.as_deref(),
            Some("ipv4s[0].ip")
        );
    }

    #[test]
    fn test_validate_result() {
        let schema = subnet_schema();
        assert!(validate_result(&schema, &json!({"vpc_id": "v", "cidr_block": "10.0.0.0/8"})).is_ok());
        assert!(validate_result(&schema, &json!("not an object")).is_err());
    }
}
