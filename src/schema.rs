//! Schema types for describing provider, resource and data-source structure.
//!
//! Schemas describe the shape of provider configuration, resources, and data
//! sources. They drive validation, planning and the GetSchema response.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::helper;

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A 64-bit floating point number.
    Float64,
    /// A boolean value.
    Bool,
    /// A list of values of a single type.
    List(Box<AttributeType>),
    /// A set of unique values of a single type.
    Set(Box<AttributeType>),
    /// A map from string keys to values of a single type.
    Map(Box<AttributeType>),
    /// An object with a fixed set of attributes.
    Object(BTreeMap<String, AttributeType>),
    /// A dynamic type that can hold any value.
    Dynamic,
}

impl AttributeType {
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    pub fn set(element_type: AttributeType) -> Self {
        Self::Set(Box::new(element_type))
    }

    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }

    pub fn object<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, AttributeType)>,
        K: Into<String>,
    {
        Self::Object(attributes.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Human-readable name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Dynamic => "dynamic",
        }
    }
}

/// Describes how an attribute can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// The attribute is required in configuration.
    pub required: bool,
    /// The attribute is optional in configuration.
    pub optional: bool,
    /// The attribute is computed by the provider.
    pub computed: bool,
    /// The attribute is hidden in logs and plan output.
    pub sensitive: bool,
}

impl AttributeFlags {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Optional in configuration, filled by the provider when omitted.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Computed and never settable by configuration.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// Declarative constraint on an attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Validator {
    /// String must be one of the listed values.
    AllowedStrings { values: Vec<String> },
    /// Integer must be one of the listed values.
    AllowedInts { values: Vec<i64> },
    /// String length (in characters) must be within `[min, max]`.
    StringLength { min: usize, max: usize },
    /// Integer must be within `[min, max]`.
    IntRange { min: i64, max: i64 },
    /// String must be a CIDR block.
    Cidr,
    /// String must be an IP address.
    Ip,
    /// String must be an IP address or a CIDR block.
    IpOrCidr,
    /// String must be `ALL`, a port, a comma list of ports or a `from-to` range.
    PortRange,
}

impl Validator {
    pub fn allowed_strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllowedStrings {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allowed_ints(values: &[i64]) -> Self {
        Self::AllowedInts {
            values: values.to_vec(),
        }
    }

    pub fn string_length(min: usize, max: usize) -> Self {
        Self::StringLength { min, max }
    }

    pub fn int_range(min: i64, max: i64) -> Self {
        Self::IntRange { min, max }
    }

    /// Check `value`, returning a description of the violation.
    ///
    /// Values of the wrong JSON type are left to type checking.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Self::AllowedStrings { values } => match value.as_str() {
                Some(s) if !values.iter().any(|v| v == s) => Err(format!(
                    "expected one of [{}], got `{}`",
                    values.join(", "),
                    s
                )),
                _ => Ok(()),
            },
            Self::AllowedInts { values } => match value.as_i64() {
                Some(n) if !values.contains(&n) => {
                    let allowed: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                    Err(format!("expected one of [{}], got {}", allowed.join(", "), n))
                },
                _ => Ok(()),
            },
            Self::StringLength { min, max } => match value.as_str() {
                Some(s) => {
                    let len = s.chars().count();
                    if len < *min || len > *max {
                        Err(format!(
                            "expected length between {} and {}, got {}",
                            min, max, len
                        ))
                    } else {
                        Ok(())
                    }
                },
                None => Ok(()),
            },
            Self::IntRange { min, max } => match value.as_i64() {
                Some(n) if n < *min || n > *max => {
                    Err(format!("expected value between {} and {}, got {}", min, max, n))
                },
                _ => Ok(()),
            },
            Self::Cidr => match value.as_str() {
                Some(s) if !helper::is_cidr(s) => Err(format!("`{}` is not a valid CIDR block", s)),
                _ => Ok(()),
            },
            Self::Ip => match value.as_str() {
                Some(s) if s.parse::<std::net::IpAddr>().is_err() => {
                    Err(format!("`{}` is not a valid IP address", s))
                },
                _ => Ok(()),
            },
            Self::IpOrCidr => match value.as_str() {
                Some(s) if !helper::is_ip_or_cidr(s) => {
                    Err(format!("`{}` is not a valid IP address or CIDR block", s))
                },
                _ => Ok(()),
            },
            Self::PortRange => match value.as_str() {
                Some(s) if s != "ALL" && !helper::is_port_expression(s) => Err(format!(
                    "`{}` is not a valid port, expected `ALL`, `53`, `80,443` or `80-90`",
                    s
                )),
                _ => Ok(()),
            },
        }
    }
}

/// Describes a single attribute in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    #[serde(flatten)]
    pub flags: AttributeFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Changing this attribute forces resource replacement.
    #[serde(default)]
    pub force_new: bool,
    /// Value used when configuration omits the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
}

impl Attribute {
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
            validators: Vec::new(),
        }
    }

    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    pub fn optional_computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional_computed())
    }

    pub fn required_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::required())
    }

    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    pub fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::computed())
    }

    pub fn optional_computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional_computed())
    }

    pub fn required_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::required())
    }

    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    pub fn computed_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::computed())
    }

    /// Optional list of strings.
    pub fn optional_string_list() -> Self {
        Self::new(
            AttributeType::list(AttributeType::String),
            AttributeFlags::optional(),
        )
    }

    /// Optional set of strings.
    pub fn optional_string_set() -> Self {
        Self::new(
            AttributeType::set(AttributeType::String),
            AttributeFlags::optional(),
        )
    }

    pub fn computed_string_list() -> Self {
        Self::new(
            AttributeType::list(AttributeType::String),
            AttributeFlags::computed(),
        )
    }

    /// Optional string-to-string map, e.g. `tags`.
    pub fn optional_string_map() -> Self {
        Self::new(
            AttributeType::map(AttributeType::String),
            AttributeFlags::optional(),
        )
    }

    pub fn computed_string_map() -> Self {
        Self::new(
            AttributeType::map(AttributeType::String),
            AttributeFlags::computed(),
        )
    }

    /// Computed list of objects with the given element attributes.
    pub fn computed_object_list<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, AttributeType)>,
        K: Into<String>,
    {
        Self::new(
            AttributeType::list(AttributeType::object(attributes)),
            AttributeFlags::computed(),
        )
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    /// Mark an optional attribute as also computed.
    pub fn computed(mut self) -> Self {
        self.flags.computed = true;
        self
    }
}

/// The nesting mode for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// At most one nested block.
    #[default]
    Single,
    /// Zero or more ordered blocks.
    List,
    /// Zero or more unordered, unique blocks.
    Set,
    /// Blocks keyed by string.
    Map,
}

/// A group of attributes and nested blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A nested block with its nesting mode and constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    #[serde(flatten)]
    pub block: Block,
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    #[serde(default)]
    pub min_items: u32,
    /// Maximum number of blocks allowed (0 = unlimited).
    #[serde(default)]
    pub max_items: u32,
}

impl NestedBlock {
    fn with_mode(block: Block, nesting_mode: BlockNestingMode, max_items: u32) -> Self {
        Self {
            block,
            nesting_mode,
            min_items: 0,
            max_items,
        }
    }

    pub fn single(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Single, 1)
    }

    pub fn list(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::List, 0)
    }

    pub fn set(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Set, 0)
    }

    pub fn map(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Map, 0)
    }

    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }
}

/// Schema for a resource or data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Version used for state upgrades.
    #[serde(default)]
    pub version: u64,
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    pub fn v0() -> Self {
        Self::new(0)
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }

    /// Add the `result_output_file` attribute shared by every data source.
    pub fn with_result_output_file(self) -> Self {
        self.with_attribute(
            "result_output_file",
            Attribute::optional_string().with_description("Used to save results."),
        )
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.get(name)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Schema for the provider configuration and every registered type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    #[serde(default)]
    pub provider: Schema,
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A diagnostic message returned to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Path of the offending attribute, e.g. `ingress[0].cidr_ip`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Set the attribute path unless `attribute` is empty (the root).
    pub fn with_attribute_if_not_empty(self, attribute: &str) -> Self {
        if attribute.is_empty() {
            self
        } else {
            self.with_attribute(attribute)
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_flags() {
        let computed = AttributeFlags::computed();
        assert!(computed.is_computed_only());

        let optional_computed = AttributeFlags::optional_computed();
        assert!(optional_computed.optional);
        assert!(optional_computed.computed);
        assert!(!optional_computed.is_computed_only());

        assert!(AttributeFlags::required().sensitive().sensitive);
    }

    #[test]
    fn test_attribute_builders() {
        let attr = Attribute::required_string()
            .with_description("The CIDR block of the VPC.")
            .with_force_new()
            .with_validator(Validator::Cidr);

        assert_eq!(attr.attr_type, AttributeType::String);
        assert!(attr.flags.required);
        assert!(attr.force_new);
        assert_eq!(attr.validators, vec![Validator::Cidr]);

        let tags = Attribute::optional_string_map();
        assert_eq!(tags.attr_type, AttributeType::map(AttributeType::String));
    }

    #[test]
    fn test_schema_builder() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("id", Attribute::computed_string())
            .with_block(
                "ipv4s",
                NestedBlock::set(Block::new().with_attribute("ip", Attribute::required_string()))
                    .with_max_items(30),
            )
            .with_result_output_file();

        assert!(schema.attribute("name").is_some());
        assert!(schema.attribute("result_output_file").is_some());
        assert_eq!(schema.block.blocks["ipv4s"].max_items, 30);
    }

    #[test]
    fn test_allowed_values_validators() {
        let v = Validator::allowed_strings(["ACCEPT", "DROP"]);
        assert!(v.check(&json!("ACCEPT")).is_ok());
        assert!(v.check(&json!("accept")).is_err());
        assert!(v.check(&json!(1)).is_ok());

        let v = Validator::allowed_ints(&[100, 1000]);
        assert!(v.check(&json!(1000)).is_ok());
        assert!(v.check(&json!(10)).is_err());
    }

    #[test]
    fn test_range_validators() {
        let v = Validator::string_length(1, 60);
        assert!(v.check(&json!("vpc")).is_ok());
        assert!(v.check(&json!("")).is_err());
        assert!(v.check(&json!("x".repeat(61))).is_err());

        let v = Validator::int_range(1, 65535);
        assert!(v.check(&json!(443)).is_ok());
        assert!(v.check(&json!(0)).is_err());
    }

    #[test]
    fn test_network_validators() {
        assert!(Validator::Cidr.check(&json!("10.0.0.0/16")).is_ok());
        assert!(Validator::Cidr.check(&json!("10.0.0.1")).is_err());
        assert!(Validator::Ip.check(&json!("10.0.0.1")).is_ok());
        assert!(Validator::Ip.check(&json!("10.0.0.0/16")).is_err());
        assert!(Validator::IpOrCidr.check(&json!("10.0.0.0/16")).is_ok());
        assert!(Validator::IpOrCidr.check(&json!("10.0.0.1")).is_ok());
        assert!(Validator::IpOrCidr.check(&json!("10.0.0.0/33")).is_err());
        assert!(Validator::PortRange.check(&json!("ALL")).is_ok());
        assert!(Validator::PortRange.check(&json!("80,443")).is_ok());
        assert!(Validator::PortRange.check(&json!("80-90")).is_ok());
        assert!(Validator::PortRange.check(&json!("80-")).is_err());
    }

    #[test]
    fn test_diagnostic() {
        let err = Diagnostic::error("Invalid configuration")
            .with_detail("The value must be positive")
            .with_attribute_if_not_empty("bandwidth");

        assert!(err.is_error());
        assert_eq!(err.attribute, Some("bandwidth".to_string()));

        let root = Diagnostic::warning("deprecated").with_attribute_if_not_empty("");
        assert!(!root.is_error());
        assert_eq!(root.attribute, None);
    }

    #[test]
    fn test_nested_block_modes() {
        let single = NestedBlock::single(Block::new());
        assert_eq!(single.nesting_mode, BlockNestingMode::Single);
        assert_eq!(single.max_items, 1);

        let list = NestedBlock::list(Block::new()).with_min_items(1);
        assert_eq!(list.nesting_mode, BlockNestingMode::List);
        assert_eq!(list.min_items, 1);
        assert_eq!(list.max_items, 0);
    }
}
