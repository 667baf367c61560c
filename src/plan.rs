//! Schema-driven planning of resource changes.
//!
//! A plan compares the prior state with the proposed one attribute by
//! attribute. Defaults fill unset attributes, computed attributes the
//! configuration leaves open keep their prior value, and a change to any
//! `force_new` attribute turns the update into a replacement.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::schema::{AttributeType, Block, BlockNestingMode, Schema};
use crate::state::{is_empty_value as is_empty, same_value};
use crate::types::{AttributeChange, PlanResult};

/// Plan the transition from `prior` to `proposed`.
///
/// A `null` proposal plans a destroy, a missing prior state plans a create.
pub fn plan(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let prior = prior.filter(|v| !v.is_null());

    if proposed.is_null() {
        return match prior {
            Some(prior) => PlanResult::destroy(prior),
            None => PlanResult::no_change(Value::Null),
        };
    }

    let mut planned = proposed.as_object().cloned().unwrap_or_default();
    apply_defaults(&schema.block, &mut planned);

    match prior.and_then(Value::as_object) {
        Some(prior) => plan_update(&schema.block, prior, planned),
        None => plan_create(&schema.block, planned),
    }
}

fn plan_create(block: &Block, mut planned: Map<String, Value>) -> PlanResult {
    for (name, attr) in &block.attributes {
        if attr.flags.is_computed_only() {
            planned.remove(name);
        }
    }

    let changes = planned
        .iter()
        .filter(|(_, v)| !is_empty(v))
        .map(|(k, v)| AttributeChange::added(k.clone(), v.clone()))
        .collect();

    PlanResult::with_changes(Value::Object(planned), changes, false)
}

fn plan_update(block: &Block, prior: &Map<String, Value>, mut planned: Map<String, Value>) -> PlanResult {
    let mut carried = Vec::new();
    for (name, attr) in &block.attributes {
        if !attr.flags.computed || !planned.get(name).map_or(true, is_empty) {
            continue;
        }
        if let Some(value) = prior.get(name).filter(|v| !v.is_null()) {
            planned.insert(name.clone(), value.clone());
            carried.push(name.clone());
        }
    }

    let keys: BTreeSet<&String> = prior.keys().chain(planned.keys()).collect();
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for key in keys {
        let Some(shape) = Shape::of(block, key) else {
            continue;
        };
        if shape.computed_only {
            continue;
        }

        let before = prior.get(key.as_str()).filter(|v| !is_empty(v));
        let after = planned.get(key.as_str()).filter(|v| !is_empty(v));
        if same_value(before, after, shape.unordered) {
            continue;
        }

        requires_replace |= match &shape.force_new_fields {
            Some(fields) => !same_value(
                project(before, fields).as_ref(),
                project(after, fields).as_ref(),
                shape.unordered,
            ),
            None => shape.force_new,
        };
        changes.push(AttributeChange::new(key.clone(), before.cloned(), after.cloned()));
    }

    if changes.is_empty() {
        return PlanResult::no_change(Value::Object(planned));
    }

    if requires_replace {
        // The replacement recomputes everything the API fills in.
        for name in carried {
            planned.remove(&name);
        }
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

/// What planning needs to know about one top-level key.
struct Shape {
    computed_only: bool,
    force_new: bool,
    unordered: bool,
    /// For nested blocks, the item attributes that force a replacement.
    force_new_fields: Option<Vec<String>>,
}

impl Shape {
    fn of(block: &Block, key: &str) -> Option<Self> {
        if let Some(attr) = block.attributes.get(key) {
            return Some(Self {
                computed_only: attr.flags.is_computed_only(),
                force_new: attr.force_new,
                unordered: matches!(attr.attr_type, AttributeType::Set(_)),
                force_new_fields: None,
            });
        }
        block.blocks.get(key).map(|nested| {
            let fields: Vec<String> = nested
                .block
                .attributes
                .iter()
                .filter(|(_, a)| a.force_new)
                .map(|(name, _)| name.clone())
                .collect();
            Self {
                computed_only: false,
                force_new: !fields.is_empty(),
                unordered: nested.nesting_mode == BlockNestingMode::Set,
                force_new_fields: Some(fields),
            }
        })
    }
}

/// Reduce block items to `fields`, so only those drive a replacement.
fn project(value: Option<&Value>, fields: &[String]) -> Option<Value> {
    if fields.is_empty() {
        return None;
    }
    let items = match value? {
        Value::Array(items) => items.clone(),
        single => vec![single.clone()],
    };
    let projected: Vec<Value> = items
        .iter()
        .map(|item| {
            let picked = fields
                .iter()
                .filter_map(|f| {
                    let v = item.get(f)?;
                    (!is_empty(v)).then(|| (f.clone(), v.clone()))
                })
                .collect::<Map<String, Value>>();
            Value::Object(picked)
        })
        .collect();
    Some(Value::Array(projected))
}

/// Fill unset attributes with their schema defaults, nested blocks included.
pub fn apply_defaults(block: &Block, attrs: &mut Map<String, Value>) {
    for (name, attr) in &block.attributes {
        let Some(default) = &attr.default else {
            continue;
        };
        if attrs.get(name).map_or(true, Value::is_null) {
            attrs.insert(name.clone(), default.clone());
        }
    }

    for (name, nested) in &block.blocks {
        match attrs.get_mut(name) {
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    if let Value::Object(obj) = item {
                        apply_defaults(&nested.block, obj);
                    }
                }
            },
            Some(Value::Object(obj)) => apply_defaults(&nested.block, obj),
            _ => {},
        }
    }
}
