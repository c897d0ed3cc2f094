//! Declared props: validation, boolean casting and default resolution.
//!
//! Validation never throws. Mismatches are reported on the diagnostic
//! channel and execution continues with the best value available.

use std::rc::Rc;

use crate::error::{handle_error, InstanceError};
use crate::instance::Instance;
use crate::reactive::state::{observe, toggle_observing};
use crate::value::Value;
use crate::vnode::AttrMap;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PropType {
    Bool,
    Num,
    Str,
    List,
    Map,
}

impl PropType {
    fn name(&self) -> &'static str {
        match self {
            PropType::Bool => "Boolean",
            PropType::Num => "Number",
            PropType::Str => "String",
            PropType::List => "Array",
            PropType::Map => "Object",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PropType::Bool, Value::Bool(_))
                | (PropType::Num, Value::Num(_))
                | (PropType::Str, Value::Str(_))
                | (PropType::List, Value::List(_))
                | (PropType::Map, Value::Map(_))
        )
    }
}

#[derive(Clone)]
pub enum PropDefault {
    Value(Value),
    Factory(Rc<dyn Fn(&Instance) -> Result<Value, InstanceError>>),
}

#[derive(Clone, Default)]
pub struct PropOptions {
    /// Accepted types, in priority order. Empty accepts anything.
    pub types: Vec<PropType>,
    pub required: bool,
    pub default: Option<PropDefault>,
    pub validator: Option<Rc<dyn Fn(&Value) -> bool>>,
}

impl PropOptions {
    pub fn of_type(ty: PropType) -> Self {
        Self {
            types: vec![ty],
            ..Self::default()
        }
    }

    fn type_index(&self, ty: PropType) -> Option<usize> {
        self.types.iter().position(|t| *t == ty)
    }
}

/// Computes the effective value of one declared prop from the raw prop bag.
/// The same path serves initial mount and reconciliation.
pub fn validate_prop(
    key: &str,
    prop: &PropOptions,
    props_data: &AttrMap,
    vm: Option<&Instance>,
) -> Value {
    let absent = !props_data.contains_key(key);
    let mut value = props_data.get(key).cloned();

    // Boolean casting: a bare attribute (empty string / own name) means
    // `true` when Boolean is declared with higher priority than String.
    if let Some(bool_index) = prop.type_index(PropType::Bool) {
        if absent && prop.default.is_none() {
            value = Some(Value::Bool(false));
        } else if let Some(Value::Str(s)) = &value {
            if s.is_empty() || **s == hyphenate(key) {
                let str_index = prop.type_index(PropType::Str);
                if str_index.map_or(true, |i| bool_index < i) {
                    value = Some(Value::Bool(true));
                }
            }
        }
    }

    let value = match value {
        Some(value) => value,
        None => {
            let default = prop_default(vm, prop, key);
            // The default is a fresh value; make sure it is observed even
            // if the caller toggled observation off for the raw bag.
            let prev = toggle_observing(true);
            observe(&default);
            toggle_observing(prev);
            default
        }
    };

    assert_prop(prop, key, &value, absent);
    value
}

fn prop_default(vm: Option<&Instance>, prop: &PropOptions, key: &str) -> Value {
    let Some(default) = &prop.default else {
        return Value::Null;
    };
    // The raw value was also missing on the previous pass; reusing the
    // previous default avoids a spurious watcher trigger.
    if let Some(vm) = vm {
        if !vm.raw_prop_present(key) {
            if let Some(previous) = vm.peek_prop(key) {
                if !previous.is_null() {
                    return previous;
                }
            }
        }
    }
    match default {
        PropDefault::Value(value) => value.clone(),
        PropDefault::Factory(factory) => match vm {
            Some(vm) => match factory(vm) {
                Ok(value) => value,
                Err(err) => {
                    handle_error(&err, Some(vm), &format!("default for prop \"{key}\""));
                    Value::Null
                }
            },
            None => Value::Null,
        },
    }
}

fn assert_prop(prop: &PropOptions, name: &str, value: &Value, absent: bool) {
    if prop.required && absent {
        log::warn!("Missing required prop: \"{name}\"");
        return;
    }
    if value.is_null() && !prop.required {
        return;
    }
    if !prop.types.is_empty() && !prop.types.iter().any(|t| t.matches(value)) {
        let expected: Vec<&str> = prop.types.iter().map(PropType::name).collect();
        log::warn!(
            "Invalid prop: type check failed for prop \"{name}\". Expected {}, got {} with value {value:?}.",
            expected.join(", "),
            value.type_name(),
        );
        return;
    }
    if let Some(validator) = &prop.validator {
        if !validator(value) {
            log::warn!("Invalid prop: custom validator check failed for prop \"{name}\".");
        }
    }
}

/// camelCase → kebab-case, for the bare-attribute boolean cast.
pub fn hyphenate(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
