use rustc_hash::FxHashMap;

/// Named value read by transition conditions and blend trees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Bool(bool),
    Int(i32),
    /// Behaves like a bool that resets after every state machine update
    Trigger(bool),
}

/// Gameplay-driven inputs of a state machine.
///
/// Reads of unknown names return the type's zero value.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    values: FxHashMap<String, ParamValue>,
}

impl Parameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    pub fn set_float(&mut self, name: impl Into<String>, value: f32) {
        self.set(name, ParamValue::Float(value));
    }

    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) {
        self.set(name, ParamValue::Bool(value));
    }

    pub fn set_int(&mut self, name: impl Into<String>, value: i32) {
        self.set(name, ParamValue::Int(value));
    }

    pub fn set_trigger(&mut self, name: impl Into<String>) {
        self.set(name, ParamValue::Trigger(true));
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values.get(name).copied()
    }

    /// Numeric view: ints are converted, bools map to 0/1.
    pub fn float(&self, name: &str) -> f32 {
        match self.get(name) {
            Some(ParamValue::Float(v)) => v,
            Some(ParamValue::Int(v)) => v as f32,
            Some(ParamValue::Bool(v) | ParamValue::Trigger(v)) => {
                if v { 1.0 } else { 0.0 }
            }
            None => 0.0,
        }
    }

    pub fn int(&self, name: &str) -> i32 {
        match self.get(name) {
            Some(ParamValue::Int(v)) => v,
            Some(ParamValue::Float(v)) => v as i32,
            Some(ParamValue::Bool(v) | ParamValue::Trigger(v)) => i32::from(v),
            None => 0,
        }
    }

    pub fn bool(&self, name: &str) -> bool {
        match self.get(name) {
            Some(ParamValue::Bool(v) | ParamValue::Trigger(v)) => v,
            Some(ParamValue::Float(v)) => v != 0.0,
            Some(ParamValue::Int(v)) => v != 0,
            None => false,
        }
    }

    /// Clears every trigger.
    pub(crate) fn reset_triggers(&mut self) {
        for value in self.values.values_mut() {
            if let ParamValue::Trigger(set) = value {
                *set = false;
            }
        }
    }
}
