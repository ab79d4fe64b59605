//! Ports: the typed connection points on a node.

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::model::value::{Color, PortType, Value};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

const MAX_NAME_LENGTH: usize = 30;
const RESERVED_WORDS: &[&str] = &["node", "network", "root", "context"];

/// Validate an identifier used for node and port names.
///
/// Names must be non-empty, start with a letter or underscore, contain only
/// letters, digits and underscores, be at most 30 characters, not start with
/// a double underscore and not be a reserved word.
pub fn validate_name(name: &str) -> Result<(), GraphError> {
    if name.is_empty() {
        return Err(GraphError::invalid_name(name, "name cannot be empty"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(GraphError::invalid_name(
            name,
            format!("name cannot be longer than {} characters", MAX_NAME_LENGTH),
        ));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(GraphError::invalid_name(
            name,
            "name must start with a letter or underscore",
        ));
    }
    if name.chars().any(|c| !(c.is_ascii_alphanumeric() || c == '_')) {
        return Err(GraphError::invalid_name(
            name,
            "name can only contain letters, digits and underscores",
        ));
    }
    if name.starts_with("__") {
        return Err(GraphError::invalid_name(
            name,
            "names starting with a double underscore are reserved for internal use",
        ));
    }
    if RESERVED_WORDS.contains(&name) {
        return Err(GraphError::invalid_name(name, "name is a reserved word"));
    }
    Ok(())
}

/// A single typed connection point on a node.
///
/// A port is owned by exactly one node and cannot move to another. Its value
/// is nullable: ports of the graphic family default to no value.
#[derive(Clone, Debug)]
pub struct Port {
    name: String,
    port_type: PortType,
    direction: Direction,
    value: Option<Value>,
    expression: Option<String>,
    /// Presentation label, not used by the engine.
    label: Option<String>,
}

impl Port {
    pub fn new(name: &str, port_type: PortType, direction: Direction) -> Self {
        Self {
            name: name.to_string(),
            port_type,
            direction,
            value: port_type.default_value(),
            expression: None,
            label: None,
        }
    }

    pub fn input(name: &str, port_type: PortType) -> Self {
        Self::new(name, port_type, Direction::Input)
    }

    pub fn output(name: &str, port_type: PortType) -> Self {
        Self::new(name, port_type, Direction::Output)
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port_type(&self) -> PortType {
        self.port_type
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    pub fn set_expression(&mut self, expression: Option<String>) {
        self.expression = expression;
    }

    /// Set the value of this port.
    ///
    /// Fails with `TypeMismatch` if the declared type does not accept the
    /// value's runtime type. As a special case a float port accepts integer
    /// values, which are stored converted.
    pub fn set_value(&mut self, value: Value) -> Result<(), GraphError> {
        let value = match (self.port_type, &value) {
            (PortType::Float, Value::Integer(v)) => Value::Float(*v as f64),
            _ => {
                if !self.port_type.accepts(value.port_type()) {
                    return Err(GraphError::TypeMismatch {
                        port: self.name.clone(),
                        expected: self.port_type,
                        actual: value.port_type(),
                    });
                }
                value
            }
        };
        self.value = Some(value);
        Ok(())
    }

    /// Assign a possibly-absent value, as propagated over a connection.
    /// `None` clears the stored value.
    pub(crate) fn assign(&mut self, value: Option<Value>) -> Result<(), GraphError> {
        match value {
            Some(value) => self.set_value(value),
            None => {
                self.value = None;
                Ok(())
            }
        }
    }

    /// Reset the value to the declared type's zero value.
    ///
    /// Called when a connection into this port is removed.
    pub fn revert_to_default(&mut self) {
        self.value = self.port_type.default_value();
    }

    pub fn as_int(&self) -> i64 {
        self.value.as_ref().map(Value::as_int).unwrap_or(0)
    }

    pub fn as_float(&self) -> f64 {
        self.value.as_ref().map(Value::as_float).unwrap_or(0.0)
    }

    pub fn as_string(&self) -> String {
        self.value.as_ref().map(Value::as_string).unwrap_or_default()
    }

    pub fn as_color(&self) -> Color {
        self.value.as_ref().map(Value::as_color).unwrap_or(Color::BLACK)
    }
}

/// The set of ports owned by one node. Port names are unique within the set.
#[derive(Clone, Debug, Default)]
pub struct PortSet {
    ports: Vec<Port>,
}

impl PortSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a port. Fails if the name is invalid or already taken.
    pub fn add(&mut self, port: Port) -> Result<(), GraphError> {
        validate_name(port.name())?;
        if self.contains(port.name()) {
            return Err(GraphError::invalid_name(
                port.name(),
                "there is already a port with this name",
            ));
        }
        self.ports.push(port);
        Ok(())
    }

    /// Remove a port by name. Returns the removed port, if any.
    pub fn remove(&mut self, name: &str) -> Option<Port> {
        let index = self.ports.iter().position(|p| p.name() == name)?;
        Some(self.ports.remove(index))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ports.iter().any(|p| p.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Port> {
        self.ports.iter_mut()
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.is_input())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.is_output())
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("multiply1").is_ok());
        assert!(validate_name("_x").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("1abc").is_err());
        assert!(validate_name("with space").is_err());
        assert!(validate_name("with-dash").is_err());
        assert!(validate_name("__reserved").is_err());
        assert!(validate_name("root").is_err());
        assert!(validate_name("network").is_err());
        assert!(validate_name(&"x".repeat(31)).is_err());
        assert!(validate_name(&"x".repeat(30)).is_ok());
    }

    #[test]
    fn test_new_port_has_default_value() {
        let p = Port::input("v", PortType::Integer);
        assert_eq!(p.value(), Some(&Value::Integer(0)));
        let p = Port::input("shape", PortType::Shape);
        assert_eq!(p.value(), None);
    }

    #[test]
    fn test_set_value_type_checked() {
        let mut p = Port::input("v", PortType::Integer);
        assert!(p.set_value(Value::Integer(42)).is_ok());
        assert_eq!(p.as_int(), 42);
        let err = p.set_value(Value::String("nope".into())).unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { .. }));
        // The failed set did not change the stored value.
        assert_eq!(p.as_int(), 42);
    }

    #[test]
    fn test_float_port_accepts_integer() {
        let mut p = Port::input("v", PortType::Float);
        p.set_value(Value::Integer(3)).unwrap();
        assert_eq!(p.value(), Some(&Value::Float(3.0)));
    }

    #[test]
    fn test_graphic_port_accepts_subtype_value() {
        let mut p = Port::input("g", PortType::Graphic);
        p.set_value(Value::Graphic(crate::model::value::Graphic::Text(
            "hi".into(),
        )))
        .unwrap();
        assert!(p.value().is_some());
    }

    #[test]
    fn test_revert_to_default() {
        let mut p = Port::input("v", PortType::Integer);
        p.set_value(Value::Integer(9)).unwrap();
        p.revert_to_default();
        assert_eq!(p.value(), Some(&Value::Integer(0)));
    }

    #[test]
    fn test_port_set_rejects_duplicates() {
        let mut ports = PortSet::new();
        ports.add(Port::input("v", PortType::Integer)).unwrap();
        let err = ports.add(Port::output("v", PortType::Integer)).unwrap_err();
        assert!(matches!(err, GraphError::InvalidName { .. }));
        assert_eq!(ports.len(), 1);
    }
}
