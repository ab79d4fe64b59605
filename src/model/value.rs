//! Values that flow through ports, and the declared types that constrain them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared data type of a port.
///
/// Types are nominal. `Graphic` is the supertype of the graphic family:
/// a `Graphic` input accepts a `Shape` or `Text` output, but not the other
/// way around.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    Integer,
    Float,
    String,
    Color,
    Shape,
    Text,
    Graphic,
}

impl PortType {
    /// Check if an input of this type accepts an output of type `other`.
    pub fn accepts(self, other: PortType) -> bool {
        self == other
            || matches!(
                (self, other),
                (PortType::Graphic, PortType::Shape) | (PortType::Graphic, PortType::Text)
            )
    }

    /// The zero value for this type, or `None` for the non-primitive
    /// graphic family.
    pub fn default_value(self) -> Option<Value> {
        match self {
            PortType::Integer => Some(Value::Integer(0)),
            PortType::Float => Some(Value::Float(0.0)),
            PortType::String => Some(Value::String(String::new())),
            PortType::Color => Some(Value::Color(Color::BLACK)),
            PortType::Shape | PortType::Text | PortType::Graphic => None,
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortType::Integer => "integer",
            PortType::Float => "float",
            PortType::String => "string",
            PortType::Color => "color",
            PortType::Shape => "shape",
            PortType::Text => "text",
            PortType::Graphic => "graphic",
        };
        write!(f, "{}", s)
    }
}

/// RGBA color with components in 0.0..=1.0.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };

    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Gray color with the given level for all three channels.
    pub fn gray(v: f64) -> Self {
        Self::new(v, v, v)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A value of the graphic family.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Graphic {
    Path(Vec<Point>),
    Text(String),
}

/// A runtime value stored on a port.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Color(Color),
    Graphic(Graphic),
}

impl Value {
    /// The type tag of this value.
    pub fn port_type(&self) -> PortType {
        match self {
            Value::Integer(_) => PortType::Integer,
            Value::Float(_) => PortType::Float,
            Value::String(_) => PortType::String,
            Value::Color(_) => PortType::Color,
            Value::Graphic(Graphic::Path(_)) => PortType::Shape,
            Value::Graphic(Graphic::Text(_)) => PortType::Text,
        }
    }

    /// Get the value as an integer. Floats are rounded; anything else is 0.
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Integer(v) => *v,
            Value::Float(v) => v.round() as i64,
            _ => 0,
        }
    }

    /// Get the value as a float. Integers are converted; anything else is 0.0.
    pub fn as_float(&self) -> f64 {
        match self {
            Value::Float(v) => *v,
            Value::Integer(v) => *v as f64,
            _ => 0.0,
        }
    }

    /// Get the value as a string, using the display form for non-strings.
    pub fn as_string(&self) -> String {
        self.to_string()
    }

    /// Get the value as a color. A float is used for all three channels;
    /// anything else that is not a color yields black.
    pub fn as_color(&self) -> Color {
        match self {
            Value::Color(c) => *c,
            Value::Float(v) => Color::gray(*v),
            _ => Color::BLACK,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Color(c) => write!(f, "color({}, {}, {}, {})", c.r, c.g, c.b, c.a),
            Value::Graphic(Graphic::Path(points)) => write!(f, "path[{} points]", points.len()),
            Value::Graphic(Graphic::Text(t)) => write!(f, "text({})", t),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Color> for Value {
    fn from(v: Color) -> Self {
        Value::Color(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => Value::Integer(b as i64),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }
    }
}
