//! The built-in node library.
//!
//! A small set of ready-made node types covering the common arithmetic,
//! string and graphic operations. [`catalog`] returns them registered in a
//! fresh [`NodeCatalog`].

use crate::catalog::NodeCatalog;
use crate::model::node::{CookError, Mode, NodeSpec};
use crate::model::port::{Port, PortSet};
use crate::model::value::{Graphic, PortType, Value};

fn write_int(ports: &mut PortSet, name: &str, value: i64) -> Result<(), CookError> {
    match ports.get_mut(name) {
        Some(port) => port
            .set_value(Value::Integer(value))
            .map_err(|e| Box::new(e) as CookError),
        None => Err(format!("missing output port '{}'", name).into()),
    }
}

fn write_string(ports: &mut PortSet, name: &str, value: String) -> Result<(), CookError> {
    match ports.get_mut(name) {
        Some(port) => port
            .set_value(Value::String(value))
            .map_err(|e| Box::new(e) as CookError),
        None => Err(format!("missing output port '{}'", name).into()),
    }
}

fn read_int(ports: &PortSet, name: &str) -> i64 {
    ports.get(name).map(Port::as_int).unwrap_or(0)
}

/// A producer holding a constant integer. Cooking it explicitly copies the
/// stored value onto its output.
pub fn number() -> NodeSpec {
    NodeSpec::new("number", Mode::Producer)
        .with_description("A constant integer value.")
        .with_port(Port::input("value", PortType::Integer))
        .with_port(Port::output("result", PortType::Integer))
        .with_behavior(|ports: &mut PortSet| {
            let v = read_int(ports, "value");
            write_int(ports, "result", v)
        })
}

pub fn negate() -> NodeSpec {
    NodeSpec::new("negate", Mode::Filter)
        .with_description("Negate the input value.")
        .with_port(Port::input("value", PortType::Integer))
        .with_port(Port::output("result", PortType::Integer))
        .with_behavior(|ports: &mut PortSet| {
            let v = read_int(ports, "value");
            write_int(ports, "result", -v)
        })
}

pub fn add() -> NodeSpec {
    NodeSpec::new("add", Mode::Consumer)
        .with_description("Add two values.")
        .with_port(Port::input("v1", PortType::Integer))
        .with_port(Port::input("v2", PortType::Integer))
        .with_port(Port::output("result", PortType::Integer))
        .with_behavior(|ports: &mut PortSet| {
            let sum = read_int(ports, "v1") + read_int(ports, "v2");
            write_int(ports, "result", sum)
        })
}

pub fn multiply() -> NodeSpec {
    NodeSpec::new("multiply", Mode::Consumer)
        .with_description("Multiply two values.")
        .with_port(Port::input("v1", PortType::Integer))
        .with_port(Port::input("v2", PortType::Integer))
        .with_port(Port::output("result", PortType::Integer))
        .with_behavior(|ports: &mut PortSet| {
            let product = read_int(ports, "v1") * read_int(ports, "v2");
            write_int(ports, "result", product)
        })
}

pub fn uppercase() -> NodeSpec {
    NodeSpec::new("uppercase", Mode::Filter)
        .with_description("Convert a string to upper case.")
        .with_port(Port::input("value", PortType::String))
        .with_port(Port::output("result", PortType::String))
        .with_behavior(|ports: &mut PortSet| {
            let v = ports.get("value").map(Port::as_string).unwrap_or_default();
            write_string(ports, "result", v.to_uppercase())
        })
}

/// Wrap a string into a text graphic, demonstrating the graphic family.
pub fn textpath() -> NodeSpec {
    NodeSpec::new("textpath", Mode::Filter)
        .with_description("Turn a string into a text graphic.")
        .with_port(Port::input("text", PortType::String))
        .with_port(Port::output("result", PortType::Text))
        .with_behavior(|ports: &mut PortSet| {
            let text = ports.get("text").map(Port::as_string).unwrap_or_default();
            match ports.get_mut("result") {
                Some(port) => port
                    .set_value(Value::Graphic(Graphic::Text(text)))
                    .map_err(|e| Box::new(e) as CookError),
                None => Err("missing output port 'result'".into()),
            }
        })
}

/// Merge two graphics. Two paths concatenate; otherwise the first present
/// input wins. With no inputs the output stays empty.
pub fn merge() -> NodeSpec {
    NodeSpec::new("merge", Mode::Filter)
        .with_description("Merge two graphics into one.")
        .with_port(Port::input("g1", PortType::Graphic))
        .with_port(Port::input("g2", PortType::Graphic))
        .with_port(Port::output("result", PortType::Graphic))
        .with_behavior(|ports: &mut PortSet| {
            let g1 = ports.get("g1").and_then(|p| p.value().cloned());
            let g2 = ports.get("g2").and_then(|p| p.value().cloned());
            let merged = match (g1, g2) {
                (
                    Some(Value::Graphic(Graphic::Path(mut a))),
                    Some(Value::Graphic(Graphic::Path(b))),
                ) => {
                    a.extend(b);
                    Some(Value::Graphic(Graphic::Path(a)))
                }
                (Some(a), _) => Some(a),
                (None, b) => b,
            };
            match merged {
                Some(value) => match ports.get_mut("result") {
                    Some(port) => port
                        .set_value(value)
                        .map_err(|e| Box::new(e) as CookError),
                    None => Err("missing output port 'result'".into()),
                },
                None => Ok(()),
            }
        })
}

/// A macro container. Children and connections are added after creation.
pub fn macro_container() -> NodeSpec {
    NodeSpec::container("macro").with_description("An empty container node.")
}

/// All built-in node types registered in a fresh catalog.
pub fn catalog() -> NodeCatalog {
    let mut catalog = NodeCatalog::new();
    catalog.register("number", number);
    catalog.register("negate", negate);
    catalog.register("add", add);
    catalog.register("multiply", multiply);
    catalog.register("uppercase", uppercase);
    catalog.register("textpath", textpath);
    catalog.register("merge", merge);
    catalog.register("macro", macro_container);
    catalog
}
