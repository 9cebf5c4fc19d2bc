//! The scene-factory contract.
//!
//! The interpreter never draws anything. It hands a construction-type tag,
//! resolved parents and an attribute bag to a [`SceneFactory`] and keeps the
//! returned handle. The factory is also the [`Environment`] compiled
//! expressions read object state from.

use std::collections::BTreeMap;
use std::fmt;

use compass_eval::{Callable, Environment, EvalError};
use serde::Serialize;
use thiserror::Error;

/// Opaque reference to an object owned by the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectHandle(pub u32);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A resolved parent passed to [`SceneFactory::create`].
#[derive(Debug, Clone, PartialEq)]
pub enum Parent {
    Object(ObjectHandle),
    Number(f64),
    /// Re-evaluated whenever the scene needs the value.
    Function(Callable),
    Text(String),
}

impl Parent {
    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            Parent::Object(h) => Some(*h),
            _ => None,
        }
    }
}

/// Display attributes keyed by name, in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, serde_json::Value>);

impl Attributes {
    pub fn new() -> Self {
        Attributes::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.0.insert(key.to_owned(), value.into());
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(|v| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Auxiliary objects a scene creates alongside a primary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubObjects {
    /// Polygon edges, in vertex order.
    Borders,
    /// Corners created by the scene (regular polygons).
    Vertices,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("unknown element type '{tag}'")]
    UnknownType { tag: String },
    #[error("'{tag}' expects {expected} parents, got {got}")]
    Arity {
        tag: String,
        expected: &'static str,
        got: usize,
    },
    #[error("parent {index} of '{tag}' is not {expected}")]
    ParentKind {
        tag: String,
        index: usize,
        expected: &'static str,
    },
    #[error("degenerate {tag}: {reason}")]
    Degenerate { tag: String, reason: &'static str },
    #[error("no object {0}")]
    UnknownHandle(ObjectHandle),
    #[error("{tag} {handle} has no {what}")]
    NoGeometry {
        tag: String,
        handle: ObjectHandle,
        what: &'static str,
    },
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Creates and owns scene objects.
pub trait SceneFactory: Environment {
    /// Construct an object of type `tag`. Fails on unknown tags, wrong
    /// parents, and degenerate configurations.
    fn create(
        &mut self,
        tag: &str,
        parents: &[Parent],
        attributes: &Attributes,
    ) -> Result<ObjectHandle, SceneError>;

    /// Make `handle` visible to expressions under `name`.
    fn name_object(&mut self, handle: ObjectHandle, name: &str) -> Result<(), SceneError>;

    fn sub_objects(&self, handle: ObjectHandle, which: SubObjects) -> Vec<ObjectHandle>;

    /// Define a zero-argument function readable as a free value.
    fn define_value(&mut self, name: &str, value: Callable) -> Result<(), SceneError>;

    /// Attach a defining function to an existing object.
    fn bind_value(&mut self, handle: ObjectHandle, value: Callable) -> Result<(), SceneError>;

    /// Sent once after a document has been fully interpreted.
    fn full_update(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_keep_a_stable_order() {
        let attrs = Attributes::new()
            .with("name", "A")
            .with("size", 3)
            .with("fixed", true);
        let keys: Vec<&str> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["fixed", "name", "size"]);
        assert_eq!(attrs.name(), Some("A"));
        assert_eq!(
            serde_json::to_string(&attrs).unwrap(),
            r#"{"fixed":true,"name":"A","size":3}"#
        );
    }

    #[test]
    fn scene_errors_render() {
        let err = SceneError::Arity {
            tag: "segment".to_owned(),
            expected: "2",
            got: 1,
        };
        assert_eq!(err.to_string(), "'segment' expects 2 parents, got 1");
        assert_eq!(
            SceneError::UnknownHandle(ObjectHandle(7)).to_string(),
            "no object #7"
        );
    }
}
