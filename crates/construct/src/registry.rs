//! The scene registry: every name the interpreter has settled, in the
//! order it was settled.

use std::collections::BTreeMap;

use compass_core::{Capability, Symbol};
use compass_eval::Callable;
use serde::Serialize;
use thiserror::Error;

use crate::scene::ObjectHandle;

/// Broad geometric class of a scene object. Fixes its capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Point,
    Line,
    Vector,
    Circle,
    Arc,
    /// Polygons, sectors and ellipses.
    Region,
    /// Function graphs and conics.
    Curve,
    Value,
    Text,
    Axis,
}

impl ObjectClass {
    pub fn capability(self) -> Capability {
        match self {
            ObjectClass::Line => Capability::Length,
            ObjectClass::Vector => Capability::Direction,
            ObjectClass::Circle | ObjectClass::Region => Capability::Area,
            ObjectClass::Value => Capability::NumericValue,
            ObjectClass::Text => Capability::PlainText,
            ObjectClass::Point | ObjectClass::Arc | ObjectClass::Curve | ObjectClass::Axis => {
                Capability::Generic
            }
        }
    }
}

/// A constructed scene object as the registry sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneObject {
    pub handle: ObjectHandle,
    /// The construction-type tag it was created with.
    pub tag: String,
    pub class: ObjectClass,
    pub capability: Capability,
}

impl SceneObject {
    pub fn new(handle: ObjectHandle, tag: impl Into<String>, class: ObjectClass) -> Self {
        SceneObject {
            handle,
            tag: tag.into(),
            class,
            capability: class.capability(),
        }
    }
}

/// What a name was bound to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "binding", rename_all = "snake_case")]
pub enum Binding {
    Object { object: SceneObject },
    /// A free value: a zero-argument function defined on the scene.
    Value { value: Callable },
    /// Construction was attempted and failed.
    NoObject,
}

impl Binding {
    pub fn object(object: SceneObject) -> Self {
        Binding::Object { object }
    }

    pub fn value(value: Callable) -> Self {
        Binding::Value { value }
    }

    pub fn as_object(&self) -> Option<&SceneObject> {
        match self {
            Binding::Object { object } => Some(object),
            _ => None,
        }
    }

    pub fn is_constructed(&self) -> bool {
        !matches!(self, Binding::NoObject)
    }

    /// How code generation sees this binding.
    pub fn symbol(&self) -> Symbol {
        match self {
            Binding::Object { object } => Symbol::Object(object.capability),
            Binding::Value { .. } => Symbol::FreeValue,
            Binding::NoObject => Symbol::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedElement {
    pub name: String,
    pub kind: String,
    /// Names referenced by the defining command or expression.
    pub dependencies: Vec<String>,
    #[serde(flatten)]
    pub binding: Binding,
    /// Defining function bound after construction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<Callable>,
    /// Position in construction order.
    pub sequence: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("'{name}' is already constructed")]
    AlreadyConstructed { name: String },
    #[error("'{name}' is not registered")]
    NotFound { name: String },
    #[error("'{name}' already has a definition")]
    DefinitionBound { name: String },
}

/// Mapping name → [`NamedElement`]. A name is registered at most once.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, NamedElement>,
    order: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        kind: &str,
        dependencies: Vec<String>,
        binding: Binding,
    ) -> Result<&NamedElement, RegistryError> {
        if self.entries.contains_key(name) {
            return Err(RegistryError::AlreadyConstructed {
                name: name.to_owned(),
            });
        }
        let element = NamedElement {
            name: name.to_owned(),
            kind: kind.to_owned(),
            dependencies,
            binding,
            definition: None,
            sequence: self.order.len(),
        };
        self.order.push(name.to_owned());
        Ok(self.entries.entry(name.to_owned()).or_insert(element))
    }

    /// Record the defining function of an already registered name.
    pub fn attach_definition(&mut self, name: &str, definition: Callable) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_owned(),
            })?;
        if entry.definition.is_some() {
            return Err(RegistryError::DefinitionBound {
                name: name.to_owned(),
            });
        }
        entry.definition = Some(definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&NamedElement> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.get(name).and_then(|e| e.binding.as_object())
    }

    /// Entries in construction order.
    pub fn iter(&self) -> impl Iterator<Item = &NamedElement> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
