//! compass-construct: replays construction documents into a scene.
//!
//! - [`interpret()`] -- drives one pass over a [`ConstructionDocument`](compass_interchange::ConstructionDocument)
//! - [`registry`] -- the named-element registry the pass fills in
//! - [`builders`] -- per-type construction functions keyed by type tag
//! - [`scene`] -- the [`SceneFactory`] contract the builders create objects through
//! - [`memory_scene`] -- a scene that computes geometry in memory
//!
//! Failures are isolated per entry and collected as [`Diagnostic`]s; the
//! pass itself never aborts.

pub mod attributes;
pub mod builders;
pub mod diagnostic;
pub mod index;
pub mod interpret;
pub mod memory_scene;
pub mod registry;
pub mod scene;

// ── Convenience re-exports: key types ────────────────────────────────

pub use builders::{BuildError, BuildRequest, Builder, BuilderTable, Built, Resolved};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use index::DocumentIndex;
pub use interpret::{Compiled, InterpreterContext, InterpreterOptions, Interpretation};
pub use memory_scene::{Measurements, MemoryScene, SceneEntry};
pub use registry::{Binding, NamedElement, ObjectClass, Registry, RegistryError, SceneObject};
pub use scene::{Attributes, ObjectHandle, Parent, SceneError, SceneFactory, SubObjects};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use interpret::interpret;
