// SPDX-License-Identifier: Apache-2.0
//! mantle-core: reversible property-overlay engine for dynamic objects.
//!
//! A [`Patch`] captures a set of property descriptors from a spec object,
//! applies them to an owner with conflict capture, and reverts them so the
//! owner ends exactly as it started. Registries, toggles, aggregation views
//! and the batch cleaner build on that core.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::cognitive_complexity,
    clippy::option_if_let_else,
    clippy::significant_drop_tightening,
    clippy::doc_markdown,
    clippy::too_many_lines,
    clippy::too_long_first_doc_paragraph,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::similar_names,
    clippy::manual_let_else,
    clippy::needless_pass_by_value,
    clippy::multiple_crate_versions
)]

mod cleaner;
mod descriptor;
mod entry;
mod key;
mod object;
mod patch;
mod registry;
mod toggle;
mod value;
mod views;

// Re-exports for stable public API
/// Batch teardown of tracked patches.
pub use cleaner::PatchCleaner;
/// Property descriptors and the four descriptor templates.
pub use descriptor::{Descriptor, DescriptorKind, DescriptorTemplate, GetterFn, SetterFn};
/// Per-key patch units.
pub use entry::{ConditionFn, EntryError, PatchEntry};
/// Property keys: interned strings and symbols.
pub use key::{PropertyKey, SymbolId};
/// The dynamic object substrate.
pub use object::{Object, ObjectError, ObjectId};
/// The patch orchestrator and its reports.
pub use patch::{ApplyReport, Patch, PatchError, PatchOptions, RevertReport};
/// Patch bookkeeping per owner.
pub use registry::{default_registry, PatchRegistry};
/// Scoped enable/disable wrappers.
pub use toggle::{PatchToggle, ToggleGuard};
/// Dynamic values.
pub use value::{CallFn, NativeFn, Value};
/// Flattened aggregation surfaces.
pub use views::{ScopedViews, UseHandle};
