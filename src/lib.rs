//! # asyncload-native
//!
//! Native core of the asyncLoad component loader: a build-time source
//! transform that injects a readiness handshake between parent and child
//! single-file components.
//!
//! ## The handshake
//!
//! 1. **Consumers** — components that reach into children via `this.$refs` —
//!    get each accessing function promoted to `async` with a barrier at the
//!    head of the enclosing block: a promise whose resolver is stored on
//!    `this.asyncLoad`, awaited before the access runs. The `asyncLoad` field
//!    is installed into the object returned by `data()`.
//! 2. **Providers** — components that are reached into — get an
//!    `asyncLoadProp` function prop, a watcher that invokes it, and a mounted
//!    hook that fires it once the child is live.
//! 3. **Templates** — every `ref`-bearing element is wired with
//!    `:asyncLoadProp="asyncLoad"`, handing the parent's resolver to the
//!    child.
//!
//! ## Guarantees
//!
//! - Running the transform over its own output changes nothing.
//! - Bytes outside the rewritten `<script>` block and touched open tags are
//!   preserved exactly.
//! - No input makes the transform panic or error: files it cannot handle pass
//!   through unchanged with a diagnostic.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod cache;
mod consumer;
mod parse;
mod provider;
mod script;
mod transform;
mod wire;


// Internal Rust-to-Rust API (for bundler plugins)
pub use cache::{transform_cached, TransformCache};
pub use parse::{parse_component, SfcBlock, SfcDescriptor};
pub use transform::{
    classify, transform, transform_with_options, Classification, TransformDiagnostic,
    TransformOptions, TransformResult, TransformStatus,
};
pub use wire::wire_template;

#[cfg(feature = "napi")]
pub use transform::{classify_native, transform_native};

#[cfg(feature = "napi")]
#[napi]
pub fn asyncload_bridge() -> String {
    "AsyncLoad Native Bridge Connected".to_string()
}
