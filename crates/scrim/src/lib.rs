//! # Scrim
//!
//! Base layer of the scrim rendering abstraction. Scrim is a thin Vulkan-style
//! layer whose heart is a frame render-graph compiler (see the `scrim-graph`
//! crate). This crate carries everything that compiler and its caller agree on:
//!
//! - [Name]: interned identifiers for passes, resources and attachments.
//! - [resource]: per-pass resource declarations and their lowering to
//!   `{stages, access, layout}` uses.
//! - [descriptions]: the equality-keyed description types the external caches
//!   are keyed on. Equal descriptions must yield equal handles.
//! - [context]: the cache contracts themselves, bundled per thread into a
//!   [PerThreadContext](context::PerThreadContext).
//!
//! Device creation, memory allocation and the cache implementations live
//! outside of this crate. The graph only ever talks to them through the
//! contracts defined here.

use std::{borrow::Borrow, fmt, sync::Arc};

pub mod context;
pub mod descriptions;
pub mod error;
pub mod resource;

pub use ash;
pub use context::{PerThreadContext, Swapchain, SwapchainRef};
pub use error::{CacheError, ResourceError};
pub use resource::{ImageAccess, Resource, ResourceType, Use};

///Interned identifier for passes, resources and attachments. Clones are cheap
/// and comparisons are by content, so a [Name] can freely be used as a map key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Arc<str>);

impl Name {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name(Arc::from(s))
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(Arc::from(s.as_str()))
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}
