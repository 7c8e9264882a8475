//! # Scrim render graph
//!
//! A frame render-graph compiler on top of the `scrim` base layer. The caller
//! declares [Pass]es — each naming the resources it reads and writes plus an
//! execute callback — and the graph compiles that declaration into a linear
//! schedule of render-pass blocks with exact synchronization metadata:
//! layout transitions, subpass dependencies and attachment load/store
//! operations.
//!
//! A graph lives for one frame:
//!
//! ```no_run
//! # use scrim_graph::{Pass, RenderGraph};
//! # use scrim::{ImageAccess, Resource};
//! # fn frame(swapchain: scrim::SwapchainRef, ptc: &mut scrim::PerThreadContext<'_>) {
//! let mut graph = RenderGraph::new();
//! graph.add_pass(
//!     Pass::new("forward")
//!         .with_resource(Resource::image("back", ImageAccess::ColorWrite))
//!         .with_execute(|cmd| {
//!             cmd.bind_pipeline("forward")?.draw(3, 1, 0, 0)?;
//!             Ok(())
//!         }),
//! );
//! graph.bind_attachment_to_swapchain("back", swapchain.clone(), Default::default());
//! graph.compile().unwrap();
//! let cbuf = graph.execute(ptc, &[(swapchain, 0)]).unwrap();
//! # let _ = cbuf;
//! # }
//! ```
//!
//! Compilation is pure and deterministic; all GPU objects are acquired
//! through the [PerThreadContext](scrim::PerThreadContext) contracts during
//! [RenderGraph::execute].

use ash::vk;
use thiserror::Error;

use scrim::{CacheError, Name, ResourceError};

mod execute;
mod graph;
mod pass;
mod recorder;
mod sync;

pub use graph::{AttachmentInfo, AttachmentKind, RenderGraph, RenderPassInfo};
pub use pass::{Pass, PassId, UseChain, UseRef};
pub use recorder::{OngoingRenderPass, Packed, PackedField, Recorder, RelativeArea};

///Errors surfaced by [RenderGraph::compile]. Each carries the offending
/// pass/resource names.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("pass {pass} writes resource {name} more than once")]
    ConflictingWrite { pass: Name, name: Name },
    #[error("passes {left} and {right} consume each other's outputs with equal auxiliary order")]
    UnorderableWrites { left: Name, right: Name },
    #[error("a dependency cycle prevents scheduling pass {0}")]
    DependencyCycle(Name),
    #[error("alias {from} -> {to} forms a cycle")]
    AliasCycle { from: Name, to: Name },
    #[error("attachment {0} is used in a framebuffer but was never bound")]
    UnknownAttachment(Name),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

///Errors surfaced while recording inside a pass callback.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("no render pass is active on the recorder")]
    NoRenderPass,
    #[error("a pipeline must be bound first")]
    NoPipeline,
    #[error("the bound pipeline exposes no layout for descriptor set {0}")]
    NoSetLayout(u32),
    #[error("attachment {0} is not registered on the graph")]
    UnknownAttachment(Name),
    #[error("vertex format {0:?} has no known byte size")]
    UnsupportedVertexFormat(vk::Format),
    #[error("cache acquisition failed: {0}")]
    Cache(#[from] CacheError),
}

///Errors surfaced by [RenderGraph::execute].
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("the graph must be compiled before execution")]
    NotCompiled,
    #[error("no swapchain binding was supplied for attachment {0}")]
    MissingSwapchain(Name),
    #[error("swapchain image index {index} is out of range for attachment {name}")]
    SwapchainIndexOutOfRange { name: Name, index: u32 },
    #[error("cache acquisition failed: {0}")]
    Cache(#[from] CacheError),
    #[error("recording failed: {0}")]
    Record(#[from] RecordError),
    #[error("pass callback failed: {0}")]
    Callback(#[from] anyhow::Error),
    #[error("vulkan error: {0}")]
    VkError(#[from] vk::Result),
}
