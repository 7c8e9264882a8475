//! Contracts towards the per-thread resource caches.
//!
//! The render graph never creates GPU objects itself. Everything it needs at
//! execution time — render passes, framebuffers, transient images, pipelines,
//! descriptor sets, samplers, command buffers, scratch memory — is acquired
//! through the traits in this module, bundled into a [PerThreadContext]. The
//! implementations own the object lifetimes; the graph holds the returned
//! handles only for the frame being recorded.
//!
//! Every cache is keyed on one of the description types in
//! [crate::descriptions] and must return equal handles for equal
//! descriptions within a frame.

use std::sync::Arc;

use ash::vk;

use crate::{
    descriptions::{
        FramebufferDescription, PipelineRequest, RenderPassDescription, SamplerDesc,
        TransientImageKey,
    },
    error::CacheError,
};

///Compiler-visible view of a swapchain: the format and extent attachments
/// bound to it inherit, and the per-image views execution picks from.
/// Creation, acquisition and presentation happen outside the graph.
#[derive(Debug)]
pub struct Swapchain {
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub image_views: Vec<vk::ImageView>,
}

///Swapchains are shared with the graph by reference; bindings are matched by
/// identity, not by value.
pub type SwapchainRef = Arc<Swapchain>;

///A transient image as returned by the [TransientImageCache].
#[derive(Clone, Copy, Debug)]
pub struct TransientImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
}

///A pipeline together with the layout information the recorder needs to bind
/// descriptor sets and push constants against it.
#[derive(Debug)]
pub struct PipelineHandle {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    ///One descriptor-set layout per set index the pipeline uses.
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
}

pub const MAX_DESCRIPTOR_SETS: usize = 4;
pub const MAX_DESCRIPTOR_BINDINGS: usize = 16;

///Contents of a single descriptor slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DescriptorBinding {
    #[default]
    Empty,
    SampledImage {
        view: vk::ImageView,
        layout: vk::ImageLayout,
        sampler: vk::Sampler,
    },
    UniformBuffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
}

///One descriptor set worth of bindings, keyed on by the descriptor-set
/// allocator. `used` is a bitmask over [bindings](Self::bindings).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SetBinding {
    pub layout: vk::DescriptorSetLayout,
    pub bindings: [DescriptorBinding; MAX_DESCRIPTOR_BINDINGS],
    pub used: u32,
}

impl Default for SetBinding {
    fn default() -> Self {
        SetBinding {
            layout: vk::DescriptorSetLayout::null(),
            bindings: [DescriptorBinding::Empty; MAX_DESCRIPTOR_BINDINGS],
            used: 0,
        }
    }
}

impl SetBinding {
    pub fn bind(&mut self, binding: u32, value: DescriptorBinding) {
        self.bindings[binding as usize] = value;
        self.used |= 1 << binding;
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }
}

///A sub-range of a GPU buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferSlice {
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

///A host-visible scratch buffer handed out for the current frame.
#[derive(Clone, Copy, Debug)]
pub struct ScratchBuffer {
    pub slice: BufferSlice,
    pub mapped: *mut u8,
}

pub trait RenderPassCache {
    fn acquire(&mut self, description: &RenderPassDescription) -> Result<vk::RenderPass, CacheError>;
}

pub trait FramebufferCache {
    fn acquire(
        &mut self,
        description: &FramebufferDescription,
    ) -> Result<vk::Framebuffer, CacheError>;
}

pub trait TransientImageCache {
    fn acquire(&mut self, key: &TransientImageKey) -> Result<TransientImage, CacheError>;
}

pub trait PipelineCache {
    fn acquire(&mut self, request: &PipelineRequest) -> Result<Arc<PipelineHandle>, CacheError>;
}

pub trait DescriptorSetAllocator {
    fn acquire(&mut self, binding: &SetBinding) -> Result<vk::DescriptorSet, CacheError>;
}

pub trait SamplerCache {
    fn acquire(&mut self, description: &SamplerDesc) -> Result<vk::Sampler, CacheError>;
}

pub trait CommandBufferPool {
    ///Allocates `count` primary command buffers valid for the current frame.
    fn acquire(&mut self, count: u32) -> Result<Vec<vk::CommandBuffer>, CacheError>;
}

pub trait ScratchAllocator {
    fn allocate_scratch(
        &mut self,
        usage: vk::BufferUsageFlags,
        size: vk::DeviceSize,
    ) -> Result<ScratchBuffer, CacheError>;
}

///Everything a graph needs from the outside for one `execute` call. The
/// context is threaded through explicitly; the graph keeps no global state.
/// Callers decide whether the caches behind it are thread-local or shared —
/// the graph only requires that calls through one context are serialized.
pub struct PerThreadContext<'a> {
    pub device: &'a ash::Device,
    pub render_passes: &'a mut dyn RenderPassCache,
    pub framebuffers: &'a mut dyn FramebufferCache,
    pub transient_images: &'a mut dyn TransientImageCache,
    pub pipelines: &'a mut dyn PipelineCache,
    pub descriptor_sets: &'a mut dyn DescriptorSetAllocator,
    pub samplers: &'a mut dyn SamplerCache,
    pub command_buffers: &'a mut dyn CommandBufferPool,
    pub scratch: &'a mut dyn ScratchAllocator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_binding_tracks_used_slots() {
        let mut set = SetBinding::default();
        assert!(set.is_empty());

        set.bind(
            2,
            DescriptorBinding::UniformBuffer {
                buffer: vk::Buffer::null(),
                offset: 0,
                range: 64,
            },
        );
        assert_eq!(set.used, 0b100);
        assert!(!set.is_empty());
        assert_eq!(set.bindings[0], DescriptorBinding::Empty);
    }
}
