//! Per-pass resource declarations and their lowering to concrete Vulkan
//! synchronization state.
//!
//! A pass declares every image or buffer it touches as a [Resource]: a name
//! pair plus an [ImageAccess] tag. The tag is what the graph compiler reasons
//! about; [ImageAccess::to_use] projects it onto the
//! `{stages, access mask, layout}` triple ([Use]) that ends up in attachment
//! descriptions and subpass dependencies.

use ash::vk;

use crate::{error::ResourceError, Name};

///How a pass accesses an image resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageAccess {
    ColorRead,
    ColorWrite,
    ColorRw,
    DepthStencilRead,
    DepthStencilRw,
    FragmentRead,
    FragmentWrite,
    FragmentSampled,
}

impl ImageAccess {
    ///Returns true if the access observes previous contents. Both RW tags
    /// count as reads as well as writes.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            ImageAccess::ColorRead
                | ImageAccess::ColorRw
                | ImageAccess::DepthStencilRead
                | ImageAccess::DepthStencilRw
                | ImageAccess::FragmentRead
                | ImageAccess::FragmentSampled
        )
    }

    ///Returns true if the access produces new contents.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            ImageAccess::ColorWrite
                | ImageAccess::ColorRw
                | ImageAccess::DepthStencilRw
                | ImageAccess::FragmentWrite
        )
    }

    ///Lowers the tag to the pipeline stages, access mask and image layout the
    /// synchronization synthesizer works with. Tags without a lowering yet are
    /// rejected with [ResourceError::UnsupportedAccess].
    pub fn to_use(self) -> Result<Use, ResourceError> {
        match self {
            ImageAccess::ColorWrite => Ok(Use {
                stages: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            }),
            ImageAccess::ColorRw => Ok(Use {
                stages: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::COLOR_ATTACHMENT_READ,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            }),
            ImageAccess::DepthStencilRw => Ok(Use {
                stages: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                    | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
                access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            }),
            ImageAccess::FragmentSampled => Ok(Use {
                stages: vk::PipelineStageFlags::FRAGMENT_SHADER,
                access: vk::AccessFlags::SHADER_READ,
                layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            }),
            other => Err(ResourceError::UnsupportedAccess(other)),
        }
    }
}

///A lowered access: the stage/access/layout triple a single use of a resource
/// imposes on the GPU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Use {
    pub stages: vk::PipelineStageFlags,
    pub access: vk::AccessFlags,
    pub layout: vk::ImageLayout,
}

impl Use {
    pub fn is_write(&self) -> bool {
        self.access.intersects(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
                | vk::AccessFlags::SHADER_WRITE,
        )
    }

    pub fn is_read(&self) -> bool {
        !self.is_write()
    }

    ///Whether this use binds the image as a framebuffer attachment, judged by
    /// the layout it requires.
    pub fn is_framebuffer_attachment(&self) -> bool {
        matches!(
            self.layout,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
                | vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Image,
    Buffer,
}

///A single declared use of a resource by one pass.
///
///`src_name` is the name the resource is known by when the pass picks it up,
/// `use_name` the name later passes may refer to it by. The two differ exactly
/// when the pass renames the resource; the graph records such renames as
/// forward aliases.
#[derive(Clone, Debug)]
pub struct Resource {
    pub ty: ResourceType,
    pub src_name: Name,
    pub use_name: Name,
    pub access: ImageAccess,
}

impl Resource {
    ///An image resource used under a single name.
    pub fn image(name: impl Into<Name>, access: ImageAccess) -> Self {
        let name = name.into();
        Resource {
            ty: ResourceType::Image,
            src_name: name.clone(),
            use_name: name,
            access,
        }
    }

    ///An image resource that is renamed by this pass: consumed as `src_name`,
    /// exposed to later passes as `use_name`.
    pub fn image_from(
        src_name: impl Into<Name>,
        use_name: impl Into<Name>,
        access: ImageAccess,
    ) -> Self {
        Resource {
            ty: ResourceType::Image,
            src_name: src_name.into(),
            use_name: use_name.into(),
            access,
        }
    }

    pub fn buffer(name: impl Into<Name>, access: ImageAccess) -> Self {
        let name = name.into();
        Resource {
            ty: ResourceType::Buffer,
            src_name: name.clone(),
            use_name: name,
            access,
        }
    }

    pub fn is_rename(&self) -> bool {
        self.src_name != self.use_name
    }

    ///Whether this resource participates in a framebuffer, which is what
    /// groups passes into render-pass blocks. Buffers never do.
    pub fn is_framebuffer_attachment(&self) -> bool {
        if self.ty == ResourceType::Buffer {
            return false;
        }
        matches!(
            self.access,
            ImageAccess::ColorRead
                | ImageAccess::ColorWrite
                | ImageAccess::ColorRw
                | ImageAccess::DepthStencilRead
                | ImageAccess::DepthStencilRw
        )
    }
}

//Identity of a resource is the name later passes see. That is what makes an
//output of one pass compare equal to the input of its consumer, which both the
//io classification and the scheduler rely on.
impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.use_name == other.use_name
    }
}

impl Eq for Resource {}

impl std::hash::Hash for Resource {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        self.use_name.hash(hasher)
    }
}
