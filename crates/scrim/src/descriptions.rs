//! Equality-keyed descriptions consumed by the external caches.
//!
//! Every cache contract in [crate::context] is keyed on one of these types:
//! equal descriptions must yield equal handles. They therefore implement
//! `Eq + Hash` structurally, which is also what makes compilation
//! reproducible — compiling the same graph twice produces identical
//! descriptions.

use std::hash::{Hash, Hasher};

use ash::vk;

use crate::Name;

///Structural key for [`vk::AttachmentDescription`], which itself has no
/// `PartialEq`/`Hash` impl in `ash`. All fields are plain `Copy` enums/flags
/// that do implement those traits, so the tuple view below is exactly the
/// derive that would have been generated had `ash` provided one.
fn attachment_description_key(
    a: &vk::AttachmentDescription,
) -> (
    vk::AttachmentDescriptionFlags,
    vk::Format,
    vk::SampleCountFlags,
    vk::AttachmentLoadOp,
    vk::AttachmentStoreOp,
    vk::AttachmentLoadOp,
    vk::AttachmentStoreOp,
    vk::ImageLayout,
    vk::ImageLayout,
) {
    (
        a.flags,
        a.format,
        a.samples,
        a.load_op,
        a.store_op,
        a.stencil_load_op,
        a.stencil_store_op,
        a.initial_layout,
        a.final_layout,
    )
}

///Structural key for [`vk::AttachmentReference`]; see
/// [attachment_description_key].
fn attachment_reference_key(a: &vk::AttachmentReference) -> (u32, vk::ImageLayout) {
    (a.attachment, a.layout)
}

///Structural key for [`vk::SubpassDependency`]; see
/// [attachment_description_key].
fn subpass_dependency_key(
    d: &vk::SubpassDependency,
) -> (
    u32,
    u32,
    vk::PipelineStageFlags,
    vk::PipelineStageFlags,
    vk::AccessFlags,
    vk::AccessFlags,
    vk::DependencyFlags,
) {
    (
        d.src_subpass,
        d.dst_subpass,
        d.src_stage_mask,
        d.dst_stage_mask,
        d.src_access_mask,
        d.dst_access_mask,
        d.dependency_flags,
    )
}

///Structural key for [`vk::VertexInputBindingDescription`]; see
/// [attachment_description_key].
fn vertex_binding_key(b: &vk::VertexInputBindingDescription) -> (u32, u32, vk::VertexInputRate) {
    (b.binding, b.stride, b.input_rate)
}

///Structural key for [`vk::VertexInputAttributeDescription`]; see
/// [attachment_description_key].
fn vertex_attribute_key(a: &vk::VertexInputAttributeDescription) -> (u32, u32, vk::Format, u32) {
    (a.location, a.binding, a.format, a.offset)
}

///Complete description of one render pass: attachment descriptions, the
/// per-subpass attachment references and the subpass dependencies.
///
///Color references are stored CSR-style: a flat [color_refs](Self::color_refs)
/// array plus one end offset per subpass in
/// [color_ref_offsets](Self::color_ref_offsets), so subpass `k` owns the slice
/// `color_refs[offsets[k-1]..offsets[k]]`. Depth/stencil references are one
/// optional entry per subpass. The subpass count is the length of
/// [ds_refs](Self::ds_refs).
#[derive(Clone, Debug, Default)]
pub struct RenderPassDescription {
    pub attachments: Vec<vk::AttachmentDescription>,
    pub color_refs: Vec<vk::AttachmentReference>,
    pub color_ref_offsets: Vec<u32>,
    pub ds_refs: Vec<Option<vk::AttachmentReference>>,
    pub dependencies: Vec<vk::SubpassDependency>,
}

impl PartialEq for RenderPassDescription {
    fn eq(&self, other: &Self) -> bool {
        self.attachments.len() == other.attachments.len()
            && self
                .attachments
                .iter()
                .zip(&other.attachments)
                .all(|(a, b)| attachment_description_key(a) == attachment_description_key(b))
            && self.color_refs.len() == other.color_refs.len()
            && self
                .color_refs
                .iter()
                .zip(&other.color_refs)
                .all(|(a, b)| attachment_reference_key(a) == attachment_reference_key(b))
            && self.color_ref_offsets == other.color_ref_offsets
            && self.ds_refs.len() == other.ds_refs.len()
            && self.ds_refs.iter().zip(&other.ds_refs).all(|(a, b)| {
                match (a, b) {
                    (Some(a), Some(b)) => attachment_reference_key(a) == attachment_reference_key(b),
                    (None, None) => true,
                    _ => false,
                }
            })
            && self.dependencies.len() == other.dependencies.len()
            && self
                .dependencies
                .iter()
                .zip(&other.dependencies)
                .all(|(a, b)| subpass_dependency_key(a) == subpass_dependency_key(b))
    }
}

impl Eq for RenderPassDescription {}

impl Hash for RenderPassDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.attachments.len().hash(state);
        for a in &self.attachments {
            attachment_description_key(a).hash(state);
        }
        self.color_refs.len().hash(state);
        for a in &self.color_refs {
            attachment_reference_key(a).hash(state);
        }
        self.color_ref_offsets.hash(state);
        self.ds_refs.len().hash(state);
        for a in &self.ds_refs {
            a.as_ref().map(attachment_reference_key).hash(state);
        }
        self.dependencies.len().hash(state);
        for d in &self.dependencies {
            subpass_dependency_key(d).hash(state);
        }
    }
}

impl RenderPassDescription {
    pub fn subpass_count(&self) -> usize {
        self.ds_refs.len()
    }

    pub fn color_refs_for(&self, subpass: usize) -> &[vk::AttachmentReference] {
        let end = self.color_ref_offsets[subpass] as usize;
        let start = if subpass == 0 {
            0
        } else {
            self.color_ref_offsets[subpass - 1] as usize
        };
        &self.color_refs[start..end]
    }

    pub fn ds_ref_for(&self, subpass: usize) -> Option<&vk::AttachmentReference> {
        self.ds_refs[subpass].as_ref()
    }

    ///The derived per-subpass view a cache implementation builds its
    /// `vk::SubpassDescription`s from. Every subpass is a graphics subpass;
    /// input, resolve and preserve attachments are always empty.
    pub fn subpasses(&self) -> impl Iterator<Item = SubpassRefs<'_>> + '_ {
        (0..self.subpass_count()).map(move |i| SubpassRefs {
            colors: self.color_refs_for(i),
            depth_stencil: self.ds_ref_for(i),
        })
    }
}

///Attachment references of a single subpass, sliced out of a
/// [RenderPassDescription].
#[derive(Clone, Copy, Debug)]
pub struct SubpassRefs<'a> {
    pub colors: &'a [vk::AttachmentReference],
    pub depth_stencil: Option<&'a vk::AttachmentReference>,
}

///Description a framebuffer is acquired by: the render pass it must be
/// compatible with plus the ordered attachment views and dimensions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FramebufferDescription {
    pub render_pass: vk::RenderPass,
    pub attachments: Vec<vk::ImageView>,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
}

///Image half of a transient-attachment request. Mirrors the
/// `vk::ImageCreateInfo` fields the graph pins down for its transients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransientImageDesc {
    pub image_type: vk::ImageType,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: vk::SampleCountFlags,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
    pub sharing_mode: vk::SharingMode,
    pub initial_layout: vk::ImageLayout,
}

///View half of a transient-attachment request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransientImageViewDesc {
    pub view_type: vk::ImageViewType,
    pub format: vk::Format,
    pub aspect: vk::ImageAspectFlags,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

///Key of the transient-image cache. The name keeps two attachments with
/// identical shapes from sharing storage within one frame.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransientImageKey {
    pub name: Name,
    pub image: TransientImageDesc,
    pub view: TransientImageViewDesc,
}

///What the recorder hands to the pipeline cache: the pipeline it wants by
/// name, completed with the render pass, subpass and vertex input state that
/// are only known while recording.
#[derive(Clone, Debug)]
pub struct PipelineRequest {
    pub pipeline: Name,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl PartialEq for PipelineRequest {
    fn eq(&self, other: &Self) -> bool {
        self.pipeline == other.pipeline
            && self.render_pass == other.render_pass
            && self.subpass == other.subpass
            && self.vertex_bindings.len() == other.vertex_bindings.len()
            && self
                .vertex_bindings
                .iter()
                .zip(&other.vertex_bindings)
                .all(|(a, b)| vertex_binding_key(a) == vertex_binding_key(b))
            && self.vertex_attributes.len() == other.vertex_attributes.len()
            && self
                .vertex_attributes
                .iter()
                .zip(&other.vertex_attributes)
                .all(|(a, b)| vertex_attribute_key(a) == vertex_attribute_key(b))
    }
}

impl Eq for PipelineRequest {}

impl Hash for PipelineRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pipeline.hash(state);
        self.render_pass.hash(state);
        self.subpass.hash(state);
        self.vertex_bindings.len().hash(state);
        for b in &self.vertex_bindings {
            vertex_binding_key(b).hash(state);
        }
        self.vertex_attributes.len().hash(state);
        for a in &self.vertex_attributes {
            vertex_attribute_key(a).hash(state);
        }
    }
}

impl PipelineRequest {
    ///A request for the named pipeline with the completion fields still
    /// blank; the recorder fills them in before the cache sees the request.
    pub fn named(pipeline: impl Into<Name>) -> Self {
        PipelineRequest {
            pipeline: pipeline.into(),
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
        }
    }
}

///Sampler description the sampler cache is keyed on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub mag_filter: vk::Filter,
    pub min_filter: vk::Filter,
    pub mipmap_mode: vk::SamplerMipmapMode,
    pub address_mode_u: vk::SamplerAddressMode,
    pub address_mode_v: vk::SamplerAddressMode,
    pub address_mode_w: vk::SamplerAddressMode,
    pub compare_op: Option<vk::CompareOp>,
}

impl SamplerDesc {
    pub fn linear() -> Self {
        SamplerDesc {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_ref(attachment: u32) -> vk::AttachmentReference {
        vk::AttachmentReference {
            attachment,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }
    }

    #[test]
    fn csr_slicing() {
        let desc = RenderPassDescription {
            attachments: Vec::new(),
            color_refs: vec![color_ref(0), color_ref(1), color_ref(0)],
            color_ref_offsets: vec![2, 2, 3],
            ds_refs: vec![None, None, None],
            dependencies: Vec::new(),
        };

        assert_eq!(desc.subpass_count(), 3);
        assert_eq!(desc.color_refs_for(0), &[color_ref(0), color_ref(1)]);
        assert_eq!(desc.color_refs_for(1), &[] as &[vk::AttachmentReference]);
        assert_eq!(desc.color_refs_for(2), &[color_ref(0)]);

        let subpasses: Vec<_> = desc.subpasses().collect();
        assert_eq!(subpasses.len(), 3);
        assert_eq!(subpasses[0].colors.len(), 2);
        assert!(subpasses[0].depth_stencil.is_none());
    }

    #[test]
    fn linear_sampler_desc_keys_apart_from_default() {
        let linear = SamplerDesc::linear();
        assert_eq!(linear.mag_filter, vk::Filter::LINEAR);
        assert_eq!(linear.min_filter, vk::Filter::LINEAR);
        assert_eq!(linear.mipmap_mode, vk::SamplerMipmapMode::LINEAR);
        assert_eq!(linear.address_mode_u, vk::SamplerAddressMode::REPEAT);
        assert!(linear.compare_op.is_none());

        //a sampler cache keyed on the description must not conflate the two
        use std::collections::HashMap;
        let mut cache = HashMap::new();
        cache.insert(SamplerDesc::default(), 1u32);
        cache.insert(linear, 2u32);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&SamplerDesc::linear()), Some(&2));
    }

    #[test]
    fn descriptions_key_structurally() {
        use std::collections::HashMap;

        let key = TransientImageKey {
            name: "depth".into(),
            image: TransientImageDesc {
                image_type: vk::ImageType::TYPE_2D,
                format: vk::Format::D32_SFLOAT,
                extent: vk::Extent2D {
                    width: 64,
                    height: 64,
                },
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                initial_layout: vk::ImageLayout::UNDEFINED,
            },
            view: TransientImageViewDesc {
                view_type: vk::ImageViewType::TYPE_2D,
                format: vk::Format::D32_SFLOAT,
                aspect: vk::ImageAspectFlags::DEPTH,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
        };

        let mut map = HashMap::new();
        map.insert(key.clone(), 1u32);
        assert_eq!(map.get(&key), Some(&1));
    }
}
