//! The stateful command recorder handed to pass execute callbacks.
//!
//! All state is scoped to the currently running pass: pipeline, vertex input
//! and descriptor bindings are reset when the next subpass begins. Draw calls
//! flush dirty descriptor slots through the descriptor-set contract before
//! recording.

use std::sync::Arc;

use ash::vk;
use fxhash::FxHashMap;

use scrim::{
    context::{
        BufferSlice, DescriptorBinding, PerThreadContext, PipelineHandle, SetBinding,
        MAX_DESCRIPTOR_SETS,
    },
    descriptions::{PipelineRequest, SamplerDesc},
    Name,
};

use crate::{
    graph::{resolve_name, AttachmentInfo},
    RecordError,
};

///The render pass and subpass a callback currently records inside of.
#[derive(Clone, Copy, Debug)]
pub struct OngoingRenderPass {
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub extent: vk::Extent2D,
}

///A framebuffer-relative rectangle; all coordinates are fractions of the
/// current render area.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativeArea {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

///One element of a packed vertex format description.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PackedField {
    Format(vk::Format),
    ///Skips the given number of padding bytes without consuming an attribute
    /// location.
    Ignore(u32),
}

///Packed description of one vertex buffer's layout, in memory order.
#[derive(Clone, Debug, Default)]
pub struct Packed(pub Vec<PackedField>);

pub(crate) fn format_byte_size(format: vk::Format) -> Result<u32, RecordError> {
    match format {
        vk::Format::R8_UNORM | vk::Format::R8_UINT | vk::Format::R8_SINT => Ok(1),
        vk::Format::R8G8_UNORM => Ok(2),
        vk::Format::R8G8B8A8_UNORM
        | vk::Format::R8G8B8A8_SRGB
        | vk::Format::B8G8R8A8_UNORM
        | vk::Format::B8G8R8A8_SRGB => Ok(4),
        vk::Format::R16G16_SFLOAT => Ok(4),
        vk::Format::R16G16B16A16_SFLOAT => Ok(8),
        vk::Format::R32_SFLOAT | vk::Format::R32_UINT | vk::Format::R32_SINT => Ok(4),
        vk::Format::R32G32_SFLOAT | vk::Format::R32G32_UINT | vk::Format::R32G32_SINT => Ok(8),
        vk::Format::R32G32B32_SFLOAT
        | vk::Format::R32G32B32_UINT
        | vk::Format::R32G32B32_SINT => Ok(12),
        vk::Format::R32G32B32A32_SFLOAT
        | vk::Format::R32G32B32A32_UINT
        | vk::Format::R32G32B32A32_SINT => Ok(16),
        other => Err(RecordError::UnsupportedVertexFormat(other)),
    }
}

///Derives the attribute and binding descriptions of one vertex buffer from
/// its packed format. Attribute locations are assigned in order, ignored
/// fields only advance the byte offset.
pub(crate) fn vertex_input(
    binding: u32,
    format: &Packed,
) -> Result<
    (
        Vec<vk::VertexInputAttributeDescription>,
        vk::VertexInputBindingDescription,
    ),
    RecordError,
> {
    let mut attributes = Vec::new();
    let mut offset = 0u32;
    let mut location = 0u32;
    for field in &format.0 {
        match field {
            PackedField::Ignore(bytes) => offset += bytes,
            PackedField::Format(format) => {
                attributes.push(vk::VertexInputAttributeDescription {
                    location,
                    binding,
                    format: *format,
                    offset,
                });
                offset += format_byte_size(*format)?;
                location += 1;
            }
        }
    }
    Ok((
        attributes,
        vk::VertexInputBindingDescription {
            binding,
            stride: offset,
            input_rate: vk::VertexInputRate::VERTEX,
        },
    ))
}

///Recording surface a pass callback receives. Wraps the frame's command
/// buffer together with the per-thread caches and the graph's attachment
/// registry for late-bound lookups by name.
pub struct Recorder<'a, 'ctx> {
    ptc: &'a mut PerThreadContext<'ctx>,
    attachments: &'a FxHashMap<Name, AttachmentInfo>,
    aliases: &'a FxHashMap<Name, Name>,
    command_buffer: vk::CommandBuffer,
    ongoing: Option<OngoingRenderPass>,
    current_pipeline: Option<Arc<PipelineHandle>>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    set_bindings: [SetBinding; MAX_DESCRIPTOR_SETS],
    dirty_sets: u32,
}

impl<'a, 'ctx> Recorder<'a, 'ctx> {
    pub(crate) fn new(
        ptc: &'a mut PerThreadContext<'ctx>,
        attachments: &'a FxHashMap<Name, AttachmentInfo>,
        aliases: &'a FxHashMap<Name, Name>,
        command_buffer: vk::CommandBuffer,
    ) -> Self {
        Recorder {
            ptc,
            attachments,
            aliases,
            command_buffer,
            ongoing: None,
            current_pipeline: None,
            vertex_attributes: Vec::new(),
            vertex_bindings: Vec::new(),
            set_bindings: [SetBinding::default(); MAX_DESCRIPTOR_SETS],
            dirty_sets: 0,
        }
    }

    ///Resets all pass-scoped state and enters the given subpass.
    pub(crate) fn begin_subpass(&mut self, ongoing: OngoingRenderPass) {
        self.ongoing = Some(ongoing);
        self.current_pipeline = None;
        self.vertex_attributes.clear();
        self.vertex_bindings.clear();
        self.set_bindings = [SetBinding::default(); MAX_DESCRIPTOR_SETS];
        self.dirty_sets = 0;
    }

    pub(crate) fn device(&self) -> &ash::Device {
        self.ptc.device
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    ///The render pass and subpass currently being recorded, if any.
    pub fn ongoing(&self) -> Option<OngoingRenderPass> {
        self.ongoing
    }

    fn require_render_pass(&self) -> Result<OngoingRenderPass, RecordError> {
        self.ongoing.ok_or(RecordError::NoRenderPass)
    }

    pub fn set_viewport(&mut self, index: u32, viewport: vk::Viewport) -> &mut Self {
        unsafe {
            self.ptc
                .device
                .cmd_set_viewport(self.command_buffer, index, &[viewport]);
        }
        self
    }

    ///Viewport over an absolute pixel rectangle, with the full depth range.
    pub fn set_viewport_rect(&mut self, index: u32, rect: vk::Rect2D) -> &mut Self {
        self.set_viewport(
            index,
            vk::Viewport {
                x: rect.offset.x as f32,
                y: rect.offset.y as f32,
                width: rect.extent.width as f32,
                height: rect.extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            },
        )
    }

    ///Viewport relative to the current framebuffer, flipped so that y points
    /// up.
    pub fn set_viewport_relative(
        &mut self,
        index: u32,
        area: RelativeArea,
    ) -> Result<&mut Self, RecordError> {
        let extent = self.require_render_pass()?.extent;
        let width = extent.width as f32;
        let height = extent.height as f32;
        let flipped_height = -area.height * height;
        let viewport = vk::Viewport {
            x: area.x * width,
            y: area.y * height - flipped_height,
            width: area.width * width,
            height: flipped_height,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        Ok(self.set_viewport(index, viewport))
    }

    pub fn set_scissor(&mut self, index: u32, rect: vk::Rect2D) -> &mut Self {
        unsafe {
            self.ptc
                .device
                .cmd_set_scissor(self.command_buffer, index, &[rect]);
        }
        self
    }

    pub fn set_scissor_relative(
        &mut self,
        index: u32,
        area: RelativeArea,
    ) -> Result<&mut Self, RecordError> {
        let extent = self.require_render_pass()?.extent;
        let rect = vk::Rect2D {
            offset: vk::Offset2D {
                x: (area.x * extent.width as f32) as i32,
                y: (area.y * extent.height as f32) as i32,
            },
            extent: vk::Extent2D {
                width: (area.width * extent.width as f32) as u32,
                height: (area.height * extent.height as f32) as u32,
            },
        };
        Ok(self.set_scissor(index, rect))
    }

    ///Binds the named pipeline, completed with the in-flight render pass,
    /// subpass and the vertex input bound so far.
    pub fn bind_pipeline(&mut self, name: impl Into<Name>) -> Result<&mut Self, RecordError> {
        self.bind_pipeline_request(PipelineRequest::named(name))
    }

    ///Like [bind_pipeline](Self::bind_pipeline) but starting from a caller
    /// prepared request. Render pass, subpass and vertex input are always
    /// overwritten with the recorder's state before the request reaches the
    /// pipeline cache.
    pub fn bind_pipeline_request(
        &mut self,
        mut request: PipelineRequest,
    ) -> Result<&mut Self, RecordError> {
        let ongoing = self.require_render_pass()?;
        request.render_pass = ongoing.render_pass;
        request.subpass = ongoing.subpass;
        request.vertex_bindings = self.vertex_bindings.clone();
        request.vertex_attributes = self.vertex_attributes.clone();

        let handle = self.ptc.pipelines.acquire(&request)?;
        unsafe {
            self.ptc.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                handle.pipeline,
            );
        }
        self.current_pipeline = Some(handle);
        Ok(self)
    }

    ///Binds a vertex buffer and derives the attribute and binding
    /// descriptions for `binding` from the packed format. Descriptions from a
    /// previous bind on the same binding are replaced.
    pub fn bind_vertex_buffer(
        &mut self,
        binding: u32,
        buffer: BufferSlice,
        format: &Packed,
    ) -> Result<&mut Self, RecordError> {
        self.vertex_attributes.retain(|a| a.binding != binding);
        self.vertex_bindings.retain(|b| b.binding != binding);

        let (mut attributes, binding_description) = vertex_input(binding, format)?;
        self.vertex_attributes.append(&mut attributes);
        self.vertex_bindings.push(binding_description);

        unsafe {
            self.ptc.device.cmd_bind_vertex_buffers(
                self.command_buffer,
                binding,
                &[buffer.buffer],
                &[buffer.offset],
            );
        }
        Ok(self)
    }

    pub fn bind_index_buffer(&mut self, buffer: BufferSlice, ty: vk::IndexType) -> &mut Self {
        unsafe {
            self.ptc.device.cmd_bind_index_buffer(
                self.command_buffer,
                buffer.buffer,
                buffer.offset,
                ty,
            );
        }
        self
    }

    ///Binds a combined image sampler to the given set and binding slot.
    pub fn bind_sampled_image(
        &mut self,
        set: u32,
        binding: u32,
        view: vk::ImageView,
        sampler: &SamplerDesc,
    ) -> Result<&mut Self, RecordError> {
        let sampler = self.ptc.samplers.acquire(sampler)?;
        self.set_bindings[set as usize].bind(
            binding,
            DescriptorBinding::SampledImage {
                view,
                layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                sampler,
            },
        );
        self.dirty_sets |= 1 << set;
        Ok(self)
    }

    ///Binds an attachment of the graph as a sampled image, resolved by name
    /// at record time.
    pub fn bind_sampled_image_named(
        &mut self,
        set: u32,
        binding: u32,
        name: impl Into<Name>,
        sampler: &SamplerDesc,
    ) -> Result<&mut Self, RecordError> {
        let resolved = resolve_name(self.aliases, &name.into());
        let view = match self.attachments.get(&resolved) {
            Some(info) if info.view != vk::ImageView::null() => info.view,
            _ => return Err(RecordError::UnknownAttachment(resolved)),
        };
        self.bind_sampled_image(set, binding, view, sampler)
    }

    pub fn bind_uniform_buffer(&mut self, set: u32, binding: u32, buffer: BufferSlice) -> &mut Self {
        self.set_bindings[set as usize].bind(
            binding,
            DescriptorBinding::UniformBuffer {
                buffer: buffer.buffer,
                offset: buffer.offset,
                range: buffer.size,
            },
        );
        self.dirty_sets |= 1 << set;
        self
    }

    ///Allocates a frame-scratch uniform buffer of `size` bytes, binds it to
    /// the given slot and returns the mapped pointer for the caller to fill.
    pub fn map_scratch_uniform_binding(
        &mut self,
        set: u32,
        binding: u32,
        size: vk::DeviceSize,
    ) -> Result<*mut u8, RecordError> {
        let scratch = self
            .ptc
            .scratch
            .allocate_scratch(vk::BufferUsageFlags::UNIFORM_BUFFER, size)?;
        self.bind_uniform_buffer(set, binding, scratch.slice);
        Ok(scratch.mapped)
    }

    pub fn push_constants(
        &mut self,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<&mut Self, RecordError> {
        let pipeline = self
            .current_pipeline
            .as_ref()
            .ok_or(RecordError::NoPipeline)?;
        unsafe {
            self.ptc.device.cmd_push_constants(
                self.command_buffer,
                pipeline.layout,
                stages,
                offset,
                data,
            );
        }
        Ok(self)
    }

    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<&mut Self, RecordError> {
        self.flush_descriptor_sets()?;
        unsafe {
            self.ptc.device.cmd_draw(
                self.command_buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
        Ok(self)
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<&mut Self, RecordError> {
        self.flush_descriptor_sets()?;
        unsafe {
            self.ptc.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(self)
    }

    ///Flushes every dirty descriptor set through the descriptor-set cache and
    /// binds it at its own set index. Slots are reset after the flush.
    fn flush_descriptor_sets(&mut self) -> Result<(), RecordError> {
        let pipeline = self
            .current_pipeline
            .clone()
            .ok_or(RecordError::NoPipeline)?;

        for set in 0..MAX_DESCRIPTOR_SETS {
            if self.dirty_sets & (1 << set) == 0 {
                continue;
            }
            let layout = pipeline
                .set_layouts
                .get(set)
                .copied()
                .ok_or(RecordError::NoSetLayout(set as u32))?;
            self.set_bindings[set].layout = layout;

            let descriptor_set = self.ptc.descriptor_sets.acquire(&self.set_bindings[set])?;
            unsafe {
                self.ptc.device.cmd_bind_descriptor_sets(
                    self.command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline.layout,
                    set as u32,
                    &[descriptor_set],
                    &[],
                );
            }
            self.set_bindings[set] = SetBinding::default();
            self.dirty_sets &= !(1 << set);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_format_derivation_skips_padding() {
        let format = Packed(vec![
            PackedField::Format(vk::Format::R32G32B32_SFLOAT),
            PackedField::Ignore(4),
            PackedField::Format(vk::Format::R32G32_SFLOAT),
        ]);
        let (attributes, binding) = vertex_input(3, &format).unwrap();

        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].location, 0);
        assert_eq!(attributes[0].binding, 3);
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[0].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attributes[1].location, 1);
        assert_eq!(attributes[1].offset, 16);
        assert_eq!(attributes[1].format, vk::Format::R32G32_SFLOAT);

        assert_eq!(binding.binding, 3);
        assert_eq!(binding.stride, 24);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn trailing_padding_counts_into_the_stride() {
        let format = Packed(vec![
            PackedField::Format(vk::Format::R32G32_SFLOAT),
            PackedField::Ignore(8),
        ]);
        let (attributes, binding) = vertex_input(0, &format).unwrap();
        assert_eq!(attributes.len(), 1);
        assert_eq!(binding.stride, 16);
    }

    #[test]
    fn unknown_vertex_formats_are_rejected() {
        let format = Packed(vec![PackedField::Format(vk::Format::D32_SFLOAT)]);
        assert!(matches!(
            vertex_input(0, &format),
            Err(RecordError::UnsupportedVertexFormat(vk::Format::D32_SFLOAT))
        ));
    }

    #[test]
    fn format_sizes() {
        assert_eq!(format_byte_size(vk::Format::R8G8B8A8_UNORM).unwrap(), 4);
        assert_eq!(format_byte_size(vk::Format::R32G32B32A32_SFLOAT).unwrap(), 16);
        assert_eq!(format_byte_size(vk::Format::R16G16B16A16_SFLOAT).unwrap(), 8);
    }
}
