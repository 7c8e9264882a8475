//! Execution: realizes attachments, acquires render passes and framebuffers
//! from the per-thread caches and records the frame's command buffer.

use std::sync::Arc;

use ash::vk;

use scrim::{
    context::{FramebufferCache, RenderPassCache, TransientImageCache},
    descriptions::{
        FramebufferDescription, TransientImageDesc, TransientImageKey, TransientImageViewDesc,
    },
    CacheError, Name, PerThreadContext, SwapchainRef,
};

use crate::{
    graph::{AttachmentKind, RenderGraph},
    recorder::{OngoingRenderPass, Recorder},
    ExecuteError,
};

impl RenderGraph {
    ///Runs the compiled graph: realizes every bound attachment, acquires the
    /// render-pass and framebuffer handles and records one primary command
    /// buffer replaying all blocks in schedule order. The caller submits the
    /// returned buffer.
    pub fn execute(
        &mut self,
        ptc: &mut PerThreadContext<'_>,
        swapchains: &[(SwapchainRef, u32)],
    ) -> Result<vk::CommandBuffer, ExecuteError> {
        if !self.is_compiled() {
            return Err(ExecuteError::NotCompiled);
        }
        self.realize_attachments(&mut *ptc.transient_images, swapchains)?;
        self.acquire_render_passes(&mut *ptc.render_passes)?;
        self.acquire_framebuffers(&mut *ptc.framebuffers)?;
        self.record(ptc)
    }

    ///Gives every bound attachment a concrete image view: internal
    /// attachments are acquired from the transient-image cache with usage
    /// flags accumulated over their use chain, swapchain attachments take the
    /// view of the image index supplied by the caller.
    pub(crate) fn realize_attachments(
        &mut self,
        images: &mut dyn TransientImageCache,
        swapchains: &[(SwapchainRef, u32)],
    ) -> Result<(), ExecuteError> {
        let mut names: Vec<Name> = self.bound_attachments.keys().cloned().collect();
        names.sort();

        for name in names {
            let kind = self.bound_attachments[&name].kind.clone();
            let view = match kind {
                AttachmentKind::Internal => {
                    let mut usage = vk::ImageUsageFlags::empty();
                    if let Some(chain) = self.use_chains.get(&name) {
                        for entry in chain {
                            match entry.usage.layout {
                                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => {
                                    usage |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
                                }
                                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => {
                                    usage |= vk::ImageUsageFlags::SAMPLED
                                }
                                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => {
                                    usage |= vk::ImageUsageFlags::COLOR_ATTACHMENT
                                }
                                _ => {}
                            }
                        }
                    }

                    let info = &self.bound_attachments[&name];
                    let format = info.description.format;
                    let image = TransientImageDesc {
                        image_type: vk::ImageType::TYPE_2D,
                        format,
                        extent: info.extent,
                        mip_levels: 1,
                        array_layers: 1,
                        samples: vk::SampleCountFlags::TYPE_1,
                        tiling: vk::ImageTiling::OPTIMAL,
                        usage,
                        sharing_mode: vk::SharingMode::EXCLUSIVE,
                        initial_layout: vk::ImageLayout::UNDEFINED,
                    };
                    let aspect = if format == vk::Format::D32_SFLOAT {
                        vk::ImageAspectFlags::DEPTH
                    } else {
                        vk::ImageAspectFlags::COLOR
                    };
                    let view = TransientImageViewDesc {
                        view_type: vk::ImageViewType::TYPE_2D,
                        format,
                        aspect,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    };

                    let transient = images.acquire(&TransientImageKey {
                        name: name.clone(),
                        image,
                        view,
                    })?;

                    #[cfg(feature = "logging")]
                    log::trace!("realized transient attachment {}", name);

                    transient.view
                }
                AttachmentKind::Swapchain(swapchain) => {
                    let (bound, index) = swapchains
                        .iter()
                        .find(|(candidate, _)| Arc::ptr_eq(candidate, &swapchain))
                        .ok_or_else(|| ExecuteError::MissingSwapchain(name.clone()))?;
                    *bound.image_views.get(*index as usize).ok_or(
                        ExecuteError::SwapchainIndexOutOfRange {
                            name: name.clone(),
                            index: *index,
                        },
                    )?
                }
            };

            if let Some(info) = self.bound_attachments.get_mut(&name) {
                info.view = view;
            }
        }
        Ok(())
    }

    pub(crate) fn acquire_render_passes(
        &mut self,
        cache: &mut dyn RenderPassCache,
    ) -> Result<(), ExecuteError> {
        for rp in &mut self.rpis {
            rp.handle = cache.acquire(&rp.description)?;
        }
        Ok(())
    }

    pub(crate) fn acquire_framebuffers(
        &mut self,
        cache: &mut dyn FramebufferCache,
    ) -> Result<(), ExecuteError> {
        let Self {
            rpis,
            bound_attachments,
            ..
        } = self;

        for rp in rpis.iter_mut() {
            let views: Vec<vk::ImageView> = rp
                .attachments
                .iter()
                .map(|entry| {
                    bound_attachments
                        .get(&entry.name)
                        .map(|bound| bound.view)
                        .unwrap_or_else(vk::ImageView::null)
                })
                .collect();

            rp.extent = match rp.attachments.first() {
                Some(first) => first.extent,
                None => {
                    #[cfg(feature = "logging")]
                    log::warn!("render-pass block without attachments, using a 1x1 framebuffer");
                    vk::Extent2D {
                        width: 1,
                        height: 1,
                    }
                }
            };

            let description = FramebufferDescription {
                render_pass: rp.handle,
                attachments: views,
                width: rp.extent.width,
                height: rp.extent.height,
                layers: 1,
            };
            rp.framebuffer = cache.acquire(&description)?;
        }
        Ok(())
    }

    fn record(&mut self, ptc: &mut PerThreadContext<'_>) -> Result<vk::CommandBuffer, ExecuteError> {
        let buffers = ptc.command_buffers.acquire(1)?;
        let command_buffer = buffers.first().copied().ok_or_else(|| {
            ExecuteError::Cache(CacheError::Allocation(
                "command buffer pool returned no buffers".into(),
            ))
        })?;

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            ptc.device.begin_command_buffer(command_buffer, &begin_info)?;
        }

        let passes = &mut self.passes;
        let rpis = &self.rpis;
        let bound_attachments = &self.bound_attachments;
        let aliases = &self.aliases;

        let mut recorder = Recorder::new(ptc, bound_attachments, aliases, command_buffer);

        for rp in rpis {
            //clear values are the ordered subset of attachments that clear
            let clear_values: Vec<vk::ClearValue> = rp
                .attachments
                .iter()
                .filter(|a| a.should_clear)
                .map(|a| a.clear_value)
                .collect();
            let begin = vk::RenderPassBeginInfo::builder()
                .render_pass(rp.handle)
                .framebuffer(rp.framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D::default(),
                    extent: rp.extent,
                })
                .clear_values(&clear_values);
            unsafe {
                recorder.device().cmd_begin_render_pass(
                    command_buffer,
                    &begin,
                    vk::SubpassContents::INLINE,
                );
            }

            for (index, id) in rp.subpasses.iter().enumerate() {
                recorder.begin_subpass(OngoingRenderPass {
                    render_pass: rp.handle,
                    subpass: index as u32,
                    extent: rp.extent,
                });
                let info = &mut passes[id.index()];
                (info.pass.execute)(&mut recorder)?;
                if index + 1 < rp.subpasses.len() {
                    unsafe {
                        recorder
                            .device()
                            .cmd_next_subpass(command_buffer, vk::SubpassContents::INLINE);
                    }
                }
            }

            unsafe {
                recorder.device().cmd_end_render_pass(command_buffer);
            }
        }

        unsafe {
            recorder.device().end_command_buffer(command_buffer)?;
        }
        Ok(command_buffer)
    }
}
