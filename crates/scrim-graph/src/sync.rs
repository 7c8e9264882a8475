//! Synchronization synthesis: walks every attachment's use chain and derives
//! load/store operations, initial/final layouts, subpass dependencies and the
//! per-subpass attachment references.

use ash::vk;

use scrim::Name;

use crate::{
    graph::RenderGraph,
    pass::{UseChain, UseRef},
};

///Runs after grouping and chain assembly. Bound attachments are walked in
/// sorted name order so repeated compilations of equal graphs produce
/// identical descriptions.
pub(crate) fn synthesize(graph: &mut RenderGraph) {
    let mut names: Vec<Name> = graph.bound_attachments.keys().cloned().collect();
    names.sort();

    for name in &names {
        let attachment = graph.bound_attachments[name].clone();
        let chain = match graph.use_chains.get(name) {
            Some(chain) if !chain.is_empty() => chain.clone(),
            _ => {
                #[cfg(feature = "logging")]
                log::warn!("attachment {} is bound but never referenced", name);
                continue;
            }
        };

        let mut full: UseChain = Vec::with_capacity(chain.len() + 2);
        full.push(UseRef {
            usage: attachment.initial,
            pass: None,
        });
        full.extend(chain);
        full.push(UseRef {
            usage: attachment.final_use,
            pass: None,
        });

        for pair in full.windows(2) {
            let (left, right) = (pair[0], pair[1]);

            let same_block = match (left.pass, right.pass) {
                (Some(l), Some(r)) => {
                    graph.passes[l.index()].render_pass_index
                        == graph.passes[r.index()].render_pass_index
                }
                _ => false,
            };

            if same_block {
                //subpass to subpass: WAW, WAR and RAW on an attachment need an
                //explicit dependency
                if left.usage.is_framebuffer_attachment()
                    && (left.usage.is_write()
                        || (left.usage.is_read() && right.usage.is_write()))
                {
                    let (left_pass, right_pass) = match (left.pass, right.pass) {
                        (Some(l), Some(r)) => {
                            (&graph.passes[l.index()], &graph.passes[r.index()])
                        }
                        _ => unreachable!("same-block entries always belong to passes"),
                    };
                    let block = right_pass.render_pass_index as usize;
                    let dependency = vk::SubpassDependency {
                        src_subpass: left_pass.subpass_index,
                        dst_subpass: right_pass.subpass_index,
                        src_stage_mask: left.usage.stages,
                        dst_stage_mask: right.usage.stages,
                        src_access_mask: left.usage.access,
                        dst_access_mask: right.usage.access,
                        dependency_flags: vk::DependencyFlags::empty(),
                    };
                    graph.rpis[block].description.dependencies.push(dependency);
                }
                continue;
            }

            //the pair crosses a block boundary (or one side is a declared
            //initial/final use)

            if let Some(left_pass) = left.pass {
                let (block, subpass) = {
                    let info = &graph.passes[left_pass.index()];
                    (info.render_pass_index as usize, info.subpass_index)
                };
                let rp = &mut graph.rpis[block];

                if left.usage.is_framebuffer_attachment() {
                    let entry = rp
                        .attachments
                        .iter_mut()
                        .find(|a| &a.name == name)
                        .expect("framebuffer uses are seeded into their block");
                    entry.description.format = attachment.description.format;
                    entry.description.samples = attachment.description.samples;
                    entry.extent = attachment.extent;
                    entry.clear_value = attachment.clear_value;
                    entry.should_clear = attachment.should_clear;
                    entry.kind = attachment.kind.clone();
                    //a following pass or a required end layout gets the
                    //transition; otherwise the last use stands
                    if right.pass.is_some() || right.usage.layout != vk::ImageLayout::UNDEFINED {
                        entry.description.final_layout = right.usage.layout;
                    } else {
                        entry.description.final_layout = left.usage.layout;
                    }
                    entry.description.store_op = if right.usage.layout == vk::ImageLayout::UNDEFINED
                    {
                        vk::AttachmentStoreOp::DONT_CARE
                    } else {
                        vk::AttachmentStoreOp::STORE
                    };
                }
                //any layout required on the right side forces a dependency,
                //write or not
                if right.usage.layout != vk::ImageLayout::UNDEFINED {
                    rp.description.dependencies.push(vk::SubpassDependency {
                        src_subpass: subpass,
                        dst_subpass: vk::SUBPASS_EXTERNAL,
                        src_stage_mask: left.usage.stages,
                        dst_stage_mask: right.usage.stages,
                        src_access_mask: left.usage.access,
                        dst_access_mask: right.usage.access,
                        dependency_flags: vk::DependencyFlags::empty(),
                    });
                }
            }

            if let Some(right_pass) = right.pass {
                let (block, subpass) = {
                    let info = &graph.passes[right_pass.index()];
                    (info.render_pass_index as usize, info.subpass_index)
                };
                let rp = &mut graph.rpis[block];

                if right.usage.is_framebuffer_attachment() {
                    let entry = rp
                        .attachments
                        .iter_mut()
                        .find(|a| &a.name == name)
                        .expect("framebuffer uses are seeded into their block");
                    entry.description.format = attachment.description.format;
                    entry.description.samples = attachment.description.samples;
                    entry.extent = attachment.extent;
                    //a left block transitions for us, otherwise the declared
                    //initial use is where we start
                    entry.description.initial_layout = if left.pass.is_some() {
                        right.usage.layout
                    } else {
                        left.usage.layout
                    };
                    if left.usage.layout == vk::ImageLayout::UNDEFINED {
                        entry.description.load_op = vk::AttachmentLoadOp::DONT_CARE;
                    } else if left.usage.layout == vk::ImageLayout::PREINITIALIZED {
                        //the preinitialized sentinel means "clear me"; it never
                        //reaches the block-facing description
                        entry.description.initial_layout = vk::ImageLayout::UNDEFINED;
                        entry.description.load_op = vk::AttachmentLoadOp::CLEAR;
                    } else {
                        entry.description.load_op = vk::AttachmentLoadOp::LOAD;
                    }
                }
                if left.usage.layout != vk::ImageLayout::UNDEFINED {
                    rp.description.dependencies.push(vk::SubpassDependency {
                        src_subpass: vk::SUBPASS_EXTERNAL,
                        dst_subpass: subpass,
                        src_stage_mask: left.usage.stages,
                        dst_stage_mask: right.usage.stages,
                        src_access_mask: left.usage.access,
                        dst_access_mask: right.usage.access,
                        dependency_flags: vk::DependencyFlags::empty(),
                    });
                }
            }
        }

        //keep the boundary-extended chain; realization scans it for usage
        //flags and it is part of the compiled graph's public shape
        graph.use_chains.insert(name.clone(), full);
    }

    synthesize_subpass_refs(graph, &names);
}

///Derives the CSR color references, per-subpass depth/stencil references and
/// the final attachment description arrays of every block.
fn synthesize_subpass_refs(graph: &mut RenderGraph, names: &[Name]) {
    let mut colors: Vec<Vec<Vec<vk::AttachmentReference>>> = graph
        .rpis
        .iter()
        .map(|rp| vec![Vec::new(); rp.subpasses.len()])
        .collect();
    let mut ds: Vec<Vec<Option<vk::AttachmentReference>>> = graph
        .rpis
        .iter()
        .map(|rp| vec![None; rp.subpasses.len()])
        .collect();

    for name in names {
        let chain = match graph.use_chains.get(name) {
            Some(chain) => chain,
            None => continue,
        };
        for entry in chain {
            let id = match entry.pass {
                Some(id) => id,
                None => continue,
            };
            let info = &graph.passes[id.index()];
            let block = info.render_pass_index as usize;
            let subpass = info.subpass_index as usize;
            let attachment = match graph.rpis[block]
                .attachments
                .iter()
                .position(|a| &a.name == name)
            {
                Some(index) => index as u32,
                None => continue,
            };
            let reference = vk::AttachmentReference {
                attachment,
                layout: entry.usage.layout,
            };
            match entry.usage.layout {
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => {
                    colors[block][subpass].push(reference)
                }
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => {
                    ds[block][subpass] = Some(reference)
                }
                _ => {}
            }
        }
    }

    for (index, rp) in graph.rpis.iter_mut().enumerate() {
        let mut refs = Vec::new();
        let mut offsets = Vec::with_capacity(rp.subpasses.len());
        for subpass_colors in &mut colors[index] {
            //color order within a subpass follows the block's attachment list
            subpass_colors.sort_by_key(|r| r.attachment);
            refs.extend(subpass_colors.iter().copied());
            offsets.push(refs.len() as u32);
        }
        rp.description.color_refs = refs;
        rp.description.color_ref_offsets = offsets;
        rp.description.ds_refs = std::mem::take(&mut ds[index]);
        rp.description.attachments = rp.attachments.iter().map(|a| a.description).collect();
    }
}
