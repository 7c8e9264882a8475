//! The render graph: pass ingestion, I/O classification, scheduling,
//! grouping into render-pass blocks and use-chain assembly.

use std::fmt::{self, Debug};

use ash::vk;
use fxhash::{FxHashMap, FxHashSet};

use scrim::{descriptions::RenderPassDescription, Name, Resource, SwapchainRef, Use};

use crate::{
    pass::{Pass, PassId, PassInfo, UseChain, UseRef},
    sync, CompileError,
};

///Resolves `name` through the forward alias map to a fixed point. Alias
/// chains are acyclic by construction, cycles are rejected at insertion.
pub(crate) fn resolve_name(aliases: &FxHashMap<Name, Name>, name: &Name) -> Name {
    let mut current = name;
    while let Some(next) = aliases.get(current) {
        current = next;
    }
    current.clone()
}

///Where an attachment's storage comes from.
#[derive(Clone, Debug)]
pub enum AttachmentKind {
    ///Backed by a swapchain image picked at execution time.
    Swapchain(SwapchainRef),
    ///Backed by a transient image acquired from the per-thread image cache.
    Internal,
}

///Compile-time record of one bound attachment, also used for the per-block
/// attachment entries the synchronization synthesizer fills in.
#[derive(Clone)]
pub struct AttachmentInfo {
    pub name: Name,
    pub kind: AttachmentKind,
    pub extent: vk::Extent2D,
    ///Resolved at execution time; null until then.
    pub view: vk::ImageView,
    pub should_clear: bool,
    pub clear_value: vk::ClearValue,
    ///Declared use before the first pass touches the attachment.
    pub initial: Use,
    ///Declared use after the last pass is done with it.
    pub final_use: Use,
    ///Synthesized description; immutable once the graph is compiled.
    pub description: vk::AttachmentDescription,
}

impl AttachmentInfo {
    fn swapchain(name: Name, swapchain: SwapchainRef, clear_value: vk::ClearValue) -> Self {
        AttachmentInfo {
            name,
            extent: swapchain.extent,
            view: vk::ImageView::null(),
            should_clear: true,
            clear_value,
            //presentation waits on color attachment output; previous contents
            //are irrelevant since we clear
            initial: Use {
                stages: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                access: vk::AccessFlags::empty(),
                layout: vk::ImageLayout::PREINITIALIZED,
            },
            //the final transition to PRESENT_SRC is covered by the implicit
            //external dependency vulkan injects at BOTTOM_OF_PIPE
            final_use: Use {
                stages: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                access: vk::AccessFlags::empty(),
                layout: vk::ImageLayout::PRESENT_SRC_KHR,
            },
            description: vk::AttachmentDescription {
                format: swapchain.format,
                samples: vk::SampleCountFlags::TYPE_1,
                ..Default::default()
            },
            kind: AttachmentKind::Swapchain(swapchain),
        }
    }

    fn internal(name: Name, format: vk::Format, extent: vk::Extent2D, clear_value: vk::ClearValue) -> Self {
        AttachmentInfo {
            name,
            kind: AttachmentKind::Internal,
            extent,
            view: vk::ImageView::null(),
            should_clear: true,
            clear_value,
            initial: Use {
                stages: vk::PipelineStageFlags::TOP_OF_PIPE,
                access: vk::AccessFlags::empty(),
                layout: vk::ImageLayout::PREINITIALIZED,
            },
            //an undefined final layout means the contents are discarded and no
            //final synchronization is synthesized
            final_use: Use {
                stages: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                access: vk::AccessFlags::empty(),
                layout: vk::ImageLayout::UNDEFINED,
            },
            description: vk::AttachmentDescription {
                format,
                samples: vk::SampleCountFlags::TYPE_1,
                ..Default::default()
            },
        }
    }

    pub(crate) fn block_entry(name: Name) -> Self {
        AttachmentInfo {
            name,
            kind: AttachmentKind::Internal,
            extent: vk::Extent2D::default(),
            view: vk::ImageView::null(),
            should_clear: false,
            clear_value: vk::ClearValue::default(),
            initial: Use::default(),
            final_use: Use::default(),
            description: vk::AttachmentDescription::default(),
        }
    }
}

impl Debug for AttachmentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        //clear_value is a union without a Debug representation
        f.debug_struct("AttachmentInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("extent", &self.extent)
            .field("should_clear", &self.should_clear)
            .field("initial", &self.initial)
            .field("final_use", &self.final_use)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

///One render-pass block: a maximal run of scheduled passes sharing a
/// framebuffer-attachment set, emitted as a single render pass where every
/// member pass is one subpass.
pub struct RenderPassInfo {
    pub(crate) subpasses: Vec<PassId>,
    pub(crate) attachments: Vec<AttachmentInfo>,
    pub(crate) description: RenderPassDescription,
    pub(crate) handle: vk::RenderPass,
    pub(crate) framebuffer: vk::Framebuffer,
    pub(crate) extent: vk::Extent2D,
}

impl RenderPassInfo {
    pub fn subpasses(&self) -> &[PassId] {
        &self.subpasses
    }

    pub fn attachments(&self) -> &[AttachmentInfo] {
        &self.attachments
    }

    pub fn description(&self) -> &RenderPassDescription {
        &self.description
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }

    pub fn framebuffer(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

///A declarative frame graph. Built once per frame: add passes, bind the
/// attachments they reference, [compile](Self::compile) and
/// [execute](Self::execute), then discard.
#[derive(Default)]
pub struct RenderGraph {
    pub(crate) passes: Vec<PassInfo>,
    pub(crate) aliases: FxHashMap<Name, Name>,
    pub(crate) use_chains: FxHashMap<Name, UseChain>,
    pub(crate) bound_attachments: FxHashMap<Name, AttachmentInfo>,
    pub(crate) rpis: Vec<RenderPassInfo>,
    pub(crate) tracked: Vec<Resource>,
    pub(crate) global_inputs: FxHashSet<Resource>,
    pub(crate) global_outputs: FxHashSet<Resource>,
    pub(crate) global_io: Vec<Resource>,
    pub(crate) schedule: Vec<PassId>,
    pub(crate) head_passes: Vec<PassId>,
    pub(crate) tail_passes: Vec<PassId>,
    compiled: bool,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    ///Appends a pass. Declaration order is preserved wherever the schedule
    /// has no reason to reorder.
    pub fn add_pass(&mut self, pass: Pass) -> PassId {
        let id = PassId(self.passes.len() as u32);
        self.passes.push(PassInfo::new(pass));
        id
    }

    ///Registers `name` as backed by a swapchain image. The concrete image is
    /// picked from the bindings passed to [execute](Self::execute).
    pub fn bind_attachment_to_swapchain(
        &mut self,
        name: impl Into<Name>,
        swapchain: SwapchainRef,
        clear_value: vk::ClearValue,
    ) {
        let name = name.into();
        self.bound_attachments.insert(
            name.clone(),
            AttachmentInfo::swapchain(name, swapchain, clear_value),
        );
    }

    ///Registers `name` as a transient attachment owned by this frame.
    pub fn mark_attachment_internal(
        &mut self,
        name: impl Into<Name>,
        format: vk::Format,
        extent: vk::Extent2D,
        clear_value: vk::ClearValue,
    ) {
        let name = name.into();
        self.bound_attachments.insert(
            name.clone(),
            AttachmentInfo::internal(name, format, extent, clear_value),
        );
    }

    ///Compiles the graph: classifies pass io, schedules, groups passes into
    /// render-pass blocks, assembles use chains and synthesizes all
    /// synchronization metadata. Pure — no GPU objects are touched.
    /// Idempotent per instance.
    pub fn compile(&mut self) -> Result<(), CompileError> {
        if self.compiled {
            return Ok(());
        }
        self.collect_aliases()?;
        self.build_io()?;
        self.schedule_passes()?;
        self.group_passes();
        self.assemble_use_chains()?;
        sync::synthesize(self);
        self.compiled = true;

        #[cfg(feature = "logging")]
        log::trace!(
            "compiled graph: {} passes in {} blocks",
            self.passes.len(),
            self.rpis.len()
        );

        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    ///The scheduled pass order.
    pub fn schedule(&self) -> &[PassId] {
        &self.schedule
    }

    pub fn pass_name(&self, id: PassId) -> &Name {
        &self.passes[id.index()].pass.name
    }

    ///The compiled render-pass blocks in execution order.
    pub fn render_passes(&self) -> &[RenderPassInfo] {
        &self.rpis
    }

    ///The use chain of `name`, after alias resolution.
    pub fn use_chain(&self, name: impl Into<Name>) -> Option<&UseChain> {
        let resolved = resolve_name(&self.aliases, &name.into());
        self.use_chains.get(&resolved)
    }

    pub fn attachment(&self, name: impl Into<Name>) -> Option<&AttachmentInfo> {
        let resolved = resolve_name(&self.aliases, &name.into());
        self.bound_attachments.get(&resolved)
    }

    ///Resources produced but not exported from the graph.
    pub fn tracked(&self) -> &[Resource] {
        &self.tracked
    }

    ///Graph-wide inputs and outputs, deduplicated in first-occurrence order.
    pub fn global_io(&self) -> &[Resource] {
        &self.global_io
    }

    ///Passes whose inputs are all graph-global.
    pub fn head_passes(&self) -> &[PassId] {
        &self.head_passes
    }

    ///Passes whose outputs are all graph-global.
    pub fn tail_passes(&self) -> &[PassId] {
        &self.tail_passes
    }

    ///Collects forward aliases from every renaming resource and re-keys bound
    /// attachments onto resolved names so all later stages can work with one
    /// canonical name per resource.
    fn collect_aliases(&mut self) -> Result<(), CompileError> {
        let renames: Vec<(Name, Name)> = self
            .passes
            .iter()
            .flat_map(|info| info.pass.resources.iter())
            .filter(|res| res.is_rename())
            .map(|res| (res.use_name.clone(), res.src_name.clone()))
            .collect();

        for (use_name, src_name) in renames {
            //a rename only ever renames forward; a source resolving back to
            //the new name would loop
            if resolve_name(&self.aliases, &src_name) == use_name {
                return Err(CompileError::AliasCycle {
                    from: use_name,
                    to: src_name,
                });
            }
            self.aliases.insert(use_name, src_name);
        }

        let raw_names: Vec<Name> = self.bound_attachments.keys().cloned().collect();
        for raw in raw_names {
            let resolved = resolve_name(&self.aliases, &raw);
            if resolved != raw {
                if let Some(mut info) = self.bound_attachments.remove(&raw) {
                    info.name = resolved.clone();
                    self.bound_attachments.insert(resolved, info);
                }
            }
        }
        Ok(())
    }

    ///Partitions every pass's resources into reads and writes and derives the
    /// graph-global input/output sets: an input consumes a matching earlier
    /// global output, an output satisfies a matching earlier global input,
    /// whatever remains is global.
    fn build_io(&mut self) -> Result<(), CompileError> {
        for info in &mut self.passes {
            let mut inputs: Vec<Resource> = Vec::new();
            let mut outputs: Vec<Resource> = Vec::new();
            let mut written: FxHashSet<Name> = FxHashSet::default();

            for res in &info.pass.resources {
                if res.access.is_read() && !inputs.contains(res) {
                    inputs.push(res.clone());
                }
                if res.access.is_write() {
                    let resolved = resolve_name(&self.aliases, &res.use_name);
                    if !written.insert(resolved.clone()) {
                        return Err(CompileError::ConflictingWrite {
                            pass: info.pass.name.clone(),
                            name: resolved,
                        });
                    }
                    if !outputs.contains(res) {
                        outputs.push(res.clone());
                    }
                }
            }

            let mut pass_global_inputs = FxHashSet::default();
            let mut pass_global_outputs = FxHashSet::default();
            for input in &inputs {
                if !self.global_outputs.remove(input) {
                    pass_global_inputs.insert(input.clone());
                }
            }
            for output in &outputs {
                if !self.global_inputs.remove(output) {
                    pass_global_outputs.insert(output.clone());
                }
            }

            self.global_inputs
                .extend(pass_global_inputs.iter().cloned());
            self.global_outputs
                .extend(pass_global_outputs.iter().cloned());

            info.inputs = inputs;
            info.outputs = outputs;
            info.global_inputs = pass_global_inputs;
            info.global_outputs = pass_global_outputs;
        }

        //everything produced but not exported needs transient storage
        let mut seen = FxHashSet::default();
        for info in &self.passes {
            for output in &info.outputs {
                if !self.global_outputs.contains(output) && seen.insert(output.clone()) {
                    self.tracked.push(output.clone());
                }
            }
        }

        let mut seen_io = FxHashSet::default();
        for info in &self.passes {
            for res in info.inputs.iter().chain(info.outputs.iter()) {
                if (self.global_inputs.contains(res) || self.global_outputs.contains(res))
                    && seen_io.insert(res.clone())
                {
                    self.global_io.push(res.clone());
                }
            }
        }
        Ok(())
    }

    ///Topologically orders the passes along producer/consumer edges. Mutual
    /// edges fall back to the auxiliary order; otherwise declaration order is
    /// kept. Also tags head and tail passes.
    fn schedule_passes(&mut self) -> Result<(), CompileError> {
        let count = self.passes.len();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut indegree: Vec<usize> = vec![0; count];

        for first in 0..count {
            for second in first + 1..count {
                let after = self.passes[first]
                    .outputs
                    .iter()
                    .any(|o| self.passes[second].inputs.contains(o));
                let before = self.passes[second]
                    .outputs
                    .iter()
                    .any(|o| self.passes[first].inputs.contains(o));

                let edge = match (after, before) {
                    (true, true) => {
                        let left = &self.passes[first].pass;
                        let right = &self.passes[second].pass;
                        if left.auxiliary_order == right.auxiliary_order {
                            return Err(CompileError::UnorderableWrites {
                                left: left.name.clone(),
                                right: right.name.clone(),
                            });
                        }
                        if left.auxiliary_order < right.auxiliary_order {
                            Some((first, second))
                        } else {
                            Some((second, first))
                        }
                    }
                    (true, false) => Some((first, second)),
                    (false, true) => Some((second, first)),
                    (false, false) => None,
                };

                if let Some((from, to)) = edge {
                    successors[from].push(to);
                    indegree[to] += 1;
                }
            }
        }

        //stable Kahn sort: always pick the lowest declaration index that is
        //ready, so unrelated passes keep their declared order
        let mut placed = vec![false; count];
        let mut order = Vec::with_capacity(count);
        for _ in 0..count {
            let next = (0..count).find(|&i| !placed[i] && indegree[i] == 0);
            let next = match next {
                Some(i) => i,
                None => {
                    let stuck = (0..count)
                        .find(|&i| !placed[i])
                        .expect("a pass must remain when the sort stalls");
                    return Err(CompileError::DependencyCycle(
                        self.passes[stuck].pass.name.clone(),
                    ));
                }
            };
            placed[next] = true;
            order.push(PassId(next as u32));
            for &succ in &successors[next] {
                indegree[succ] -= 1;
            }
        }
        self.schedule = order;

        #[cfg(feature = "logging")]
        log::trace!(
            "schedule: {:?}",
            self.schedule
                .iter()
                .map(|id| self.passes[id.index()].pass.name.as_str())
                .collect::<Vec<_>>()
        );

        for (index, info) in self.passes.iter_mut().enumerate() {
            if info.global_inputs.len() == info.inputs.len() {
                info.is_head = true;
                self.head_passes.push(PassId(index as u32));
            }
            if info.global_outputs.len() == info.outputs.len() {
                info.is_tail = true;
                self.tail_passes.push(PassId(index as u32));
            }
        }
        Ok(())
    }

    ///Groups scheduled passes by their framebuffer-attachment set. Each
    /// distinct set becomes one render-pass block, in first-occurrence order;
    /// members become its subpasses in schedule order.
    fn group_passes(&mut self) {
        //key is the sorted name set, the second entry keeps first-declaration
        //order for the block's attachment list
        let mut sets: Vec<(Vec<Name>, Vec<Name>, Vec<PassId>)> = Vec::new();

        for &id in &self.schedule {
            let info = &self.passes[id.index()];
            let mut names: Vec<Name> = Vec::new();
            for res in &info.pass.resources {
                if res.is_framebuffer_attachment() {
                    let resolved = resolve_name(&self.aliases, &res.use_name);
                    if !names.contains(&resolved) {
                        names.push(resolved);
                    }
                }
            }
            let mut key = names.clone();
            key.sort();

            if let Some(entry) = sets.iter_mut().find(|(k, _, _)| *k == key) {
                entry.2.push(id);
            } else {
                sets.push((key, names, vec![id]));
            }
        }

        for (rpi_index, (_, names, members)) in sets.into_iter().enumerate() {
            let mut rpi = RenderPassInfo {
                subpasses: Vec::with_capacity(members.len()),
                attachments: names.into_iter().map(AttachmentInfo::block_entry).collect(),
                description: RenderPassDescription::default(),
                handle: vk::RenderPass::null(),
                framebuffer: vk::Framebuffer::null(),
                extent: vk::Extent2D::default(),
            };
            for (subpass, id) in members.into_iter().enumerate() {
                let info = &mut self.passes[id.index()];
                info.render_pass_index = rpi_index as u32;
                info.subpass_index = subpass as u32;
                rpi.subpasses.push(id);
            }
            self.rpis.push(rpi);
        }
    }

    ///Appends every scheduled use to the chain of its resolved name and
    /// verifies that chains needing render-pass synthesis have a bound
    /// attachment to synthesize against.
    fn assemble_use_chains(&mut self) -> Result<(), CompileError> {
        for &id in &self.schedule {
            let info = &self.passes[id.index()];
            for res in &info.pass.resources {
                let usage = res.access.to_use()?;
                let key = resolve_name(&self.aliases, &res.use_name);
                self.use_chains.entry(key).or_default().push(UseRef {
                    usage,
                    pass: Some(id),
                });
            }
        }

        for (name, chain) in &self.use_chains {
            if chain.iter().any(|c| c.usage.is_framebuffer_attachment())
                && !self.bound_attachments.contains_key(name)
            {
                return Err(CompileError::UnknownAttachment(name.clone()));
            }
        }
        Ok(())
    }
}

impl Debug for RenderGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RenderGraph:\n")?;
        write!(f, "  schedule:\n")?;
        for id in &self.schedule {
            let info = &self.passes[id.index()];
            write!(
                f,
                "    {} (block {}, subpass {}{}{})\n",
                info.pass.name,
                info.render_pass_index,
                info.subpass_index,
                if info.is_head { ", head" } else { "" },
                if info.is_tail { ", tail" } else { "" },
            )?;
        }
        write!(f, "  blocks:\n")?;
        for (index, rpi) in self.rpis.iter().enumerate() {
            write!(f, "    block {}:", index)?;
            for att in &rpi.attachments {
                write!(f, " {}", att.name)?;
            }
            write!(f, "\n")?;
        }
        write!(f, "  use chains:\n")?;
        let mut names: Vec<&Name> = self.use_chains.keys().collect();
        names.sort();
        for name in names {
            write!(f, "    {}:", name)?;
            for entry in &self.use_chains[name] {
                match entry.pass {
                    Some(id) => write!(f, " {}", self.passes[id.index()].pass.name)?,
                    None => write!(f, " <boundary>")?,
                }
            }
            write!(f, "\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pass;
    use scrim::{ImageAccess, Swapchain};
    use std::sync::Arc;

    fn swapchain_1x1() -> SwapchainRef {
        Arc::new(Swapchain {
            format: vk::Format::B8G8R8A8_SRGB,
            extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            image_views: vec![vk::ImageView::null()],
        })
    }

    fn pass(name: &str, resources: Vec<Resource>) -> Pass {
        resources
            .into_iter()
            .fold(Pass::new(name), |p, r| p.with_resource(r))
    }

    #[test]
    fn io_classification_consumes_internal_products() {
        let mut graph = RenderGraph::new();
        graph.add_pass(pass(
            "gbuffer",
            vec![Resource::image("albedo", ImageAccess::ColorWrite)],
        ));
        graph.add_pass(pass(
            "shade",
            vec![
                Resource::image("albedo", ImageAccess::FragmentSampled),
                Resource::image("back", ImageAccess::ColorWrite),
            ],
        ));
        graph.bind_attachment_to_swapchain("back", swapchain_1x1(), vk::ClearValue::default());
        graph.mark_attachment_internal(
            "albedo",
            vk::Format::R8G8B8A8_UNORM,
            vk::Extent2D {
                width: 640,
                height: 480,
            },
            vk::ClearValue::default(),
        );
        graph.compile().unwrap();

        //albedo is produced and consumed inside the graph
        assert!(graph.tracked().iter().any(|r| r.use_name.as_str() == "albedo"));
        assert!(!graph.tracked().iter().any(|r| r.use_name.as_str() == "back"));
        //back is exported, albedo is not
        assert!(graph
            .global_io()
            .iter()
            .any(|r| r.use_name.as_str() == "back"));
        assert!(!graph
            .global_io()
            .iter()
            .any(|r| r.use_name.as_str() == "albedo"));

        //gbuffer has no non-global inputs; shade's input is satisfied
        //internally, so it is not a head. Tail flags are judged against the
        //pass-local global sets captured during classification, so both
        //qualify.
        assert_eq!(graph.head_passes(), &[PassId(0)]);
        assert_eq!(graph.tail_passes(), &[PassId(0), PassId(1)]);
        assert!(graph.passes[0].is_head);
        assert!(!graph.passes[1].is_head);
        assert!(graph.passes[1].is_tail);
    }

    #[test]
    fn conflicting_writes_in_one_pass_are_rejected() {
        let mut graph = RenderGraph::new();
        graph.add_pass(pass(
            "broken",
            vec![
                Resource::image("back", ImageAccess::ColorWrite),
                Resource::image("back", ImageAccess::ColorRw),
            ],
        ));
        graph.bind_attachment_to_swapchain("back", swapchain_1x1(), vk::ClearValue::default());

        assert!(matches!(
            graph.compile(),
            Err(CompileError::ConflictingWrite { pass, name })
                if pass.as_str() == "broken" && name.as_str() == "back"
        ));
    }

    #[test]
    fn schedule_respects_dependencies_and_declaration_order() {
        let mut graph = RenderGraph::new();
        //declared consumer-first to force a reorder
        graph.add_pass(pass(
            "shade",
            vec![
                Resource::image("albedo", ImageAccess::FragmentSampled),
                Resource::image("back", ImageAccess::ColorWrite),
            ],
        ));
        graph.add_pass(pass(
            "gbuffer",
            vec![Resource::image("albedo", ImageAccess::ColorWrite)],
        ));
        //independent of the other two, must keep declaration position relative
        //to nothing in particular but must appear exactly once
        graph.add_pass(pass(
            "ui",
            vec![Resource::image("overlay", ImageAccess::ColorWrite)],
        ));
        graph.bind_attachment_to_swapchain("back", swapchain_1x1(), vk::ClearValue::default());
        graph.mark_attachment_internal(
            "albedo",
            vk::Format::R8G8B8A8_UNORM,
            vk::Extent2D {
                width: 16,
                height: 16,
            },
            vk::ClearValue::default(),
        );
        graph.mark_attachment_internal(
            "overlay",
            vk::Format::R8G8B8A8_UNORM,
            vk::Extent2D {
                width: 16,
                height: 16,
            },
            vk::ClearValue::default(),
        );
        graph.compile().unwrap();

        let order: Vec<&str> = graph
            .schedule()
            .iter()
            .map(|&id| graph.pass_name(id).as_str())
            .collect();
        let gbuffer = order.iter().position(|n| *n == "gbuffer").unwrap();
        let shade = order.iter().position(|n| *n == "shade").unwrap();
        assert!(gbuffer < shade);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn unrelated_passes_keep_declaration_order() {
        let mut graph = RenderGraph::new();
        for name in ["a", "b", "c"] {
            graph.add_pass(pass(
                name,
                vec![Resource::image(name, ImageAccess::ColorWrite)],
            ));
            graph.mark_attachment_internal(
                name,
                vk::Format::R8G8B8A8_UNORM,
                vk::Extent2D {
                    width: 4,
                    height: 4,
                },
                vk::ClearValue::default(),
            );
        }
        graph.compile().unwrap();
        assert_eq!(graph.schedule(), &[PassId(0), PassId(1), PassId(2)]);
    }

    #[test]
    fn mutual_dependency_is_broken_by_auxiliary_order() {
        //two passes that write each other's inputs; the auxiliary order decides
        let mut graph = RenderGraph::new();
        graph.add_pass(
            pass(
                "b",
                vec![
                    Resource::image("s", ImageAccess::ColorWrite),
                    Resource::image("r", ImageAccess::FragmentSampled),
                ],
            )
            .with_auxiliary_order(1),
        );
        graph.add_pass(
            pass(
                "a",
                vec![
                    Resource::image("r", ImageAccess::ColorWrite),
                    Resource::image("s", ImageAccess::FragmentSampled),
                ],
            )
            .with_auxiliary_order(0),
        );
        for name in ["r", "s"] {
            graph.mark_attachment_internal(
                name,
                vk::Format::R8G8B8A8_UNORM,
                vk::Extent2D {
                    width: 4,
                    height: 4,
                },
                vk::ClearValue::default(),
            );
        }
        graph.compile().unwrap();

        let order: Vec<&str> = graph
            .schedule()
            .iter()
            .map(|&id| graph.pass_name(id).as_str())
            .collect();
        assert_eq!(order, ["a", "b"]);
    }

    #[test]
    fn mutual_dependency_with_equal_order_is_rejected() {
        let mut graph = RenderGraph::new();
        graph.add_pass(pass(
            "a",
            vec![
                Resource::image("r", ImageAccess::ColorWrite),
                Resource::image("s", ImageAccess::FragmentSampled),
            ],
        ));
        graph.add_pass(pass(
            "b",
            vec![
                Resource::image("s", ImageAccess::ColorWrite),
                Resource::image("r", ImageAccess::FragmentSampled),
            ],
        ));
        assert!(matches!(
            graph.compile(),
            Err(CompileError::UnorderableWrites { .. })
        ));
    }

    #[test]
    fn three_pass_cycle_is_rejected() {
        let mut graph = RenderGraph::new();
        graph.add_pass(pass(
            "a",
            vec![
                Resource::image("x", ImageAccess::ColorWrite),
                Resource::image("z", ImageAccess::FragmentSampled),
            ],
        ));
        graph.add_pass(pass(
            "b",
            vec![
                Resource::image("y", ImageAccess::ColorWrite),
                Resource::image("x", ImageAccess::FragmentSampled),
            ],
        ));
        graph.add_pass(pass(
            "c",
            vec![
                Resource::image("z", ImageAccess::ColorWrite),
                Resource::image("y", ImageAccess::FragmentSampled),
            ],
        ));
        assert!(matches!(
            graph.compile(),
            Err(CompileError::DependencyCycle(_))
        ));
    }

    #[test]
    fn renames_resolve_onto_one_chain() {
        //a pass renames x to x+, the consumer reads x+; the chain lives
        //under the original name and keeps producer before consumer
        let mut graph = RenderGraph::new();
        graph.add_pass(pass(
            "read",
            vec![
                Resource::image("x+", ImageAccess::FragmentSampled),
                Resource::image("back", ImageAccess::ColorWrite),
            ],
        ));
        graph.add_pass(pass(
            "write",
            vec![Resource::image_from("x", "x+", ImageAccess::ColorWrite)],
        ));
        graph.bind_attachment_to_swapchain("back", swapchain_1x1(), vk::ClearValue::default());
        graph.mark_attachment_internal(
            "x",
            vk::Format::R8G8B8A8_UNORM,
            vk::Extent2D {
                width: 8,
                height: 8,
            },
            vk::ClearValue::default(),
        );
        graph.compile().unwrap();

        let order: Vec<&str> = graph
            .schedule()
            .iter()
            .map(|&id| graph.pass_name(id).as_str())
            .collect();
        assert_eq!(order, ["write", "read"]);

        //chain is keyed on the resolved name and contains both uses plus the
        //injected boundaries
        assert!(graph.use_chains.get(&Name::from("x+")).is_none());
        let chain = graph.use_chain("x+").unwrap();
        assert_eq!(chain.len(), 4);
        assert!(chain.first().unwrap().pass.is_none());
        assert!(chain.last().unwrap().pass.is_none());
        let passes: Vec<&str> = chain
            .iter()
            .filter_map(|c| c.pass)
            .map(|id| graph.pass_name(id).as_str())
            .collect();
        assert_eq!(passes, ["write", "read"]);
    }

    #[test]
    fn alias_cycles_are_rejected_at_insertion() {
        let mut graph = RenderGraph::new();
        graph.add_pass(pass(
            "a",
            vec![Resource::image_from("x", "y", ImageAccess::ColorWrite)],
        ));
        graph.add_pass(pass(
            "b",
            vec![Resource::image_from("y", "x", ImageAccess::ColorWrite)],
        ));
        assert!(matches!(
            graph.compile(),
            Err(CompileError::AliasCycle { .. })
        ));
    }

    #[test]
    fn passes_with_equal_attachment_sets_share_a_block() {
        //two passes on the same attachment set become two subpasses
        let mut graph = RenderGraph::new();
        graph.add_pass(pass(
            "a",
            vec![Resource::image("back", ImageAccess::ColorWrite)],
        ));
        graph.add_pass(pass(
            "b",
            vec![Resource::image("back", ImageAccess::ColorRw)],
        ));
        graph.bind_attachment_to_swapchain("back", swapchain_1x1(), vk::ClearValue::default());
        graph.compile().unwrap();

        assert_eq!(graph.render_passes().len(), 1);
        let block = &graph.render_passes()[0];
        assert_eq!(block.subpasses().len(), 2);
        assert_eq!(block.attachments().len(), 1);
        assert_eq!(graph.passes[0].render_pass_index, 0);
        assert_eq!(graph.passes[0].subpass_index, 0);
        assert_eq!(graph.passes[1].render_pass_index, 0);
        assert_eq!(graph.passes[1].subpass_index, 1);
    }

    #[test]
    fn differing_attachment_sets_split_blocks() {
        //the sampling pass has an empty attachment set for back
        let mut graph = RenderGraph::new();
        graph.add_pass(pass(
            "a",
            vec![Resource::image("back", ImageAccess::ColorWrite)],
        ));
        graph.add_pass(pass(
            "b",
            vec![Resource::image("back", ImageAccess::FragmentSampled)],
        ));
        graph.bind_attachment_to_swapchain("back", swapchain_1x1(), vk::ClearValue::default());
        graph.compile().unwrap();

        assert_eq!(graph.render_passes().len(), 2);
        assert_eq!(graph.render_passes()[0].attachments().len(), 1);
        assert_eq!(graph.render_passes()[1].attachments().len(), 0);
        assert_eq!(graph.passes[1].render_pass_index, 1);
        assert_eq!(graph.passes[1].subpass_index, 0);
    }

    #[test]
    fn framebuffer_chains_without_binding_are_rejected() {
        let mut graph = RenderGraph::new();
        graph.add_pass(pass(
            "a",
            vec![Resource::image("back", ImageAccess::ColorWrite)],
        ));
        assert!(matches!(
            graph.compile(),
            Err(CompileError::UnknownAttachment(name)) if name.as_str() == "back"
        ));
    }

    #[test]
    fn sampled_only_chains_may_stay_unbound() {
        //an externally provided texture is declared for ordering only and
        //bound by view at record time
        let mut graph = RenderGraph::new();
        graph.add_pass(pass(
            "a",
            vec![
                Resource::image("env", ImageAccess::FragmentSampled),
                Resource::image("back", ImageAccess::ColorWrite),
            ],
        ));
        graph.bind_attachment_to_swapchain("back", swapchain_1x1(), vk::ClearValue::default());
        assert!(graph.compile().is_ok());
    }

    #[test]
    fn unlowerable_accesses_fail_compilation() {
        let mut graph = RenderGraph::new();
        graph.add_pass(pass(
            "a",
            vec![Resource::image("back", ImageAccess::ColorRead)],
        ));
        graph.bind_attachment_to_swapchain("back", swapchain_1x1(), vk::ClearValue::default());
        assert!(matches!(
            graph.compile(),
            Err(CompileError::Resource(_))
        ));
    }

    #[test]
    fn compile_is_idempotent() {
        let mut graph = RenderGraph::new();
        graph.add_pass(pass(
            "a",
            vec![Resource::image("back", ImageAccess::ColorWrite)],
        ));
        graph.bind_attachment_to_swapchain("back", swapchain_1x1(), vk::ClearValue::default());
        graph.compile().unwrap();
        let deps = graph.render_passes()[0].description().dependencies.len();
        graph.compile().unwrap();
        assert_eq!(
            graph.render_passes()[0].description().dependencies.len(),
            deps
        );
        assert_eq!(graph.render_passes().len(), 1);
    }
}
