//! Pass declarations and the compiler's per-pass bookkeeping.

use std::fmt::{self, Debug};

use fxhash::FxHashSet;

use scrim::{Name, Resource, Use};

use crate::recorder::Recorder;

///Callback recording the actual draw commands of a pass. Runs synchronously
/// in schedule order once the containing render pass is begun.
pub type PassExecFn =
    Box<dyn FnMut(&mut Recorder<'_, '_>) -> Result<(), anyhow::Error> + 'static>;

///A unit of work declaring its resource accesses and an execute callback.
pub struct Pass {
    pub name: Name,
    pub resources: Vec<Resource>,
    ///Tie breaker for passes that consume each other's outputs; lower orders
    /// execute first.
    pub auxiliary_order: i32,
    pub(crate) execute: PassExecFn,
}

impl Pass {
    pub fn new(name: impl Into<Name>) -> Self {
        Pass {
            name: name.into(),
            resources: Vec::new(),
            auxiliary_order: 0,
            execute: Box::new(|_| Ok(())),
        }
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_auxiliary_order(mut self, order: i32) -> Self {
        self.auxiliary_order = order;
        self
    }

    pub fn with_execute(
        mut self,
        execute: impl FnMut(&mut Recorder<'_, '_>) -> Result<(), anyhow::Error> + 'static,
    ) -> Self {
        self.execute = Box::new(execute);
        self
    }
}

impl Debug for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pass")
            .field("name", &self.name)
            .field("resources", &self.resources)
            .field("auxiliary_order", &self.auxiliary_order)
            .finish_non_exhaustive()
    }
}

///Index of a pass in the graph's arena. Stable across compilation; the
/// schedule is a permutation of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) u32);

impl PassId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

///A [Pass] plus everything the compiler derives about it.
pub(crate) struct PassInfo {
    pub(crate) pass: Pass,
    ///Resources this pass reads, deduplicated by name.
    pub(crate) inputs: Vec<Resource>,
    ///Resources this pass writes, deduplicated by name.
    pub(crate) outputs: Vec<Resource>,
    ///Inputs not produced by any pass of this graph.
    pub(crate) global_inputs: FxHashSet<Resource>,
    ///Outputs not consumed by any pass of this graph.
    pub(crate) global_outputs: FxHashSet<Resource>,
    pub(crate) is_head: bool,
    pub(crate) is_tail: bool,
    ///Block and subpass this pass was grouped into. Valid after compilation.
    pub(crate) render_pass_index: u32,
    pub(crate) subpass_index: u32,
}

impl PassInfo {
    pub(crate) fn new(pass: Pass) -> Self {
        PassInfo {
            pass,
            inputs: Vec::new(),
            outputs: Vec::new(),
            global_inputs: FxHashSet::default(),
            global_outputs: FxHashSet::default(),
            is_head: false,
            is_tail: false,
            render_pass_index: 0,
            subpass_index: 0,
        }
    }
}

///One entry of a use chain: a lowered use and the pass it belongs to. `None`
/// marks a boundary entry injected from an attachment's declared initial or
/// final use.
#[derive(Clone, Copy, Debug)]
pub struct UseRef {
    pub usage: Use,
    pub pass: Option<PassId>,
}

///Ordered sequence of uses of one resolved name across the frame.
pub type UseChain = Vec<UseRef>;
