//! The flattened view of a configuration graph that rank assignment works on.
//!
//! Subcomponents are folded into their top-level component and statistics are dropped. A
//! partition graph is rebuilt on demand and only feeds back into the configuration graph through
//! [`ConfigGraph::annotate_ranks`](crate::ConfigGraph::annotate_ranks).

use std::collections::BTreeSet;

use smallvec::SmallVec;

use crate::{
    error::Error,
    ident::{ComponentId, LinkId, PartitionId},
    rank::RankInfo,
    sparse::{Keyed, SparseMap},
    time::SimTime,
};

/// One unit of placement: a top-level component, or a cluster of them joined by no-cut links.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionComponent {
    pub id: PartitionId,
    pub weight: f64,
    pub rank: RankInfo,
    pub links: SmallVec<[LinkId; 4]>,
    /// The top-level configuration components this unit stands for.
    pub group: BTreeSet<ComponentId>,
}

impl PartitionComponent {
    pub(crate) fn new(id: PartitionId) -> Self {
        Self {
            id,
            weight: 0.0,
            rank: RankInfo::UNASSIGNED,
            links: SmallVec::new(),
            group: BTreeSet::new(),
        }
    }
}

impl Keyed for PartitionComponent {
    type Key = PartitionId;

    fn key(&self) -> PartitionId {
        self.id
    }
}

/// A link between two partition components. Keeps the configuration link's ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionLink {
    pub id: LinkId,
    pub component: [PartitionId; 2],
    pub latency: [SimTime; 2],
    pub no_cut: bool,
}

impl PartitionLink {
    pub fn min_latency(&self) -> SimTime {
        self.latency[0].min(self.latency[1])
    }
}

impl Keyed for PartitionLink {
    type Key = LinkId;

    fn key(&self) -> LinkId {
        self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionGraph {
    pub(crate) comps: SparseMap<PartitionComponent>,
    pub(crate) links: SparseMap<PartitionLink>,
}

impl PartitionGraph {
    pub fn components(&self) -> &SparseMap<PartitionComponent> {
        &self.comps
    }

    /// Partitioners write their rank assignments through this.
    pub fn components_mut(&mut self) -> &mut SparseMap<PartitionComponent> {
        &mut self.comps
    }

    pub fn links(&self) -> &SparseMap<PartitionLink> {
        &self.links
    }

    pub fn num_components(&self) -> usize {
        self.comps.len()
    }

    /// The partition component standing for the configuration component `id`.
    pub fn find_group(&self, id: &ComponentId) -> Option<&PartitionComponent> {
        let top = id.top();
        self.comps.iter().find(|pc| pc.group.contains(&top))
    }

    pub fn total_weight(&self) -> f64 {
        self.comps.iter().map(|pc| pc.weight).sum()
    }
}

/// Assigns ranks onto the components of a partition graph.
pub trait Partitioner {
    fn perform_partition(&mut self, graph: &mut PartitionGraph) -> Result<(), Error>;

    /// Whether this partitioner must see no-cut clusters folded into single components. A
    /// partitioner answering `false` is trusted to keep clusters together on its own.
    fn requires_collapsed(&self) -> bool {
        true
    }
}

/// Puts everything on one rank and thread.
#[derive(Debug, Clone, Copy, Default, derive_new::new)]
pub struct SinglePartitioner {
    rank: RankInfo,
}

impl Partitioner for SinglePartitioner {
    fn perform_partition(&mut self, graph: &mut PartitionGraph) -> Result<(), Error> {
        let rank = if self.rank.is_assigned() {
            self.rank
        } else {
            RankInfo::new(0, 0)
        };
        for pc in graph.components_mut().iter_mut() {
            pc.rank = rank;
        }
        Ok(())
    }
}

/// Deals partition components across `world.rank * world.thread` slots in ID order, filling the
/// threads of a rank before moving to the next rank.
#[derive(Debug, Clone, Copy, derive_new::new)]
pub struct RoundRobinPartitioner {
    world: RankInfo,
}

impl Partitioner for RoundRobinPartitioner {
    fn perform_partition(&mut self, graph: &mut PartitionGraph) -> Result<(), Error> {
        let RankInfo { rank: ranks, thread: threads } = self.world;
        if ranks == 0 || threads == 0 || !self.world.is_assigned() {
            return Err(Error::EmptyWorld(self.world));
        }
        let threads = u64::from(threads);
        let slots = u64::from(ranks) * threads;
        for (i, pc) in graph.components_mut().iter_mut().enumerate() {
            let slot = i as u64 % slots;
            pc.rank = RankInfo::new((slot / threads) as u32, (slot % threads) as u32);
        }
        tracing::debug!(
            world = %self.world,
            units = graph.num_components(),
            "round-robin partition"
        );
        Ok(())
    }
}
