use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use super::ConfigGraph;
use crate::{
    error::Error,
    ident::{ComponentId, PartitionId},
    partition::{PartitionComponent, PartitionGraph, PartitionLink, Partitioner},
    rank::RankInfo,
};

impl ConfigGraph {
    /// Collects into `group` every top-level component reachable from `start` over no-cut links,
    /// `start` included. Links on subcomponents count for their top-level component.
    pub fn connected_no_cut_comps(&self, start: &ComponentId, group: &mut BTreeSet<ComponentId>) {
        let mut stack = vec![start.top()];
        while let Some(id) = stack.pop() {
            if !group.insert(id.clone()) {
                continue;
            }
            let Some(comp) = self.comps.get(&id) else {
                continue;
            };
            for link_id in comp.all_links() {
                let Some(link) = self.links.get(&link_id) else {
                    continue;
                };
                if !link.no_cut() {
                    continue;
                }
                for end in link.bound_ends() {
                    let top = end.component.top();
                    if !group.contains(&top) {
                        stack.push(top);
                    }
                }
            }
        }
    }

    /// One partition component per top-level component, with the same index, and one partition
    /// link per link whose two ends both exist.
    pub fn partition_graph(&self) -> PartitionGraph {
        let mut graph = PartitionGraph::default();
        for comp in &self.comps {
            let mut pc = PartitionComponent::new(PartitionId::new(comp.id().index()));
            pc.weight = comp.weight();
            pc.rank = comp.rank();
            pc.group.insert(comp.id().clone());
            graph.comps.insert(pc);
        }
        for link in &self.links {
            let (Some(a), Some(b)) = (link.end(0), link.end(1)) else {
                continue;
            };
            let ends = [a, b].map(|end| PartitionId::new(end.component.index()));
            if !ends.iter().all(|pid| graph.comps.contains(pid)) {
                continue;
            }
            for pid in ends {
                if let Some(pc) = graph.comps.get_mut(&pid) {
                    pc.links.push(link.id());
                }
            }
            graph.links.insert(PartitionLink {
                id: link.id(),
                component: ends,
                latency: [a.latency, b.latency],
                no_cut: link.no_cut(),
            });
        }
        graph
    }

    /// Like [`Self::partition_graph`], but each no-cut cluster becomes a single partition
    /// component. Weights add up; the rank is kept only if every member agrees on it. Links inside
    /// a cluster disappear, so the result has nothing a partitioner may not cut.
    pub fn collapsed_partition_graph(&self) -> PartitionGraph {
        let mut graph = PartitionGraph::default();
        let mut owner: FxHashMap<ComponentId, PartitionId> = FxHashMap::default();
        let mut next = PartitionId::ZERO;

        for comp in &self.comps {
            if owner.contains_key(comp.id()) {
                continue;
            }
            let mut group = BTreeSet::new();
            self.connected_no_cut_comps(comp.id(), &mut group);

            let mut pc = PartitionComponent::new(next);
            let mut ranks = group
                .iter()
                .filter_map(|id| self.comps.get(id))
                .map(|member| member.rank());
            pc.rank = match ranks.next() {
                Some(first) if ranks.all(|r| r == first) => first,
                _ => RankInfo::UNASSIGNED,
            };
            pc.weight = group
                .iter()
                .filter_map(|id| self.comps.get(id))
                .map(|member| member.weight())
                .sum();
            for id in &group {
                owner.insert(id.clone(), next);
            }
            pc.group = group;
            graph.comps.insert(pc);
            next = next.next();
        }

        for link in &self.links {
            let (Some(a), Some(b)) = (link.end(0), link.end(1)) else {
                continue;
            };
            let (Some(&pa), Some(&pb)) = (
                owner.get(&a.component.top()),
                owner.get(&b.component.top()),
            ) else {
                continue;
            };
            if pa == pb {
                continue;
            }
            for pid in [pa, pb] {
                if let Some(pc) = graph.comps.get_mut(&pid) {
                    pc.links.push(link.id());
                }
            }
            graph.links.insert(PartitionLink {
                id: link.id(),
                component: [pa, pb],
                latency: [a.latency, b.latency],
                no_cut: link.no_cut(),
            });
        }
        tracing::debug!(
            components = self.comps.len(),
            units = graph.num_components(),
            "collapsed no-cut clusters"
        );
        graph
    }

    /// Copies the ranks of `graph` onto every member component and its subcomponents.
    pub fn annotate_ranks(&mut self, graph: &PartitionGraph) {
        for pc in graph.components() {
            for id in &pc.group {
                if let Some(comp) = self.comps.get_mut(id) {
                    comp.set_rank(pc.rank);
                }
            }
        }
    }

    /// Derives a partition graph, lets `partitioner` place it and writes the placement back.
    pub fn partition(
        &mut self,
        partitioner: &mut dyn Partitioner,
    ) -> Result<PartitionGraph, Error> {
        let mut graph = if partitioner.requires_collapsed() {
            self.collapsed_partition_graph()
        } else {
            self.partition_graph()
        };
        partitioner.perform_partition(&mut graph)?;
        self.annotate_ranks(&graph);
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::{
        graph::ConfigGraph,
        ident::{ComponentId, LinkId, PartitionId},
        partition::{RoundRobinPartitioner, SinglePartitioner},
        rank::RankInfo,
        time::SimTime,
    };

    // a -nc- b -nc- c -- d
    fn chain() -> anyhow::Result<(ConfigGraph, Vec<ComponentId>)> {
        let mut graph = ConfigGraph::new();
        let ids = ["a", "b", "c", "d"]
            .into_iter()
            .map(|name| graph.add_component(name, "test.node"))
            .collect::<Result<Vec<_>, _>>()?;
        for (i, no_cut) in [true, true, false].into_iter().enumerate() {
            let name = format!("l{i}");
            graph.add_link(&ids[i], &name, "right", "1ns", no_cut)?;
            graph.add_link(&ids[i + 1], &name, "left", "2ns", no_cut)?;
        }
        Ok((graph, ids))
    }

    #[test]
    fn no_cut_traversal() -> anyhow::Result<()> {
        let (mut graph, ids) = chain()?;
        let mut group = BTreeSet::new();
        graph.connected_no_cut_comps(&ids[1], &mut group);
        assert_eq!(group, ids[..3].iter().cloned().collect::<BTreeSet<_>>());

        let mut group = BTreeSet::new();
        graph.connected_no_cut_comps(&ids[3], &mut group);
        assert_eq!(group, BTreeSet::from([ids[3].clone()]));

        // Clearing l1's flag splits the cluster
        graph.links.get_mut(&LinkId::new(1)).expect("l1").no_cut = false;
        let mut group = BTreeSet::new();
        graph.connected_no_cut_comps(&ids[0], &mut group);
        assert_eq!(group.len(), 2);
        let mut group = BTreeSet::new();
        graph.connected_no_cut_comps(&ids[2], &mut group);
        assert_eq!(group.len(), 1);
        Ok(())
    }

    #[test]
    fn plain_partition_graph_mirrors_components() -> anyhow::Result<()> {
        let (mut graph, ids) = chain()?;
        graph
            .find_component_mut(&ids[0])
            .expect("a")
            .add_sub_component("sub", "test.sub", 0)?;
        graph.add_link(&ids[3], "loose", "extra", "1ns", false)?;
        let pg = graph.partition_graph();
        assert_eq!(pg.num_components(), 4);
        assert_eq!(pg.links().len(), 3);
        let l2 = pg.links().get(&LinkId::new(2)).expect("l2");
        assert_eq!(l2.component, [PartitionId::new(2), PartitionId::new(3)]);
        assert_eq!(l2.min_latency(), SimTime::new(1_000));
        Ok(())
    }

    #[test]
    fn collapsed_graph_folds_clusters() -> anyhow::Result<()> {
        let (mut graph, ids) = chain()?;
        graph.find_component_mut(&ids[1]).expect("b").set_weight(2.5);
        let pg = graph.collapsed_partition_graph();
        assert_eq!(pg.num_components(), 2);
        let cluster = pg.find_group(&ids[2]).expect("cluster");
        assert_eq!(cluster.group.len(), 3);
        assert_eq!(cluster.weight, 4.5);
        assert_eq!(pg.links().len(), 1);
        let link = pg.links().iter().next().expect("cut link");
        assert_eq!(link.id, LinkId::new(2));
        assert!(!link.no_cut);
        Ok(())
    }

    #[test]
    fn collapsed_rank_needs_agreement() -> anyhow::Result<()> {
        let (mut graph, ids) = chain()?;
        graph.set_component_ranks(RankInfo::new(1, 0));
        let pg = graph.collapsed_partition_graph();
        assert_eq!(pg.find_group(&ids[0]).map(|pc| pc.rank), Some(RankInfo::new(1, 0)));

        graph.find_component_mut(&ids[2]).expect("c").set_rank(RankInfo::new(0, 0));
        let pg = graph.collapsed_partition_graph();
        assert_eq!(pg.find_group(&ids[0]).map(|pc| pc.rank), Some(RankInfo::UNASSIGNED));
        Ok(())
    }

    #[test]
    fn partition_keeps_clusters_together() -> anyhow::Result<()> {
        let (mut graph, ids) = chain()?;
        let sub = graph
            .find_component_mut(&ids[3])
            .expect("d")
            .add_sub_component("sub", "test.sub", 0)?
            .id()
            .clone();
        graph.partition(&mut RoundRobinPartitioner::new(RankInfo::new(2, 1)))?;
        let rank_of = |id: &ComponentId| graph.find_component(id).map(|c| c.rank());
        for id in &ids[..3] {
            assert_eq!(rank_of(id), Some(RankInfo::new(0, 0)));
        }
        assert_eq!(rank_of(&ids[3]), Some(RankInfo::new(1, 0)));
        assert_eq!(rank_of(&sub), Some(RankInfo::new(1, 0)));
        graph.check_ranks(RankInfo::new(2, 1))?;

        graph.partition(&mut SinglePartitioner::default())?;
        assert!(!graph.contains_component_in_rank(RankInfo::new(1, 0)));
        Ok(())
    }
}
