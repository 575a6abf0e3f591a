use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt,
};

use crate::{
    catalog::ElementCatalog,
    error::{Error, StructuralError},
    graph::GraphToken,
    ident::{ComponentId, LinkId, StatisticId},
    link::ConfigLink,
    params::Params,
    rank::RankInfo,
    sparse::{Keyed, SparseMap},
    statistic::{ConfigStatistic, STAT_ALL, STAT_LOAD_LEVEL_UNSET},
};

/// A component (or subcomponent) of the configuration graph.
///
/// Components are created through [`ConfigGraph::add_component`](crate::ConfigGraph::add_component)
/// and subcomponents through [`ConfigComponent::add_sub_component`]. Each carries a token naming
/// the graph it belongs to; the graph re-binds it after deserialization.
#[derive(
    Debug,
    Clone,
    derivative::Derivative,
    typed_builder::TypedBuilder,
    serde::Serialize,
    serde::Deserialize,
)]
#[derivative(PartialEq)]
pub struct ConfigComponent {
    pub(crate) id: ComponentId,
    #[serde(skip)]
    #[derivative(PartialEq = "ignore")]
    pub(crate) graph: GraphToken,
    /// Component name, or slot name for a subcomponent.
    #[builder(setter(into))]
    pub(crate) name: String,
    #[builder(default)]
    pub(crate) slot_num: i32,
    #[builder(setter(into))]
    pub(crate) ty: String,
    #[builder(default = 1.0)]
    pub(crate) weight: f64,
    #[builder(default)]
    pub(crate) rank: RankInfo,
    #[builder(default, setter(skip))]
    pub(crate) links: Vec<LinkId>,
    #[builder(default, setter(skip))]
    params: Params,
    #[builder(default = STAT_LOAD_LEVEL_UNSET, setter(skip))]
    stat_load_level: u8,

    // Statistics
    #[builder(default, setter(skip))]
    enabled_stat_names: BTreeMap<String, StatisticId>,
    #[builder(default, setter(skip))]
    enabled_all_stats: bool,
    #[builder(default, setter(skip))]
    all_stat_config: ConfigStatistic,
    #[builder(default, setter(skip))]
    statistics: BTreeMap<u32, ConfigStatistic>,

    #[builder(default, setter(skip))]
    pub(crate) sub_components: Vec<ConfigComponent>,
    #[builder(default, setter(skip))]
    coords: [f64; 3],
    #[builder(default, setter(skip))]
    next_sub_id: u32,
    #[builder(default, setter(skip))]
    next_stat_id: u32,
}

impl ConfigComponent {
    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn graph(&self) -> GraphToken {
        self.graph
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slot_num(&self) -> i32 {
        self.slot_num
    }

    pub fn ty(&self) -> &str {
        &self.ty
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn rank(&self) -> RankInfo {
        self.rank
    }

    /// Links attached directly to this component (not to its subcomponents).
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn coords(&self) -> [f64; 3] {
        self.coords
    }

    pub fn stat_load_level(&self) -> u8 {
        self.stat_load_level
    }

    pub fn enabled_all_stats(&self) -> bool {
        self.enabled_all_stats
    }

    /// Shared configuration applied to every statistic when all are enabled.
    pub fn all_stat_config(&self) -> &ConfigStatistic {
        &self.all_stat_config
    }

    pub fn enabled_stat_names(&self) -> &BTreeMap<String, StatisticId> {
        &self.enabled_stat_names
    }

    pub fn sub_components(&self) -> &[ConfigComponent] {
        &self.sub_components
    }

    /// Subcomponents loaded into slot `slot`, ordered by slot number.
    pub fn sub_components_in_slot(&self, slot: &str) -> Vec<&ConfigComponent> {
        let mut found: Vec<_> = self
            .sub_components
            .iter()
            .filter(|sc| sc.name == slot)
            .collect();
        found.sort_by_key(|sc| sc.slot_num);
        found
    }

    /// Sets the rank of this component and all its subcomponents.
    pub fn set_rank(&mut self, rank: RankInfo) {
        self.rank = rank;
        for sc in &mut self.sub_components {
            sc.set_rank(rank);
        }
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
        for sc in &mut self.sub_components {
            sc.set_weight(weight);
        }
    }

    /// Missing coordinates are zero; anything past the third is ignored.
    pub fn set_coordinates(&mut self, coords: &[f64]) {
        self.coords = [0.0; 3];
        for (dst, src) in self.coords.iter_mut().zip(coords) {
            *dst = *src;
        }
    }

    pub fn add_parameter(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        overwrite: bool,
    ) -> bool {
        self.params.insert(key, value, overwrite)
    }

    pub fn add_global_param_set(&mut self, set: impl Into<String>) {
        self.params.add_global_set(set);
    }

    /// Loads a new subcomponent of type `ty` into slot `name[slot_num]`.
    pub fn add_sub_component(
        &mut self,
        name: impl Into<String>,
        ty: impl Into<String>,
        slot_num: i32,
    ) -> Result<&mut ConfigComponent, Error> {
        let name = name.into();
        if self
            .sub_components
            .iter()
            .any(|sc| sc.name == name && sc.slot_num == slot_num)
        {
            return Err(Error::SlotOccupied {
                parent: self.id.clone(),
                slot: name,
                slot_num,
            });
        }
        let id = self.id.child(self.next_sub_id);
        self.next_sub_id += 1;
        tracing::debug!(parent = %self.id, %id, slot = %name, slot_num, "adding subcomponent");
        let sub = ConfigComponent::builder()
            .id(id)
            .graph(self.graph)
            .name(name)
            .slot_num(slot_num)
            .ty(ty)
            .weight(self.weight)
            .rank(self.rank)
            .build();
        let idx = self.sub_components.len();
        self.sub_components.push(sub);
        Ok(&mut self.sub_components[idx])
    }

    /// Finds a descendant by ID. Returns `None` for IDs outside this subtree.
    pub fn find_sub_component(&self, id: &ComponentId) -> Option<&ConfigComponent> {
        if !id.is_descendant_of(&self.id) {
            return None;
        }
        let mut cur = self;
        for local in &id.path()[self.id.depth()..] {
            cur = cur
                .sub_components
                .iter()
                .find(|sc| sc.id.local_index() == Some(*local))?;
        }
        Some(cur)
    }

    pub fn find_sub_component_mut(&mut self, id: &ComponentId) -> Option<&mut ConfigComponent> {
        if !id.is_descendant_of(&self.id) {
            return None;
        }
        let mut cur = self;
        for local in &id.path()[cur.id.depth()..] {
            cur = cur
                .sub_components
                .iter_mut()
                .find(|sc| sc.id.local_index() == Some(*local))?;
        }
        Some(cur)
    }

    /// Finds a descendant by slot path, e.g. `memory[1]:cache`. A missing `[n]` means slot 0.
    pub fn find_sub_component_by_name(&self, name: &str) -> Option<&ConfigComponent> {
        let (head, rest) = split_slot_path(name);
        let (slot, slot_num) = parse_slot(head)?;
        let sc = self
            .sub_components
            .iter()
            .find(|sc| sc.name == slot && sc.slot_num == slot_num)?;
        match rest {
            None => Some(sc),
            Some(rest) => sc.find_sub_component_by_name(rest),
        }
    }

    pub fn find_sub_component_by_name_mut(&mut self, name: &str) -> Option<&mut ConfigComponent> {
        let (head, rest) = split_slot_path(name);
        let (slot, slot_num) = parse_slot(head)?;
        let sc = self
            .sub_components
            .iter_mut()
            .find(|sc| sc.name == slot && sc.slot_num == slot_num)?;
        match rest {
            None => Some(sc),
            Some(rest) => sc.find_sub_component_by_name_mut(rest),
        }
    }

    /// Links of this component and of every descendant.
    pub fn all_links(&self) -> Vec<LinkId> {
        let mut links = self.links.clone();
        for sc in &self.sub_components {
            links.extend(sc.all_links());
        }
        links
    }

    fn next_statistic_id(&mut self) -> StatisticId {
        let id = StatisticId::new(self.id.clone(), self.next_stat_id);
        self.next_stat_id += 1;
        id
    }

    /// Enables statistic `name`, merging `params` into any existing configuration.
    ///
    /// [`STAT_ALL`] enables everything the component type declares through one shared default
    /// configuration rather than one entry per statistic.
    pub fn enable_statistic(
        &mut self,
        name: &str,
        params: &Params,
        recursively: bool,
    ) -> Result<&mut ConfigStatistic, Error> {
        self.check_statistic_enable(name, recursively)?;
        if recursively {
            for sc in &mut self.sub_components {
                sc.enable_statistic(name, params, true)?;
            }
        }
        if name == STAT_ALL {
            self.enabled_all_stats = true;
            self.all_stat_config.name = STAT_ALL.to_string();
            self.all_stat_config.params.insert_all(params, true);
            return Ok(&mut self.all_stat_config);
        }
        let id = match self.enabled_stat_names.get(name) {
            Some(id) if id.owner != self.id => {
                return Err(Error::StatisticShared {
                    name: name.to_string(),
                    id: id.clone(),
                })
            }
            Some(id) => id.clone(),
            None => {
                let id = self.next_statistic_id();
                self.enabled_stat_names.insert(name.to_string(), id.clone());
                id
            }
        };
        let stat = self
            .statistics
            .entry(id.index)
            .or_insert_with(|| ConfigStatistic::new(id, false, name));
        stat.params.insert_all(params, true);
        Ok(stat)
    }

    /// Allocates an unnamed statistic, e.g. to be bound later with [`Self::reuse_statistic`].
    pub fn create_statistic(&mut self) -> StatisticId {
        let id = self.next_statistic_id();
        self.statistics
            .insert(id.index, ConfigStatistic::new(id.clone(), false, ""));
        id
    }

    /// Allocates a statistic that other components may report into.
    pub fn create_shared_statistic(
        &mut self,
        name: impl Into<String>,
        params: &Params,
    ) -> StatisticId {
        let id = self.next_statistic_id();
        let mut stat = ConfigStatistic::new(id.clone(), true, name);
        stat.params.insert_all(params, true);
        self.statistics.insert(id.index, stat);
        id
    }

    /// Binds `name` to an existing statistic, possibly owned by another component.
    pub fn reuse_statistic(&mut self, name: &str, id: StatisticId) -> Result<(), Error> {
        if name == STAT_ALL {
            return Err(Error::InvalidStatisticName(name.to_string()));
        }
        self.enabled_stat_names.insert(name.to_string(), id);
        Ok(())
    }

    pub fn find_statistic_id(&self, name: &str) -> Option<&StatisticId> {
        self.enabled_stat_names.get(name)
    }

    /// A statistic owned by this component.
    pub fn statistic(&self, id: &StatisticId) -> Option<&ConfigStatistic> {
        if id.owner != self.id {
            return None;
        }
        self.statistics.get(&id.index)
    }

    /// Every statistic owned by this component, in allocation order.
    pub fn statistics(&self) -> impl Iterator<Item = &ConfigStatistic> {
        self.statistics.values()
    }

    // Fails if enabling `name` here (or anywhere below) would hit a name bound to a foreign
    // statistic.
    fn check_statistic_enable(&self, name: &str, recursively: bool) -> Result<(), Error> {
        if name != STAT_ALL {
            if let Some(id) = self.enabled_stat_names.get(name) {
                if id.owner != self.id {
                    return Err(Error::StatisticShared {
                        name: name.to_string(),
                        id: id.clone(),
                    });
                }
            }
        }
        if recursively {
            for sc in &self.sub_components {
                sc.check_statistic_enable(name, true)?;
            }
        }
        Ok(())
    }

    // Index of the local statistic `name` configures; `None` for the enable-all configuration.
    fn local_statistic_index(&self, name: &str) -> Result<Option<u32>, Error> {
        let not_enabled = || Error::StatisticNotEnabled {
            component: self.id.clone(),
            name: name.to_string(),
        };
        if name == STAT_ALL {
            return if self.enabled_all_stats {
                Ok(None)
            } else {
                Err(not_enabled())
            };
        }
        let id = self.enabled_stat_names.get(name).ok_or_else(not_enabled)?;
        if id.owner != self.id {
            return Err(Error::StatisticShared {
                name: name.to_string(),
                id: id.clone(),
            });
        }
        if !self.statistics.contains_key(&id.index) {
            return Err(Error::UnknownStatistic(id.clone()));
        }
        Ok(Some(id.index))
    }

    fn local_statistic_mut(&mut self, name: &str) -> Result<&mut ConfigStatistic, Error> {
        match self.local_statistic_index(name)? {
            None => Ok(&mut self.all_stat_config),
            Some(index) => self
                .statistics
                .get_mut(&index)
                .ok_or_else(|| Error::UnknownStatistic(StatisticId::new(self.id.clone(), index))),
        }
    }

    fn check_statistic_configurable(&self, name: &str, recursively: bool) -> Result<(), Error> {
        self.local_statistic_index(name)?;
        if recursively {
            for sc in &self.sub_components {
                sc.check_statistic_configurable(name, true)?;
            }
        }
        Ok(())
    }

    fn update_statistic(
        &mut self,
        name: &str,
        recursively: bool,
        f: &mut impl FnMut(&mut ConfigStatistic),
    ) -> Result<(), Error> {
        f(self.local_statistic_mut(name)?);
        if recursively {
            for sc in &mut self.sub_components {
                sc.update_statistic(name, true, f)?;
            }
        }
        Ok(())
    }

    /// Sets one parameter of statistic `name`. With `recursively`, every subcomponent must have
    /// `name` enabled too; otherwise nothing changes.
    pub fn add_statistic_parameter(
        &mut self,
        name: &str,
        key: &str,
        value: &str,
        recursively: bool,
    ) -> Result<(), Error> {
        self.check_statistic_configurable(name, recursively)?;
        self.update_statistic(name, recursively, &mut |stat| {
            stat.add_parameter(key, value, true)
        })
    }

    pub fn set_statistic_parameters(
        &mut self,
        name: &str,
        params: &Params,
        recursively: bool,
    ) -> Result<(), Error> {
        self.check_statistic_configurable(name, recursively)?;
        self.update_statistic(name, recursively, &mut |stat| {
            stat.params.insert_all(params, true)
        })
    }

    pub fn set_statistic_load_level(&mut self, level: u8, recursively: bool) {
        self.stat_load_level = level;
        if recursively {
            for sc in &mut self.sub_components {
                sc.set_statistic_load_level(level, true);
            }
        }
    }

    /// Checks that every port this component (and each descendant) connects to is valid for its
    /// type and used by at most one link.
    pub fn check_ports(
        &self,
        links: &SparseMap<ConfigLink>,
        catalog: &dyn ElementCatalog,
    ) -> Vec<StructuralError> {
        let mut errors = Vec::new();
        self.check_ports_named(&self.name, links, catalog, &mut errors);
        errors
    }

    fn check_ports_named(
        &self,
        full_name: &str,
        links: &SparseMap<ConfigLink>,
        catalog: &dyn ElementCatalog,
        errors: &mut Vec<StructuralError>,
    ) {
        let mut ports: BTreeMap<&str, LinkId> = BTreeMap::new();
        for link_id in &self.links {
            let Some(link) = links.get(link_id) else {
                continue;
            };
            // Both ends of a self-link need checking
            for end in link.bound_ends().filter(|end| end.component == self.id) {
                if !catalog.is_port_valid(&self.ty, &end.port) {
                    errors.push(StructuralError::InvalidPort {
                        component: full_name.to_string(),
                        port: end.port.clone(),
                    });
                }
                match ports.entry(end.port.as_str()) {
                    Entry::Vacant(e) => {
                        e.insert(*link_id);
                    }
                    Entry::Occupied(e) if e.get() == link_id => {
                        errors.push(StructuralError::PortUsedTwice {
                            component: full_name.to_string(),
                            port: end.port.clone(),
                            link: link.name().to_string(),
                        });
                    }
                    Entry::Occupied(e) => {
                        let first = links
                            .get(e.get())
                            .map(|l| l.name().to_string())
                            .unwrap_or_else(|| e.get().to_string());
                        errors.push(StructuralError::PortReused {
                            component: full_name.to_string(),
                            port: end.port.clone(),
                            first,
                            second: link.name().to_string(),
                        });
                    }
                }
            }
        }
        for sc in &self.sub_components {
            let name = format!("{}:{}[{}]", full_name, sc.name, sc.slot_num);
            sc.check_ports_named(&name, links, catalog, errors);
        }
    }

    pub(crate) fn rebind(&mut self, graph: GraphToken) {
        self.graph = graph;
        for sc in &mut self.sub_components {
            sc.rebind(graph);
        }
    }

    /// Visits this component and every descendant, parents first.
    pub(crate) fn visit<'a>(&'a self, f: &mut impl FnMut(&'a ConfigComponent)) {
        f(self);
        for sc in &self.sub_components {
            sc.visit(f);
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = " ".repeat(indent);
        if self.id.is_subcomponent() {
            writeln!(f, "{pad}{}[{}] (id = {})", self.name, self.slot_num, self.id)?;
        } else {
            writeln!(f, "{pad}{} (id = {})", self.name, self.id)?;
        }
        writeln!(f, "{pad}  type = {}", self.ty)?;
        writeln!(f, "{pad}  weight = {}", self.weight)?;
        writeln!(f, "{pad}  rank = {}", self.rank)?;
        let links: Vec<_> = self.links.iter().map(ToString::to_string).collect();
        writeln!(f, "{pad}  links = [{}]", links.join(", "))?;
        for (key, value) in self.params.iter() {
            writeln!(f, "{pad}  param {key} = {value}")?;
        }
        for (name, id) in &self.enabled_stat_names {
            writeln!(f, "{pad}  statistic {name} = {id}")?;
        }
        if self.enabled_all_stats {
            writeln!(f, "{pad}  statistic {STAT_ALL}")?;
        }
        for sc in &self.sub_components {
            sc.fmt_indented(f, indent + 2)?;
        }
        Ok(())
    }
}

impl Keyed for ConfigComponent {
    type Key = ComponentId;

    fn key(&self) -> ComponentId {
        self.id.clone()
    }
}

impl fmt::Display for ConfigComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

pub(crate) fn split_slot_path(name: &str) -> (&str, Option<&str>) {
    match name.split_once(':') {
        Some((head, rest)) => (head, Some(rest)),
        None => (name, None),
    }
}

// "slot[3]" -> ("slot", 3), "slot" -> ("slot", 0)
fn parse_slot(slot: &str) -> Option<(&str, i32)> {
    match slot.split_once('[') {
        Some((name, tail)) => Some((name, tail.strip_suffix(']')?.parse().ok()?)),
        None => Some((slot, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::ElementRegistry, link::LinkEnd, time::SimTime};

    fn component(top: u64, name: &str) -> ConfigComponent {
        ConfigComponent::builder()
            .id(ComponentId::new(top))
            .graph(GraphToken::default())
            .name(name)
            .ty("test.node")
            .build()
    }

    #[test]
    fn subcomponent_ids_derive_from_parent() -> anyhow::Result<()> {
        let mut comp = component(7, "cpu");
        let first = comp.add_sub_component("cache", "test.cache", 0)?.id().clone();
        let second = comp.add_sub_component("cache", "test.cache", 1)?.id().clone();
        assert_eq!(first.parent(), Some(ComponentId::new(7)));
        assert!(first < second);
        let nested = comp
            .find_sub_component_mut(&second)
            .expect("second cache")
            .add_sub_component("prefetcher", "test.pf", 0)?
            .id()
            .clone();
        assert_eq!(nested.parent(), Some(second.clone()));
        assert_eq!(comp.find_sub_component(&nested).map(|c| c.name()), Some("prefetcher"));
        assert!(comp.find_sub_component(&ComponentId::new(8).child(0)).is_none());
        Ok(())
    }

    #[test]
    fn occupied_slot_rejected() -> anyhow::Result<()> {
        let mut comp = component(0, "cpu");
        comp.add_sub_component("cache", "test.cache", 0)?;
        assert!(matches!(
            comp.add_sub_component("cache", "test.other", 0),
            Err(Error::SlotOccupied { .. })
        ));
        assert_eq!(comp.sub_components().len(), 1);
        Ok(())
    }

    #[test]
    fn find_by_slot_path() -> anyhow::Result<()> {
        let mut comp = component(0, "cpu");
        comp.add_sub_component("mem", "test.mem", 2)?
            .add_sub_component("bank", "test.bank", 0)?;
        comp.add_sub_component("mem", "test.mem", 0)?;
        let bank = comp.find_sub_component_by_name("mem[2]:bank").expect("bank");
        assert_eq!(bank.ty(), "test.bank");
        assert_eq!(comp.find_sub_component_by_name("mem").map(|c| c.slot_num()), Some(0));
        assert!(comp.find_sub_component_by_name("mem[5]").is_none());
        assert!(comp.find_sub_component_by_name("mem[x]").is_none());
        let slots: Vec<_> = comp
            .sub_components_in_slot("mem")
            .iter()
            .map(|c| c.slot_num())
            .collect();
        assert_eq!(slots, [0, 2]);
        Ok(())
    }

    #[test]
    fn rank_and_weight_propagate() -> anyhow::Result<()> {
        let mut comp = component(0, "cpu");
        comp.set_weight(3.0);
        comp.add_sub_component("cache", "test.cache", 0)?;
        assert_eq!(comp.sub_components()[0].weight(), 3.0);
        comp.set_rank(RankInfo::new(2, 1));
        assert_eq!(comp.sub_components()[0].rank(), RankInfo::new(2, 1));
        Ok(())
    }

    #[test]
    fn coordinates_padded() {
        let mut comp = component(0, "cpu");
        comp.set_coordinates(&[1.0, 2.0]);
        assert_eq!(comp.coords(), [1.0, 2.0, 0.0]);
        comp.set_coordinates(&[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(comp.coords(), [4.0, 5.0, 6.0]);
    }

    #[test]
    fn enable_merges_parameters() -> anyhow::Result<()> {
        let mut comp = component(0, "cpu");
        let first: Params = [("rate", "1us"), ("type", "accumulator")].into_iter().collect();
        let id = comp.enable_statistic("cycles", &first, false)?.id.clone();
        let second: Params = [("rate", "5us")].into_iter().collect();
        let again = comp.enable_statistic("cycles", &second, false)?;
        assert_eq!(again.id, id);
        assert_eq!(again.params.get("rate"), Some("5us"));
        assert_eq!(again.params.get("type"), Some("accumulator"));
        assert_eq!(comp.statistics().count(), 1);
        Ok(())
    }

    #[test]
    fn enable_all_uses_shared_default() -> anyhow::Result<()> {
        let mut comp = component(0, "cpu");
        comp.add_sub_component("cache", "test.cache", 0)?;
        let params: Params = [("rate", "1us")].into_iter().collect();
        comp.enable_statistic(STAT_ALL, &params, true)?;
        assert!(comp.enabled_all_stats());
        assert!(comp.sub_components()[0].enabled_all_stats());
        assert_eq!(comp.all_stat_config().params.get("rate"), Some("1us"));
        assert_eq!(comp.statistics().count(), 0);
        comp.add_statistic_parameter(STAT_ALL, "rate", "2us", true)?;
        assert_eq!(comp.sub_components()[0].all_stat_config().params.get("rate"), Some("2us"));
        Ok(())
    }

    #[test]
    fn recursive_enable_allocates_per_component() -> anyhow::Result<()> {
        let mut comp = component(0, "cpu");
        comp.add_sub_component("cache", "test.cache", 0)?;
        comp.enable_statistic("hits", &Params::new(), true)?;
        let parent_id = comp.find_statistic_id("hits").cloned().expect("parent stat");
        let child = &comp.sub_components()[0];
        let child_id = child.find_statistic_id("hits").cloned().expect("child stat");
        assert_ne!(parent_id, child_id);
        assert_eq!(child_id.owner, *child.id());
        Ok(())
    }

    #[test]
    fn reuse_binds_foreign_statistic() -> anyhow::Result<()> {
        let mut owner = component(0, "a");
        let mut other = component(1, "b");
        let shared = owner.create_shared_statistic("bytes", &Params::new());
        other.reuse_statistic("bytes", shared.clone())?;
        assert_eq!(other.find_statistic_id("bytes"), Some(&shared));
        assert!(other.statistic(&shared).is_none());
        assert!(owner.statistic(&shared).is_some_and(|s| s.shared));
        assert!(matches!(
            other.enable_statistic("bytes", &Params::new(), false),
            Err(Error::StatisticShared { .. })
        ));
        assert!(matches!(
            other.reuse_statistic(STAT_ALL, shared),
            Err(Error::InvalidStatisticName(_))
        ));
        Ok(())
    }

    #[test]
    fn statistic_parameter_requires_enable() {
        let mut comp = component(0, "cpu");
        assert!(matches!(
            comp.add_statistic_parameter("hits", "rate", "1us", false),
            Err(Error::StatisticNotEnabled { .. })
        ));
    }

    #[test]
    fn recursive_parameter_update_is_all_or_nothing() -> anyhow::Result<()> {
        let mut comp = component(0, "cpu");
        comp.enable_statistic("hits", &Params::new(), false)?;
        comp.add_sub_component("cache", "test.cache", 0)?;
        let before = comp.clone();

        assert!(matches!(
            comp.add_statistic_parameter("hits", "rate", "5us", true),
            Err(Error::StatisticNotEnabled { .. })
        ));
        assert_eq!(comp, before);
        let params: Params = [("rate", "5us")].into_iter().collect();
        assert!(comp.set_statistic_parameters("hits", &params, true).is_err());
        assert_eq!(comp, before);

        comp.add_statistic_parameter("hits", "rate", "5us", false)?;
        let id = comp.find_statistic_id("hits").expect("hits").clone();
        assert_eq!(comp.statistic(&id).and_then(|s| s.params.get("rate")), Some("5us"));
        Ok(())
    }

    #[test]
    fn recursive_enable_is_all_or_nothing() -> anyhow::Result<()> {
        let mut owner = component(9, "owner");
        let shared = owner.create_shared_statistic("bytes", &Params::new());
        let mut comp = component(0, "cpu");
        comp.add_sub_component("first", "test.sub", 0)?;
        let second = comp.add_sub_component("second", "test.sub", 0)?;
        second.reuse_statistic("bytes", shared)?;
        let before = comp.clone();

        assert!(matches!(
            comp.enable_statistic("bytes", &Params::new(), true),
            Err(Error::StatisticShared { .. })
        ));
        assert_eq!(comp, before);
        assert!(comp.sub_components()[0].find_statistic_id("bytes").is_none());
        Ok(())
    }

    #[test]
    fn port_checks() {
        let mut comp = component(0, "cpu");
        let mut links = SparseMap::new();
        for (idx, port) in ["out", "out", "bad port"].into_iter().enumerate() {
            let id = LinkId::from_usize(idx);
            let mut link = ConfigLink::new(id, format!("l{idx}"));
            link.bind(
                0,
                LinkEnd::new(comp.id().clone(), port.to_string(), "1ps".into(), SimTime::ONE),
            );
            links.insert(link);
            comp.links.push(id);
        }
        let errors = comp.check_ports(&links, &ElementRegistry::new());
        assert_eq!(errors.len(), 2);
        assert!(matches!(&errors[0], StructuralError::PortReused { first, second, .. }
            if first == "l0" && second == "l1"));
        assert!(matches!(
            &errors[1],
            StructuralError::InvalidPort { port, .. } if port == "bad port"
        ));
    }
}
