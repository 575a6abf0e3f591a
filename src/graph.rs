mod partition;
mod validate;

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    component::{split_slot_path, ConfigComponent},
    error::Error,
    ident::{ComponentId, LinkId, StatisticId},
    link::{ConfigLink, LinkEnd},
    params::{GlobalParams, Params},
    rank::RankInfo,
    sparse::{Keyed, SparseMap},
    statistic::{
        ConfigStatGroup, ConfigStatOutput, ConfigStatistic, STAT_ALL, STAT_LOAD_LEVEL_DEFAULT,
        STAT_OUTPUT_DEFAULT,
    },
    time::{TimeAuthority, TimeLord},
};

/// Names the graph instance a component belongs to.
///
/// Tokens are never serialized: a deserialized graph mints a new one and re-binds its components.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub struct GraphToken(u64);

impl GraphToken {
    fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether this token names some graph (placeholders hold the default, unbound token).
    pub fn is_bound(self) -> bool {
        self.0 != 0
    }
}

/// Settings for a new configuration graph.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct GraphOptions {
    /// The duration of one simulation cycle.
    #[builder(default = TimeLord::DEFAULT_TIMEBASE.to_string(), setter(into))]
    timebase: String,
    /// Type of the default statistic output.
    #[builder(default = STAT_OUTPUT_DEFAULT.to_string(), setter(into))]
    stat_output: String,
    #[builder(default = STAT_LOAD_LEVEL_DEFAULT)]
    stat_load_level: u8,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A component that a subgraph does not contain but which sits on the far side of one of its
/// links.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new, serde::Serialize, serde::Deserialize)]
pub struct ForeignComponent {
    pub id: ComponentId,
    pub rank: RankInfo,
}

impl Keyed for ForeignComponent {
    type Key = ComponentId;

    fn key(&self) -> ComponentId {
        self.id.clone()
    }
}

/// The structural description of a simulated system: components, links and statistics.
#[derive(Debug, Clone, derivative::Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(PartialEq)]
#[serde(from = "GraphImage")]
pub struct ConfigGraph {
    #[serde(skip)]
    #[derivative(PartialEq = "ignore")]
    token: GraphToken,
    next_component_id: u64,
    next_link_id: LinkId,

    links: SparseMap<ConfigLink>,
    comps: SparseMap<ConfigComponent>,
    comps_by_name: BTreeMap<String, ComponentId>,
    link_names: BTreeMap<String, LinkId>,
    foreign: SparseMap<ForeignComponent>,

    global_params: GlobalParams,
    time_lord: TimeLord,

    stat_groups: BTreeMap<String, ConfigStatGroup>,
    // [0] is the default output
    stat_outputs: Vec<ConfigStatOutput>,
    stat_load_level: u8,
}

// Field-for-field mirror of `ConfigGraph`, so deserialization goes through `From` and re-binds
// every component to the new graph.
#[derive(serde::Deserialize)]
struct GraphImage {
    next_component_id: u64,
    next_link_id: LinkId,
    links: SparseMap<ConfigLink>,
    comps: SparseMap<ConfigComponent>,
    comps_by_name: BTreeMap<String, ComponentId>,
    link_names: BTreeMap<String, LinkId>,
    #[serde(default)]
    foreign: SparseMap<ForeignComponent>,
    #[serde(default)]
    global_params: GlobalParams,
    #[serde(default)]
    time_lord: TimeLord,
    stat_groups: BTreeMap<String, ConfigStatGroup>,
    stat_outputs: Vec<ConfigStatOutput>,
    stat_load_level: u8,
}

impl From<GraphImage> for ConfigGraph {
    fn from(image: GraphImage) -> Self {
        let mut graph = Self {
            token: GraphToken::fresh(),
            next_component_id: image.next_component_id,
            next_link_id: image.next_link_id,
            links: image.links,
            comps: image.comps,
            comps_by_name: image.comps_by_name,
            link_names: image.link_names,
            foreign: image.foreign,
            global_params: image.global_params,
            time_lord: image.time_lord,
            stat_groups: image.stat_groups,
            stat_outputs: image.stat_outputs,
            stat_load_level: image.stat_load_level,
        };
        if graph.stat_outputs.is_empty() {
            graph.stat_outputs.push(ConfigStatOutput::new(STAT_OUTPUT_DEFAULT));
        }
        graph.bind_components();
        graph
    }
}

impl Default for ConfigGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigGraph {
    pub fn new() -> Self {
        Self::from_parts(TimeLord::default(), STAT_OUTPUT_DEFAULT, STAT_LOAD_LEVEL_DEFAULT)
    }

    pub fn with_options(options: GraphOptions) -> Result<Self, Error> {
        let time_lord = TimeLord::new(&options.timebase)?;
        Ok(Self::from_parts(
            time_lord,
            &options.stat_output,
            options.stat_load_level,
        ))
    }

    fn from_parts(time_lord: TimeLord, stat_output: &str, stat_load_level: u8) -> Self {
        Self {
            token: GraphToken::fresh(),
            next_component_id: 0,
            next_link_id: LinkId::ZERO,
            links: SparseMap::new(),
            comps: SparseMap::new(),
            comps_by_name: BTreeMap::new(),
            link_names: BTreeMap::new(),
            foreign: SparseMap::new(),
            global_params: GlobalParams::new(),
            time_lord,
            stat_groups: BTreeMap::new(),
            stat_outputs: vec![ConfigStatOutput::new(stat_output)],
            stat_load_level,
        }
    }

    /// The token every component of this graph carries.
    pub fn token(&self) -> GraphToken {
        self.token
    }

    pub fn owns(&self, comp: &ConfigComponent) -> bool {
        comp.graph() == self.token
    }

    fn bind_components(&mut self) {
        let token = self.token;
        for comp in self.comps.iter_mut() {
            comp.rebind(token);
        }
    }

    pub fn time_lord(&self) -> &TimeLord {
        &self.time_lord
    }

    /// Number of top-level components.
    pub fn num_components(&self) -> usize {
        self.comps.len()
    }

    pub fn components(&self) -> &SparseMap<ConfigComponent> {
        &self.comps
    }

    pub fn links(&self) -> &SparseMap<ConfigLink> {
        &self.links
    }

    /// Components outside this (sub)graph that its links lead to.
    pub fn foreign_components(&self) -> &SparseMap<ForeignComponent> {
        &self.foreign
    }

    /// Visits every component and subcomponent, parents first, in ID order.
    pub fn for_each_component<'a>(&'a self, mut f: impl FnMut(&'a ConfigComponent)) {
        for comp in &self.comps {
            comp.visit(&mut f);
        }
    }

    pub fn add_component(
        &mut self,
        name: impl Into<String>,
        ty: impl Into<String>,
    ) -> Result<ComponentId, Error> {
        self.add_component_with(name, ty, 1.0, RankInfo::UNASSIGNED)
    }

    /// Adds a top-level component. Fails without touching the graph if `name` is taken.
    pub fn add_component_with(
        &mut self,
        name: impl Into<String>,
        ty: impl Into<String>,
        weight: f64,
        rank: RankInfo,
    ) -> Result<ComponentId, Error> {
        let name = name.into();
        if self.comps_by_name.contains_key(&name) {
            return Err(Error::DuplicateComponent(name));
        }
        let id = ComponentId::new(self.next_component_id);
        self.next_component_id += 1;
        tracing::debug!(%id, %name, "adding component");
        let comp = ConfigComponent::builder()
            .id(id.clone())
            .graph(self.token)
            .name(name.clone())
            .ty(ty)
            .weight(weight)
            .rank(rank)
            .build();
        self.comps.insert(comp);
        self.comps_by_name.insert(name, id.clone());
        Ok(id)
    }

    pub fn contains_component(&self, id: &ComponentId) -> bool {
        self.find_component(id).is_some()
    }

    /// Finds a component or subcomponent by ID.
    pub fn find_component(&self, id: &ComponentId) -> Option<&ConfigComponent> {
        let top = self.comps.get(&id.top())?;
        if id.is_subcomponent() {
            top.find_sub_component(id)
        } else {
            Some(top)
        }
    }

    pub fn find_component_mut(&mut self, id: &ComponentId) -> Option<&mut ConfigComponent> {
        let top = self.comps.get_mut(&id.top())?;
        if id.is_subcomponent() {
            top.find_sub_component_mut(id)
        } else {
            Some(top)
        }
    }

    /// Finds a component by name, or a subcomponent by `name:slot[n]:...` path.
    pub fn find_component_by_name(&self, name: &str) -> Option<&ConfigComponent> {
        let (head, rest) = split_slot_path(name);
        let top = self.comps.get(self.comps_by_name.get(head)?)?;
        match rest {
            None => Some(top),
            Some(rest) => top.find_sub_component_by_name(rest),
        }
    }

    pub fn find_component_by_name_mut(&mut self, name: &str) -> Option<&mut ConfigComponent> {
        let (head, rest) = split_slot_path(name);
        let id = self.comps_by_name.get(head)?.clone();
        let top = self.comps.get_mut(&id)?;
        match rest {
            None => Some(top),
            Some(rest) => top.find_sub_component_by_name_mut(rest),
        }
    }

    pub fn parent(&self, id: &ComponentId) -> Option<&ConfigComponent> {
        self.find_component(&id.parent()?)
    }

    /// The fully qualified name: `name` for components, `parent:slot[n]` for subcomponents.
    pub fn full_name(&self, id: &ComponentId) -> Option<String> {
        let mut cur = self.comps.get(&id.top())?;
        let mut name = cur.name().to_string();
        for local in id.path() {
            cur = cur
                .sub_components()
                .iter()
                .find(|sc| sc.id().local_index() == Some(*local))?;
            name = format!("{}:{}[{}]", name, cur.name(), cur.slot_num());
        }
        Some(name)
    }

    fn display_name(&self, id: &ComponentId) -> String {
        self.full_name(id).unwrap_or_else(|| id.to_string())
    }

    /// Attaches `port` of component `comp_id` to the link named `link_name`, creating the link
    /// on first reference. Fails without touching the graph if the component is unknown, the
    /// port is already connected, the link already has two ends, or the latency is invalid.
    pub fn add_link(
        &mut self,
        comp_id: &ComponentId,
        link_name: &str,
        port: &str,
        latency: &str,
        no_cut: bool,
    ) -> Result<LinkId, Error> {
        let comp = self
            .find_component(comp_id)
            .ok_or_else(|| Error::UnknownComponent(comp_id.clone()))?;
        for link_id in comp.links() {
            let Some(link) = self.links.get(link_id) else {
                continue;
            };
            if link
                .bound_ends()
                .any(|end| end.component == *comp_id && end.port == port)
            {
                return Err(Error::PortInUse {
                    component: comp_id.clone(),
                    port: port.to_string(),
                    link: *link_id,
                });
            }
        }
        let existing = self.link_names.get(link_name).copied();
        let side = match existing.and_then(|id| self.links.get(&id)) {
            Some(link) => link
                .free_side()
                .ok_or_else(|| Error::LinkOverbound(link_name.to_string()))?,
            None => 0,
        };
        let cycles = self
            .time_lord
            .sim_cycles(latency)
            .map_err(|source| Error::Latency {
                link: link_name.to_string(),
                source,
            })?;

        let link_id = match existing {
            Some(id) => id,
            None => {
                let id = self.next_link_id;
                self.next_link_id = id.next();
                self.link_names.insert(link_name.to_string(), id);
                self.links.insert(ConfigLink::new(id, link_name));
                id
            }
        };
        tracing::debug!(link = %link_name, component = %comp_id, %port, %latency, "binding link");
        let end = LinkEnd::new(comp_id.clone(), port.to_string(), latency.to_string(), cycles);
        if let Some(link) = self.links.get_mut(&link_id) {
            link.bind(side, end);
            link.no_cut |= no_cut;
        }
        if let Some(comp) = self.find_component_mut(comp_id) {
            if !comp.links.contains(&link_id) {
                comp.links.push(link_id);
            }
        }
        Ok(link_id)
    }

    /// Excludes the named link from partition cuts.
    pub fn set_link_no_cut(&mut self, link_name: &str) -> Result<(), Error> {
        let link = self
            .link_names
            .get(link_name)
            .and_then(|id| self.links.get_mut(id))
            .ok_or_else(|| Error::UnknownLink(link_name.to_string()))?;
        link.no_cut = true;
        Ok(())
    }

    pub fn find_link(&self, id: &LinkId) -> Option<&ConfigLink> {
        self.links.get(id)
    }

    pub fn find_link_by_name(&self, name: &str) -> Option<&ConfigLink> {
        self.links.get(self.link_names.get(name)?)
    }

    /// Re-resolves every link latency with `authority`.
    pub fn update_latencies(&mut self, authority: &dyn TimeAuthority) -> Result<(), Error> {
        for link in self.links.iter_mut() {
            link.update_latencies(authority).map_err(|source| Error::Latency {
                link: link.name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Switches to a new time base and re-resolves every latency against it. On error the graph
    /// keeps its old time base and latencies.
    pub fn set_time_lord(&mut self, time_lord: TimeLord) -> Result<(), Error> {
        let saved = self.links.clone();
        if let Err(e) = self.update_latencies(&time_lord) {
            self.links = saved;
            return Err(e);
        }
        self.time_lord = time_lord;
        Ok(())
    }

    pub fn add_global_param(
        &mut self,
        set: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.global_params
            .entry(set.to_string())
            .or_default()
            .insert(key, value, true);
    }

    pub fn global_params(&self) -> &GlobalParams {
        &self.global_params
    }

    /// Looks up `key` on a component, falling back to its subscribed global sets.
    pub fn find_param(&self, id: &ComponentId, key: &str) -> Option<&str> {
        self.find_component(id)?
            .params()
            .resolve(key, &self.global_params)
    }

    // Statistic outputs

    pub fn set_statistic_output(&mut self, ty: impl Into<String>) {
        self.stat_outputs[0].ty = ty.into();
    }

    /// Adds a further output and returns its index.
    pub fn add_statistic_output(&mut self, ty: impl Into<String>) -> usize {
        self.stat_outputs.push(ConfigStatOutput::new(ty));
        self.stat_outputs.len() - 1
    }

    pub fn add_statistic_output_parameter(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.stat_outputs[0].add_parameter(key, value);
    }

    pub fn set_statistic_output_params(&mut self, params: &Params) {
        self.stat_outputs[0].params.insert_all(params, true);
    }

    pub fn stat_outputs(&self) -> &[ConfigStatOutput] {
        &self.stat_outputs
    }

    pub fn stat_output(&self, index: usize) -> Option<&ConfigStatOutput> {
        self.stat_outputs.get(index)
    }

    pub fn stat_output_mut(&mut self, index: usize) -> Result<&mut ConfigStatOutput, Error> {
        self.stat_outputs
            .get_mut(index)
            .ok_or(Error::UnknownOutput(index))
    }

    pub fn set_statistic_load_level(&mut self, level: u8) {
        self.stat_load_level = level;
    }

    pub fn stat_load_level(&self) -> u8 {
        self.stat_load_level
    }

    pub fn stat_groups(&self) -> &BTreeMap<String, ConfigStatGroup> {
        &self.stat_groups
    }

    /// The named statistic group, created empty on first use.
    pub fn stat_group(&mut self, name: &str) -> &mut ConfigStatGroup {
        self.stat_groups
            .entry(name.to_string())
            .or_insert_with(|| ConfigStatGroup::new(name))
    }

    pub fn contains_statistic(&self, id: &StatisticId) -> bool {
        self.find_statistic(id).is_some()
    }

    pub fn find_statistic(&self, id: &StatisticId) -> Option<&ConfigStatistic> {
        self.find_component(&id.owner)?.statistic(id)
    }

    /// The statistic a component reports `name` into, following shared bindings.
    pub fn component_statistic(&self, id: &ComponentId, name: &str) -> Option<&ConfigStatistic> {
        let comp = self.find_component(id)?;
        if name == STAT_ALL {
            return comp.enabled_all_stats().then(|| comp.all_stat_config());
        }
        self.find_statistic(comp.find_statistic_id(name)?)
    }

    // Ranks

    /// Places every component on `rank` (serial runs).
    pub fn set_component_ranks(&mut self, rank: RankInfo) {
        for comp in self.comps.iter_mut() {
            comp.set_rank(rank);
        }
    }

    pub fn contains_component_in_rank(&self, rank: RankInfo) -> bool {
        self.comps.iter().any(|comp| comp.rank() == rank)
    }

    /// Verifies that every component and subcomponent sits on a rank inside `bounds`.
    pub fn check_ranks(&self, bounds: RankInfo) -> Result<(), Error> {
        let mut bad = Vec::new();
        self.for_each_component(|comp| {
            if !comp.rank().in_range(bounds) {
                bad.push(self.display_name(comp.id()));
            }
        });
        if bad.is_empty() {
            return Ok(());
        }
        for name in &bad {
            tracing::error!(component = %name, world = %bounds, "component has no valid rank");
        }
        Err(Error::UnrankedComponents(bad))
    }

    /// The slice of this graph that ranks in `rank_set` own: their components, plus every link
    /// with at least one end on them. Far ends on excluded ranks are recorded as foreign
    /// components rather than copied.
    pub fn sub_graph(&self, rank_set: &BTreeSet<u32>) -> ConfigGraph {
        let mut graph = Self {
            token: GraphToken::fresh(),
            next_component_id: self.next_component_id,
            next_link_id: self.next_link_id,
            links: SparseMap::new(),
            comps: SparseMap::new(),
            comps_by_name: BTreeMap::new(),
            link_names: BTreeMap::new(),
            foreign: SparseMap::new(),
            global_params: self.global_params.clone(),
            time_lord: self.time_lord.clone(),
            stat_groups: BTreeMap::new(),
            stat_outputs: self.stat_outputs.clone(),
            stat_load_level: self.stat_load_level,
        };
        let included = |id: &ComponentId| {
            self.comps
                .get(&id.top())
                .is_some_and(|comp| rank_set.contains(&comp.rank().rank))
        };

        for comp in self.comps.iter().filter(|comp| included(comp.id())) {
            let mut comp = comp.clone();
            comp.rebind(graph.token);
            graph.comps_by_name.insert(comp.name.clone(), comp.id.clone());
            graph.comps.insert(comp);
        }
        for link in &self.links {
            if !link.bound_ends().any(|end| included(&end.component)) {
                continue;
            }
            for end in link.bound_ends().filter(|end| !included(&end.component)) {
                let top = end.component.top();
                if let Some(comp) = self.comps.get(&top) {
                    graph.foreign.insert(ForeignComponent::new(top, comp.rank()));
                }
            }
            graph.link_names.insert(link.name.clone(), link.id);
            graph.links.insert(link.clone());
        }
        for (name, group) in &self.stat_groups {
            let mut group = group.clone();
            group.components.retain(|id| included(id));
            graph.stat_groups.insert(name.clone(), group);
        }
        tracing::debug!(
            ranks = ?rank_set,
            components = graph.comps.len(),
            links = graph.links.len(),
            "extracted subgraph"
        );
        graph
    }

    /// [`Self::sub_graph`] for the inclusive rank range `start..=end`.
    pub fn sub_graph_range(&self, start: u32, end: u32) -> ConfigGraph {
        self.sub_graph(&(start..=end).collect())
    }

    // Persistence

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn read_json(path: impl AsRef<Path>) -> Result<Self, Error> {
        let s = std::fs::read_to_string(path)?;
        Self::from_json(&s)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl fmt::Display for ConfigGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Printing graph")?;
        for comp in &self.comps {
            write!(f, "{comp}")?;
        }
        for link in &self.links {
            write!(f, "{link}")?;
        }
        Ok(())
    }
}
