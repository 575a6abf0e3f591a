use std::fmt;

use crate::{
    ident::{ComponentId, LinkId},
    sparse::Keyed,
    time::{SimTime, TimeAuthority, TimeError},
};

/// One side of a link: the port it is attached to and the latency of events sent from that side.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new, serde::Serialize, serde::Deserialize)]
pub struct LinkEnd {
    pub component: ComponentId,
    pub port: String,
    pub latency_str: String,
    pub latency: SimTime,
}

/// A bidirectional connection between two component ports.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConfigLink {
    pub(crate) id: LinkId,
    pub(crate) remote_tag: LinkId,
    pub(crate) name: String,
    pub(crate) ends: [Option<LinkEnd>; 2],
    pub(crate) current_ref: u32,
    pub(crate) no_cut: bool,
}

impl ConfigLink {
    pub(crate) fn new(id: LinkId, name: impl Into<String>) -> Self {
        Self {
            id,
            remote_tag: id,
            name: name.into(),
            ends: [None, None],
            current_ref: 0,
            no_cut: false,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Tag used to match up the two halves of a link that crosses ranks. Stays equal to the
    /// original ID even if links are renumbered.
    pub fn remote_tag(&self) -> LinkId {
        self.remote_tag
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn no_cut(&self) -> bool {
        self.no_cut
    }

    /// Number of components currently attached.
    pub fn current_ref(&self) -> u32 {
        self.current_ref
    }

    pub fn end(&self, side: usize) -> Option<&LinkEnd> {
        self.ends.get(side).and_then(Option::as_ref)
    }

    pub fn bound_ends(&self) -> impl Iterator<Item = &LinkEnd> {
        self.ends.iter().flatten()
    }

    pub fn is_complete(&self) -> bool {
        self.ends.iter().all(Option::is_some)
    }

    /// The component on side `side`, if bound.
    pub fn component(&self, side: usize) -> Option<&ComponentId> {
        self.end(side).map(|end| &end.component)
    }

    pub fn latency(&self, side: usize) -> Option<SimTime> {
        self.end(side).map(|end| end.latency)
    }

    /// The smaller of the two per-side latencies, considering only bound sides.
    pub fn min_latency(&self) -> Option<SimTime> {
        self.bound_ends().map(|end| end.latency).min()
    }

    /// Whether some side of this link attaches to `component` or one of its subcomponents.
    pub fn touches(&self, component: &ComponentId) -> bool {
        self.bound_ends()
            .any(|end| end.component == *component || end.component.is_descendant_of(component))
    }

    /// The next free side, if any.
    pub(crate) fn free_side(&self) -> Option<usize> {
        self.ends.iter().position(Option::is_none)
    }

    pub(crate) fn bind(&mut self, side: usize, end: LinkEnd) {
        debug_assert!(self.ends[side].is_none());
        self.ends[side] = Some(end);
        self.current_ref += 1;
    }

    /// Re-resolves both latency strings, e.g. after the time base changed.
    pub(crate) fn update_latencies(
        &mut self,
        authority: &dyn TimeAuthority,
    ) -> Result<(), TimeError> {
        for end in self.ends.iter_mut().flatten() {
            end.latency = authority.sim_cycles(&end.latency_str)?;
        }
        Ok(())
    }
}

impl Keyed for ConfigLink {
    type Key = LinkId;

    fn key(&self) -> LinkId {
        self.id
    }
}

impl fmt::Display for ConfigLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Link {} (id = {})", self.name, self.id)?;
        writeln!(f, "  remote_tag = {}", self.remote_tag)?;
        writeln!(f, "  no_cut = {}", self.no_cut)?;
        for (side, end) in self.ends.iter().enumerate() {
            match end {
                Some(end) => {
                    writeln!(f, "  component[{side}] = {}", end.component)?;
                    writeln!(f, "  port[{side}] = {}", end.port)?;
                    writeln!(f, "  latency[{side}] = {} ({})", end.latency, end.latency_str)?;
                }
                None => writeln!(f, "  component[{side}] = <unbound>")?,
            }
        }
        Ok(())
    }
}
