use std::collections::BTreeMap;

use crate::{
    catalog::ElementCatalog,
    error::{Error, StructuralError},
    graph::ConfigGraph,
    ident::{ComponentId, StatisticId},
    params::Params,
    time::Quantity,
};

/// Statistic name that enables every statistic a component declares.
pub const STAT_ALL: &str = "--ALL--";
/// Load level of a component that has not chosen one.
pub const STAT_LOAD_LEVEL_UNSET: u8 = 0xff;
pub const STAT_LOAD_LEVEL_DEFAULT: u8 = 0;
pub const STAT_OUTPUT_DEFAULT: &str = "sst.statOutputConsole";

/// An enabled statistic.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConfigStatistic {
    /// `None` marks the unshared default configuration used by "enable all".
    pub id: Option<StatisticId>,
    /// Whether other components may report into this statistic.
    pub shared: bool,
    pub name: String,
    pub params: Params,
}

impl ConfigStatistic {
    pub fn new(id: StatisticId, shared: bool, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            shared,
            name: name.into(),
            params: Params::new(),
        }
    }

    pub fn add_parameter(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        overwrite: bool,
    ) {
        self.params.insert(key, value, overwrite);
    }
}

/// A named bundle of statistics collected across several components and written to one output at
/// one frequency.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfigStatGroup {
    pub name: String,
    pub stat_map: BTreeMap<String, Params>,
    pub components: Vec<ComponentId>,
    pub output_id: usize,
    pub output_frequency: Quantity,
}

impl ConfigStatGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a member component; returns `false` if it was already a member.
    pub fn add_component(&mut self, id: ComponentId) -> bool {
        if self.components.contains(&id) {
            return false;
        }
        self.components.push(id);
        true
    }

    /// Adds (or replaces) a statistic. The first statistic carrying a `rate` parameter sets the
    /// group's output frequency if none was set explicitly.
    pub fn add_statistic(&mut self, name: impl Into<String>, params: Params) -> Result<(), Error> {
        if self.output_frequency.is_zero() {
            let rate = params.get("rate").unwrap_or("0ns");
            self.output_frequency =
                Quantity::parse(rate).map_err(|_| Error::InvalidFrequency(rate.to_string()))?;
        }
        self.stat_map.insert(name.into(), params);
        Ok(())
    }

    /// Selects the output (index into the graph's statistic outputs). Checked during validation.
    pub fn set_output(&mut self, id: usize) {
        self.output_id = id;
    }

    /// Accepts a period (`s`), a rate (`Hz`) or an event count (`events`).
    pub fn set_frequency(&mut self, freq: &str) -> Result<(), Error> {
        self.output_frequency =
            Quantity::parse(freq).map_err(|_| Error::InvalidFrequency(freq.to_string()))?;
        Ok(())
    }

    /// Checks that every member exists and supports every statistic of the group at its
    /// configured load level. All mismatches are reported.
    pub fn verify_stats_and_components(
        &self,
        graph: &ConfigGraph,
        catalog: &dyn ElementCatalog,
    ) -> Vec<StructuralError> {
        let mut errors = Vec::new();
        if self.output_id >= graph.stat_outputs().len() {
            errors.push(StructuralError::MissingGroupOutput {
                group: self.name.clone(),
                output: self.output_id,
            });
        }
        for id in &self.components {
            let Some(comp) = graph.find_component(id) else {
                errors.push(StructuralError::MissingGroupMember {
                    group: self.name.clone(),
                    component: id.clone(),
                });
                continue;
            };
            for statistic in self.stat_map.keys() {
                match catalog.statistic_enable_level(comp.ty(), statistic) {
                    None => errors.push(StructuralError::UnsupportedStatistic {
                        group: self.name.clone(),
                        component: comp.name().to_string(),
                        statistic: statistic.clone(),
                    }),
                    Some(required)
                        if comp.stat_load_level() != STAT_LOAD_LEVEL_UNSET
                            && required > comp.stat_load_level() =>
                    {
                        errors.push(StructuralError::StatisticLevel {
                            group: self.name.clone(),
                            component: comp.name().to_string(),
                            statistic: statistic.clone(),
                            required,
                            configured: comp.stat_load_level(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }
        errors
    }
}

/// A statistic sink: an output type name plus its parameters.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConfigStatOutput {
    pub ty: String,
    pub params: Params,
}

impl ConfigStatOutput {
    pub fn new(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            params: Params::new(),
        }
    }

    pub fn add_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key, value, true);
    }
}
