use super::ConfigGraph;
use crate::{
    catalog::ElementCatalog,
    error::{Error, StructuralError},
};

impl ConfigGraph {
    /// Every structural problem in the graph: links with fewer than two ends, invalid or reused
    /// ports, and statistic groups referring to missing components, unsupported statistics or
    /// missing outputs.
    pub fn structural_errors(&self, catalog: &dyn ElementCatalog) -> Vec<StructuralError> {
        let mut errors = Vec::new();
        for link in &self.links {
            let mut ends = link.bound_ends();
            match (ends.next(), ends.next()) {
                (Some(_), Some(_)) => {}
                (Some(end), None) => errors.push(StructuralError::DanglingLink {
                    link: link.name().to_string(),
                    component: self.display_name(&end.component),
                    port: end.port.clone(),
                }),
                (None, _) => errors.push(StructuralError::UnboundLink(link.name().to_string())),
            }
        }
        for comp in &self.comps {
            errors.extend(comp.check_ports(&self.links, catalog));
        }
        for group in self.stat_groups.values() {
            errors.extend(group.verify_stats_and_components(self, catalog));
        }
        for error in &errors {
            tracing::warn!(%error, "structural error");
        }
        errors
    }

    /// Fails with every structural error found, if there is any.
    pub fn check_for_structural_errors(&self, catalog: &dyn ElementCatalog) -> Result<(), Error> {
        let errors = self.structural_errors(catalog);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Structural(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        catalog::{ElementInfo, ElementRegistry},
        error::{Error, StructuralError},
        graph::ConfigGraph,
        ident::ComponentId,
        params::Params,
    };

    #[test]
    fn complete_graph_is_clean() -> anyhow::Result<()> {
        let mut graph = ConfigGraph::new();
        let a = graph.add_component("a", "test.node")?;
        let b = graph.add_component("b", "test.node")?;
        graph.add_link(&a, "ab", "out", "1ns", false)?;
        graph.add_link(&b, "ab", "in", "1ns", false)?;
        graph.check_for_structural_errors(&ElementRegistry::new())?;
        Ok(())
    }

    #[test]
    fn dangling_link_reported_once() -> anyhow::Result<()> {
        let mut graph = ConfigGraph::new();
        let a = graph.add_component("a", "test.node")?;
        graph.add_link(&a, "loose", "out", "1ns", false)?;
        let errors = graph.structural_errors(&ElementRegistry::new());
        assert_eq!(
            errors,
            [StructuralError::DanglingLink {
                link: "loose".into(),
                component: "a".into(),
                port: "out".into(),
            }]
        );
        assert!(matches!(
            graph.check_for_structural_errors(&ElementRegistry::new()),
            Err(Error::Structural(found)) if found.len() == 1
        ));
        Ok(())
    }

    #[test]
    fn invalid_port_names_subcomponent_path() -> anyhow::Result<()> {
        let mut registry = ElementRegistry::new();
        registry.register("test.cache", ElementInfo::new().with_port("mem_link"));
        let mut graph = ConfigGraph::new();
        let cpu = graph.add_component("cpu", "test.cpu")?;
        let cache = graph
            .find_component_mut(&cpu)
            .expect("cpu")
            .add_sub_component("l1", "test.cache", 0)?
            .id()
            .clone();
        let mem = graph.add_component("mem", "test.mem")?;
        graph.add_link(&cache, "c_m", "bus", "1ns", false)?;
        graph.add_link(&mem, "c_m", "port", "1ns", false)?;
        assert_eq!(
            graph.structural_errors(&registry),
            [StructuralError::InvalidPort {
                component: "cpu:l1[0]".into(),
                port: "bus".into(),
            }]
        );
        Ok(())
    }

    #[test]
    fn stat_group_problems() -> anyhow::Result<()> {
        let mut registry = ElementRegistry::new();
        registry.register("test.cache", ElementInfo::new().with_statistic("hits", 3));
        let mut graph = ConfigGraph::new();
        let cache = graph.add_component("cache", "test.cache")?;
        graph
            .find_component_mut(&cache)
            .expect("cache")
            .set_statistic_load_level(1, false);
        let group = graph.stat_group("g");
        group.add_statistic("hits", Params::new())?;
        group.add_statistic("misses", Params::new())?;
        group.add_component(cache);
        group.add_component(ComponentId::new(42));
        group.set_output(3);

        let errors = graph.structural_errors(&registry);
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&StructuralError::MissingGroupOutput {
            group: "g".into(),
            output: 3
        }));
        assert!(errors.contains(&StructuralError::MissingGroupMember {
            group: "g".into(),
            component: ComponentId::new(42)
        }));
        assert!(errors.contains(&StructuralError::UnsupportedStatistic {
            group: "g".into(),
            component: "cache".into(),
            statistic: "misses".into()
        }));
        assert!(errors.contains(&StructuralError::StatisticLevel {
            group: "g".into(),
            component: "cache".into(),
            statistic: "hits".into(),
            required: 3,
            configured: 1
        }));
        Ok(())
    }
}
