//! Structural description of a parallel discrete-event simulation: components, the links between
//! their ports, and the statistics they collect, together with the flattened partition graph
//! used to place components on ranks.
//!
//! A model is built into a [`ConfigGraph`], validated with
//! [`ConfigGraph::check_for_structural_errors`], partitioned with a [`partition::Partitioner`],
//! and sliced per rank with [`ConfigGraph::sub_graph`].

pub mod catalog;
pub mod partition;
pub mod time;

pub(crate) mod component;
pub(crate) mod error;
pub(crate) mod graph;
pub(crate) mod ident;
pub(crate) mod link;
pub(crate) mod params;
pub(crate) mod rank;
pub(crate) mod sparse;
pub(crate) mod statistic;

pub use component::ConfigComponent;
pub use error::{Error, Result, StructuralError};
pub use graph::{ConfigGraph, ForeignComponent, GraphOptions, GraphToken};
pub use ident::{ComponentId, LinkId, PartitionId, StatisticId, SubPath};
pub use link::{ConfigLink, LinkEnd};
pub use params::{GlobalParams, Params};
pub use rank::RankInfo;
pub use sparse::{Keyed, SparseMap};
pub use statistic::{
    ConfigStatGroup, ConfigStatOutput, ConfigStatistic, STAT_ALL, STAT_LOAD_LEVEL_DEFAULT,
    STAT_LOAD_LEVEL_UNSET, STAT_OUTPUT_DEFAULT,
};
