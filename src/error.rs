use crate::{
    ident::{ComponentId, LinkId, StatisticId},
    rank::RankInfo,
    time::TimeError,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("component name `{0}` is already in use")]
    DuplicateComponent(String),

    #[error("slot `{slot}[{slot_num}]` of component {parent} is already occupied")]
    SlotOccupied {
        parent: ComponentId,
        slot: String,
        slot_num: i32,
    },

    #[error("no component with ID {0}")]
    UnknownComponent(ComponentId),

    #[error("no link named `{0}`")]
    UnknownLink(String),

    #[error("no statistic with ID {0}")]
    UnknownStatistic(StatisticId),

    #[error("statistic name `{0}` cannot be bound to a shared statistic")]
    InvalidStatisticName(String),

    #[error("statistic `{name}` is bound to shared statistic {id} of another component")]
    StatisticShared { name: String, id: StatisticId },

    #[error("statistic `{name}` is not enabled on component {component}")]
    StatisticNotEnabled { component: ComponentId, name: String },

    #[error("link `{0}` is referenced more than two times")]
    LinkOverbound(String),

    #[error("port `{port}` of component {component} is already connected to link {link}")]
    PortInUse {
        component: ComponentId,
        port: String,
        link: LinkId,
    },

    #[error("invalid latency on link `{link}`: {source}")]
    Latency { link: String, source: TimeError },

    #[error("`{0}` is not a valid statistic output frequency")]
    InvalidFrequency(String),

    #[error("statistic output index {0} does not exist")]
    UnknownOutput(usize),

    #[error("{} component(s) without a valid rank: {}", .0.len(), .0.join(", "))]
    UnrankedComponents(Vec<String>),

    #[error("cannot partition onto {} rank(s) of {} thread(s)", .0.rank, .0.thread)]
    EmptyWorld(RankInfo),

    #[error("{} structural error(s) in configuration graph", .0.len())]
    Structural(Vec<StructuralError>),

    #[error("time error")]
    Time(#[from] TimeError),

    #[error("serde error")]
    Serde(#[from] serde_json::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}

/// A single finding of whole-graph validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    #[error("dangling link `{link}`: only connected to port `{port}` of component `{component}`")]
    DanglingLink {
        link: String,
        component: String,
        port: String,
    },

    #[error("link `{0}` is not connected to any component")]
    UnboundLink(String),

    #[error("component `{component}` has no port named `{port}`")]
    InvalidPort { component: String, port: String },

    #[error(
        "port `{port}` of component `{component}` is used by both link `{first}` \
         and link `{second}`"
    )]
    PortReused {
        component: String,
        port: String,
        first: String,
        second: String,
    },

    #[error("port `{port}` of component `{component}` is used twice by link `{link}`")]
    PortUsedTwice {
        component: String,
        port: String,
        link: String,
    },

    #[error("statistic group `{group}`: component ID {component} is not found")]
    MissingGroupMember { group: String, component: ComponentId },

    #[error(
        "statistic group `{group}`: component `{component}` does not support \
         statistic `{statistic}`"
    )]
    UnsupportedStatistic {
        group: String,
        component: String,
        statistic: String,
    },

    #[error(
        "statistic group `{group}`: statistic `{statistic}` requires load level {required}, \
         but component `{component}` is configured at level {configured}"
    )]
    StatisticLevel {
        group: String,
        component: String,
        statistic: String,
        required: u8,
        configured: u8,
    },

    #[error("statistic group `{group}` writes to output {output}, which does not exist")]
    MissingGroupOutput { group: String, output: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
