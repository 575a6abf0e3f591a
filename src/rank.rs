/// A parallel placement: the rank (process) and the thread within that rank.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derivative::Derivative,
    serde::Serialize,
    serde::Deserialize,
)]
#[derivative(Default)]
pub struct RankInfo {
    #[derivative(Default(value = "RankInfo::UNASSIGNED_VALUE"))]
    pub rank: u32,
    #[derivative(Default(value = "0"))]
    pub thread: u32,
}

impl RankInfo {
    const UNASSIGNED_VALUE: u32 = u32::MAX;

    pub const UNASSIGNED: RankInfo = RankInfo::new(Self::UNASSIGNED_VALUE, 0);

    pub const fn new(rank: u32, thread: u32) -> Self {
        Self { rank, thread }
    }

    pub const fn is_assigned(&self) -> bool {
        self.rank != Self::UNASSIGNED_VALUE && self.thread != Self::UNASSIGNED_VALUE
    }

    /// Whether this placement is valid in a world of `bounds.rank` ranks with `bounds.thread`
    /// threads each.
    pub const fn in_range(&self, bounds: RankInfo) -> bool {
        self.is_assigned() && self.rank < bounds.rank && self.thread < bounds.thread
    }
}

impl std::fmt::Display for RankInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_assigned() {
            write!(f, "{}:{}", self.rank, self.thread)
        } else {
            write!(f, "unassigned")
        }
    }
}
