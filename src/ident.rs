use smallvec::SmallVec;

macro_rules! identifier {
    ($name: ident) => {
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            Ord,
            PartialEq,
            Eq,
            Hash,
            derive_more::Display,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub const ZERO: $name = Self::new(0);
            pub const ONE: $name = Self::new(1);
            /// The "unset" sentinel.
            pub const MAX: $name = Self::new(u64::MAX);

            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub fn from_usize(val: usize) -> Self {
                Self(val as u64)
            }

            pub fn into_usize(self) -> usize {
                self.0 as usize
            }

            pub const fn into_u64(self) -> u64 {
                self.0
            }

            pub const fn is_null(self) -> bool {
                self.0 == u64::MAX
            }

            #[must_use]
            pub(crate) fn next(self) -> Self {
                Self(self.0 + 1)
            }
        }
    };
}

identifier!(LinkId);
identifier!(PartitionId);

/// Subcomponent indices below a top-level component. Most models nest one or two levels deep.
pub type SubPath = SmallVec<[u32; 2]>;

/// The identity of a component or subcomponent.
///
/// A top-level component is identified by its graph-assigned index alone. A subcomponent carries
/// the path of local indices handed out by each ancestor, so the parent of any ID can be recovered
/// without consulting the graph. IDs order parents before their descendants.
#[derive(
    Debug,
    Clone,
    PartialOrd,
    Ord,
    PartialEq,
    Eq,
    Hash,
    derivative::Derivative,
    serde::Serialize,
    serde::Deserialize,
)]
#[derivative(Default)]
pub struct ComponentId {
    #[derivative(Default(value = "u64::MAX"))]
    top: u64,
    path: SubPath,
}

impl ComponentId {
    pub fn new(top: u64) -> Self {
        Self {
            top,
            path: SubPath::new(),
        }
    }

    /// The "unset" sentinel, also used by deserialization placeholders.
    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.top == u64::MAX
    }

    /// The index of the top-level component this ID lives under.
    pub fn index(&self) -> u64 {
        self.top
    }

    /// The ID of the top-level component this ID lives under (itself if top-level).
    pub fn top(&self) -> ComponentId {
        Self::new(self.top)
    }

    pub fn path(&self) -> &[u32] {
        &self.path
    }

    pub fn is_subcomponent(&self) -> bool {
        !self.path.is_empty()
    }

    /// Number of subcomponent levels below the top-level ancestor.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// The local index assigned by the parent, if this is a subcomponent.
    pub fn local_index(&self) -> Option<u32> {
        self.path.last().copied()
    }

    pub fn parent(&self) -> Option<ComponentId> {
        if self.path.is_empty() {
            return None;
        }
        let mut path = self.path.clone();
        path.pop();
        Some(Self {
            top: self.top,
            path,
        })
    }

    pub fn child(&self, local: u32) -> ComponentId {
        let mut path = self.path.clone();
        path.push(local);
        Self {
            top: self.top,
            path,
        }
    }

    /// True if `self` is a strict descendant of `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &ComponentId) -> bool {
        self.top == ancestor.top
            && self.path.len() > ancestor.path.len()
            && self.path.starts_with(&ancestor.path)
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            return write!(f, "<null>");
        }
        write!(f, "{}", self.top)?;
        for idx in &self.path {
            write!(f, ".{idx}")?;
        }
        Ok(())
    }
}

/// The identity of an enabled statistic: its owning component plus a local index.
#[derive(
    Debug,
    Clone,
    PartialOrd,
    Ord,
    PartialEq,
    Eq,
    Hash,
    derive_more::Display,
    derive_new::new,
    serde::Serialize,
    serde::Deserialize,
)]
#[display(fmt = "{}#{}", owner, index)]
pub struct StatisticId {
    pub owner: ComponentId,
    pub index: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_recoverable_from_id() {
        let top = ComponentId::new(4);
        let sub = top.child(1).child(3);
        assert_eq!(sub.parent(), Some(top.child(1)));
        assert_eq!(sub.top(), top);
        assert_eq!(sub.depth(), 2);
        assert_eq!(sub.local_index(), Some(3));
        assert!(sub.is_descendant_of(&top));
        assert!(!top.is_descendant_of(&sub));
        assert_eq!(top.parent(), None);
    }

    #[test]
    fn ids_order_parent_first() {
        let a = ComponentId::new(1);
        let a1 = a.child(1);
        let b = ComponentId::new(2);
        assert!(a < a1);
        assert!(a1 < b);
    }

    #[test]
    fn null_ids() {
        assert!(ComponentId::null().is_null());
        assert!(!ComponentId::new(0).is_null());
        assert!(LinkId::MAX.is_null());
        assert_eq!(format!("{}", ComponentId::new(2).child(5)), "2.5");
    }
}
