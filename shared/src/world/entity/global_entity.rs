use std::fmt;

/// Stable, server-assigned identifier of a replicated entity.
///
/// Unique per simulation and never reused while the entity exists. Ordered, so that
/// per-connection bookkeeping can iterate entities deterministically.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct GlobalEntity(u64);

impl GlobalEntity {
    pub fn from_u64(value: u64) -> Self {
        GlobalEntity(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GlobalEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}
