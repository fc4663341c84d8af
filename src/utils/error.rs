use crate::database::models::{GroupId, MatchId, PlayerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedingError {
    GroupNotExists(GroupId),
    MatchNotExists(MatchId),
    PlayerNotExists(PlayerId),
    /// The groups along the cycle, starting and ending with the same group.
    CyclicSeeding(Vec<GroupId>),
    MissingConfig(String),
    InvalidConfig(String, String),
    InjectedFailure(String),
}

impl std::fmt::Display for SeedingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use SeedingError::*;
        match self {
            GroupNotExists(id) => write!(f, "Group {} does not exist.", id),
            MatchNotExists(id) => write!(f, "Match {} does not exist.", id),
            PlayerNotExists(id) => write!(f, "Player {} does not exist.", id),
            CyclicSeeding(cycle) => write!(
                f,
                "Seeding would form a cycle: {}.",
                cycle
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            ),
            MissingConfig(key) => write!(f, "Expected {} as an environment variable.", key),
            InvalidConfig(key, value) => write!(f, "Invalid value {:?} for {}.", value, key),
            InjectedFailure(what) => write!(f, "Injected failure: {}.", what),
        }
    }
}

impl std::error::Error for SeedingError {}
