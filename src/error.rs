use crate::model::EntryId;
use std::collections::TryReserveError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("can't grow storage: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("entry {0} already has children")]
    HasChildren(EntryId),

    #[error("entry {0} is not a leaf")]
    NotALeaf(EntryId),

    #[error("entry {0} is not a container")]
    NotAContainer(EntryId),

    #[error("entry {0} can't adopt its own chain")]
    SelfReference(EntryId),

    #[error("entry {0} has no parameters")]
    NoParams(EntryId),

    #[error("parameter not found: {0}")]
    ParamNotFound(String),

    #[error("tree rooted at {0} has no playable entry")]
    NotPlayable(EntryId),

    #[error("no valid entry reachable from {0}")]
    DeadEnd(EntryId),

    #[error("entry {0} no longer exists")]
    Stale(EntryId),

    #[error("entry {0} is outside the cursor's subtree")]
    OutsideRoot(EntryId),

    #[error("cursor is not positioned")]
    Unpositioned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
