use jasmin_proto::{ConnectorId, Direction, GroupId, UserId};
use thiserror::Error;

use crate::snapshot::SnapshotError;

#[derive(Debug, Error)]
pub enum UcsError {
    #[error("user '{0}' already exists")]
    UserExists(UserId),

    #[error("user '{0}' not found")]
    UserNotFound(UserId),

    #[error("group '{0}' already exists")]
    GroupExists(GroupId),

    #[error("group '{0}' not found")]
    GroupNotFound(GroupId),

    #[error("connector '{0}' already exists")]
    ConnectorExists(ConnectorId),

    #[error("connector '{0}' not found")]
    ConnectorNotFound(ConnectorId),

    #[error("connector '{0}' must be stopped before it can be removed")]
    ConnectorStillStarted(ConnectorId),

    #[error("no {direction:?} route at priority {priority}")]
    RouteNotFound { direction: Direction, priority: u32 },

    #[error(transparent)]
    Quota(#[from] jasmin_proto::JasminError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}
