//! Shared domain model for the Jasmin gateway: identifiers, users/groups/
//! credentials, quotas, filters/routes, DLR correlation and segmentation.
//! Every other crate in the workspace depends on this one instead of
//! redefining these types at its own edge.

pub mod admin;
pub mod connector;
pub mod dlr;
pub mod error;
pub mod filter;
pub mod ids;
pub mod notification;
pub mod quota;
pub mod route;
pub mod segmentation;
pub mod user;

pub use admin::{AdminRequest, AdminRequestEnvelope, AdminResponse, AdminResponseEnvelope, JsonRpcVersion};
pub use connector::{BindType, Connector, ConnectorStatus, ReconnectPolicy, RetrialRule};
pub use dlr::{DlrCorrelation, DlrLevel, DlrMethod, DlrOriginator, ReassemblyBuffer};
pub use error::JasminError;
pub use filter::{Direction, Filter, Originator, Routable, ScriptExpr};
pub use ids::{ConnectorId, GroupId, MessageId, UserId};
pub use notification::{DlrNotification, MoNotification, MoSubscriber};
pub use quota::{BalanceQuota, CountQuota};
pub use route::{Route, RouteDestination, RouteKind, RouteTable};
pub use segmentation::{LongContentSplit, Segment};
pub use user::{
    ConnectionCounters, FilterRegex, Group, MtAction, MtCredential, MtField, PasswordDigest,
    SmppsCredential, User,
};
