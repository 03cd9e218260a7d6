pub mod attempt;
pub mod context;
pub mod failover;
pub mod origin;
pub mod registry;
pub mod selector;
pub mod transform;

pub use attempt::{AttemptError, AttemptExecutor};
pub use context::RequestContext;
pub use failover::{FailoverDriver, ProxyError};
pub use origin::{Origin, OriginError};
pub use registry::OriginPools;
pub use selector::WeightedSelector;
pub use transform::ResponseTransformer;
