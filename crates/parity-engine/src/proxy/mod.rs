//! Live adapters over arbitrary backing instances
//!
//! A proxy is an instance of a generated subtype of some declared supertype.
//! Every overridable method of the subtype is intercepted and forwarded to a
//! backing object, with public field state copied across around each call.

mod cache;
mod forwarder;

pub use cache::{instantiator_for, ProxyInstantiator, PROXY_SUFFIX};
pub use forwarder::{create_proxy, ForwardingFailure, ForwardingHandler};
