pub mod api;
pub mod config;
pub mod errors;
pub mod http_transport;
pub mod telemetry;

pub use api::{build_router, PostRequest, SharedNode};
pub use config::{NodeArgs, NodeConfig};
pub use errors::NodeError;
pub use http_transport::HttpTransport;
