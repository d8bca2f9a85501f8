//! Monitoring dashboard: the latest-record store, its HTTP surface and the
//! push client used when the dashboard runs in another process.

mod publisher;
mod server;
mod store;

pub use publisher::{EventSink, HttpPublisher, PushClient, PushOutcome};
pub use server::{ApiConfig, ApiHandle, ApiServer, ALIVE_MESSAGE};
pub use store::{DashboardState, DashboardStatus};
