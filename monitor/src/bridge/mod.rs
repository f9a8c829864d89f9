pub mod model;
pub mod server;

pub use model::DashboardModel;
pub use server::MonitorBridge;
