// Domain models: plan hierarchy, catalog, athletes and sessions

pub mod periodization;
pub mod exercise;
pub mod athlete;
pub mod session;
pub mod dashboard;
pub mod plan_generation;
pub mod timezone;

pub use periodization::*;
pub use exercise::*;
pub use athlete::*;
pub use session::*;
pub use dashboard::*;
pub use plan_generation::*;
pub use timezone::*;
