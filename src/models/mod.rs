//! Data models

mod audit;
mod device;
mod key;
mod settings;
mod user;

pub use audit::*;
pub use device::*;
pub use key::*;
pub use settings::*;
pub use user::*;
