//! Business logic services

pub mod activity;
pub mod auth;
pub mod backup;
pub mod devices;
pub mod keygen;
pub mod keys;
pub mod maintenance;
pub mod settings;
pub mod signing;
pub mod verification;

pub use activity::ActivityLog;
pub use auth::AuthService;
pub use backup::BackupService;
pub use devices::DeviceTracker;
pub use keygen::KeyFactory;
pub use keys::KeyLifecycleService;
pub use maintenance::{start_maintenance, MaintenanceState};
pub use settings::SettingsService;
pub use signing::SigningService;
pub use verification::VerificationService;
