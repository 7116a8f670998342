pub mod directories;
pub mod logging;
pub mod notifier;
pub mod readiness;
pub mod shutdown;
