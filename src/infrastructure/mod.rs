pub mod collaborators;
pub mod logging;

pub use collaborators::{
    BadgeSink, ConfirmationSurface, LoggingBadge, LoggingSurface, NetworkService,
    NoopNetworkService, Subsystem,
};
