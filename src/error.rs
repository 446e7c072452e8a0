use thiserror::Error;

/// A live platform query the positioning request depends on failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformQueryError {
    #[error("taskbar position could not be retrieved")]
    TaskbarUnavailable,

    #[error("taskbar reported unknown edge {0}")]
    UnknownTaskbarEdge(u32),

    #[error("monitor information could not be retrieved")]
    MonitorInfoUnavailable,

    #[error("no display monitors found")]
    NoMonitors,
}
