#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("process is already running")]
    AlreadyRunning,
    #[error("process is running, stop it before changing its configuration")]
    NotStopped,
    #[error("interval not configured")]
    IntervalNotConfigured,
    #[error("interval {0:?} is wrong value")]
    InvalidInterval(String),
    #[error("unknown inlet {0:?}")]
    UnknownInlet(String),
    #[error("unknown outlet {0:?}")]
    UnknownOutlet(String),
    #[error("invalid arguments for {name}: {reason}")]
    InvalidArgs { name: String, reason: eyre::Report },
    #[error("failed to open inlet {name}: {reason}")]
    OpenInlet { name: String, reason: eyre::Report },
    #[error("failed to close inlet {name}: {reason}")]
    CloseInlet { name: String, reason: eyre::Report },
    #[error("failed to open outlet {name}: {reason}")]
    OpenOutlet { name: String, reason: eyre::Report },
    #[error("failed to close outlet {name}: {reason}")]
    CloseOutlet { name: String, reason: eyre::Report },
}

impl PipelineError {
    /// Configuration errors are caused by the settings rather than by the host.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            PipelineError::IntervalNotConfigured
                | PipelineError::InvalidInterval(_)
                | PipelineError::UnknownInlet(_)
                | PipelineError::UnknownOutlet(_)
                | PipelineError::InvalidArgs { .. }
        )
    }
}
