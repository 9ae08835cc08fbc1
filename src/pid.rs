use color_eyre::Result;
use eyre::Context as _;
use std::path::{
    Path,
    PathBuf,
};

/// Holds the process id in a file for as long as it lives.
#[derive(Debug)]
pub(crate) struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub(crate) fn create(path: &Path) -> Result<Self> {
        std::fs::write(path, format!("{}\n", std::process::id()))
            .wrap_err_with(|| format!("Failed to write pid file {path:?}"))?;
        debug!(path = %path.display(), "pid file written");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), "failed to remove pid file: {err}");
        }
    }
}
