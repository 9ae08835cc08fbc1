use crate::{
    pid::PidFile,
    process::ProcessController,
};
use color_eyre::Result;
use neo_cat_config::{
    Args,
    Settings,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Shutdown,
    Reload,
}

/// Waits for ctrl-c, and on unix also for SIGTERM (shutdown) and SIGHUP (reload).
struct Signals {
    #[cfg(unix)]
    term: tokio::signal::unix::Signal,
    #[cfg(unix)]
    hup: tokio::signal::unix::Signal,
}

impl Signals {
    fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{
                signal,
                SignalKind,
            };
            Ok(Self {
                term: signal(SignalKind::terminate())?,
                hup: signal(SignalKind::hangup())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    async fn recv(&mut self) -> Signal {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => Signal::Shutdown,
                _ = self.term.recv() => Signal::Shutdown,
                _ = self.hup.recv() => Signal::Reload,
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("failed to listen for ctrl-c: {err}");
            }
            Signal::Shutdown
        }
    }
}

pub struct App {
    args: Args,
    settings: Settings,
    controller: ProcessController<'static>,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let settings = Settings::new(&args)?;
        Ok(Self {
            args,
            settings,
            controller: ProcessController::global(),
        })
    }

    pub async fn run(mut self) -> Result<()> {
        let _pid = self.args.pid.as_deref().map(PidFile::create).transpose()?;
        let mut signals = Signals::new()?;

        info!(
            version = env!("CARGO_PKG_VERSION"),
            config_dir = %self.settings.config_dir().display(),
            "neo-cat starting"
        );
        // a bad configuration keeps the process up, waiting for a reload
        if let Err(err) = self.controller.start(&self.settings).await {
            error!("failed to start process: {err}");
        }

        loop {
            match signals.recv().await {
                Signal::Shutdown => break,
                Signal::Reload => self.reload().await,
            }
        }

        info!("shutting down");
        self.controller.stop().await?;
        Ok(())
    }

    async fn reload(&mut self) {
        info!("reloading settings");
        match Settings::new(&self.args) {
            Ok(settings) => self.settings = settings,
            Err(err) => {
                error!("failed to reload settings, keeping the previous ones: {err}");
                return;
            }
        }
        if let Err(err) = self.controller.restart(&self.settings).await {
            error!("failed to restart process: {err}");
        }
    }
}
