use crate::{
    error::PipelineError,
    input::InputHandler,
    plugin::{
        Inlet,
        Outlet,
    },
    registry::{
        PluginSpec,
        Registry,
    },
    report::Report,
};
use derive_more::Display;
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{
        mpsc,
        watch,
        Mutex,
    },
    task::JoinHandle,
    time::Instant,
};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Settings of one pipeline instance. Immutable once the pipeline is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub interval: Duration,
    pub tag_prefix: String,
    pub channel_capacity: usize,
}

impl PipelineConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            tag_prefix: String::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Parses a human readable interval such as `10s` or `1m 30s`.
    pub fn parse(interval: Option<&str>) -> Result<Self, PipelineError> {
        let raw = interval
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(PipelineError::IntervalNotConfigured)?;
        let interval = humantime::parse_duration(raw).map_err(|_| PipelineError::InvalidInterval(raw.to_string()))?;
        let config = Self::new(interval);
        config
            .validate()
            .map_err(|_| PipelineError::InvalidInterval(raw.to_string()))?;
        Ok(config)
    }

    /// Record names are lower case, so the prefix is too.
    pub fn with_tag_prefix(mut self, tag_prefix: impl AsRef<str>) -> Self {
        self.tag_prefix = tag_prefix.as_ref().to_lowercase();
        self
    }

    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    fn validate(&self) -> Result<(), PipelineError> {
        // the scheduler adds the interval to the clock on every tick
        let reachable = Instant::now()
            .checked_add(self.interval)
            .and_then(|next| next.checked_add(self.interval))
            .is_some();
        if self.interval.is_zero() || !reachable {
            return Err(PipelineError::InvalidInterval(humantime::format_duration(self.interval).to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
pub enum PipelineStatus {
    #[default]
    #[display("stopped")]
    Stopped,
    #[display("running")]
    Running,
}

struct NamedOutlet {
    name: String,
    outlet: Box<dyn Outlet>,
}

struct Running {
    tx: mpsc::Sender<Report>,
    fanout: JoinHandle<()>,
}

struct Inner {
    inputs: Vec<InputHandler>,
    outlets: Arc<Mutex<Vec<NamedOutlet>>>,
    running: Option<Running>,
}

/// Owns the input handlers, the outlets and the channel between them.
///
/// `run` and `stop` are serialized; a pipeline is either stopped (no tasks, no channel) or running
/// (one task per inlet plus one fan-out task).
pub struct Pipeline {
    config: PipelineConfig,
    inner: Mutex<Inner>,
    status: watch::Sender<PipelineStatus>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        Self::with_parts(config, Vec::new(), Vec::new())
    }

    /// Builds a pipeline whose inlets and outlets are created through `registry`.
    ///
    /// Unknown names and rejected arguments fail here, before anything is started.
    pub fn from_specs(
        registry: &Registry,
        config: PipelineConfig,
        inlets: &[PluginSpec],
        outlets: &[PluginSpec],
    ) -> Result<Self, PipelineError> {
        let inputs = inlets
            .iter()
            .map(|spec| Ok(InputHandler::new(&spec.name, registry.create_inlet(&spec.name, &spec.args)?)))
            .collect::<Result<Vec<_>, PipelineError>>()?;
        let outlets = outlets
            .iter()
            .map(|spec| {
                Ok(NamedOutlet {
                    name: spec.name.clone(),
                    outlet: registry.create_outlet(&spec.name, &spec.args)?,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;
        Self::with_parts(config, inputs, outlets)
    }

    fn with_parts(
        config: PipelineConfig,
        inputs: Vec<InputHandler>,
        outlets: Vec<NamedOutlet>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            inner: Mutex::new(Inner {
                inputs,
                outlets: Arc::new(Mutex::new(outlets)),
                running: None,
            }),
            status: watch::channel(PipelineStatus::Stopped).0,
        })
    }

    pub async fn add_inlet(&self, name: impl Into<String>, inlet: Box<dyn Inlet>) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        if inner.running.is_some() {
            return Err(PipelineError::NotStopped);
        }
        inner.inputs.push(InputHandler::new(name, inlet));
        Ok(())
    }

    pub async fn add_outlet(&self, name: impl Into<String>, outlet: Box<dyn Outlet>) -> Result<(), PipelineError> {
        let inner = self.inner.lock().await;
        if inner.running.is_some() {
            return Err(PipelineError::NotStopped);
        }
        inner.outlets.lock().await.push(NamedOutlet {
            name: name.into(),
            outlet,
        });
        Ok(())
    }

    pub fn running(&self) -> bool {
        *self.status.borrow() == PipelineStatus::Running
    }

    pub fn status(&self) -> PipelineStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineStatus> {
        self.status.subscribe()
    }

    /// Opens the outlets, spawns the fan-out task and starts one input handler per inlet.
    ///
    /// Either everything starts or nothing is left running.
    pub async fn run(&self) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        if inner.running.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }

        open_outlets(&inner.outlets).await?;

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let fanout = tokio::spawn(fan_out(rx, inner.outlets.clone()));
        let tag_prefix: Arc<str> = Arc::from(self.config.tag_prefix.as_str());

        for idx in 0..inner.inputs.len() {
            let started = inner.inputs[idx]
                .start(tx.clone(), self.config.interval, tag_prefix.clone())
                .await;
            if let Err(err) = started {
                for input in inner.inputs[..idx].iter_mut().rev() {
                    let _ = input.stop().await;
                }
                drop(tx);
                if let Err(join_err) = fanout.await {
                    error!("fan-out task failed: {join_err}");
                }
                let _ = close_outlets(&inner.outlets).await;
                return Err(err);
            }
        }

        info!(
            inlets = inner.inputs.len(),
            outlets = inner.outlets.lock().await.len(),
            interval = %humantime::format_duration(self.config.interval),
            tag_prefix = %self.config.tag_prefix,
            "process started"
        );
        inner.running = Some(Running { tx, fanout });
        self.status.send_replace(PipelineStatus::Running);
        Ok(())
    }

    /// Stops every input handler, drains the channel into the outlets and closes them.
    ///
    /// No report reaches an outlet after this returns. Stopping a stopped pipeline is a no-op.
    pub async fn stop(&self) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        let Some(Running { tx, fanout }) = inner.running.take() else {
            return Ok(());
        };

        let mut first_err = None;
        for input in inner.inputs.iter_mut() {
            if let Err(err) = input.stop().await {
                first_err.get_or_insert(err);
            }
        }

        // Every producer has exited; dropping the last sender closes the channel so the fan-out
        // task drains what is left and returns.
        drop(tx);
        if let Err(err) = fanout.await {
            error!("fan-out task failed: {err}");
        }

        if let Err(err) = close_outlets(&inner.outlets).await {
            first_err.get_or_insert(err);
        }

        self.status.send_replace(PipelineStatus::Stopped);
        info!("process stopped");
        first_err.map_or(Ok(()), Err)
    }
}

async fn open_outlets(outlets: &Mutex<Vec<NamedOutlet>>) -> Result<(), PipelineError> {
    let mut outlets = outlets.lock().await;
    for idx in 0..outlets.len() {
        let NamedOutlet { name, outlet } = &mut outlets[idx];
        if let Err(reason) = outlet.open().await {
            error!(outlet = %name, "failed to open output: {reason:#}");
            let name = name.clone();
            for opened in outlets[..idx].iter_mut().rev() {
                if let Err(err) = opened.outlet.close().await {
                    warn!(outlet = %opened.name, "failed to close output: {err:#}");
                }
            }
            return Err(PipelineError::OpenOutlet { name, reason });
        }
    }
    Ok(())
}

async fn close_outlets(outlets: &Mutex<Vec<NamedOutlet>>) -> Result<(), PipelineError> {
    let mut first_err = None;
    for NamedOutlet { name, outlet } in outlets.lock().await.iter_mut() {
        if let Err(reason) = outlet.close().await {
            error!(outlet = %name, "failed to close output: {reason:#}");
            first_err.get_or_insert(PipelineError::CloseOutlet {
                name: name.clone(),
                reason,
            });
        }
    }
    first_err.map_or(Ok(()), Err)
}

async fn fan_out(mut rx: mpsc::Receiver<Report>, outlets: Arc<Mutex<Vec<NamedOutlet>>>) {
    while let Some(report) = rx.recv().await {
        let mut outlets = outlets.lock().await;
        for NamedOutlet { name, outlet } in outlets.iter_mut() {
            if let Err(err) = outlet.write(&report).await {
                error!(outlet = %name, "failed to write output: {err:#}");
            }
        }
    }
    trace!("fan-out exited");
}
