use crate::{
    error::PipelineError,
    plugin::Inlet,
    report::Report,
};
use chrono::{
    DateTime,
    Utc,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{
        mpsc,
        Mutex,
    },
    task::JoinHandle,
    time::{
        interval_at,
        Instant,
        MissedTickBehavior,
    },
};
use tokio_util::sync::CancellationToken;

/// Drives one [`Inlet`] on a fixed interval and pushes its reports onto the pipeline channel.
pub struct InputHandler {
    name: String,
    inlet: Arc<Mutex<Box<dyn Inlet>>>,
    task: Option<(CancellationToken, JoinHandle<()>)>,
}

impl InputHandler {
    pub fn new(name: impl Into<String>, inlet: Box<dyn Inlet>) -> Self {
        Self {
            name: name.into(),
            inlet: Arc::new(Mutex::new(inlet)),
            task: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.task.is_some()
    }

    /// Opens the inlet, samples it once right away and then once per `interval` until [`stop`].
    ///
    /// [`stop`]: InputHandler::stop
    pub async fn start(
        &mut self,
        tx: mpsc::Sender<Report>,
        interval: Duration,
        tag_prefix: Arc<str>,
    ) -> Result<(), PipelineError> {
        if self.task.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }
        let first_tick = Instant::now()
            .checked_add(interval)
            .ok_or_else(|| PipelineError::InvalidInterval(humantime::format_duration(interval).to_string()))?;

        {
            let mut inlet = self.inlet.lock().await;
            if let Err(reason) = inlet.open().await {
                error!(inlet = %self.name, "failed to open input: {reason:#}");
                return Err(PipelineError::OpenInlet {
                    name: self.name.clone(),
                    reason,
                });
            }
            collect(&self.name, inlet.as_mut(), Utc::now(), &tag_prefix, &tx).await;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let token = token.clone();
            let inlet = self.inlet.clone();
            let name = self.name.clone();
            async move {
                let mut ticker = interval_at(first_tick, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            let mut inlet = inlet.lock().await;
                            collect(&name, inlet.as_mut(), Utc::now(), &tag_prefix, &tx).await;
                        }
                    }
                }
                trace!(inlet = %name, "input loop exited");
            }
        });

        debug!(inlet = %self.name, ?interval, "input started");
        self.task = Some((token, handle));
        Ok(())
    }

    /// Stops the loop, waits for a sample in flight to finish and closes the inlet.
    ///
    /// Stopping a handler that is not started is a no-op.
    pub async fn stop(&mut self) -> Result<(), PipelineError> {
        let Some((token, handle)) = self.task.take() else {
            return Ok(());
        };
        token.cancel();
        if let Err(err) = handle.await {
            error!(inlet = %self.name, "input task failed: {err}");
        }

        let result = self.inlet.lock().await.close().await;
        debug!(inlet = %self.name, "input stopped");
        result.map_err(|reason| {
            error!(inlet = %self.name, "failed to close input: {reason:#}");
            PipelineError::CloseInlet {
                name: self.name.clone(),
                reason,
            }
        })
    }
}

impl Drop for InputHandler {
    fn drop(&mut self) {
        // A handler dropped without `stop` must not leave its loop running.
        if let Some((token, _)) = &self.task {
            token.cancel();
        }
    }
}

async fn collect(
    name: &str,
    inlet: &mut dyn Inlet,
    ts: DateTime<Utc>,
    tag_prefix: &str,
    tx: &mpsc::Sender<Report>,
) {
    let mut records = match inlet.sample().await {
        Ok(records) => records,
        Err(err) => {
            error!(inlet = %name, "failed to get input: {err:#}");
            return;
        }
    };
    let sampled = records.len();
    records.retain(|record| !record.name.is_empty());
    if records.len() < sampled {
        warn!(inlet = %name, dropped = sampled - records.len(), "dropping records without a name");
    }
    if records.is_empty() {
        return;
    }
    if !tag_prefix.is_empty() {
        for record in &mut records {
            record.name.insert_str(0, tag_prefix);
        }
    }
    if tx.send(Report::new(ts, records)).await.is_err() {
        warn!(inlet = %name, "report channel closed, dropping sample");
    }
}
