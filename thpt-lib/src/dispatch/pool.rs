use std::{num::NonZeroUsize, sync::Arc};

use rama::{Service, error::BoxError, rt::Executor, telemetry::tracing};
use tokio::{
    sync::{Mutex, mpsc},
    time,
};

use super::{
    COMPLETION_BUFFER, Completion, Dispatcher, MessageFactory, PhaseWindow, deliver,
    pacer::ConstantPacer,
};
use crate::signal::ControlMessage;

type SharedTargets = Arc<Mutex<mpsc::Receiver<ControlMessage>>>;

/// Fixed size worker pool drawing targets from one shared [`ConstantPacer`].
///
/// A message (and thus its sequence id) is only created once a worker
/// slot is free, so ids stay gapless even when the pool saturates.
pub struct WorkerPool<T> {
    exec: Executor,
    transport: Arc<T>,
    factory: Arc<MessageFactory>,
    workers: NonZeroUsize,
}

impl<T> std::fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("factory", &self.factory)
            .field("workers", &self.workers)
            .finish()
    }
}

impl<T> WorkerPool<T> {
    pub fn new(
        exec: Executor,
        transport: Arc<T>,
        factory: Arc<MessageFactory>,
        workers: NonZeroUsize,
    ) -> Self {
        Self {
            exec,
            transport,
            factory,
            workers,
        }
    }
}

impl<T> Dispatcher for WorkerPool<T>
where
    T: Service<ControlMessage, Output = (), Error = BoxError>,
{
    fn start_phase(&self, window: PhaseWindow) -> mpsc::Receiver<Completion> {
        let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_BUFFER);
        let (target_tx, target_rx) = mpsc::channel(self.workers.get());
        let targets: SharedTargets = Arc::new(Mutex::new(target_rx));

        for worker in 0..self.workers.get() {
            self.exec.spawn_task(worker_loop(
                worker,
                window.index,
                self.transport.clone(),
                targets.clone(),
                completion_tx.clone(),
            ));
        }

        let factory = self.factory.clone();
        self.exec.spawn_task(async move {
            let mut pacer = ConstantPacer::new(window.spec.rate(), window.started);
            let deadline = time::sleep_until(window.deadline);
            let mut deadline = std::pin::pin!(deadline);

            loop {
                tokio::select! {
                    biased;

                    _ = deadline.as_mut() => break,
                    _ = pacer.wait_one() => (),
                }

                let permit = tokio::select! {
                    biased;

                    _ = deadline.as_mut() => break,
                    result = target_tx.reserve() => match result {
                        Ok(permit) => permit,
                        Err(_) => {
                            tracing::debug!(phase = window.index, "worker pool: all workers gone");
                            break;
                        }
                    },
                };
                permit.send(factory.next_workload());
            }

            tracing::debug!(
                phase = window.index,
                hits = pacer.hits(),
                "worker pool: phase deadline reached",
            );
            // dropping the target sender stops the workers once drained
        });

        completion_rx
    }
}

async fn worker_loop<T>(
    worker: usize,
    phase: usize,
    transport: Arc<T>,
    targets: SharedTargets,
    completion_tx: mpsc::Sender<Completion>,
) where
    T: Service<ControlMessage, Output = (), Error = BoxError>,
{
    loop {
        let maybe_msg = targets.lock().await.recv().await;
        let Some(msg) = maybe_msg else {
            tracing::trace!(%worker, %phase, "exit worker: targets closed");
            return;
        };

        let completion = deliver(&*transport, phase, msg).await;
        if completion_tx.send(completion).await.is_err() {
            tracing::trace!(%worker, %phase, "exit worker: phase stream closed");
            return;
        }
    }
}
