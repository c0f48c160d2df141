//! # Resolver Pool
//!
//! Fixed set of workers that turn play requests into local media files.
//!
//! Requests go into one shared FIFO queue; each worker takes one request,
//! runs the fetch backend to completion and only then takes the next one.
//! Slow downloads therefore serialize inside a worker but run in parallel
//! across workers.
//!
//! Every request produces exactly one [`ResolvedItem`]. Failures (backend
//! errors, timeouts, disallowed sources, even a panicking backend) become an
//! item without media instead of disappearing.

use async_trait::async_trait;
use futures::FutureExt;
use std::{
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use thiserror::Error;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    audio::queue::{MediaHandle, ResolvedItem},
    jukebox::TenantId,
};

/// A caller-supplied reference (free text or URL) for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRequest {
    pub tenant: TenantId,
    pub query: String,
}

/// Successful output of a fetch backend.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub title: String,
    pub media: MediaHandle,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no se encontró nada para '{0}'")]
    Unresolvable(String),

    #[error("fuente no permitida: {0}")]
    Disallowed(String),

    #[error("tiempo de espera agotado tras {0:?}")]
    Timeout(Duration),

    #[error("falló el proceso externo: {0}")]
    Process(String),

    #[error("error de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("error HTTP: {0}")]
    Http(#[from] reqwest::Error),
}

/// Media fetch backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<FetchedMedia, FetchError>;

    /// Called once a resolved file is no longer referenced by any queue.
    fn discard(&self, _media: &MediaHandle) {}
}

type Deliver = Box<dyn FnOnce(ResolvedItem) + Send>;

/// Delivers a failure if dropped before a result was handed over, so a
/// request can never vanish silently.
struct Delivery {
    query: String,
    deliver: Option<Deliver>,
}

impl Delivery {
    fn send(mut self, item: ResolvedItem) {
        if let Some(deliver) = self.deliver.take() {
            deliver(item);
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if let Some(deliver) = self.deliver.take() {
            deliver(ResolvedItem::failed(format!(
                "{}: la resolución fue interrumpida",
                self.query
            )));
        }
    }
}

struct Job {
    request: PlayRequest,
    delivery: Delivery,
}

/// Future returned by [`ResolverPool::submit`].
pub struct PendingResolution {
    query: String,
    rx: oneshot::Receiver<ResolvedItem>,
}

impl Future for PendingResolution {
    type Output = ResolvedItem;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let query = self.query.clone();
        Pin::new(&mut self.rx).poll(cx).map(|result| {
            result.unwrap_or_else(|_| {
                ResolvedItem::failed(format!("{}: el resolvedor se detuvo", query))
            })
        })
    }
}

pub struct ResolverPool {
    jobs: flume::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    fetcher: Arc<dyn Fetcher>,
}

impl ResolverPool {
    /// Starts `workers` workers (at least one) on the current runtime.
    pub fn new(workers: usize, fetcher: Arc<dyn Fetcher>, timeout: Duration) -> Self {
        let workers = workers.max(1);
        let (jobs, queue) = flume::unbounded::<Job>();

        let handles = (0..workers)
            .map(|id| tokio::spawn(worker_loop(id, queue.clone(), fetcher.clone(), timeout)))
            .collect();

        info!("🧵 Pool de resolución iniciado con {} workers", workers);
        Self {
            jobs,
            workers: handles,
            fetcher,
        }
    }

    #[allow(dead_code)]
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Requests waiting for a free worker.
    pub fn backlog(&self) -> usize {
        self.jobs.len()
    }

    /// Queues `request`; `deliver` is called exactly once with its result,
    /// from a worker task.
    pub fn submit_with(
        &self,
        request: PlayRequest,
        deliver: impl FnOnce(ResolvedItem) + Send + 'static,
    ) {
        let job = Job {
            delivery: Delivery {
                query: request.query.clone(),
                deliver: Some(Box::new(deliver)),
            },
            request,
        };

        if let Err(flume::SendError(job)) = self.jobs.send(job) {
            warn!("Pool de resolución cerrado, descartando '{}'", job.request.query);
            job.delivery.send(ResolvedItem::failed(format!(
                "{}: el resolvedor se detuvo",
                job.request.query
            )));
        }
    }

    #[allow(dead_code)]
    pub fn submit(&self, request: PlayRequest) -> PendingResolution {
        let (tx, rx) = oneshot::channel();
        let query = request.query.clone();
        self.submit_with(request, move |item| {
            let _ = tx.send(item);
        });
        PendingResolution { query, rx }
    }

    /// Hands a file that left its queue back to the backend that produced it.
    pub fn discard(&self, media: &MediaHandle) {
        self.fetcher.discard(media);
    }

    /// Closes the queue and waits for the workers to drain it.
    pub async fn shutdown(self) {
        drop(self.jobs);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("Worker de resolución terminó con error: {:?}", e);
            }
        }
        info!("🧵 Pool de resolución detenido");
    }
}

async fn worker_loop(
    id: usize,
    queue: flume::Receiver<Job>,
    fetcher: Arc<dyn Fetcher>,
    timeout: Duration,
) {
    debug!("Worker {} listo", id);

    while let Ok(Job { request, delivery }) = queue.recv_async().await {
        debug!(
            "Worker {} resolviendo '{}' para tenant {}",
            id, request.query, request.tenant
        );

        let outcome = AssertUnwindSafe(resolve_one(fetcher.as_ref(), &request.query, timeout))
            .catch_unwind()
            .await;

        match outcome {
            Ok(item) => delivery.send(item),
            Err(_) => {
                error!("💥 El backend entró en pánico resolviendo '{}'", request.query);
                delivery.send(ResolvedItem::failed(format!(
                    "{}: error interno del resolvedor",
                    request.query
                )));
            }
        }
    }

    debug!("Worker {} terminado", id);
}

/// Runs one fetch, turning every kind of failure into an item without media.
pub async fn resolve_one(fetcher: &dyn Fetcher, query: &str, timeout: Duration) -> ResolvedItem {
    let result = match tokio::time::timeout(timeout, fetcher.resolve(query)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    };

    match result {
        Ok(fetched) => {
            info!("✅ Resuelto: {}", fetched.title);
            ResolvedItem::playable(fetched.title, fetched.media)
        }
        Err(e) => {
            warn!("❌ No se pudo resolver '{}': {}", query, e);
            ResolvedItem::failed(format!("{}: {}", query, e))
        }
    }
}
