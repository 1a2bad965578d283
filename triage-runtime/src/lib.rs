use anyhow::Result;
use std::sync::{Arc, Mutex};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type ActiveSlot = Arc<Mutex<Option<CancellationToken>>>;

#[derive(Clone)]
pub struct TriageHandle {
    inner: Handle,
    cancel: Arc<CancellationToken>,
    active: ActiveSlot,
}

pub struct TriageRuntime {
    runtime: Runtime,
    cancel: Arc<CancellationToken>,
    active: ActiveSlot,
}

impl TriageRuntime {
    /// Build a Tokio runtime for the triage binary.
    ///
    /// ```
    /// use triage_runtime::TriageRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = TriageRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.block_on(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build()?;
        Ok(Self {
            runtime,
            cancel: Arc::new(CancellationToken::new()),
            active: Arc::new(Mutex::new(None)),
        })
    }

    /// Obtain a cloned handle for spawning tasks and sharing cancellation.
    ///
    /// ```
    /// use triage_runtime::TriageRuntime;
    ///
    /// let runtime = TriageRuntime::build("handle-example", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// assert_eq!(handle.cancellation().is_cancelled(), false);
    /// ```
    pub fn handle(&self) -> TriageHandle {
        TriageHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
            active: self.active.clone(),
        }
    }

    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel outstanding work and shut the runtime down.
    ///
    /// A pending stdin read is left to the timeout rather than awaited.
    pub fn shutdown(self, graceful: std::time::Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl TriageHandle {
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    /// Process-wide token; cancelled when the user interrupts outside a
    /// consultation or the runtime shuts down.
    pub fn cancellation(&self) -> Arc<CancellationToken> {
        self.cancel.clone()
    }

    /// Open an interrupt scope for one consultation.
    ///
    /// While the scope is alive an interrupt cancels only its token. The
    /// scope closes on drop.
    ///
    /// ```
    /// use triage_runtime::TriageRuntime;
    ///
    /// let runtime = TriageRuntime::build("scope-example", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// let scope = handle.scope();
    /// assert!(handle.interrupt());
    /// assert!(scope.token().is_cancelled());
    /// assert!(!handle.cancellation().is_cancelled());
    /// ```
    pub fn scope(&self) -> InterruptScope {
        let token = self.cancel.child_token();
        if let Ok(mut slot) = self.active.lock() {
            *slot = Some(token.clone());
        }
        InterruptScope {
            token,
            active: self.active.clone(),
        }
    }

    /// Deliver one interrupt: cancel the open scope if there is one,
    /// otherwise the process-wide token. Returns whether a scope took it.
    pub fn interrupt(&self) -> bool {
        let scoped = self.active.lock().ok().and_then(|mut slot| slot.take());
        match scoped {
            Some(token) => {
                tracing::info!("interrupt.consultation");
                token.cancel();
                true
            }
            None => {
                tracing::info!("interrupt.shutdown");
                self.cancel.cancel();
                false
            }
        }
    }

    /// Route Ctrl-C to [`TriageHandle::interrupt`] until the process-wide
    /// token is cancelled.
    pub fn listen_for_interrupts(&self) -> JoinHandle<()> {
        let handle = self.clone();
        self.spawn(async move {
            loop {
                tokio::select! {
                    _ = handle.cancel.cancelled() => break,
                    signal = tokio::signal::ctrl_c() => {
                        if let Err(err) = signal {
                            tracing::warn!(error = %err, "interrupt.listener_failed");
                            break;
                        }
                        if !handle.interrupt() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

pub struct InterruptScope {
    token: CancellationToken,
    active: ActiveSlot,
}

impl InterruptScope {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for InterruptScope {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.active.lock() {
            *slot = None;
        }
    }
}
