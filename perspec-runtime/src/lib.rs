//! Tokio runtime ownership and shutdown coordination for the server binary.
//!
//! The binary builds one [`PerspecRuntime`], serves on it, and hands the
//! [`ShutdownHandle`] to anything that must stop when the process is asked to
//! exit (Ctrl-C or an explicit [`ShutdownHandle::trigger`]).
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct PerspecRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

/// Cloneable view of the runtime: spawn work, observe or trigger shutdown.
#[derive(Clone)]
pub struct ShutdownHandle {
    inner: tokio::runtime::Handle,
    cancel: CancellationToken,
}

impl PerspecRuntime {
    /// Build a multi-threaded runtime; `worker_threads = None` uses one per core.
    ///
    /// ```
    /// use perspec_runtime::PerspecRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = PerspecRuntime::build("doctest-runtime", Some(1)).expect("runtime builds");
    /// assert_eq!(runtime.block_on(async { 2 + 2 }), 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);
        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }
        let runtime = builder
            .build()
            .with_context(|| format!("failed to build tokio runtime `{thread_name}`"))?;
        Ok(Self {
            runtime,
            cancel: CancellationToken::new(),
        })
    }

    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel outstanding work and give tasks `graceful` to finish.
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl ShutdownHandle {
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    pub fn trigger(&self) {
        self.cancel.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel on Ctrl-C. Call once.
    pub fn cancel_on_ctrl_c(&self) {
        let cancel = self.cancel.clone();
        self.inner.spawn(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    match res {
                        Ok(()) => tracing::info!("runtime.ctrl_c"),
                        Err(e) => tracing::warn!(error = %e, "runtime.ctrl_c.listen_failed"),
                    }
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        });
    }

    /// Resolves once shutdown has been triggered.
    ///
    /// ```
    /// use perspec_runtime::PerspecRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = PerspecRuntime::build("signal-doctest", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// let waiter = handle.spawn(handle.clone().shutdown_signal());
    /// handle.trigger();
    /// runtime.block_on(async move { waiter.await.unwrap() });
    /// assert!(handle.is_triggered());
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn shutdown_signal(self) -> impl Future<Output = ()> + Send + 'static {
        let cancel = self.cancel;
        async move { cancel.cancelled().await }
    }
}
