use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::database::RecordRepository;
use crate::error::Result;
use crate::scan::fs_watch::{TenantWatcher, WatcherOptions};
use crate::scan::reconcile::{ReconcileReport, reconcile_tenant};
use crate::types::TenantConfig;

/// Owns the lifecycle of every tenant watcher in the process.
///
/// Startup is reconcile-everything-then-watch: each tenant is reconciled in
/// turn, all OS watchers are attached (any failure aborts startup), and only
/// then is one task spawned per tenant. A single cancellation token reaches
/// every watcher; [`Supervisor::run`] returns once all of them have exited.
pub struct Supervisor {
    store: Arc<dyn RecordRepository>,
    tenants: Vec<TenantConfig>,
    options: WatcherOptions,
    shutdown_token: CancellationToken,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tenants: Vec<&str> =
            self.tenants.iter().map(|t| t.name.as_str()).collect();
        f.debug_struct("Supervisor")
            .field("tenants", &tenants)
            .field("options", &self.options)
            .field("shutdown_cancelled", &self.shutdown_token.is_cancelled())
            .finish()
    }
}

impl Supervisor {
    pub fn new(
        store: Arc<dyn RecordRepository>,
        tenants: Vec<TenantConfig>,
        options: WatcherOptions,
    ) -> Self {
        Self {
            store,
            tenants,
            options,
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn tenants(&self) -> &[TenantConfig] {
        &self.tenants
    }

    /// Handle that stops every watcher when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn shutdown(&self) {
        info!("initiating graceful shutdown of tenant watchers");
        self.shutdown_token.cancel();
    }

    /// Reconcile every tenant sequentially.
    pub async fn reconcile_all(&self) -> Vec<(String, ReconcileReport)> {
        let mut reports = Vec::with_capacity(self.tenants.len());
        for tenant in &self.tenants {
            let report = reconcile_tenant(self.store.as_ref(), tenant).await;
            reports.push((tenant.name.clone(), report));
        }
        reports
    }

    /// Attach an OS watcher for every tenant. All-or-nothing: the first
    /// failure is returned and already-attached watchers are dropped.
    pub fn start_watchers(&self) -> Result<Vec<TenantWatcher>> {
        self.tenants
            .iter()
            .map(|tenant| {
                TenantWatcher::start(
                    tenant.clone(),
                    Arc::clone(&self.store),
                    &self.options,
                )
            })
            .collect()
    }

    /// Reconcile, start watching, and block until every watcher has stopped.
    pub async fn run(&self) -> Result<()> {
        self.reconcile_all().await;
        let watchers = self.start_watchers()?;

        let handles: Vec<(String, JoinHandle<()>)> = watchers
            .into_iter()
            .map(|watcher| {
                let name = watcher.tenant().name.clone();
                let token = self.shutdown_token.clone();
                (name, tokio::spawn(watcher.run(token)))
            })
            .collect();
        info!(tenants = handles.len(), "filewatcher started and running");

        for (tenant, handle) in handles {
            if let Err(err) = handle.await {
                warn!(tenant = %tenant, error = %err, "watcher task failed");
            }
        }

        info!("all tenant watchers stopped");
        Ok(())
    }
}

/// Resolve on SIGINT or (on unix) SIGTERM.
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Cancel `token` when the process receives an interrupt or termination
/// request.
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_shutdown_signal() => {
                info!("graceful shutdown signal received");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}
