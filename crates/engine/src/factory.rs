//! Adapter factories
//!
//! An [`AdapterFactory`] turns a namespace and its [`NamespaceConfig`] into a
//! ready adapter. There is one factory per backend kind, and
//! [`ConfiguredFactory`] dispatches on [`NamespaceConfig::backend`].
//!
//! | Backend | Factory | Adapter |
//! |---------|---------|---------|
//! | ordered | [`OrderedFactory`] | [`OrderedStore`] |
//! | transactional | [`TransactionalFactory`] | [`TableStore`] |
//! | document cluster | [`DocumentClusterFactory`] | [`DocumentClusterStore`] |
//! | noop | [`NoopFactory`] | [`NoopStore`] |

use gridstore_cluster::{ClusterTiming, DocumentClusterStore, HttpTransport, Transport};
use gridstore_core::{
    BackendKind, Clock, HostContext, MapStore, NamespaceConfig, Result, StoreKey, StoreValue,
    SystemClock,
};
use gridstore_storage::{NoopStore, OrderedStore, TableStore, TransactionalEnvironment};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds the adapter for one namespace.
pub trait AdapterFactory<K: StoreKey, V: StoreValue>: Send + Sync {
    /// Construct the adapter. Called at most once per namespace by the registry.
    fn create(&self, namespace: &str, config: &NamespaceConfig) -> Result<Arc<dyn MapStore<K, V>>>;
}

/// Factory for [`OrderedStore`]s under one data root.
#[derive(Debug, Clone)]
pub struct OrderedFactory {
    root: PathBuf,
}

impl OrderedFactory {
    /// Keyspaces are created under `root/ordered`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl<K: StoreKey, V: StoreValue> AdapterFactory<K, V> for OrderedFactory {
    fn create(&self, namespace: &str, config: &NamespaceConfig) -> Result<Arc<dyn MapStore<K, V>>> {
        Ok(Arc::new(OrderedStore::<K, V>::open(
            &self.root,
            namespace,
            config.clone(),
        )?))
    }
}

/// Factory for [`TableStore`]s sharing one environment.
#[derive(Debug, Clone)]
pub struct TransactionalFactory {
    env: Arc<TransactionalEnvironment>,
}

impl TransactionalFactory {
    /// Tables live in the environment under `root/environment`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_environment(Arc::new(TransactionalEnvironment::new(root)))
    }

    /// Share an existing environment.
    pub fn with_environment(env: Arc<TransactionalEnvironment>) -> Self {
        Self { env }
    }

    /// The shared environment
    pub fn environment(&self) -> &Arc<TransactionalEnvironment> {
        &self.env
    }
}

impl<K: StoreKey, V: StoreValue> AdapterFactory<K, V> for TransactionalFactory {
    fn create(&self, namespace: &str, config: &NamespaceConfig) -> Result<Arc<dyn MapStore<K, V>>> {
        Ok(Arc::new(TableStore::<K, V>::open(
            Arc::clone(&self.env),
            namespace,
            config.clone(),
        )?))
    }
}

/// Factory for [`DocumentClusterStore`]s.
///
/// Without an explicit transport each namespace gets its own
/// [`HttpTransport`] built from its configured timeouts.
#[derive(Clone)]
pub struct DocumentClusterFactory {
    transport: Option<Arc<dyn Transport>>,
    host: Arc<dyn HostContext>,
    clock: Arc<dyn Clock>,
    timing: ClusterTiming,
}

impl DocumentClusterFactory {
    /// Factory reporting membership through `host`.
    pub fn new(host: Arc<dyn HostContext>) -> Self {
        Self {
            transport: None,
            host,
            clock: Arc::new(SystemClock),
            timing: ClusterTiming::default(),
        }
    }

    /// Use `transport` for every namespace.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use `clock` for creation times and expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override refresh and retry timing.
    #[must_use]
    pub fn with_timing(mut self, timing: ClusterTiming) -> Self {
        self.timing = timing;
        self
    }

    fn transport_for(&self, config: &NamespaceConfig) -> Arc<dyn Transport> {
        match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(HttpTransport::new(
                config.connect_timeout(),
                config.read_timeout(),
            )),
        }
    }
}

impl<K: StoreKey, V: StoreValue> AdapterFactory<K, V> for DocumentClusterFactory {
    fn create(&self, namespace: &str, config: &NamespaceConfig) -> Result<Arc<dyn MapStore<K, V>>> {
        Ok(Arc::new(DocumentClusterStore::<K, V>::open_with_timing(
            namespace,
            config.clone(),
            self.transport_for(config),
            Arc::clone(&self.host),
            Arc::clone(&self.clock),
            self.timing.clone(),
        )?))
    }
}

impl std::fmt::Debug for DocumentClusterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentClusterFactory")
            .field("shared_transport", &self.transport.is_some())
            .field("members", &self.host.member_count())
            .field("timing", &self.timing)
            .finish()
    }
}

/// Factory for [`NoopStore`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFactory;

impl<K: StoreKey, V: StoreValue> AdapterFactory<K, V> for NoopFactory {
    fn create(&self, namespace: &str, _config: &NamespaceConfig) -> Result<Arc<dyn MapStore<K, V>>> {
        Ok(Arc::new(NoopStore::<K, V>::new(namespace)))
    }
}

/// Dispatches to the factory of each namespace's configured backend.
#[derive(Debug, Clone)]
pub struct ConfiguredFactory {
    ordered: OrderedFactory,
    transactional: TransactionalFactory,
    cluster: DocumentClusterFactory,
}

impl ConfiguredFactory {
    /// Embedded stores under `data_dir`; cluster stores over HTTP.
    pub fn new(data_dir: impl AsRef<Path>, host: Arc<dyn HostContext>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            ordered: OrderedFactory::new(data_dir),
            transactional: TransactionalFactory::new(data_dir),
            cluster: DocumentClusterFactory::new(host),
        }
    }

    /// Replace the cluster factory.
    #[must_use]
    pub fn with_cluster(mut self, cluster: DocumentClusterFactory) -> Self {
        self.cluster = cluster;
        self
    }

    /// Share an existing transactional environment.
    #[must_use]
    pub fn with_environment(mut self, env: Arc<TransactionalEnvironment>) -> Self {
        self.transactional = TransactionalFactory::with_environment(env);
        self
    }
}

impl<K: StoreKey, V: StoreValue> AdapterFactory<K, V> for ConfiguredFactory {
    fn create(&self, namespace: &str, config: &NamespaceConfig) -> Result<Arc<dyn MapStore<K, V>>> {
        match config.backend {
            BackendKind::Ordered => self.ordered.create(namespace, config),
            BackendKind::Transactional => self.transactional.create(namespace, config),
            BackendKind::DocumentCluster => self.cluster.create(namespace, config),
            BackendKind::Noop => NoopFactory.create(namespace, config),
        }
    }
}
