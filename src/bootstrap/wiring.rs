//! # Dependency Injection / 依赖注入模块
//!
//! ## Responsibilities / 职责
//!
//! - Create the block stores and the fetch service / 创建块存储和获取服务
//! - Inject them into the transfer manager / 注入传输管理器
//!
//! No decisions are made here: whatever the config names gets built.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use ax_app::{SourceFactory, TransferDeps, TransferEvent, TransferManager};
use ax_core::ports::{BlobStorePort, TransferRegistryPort};
use ax_core::transfer::TransferSource;
use ax_core::{TransferConfig, TransferId};
use ax_infra::{CachingFetchService, FileTransferSource, FsBlockStore};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

/// Everything a command needs once the graph is assembled.
pub struct Wired {
    pub store: Arc<dyn BlobStorePort>,
    pub manager: Arc<TransferManager>,
    pub events: UnboundedReceiver<TransferEvent>,
}

pub fn local_store(config: &TransferConfig) -> Arc<dyn BlobStorePort> {
    Arc::new(FsBlockStore::new(config.store_root.clone()))
}

/// Assemble stores, fetch service and manager. Fetch resolution runs on
/// `runtime`.
pub fn wire(config: &TransferConfig, runtime: Handle) -> Wired {
    let store = local_store(config);
    let upstream = config
        .upstream_root
        .clone()
        .map(|root| Arc::new(FsBlockStore::new(root)) as Arc<dyn BlobStorePort>);
    info!(
        store = %config.store_root.display(),
        upstream = ?config.upstream_root,
        "wiring transfer engine"
    );

    let fetch = CachingFetchService::new(Arc::clone(&store), upstream, runtime);
    let deps = TransferDeps {
        store: Arc::clone(&store),
        fetch: Arc::new(fetch),
        file_sources: config.file_root.clone().map(file_source_factory),
    };
    let (manager, events) = TransferManager::new(deps, config);

    Wired {
        store,
        manager,
        events,
    }
}

fn file_source_factory(root: PathBuf) -> SourceFactory {
    Arc::new(
        move |id: TransferId,
              priority: f32,
              registry: Weak<dyn TransferRegistryPort>|
              -> Box<dyn TransferSource> {
            Box::new(FileTransferSource::new(id, priority, root.clone(), registry))
        },
    )
}
