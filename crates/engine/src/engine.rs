//! [`Engine`] and [`engine_start`]: the facade's top-level entry points,
//! spec.md §7's `engine_start(config) -> Engine` and
//! `Engine::create_operation(...) -> Operation`.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use control::{CancelToken, ControlConnection};
use dashmap::DashMap;
use diskpool::DiskPool;
use logging::{LogUidAllocator, PrintSink};
use queue::{ItemKind, Queue};
use reactor::Reactor;
use scheduler::mask::MaskSet;
use scheduler::worker::OperationKind;
use wire::path::cut_last;
use wire::Command;

use crate::config::{EngineConfig, OperationRequest};
use crate::operation::{Operation, OperationBlueprint};
use crate::EngineError;

/// Identifies one [`Operation`] created by an [`Engine`], stable for the
/// operation's lifetime.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct OperationId(u64);

/// The engine facade: one shared [`Reactor`] and [`DiskPool`], and a
/// registry of the operations created against it, per spec.md §7's
/// "`engine_start` returns a handle new operations are created from".
pub struct Engine {
    config: EngineConfig,
    reactor: Arc<Reactor>,
    disk: Arc<DiskPool>,
    log_sink: Arc<dyn logging::LogSink>,
    log_uids: LogUidAllocator,
    operations: DashMap<OperationId, Arc<Operation>>,
    next_operation_id: AtomicU64,
}

/// Starts an engine: builds the shared [`Reactor`] and [`DiskPool`] every
/// operation this engine creates will share, per spec.md §7.
///
/// # Errors
///
/// This step cannot currently fail (reactor/disk-pool construction is
/// infallible); it returns `Result` so a future validation step (e.g.
/// rejecting an internally inconsistent [`EngineConfig`]) does not need a
/// signature change.
pub fn engine_start(config: EngineConfig) -> Result<Engine, EngineError> {
    let log_sink: Arc<dyn logging::LogSink> = Arc::new(PrintSink::new(config.verbosity));
    Ok(Engine {
        config,
        reactor: Arc::new(Reactor::new()),
        disk: Arc::new(DiskPool::new(diskpool::default_worker_count())),
        log_sink,
        log_uids: LogUidAllocator::default(),
        operations: DashMap::new(),
        next_operation_id: AtomicU64::new(0),
    })
}

/// What the root-item probe determined about an `OperationRequest`'s
/// `remote_root`.
enum RemoteRootShape {
    File,
    Directory,
}

impl Engine {
    /// The configuration this engine was started with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates a new operation: seeds its queue's root item and starts its
    /// initial worker pool, per spec.md §7's `create_operation`.
    ///
    /// For a remote-rooted operation (`Delete`, `CopyDownload`,
    /// `MoveDownload`, `ChAttr`) this dials a short-lived probe connection
    /// to learn the server's path syntax and whether `remote_root` names a
    /// file or a directory (via a `SIZE` probe, the same technique
    /// [`scheduler::worker::Worker`]'s link-resolution path uses: a
    /// successful reply means a file, a permanent failure means a
    /// directory — a root that happens to be a symlink is treated as a
    /// plain file rather than triggering link-resolution at the root).
    /// For an upload-rooted operation (`CopyUpload`, `MoveUpload`) the
    /// root is split with [`Path::parent`]/[`Path::file_name`] instead,
    /// with no server round-trip needed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Connect`] if the probe connection fails,
    /// [`EngineError::LocalRoot`] if an upload root is not accessible,
    /// [`EngineError::InvalidMask`] if `masks`/`ascii_mask` do not
    /// compile, or [`EngineError::Queue`] if seeding the root item fails.
    pub fn create_operation(&self, request: OperationRequest) -> Result<Arc<Operation>, EngineError> {
        let endpoint = request.endpoint.to_control_endpoint(&self.config);
        let queue = Arc::new(Queue::new());
        let include_mask = MaskSet::compile(&request.masks)?;
        let ascii_mask = MaskSet::compile(&request.ascii_mask)?;

        let remote_root = if request.kind.is_upload_rooted() {
            self.seed_upload_root(&queue, &request)?;
            request.remote_root.clone()
        } else {
            self.seed_remote_root(&queue, &request, &endpoint)?
        };

        let blueprint = OperationBlueprint {
            endpoint,
            kind: request.kind,
            local_root: request.local_root,
            remote_root,
            policies: request.policies,
            attrs: request.unix_mode.map(|unix_mode| diskpool::FileAttrs { unix_mode: Some(unix_mode), modified: None }),
            include_mask,
            ascii_mask,
            transfer_mode_default: request.transfer_mode_default,
        };

        let operation = Arc::new(Operation::new(Arc::clone(&self.reactor), Arc::clone(&self.disk), queue, blueprint, Arc::clone(&self.log_sink)));
        let initial_workers = request.initial_workers.unwrap_or(self.config.max_concurrent_connections_per_operation);
        operation.start(initial_workers);

        let id = OperationId(self.next_operation_id.fetch_add(1, Ordering::Relaxed));
        self.operations.insert(id, Arc::clone(&operation));
        Ok(operation)
    }

    /// Returns the operation created with `id`, if it is still registered.
    #[must_use]
    pub fn operation(&self, id: OperationId) -> Option<Arc<Operation>> {
        self.operations.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    fn seed_upload_root(&self, queue: &Queue, request: &OperationRequest) -> Result<(), EngineError> {
        let local_root = Path::new(&request.local_root);
        let metadata = std::fs::metadata(local_root).map_err(|error| EngineError::LocalRoot(local_root.to_path_buf(), error))?;
        let parent = local_root.parent().unwrap_or(local_root).to_string_lossy().into_owned();
        let name = local_root.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        let is_move = request.kind == OperationKind::MoveUpload;

        let kind = if metadata.is_dir() {
            if is_move {
                ItemKind::UploadMoveExploreDir
            } else {
                ItemKind::UploadCopyExploreDir
            }
        } else if is_move {
            ItemKind::UploadMoveFile
        } else {
            ItemKind::UploadCopyFile
        };
        queue.add_item(None, kind, parent, name)?;
        Ok(())
    }

    /// Seeds the root item for a remote-rooted operation and returns the
    /// remote path every other item this operation ever sees is mirrored
    /// relative to.
    ///
    /// For a directory root this is `request.remote_root` unchanged: the
    /// root item's own exploration reports its children with that exact
    /// path as their `source_path`. For a file root, `request.remote_root`
    /// names the file itself rather than a directory any item lives
    /// under, so the mirroring root one level up — the file's parent,
    /// which is also the lone root item's own `source_path` — is returned
    /// instead, or `scheduler`'s path mirroring would treat the file's full
    /// path as not prefixing its own parent and mirror nothing.
    fn seed_remote_root(&self, queue: &Queue, request: &OperationRequest, endpoint: &control::Endpoint) -> Result<String, EngineError> {
        let cancel = CancelToken::new();
        let mut probe = ControlConnection::new(Arc::clone(&self.reactor), endpoint.clone(), self.log_uids.next(), Arc::clone(&self.log_sink));
        probe.ensure_connected(&cancel).map_err(|error| EngineError::Connect(endpoint.addr, error))?;

        let path_type = probe.path_type();
        let shape = match probe.send_command(&Command::Size(request.remote_root.clone()), &cancel) {
            Ok(_reply) => RemoteRootShape::File,
            Err(control::ControlError::Permanent { .. }) => RemoteRootShape::Directory,
            Err(error) => return Err(EngineError::Connect(endpoint.addr, error)),
        };
        probe.quit(&cancel);

        let (parent, name) = cut_last(path_type, &request.remote_root);
        let kind = self.root_kind_for(request.kind, shape);
        queue.add_item(None, kind, parent.clone(), name)?;

        Ok(match shape {
            RemoteRootShape::File => parent,
            RemoteRootShape::Directory => request.remote_root.clone(),
        })
    }

    const fn root_kind_for(&self, operation_kind: OperationKind, shape: RemoteRootShape) -> ItemKind {
        match (operation_kind, shape) {
            (OperationKind::Delete, RemoteRootShape::File) => ItemKind::DeleteFile,
            (OperationKind::Delete, RemoteRootShape::Directory) => ItemKind::DeleteExploreDir,
            (OperationKind::CopyDownload, RemoteRootShape::File) => ItemKind::CopyFileOrLink,
            (OperationKind::CopyDownload, RemoteRootShape::Directory) => ItemKind::CopyExploreDir,
            (OperationKind::MoveDownload, RemoteRootShape::File) => ItemKind::MoveFileOrLink,
            (OperationKind::MoveDownload, RemoteRootShape::Directory) => ItemKind::MoveExploreDir,
            (OperationKind::ChAttr, RemoteRootShape::File) => ItemKind::ChAttrFile,
            (OperationKind::ChAttr, RemoteRootShape::Directory) => ItemKind::ChAttrExploreDir,
            (OperationKind::CopyUpload | OperationKind::MoveUpload, _) => {
                unreachable!("upload-rooted kinds are seeded by seed_upload_root")
            }
        }
    }
}

trait OperationKindExt {
    fn is_upload_rooted(self) -> bool;
}

impl OperationKindExt for OperationKind {
    fn is_upload_rooted(self) -> bool {
        matches!(self, Self::CopyUpload | Self::MoveUpload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_start_builds_an_idle_engine_with_no_operations() {
        let engine = engine_start(EngineConfig::default()).unwrap();
        assert_eq!(engine.operations.len(), 0);
    }

    #[test]
    fn seed_upload_root_splits_a_local_directory_into_parent_and_name() {
        let workspace = test_support::TempWorkspace::new();
        workspace.make_dir("payload");
        let engine = engine_start(EngineConfig::default()).unwrap();
        let queue = Queue::new();
        let request = OperationRequest {
            kind: OperationKind::CopyUpload,
            endpoint: crate::config::EndpointConfig {
                addr: "127.0.0.1:21".parse().unwrap(),
                user: "anonymous".into(),
                password: "guest".into(),
                encrypt_control: None,
            },
            local_root: workspace.root().join("payload"),
            remote_root: "/incoming".into(),
            policies: scheduler::policy::ConflictPolicies::default(),
            unix_mode: None,
            masks: Vec::new(),
            ascii_mask: Vec::new(),
            transfer_mode_default: scheduler::mask::TransferModeDefault::default(),
            initial_workers: Some(0),
        };
        engine.seed_upload_root(&queue, &request).unwrap();
        let items = queue.snapshot_all();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, ItemKind::UploadCopyExploreDir);
        assert_eq!(items[0].source_name, "payload");
    }

    #[test]
    fn seed_upload_root_rejects_a_missing_local_path() {
        let engine = engine_start(EngineConfig::default()).unwrap();
        let queue = Queue::new();
        let request = OperationRequest {
            kind: OperationKind::CopyUpload,
            endpoint: crate::config::EndpointConfig {
                addr: "127.0.0.1:21".parse().unwrap(),
                user: "anonymous".into(),
                password: "guest".into(),
                encrypt_control: None,
            },
            local_root: std::path::PathBuf::from("/does/not/exist/at/all"),
            remote_root: "/incoming".into(),
            policies: scheduler::policy::ConflictPolicies::default(),
            unix_mode: None,
            masks: Vec::new(),
            ascii_mask: Vec::new(),
            transfer_mode_default: scheduler::mask::TransferModeDefault::default(),
            initial_workers: Some(0),
        };
        let error = engine.seed_upload_root(&queue, &request).unwrap_err();
        assert!(matches!(error, EngineError::LocalRoot(_, _)));
    }

    #[test]
    fn root_kind_for_maps_every_remote_rooted_kind() {
        let engine = engine_start(EngineConfig::default()).unwrap();
        assert_eq!(engine.root_kind_for(OperationKind::Delete, RemoteRootShape::File), ItemKind::DeleteFile);
        assert_eq!(engine.root_kind_for(OperationKind::Delete, RemoteRootShape::Directory), ItemKind::DeleteExploreDir);
        assert_eq!(engine.root_kind_for(OperationKind::CopyDownload, RemoteRootShape::Directory), ItemKind::CopyExploreDir);
        assert_eq!(engine.root_kind_for(OperationKind::MoveDownload, RemoteRootShape::File), ItemKind::MoveFileOrLink);
        assert_eq!(engine.root_kind_for(OperationKind::ChAttr, RemoteRootShape::Directory), ItemKind::ChAttrExploreDir);
    }
}
