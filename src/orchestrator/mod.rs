/// Upload Orchestrator
///
/// Owns the placeholder lifecycle for paste, drop and file-created events:
/// admit files, insert one placeholder per task, upload concurrently, then
/// swap each placeholder for its final markup (or a fallback link, or an
/// inline error). The document is re-searched before every mutation.

pub mod event;
pub mod task;

pub use event::{AttachedFile, EventKind, UploadEvent};
pub use task::{placeholder_token, TaskSpec, TaskStatus, UploadTask};

use crate::{
    context::{Session, UploaderContext},
    document::{insert_at_cursor, replace_placeholder, Document, SharedDocument},
    error::{UploadError, UploadResult},
    front_matter::{DocumentOverrides, UploadPolicy},
    hasher,
    markup,
    media::{self, MediaType},
    naming::{self, extension_of},
    notify::Notice,
};
use chrono::Local;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What happened to an event
#[derive(Debug)]
pub enum EventDisposition {
    /// Not ours; the host should handle the event normally
    PassThrough,
    /// Intercepted; all tasks reached a terminal state
    Intercepted(EventReport),
}

/// Terminal tasks of one event
#[derive(Debug, Default)]
pub struct EventReport {
    pub tasks: Vec<UploadTask>,
}

impl EventReport {
    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status() == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(TaskStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(TaskStatus::FailedFallback) + self.count(TaskStatus::FailedTerminal)
    }
}

/// Result of persisting one payload
#[derive(Debug, Clone)]
pub struct Persisted {
    /// URL (remote) or embed location (local)
    pub location: String,
    pub is_local: bool,
}

pub struct Orchestrator {
    context: Arc<UploaderContext>,
    next_id: AtomicU64,
}

fn note_basename(note_path: &str) -> String {
    Path::new(note_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl Orchestrator {
    pub fn new(context: Arc<UploaderContext>) -> Self {
        Self {
            context,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn context(&self) -> &Arc<UploaderContext> {
        &self.context
    }

    /// Build a task for a payload destined for `note_path`
    ///
    /// Both the remote and the local key are resolved so a failed remote
    /// upload can fall back without recomputing anything.
    pub fn make_task(
        &self,
        session: &Session,
        overrides: &DocumentOverrides,
        note_path: &str,
        file: AttachedFile,
        media_type: MediaType,
        is_local: bool,
    ) -> UploadTask {
        let date = Local::now().date_naive();
        let digest = hasher::hash(&file.data);
        let extension = extension_of(&file.name);
        let basename = note_basename(note_path);

        let remote = naming::resolve(
            &digest,
            extension.as_deref(),
            &session.config.folder,
            overrides,
            date,
            &basename,
        );
        let local = naming::resolve(
            &digest,
            extension.as_deref(),
            &session.config.local_upload_folder,
            overrides,
            date,
            &basename,
        );

        UploadTask::new(TaskSpec {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            payload: Arc::new(file.data),
            original_name: file.name,
            declared_media_type: file.mime_type,
            media_type,
            extension,
            digest,
            target_key: if is_local { local.key.clone() } else { remote.key },
            local_key: local.key,
            display_name: local.display_name,
            is_local,
            source_path: file.source_path,
        })
    }

    /// Decide which files of an event this plugin takes over
    ///
    /// Returns no tasks when the event should be left to the host. Fails with
    /// `ConfigurationMissing` before anything is written when remote mode is
    /// needed but no store is configured.
    pub fn admit(
        &self,
        session: &Session,
        doc: &dyn Document,
        event: UploadEvent,
    ) -> UploadResult<Vec<UploadTask>> {
        if event.default_prevented {
            debug!("Event already handled elsewhere, skipping");
            return Ok(Vec::new());
        }

        let note_path = doc.path().to_string();
        if session.ignore.is_ignored(&note_path) {
            debug!("Note {} matches ignore pattern, skipping", note_path);
            return Ok(Vec::new());
        }

        let overrides = DocumentOverrides::read(&doc.text());
        let policy = UploadPolicy::resolve(&session.config, &overrides);

        if event.kind == EventKind::Drop && !policy.upload_on_drag {
            debug!("Drag-and-drop upload disabled for {}", note_path);
            return Ok(Vec::new());
        }

        let admitted: Vec<(AttachedFile, MediaType)> = event
            .files
            .into_iter()
            .filter_map(|file| {
                let media_type = MediaType::from_mime(&file.mime_type).or_else(|| {
                    extension_of(&file.name).and_then(|ext| MediaType::from_extension(&ext))
                })?;
                if policy.is_enabled(media_type) {
                    Some((file, media_type))
                } else {
                    debug!("Skipping {} ({} uploads disabled)", file.name, media_type);
                    None
                }
            })
            .collect();

        if admitted.is_empty() {
            return Ok(Vec::new());
        }

        if !policy.local_upload {
            session.remote_store()?;
        }

        let tasks: Vec<UploadTask> = admitted
            .into_iter()
            .map(|(file, media_type)| {
                self.make_task(session, &overrides, &note_path, file, media_type, policy.local_upload)
            })
            .collect();

        info!("Admitted {} file(s) for {}", tasks.len(), note_path);
        Ok(tasks)
    }

    /// Insert every task's placeholder at the cursor, in order, before any upload starts
    pub fn begin(&self, doc: &mut dyn Document, tasks: &[UploadTask]) -> UploadResult<()> {
        for task in tasks {
            insert_at_cursor(doc, &format!("{}\n", task.placeholder_token))?;
        }
        Ok(())
    }

    /// Persist one payload (compressing images first when enabled)
    pub async fn dispatch(&self, session: &Session, task: &UploadTask) -> UploadResult<Persisted> {
        markup::check_combination(task.media_type, task.is_local)?;

        let content_type = media::content_type_for(task.extension.as_deref(), &task.declared_media_type);
        let data = self.compress(session, task, &content_type);

        if task.is_local {
            self.context.vault.write(&task.target_key, &data).await?;
            info!("Stored {} locally at {}", task.original_name, task.target_key);
            return Ok(Persisted {
                location: self.context.vault.media_location(&task.target_key, task.media_type),
                is_local: true,
            });
        }

        let store = session.remote_store()?;
        let url = store.put(&task.target_key, data, &content_type).await?;
        info!("Uploaded {} to {}", task.original_name, url);
        Ok(Persisted {
            location: url,
            is_local: false,
        })
    }

    fn compress(&self, session: &Session, task: &UploadTask, content_type: &str) -> Vec<u8> {
        let original = task.payload.as_slice();
        let Some(filter) = session.compressor() else {
            return original.to_vec();
        };
        if task.media_type != MediaType::Image {
            return original.to_vec();
        }

        match filter.apply(original, content_type) {
            Ok(Some(compressed)) => {
                self.context.notifier.notify(Notice::Compressed {
                    original_size: original.len(),
                    new_size: compressed.len(),
                });
                compressed
            }
            Ok(None) => original.to_vec(),
            Err(e) => {
                warn!("Compression failed for {}, using original: {}", task.original_name, e);
                original.to_vec()
            }
        }
    }

    /// Swap the task's placeholder for `markup`
    ///
    /// Returns false when the placeholder is gone (deleted by the user, or
    /// already resolved); that is not an error.
    pub async fn resolve_placeholder(&self, doc: &SharedDocument, task: &UploadTask, markup: &str) -> UploadResult<bool> {
        let mut guard = doc.lock().await;
        match replace_placeholder(&mut *guard, &task.placeholder_token, markup) {
            Ok(()) => Ok(true),
            Err(UploadError::PlaceholderNotFound(_)) => {
                debug!("Placeholder for task {} no longer present", task.id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Terminal markup and status for a failed dispatch
    ///
    /// Remote transport failures get one local write when fallback is enabled;
    /// everything else becomes an inline error marker.
    pub async fn on_failure(&self, session: &Session, task: &UploadTask, err: &UploadError) -> (TaskStatus, String, Notice) {
        if err.is_transport() && !task.is_local && session.config.fallback_to_local {
            warn!("Remote upload of {} failed, falling back to local: {}", task.original_name, err);

            let fallback = match markup::check_combination(task.media_type, true) {
                Ok(()) => self.context.vault.write(&task.local_key, &task.payload).await,
                Err(e) => Err(e),
            };

            return match fallback {
                Ok(()) => {
                    let location = self.context.vault.media_location(&task.local_key, task.media_type);
                    match markup::synthesize(&location, task.media_type, true) {
                        Ok(markup) => (
                            TaskStatus::FailedFallback,
                            markup,
                            Notice::SavedLocallyAfterFailure {
                                file_name: task.local_key.clone(),
                            },
                        ),
                        Err(e) => Self::terminal(&e),
                    }
                }
                Err(local_err) => {
                    error!("Local fallback for {} failed: {}", task.original_name, local_err);
                    Self::terminal(&UploadError::LocalWrite(format!("{}; {}", err, local_err)))
                }
            };
        }

        error!("Upload of {} failed: {}", task.original_name, err);
        Self::terminal(err)
    }

    fn terminal(err: &UploadError) -> (TaskStatus, String, Notice) {
        let message = match err {
            UploadError::UploadTransport(detail) => detail.clone(),
            other => other.to_string(),
        };
        (
            TaskStatus::FailedTerminal,
            markup::error_marker(&message),
            Notice::UploadFailed { message },
        )
    }

    /// Success notice for a persisted payload
    fn success_notice(task: &UploadTask, persisted: &Persisted) -> Notice {
        if persisted.is_local {
            Notice::StoredLocally {
                file_name: task.target_key.clone(),
            }
        } else {
            Notice::Uploaded {
                file_name: task.display_name.clone(),
            }
        }
    }

    /// Finish every task in `group` with the outcome of one shared dispatch
    async fn run_group(&self, session: &Session, doc: &SharedDocument, mut group: Vec<UploadTask>) -> Vec<UploadTask> {
        for task in group.iter_mut() {
            if let Err(e) = task.start() {
                error!("{}", e);
            }
        }

        let Some(leader) = group.first() else {
            return group;
        };
        if group.len() > 1 {
            debug!(
                "Deduplicated {} identical payloads under {}",
                group.len(),
                leader.target_key
            );
        }

        let outcome = match self.dispatch(session, leader).await {
            Ok(persisted) => {
                match markup::synthesize(&persisted.location, leader.media_type, persisted.is_local) {
                    Ok(markup) => (TaskStatus::Succeeded, markup, Self::success_notice(leader, &persisted)),
                    Err(e) => Self::terminal(&e),
                }
            }
            Err(e) => self.on_failure(session, leader, &e).await,
        };

        let (status, markup, notice) = outcome;
        for task in group.iter_mut() {
            if let Err(e) = self.resolve_placeholder(doc, task, &markup).await {
                error!("Failed to resolve placeholder for task {}: {}", task.id, e);
            }
            if let Err(e) = task.finish(status, markup.clone()) {
                error!("{}", e);
            }
            self.context.notifier.notify(notice.clone());
        }

        if status == TaskStatus::Succeeded && !leader_is_local(&group) && session.config.delete_local_after_upload {
            for task in &group {
                if let Some(source) = &task.source_path {
                    match self.context.vault.remove(source).await {
                        Ok(()) => info!("Deleted local source {}", source),
                        Err(e) => warn!("Failed to delete local source {}: {}", source, e),
                    }
                }
            }
        }

        group
    }

    /// Upload all tasks concurrently; each resolves its own placeholder as soon as it finishes
    pub async fn run(&self, session: &Session, doc: &SharedDocument, tasks: Vec<UploadTask>) -> EventReport {
        let total = tasks.len();

        // Identical payloads share one key; only the first of each group uploads
        let mut groups: BTreeMap<String, Vec<UploadTask>> = BTreeMap::new();
        let mut order: Vec<u64> = Vec::with_capacity(total);
        for task in tasks {
            order.push(task.id);
            groups.entry(task.target_key.clone()).or_default().push(task);
        }

        let finished = join_all(
            groups
                .into_values()
                .map(|group| self.run_group(session, doc, group)),
        )
        .await;

        let mut tasks: Vec<UploadTask> = finished.into_iter().flatten().collect();
        tasks.sort_by_key(|t| order.iter().position(|id| *id == t.id));

        EventReport { tasks }
    }

    /// Full event pipeline: admit, insert placeholders, upload, summarize
    pub async fn handle_event(&self, doc: SharedDocument, event: UploadEvent) -> UploadResult<EventDisposition> {
        let session = self.context.session();

        let tasks = {
            let mut guard = doc.lock().await;
            let tasks = self.admit(&session, &*guard, event)?;
            if tasks.is_empty() {
                return Ok(EventDisposition::PassThrough);
            }
            self.begin(&mut *guard, &tasks)?;
            tasks
        };

        let report = self.run(&session, &doc, tasks).await;
        self.context.notifier.notify(Notice::EventSummary {
            succeeded: report.succeeded(),
            failed: report.failed(),
        });

        Ok(EventDisposition::Intercepted(report))
    }
}

fn leader_is_local(group: &[UploadTask]) -> bool {
    group.first().map(|t| t.is_local).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        blob_store::{BlobStore, MemoryBlobStore, Vault},
        config::UploaderConfig,
        document::{shared, InMemoryDocument},
        notify::RecordingNotifier,
    };
    use tempfile::tempdir;

    struct Fixture {
        orchestrator: Orchestrator,
        store: Arc<MemoryBlobStore>,
        notifier: Arc<RecordingNotifier>,
        _dir: tempfile::TempDir,
    }

    fn fixture(config: UploaderConfig) -> Fixture {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryBlobStore::new("https://cdn.test/"));
        let notifier = Arc::new(RecordingNotifier::default());
        let context = UploaderContext::with_store(
            config,
            Some(store.clone() as Arc<dyn BlobStore>),
            Vault::new(dir.path().to_path_buf()),
            notifier.clone(),
        );
        Fixture {
            orchestrator: Orchestrator::new(Arc::new(context)),
            store,
            notifier,
            _dir: dir,
        }
    }

    #[test]
    fn test_admit_filters_disabled_types() {
        let fx = fixture(UploaderConfig::default());
        let doc = InMemoryDocument::new("n.md", "");
        let event = UploadEvent::paste(vec![
            AttachedFile::new("a.png", "image/png", b"png".to_vec()),
            AttachedFile::new("b.mp4", "video/mp4", b"mp4".to_vec()),
            AttachedFile::new("c.txt", "text/plain", b"txt".to_vec()),
        ]);
        let tasks = fx.orchestrator.admit(&fx.orchestrator.context().session(), &doc, event).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].media_type, MediaType::Image);
    }

    #[test]
    fn test_admit_respects_prevented_and_ignore() {
        let fx = fixture(UploaderConfig {
            ignore_pattern: "private/*".to_string(),
            ..Default::default()
        });
        let session = fx.orchestrator.context().session();
        let file = || vec![AttachedFile::new("a.png", "image/png", b"png".to_vec())];

        let doc = InMemoryDocument::new("notes/n.md", "");
        let prevented = UploadEvent::paste(file()).prevented();
        assert!(fx.orchestrator.admit(&session, &doc, prevented).unwrap().is_empty());

        let ignored = InMemoryDocument::new("private/n.md", "");
        assert!(fx.orchestrator.admit(&session, &ignored, UploadEvent::paste(file())).unwrap().is_empty());
    }

    #[test]
    fn test_drop_gated_by_front_matter() {
        let fx = fixture(UploaderConfig {
            drag_and_drop: false,
            ..Default::default()
        });
        let session = fx.orchestrator.context().session();
        let file = || vec![AttachedFile::new("a.png", "image/png", b"png".to_vec())];

        let plain = InMemoryDocument::new("n.md", "body");
        assert!(fx.orchestrator.admit(&session, &plain, UploadEvent::drop(file())).unwrap().is_empty());

        let opted_in = InMemoryDocument::new("n.md", "---\nuploadOnDrag: true\n---\nbody");
        assert_eq!(fx.orchestrator.admit(&session, &opted_in, UploadEvent::drop(file())).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_store_fails_before_mutation() {
        let dir = tempdir().unwrap();
        let context = UploaderContext::with_store(
            UploaderConfig::default(),
            None,
            Vault::new(dir.path().to_path_buf()),
            Arc::new(RecordingNotifier::default()),
        );
        let orchestrator = Orchestrator::new(Arc::new(context));
        let doc = shared(InMemoryDocument::new("n.md", "before"));

        let result = orchestrator
            .handle_event(
                doc.clone(),
                UploadEvent::paste(vec![AttachedFile::new("a.png", "image/png", b"png".to_vec())]),
            )
            .await;

        assert!(matches!(result, Err(UploadError::ConfigurationMissing(_))));
        assert_eq!(doc.lock().await.as_str(), "before");
    }

    #[tokio::test]
    async fn test_placeholders_inserted_in_order() {
        let fx = fixture(UploaderConfig::default());
        let session = fx.orchestrator.context().session();
        let mut doc = InMemoryDocument::new("n.md", "");
        let event = UploadEvent::paste(vec![
            AttachedFile::new("a.png", "image/png", b"one".to_vec()),
            AttachedFile::new("b.png", "image/png", b"two".to_vec()),
        ]);
        let tasks = fx.orchestrator.admit(&session, &doc, event).unwrap();
        fx.orchestrator.begin(&mut doc, &tasks).unwrap();

        let first = doc.as_str().find(&tasks[0].placeholder_token).unwrap();
        let second = doc.as_str().find(&tasks[1].placeholder_token).unwrap();
        assert!(first < second);
        assert!(fx.store.puts().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_twice_is_noop() {
        let fx = fixture(UploaderConfig::default());
        let session = fx.orchestrator.context().session();
        let concrete = shared(InMemoryDocument::new("n.md", ""));
        let doc: SharedDocument = concrete.clone();

        let tasks = {
            let mut guard = concrete.lock().await;
            let tasks = fx
                .orchestrator
                .admit(&session, &*guard, UploadEvent::paste(vec![AttachedFile::new("a.png", "image/png", b"x".to_vec())]))
                .unwrap();
            fx.orchestrator.begin(&mut *guard, &tasks).unwrap();
            tasks
        };

        assert!(fx.orchestrator.resolve_placeholder(&doc, &tasks[0], "![image](u)").await.unwrap());
        assert!(!fx.orchestrator.resolve_placeholder(&doc, &tasks[0], "![image](v)").await.unwrap());
        assert_eq!(concrete.lock().await.as_str(), "![image](u)\n");
    }

    #[tokio::test]
    async fn test_local_pdf_is_terminal_error() {
        let fx = fixture(UploaderConfig {
            local_upload: true,
            upload_pdf: true,
            ..Default::default()
        });
        let concrete = shared(InMemoryDocument::new("n.md", ""));

        let disposition = fx
            .orchestrator
            .handle_event(
                concrete.clone(),
                UploadEvent::paste(vec![AttachedFile::new("doc.pdf", "application/pdf", b"%PDF".to_vec())]),
            )
            .await
            .unwrap();

        let EventDisposition::Intercepted(report) = disposition else {
            panic!("expected interception");
        };
        assert_eq!(report.tasks[0].status(), TaskStatus::FailedTerminal);
        assert!(concrete.lock().await.as_str().starts_with("[Upload failed: Unsupported combination"));
        assert!(fx
            .notifier
            .notices()
            .iter()
            .any(|n| matches!(n, Notice::UploadFailed { .. })));
    }
}
