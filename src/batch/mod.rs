/// Batch Reconciler
///
/// Finds local attachment links already sitting in notes, uploads each
/// referenced file once, and rewrites the links to point at the remote copy.
/// Runs are not transactional: a failed file never rolls back earlier ones.

pub mod report;

pub use report::{EntryOutcome, ReportEntry, UploadRunReport};

use crate::{
    blob_store::Vault,
    context::Session,
    document::{replace_links, InMemoryDocument},
    error::{UploadError, UploadResult},
    front_matter::{DocumentOverrides, UploadPolicy},
    hasher,
    links::{parse_links, MediaLink},
    markup,
    media::MediaType,
    naming::extension_of,
    notify::Notice,
    orchestrator::{AttachedFile, Orchestrator},
};
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Which notes a batch run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchScope {
    Vault,
    /// Every note under a vault-relative folder
    Folder(String),
    /// One vault-relative note
    Note(String),
}

/// One local link to reconcile
#[derive(Debug, Clone)]
pub struct BatchTask {
    /// Note containing the link
    pub note_path: String,
    pub link: MediaLink,
    /// Link text exactly as written in the note
    pub source_text: String,
    /// Vault-relative path of the referenced file
    pub file_path: String,
    pub media_type: MediaType,
}

impl BatchTask {
    pub fn file_name(&self) -> &str {
        self.file_path.rsplit('/').next().unwrap_or(&self.file_path)
    }
}

/// Lexically resolve `.` and `..`; `None` when the path climbs out of the vault
fn normalize(path: &Path) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn is_note(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

/// Vault files by bare file name, for links written without a folder
fn index_attachments(vault: &Vault) -> HashMap<String, String> {
    let mut index = HashMap::new();
    for entry in WalkDir::new(vault.root())
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let supported = extension_of(&name).is_some_and(|ext| MediaType::from_extension(&ext).is_some());
        if !supported {
            continue;
        }
        if let Some(rel) = vault.relative(entry.path()) {
            index.entry(name).or_insert(rel);
        }
    }
    index
}

/// Notes in `scope`, as vault-relative paths in a stable order
fn collect_notes(vault: &Vault, scope: &BatchScope) -> UploadResult<Vec<String>> {
    let start: PathBuf = match scope {
        BatchScope::Vault => vault.root().to_path_buf(),
        BatchScope::Folder(folder) => vault.resolve(folder)?,
        BatchScope::Note(note) => {
            let path = vault.resolve(note)?;
            if !path.is_file() {
                return Err(UploadError::NotFound(format!("Note not found: {}", note)));
            }
            return Ok(vec![note.trim_start_matches('/').to_string()]);
        }
    };

    if !start.is_dir() {
        return Err(UploadError::NotFound(format!("Folder not found: {}", start.display())));
    }

    let mut notes: Vec<String> = WalkDir::new(&start)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_note(e.path()))
        .filter_map(|e| vault.relative(e.path()))
        .collect();
    notes.sort();
    Ok(notes)
}

pub struct BatchReconciler {
    orchestrator: Arc<Orchestrator>,
}

impl BatchReconciler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    fn vault(&self) -> &Vault {
        &self.orchestrator.context().vault
    }

    /// Resolve a link target: note-relative, then vault-relative, then by file name
    async fn resolve_target(
        &self,
        note_path: &str,
        target: &str,
        index: &mut Option<HashMap<String, String>>,
    ) -> Option<String> {
        let note_dir = Path::new(note_path).parent().unwrap_or_else(|| Path::new(""));

        for candidate in [normalize(&note_dir.join(target)), normalize(Path::new(target))]
            .into_iter()
            .flatten()
        {
            if self.vault().exists(&candidate).await {
                return Some(candidate);
            }
        }

        if target.contains('/') {
            return None;
        }
        let index = index.get_or_insert_with(|| index_attachments(self.vault()));
        index.get(target).cloned()
    }

    async fn locate(
        &self,
        note_path: &str,
        text: &str,
        link: MediaLink,
        index: &mut Option<HashMap<String, String>>,
    ) -> UploadResult<BatchTask> {
        if !link.is_local() {
            return Err(UploadError::Validation(format!("Not a local link: {}", link.path)));
        }

        let target = link.decoded_path();
        let media_type = extension_of(&target)
            .and_then(|ext| MediaType::from_extension(&ext))
            .ok_or_else(|| UploadError::UnknownMediaType(target.clone()))?;
        let file_path = self
            .resolve_target(note_path, &target, index)
            .await
            .ok_or_else(|| UploadError::NotFound(format!("Link target does not exist: {}", target)))?;

        Ok(BatchTask {
            note_path: note_path.to_string(),
            source_text: link.source(text).to_string(),
            file_path,
            media_type,
            link,
        })
    }

    /// Task for a single local link in `note_path`
    pub async fn task_for_link(&self, note_path: &str, text: &str, link: MediaLink) -> UploadResult<BatchTask> {
        self.locate(note_path, text, link, &mut None).await
    }

    /// Local file a link points at, as a vault-relative path
    pub async fn link_target(&self, note_path: &str, link: &MediaLink) -> UploadResult<String> {
        let target = link.decoded_path();
        self.resolve_target(note_path, &target, &mut None)
            .await
            .ok_or_else(|| UploadError::NotFound(format!("Link target does not exist: {}", target)))
    }

    /// Find every embedded local attachment in scope, one task per link
    ///
    /// Plain `[[a.png]]` references are left alone; only `![[...]]` and `![..](..)` qualify.
    pub async fn scan(&self, scope: &BatchScope) -> UploadResult<Vec<BatchTask>> {
        let session = self.orchestrator.context().session();
        let notes = collect_notes(self.vault(), scope)?;
        let mut index = None;
        let mut tasks = Vec::new();

        for note_path in notes {
            if session.ignore.is_ignored(&note_path) {
                debug!("Skipping ignored note {}", note_path);
                continue;
            }

            let text = match InMemoryDocument::load(self.vault().root(), &note_path).await {
                Ok(doc) => doc.as_str().to_string(),
                Err(e) => {
                    warn!("Failed to read {}: {}", note_path, e);
                    continue;
                }
            };
            let policy = UploadPolicy::resolve(&session.config, &DocumentOverrides::read(&text));

            for link in parse_links(&text).into_iter().filter(|l| l.is_embed && l.is_local()) {
                match self.locate(&note_path, &text, link, &mut index).await {
                    Ok(task) if policy.is_enabled(task.media_type) => tasks.push(task),
                    Ok(task) => debug!("Skipping {} ({} uploads disabled)", task.file_path, task.media_type),
                    Err(e) => debug!("Skipping link in {}: {}", note_path, e),
                }
            }
        }

        info!("Batch scan found {} local link(s)", tasks.len());
        Ok(tasks)
    }

    /// Upload and rewrite every task in order
    ///
    /// `on_progress(current, total)` is called before each task. When `cancel`
    /// fires, remaining tasks are not started and the report is marked
    /// cancelled. Fails up front only when no remote store is configured.
    pub async fn execute<F>(
        &self,
        tasks: Vec<BatchTask>,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> UploadResult<UploadRunReport>
    where
        F: FnMut(usize, usize),
    {
        let session = self.orchestrator.context().session();
        session.remote_store()?;

        let total = tasks.len();
        let mut report = UploadRunReport::new(total);
        let mut run = RunState::default();

        for (i, task) in tasks.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Batch run cancelled after {} of {} task(s)", i, total);
                report.mark_cancelled();
                break;
            }
            on_progress(i + 1, total);

            let started = Instant::now();
            let mut entry = self.execute_one(&session, task, &mut run).await;
            entry.elapsed_ms = started.elapsed().as_millis() as u64;
            if entry.outcome == EntryOutcome::Failed {
                warn!(
                    "Batch upload of {} failed: {}",
                    task.file_path,
                    entry.error_detail.as_deref().unwrap_or("unknown error")
                );
            }
            report.push(entry);
        }

        if session.config.delete_local_after_upload {
            for path in &run.uploaded_paths {
                match self.vault().remove(path).await {
                    Ok(()) => info!("Deleted local file {}", path),
                    Err(e) => warn!("Failed to delete local file {}: {}", path, e),
                }
            }
        }

        Ok(report)
    }

    async fn execute_one(&self, session: &Session, task: &BatchTask, run: &mut RunState) -> ReportEntry {
        let mut entry = ReportEntry {
            file_name: task.file_name().to_string(),
            original_path: task.file_path.clone(),
            new_location: None,
            byte_size: 0,
            outcome: EntryOutcome::Failed,
            error_detail: None,
            elapsed_ms: 0,
        };

        match self.reconcile(session, task, run, &mut entry).await {
            Ok(outcome) => {
                entry.outcome = outcome;
                run.uploaded_paths.insert(task.file_path.clone());
            }
            Err(e) => entry.error_detail = Some(e.to_string()),
        }
        entry
    }

    async fn reconcile(
        &self,
        session: &Session,
        task: &BatchTask,
        run: &mut RunState,
        entry: &mut ReportEntry,
    ) -> UploadResult<EntryOutcome> {
        let data = self.vault().read(&task.file_path).await?;
        entry.byte_size = data.len();

        let digest = hasher::hash(&data);
        if let Some((location, markup)) = run.processed.get(digest.as_str()) {
            debug!("{} duplicates content already handled in this run", task.file_path);
            entry.new_location = Some(location.clone());
            let markup = markup.clone();
            self.rewrite(run, &task.note_path, &task.link, &markup).await?;
            return Ok(EntryOutcome::SkippedDuplicate);
        }

        let store = session.remote_store()?;
        let text = run.document(self.vault(), &task.note_path).await?.as_str().to_string();
        let overrides = DocumentOverrides::read(&text);
        let upload = self.orchestrator.make_task(
            session,
            &overrides,
            &task.note_path,
            AttachedFile::new(task.file_name(), "", data).with_source_path(&task.file_path),
            task.media_type,
            false,
        );

        let (location, outcome) = if store.exists(&upload.target_key).await? {
            info!("{} already present as {}", task.file_path, upload.target_key);
            (store.url_for(&upload.target_key), EntryOutcome::AlreadyPresent)
        } else {
            let persisted = self.orchestrator.dispatch(session, &upload).await?;
            (persisted.location, EntryOutcome::Success)
        };

        let markup = markup::synthesize(&location, task.media_type, false)?;
        self.rewrite(run, &task.note_path, &task.link, &markup).await?;

        entry.new_location = Some(location.clone());
        run.processed.insert(digest.to_string(), (location, markup));
        Ok(outcome)
    }

    async fn rewrite(&self, run: &mut RunState, note_path: &str, link: &MediaLink, markup: &str) -> UploadResult<()> {
        let root = self.vault().root().to_path_buf();
        let doc = run.document(self.vault(), note_path).await?;
        let replaced = replace_links(doc, link, markup)?;
        if replaced > 0 {
            doc.save(&root).await?;
            debug!("Rewrote {} link(s) in {}", replaced, note_path);
        }
        Ok(())
    }

    /// Scan, execute, announce the outcome, and write the log when enabled
    pub async fn run<F>(
        &self,
        scope: &BatchScope,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> UploadResult<UploadRunReport>
    where
        F: FnMut(usize, usize),
    {
        let notifier = Arc::clone(&self.orchestrator.context().notifier);
        let tasks = self.scan(scope).await?;
        if tasks.is_empty() {
            notifier.notify(Notice::NoLocalMedia);
            return Ok(UploadRunReport::new(0));
        }

        notifier.notify(Notice::BatchStarted { count: tasks.len() });
        let report = self.execute(tasks, on_progress, cancel).await?;
        notifier.notify(Notice::BatchComplete {
            success: report.succeeded(),
            failed: report.failed(),
            skipped: report.skipped(),
            cancelled: report.is_cancelled(),
        });

        let session = self.orchestrator.context().session();
        if session.config.enable_batch_log {
            match report.persist(self.vault(), &session.config.batch_log_folder).await {
                Ok(path) => notifier.notify(Notice::LogSaved { path }),
                Err(e) => warn!("Failed to write batch log: {}", e),
            }
        }

        Ok(report)
    }
}

/// Bookkeeping for one run
#[derive(Default)]
struct RunState {
    /// digest -> (location, markup)
    processed: HashMap<String, (String, String)>,
    documents: HashMap<String, InMemoryDocument>,
    uploaded_paths: HashSet<String>,
}

impl RunState {
    async fn document(&mut self, vault: &Vault, note_path: &str) -> UploadResult<&mut InMemoryDocument> {
        if !self.documents.contains_key(note_path) {
            let doc = InMemoryDocument::load(vault.root(), note_path).await?;
            self.documents.insert(note_path.to_string(), doc);
        }
        self.documents
            .get_mut(note_path)
            .ok_or_else(|| UploadError::NotFound(format!("Note not found: {}", note_path)))
    }
}
