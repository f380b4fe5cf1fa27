/// Link lifecycle actions
///
/// Per-link operations on notes in the vault: upload a local attachment,
/// delete it locally or remotely, pull a remote one down into the vault, or
/// change a link's description. Each action reloads the note and searches for
/// the link again before touching it.
use crate::{
    batch::{BatchReconciler, BatchScope, EntryOutcome, UploadRunReport},
    document::{replace_links, Document, InMemoryDocument},
    error::{UploadError, UploadResult},
    front_matter::DocumentOverrides,
    hasher,
    links::{parse_links, MediaLink},
    markup,
    media::MediaType,
    naming::{self, extension_of},
    notify::Notice,
    orchestrator::Orchestrator,
};
use chrono::Local;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct LinkActions {
    orchestrator: Arc<Orchestrator>,
    reconciler: BatchReconciler,
    http: reqwest::Client,
}

/// Current version of `link` in `doc`, matched by syntax, target and description
///
/// Prefers the occurrence at the old position when the note holds several.
pub fn locate(doc: &dyn Document, link: &MediaLink) -> UploadResult<MediaLink> {
    let same = |l: &MediaLink| {
        l.kind == link.kind && l.is_embed == link.is_embed && l.path == link.path && l.alt_text == link.alt_text
    };

    let candidates: Vec<MediaLink> = parse_links(&doc.text()).into_iter().filter(same).collect();
    candidates
        .iter()
        .find(|l| l.span == link.span)
        .or_else(|| candidates.first())
        .cloned()
        .ok_or_else(|| UploadError::NotFound(format!("Link no longer present: {}", link.path)))
}

impl LinkActions {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            reconciler: BatchReconciler::new(Arc::clone(&orchestrator)),
            orchestrator,
            http: reqwest::Client::new(),
        }
    }

    fn root(&self) -> &Path {
        self.orchestrator.context().vault.root()
    }

    fn notify(&self, notice: Notice) {
        self.orchestrator.context().notifier.notify(notice);
    }

    /// Upload the file behind one local link and rewrite every occurrence of it
    pub async fn upload_link(&self, note_path: &str, link: &MediaLink) -> UploadResult<UploadRunReport> {
        let doc = InMemoryDocument::load(self.root(), note_path).await?;
        let current = locate(&doc, link)?;
        let task = self
            .reconciler
            .task_for_link(note_path, doc.as_str(), current)
            .await?;

        let report = self
            .reconciler
            .execute(vec![task], |_, _| {}, &CancellationToken::new())
            .await?;

        match report.entries().first() {
            Some(entry) if entry.outcome != EntryOutcome::Failed => {
                self.notify(Notice::Uploaded {
                    file_name: entry.file_name.clone(),
                });
            }
            Some(entry) => self.notify(Notice::UploadFailed {
                message: entry.error_detail.clone().unwrap_or_default(),
            }),
            None => {}
        }
        Ok(report)
    }

    /// Upload every local link in one note
    pub async fn upload_note(&self, note_path: &str) -> UploadResult<UploadRunReport> {
        self.reconciler
            .run(&BatchScope::Note(note_path.to_string()), |_, _| {}, &CancellationToken::new())
            .await
    }

    /// Delete the vault file a local link points at; the link itself stays
    pub async fn delete_local(&self, note_path: &str, link: &MediaLink) -> UploadResult<String> {
        if !link.is_local() {
            return Err(UploadError::Validation(format!("Not a local link: {}", link.path)));
        }

        let result = async {
            let path = self.reconciler.link_target(note_path, link).await?;
            self.orchestrator.context().vault.remove(&path).await?;
            Ok::<_, UploadError>(path)
        }
        .await;

        match &result {
            Ok(path) => {
                info!("Deleted local file {}", path);
                self.notify(Notice::DeletedLocal { path: path.clone() });
            }
            Err(e) => self.notify(Notice::DeleteFailed { message: e.to_string() }),
        }
        result
    }

    /// Delete the object behind a remote link and remove the link from the note
    pub async fn delete_remote(&self, note_path: &str, link: &MediaLink) -> UploadResult<()> {
        let session = self.orchestrator.context().session();
        let key = session.config.key_from_url(&link.path).ok_or_else(|| {
            UploadError::Validation(format!(
                "{} is not under {}",
                link.path,
                session.config.image_url_path()
            ))
        })?;

        let result = async {
            let store = session.remote_store()?;
            let mut doc = InMemoryDocument::load(self.root(), note_path).await?;
            let current = locate(&doc, link)?;

            store.delete(&key).await?;
            doc.replace_range(current.span, "")?;
            doc.save(self.root()).await
        }
        .await;

        match &result {
            Ok(()) => {
                info!("Deleted remote object {}", key);
                self.notify(Notice::DeletedRemote);
            }
            Err(e) => self.notify(Notice::DeleteFailed { message: e.to_string() }),
        }
        result
    }

    /// Fetch a remote attachment into the local upload folder and point the link at it
    pub async fn download_to_local(&self, note_path: &str, link: &MediaLink) -> UploadResult<String> {
        let result = self.download(note_path, link).await;
        match &result {
            Ok(path) => self.notify(Notice::Downloaded { path: path.clone() }),
            Err(e) => self.notify(Notice::DownloadFailed { message: e.to_string() }),
        }
        result
    }

    async fn download(&self, note_path: &str, link: &MediaLink) -> UploadResult<String> {
        if link.is_local() {
            return Err(UploadError::Validation(format!("Not a remote link: {}", link.path)));
        }

        let response = self
            .http
            .get(&link.path)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| UploadError::Download(e.to_string()))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let data = response
            .bytes()
            .await
            .map_err(|e| UploadError::Download(e.to_string()))?;

        let url_path = link.path.split(['?', '#']).next().unwrap_or(&link.path);
        let extension = extension_of(url_path).or_else(|| {
            content_type
                .as_deref()
                .and_then(mime_guess::get_mime_extensions_str)
                .and_then(|exts| exts.first())
                .map(|ext| ext.to_string())
        });
        let media_type = content_type
            .as_deref()
            .and_then(MediaType::from_mime)
            .or_else(|| extension.as_deref().and_then(MediaType::from_extension))
            .ok_or_else(|| UploadError::UnknownMediaType(link.path.clone()))?;

        let session = self.orchestrator.context().session();
        let vault = &self.orchestrator.context().vault;
        let mut doc = InMemoryDocument::load(self.root(), note_path).await?;
        let overrides = DocumentOverrides::read(doc.as_str());
        let basename = Path::new(note_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let name = naming::resolve(
            &hasher::hash(&data),
            extension.as_deref(),
            &session.config.local_upload_folder,
            &overrides,
            Local::now().date_naive(),
            &basename,
        );
        let markup = markup::synthesize(&vault.media_location(&name.key, media_type), media_type, true)?;

        vault.write(&name.key, &data).await?;
        let current = locate(&doc, link)?;
        let replaced = replace_links(&mut doc, &current, &markup)?;
        doc.save(self.root()).await?;

        info!("Downloaded {} to {} ({} link(s) rewritten)", link.path, name.key, replaced);
        Ok(name.key)
    }

    /// Replace a link's description (wikilink alias or inline alt text), keeping its syntax
    pub async fn rename_description(&self, note_path: &str, link: &MediaLink, description: &str) -> UploadResult<MediaLink> {
        let description = description.trim();
        if description.contains(['\n', ']', '|']) {
            return Err(UploadError::Validation(format!(
                "Description cannot contain line breaks, ']' or '|': {}",
                description
            )));
        }

        let mut doc = InMemoryDocument::load(self.root(), note_path).await?;
        let current = locate(&doc, link)?;
        let rendered = current.render_with_alt(description);
        doc.replace_range(current.span.clone(), &rendered)?;
        doc.save(self.root()).await?;

        match parse_links(doc.as_str())
            .into_iter()
            .find(|l| l.span.start == current.span.start)
        {
            Some(renamed) => Ok(renamed),
            None => {
                warn!("Renamed link in {} could not be parsed back", note_path);
                Err(UploadError::NotFound(rendered))
            }
        }
    }
}
