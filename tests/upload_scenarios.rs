/// Paste/drop upload scenarios
///
/// End-to-end runs of the orchestrator against an in-memory store, an
/// in-memory document and a temporary vault.
mod common;

use common::{remote_config, Harness, URL_PREFIX};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use std::io::Cursor;
use vault_uploader::{
    document::{shared, Document, InMemoryDocument, SharedDocument},
    hasher::hash,
    notify::Notice,
    orchestrator::{AttachedFile, EventDisposition, TaskStatus, UploadEvent},
    UploaderConfig,
};

fn png(bytes: &[u8]) -> AttachedFile {
    AttachedFile::new("pasted.png", "image/png", bytes.to_vec())
}

fn intercepted(disposition: EventDisposition) -> vault_uploader::orchestrator::EventReport {
    match disposition {
        EventDisposition::Intercepted(report) => report,
        EventDisposition::PassThrough => panic!("event was not intercepted"),
    }
}

#[tokio::test]
async fn test_single_image_paste() {
    let h = Harness::new(remote_config());
    let doc = shared(InMemoryDocument::new("note.md", ""));
    let bytes = b"0123456789";

    let report = intercepted(
        h.orchestrator
            .handle_event(doc.clone(), UploadEvent::paste(vec![png(bytes)]))
            .await
            .unwrap(),
    );

    let key = format!("{}.png", hash(bytes));
    let puts = h.store.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].key, key);
    assert_eq!(puts[0].content_type, "image/png");

    assert_eq!(report.tasks.len(), 1);
    assert_eq!(report.tasks[0].status(), TaskStatus::Succeeded);
    assert_eq!(doc.lock().await.as_str(), format!("![image]({}{})\n", URL_PREFIX, key));
    assert!(h.notifier.notices().contains(&Notice::EventSummary { succeeded: 1, failed: 0 }));
}

#[tokio::test]
async fn test_identical_files_share_one_upload() {
    let h = Harness::new(remote_config());
    let doc = shared(InMemoryDocument::new("note.md", "intro\n"));

    let report = intercepted(
        h.orchestrator
            .handle_event(doc.clone(), UploadEvent::drop(vec![png(b"same"), png(b"same")]))
            .await
            .unwrap(),
    );

    assert_eq!(h.store.puts().len(), 1);
    assert_eq!(report.succeeded(), 2);

    let expected = format!("![image]({}{}.png)", URL_PREFIX, hash(b"same"));
    let text = doc.lock().await.as_str().to_string();
    assert_eq!(text, format!("intro\n{}\n{}\n", expected, expected));
    assert!(!text.contains("uploading..."));
}

#[tokio::test]
async fn test_rejected_put_falls_back_to_local() {
    let h = Harness::new(UploaderConfig {
        fallback_to_local: true,
        local_upload_folder: "attachments".to_string(),
        ..remote_config()
    });
    h.store.fail_with("403 Forbidden");
    let doc = shared(InMemoryDocument::new("note.md", ""));

    let report = intercepted(
        h.orchestrator
            .handle_event(doc.clone(), UploadEvent::paste(vec![png(b"fallback")]))
            .await
            .unwrap(),
    );

    let local_key = format!("attachments/{}.png", hash(b"fallback"));
    assert_eq!(report.tasks[0].status(), TaskStatus::FailedFallback);
    assert_eq!(std::fs::read(h.root().join(&local_key)).unwrap(), b"fallback");
    assert_eq!(doc.lock().await.as_str(), format!("![image]({})\n", local_key));

    let fallback_notice = h
        .notifier
        .notices()
        .into_iter()
        .find(|n| matches!(n, Notice::SavedLocallyAfterFailure { .. }))
        .expect("fallback notice");
    assert!(fallback_notice.to_string().contains("saved locally"));
}

#[tokio::test]
async fn test_rejected_put_without_fallback_leaves_error_marker() {
    let h = Harness::new(remote_config());
    h.store.fail_with("403 Forbidden");
    let doc = shared(InMemoryDocument::new("note.md", "before\n"));

    let report = intercepted(
        h.orchestrator
            .handle_event(doc.clone(), UploadEvent::paste(vec![png(b"nope")]))
            .await
            .unwrap(),
    );

    assert_eq!(report.tasks[0].status(), TaskStatus::FailedTerminal);
    let text = doc.lock().await.as_str().to_string();
    assert!(text.starts_with("before\n[Upload failed:"));
    assert!(text.contains("403 Forbidden"));
    assert!(!text.contains("uploading..."));
    assert!(h.notifier.notices().contains(&Notice::EventSummary { succeeded: 0, failed: 1 }));
}

#[tokio::test]
async fn test_front_matter_forces_local_mode() {
    let h = Harness::new(UploaderConfig {
        local_upload_folder: "media/${basename}".to_string(),
        ..remote_config()
    });
    let doc = shared(InMemoryDocument::new(
        "journal/day.md",
        "---\nlocalUpload: true\n---\n",
    ));

    intercepted(
        h.orchestrator
            .handle_event(doc.clone(), UploadEvent::paste(vec![png(b"local bytes")]))
            .await
            .unwrap(),
    );

    let key = format!("media/day/{}.png", hash(b"local bytes"));
    assert!(h.store.puts().is_empty());
    assert_eq!(std::fs::read(h.root().join(&key)).unwrap(), b"local bytes");
    assert!(doc.lock().await.as_str().ends_with(&format!("![image]({})\n", key)));
}

#[tokio::test]
async fn test_placeholder_inside_table_cell() {
    let h = Harness::new(remote_config());
    let mut note = InMemoryDocument::new("note.md", "| a | b |\n|---|---|\n| x |  |\n");
    let cursor = note.as_str().rfind("|  |").unwrap() + 2;
    note.set_cursor(cursor);
    let doc = shared(note);

    intercepted(
        h.orchestrator
            .handle_event(doc.clone(), UploadEvent::paste(vec![png(b"cell")]))
            .await
            .unwrap(),
    );

    let text = doc.lock().await.as_str().to_string();
    let last_row = text.lines().last().unwrap();
    assert!(last_row.starts_with("| x | ![image]("));
    assert!(last_row.ends_with(" |"));
    assert_eq!(text.lines().count(), 3);
}

#[tokio::test]
async fn test_user_deleted_placeholder_is_not_an_error() {
    let h = Harness::new(remote_config());
    let concrete = shared(InMemoryDocument::new("note.md", ""));
    let session = h.orchestrator.context().session();

    let tasks = {
        let mut guard = concrete.lock().await;
        let tasks = h
            .orchestrator
            .admit(&session, &*guard, UploadEvent::paste(vec![png(b"gone")]))
            .unwrap();
        h.orchestrator.begin(&mut *guard, &tasks).unwrap();
        *guard = InMemoryDocument::new("note.md", "user cleared the note");
        tasks
    };

    let doc: SharedDocument = concrete.clone();
    let report = h.orchestrator.run(&session, &doc, tasks).await;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(concrete.lock().await.as_str(), "user cleared the note");
}

#[tokio::test]
async fn test_non_media_paste_passes_through() {
    let h = Harness::new(remote_config());
    let doc = shared(InMemoryDocument::new("note.md", "text"));

    let disposition = h
        .orchestrator
        .handle_event(
            doc.clone(),
            UploadEvent::paste(vec![AttachedFile::new("notes.txt", "text/plain", b"hi".to_vec())]),
        )
        .await
        .unwrap();

    assert!(matches!(disposition, EventDisposition::PassThrough));
    assert!(h.store.puts().is_empty());
    assert_eq!(doc.lock().await.as_str(), "text");
}

#[tokio::test]
async fn test_settings_swap_does_not_affect_admitted_tasks() {
    let h = Harness::new(remote_config());
    let session = h.orchestrator.context().session();
    let concrete = shared(InMemoryDocument::new("note.md", ""));

    let tasks = {
        let mut guard = concrete.lock().await;
        let tasks = h
            .orchestrator
            .admit(&session, &*guard, UploadEvent::paste(vec![png(b"swap")]))
            .unwrap();
        h.orchestrator.begin(&mut *guard, &tasks).unwrap();
        tasks
    };

    h.orchestrator
        .context()
        .reconfigure_with_store(UploaderConfig::default(), None);

    let doc: SharedDocument = concrete.clone();
    let report = h.orchestrator.run(&session, &doc, tasks).await;
    assert_eq!(report.succeeded(), 1);
    assert_eq!(h.store.puts().len(), 1);
}

fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn compressing_config() -> UploaderConfig {
    UploaderConfig {
        enable_image_compression: true,
        max_image_compression_size: 0.00001,
        max_image_width_or_height: 64,
        ..remote_config()
    }
}

#[tokio::test]
async fn test_large_image_is_compressed_before_upload() {
    let h = Harness::new(compressing_config());
    let doc = shared(InMemoryDocument::new("note.md", ""));
    let data = noisy_png(256, 128);

    let report = intercepted(
        h.orchestrator
            .handle_event(
                doc.clone(),
                UploadEvent::paste(vec![AttachedFile::new("big.png", "image/png", data.clone())]),
            )
            .await
            .unwrap(),
    );

    assert_eq!(report.tasks[0].status(), TaskStatus::Succeeded);
    let puts = h.store.puts();
    assert_eq!(puts.len(), 1);
    assert!(puts[0].size < data.len());
    assert!(h.notifier.notices().contains(&Notice::Compressed {
        original_size: data.len(),
        new_size: puts[0].size,
    }));
}

#[tokio::test]
async fn test_undecodable_image_uploads_original_bytes() {
    let h = Harness::new(compressing_config());
    let doc = shared(InMemoryDocument::new("note.md", ""));
    let data = b"this is not really a png file".to_vec();

    let report = intercepted(
        h.orchestrator
            .handle_event(
                doc.clone(),
                UploadEvent::paste(vec![AttachedFile::new("broken.png", "image/png", data.clone())]),
            )
            .await
            .unwrap(),
    );

    assert_eq!(report.tasks[0].status(), TaskStatus::Succeeded);
    let puts = h.store.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].size, data.len());
    assert!(!h
        .notifier
        .notices()
        .iter()
        .any(|n| matches!(n, Notice::Compressed { .. })));
    assert!(doc.lock().await.as_str().starts_with("![image]("));
}

fn created_file(h: &Harness, rel: &str, data: &[u8]) -> AttachedFile {
    h.write(rel, data);
    let name = rel.rsplit('/').next().unwrap_or(rel);
    AttachedFile::new(name, "image/png", data.to_vec()).with_source_path(rel)
}

#[tokio::test]
async fn test_created_file_deleted_after_remote_upload() {
    let h = Harness::new(UploaderConfig {
        delete_local_after_upload: true,
        ..remote_config()
    });
    let doc = shared(InMemoryDocument::new("note.md", ""));
    let file = created_file(&h, "inbox/shot.png", b"created");

    let report = intercepted(
        h.orchestrator
            .handle_event(doc.clone(), UploadEvent::file_created(vec![file]))
            .await
            .unwrap(),
    );

    assert_eq!(report.tasks[0].status(), TaskStatus::Succeeded);
    assert_eq!(h.store.puts().len(), 1);
    assert!(!h.root().join("inbox/shot.png").exists());
}

#[tokio::test]
async fn test_created_file_kept_when_upload_falls_back() {
    let h = Harness::new(UploaderConfig {
        delete_local_after_upload: true,
        fallback_to_local: true,
        local_upload_folder: "attachments".to_string(),
        ..remote_config()
    });
    h.store.fail_with("500 Internal Server Error");
    let doc = shared(InMemoryDocument::new("note.md", ""));
    let file = created_file(&h, "inbox/shot.png", b"created");

    let report = intercepted(
        h.orchestrator
            .handle_event(doc.clone(), UploadEvent::file_created(vec![file]))
            .await
            .unwrap(),
    );

    assert_eq!(report.tasks[0].status(), TaskStatus::FailedFallback);
    assert!(h.root().join("inbox/shot.png").exists());
}

#[tokio::test]
async fn test_created_file_kept_when_upload_fails() {
    let h = Harness::new(UploaderConfig {
        delete_local_after_upload: true,
        ..remote_config()
    });
    h.store.fail_with("403 Forbidden");
    let doc = shared(InMemoryDocument::new("note.md", ""));
    let file = created_file(&h, "inbox/shot.png", b"created");

    let report = intercepted(
        h.orchestrator
            .handle_event(doc.clone(), UploadEvent::file_created(vec![file]))
            .await
            .unwrap(),
    );

    assert_eq!(report.tasks[0].status(), TaskStatus::FailedTerminal);
    assert!(h.root().join("inbox/shot.png").exists());
    assert!(doc.lock().await.as_str().contains("[Upload failed:"));
}
