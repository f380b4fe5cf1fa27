/// User-facing notices
use std::fmt;
use std::sync::Mutex;

/// Human-readable byte size ("1.5 MB")
pub fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Every message the uploader shows to the user
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Uploaded { file_name: String },
    StoredLocally { file_name: String },
    SavedLocallyAfterFailure { file_name: String },
    UploadFailed { message: String },
    Compressed { original_size: usize, new_size: usize },
    EventSummary { succeeded: usize, failed: usize },
    NoLocalMedia,
    BatchStarted { count: usize },
    BatchComplete { success: usize, failed: usize, skipped: usize, cancelled: bool },
    LogSaved { path: String },
    Downloaded { path: String },
    DownloadFailed { message: String },
    DeletedRemote,
    DeletedLocal { path: String },
    DeleteFailed { message: String },
}

impl Notice {
    /// Whether the notice reports a failure
    pub fn is_error(&self) -> bool {
        match self {
            Notice::UploadFailed { .. }
            | Notice::DownloadFailed { .. }
            | Notice::DeleteFailed { .. } => true,
            Notice::EventSummary { failed, .. } => *failed > 0,
            Notice::BatchComplete { failed, .. } => *failed > 0,
            _ => false,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Uploaded { file_name } => write!(f, "Uploaded successfully: {}", file_name),
            Notice::StoredLocally { file_name } => write!(f, "Saved to local folder: {}", file_name),
            Notice::SavedLocallyAfterFailure { file_name } => {
                write!(f, "Upload failed, saved locally: {}", file_name)
            }
            Notice::UploadFailed { message } => write!(f, "Upload failed: {}", message),
            Notice::Compressed { original_size, new_size } => write!(
                f,
                "Image compressed from {} to {}",
                format_size(*original_size),
                format_size(*new_size)
            ),
            Notice::EventSummary { succeeded, failed } if *failed == 0 => {
                write!(f, "All files uploaded successfully ({})", succeeded)
            }
            Notice::EventSummary { succeeded, failed } => {
                write!(f, "Upload complete: {} success, {} failed", succeeded, failed)
            }
            Notice::NoLocalMedia => write!(f, "No local files found to upload"),
            Notice::BatchStarted { count } => write!(f, "Starting batch upload of {} files...", count),
            Notice::BatchComplete { success, failed, skipped, cancelled } => {
                write!(
                    f,
                    "Batch upload complete: {} success, {} failed, {} skipped",
                    success, failed, skipped
                )?;
                if *cancelled {
                    write!(f, " (cancelled)")?;
                }
                Ok(())
            }
            Notice::LogSaved { path } => write!(f, "Log saved to {}", path),
            Notice::Downloaded { path } => write!(f, "Downloaded to {}", path),
            Notice::DownloadFailed { message } => write!(f, "Download failed: {}", message),
            Notice::DeletedRemote => write!(f, "Deleted from remote storage"),
            Notice::DeletedLocal { path } => write!(f, "Deleted local file {}", path),
            Notice::DeleteFailed { message } => write!(f, "Delete failed: {}", message),
        }
    }
}

/// Sink for user-facing notices
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        if notice.is_error() {
            tracing::warn!("{}", notice);
        } else {
            tracing::info!("{}", notice);
        }
    }
}

/// Notifier that keeps every notice, for inspection
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_summary_wording() {
        let ok = Notice::EventSummary { succeeded: 2, failed: 0 };
        assert_eq!(ok.to_string(), "All files uploaded successfully (2)");
        assert!(!ok.is_error());

        let mixed = Notice::EventSummary { succeeded: 1, failed: 1 };
        assert!(mixed.to_string().contains("1 failed"));
        assert!(mixed.is_error());
    }

    #[test]
    fn test_recording_notifier() {
        let notifier = RecordingNotifier::default();
        notifier.notify(Notice::DeletedRemote);
        assert_eq!(notifier.notices(), vec![Notice::DeletedRemote]);
    }
}
