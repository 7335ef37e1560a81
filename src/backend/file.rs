//! Local file delivery.
//!
//! Writes one file per send into a target directory, creating it when
//! absent. No index or manifest is kept.

use super::{dispatch, local_failure, DeliveryObserver, DeliveryOutcome, LogObserver, RetryPolicy};
use crate::format::{CollapsedFormatter, Formatter};
use crate::profile::Profile;
use crate::utils::error::DeliveryError;
use chrono::Utc;
use log::{debug, info};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Backend that writes formatted profiles to disk.
#[derive(Clone)]
pub struct FileBackend {
    directory: PathBuf,
    filename: Option<String>,
    formatter: Formatter,
    retry: RetryPolicy,
    asynchronous: bool,
    observer: Arc<dyn DeliveryObserver>,
}

impl FileBackend {
    /// Collapsed output into `directory`, timestamped file names.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            filename: None,
            formatter: CollapsedFormatter::new().into(),
            retry: RetryPolicy::default(),
            asynchronous: false,
            observer: Arc::new(LogObserver),
        }
    }

    pub fn with_formatter(mut self, formatter: impl Into<Formatter>) -> Self {
        self.formatter = formatter.into();
        self
    }

    /// Fixed file name instead of the generated timestamped one.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_async(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    /// Format and write; `true` on success.
    pub fn send(&self, profile: &Profile) -> bool {
        self.deliver(profile).success
    }

    pub fn deliver(&self, profile: &Profile) -> DeliveryOutcome {
        let path = self.target_path();
        let target = path.display().to_string();

        let bytes = match self.formatter.format(profile) {
            Ok(bytes) => bytes,
            Err(e) => return local_failure(self.observer.as_ref(), &target, e.into()),
        };

        let directory = self.directory.clone();
        let outcome = dispatch(
            self.retry,
            self.asynchronous,
            Arc::clone(&self.observer),
            target.clone(),
            Box::new(move || write_payload(&directory, &path, &bytes)),
        );
        if outcome.success && !self.asynchronous {
            info!("profile written to {}", target);
        }
        outcome
    }

    /// The directory exists or can be created.
    pub fn is_available(&self) -> bool {
        fs::create_dir_all(&self.directory).is_ok()
    }

    /// Target for the next send. Generated once per send so retries hit
    /// the same file.
    fn target_path(&self) -> PathBuf {
        let name = match &self.filename {
            Some(name) => name.clone(),
            None => timestamped_filename(self.formatter.file_extension()),
        };
        self.directory.join(name)
    }
}

fn write_payload(
    directory: &std::path::Path,
    path: &std::path::Path,
    bytes: &[u8],
) -> Result<bool, DeliveryError> {
    if !directory.exists() {
        debug!("creating output directory {}", directory.display());
    }
    fs::create_dir_all(directory)?;
    fs::write(path, bytes)?;
    Ok(true)
}

/// `profile-<UTC timestamp>.<ext>`
fn timestamped_filename(extension: &str) -> String {
    format!(
        "profile-{}.{}",
        Utc::now().format("%Y%m%d-%H%M%S%.3f"),
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{EventedFormatter, OtlpEncoding, OtlpFormatter};
    use crate::parser::parse_samples;
    use crate::profile::Metadata;
    use std::time::Duration;

    fn profile() -> Profile {
        Profile::new(parse_samples("main;a 1\nmain;a 2\n"), Metadata::new())
    }

    #[test]
    fn test_writes_collapsed_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).with_filename("out.txt");

        assert!(backend.send(&profile()));
        let written = fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(written, "main;a 3\n");
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested/profiles");
        let backend = FileBackend::new(&nested).with_filename("out.txt");

        assert!(backend.send(&profile()));
        assert!(nested.join("out.txt").exists());
    }

    #[test]
    fn test_generated_name_uses_formatter_extension() {
        let dir = tempfile::tempdir().unwrap();
        let backend =
            FileBackend::new(dir.path()).with_formatter(EventedFormatter::new("p"));

        assert!(backend.send(&profile()));
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].as_ref().unwrap().file_name();
        let name = name.to_string_lossy();
        assert!(name.starts_with("profile-"), "unexpected name {}", name);
        assert!(name.ends_with(".json"), "unexpected name {}", name);
    }

    #[test]
    fn test_one_file_per_send() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path())
            .with_formatter(OtlpFormatter::new("app", OtlpEncoding::Protobuf));

        assert!(backend.send(&profile()));
        std::thread::sleep(Duration::from_millis(5));
        assert!(backend.send(&profile()));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_unwritable_directory_reports_false() {
        let dir = tempfile::tempdir().unwrap();
        let file_in_the_way = dir.path().join("blocked");
        fs::write(&file_in_the_way, b"not a directory").unwrap();

        let backend = FileBackend::new(&file_in_the_way)
            .with_filename("out.txt")
            .with_retry_policy(RetryPolicy {
                max_retries: 0,
                retry_delay: Duration::from_millis(1),
            });

        assert!(!backend.send(&profile()));
        assert!(!backend.is_available());
    }

    #[test]
    fn test_async_send_eventually_writes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path())
            .with_filename("out.txt")
            .with_async(true);

        assert!(backend.send(&profile()));
        let path = dir.path().join("out.txt");
        for _ in 0..500 {
            if path.exists() {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("async send never wrote the file");
    }

    #[test]
    fn test_is_available_for_creatable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("fresh"));
        assert!(backend.is_available());
    }
}
