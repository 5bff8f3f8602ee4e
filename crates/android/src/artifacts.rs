//! APK discovery, export and role classification
//!
//! After the build, output files matching the artifact pattern are copied to
//! the deploy directory without ever overwriting an existing file, and the
//! exported paths are split into the app APK and the test APK.

use crate::error::ArtifactError;
use crate::gradle::GradleProject;
use crate::variants::ends_with_ignore_case;
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use testpair_cli::output::{format_count, format_size, Status};
use testpair_core::error::Result;
use testpair_core::file_scanner::FileScanner;

/// File name suffix of the instrumentation-test APK
pub const TEST_ARTIFACT_SUFFIX: &str = "AndroidTest.apk";

/// Format of the collision timestamp inserted before the extension
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Matches a stem that carries a collision marker: `-<14 digits>` optionally
/// followed by `-<n>`
static COLLISION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<stem>.*)-\d{14}(?:-\d+)?$").expect("collision marker regex is valid")
});

/// A build output waiting to be exported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name used in the deploy directory
    pub name: String,
    /// Location of the build output
    pub path: PathBuf,
}

impl Artifact {
    /// Artifact exported under the file's own base name
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { name, path }
    }

    /// Copy the file to `deploy_dir/name`
    pub fn export(&self, deploy_dir: &Path) -> std::io::Result<PathBuf> {
        let destination = deploy_dir.join(&self.name);
        std::fs::copy(&self.path, &destination)?;
        Ok(destination)
    }
}

/// Anything that can search for build outputs
pub trait ArtifactSource {
    /// Files matching `pattern`, modified at or after `since` when given
    fn find_artifacts(&self, since: Option<SystemTime>, pattern: &str) -> Result<Vec<Artifact>>;
}

impl ArtifactSource for GradleProject {
    fn find_artifacts(&self, since: Option<SystemTime>, pattern: &str) -> Result<Vec<Artifact>> {
        let files = FileScanner::new(self.location())
            .matching(pattern)?
            .modified_since(since)
            .scan()?;
        Ok(files.into_iter().map(Artifact::from_path).collect())
    }
}

/// Search for artifacts, retrying once without the time filter.
///
/// Finding nothing is not an error: the empty list is returned after the
/// retry and a warning is printed.
pub fn find_artifacts_with_retry<S: ArtifactSource + ?Sized>(
    source: &S,
    since: Option<SystemTime>,
    pattern: &str,
) -> Result<Vec<Artifact>> {
    let search = |since| {
        source.find_artifacts(since, pattern).map_err(|e| {
            testpair_core::Error::from(ArtifactError::Discovery {
                pattern: pattern.to_string(),
                source: e,
            })
        })
    };

    let artifacts = search(since)?;
    if !artifacts.is_empty() {
        return Ok(artifacts);
    }

    let Some(started) = since else {
        Status::warning(&format!(
            "No artifacts found with pattern: {} without modtime check",
            pattern
        ));
        return Ok(artifacts);
    };

    let started: chrono::DateTime<Local> = started.into();
    Status::warning(&format!(
        "No artifacts found with pattern: {} that has modification time after: {}",
        pattern,
        started.format("%Y-%m-%d %H:%M:%S")
    ));
    Status::warning("Retrying without modtime check....");
    println!();

    let artifacts = search(None)?;
    if artifacts.is_empty() {
        Status::warning(&format!(
            "No artifacts found with pattern: {} without modtime check",
            pattern
        ));
    }
    Ok(artifacts)
}

/// Copy `artifacts` into `deploy_dir` and return the written paths in input
/// order.
///
/// A name that already exists in `deploy_dir` gets a `-YYYYMMDDhhmmss`
/// timestamp before its extension. A failed copy is reported and skipped;
/// failing to check whether a destination exists aborts the export.
pub fn export_artifacts(artifacts: Vec<Artifact>, deploy_dir: &Path) -> Result<Vec<PathBuf>> {
    export_artifacts_with_timestamp(artifacts, deploy_dir, || {
        Local::now().format(TIMESTAMP_FORMAT).to_string()
    })
}

fn export_artifacts_with_timestamp(
    artifacts: Vec<Artifact>,
    deploy_dir: &Path,
    timestamp: impl Fn() -> String,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(artifacts.len());

    for mut artifact in artifacts {
        let source_name = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        artifact.name = available_name(deploy_dir, &artifact.name, &timestamp)?;

        Status::print(&format!(
            "  Export [ {} => $BITRISE_DEPLOY_DIR/{} ]",
            source_name, artifact.name
        ));

        match artifact.export(deploy_dir) {
            Ok(destination) => {
                tracing::debug!(
                    path = %destination.display(),
                    size = %format_size(std::fs::metadata(&destination).map(|m| m.len()).unwrap_or(0)),
                    "Exported artifact"
                );
                paths.push(destination);
            }
            Err(err) => {
                Status::warning(&format!(
                    "failed to export artifact ({}), error: {}",
                    artifact.path.display(),
                    err
                ));
            }
        }
    }

    tracing::debug!("Exported {}", format_count(paths.len(), "artifact", "artifacts"));
    Ok(paths)
}

/// A name for `name` that does not exist yet in `deploy_dir`
fn available_name(
    deploy_dir: &Path,
    name: &str,
    timestamp: &impl Fn() -> String,
) -> Result<String> {
    if !exists(&deploy_dir.join(name))? {
        return Ok(name.to_string());
    }

    let (stem, extension) = split_extension(name);
    let stamped = format!("{}-{}", stem, timestamp());

    let mut candidate = format!("{}{}", stamped, extension);
    let mut counter = 1;
    while exists(&deploy_dir.join(&candidate))? {
        candidate = format!("{}-{}{}", stamped, counter, extension);
        counter += 1;
    }
    Ok(candidate)
}

fn exists(path: &Path) -> Result<bool> {
    path.try_exists().map_err(|source| {
        ArtifactError::ExportProbe {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

/// Split `app-debug.apk` into `("app-debug", ".apk")`
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// The two APKs handed to the test runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedArtifacts {
    pub app: PathBuf,
    pub test: PathBuf,
}

/// Whether an exported file is the instrumentation-test APK.
///
/// Collision markers added during export are ignored, so
/// `app-debug-androidTest-20240101120000.apk` still counts as a test APK.
pub fn is_test_artifact(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    let (stem, extension) = split_extension(&name);
    let stem = COLLISION_MARKER
        .captures(stem)
        .and_then(|caps| caps.name("stem"))
        .map_or(stem, |m| m.as_str());

    ends_with_ignore_case(&format!("{}{}", stem, extension), TEST_ARTIFACT_SUFFIX)
}

/// Assign each exported path to the app or test role.
///
/// When several paths fit one role the last one wins; the others are logged.
pub fn classify_exported(paths: &[PathBuf]) -> std::result::Result<ExportedArtifacts, ArtifactError> {
    let mut app: Option<&PathBuf> = None;
    let mut test: Option<&PathBuf> = None;

    for path in paths {
        let slot = if is_test_artifact(path) { &mut test } else { &mut app };
        if let Some(previous) = slot.replace(path) {
            tracing::warn!(
                discarded = %previous.display(),
                kept = %path.display(),
                "Multiple candidates for the same APK role"
            );
        }
    }

    let app = app.ok_or(ArtifactError::AppArtifactMissing)?;
    let test = test.ok_or(ArtifactError::TestArtifactMissing)?;

    Ok(ExportedArtifacts {
        app: app.clone(),
        test: test.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::time::Duration;
    use testpair_core::ErrorCode;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_export_without_collision_keeps_name() {
        let build = tempfile::tempdir().unwrap();
        let deploy = tempfile::tempdir().unwrap();
        let apk = build.path().join("app-debug.apk");
        write(&apk, "app");

        let paths = export_artifacts(vec![Artifact::from_path(&apk)], deploy.path()).unwrap();
        assert_eq!(paths, vec![deploy.path().join("app-debug.apk")]);
        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "app");
    }

    #[test]
    fn test_export_collisions_never_overwrite() {
        let build = tempfile::tempdir().unwrap();
        let deploy = tempfile::tempdir().unwrap();
        write(&deploy.path().join("app-debug.apk"), "previous step");

        let first = build.path().join("demo/app-debug.apk");
        let second = build.path().join("full/app-debug.apk");
        write(&first, "demo");
        write(&second, "full");

        let paths = export_artifacts_with_timestamp(
            vec![Artifact::from_path(&first), Artifact::from_path(&second)],
            deploy.path(),
            || "20240102030405".to_string(),
        )
        .unwrap();

        assert_eq!(
            paths,
            vec![
                deploy.path().join("app-debug-20240102030405.apk"),
                deploy.path().join("app-debug-20240102030405-1.apk"),
            ]
        );
        assert_eq!(fs::read_to_string(deploy.path().join("app-debug.apk")).unwrap(), "previous step");
        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "demo");
        assert_eq!(fs::read_to_string(&paths[1]).unwrap(), "full");
    }

    #[test]
    fn test_export_same_name_in_one_batch() {
        let build = tempfile::tempdir().unwrap();
        let deploy = tempfile::tempdir().unwrap();
        let first = build.path().join("a/app.apk");
        let second = build.path().join("b/app.apk");
        write(&first, "a");
        write(&second, "b");

        let paths = export_artifacts(
            vec![Artifact::from_path(&first), Artifact::from_path(&second)],
            deploy.path(),
        )
        .unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0], deploy.path().join("app.apk"));
        let renamed = paths[1].file_name().unwrap().to_string_lossy().to_string();
        assert!(renamed.starts_with("app-") && renamed.ends_with(".apk"), "{renamed}");
        assert_eq!(renamed.len(), "app-".len() + 14 + ".apk".len());
        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "a");
        assert_eq!(fs::read_to_string(&paths[1]).unwrap(), "b");
    }

    #[test]
    fn test_failed_copy_is_skipped() {
        let build = tempfile::tempdir().unwrap();
        let deploy = tempfile::tempdir().unwrap();
        let good = build.path().join("app-debug.apk");
        write(&good, "app");
        let missing = build.path().join("gone-androidTest.apk");

        let paths = export_artifacts(
            vec![Artifact::from_path(&missing), Artifact::from_path(&good)],
            deploy.path(),
        )
        .unwrap();
        assert_eq!(paths, vec![deploy.path().join("app-debug.apk")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unprobeable_destination_aborts_export() {
        let build = tempfile::tempdir().unwrap();
        let app = build.path().join("app-debug.apk");
        let test = build.path().join("app-debug-androidTest.apk");
        write(&app, "app");
        write(&test, "test");
        // a regular file where the deploy directory should be
        let deploy = build.path().join("deploy");
        write(&deploy, "not a directory");

        let err = export_artifacts(
            vec![Artifact::from_path(&app), Artifact::from_path(&test)],
            &deploy,
        )
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::ArtifactExportFailed);
        assert!(err.message.contains("app-debug.apk"), "{}", err.message);
        assert!(err.to_string().contains("Not a directory"), "{err}");
        assert_eq!(fs::read_to_string(&deploy).unwrap(), "not a directory");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("app-debug.apk"), ("app-debug", ".apk"));
        assert_eq!(split_extension("app.debug.apk"), ("app.debug", ".apk"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
    }

    #[test]
    fn test_classify_exported() {
        let paths = vec![
            PathBuf::from("/deploy/app-demo-debug-androidTest.apk"),
            PathBuf::from("/deploy/app-demo-debug.apk"),
        ];
        let exported = classify_exported(&paths).unwrap();
        assert_eq!(exported.app, PathBuf::from("/deploy/app-demo-debug.apk"));
        assert_eq!(exported.test, PathBuf::from("/deploy/app-demo-debug-androidTest.apk"));
    }

    #[test]
    fn test_classify_renamed_test_apk() {
        let paths = vec![
            PathBuf::from("/deploy/app-debug-20240102030405.apk"),
            PathBuf::from("/deploy/app-debug-androidTest-20240102030405-2.apk"),
        ];
        let exported = classify_exported(&paths).unwrap();
        assert_eq!(exported.app, paths[0]);
        assert_eq!(exported.test, paths[1]);
    }

    #[test]
    fn test_classify_missing_roles() {
        let only_app = vec![PathBuf::from("/deploy/app-debug.apk")];
        assert!(matches!(
            classify_exported(&only_app),
            Err(ArtifactError::TestArtifactMissing)
        ));

        let only_test = vec![PathBuf::from("/deploy/app-debug-AndroidTest.apk")];
        assert!(matches!(
            classify_exported(&only_test),
            Err(ArtifactError::AppArtifactMissing)
        ));

        assert!(matches!(classify_exported(&[]), Err(ArtifactError::AppArtifactMissing)));
    }

    #[test]
    fn test_classify_last_candidate_wins() {
        let paths = vec![
            PathBuf::from("/deploy/a.apk"),
            PathBuf::from("/deploy/a-androidTest.apk"),
            PathBuf::from("/deploy/b.apk"),
        ];
        let exported = classify_exported(&paths).unwrap();
        assert_eq!(exported.app, PathBuf::from("/deploy/b.apk"));
    }

    struct RecordingSource {
        calls: RefCell<Vec<Option<SystemTime>>>,
        found_without_filter: Vec<Artifact>,
    }

    impl ArtifactSource for RecordingSource {
        fn find_artifacts(&self, since: Option<SystemTime>, _pattern: &str) -> Result<Vec<Artifact>> {
            self.calls.borrow_mut().push(since);
            Ok(match since {
                Some(_) => Vec::new(),
                None => self.found_without_filter.clone(),
            })
        }
    }

    #[test]
    fn test_retry_happens_once_without_time_filter() {
        let source = RecordingSource {
            calls: RefCell::new(Vec::new()),
            found_without_filter: Vec::new(),
        };
        let started = SystemTime::now();

        let artifacts = find_artifacts_with_retry(&source, Some(started), "*.apk").unwrap();
        assert!(artifacts.is_empty());
        assert_eq!(*source.calls.borrow(), vec![Some(started), None]);
    }

    #[test]
    fn test_no_retry_without_time_filter() {
        let source = RecordingSource {
            calls: RefCell::new(Vec::new()),
            found_without_filter: Vec::new(),
        };

        find_artifacts_with_retry(&source, None, "*.apk").unwrap();
        assert_eq!(*source.calls.borrow(), vec![None]);
    }

    #[test]
    fn test_retry_finds_files_older_than_build_start() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("gradlew"), "").unwrap();
        let apk = dir.path().join("app/build/outputs/apk/debug/app-debug.apk");
        write(&apk, "app");
        let project = GradleProject::open(dir.path()).unwrap();

        let started = SystemTime::now() + Duration::from_secs(3600);
        assert!(project.find_artifacts(Some(started), "*/build/outputs/apk/*.apk").unwrap().is_empty());

        let artifacts =
            find_artifacts_with_retry(&project, Some(started), "*/build/outputs/apk/*.apk").unwrap();
        assert_eq!(artifacts, vec![Artifact::from_path(&apk)]);
        assert_eq!(artifacts[0].name, "app-debug.apk");
    }

    #[test]
    fn test_discovery_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("gradlew"), "").unwrap();
        let project = GradleProject::open(dir.path()).unwrap();

        let err = find_artifacts_with_retry(&project, None, "[").unwrap_err();
        assert_eq!(err.code, ErrorCode::ArtifactDiscoveryFailed);
        assert!(err.message.contains("["));
    }

    #[test]
    fn test_discovery_failure_reports_its_cause() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("gradlew"), "").unwrap();
        let project = GradleProject::open(dir.path()).unwrap();

        let err = find_artifacts_with_retry(&project, None, "[")
            .map_err(|e| e.with_context("module: app, variant: DemoDebug"))
            .unwrap_err();

        let rendered = err.to_string();
        assert!(rendered.contains("Invalid glob pattern"), "{rendered}");
        assert!(rendered.contains("module: app, variant: DemoDebug"), "{rendered}");
    }

    #[test]
    fn test_discovery_failure_after_root_vanished() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("gradlew"), "").unwrap();
        let project = GradleProject::open(dir.path()).unwrap();
        drop(dir);

        let err = find_artifacts_with_retry(&project, None, "*.apk").unwrap_err();
        assert_eq!(err.code, ErrorCode::ArtifactDiscoveryFailed);
        assert!(err.to_string().contains("Directory not found"), "{err}");
    }
}
