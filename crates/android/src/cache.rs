//! Dependency-cache collection
//!
//! Tells the pipeline's cache step which Gradle locations to keep between
//! builds. Paths are appended, newline separated, to
//! `BITRISE_CACHE_INCLUDE_PATHS` / `BITRISE_CACHE_EXCLUDE_PATHS`.

use crate::env::{environment_export_failed, EnvExporter};
use std::path::{Path, PathBuf};
use testpair_core::config::CacheLevel;
use testpair_core::error::{Error, ErrorCode, Result};
use walkdir::WalkDir;

/// Environment key listing paths the cache step should store
pub const CACHE_INCLUDE_PATHS_KEY: &str = "BITRISE_CACHE_INCLUDE_PATHS";

/// Environment key listing paths the cache step should skip
pub const CACHE_EXCLUDE_PATHS_KEY: &str = "BITRISE_CACHE_EXCLUDE_PATHS";

const GRADLE_BUILD_FILES: &[&str] = &["build.gradle", "build.gradle.kts"];

/// Include and exclude lists for one cache level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachePaths {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl CachePaths {
    /// Whether there is nothing to publish
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Paths to cache for `level`, with `home` as the user's home directory
pub fn cache_paths(project_dir: &Path, level: CacheLevel, home: &Path) -> CachePaths {
    let mut paths = CachePaths::default();
    if level == CacheLevel::None {
        return paths;
    }

    let gradle_home = home.join(".gradle");
    for dir in [
        gradle_home.join("caches"),
        gradle_home.join("wrapper"),
        home.join(".android").join("build-cache"),
    ] {
        paths.include.push(dir.display().to_string());
    }

    for pattern in ["*.lock", "*.bin", "gc.properties", "journal-1"] {
        paths
            .exclude
            .push(format!("{}/**/{}", gradle_home.display(), pattern));
    }
    for dir in ["fileHashes", "javaCompile"] {
        paths
            .exclude
            .push(format!("{}/caches/*/{}", gradle_home.display(), dir));
    }

    if level == CacheLevel::All {
        paths
            .include
            .push(project_dir.join(".gradle").display().to_string());
        paths
            .exclude
            .push(format!("{}/**/*.lock", project_dir.join(".gradle").display()));

        for module_dir in gradle_module_dirs(project_dir) {
            paths
                .include
                .push(module_dir.join("build").display().to_string());
        }
    }

    paths
}

/// Directories holding a Gradle build script, skipping build outputs
fn gradle_module_dirs(project_dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(project_dir)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            e.depth() == 0 || !(name.starts_with('.') || name == "build")
        })
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            e.file_type().is_file() && GRADLE_BUILD_FILES.iter().any(|f| *f == name)
        })
        .filter_map(|e| e.path().parent().map(Path::to_path_buf))
        .collect();
    dirs.sort();
    dirs.dedup();
    dirs
}

/// Publish the cache paths for `level`
pub fn collect(project_dir: &Path, level: CacheLevel, exporter: &dyn EnvExporter) -> Result<()> {
    collect_for_home(project_dir, level, dirs::home_dir().as_deref(), exporter)
}

fn collect_for_home(
    project_dir: &Path,
    level: CacheLevel,
    home: Option<&Path>,
    exporter: &dyn EnvExporter,
) -> Result<()> {
    if level == CacheLevel::None {
        tracing::debug!(level = %level, "Nothing to collect for the cache");
        return Ok(());
    }

    let home = home.ok_or_else(|| {
        Error::new(
            ErrorCode::DirectoryNotFound,
            "Could not determine the home directory",
        )
        .with_context(format!("Collecting {} cache paths", level))
        .with_suggestion("Set HOME for the step")
    })?;

    let paths = cache_paths(project_dir, level, home);
    if paths.is_empty() {
        tracing::debug!(level = %level, "Nothing to collect for the cache");
        return Ok(());
    }

    publish(exporter, CACHE_INCLUDE_PATHS_KEY, &paths.include)?;
    publish(exporter, CACHE_EXCLUDE_PATHS_KEY, &paths.exclude)?;
    Ok(())
}

fn publish(exporter: &dyn EnvExporter, key: &str, values: &[String]) -> Result<()> {
    let existing = std::env::var(key).unwrap_or_default();
    let value = merge_list(&existing, values);
    tracing::debug!(key, count = values.len(), "Publishing cache paths");
    exporter
        .export(key, &value)
        .map_err(|e| environment_export_failed(key, e))
}

/// Append `values` to a newline separated list, skipping entries already present
fn merge_list(existing: &str, values: &[String]) -> String {
    let mut lines: Vec<&str> = existing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    for value in values {
        if !lines.contains(&value.as_str()) {
            lines.push(value);
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::testing::MemoryEnv;
    use std::fs;

    #[test]
    fn test_level_none_collects_nothing() {
        let paths = cache_paths(Path::new("/project"), CacheLevel::None, Path::new("/home/ci"));
        assert!(paths.is_empty());
    }

    #[test]
    fn test_only_deps_collects_gradle_home() {
        let paths = cache_paths(Path::new("/project"), CacheLevel::OnlyDeps, Path::new("/home/ci"));
        assert!(paths.include.contains(&"/home/ci/.gradle/caches".to_string()));
        assert!(paths.include.contains(&"/home/ci/.gradle/wrapper".to_string()));
        assert!(paths.exclude.contains(&"/home/ci/.gradle/**/*.lock".to_string()));
        assert!(!paths.include.iter().any(|p| p.starts_with("/project")));
    }

    #[test]
    fn test_all_collects_module_build_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("settings.gradle"), "").unwrap();
        fs::write(root.join("build.gradle"), "").unwrap();
        fs::create_dir_all(root.join("app")).unwrap();
        fs::write(root.join("app/build.gradle.kts"), "").unwrap();
        fs::create_dir_all(root.join("app/build/intermediates")).unwrap();
        fs::write(root.join("app/build/intermediates/build.gradle"), "").unwrap();

        let paths = cache_paths(root, CacheLevel::All, Path::new("/home/ci"));
        assert!(paths.include.contains(&root.join(".gradle").display().to_string()));
        assert!(paths.include.contains(&root.join("build").display().to_string()));
        assert!(paths.include.contains(&root.join("app/build").display().to_string()));
        assert!(!paths
            .include
            .contains(&root.join("app/build/intermediates/build").display().to_string()));
    }

    #[test]
    fn test_merge_list() {
        let merged = merge_list("a\nb\n", &["b".to_string(), "c".to_string()]);
        assert_eq!(merged, "a\nb\nc");
        assert_eq!(merge_list("", &["x".to_string()]), "x");
    }

    #[test]
    fn test_collect_publishes_both_keys() {
        let env = MemoryEnv::default();
        collect(Path::new("/project"), CacheLevel::OnlyDeps, &env).unwrap();

        let keys: Vec<String> = env.values.borrow().iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![CACHE_INCLUDE_PATHS_KEY, CACHE_EXCLUDE_PATHS_KEY]);
    }

    #[test]
    fn test_collect_without_home_publishes_nothing() {
        let env = MemoryEnv::default();
        let err = collect_for_home(Path::new("/project"), CacheLevel::OnlyDeps, None, &env)
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::DirectoryNotFound);
        assert!(env.values.borrow().is_empty());
    }

    #[test]
    fn test_level_none_does_not_need_home() {
        let env = MemoryEnv::default();
        collect_for_home(Path::new("/project"), CacheLevel::None, None, &env).unwrap();
        assert!(env.values.borrow().is_empty());
    }

    #[test]
    fn test_collect_failure_is_reported() {
        let env = MemoryEnv {
            failing: vec![CACHE_INCLUDE_PATHS_KEY],
            ..MemoryEnv::default()
        };
        let err = collect(Path::new("/project"), CacheLevel::All, &env).unwrap_err();
        assert_eq!(err.code, ErrorCode::EnvironmentExportFailed);
    }
}
