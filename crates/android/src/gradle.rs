//! Gradle build system integration
//!
//! Opens a project through its Gradle wrapper, lists the variants a task
//! exists for, and builds the command that assembles a selected variant pair.

use crate::error::GradleError;
use crate::variants::Variants;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use testpair_core::error::{Error, Result};
use testpair_core::process::{printable_command, run_command_in_dir, run_command_streaming_in_dir};

/// First token of a `gradlew tasks --all` line, e.g. `app:assembleDemoDebug`
static TASK_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<task>[^\s]+)").expect("task line regex is valid")
});

fn wrapper_name() -> &'static str {
    if cfg!(windows) {
        "gradlew.bat"
    } else {
        "gradlew"
    }
}

fn wrapper_program() -> &'static str {
    if cfg!(windows) {
        "gradlew.bat"
    } else {
        "./gradlew"
    }
}

/// A Gradle project driven through its wrapper script
#[derive(Debug, Clone)]
pub struct GradleProject {
    location: PathBuf,
}

impl GradleProject {
    /// Open the project at `location`; the Gradle wrapper must exist
    pub fn open(location: impl Into<PathBuf>) -> Result<Self> {
        let location = location.into();
        if !location.is_dir() {
            return Err(Error::directory_not_found(&location)
                .with_context("Failed to open project"));
        }

        let wrapper = location.join(wrapper_name());
        if !wrapper.is_file() {
            return Err(GradleError::WrapperNotFound { path: wrapper }.into());
        }

        Ok(Self { location })
    }

    /// Project root
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// A task of this project, e.g. `assemble`
    pub fn task(&self, name: &str) -> GradleTask<'_> {
        GradleTask {
            project: self,
            name: name.to_string(),
        }
    }
}

/// A Gradle task that exists once per variant (`assembleDebug`, ...)
#[derive(Debug, Clone)]
pub struct GradleTask<'a> {
    project: &'a GradleProject,
    name: String,
}

impl GradleTask<'_> {
    /// List every variant this task exists for, per module.
    ///
    /// Runs `gradlew tasks --all --console=plain --quiet <args>`.
    pub fn variants(&self, args: &[String]) -> Result<Variants> {
        let mut task_args: Vec<String> = ["tasks", "--all", "--console=plain", "--quiet"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        task_args.extend(args.iter().cloned());

        tracing::debug!(
            command = %printable_command(wrapper_program(), &task_args),
            "Listing Gradle tasks"
        );
        let result = run_command_in_dir(wrapper_program(), &task_args, &self.project.location)?;
        if !result.success {
            return Err(GradleError::TaskListing {
                exit_code: result.exit_code,
                output: result.combined_output(),
            }
            .into());
        }

        Ok(parse_variants(&self.name, &result.stdout))
    }

    /// Command that runs this task for every variant in `variants`
    pub fn command(&self, variants: &Variants, args: &[String]) -> BuildCommand {
        let mut command_args: Vec<String> = variants
            .iter()
            .flat_map(|(module, module_variants)| {
                module_variants
                    .iter()
                    .map(move |variant| task_path(module, &self.name, variant))
            })
            .collect();
        command_args.extend(args.iter().cloned());

        BuildCommand {
            program: wrapper_program().to_string(),
            args: command_args,
            dir: self.project.location.clone(),
        }
    }
}

fn task_path(module: &str, task: &str, variant: &str) -> String {
    if module.is_empty() {
        format!("{}{}", task, variant)
    } else {
        format!("{}:{}{}", module, task, variant)
    }
}

/// Extract `module -> [variant]` for `task` from `gradlew tasks --all` output.
///
/// A line such as `app:assembleDemoDebug - Assembles ...` yields variant
/// `DemoDebug` for module `app`; nested modules keep their full path
/// (`features:login`). Lines for other tasks, the bare task itself and
/// repeated variants are skipped.
pub fn parse_variants(task: &str, output: &str) -> Variants {
    let mut variants = Variants::new();

    for line in output.lines() {
        let Some(caps) = TASK_LINE.captures(line) else {
            continue;
        };
        let path = caps["task"].trim_start_matches(':');

        let (module, task_name) = match path.rsplit_once(':') {
            Some((module, name)) => (module, name),
            None => ("", path),
        };

        let Some(variant) = task_name.strip_prefix(task) else {
            continue;
        };
        // `assembled` is another task, `assemble1Debug` is a variant
        if variant.is_empty() || variant.starts_with(char::is_lowercase) {
            continue;
        }

        let module_variants = variants.entry(module.to_string()).or_default();
        if !module_variants.iter().any(|v| v == variant) {
            module_variants.push(variant.to_string());
        }
    }

    variants
}

/// A fully resolved Gradle invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    program: String,
    args: Vec<String>,
    dir: PathBuf,
}

impl BuildCommand {
    /// The command line as it would be typed in a shell
    pub fn printable(&self) -> String {
        printable_command(&self.program, &self.args)
    }

    /// Run the build with inherited stdio; a non-zero exit is an error
    pub fn run(&self) -> Result<()> {
        let exit_code = run_command_streaming_in_dir(&self.program, &self.args, &self.dir)?;
        if exit_code != 0 {
            return Err(GradleError::BuildFailed {
                command: self.printable(),
                exit_code,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testpair_core::ErrorCode;

    const TASKS_OUTPUT: &str = "
Build tasks
-----------
assemble - Assemble main outputs for all the variants.
assembleAndroidTest - Assembles all the Test applications.
app:assembleDebug - Assembles main outputs for all Debug variants.
app:assembleDemoDebug - Assembles main output for variant demoDebug
app:assembleDemoDebugAndroidTest - Assembles main output for variant demoDebugAndroidTest
app:assembleDemoDebugUnitTest - Assembles main output for variant demoDebugUnitTest
app:assembleDemoDebug - duplicated line
app:assembleDemo - Assembles main outputs for all Demo variants.
app:bundleDemoDebug - Assembles bundle for variant demoDebug
app:assembled - not a variant task
:features:login:assembleRelease - Assembles main outputs for all Release variants.
lintDemoDebug - Runs lint on the DemoDebug build.
";

    #[test]
    fn test_parse_variants() {
        let variants = parse_variants("assemble", TASKS_OUTPUT);

        let modules: Vec<&String> = variants.keys().collect();
        assert_eq!(modules, ["", "app", "features:login"]);
        assert_eq!(variants[""], vec!["AndroidTest"]);
        assert_eq!(
            variants["app"],
            vec!["Debug", "DemoDebug", "DemoDebugAndroidTest", "DemoDebugUnitTest", "Demo"]
        );
        assert_eq!(variants["features:login"], vec!["Release"]);
    }

    #[test]
    fn test_parse_variants_accepts_non_letter_start() {
        let output = "\
app:assemble1Debug - Assembles main output for variant 1Debug
app:assemble_internalDebug - Assembles main output for variant _internalDebug
app:assembleresources - not a variant task
";
        let variants = parse_variants("assemble", output);
        assert_eq!(variants["app"], vec!["1Debug", "_internalDebug"]);
    }

    #[test]
    fn test_parse_variants_other_task() {
        let variants = parse_variants("bundle", TASKS_OUTPUT);
        assert_eq!(variants["app"], vec!["DemoDebug"]);
        assert_eq!(variants.len(), 1);
    }

    #[test]
    fn test_parse_variants_empty_output() {
        assert!(parse_variants("assemble", "").is_empty());
    }

    fn project_with_wrapper() -> (tempfile::TempDir, GradleProject) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(wrapper_name()), "#!/bin/sh\n").unwrap();
        let project = GradleProject::open(dir.path()).unwrap();
        (dir, project)
    }

    #[test]
    fn test_open_requires_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let err = GradleProject::open(dir.path()).unwrap_err();
        assert_eq!(err.code, ErrorCode::GradleError);
    }

    #[test]
    fn test_open_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = GradleProject::open(dir.path().join("missing")).unwrap_err();
        assert_eq!(err.code, ErrorCode::DirectoryNotFound);
    }

    #[test]
    fn test_build_command_for_module() {
        let (_dir, project) = project_with_wrapper();
        let mut filtered = Variants::new();
        filtered.insert(
            "app".to_string(),
            vec!["DemoDebug".to_string(), "DemoDebugAndroidTest".to_string()],
        );

        let command = project
            .task("assemble")
            .command(&filtered, &["--stacktrace".to_string()]);
        assert_eq!(
            command.printable(),
            format!(
                "{} app:assembleDemoDebug app:assembleDemoDebugAndroidTest --stacktrace",
                wrapper_program()
            )
        );
    }

    #[test]
    fn test_build_command_for_root_project() {
        let (_dir, project) = project_with_wrapper();
        let mut filtered = Variants::new();
        filtered.insert(
            String::new(),
            vec!["Debug".to_string(), "DebugAndroidTest".to_string()],
        );

        let command = project.task("assemble").command(&filtered, &[]);
        assert_eq!(
            command.printable(),
            format!("{} assembleDebug assembleDebugAndroidTest", wrapper_program())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_build_is_build_invocation_failed() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, project) = project_with_wrapper();
        let wrapper = dir.path().join("gradlew");
        std::fs::write(&wrapper, "#!/bin/sh\nexit 3\n").unwrap();
        std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = project.task("assemble").command(&Variants::new(), &[]).run().unwrap_err();
        assert_eq!(err.code, ErrorCode::BuildInvocationFailed);
        assert!(err.message.contains("exited with code 3"));
    }

    #[cfg(unix)]
    #[test]
    fn test_variants_from_wrapper_output() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, project) = project_with_wrapper();
        let wrapper = dir.path().join("gradlew");
        std::fs::write(
            &wrapper,
            "#!/bin/sh\necho 'app:assembleDemoDebug - x'\necho 'app:assembleDemoDebugAndroidTest - x'\n",
        )
        .unwrap();
        std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755)).unwrap();

        let variants = project.task("assemble").variants(&[]).unwrap();
        assert_eq!(variants["app"], vec!["DemoDebug", "DemoDebugAndroidTest"]);
    }
}
