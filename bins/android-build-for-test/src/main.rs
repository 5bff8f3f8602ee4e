//! Android build-for-test step
//!
//! Builds the app APK and the AndroidTest APK of one variant, exports both to
//! the deploy directory and publishes their paths to the pipeline.

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::SystemTime;
use testpair_android::artifacts::{classify_exported, export_artifacts, find_artifacts_with_retry};
use testpair_android::env::{export_outputs, EnvExporter, Envman};
use testpair_android::variants::{android_test_variant_pairs, filter_variants};
use testpair_android::{cache, ExportedArtifacts, GradleProject, Variants};
use testpair_cli::output::{format_duration, Status};
use testpair_cli::progress;
use testpair_core::config::{Config, StepConfig, StepInputs};
use testpair_core::error::{exit_codes, Error, Result, ResultExt};
use testpair_core::shell;
use testpair_telemetry::{TelemetryConfig, Timer};

#[derive(Parser)]
#[command(name = "android-build-for-test")]
#[command(about = "Build an Android app and its AndroidTest APK for one variant")]
#[command(version)]
struct Cli {
    /// Defaults file (TOML with a [step] table)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Gradle project root
    #[arg(long, env = "project_location")]
    project_location: Option<String>,

    /// Glob matched against APK paths after the build
    #[arg(long, env = "apk_path_pattern")]
    apk_path_pattern: Option<String>,

    /// App variant to build, e.g. DemoDebug
    #[arg(long, env = "variant")]
    variant: Option<String>,

    /// Gradle module owning the variant, e.g. app
    #[arg(long, env = "module")]
    module: Option<String>,

    /// Extra Gradle arguments
    #[arg(long, env = "arguments", allow_hyphen_values = true)]
    arguments: Option<String>,

    /// Dependency cache level: none, only_deps, all
    #[arg(long, env = "cache_level")]
    cache_level: Option<String>,

    /// Directory the exported APKs are copied to
    #[arg(long, env = "BITRISE_DEPLOY_DIR")]
    deploy_dir: Option<PathBuf>,
}

impl Cli {
    fn inputs(&self) -> StepInputs {
        StepInputs {
            project_location: self.project_location.clone(),
            apk_path_pattern: self.apk_path_pattern.clone(),
            variant: self.variant.clone(),
            module: self.module.clone(),
            arguments: self.arguments.clone(),
            cache_level: self.cache_level.clone(),
            deploy_dir: self.deploy_dir.as_ref().map(|p| p.display().to_string()),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    if let Err(e) = testpair_telemetry::init_with_config(TelemetryConfig::for_verbosity(cli.verbose)) {
        Status::warning(&e.to_string());
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };

    Status::info("Configs:");
    Status::table(&config.summary());
    println!();

    if !Envman::is_available() {
        Status::warning("envman not found on PATH, step outputs cannot be exported");
    }

    let exporter = Envman;
    let outcome = run(&config, &exporter);

    println!();
    Status::info("Collecting cache:");
    if let Err(warning) = cache::collect(&config.project_location, config.cache_level, &exporter) {
        Status::warning(&warning.to_string());
    }

    match outcome {
        Ok(_) => {
            Status::done("  Done");
            std::process::exit(exit_codes::SUCCESS);
        }
        Err(e) => fail(&e),
    }
}

fn load_config(cli: &Cli) -> Result<StepConfig> {
    Config::load(cli.config.as_deref())?
        .resolve(cli.inputs())
        .context("Couldn't create step config")
}

fn fail(err: &Error) -> ! {
    Status::error(&err.to_string());
    std::process::exit(err.exit_code());
}

fn run(config: &StepConfig, exporter: &dyn EnvExporter) -> Result<ExportedArtifacts> {
    let project = GradleProject::open(&config.project_location)?;
    let task = project.task("assemble");

    let args = shell::split(&config.arguments).context("Failed to parse arguments")?;

    Status::info("Variants:");
    let variants = list_variants(&project, &args)?;

    let pairs = android_test_variant_pairs(None, &variants);

    let filtered = match filter_variants(&config.module, &config.variant, &variants) {
        Ok(filtered) => filtered,
        Err(e) => {
            print_variants(&variants);
            println!();
            return Err(e.into());
        }
    };

    print_pairs(&pairs, &filtered);

    let started = SystemTime::now();

    Status::info("Run build:");
    let command = task.command(&filtered, &args);
    Status::done(&format!("$ {}", command.printable()));
    println!();

    let timer = Timer::start("build");
    command.run()?;
    println!();
    Status::success(&format!("Build finished in {}", format_duration(timer.stop())));

    println!();
    Status::info("Export APKs:");
    println!();

    let apks = find_artifacts_with_retry(&project, Some(started), &config.apk_path_pattern)
        .context(format!(
            "module: {}, variant: {}",
            config.module, config.variant
        ))?;

    let exported_paths = export_artifacts(apks, &config.deploy_dir)?;
    let exported = classify_exported(&exported_paths)
        .map_err(Error::from)
        .context(format!("apk_path_pattern: {}", config.apk_path_pattern))?;

    println!();
    export_outputs(exporter, &exported)?;

    Ok(exported)
}

fn list_variants(project: &GradleProject, args: &[String]) -> Result<Variants> {
    let spinner = progress::spinner("Fetching variants...");
    match project.task("assemble").variants(args) {
        Ok(variants) => {
            progress::finish_success(&spinner, "Fetched variants");
            Ok(variants)
        }
        Err(e) => {
            progress::finish_error(&spinner, "Failed to fetch variants");
            Err(e)
        }
    }
}

fn module_label(module: &str) -> &str {
    if module.is_empty() {
        "<root project>"
    } else {
        module
    }
}

/// Full listing, shown when the requested variant cannot be built
fn print_variants(variants: &Variants) {
    for (module, module_variants) in variants {
        Status::print(&format!("{}:", module_label(module)));
        for variant in module_variants {
            Status::print(&format!("- {}", variant));
        }
    }
}

/// Variants that have an AndroidTest pair, with the selected ones marked
fn print_pairs(pairs: &Variants, selected: &Variants) {
    for (module, module_variants) in pairs {
        Status::print(&format!("{}:", module_label(module)));
        for variant in module_variants {
            let is_selected = selected
                .get(module)
                .is_some_and(|chosen| chosen.contains(variant));
            if is_selected {
                Status::success(variant);
            } else {
                Status::print(&format!("- {}", variant));
            }
        }
        println!();
    }
}
