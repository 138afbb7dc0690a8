use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the bucket replication workspace",
    long_about = "A unified CLI for packaging the replication Lambda and running\n\
                  CI checks in the bucket replication workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build and package the replication Lambda as a `bootstrap` zip
    ServerlessPackage {
        /// Compilation target triple for the Lambda binary
        #[arg(long, default_value = DEFAULT_LAMBDA_TARGET)]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Directory the zip is written to
        #[arg(long, env = "REPLICATION_DIST_DIR", default_value = "dist")]
        dist_dir: String,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Check, then package the Lambda for the default target
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

const LAMBDA_PACKAGE: &str = "replication_lambda";
const LAMBDA_BIN: &str = "replication_lambda";
const LAMBDA_ZIP: &str = "replication.zip";

const DEFAULT_LAMBDA_TARGET: &str = "x86_64-unknown-linux-gnu";

// ── helpers ────────────────────────────────────────────────────────

fn banner(title: &str) {
    eprintln!("\n--> {title}");
}

fn run_cargo(args: &[&str]) {
    eprintln!("+ cargo {}", args.join(" "));
    let status: ExitStatus = Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo");
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn lambda_build_args(target: &str, profile: BuildProfile) -> Vec<&str> {
    let mut args = vec![
        "build",
        "-p",
        LAMBDA_PACKAGE,
        "--target",
        target,
        "--bin",
        LAMBDA_BIN,
    ];
    args.extend(profile.as_cargo_flag());
    args
}

fn package_replication_lambda(target: &str, profile: BuildProfile, dist_dir: &Path) {
    if let Err(message) = require_target(target) {
        eprintln!("error: {message}");
        exit(1);
    }

    banner(&format!("building {LAMBDA_BIN} for {target}"));
    run_cargo(&lambda_build_args(target, profile));

    banner(&format!("zipping bootstrap into {}", dist_dir.display()));
    let binary_path = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join(LAMBDA_BIN);
    fs::create_dir_all(dist_dir).expect("failed to create dist directory");
    let zip_path = dist_dir.join(LAMBDA_ZIP);
    write_bootstrap_zip(&binary_path, &zip_path);

    eprintln!("\nwrote {}", zip_path.display());
}

/// Cross builds need the target's std; rustup being absent is not fatal.
fn require_target(target: &str) -> Result<(), String> {
    let installed = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(output) if output.status.success() => output.stdout,
        _ => {
            eprintln!("note: rustup unavailable, assuming `{target}` can be built");
            return Ok(());
        }
    };

    if target_listed(&String::from_utf8_lossy(&installed), target) {
        Ok(())
    } else {
        Err(format!(
            "`{target}` has no installed std; run `rustup target add {target}` first"
        ))
    }
}

fn target_listed(installed: &str, target: &str) -> bool {
    installed.lines().any(|line| line.trim() == target)
}

/// The provided.al2023 runtime executes a file named `bootstrap` at the zip root.
fn write_bootstrap_zip(binary_path: &Path, zip_path: &Path) {
    if !binary_path.exists() {
        panic!("expected lambda binary at '{}'", binary_path.display());
    }

    let binary = fs::read(binary_path).expect("failed to read lambda binary");
    let file = fs::File::create(zip_path).expect("failed to create lambda zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .expect("failed to start bootstrap entry");
    zip.write_all(&binary)
        .expect("failed to write bootstrap entry");
    zip.finish().expect("failed to finish lambda zip");
}

// ── CI jobs ────────────────────────────────────────────────────────

const CI_STEPS: &[(&str, &[&str])] = &[
    ("rustfmt", &["fmt", "--all", "--", "--check"]),
    (
        "clippy (warnings denied)",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    ),
    ("core rules", &["test", "-p", "replication_core"]),
    ("lambda adapters and handler", &["test", "-p", LAMBDA_PACKAGE]),
];

fn ci_check() {
    for (title, args) in CI_STEPS {
        banner(title);
        run_cargo(args);
    }
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => match job {
            CiJob::Check => ci_check(),
            CiJob::All => {
                ci_check();
                package_replication_lambda(
                    DEFAULT_LAMBDA_TARGET,
                    BuildProfile::Release,
                    Path::new("dist"),
                );
            }
        },
        Commands::ServerlessPackage {
            target,
            profile,
            dist_dir,
        } => package_replication_lambda(&target, profile, Path::new(&dist_dir)),
    }
}
