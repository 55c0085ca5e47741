use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use forge_agent::{
    BlanketRefiner, BoundedRefiner, CommandChecker, GenerationOptions, Generator, OpenAiClient,
    StandaloneRefiner,
};
use forge_core::config::{self, CONFIG_FILE_NAME, ForgeConfig};
use forge_core::parse::{self, ApiDescription};
use forge_core::plan::{FileKind, FilePlan, FileSpec, Snippet, build_plan};
use forge_fastapi::PromptAssembler;

#[derive(Parser)]
#[command(
    name = "forge",
    about = "Generate FastAPI services from OpenAPI descriptions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a FastAPI service from an OpenAPI description
    Generate {
        /// Path to the OpenAPI description (YAML or JSON)
        spec: PathBuf,

        /// Output directory [default: from config, else generated_app]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Refine the routers of a generated service from a test log
    Refine {
        /// Path to the OpenAPI description the service was generated from
        spec: PathBuf,

        /// Root of the generated service
        app_dir: PathBuf,

        /// Test runner output to repair against
        test_log: PathBuf,
    },

    /// Print the file plan without contacting the generation backend
    Plan {
        /// Path to the OpenAPI description
        spec: PathBuf,

        /// Output format
        #[arg(long, default_value = "yaml")]
        format: PlanFormat,
    },

    /// Initialize a new forge configuration
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, ValueEnum)]
enum PlanFormat {
    Yaml,
    Json,
}

fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    env_logger::init();
    if let Ok(path) = dotenv {
        log::debug!("loaded environment from {}", path.display());
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { spec, output } => cmd_generate(spec, output),

        Commands::Refine {
            spec,
            app_dir,
            test_log,
        } => cmd_refine(spec, app_dir, test_log),

        Commands::Plan { spec, format } => cmd_plan(spec, format),

        Commands::Init { force } => cmd_init(force),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "forge", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Load `.forge.yaml` from the current directory, if any, and overlay the environment.
fn load_config() -> Result<ForgeConfig> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);
    let cfg = config::load_config(&config_path)?.unwrap_or_default();
    Ok(cfg.with_env()?)
}

fn load_spec(path: &Path) -> Result<ApiDescription> {
    parse::load(path).with_context(|| format!("failed to load {}", path.display()))
}

fn cmd_generate(spec_path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let cfg = load_config()?;
    let output = output.unwrap_or_else(|| PathBuf::from(&cfg.output));
    let spec = load_spec(&spec_path)?;

    fs::create_dir_all(&output)
        .with_context(|| format!("failed to create output directory {}", output.display()))?;

    let assembler = PromptAssembler::new()?;
    let client = OpenAiClient::new(&cfg.generation)?;
    let checker = CommandChecker::new(cfg.check.clone());
    let options = GenerationOptions::from(&cfg.generation);
    let refiner = BoundedRefiner::new(
        &assembler,
        &client,
        &checker,
        options.clone(),
        cfg.refine.max_attempts,
    );

    eprintln!("Generating {} → {}", spec_path.display(), output.display());
    let summary = Generator::new(&assembler, &client, &refiner, options)
        .run(&spec, &output)
        .with_context(|| format!("generation into {} failed", output.display()))?;

    for file in &summary.files {
        eprintln!("  wrote {}", output.join(file).display());
    }
    for file in &summary.exhausted {
        eprintln!("  warning: {file} still has checker diagnostics");
    }
    eprintln!(
        "Generation complete: see {} for details.",
        summary.metadata_path.display()
    );
    Ok(())
}

fn cmd_refine(spec_path: PathBuf, app_dir: PathBuf, test_log: PathBuf) -> Result<()> {
    let cfg = load_config()?;
    let spec = load_spec(&spec_path)?;
    let spec_json = serde_json::to_string_pretty(&spec)?;
    let errors = fs::read_to_string(&test_log)
        .with_context(|| format!("failed to read {}", test_log.display()))?;

    let assembler = PromptAssembler::new()?;
    let client = OpenAiClient::new(&cfg.generation)?;
    let blanket = BlanketRefiner::new(
        &assembler,
        &client,
        GenerationOptions::from(&cfg.generation),
        &errors,
    );

    let entries = StandaloneRefiner::new(&blanket).run(&app_dir, &spec_json)?;
    let changed = entries.iter().filter(|e| e.changed).count();
    eprintln!(
        "Refined {} router(s) in {}, {changed} updated.",
        entries.len(),
        app_dir.display()
    );
    Ok(())
}

fn cmd_plan(spec_path: PathBuf, format: PlanFormat) -> Result<()> {
    let spec = load_spec(&spec_path)?;
    let plan = build_plan(&spec)?;
    let summary = build_plan_summary(&spec, &plan);

    match format {
        PlanFormat::Yaml => {
            let yaml = serde_yaml_ng::to_string(&summary)?;
            print!("{}", yaml);
        }
        PlanFormat::Json => {
            let json = serde_json::to_string_pretty(&summary)?;
            println!("{}", json);
        }
    }

    Ok(())
}

fn build_plan_summary(spec: &ApiDescription, plan: &FilePlan) -> serde_json::Value {
    let describe = |file: &FileSpec| {
        let mut value = serde_json::json!({
            "path": file.relative_path,
            "kind": file.kind.category(),
        });
        if let FileKind::Router(ident) = &file.kind {
            value["tag"] = ident.tag.clone().into();
            value["module"] = ident.module.clone().into();
            value["type_name"] = ident.type_name.clone().into();
            if let Snippet::Router(router) = file.extract(spec) {
                value["operations"] = router.paths.values().map(|ops| ops.len()).sum::<usize>().into();
                value["schema_refs"] = router.schema_refs().into_iter().collect::<Vec<_>>().into();
            }
        }
        value
    };

    serde_json::json!({
        "title": spec.title(),
        "tags": {
            "source": plan.tags.source,
            "names": plan.tags.tags,
        },
        "files": plan.files.iter().map(describe).collect::<Vec<_>>(),
        "test_module": describe(&plan.test_module),
    })
}

fn cmd_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, config::default_config_content())?;
    eprintln!("Created {}", config_path.display());
    Ok(())
}
