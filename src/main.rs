mod cli;

use mediaforge::app::{self, App, LayoutRequest};
use mf_av::ToolRegistry;
use mf_core::config::Config;
use mf_core::{Dimension, TaskId};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from --verbose
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediaforge=trace,mf_composer=trace,mf_jobs=debug,mf_av=debug,mf_profile=debug".to_string()
        } else {
            "mediaforge=info,mf_composer=info,mf_jobs=info,mf_av=warn,mf_profile=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref().map(app::expand);

    match cli.command {
        Commands::Profiles { json } => list_profiles(&load_config(config_path.as_deref()), json),
        Commands::Layout { request } => solve_layout(&request),
        Commands::Encode {
            input,
            profile,
            collection,
        } => run_async(config_path.as_deref(), collection, |app| {
            submit_encode(app, input, profile)
        }),
        Commands::Concat {
            inputs,
            profile,
            canvas,
            frame_rate,
            collection,
        } => {
            let canvas: Dimension = canvas.parse().context("invalid --canvas")?;
            run_async(config_path.as_deref(), collection, move |app| {
                submit_concat(app, inputs, profile, canvas, frame_rate)
            })
        }
        Commands::ImageToVideo {
            image,
            profile,
            duration,
            collection,
        } => run_async(config_path.as_deref(), collection, move |app| {
            submit_image_to_video(app, image, profile, duration)
        }),
        Commands::Still {
            input,
            profile,
            times,
            collection,
        } => run_async(config_path.as_deref(), collection, |app| {
            submit_still(app, input, profile, times)
        }),
        Commands::CheckTools => check_tools(&load_config(config_path.as_deref())),
        Commands::Validate {
            config: validate_path,
        } => {
            let path = validate_path.map(|p| app::expand(&p)).or(config_path);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediaforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Config {
    Config::load_or_default(path)
}

/// Build the full stack, submit through `submit`, then wait for the returned
/// handles and print the produced media as JSON. Ctrl-C cancels the wait and
/// every outstanding task.
fn run_async<F, Fut>(config_path: Option<&Path>, collection: Option<String>, submit: F) -> Result<()>
where
    F: FnOnce(Arc<App>) -> Fut,
    Fut: std::future::Future<Output = mf_core::Result<Vec<TaskId>>>,
{
    let config = load_config(config_path);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let mut app = App::from_config(config).context("failed to initialise")?;
        if let Some(collection) = collection {
            app = app.with_collection(collection);
        }
        let app = Arc::new(app);

        let handles = submit(app.clone()).await.context("submission rejected")?;

        let cancel = CancellationToken::new();
        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, canceling tasks");
                ctrl_c.cancel();
            }
        });

        let options = app.wait_options().with_cancel(cancel.clone());
        let result = app.run_to_completion(&handles, &options).await;
        if cancel.is_cancelled() {
            for id in &handles {
                if let Err(e) = app.composer().cancel(*id).await {
                    tracing::warn!(task_id = %id, error = %e, "Failed to cancel task");
                }
            }
        }

        let produced = result.context("tasks did not complete")?;
        println!("{}", serde_json::to_string_pretty(&produced)?);
        Ok(())
    })
}

async fn submit_encode(app: Arc<App>, input: PathBuf, profile: String) -> mf_core::Result<Vec<TaskId>> {
    let source = app.inspect(&input).await?;
    Ok(vec![app.composer().encode(Some(&source), &profile).await?])
}

async fn submit_concat(
    app: Arc<App>,
    inputs: Vec<PathBuf>,
    profile: String,
    canvas: Dimension,
    frame_rate: Option<f32>,
) -> mf_core::Result<Vec<TaskId>> {
    let mut sources = Vec::with_capacity(inputs.len());
    for input in &inputs {
        sources.push(app.inspect(input).await?);
    }
    let id = app
        .composer()
        .concatenate(&profile, canvas, frame_rate, &sources)
        .await?;
    Ok(vec![id])
}

async fn submit_image_to_video(
    app: Arc<App>,
    image: PathBuf,
    profile: String,
    duration: f64,
) -> mf_core::Result<Vec<TaskId>> {
    let image = app.inspect(&image).await?;
    Ok(vec![app.composer().image_to_video(Some(&image), &profile, duration).await?])
}

async fn submit_still(
    app: Arc<App>,
    input: PathBuf,
    profile: String,
    times: Vec<f64>,
) -> mf_core::Result<Vec<TaskId>> {
    let source = app.inspect(&input).await?;
    Ok(vec![app.composer().image(Some(&source), &profile, &times).await?])
}

fn list_profiles(config: &Config, json: bool) -> Result<()> {
    let registry = app::load_profiles(config).context("failed to load profiles")?;
    let profiles = registry.list();

    if json {
        let plain: Vec<_> = profiles.iter().map(|p| p.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&plain)?);
        return Ok(());
    }

    if profiles.is_empty() {
        println!("No profiles loaded. Add descriptor paths under profiles.paths.");
        return Ok(());
    }
    for profile in profiles {
        let inputs: Vec<String> = profile.applicable.iter().map(ToString::to_string).collect();
        println!(
            "{:<28} {} -> {} ({})",
            profile.identifier,
            inputs.join(","),
            profile.output,
            profile.suffix
        );
        for variant in &profile.variants {
            println!("{:<28}   variant {}", "", variant.suffix);
        }
    }
    Ok(())
}

fn solve_layout(request: &Path) -> Result<()> {
    let path = app::expand(request);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let solved = LayoutRequest::from_json(&json)?.solve()?;
    println!("{}", serde_json::to_string_pretty(&solved)?);
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let registry = ToolRegistry::discover(&config.tools, config.execution.tool_timeout());
    let mut all_ok = true;

    for tool in registry.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);
        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Tasks cannot run without ffmpeg and ffprobe.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read {}", p.display()))?;
            Config::from_json(&contents)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("✓ Configuration parsed");
    println!(
        "  Execution: {} concurrent tasks, poll every {}ms",
        config.execution.max_concurrent_tasks, config.execution.poll_interval_ms
    );
    println!("  Profile paths: {}", config.profiles.paths.len());
    println!(
        "  Storage: {} (collection '{}')",
        config.storage.root.display(),
        config.storage.default_collection
    );

    let warnings = config.validate();
    for warning in &warnings {
        println!("  ! {warning}");
    }

    match app::load_profiles(&config) {
        Ok(registry) => println!("  Profiles loaded: {}", registry.len()),
        Err(e) => println!("  ✗ Profiles failed to load: {e}"),
    }

    Ok(())
}
