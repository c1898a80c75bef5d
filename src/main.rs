use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use dotenvy::dotenv;
use tracing::{error, info};

use storyboard_studio::config::{resolve_api_key, CONFIG};
use storyboard_studio::db::{Database, SettingsStore};
use storyboard_studio::error::Notice;
use storyboard_studio::gateway::{GenerationGateway, ModelGateway};
use storyboard_studio::llm::{GeminiClient, GeminiSettings, ImageData, ImageHandle};
use storyboard_studio::storyboard::StoryboardOrchestrator;
use storyboard_studio::studio::{StudioOrchestrator, VariantOutcome};
use storyboard_studio::utils::logging::init_logging;

#[derive(Debug)]
enum CliCommand {
    Storyboard {
        story: Option<PathBuf>,
        seed: Option<String>,
        out: PathBuf,
    },
    Story {
        seed: Option<String>,
    },
    Character {
        reference: PathBuf,
        subject: PathBuf,
        out: PathBuf,
    },
    Product {
        style: PathBuf,
        product: PathBuf,
        out: PathBuf,
    },
    SetSetting {
        key: String,
        value: String,
    },
}

fn usage() -> &'static str {
    "Usage:\n  \
     storyboard-studio storyboard (--story <file> | --seed <text>) [--out <dir>]\n  \
     storyboard-studio story [--seed <text>]\n  \
     storyboard-studio character --reference <image> --subject <image> [--out <dir>]\n  \
     storyboard-studio product --style <image> --product <image> [--out <dir>]\n  \
     storyboard-studio set-setting --key <key> --value <value>"
}

fn take_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> Result<&'a str> {
    *index += 1;
    args.get(*index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing value for {flag}"))
}

fn parse_cli_args(args: &[String]) -> Result<CliCommand> {
    let command = args
        .get(1)
        .map(String::as_str)
        .ok_or_else(|| anyhow!(usage()))?;

    let mut story = None;
    let mut seed = None;
    let mut out = CONFIG.output_dir.clone();
    let mut reference = None;
    let mut subject = None;
    let mut style = None;
    let mut product = None;
    let mut key = None;
    let mut value = None;

    let mut index = 2;
    while index < args.len() {
        match args[index].as_str() {
            "--story" => story = Some(PathBuf::from(take_value(args, &mut index, "--story")?)),
            "--seed" => seed = Some(take_value(args, &mut index, "--seed")?.to_string()),
            "--out" => out = PathBuf::from(take_value(args, &mut index, "--out")?),
            "--reference" => {
                reference = Some(PathBuf::from(take_value(args, &mut index, "--reference")?));
            }
            "--subject" => {
                subject = Some(PathBuf::from(take_value(args, &mut index, "--subject")?));
            }
            "--style" => style = Some(PathBuf::from(take_value(args, &mut index, "--style")?)),
            "--product" => {
                product = Some(PathBuf::from(take_value(args, &mut index, "--product")?));
            }
            "--key" => key = Some(take_value(args, &mut index, "--key")?.to_string()),
            "--value" => value = Some(take_value(args, &mut index, "--value")?.to_string()),
            "--help" | "-h" => return Err(anyhow!(usage())),
            other => {
                return Err(anyhow!("Unknown argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }

    match command {
        "storyboard" => {
            if story.is_some() == seed.is_some() {
                bail!("storyboard needs exactly one of --story or --seed\n{}", usage());
            }
            Ok(CliCommand::Storyboard { story, seed, out })
        }
        "story" => Ok(CliCommand::Story { seed }),
        "character" => Ok(CliCommand::Character {
            reference: reference.ok_or_else(|| anyhow!("--reference is required"))?,
            subject: subject.ok_or_else(|| anyhow!("--subject is required"))?,
            out,
        }),
        "product" => Ok(CliCommand::Product {
            style: style.ok_or_else(|| anyhow!("--style is required"))?,
            product: product.ok_or_else(|| anyhow!("--product is required"))?,
            out,
        }),
        "set-setting" => Ok(CliCommand::SetSetting {
            key: key.ok_or_else(|| anyhow!("--key is required"))?,
            value: value.ok_or_else(|| anyhow!("--value is required"))?,
        }),
        "--help" | "-h" | "help" => Err(anyhow!(usage())),
        other => Err(anyhow!("Unknown command: {other}\n{}", usage())),
    }
}

async fn load_image(path: &Path) -> Result<ImageHandle> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    Ok(ImageHandle::from_image(&ImageData::from_bytes(bytes)))
}

/// Writes inline images to `dir`. Plain URLs are only reported.
async fn save_image(handle: &ImageHandle, dir: &Path, stem: &str) -> Result<String> {
    if !handle.is_data_uri() {
        return Ok(handle.as_str().to_string());
    }
    let image = handle.to_image_data()?;
    let path = dir.join(format!("{stem}.{}", image.extension()));
    tokio::fs::write(&path, &image.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path.display().to_string())
}

fn print_notice(notice: Option<&Notice>) {
    if let Some(notice) = notice {
        println!("[{:?}] {}", notice.kind, notice.message);
    }
}

async fn build_gateway(db: &Database) -> Result<Arc<dyn GenerationGateway>> {
    let api_key = resolve_api_key(
        Some(db as &dyn SettingsStore),
        &CONFIG.api_key_setting_name,
        &CONFIG.credential_cache_path,
        CONFIG.fallback_api_key(),
    )
    .await
    .ok_or_else(|| {
        anyhow!(
            "No API key found. Set GEMINI_API_KEY or run: storyboard-studio set-setting --key {} --value <key>",
            CONFIG.api_key_setting_name
        )
    })?;

    let backend = GeminiClient::new(GeminiSettings {
        api_key,
        api_base: CONFIG.gemini_api_base.clone(),
        text_model: CONFIG.gemini_text_model.clone(),
        image_model: CONFIG.gemini_image_model.clone(),
        temperature: CONFIG.gemini_temperature,
        http_timeout: CONFIG.http_timeout(),
    });
    let gateway = ModelGateway::new(Arc::new(backend), CONFIG.image_timeout())
        .with_telemetry(Arc::new(db.clone()));
    Ok(Arc::new(gateway))
}

async fn run_storyboard(
    gateway: Arc<dyn GenerationGateway>,
    story: Option<PathBuf>,
    seed: Option<String>,
    out: PathBuf,
) -> Result<()> {
    let orchestrator = StoryboardOrchestrator::new(gateway, CONFIG.visual_style.clone());
    let story = match story {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read story {}", path.display()))?,
        None => orchestrator.draft_story(seed.as_deref()).await,
    };

    match orchestrator.parse_story(&story).await {
        Ok(true) => {}
        Ok(false) => bail!("The story is empty, nothing to storyboard"),
        Err(err) => {
            print_notice(orchestrator.snapshot().notice.as_ref());
            return Err(err.into());
        }
    }

    let shots_dir = out.join("shots");
    tokio::fs::create_dir_all(&shots_dir)
        .await
        .with_context(|| format!("Failed to create {}", shots_dir.display()))?;
    if let Some(blueprint) = orchestrator.snapshot().blueprint {
        let json = serde_json::to_string_pretty(&blueprint)?;
        tokio::fs::write(out.join("blueprint.json"), json)
            .await
            .context("Failed to write blueprint.json")?;
        println!("{}: {}", blueprint.title, blueprint.logline);
    }

    let report = orchestrator.finalize_blueprint().await?;
    let state = orchestrator.snapshot();
    for (id, status) in state.shots.iter() {
        match &status.url {
            Some(url) => {
                let saved = save_image(url, &shots_dir, &id.to_string()).await?;
                println!("{id}: {saved}");
            }
            None => println!("{id}: image not available"),
        }
    }
    println!(
        "Generated {}/{} shots ({} failed)",
        report.succeeded, report.requested, report.failed
    );
    print_notice(state.notice.as_ref());
    Ok(())
}

async fn report_variants(outcome: &VariantOutcome, out: &Path) -> Result<()> {
    tokio::fs::create_dir_all(out)
        .await
        .with_context(|| format!("Failed to create {}", out.display()))?;
    for (index, result) in outcome.results.iter().enumerate() {
        let stem = format!("{}-{}", outcome.mode.as_str(), index + 1);
        let saved = save_image(&result.image, out, &stem).await?;
        println!("{}: {}", result.label, saved);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _guards = init_logging(&CONFIG.log_level, Path::new("logs"));

    let args: Vec<String> = std::env::args().collect();
    let command = parse_cli_args(&args)?;

    let db = Database::init(&CONFIG.database_url).await?;
    db.health_check().await?;

    if let CliCommand::SetSetting { key, value } = &command {
        db.set_setting(key, value).await?;
        info!("Stored setting {}", key);
        return Ok(());
    }

    let gateway = build_gateway(&db).await?;
    let result = match command {
        CliCommand::Storyboard { story, seed, out } => {
            run_storyboard(gateway, story, seed, out).await
        }
        CliCommand::Story { seed } => {
            let orchestrator = StoryboardOrchestrator::new(gateway, CONFIG.visual_style.clone());
            println!("{}", orchestrator.draft_story(seed.as_deref()).await);
            Ok(())
        }
        CliCommand::Character {
            reference,
            subject,
            out,
        } => {
            let reference = load_image(&reference).await?;
            let subject = load_image(&subject).await?;
            let studio = StudioOrchestrator::new(gateway);
            let outcome = studio
                .generate_character_variants(Some(&reference), Some(&subject))
                .await;
            print_notice(studio.snapshot().notice.as_ref());
            match outcome {
                Ok(outcome) => report_variants(&outcome, &out).await,
                Err(err) => Err(err.into()),
            }
        }
        CliCommand::Product {
            style,
            product,
            out,
        } => {
            let style = load_image(&style).await?;
            let product = load_image(&product).await?;
            let studio = StudioOrchestrator::new(gateway);
            let outcome = studio
                .generate_product_variants(Some(&style), Some(&product))
                .await;
            print_notice(studio.snapshot().notice.as_ref());
            match outcome {
                Ok(outcome) => report_variants(&outcome, &out).await,
                Err(err) => Err(err.into()),
            }
        }
        CliCommand::SetSetting { .. } => Ok(()),
    };

    if let Err(err) = &result {
        error!("Command failed: {err:#}");
    }
    result
}
