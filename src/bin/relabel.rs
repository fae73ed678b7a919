//! relabel - move person images misfiled under the "no person" class

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

use person_relabel::{
    process_mislabeled_with_progress, review_mislabeled, BackendKind, ItemOutcome, RelabelConfig,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(name = "relabel", author, version, about)]
struct Args {
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, global = true, default_value = "auto", value_name = "MODE")]
    ui: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan class 0 and move images with a detected person into class 1
    Run {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// List likely mislabels without moving anything, and render a contact sheet
    Review {
        #[command(flatten)]
        common: CommonArgs,
        /// Stop after this many likely mislabels.
        #[arg(long)]
        max_images: Option<usize>,
        /// Contact sheet output path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(ClapArgs, Debug)]
struct CommonArgs {
    /// Dataset root containing the `0` and `1` class directories.
    #[arg(long)]
    dataset_root: Option<PathBuf>,
    /// Person detections must score strictly above this.
    #[arg(long)]
    threshold: Option<f32>,
    /// Detector weights (ONNX) or stub manifest (JSON).
    #[arg(long)]
    model: Option<PathBuf>,
    /// Detector backend (tract|stub).
    #[arg(long)]
    backend: Option<String>,
}

impl CommonArgs {
    fn apply(&self, cfg: &mut RelabelConfig) -> Result<()> {
        if let Some(root) = &self.dataset_root {
            cfg.dataset_root = root.clone();
        }
        if let Some(threshold) = self.threshold {
            cfg.threshold = threshold;
        }
        if let Some(model) = &self.model {
            cfg.detector.model_path = model.clone();
        }
        if let Some(backend) = &self.backend {
            cfg.detector.backend = backend.parse::<BackendKind>()?;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut cfg = RelabelConfig::load().context("failed to load configuration")?;
    match args.command {
        Command::Run { common } => {
            common.apply(&mut cfg)?;
            cfg.validate()?;
            run(&ui, &cfg)
        }
        Command::Review {
            common,
            max_images,
            output,
        } => {
            common.apply(&mut cfg)?;
            if let Some(max_images) = max_images {
                cfg.review.max_images = max_images;
            }
            if let Some(output) = output {
                cfg.review.output = output;
            }
            cfg.validate()?;
            review(&ui, &cfg)
        }
    }
}

fn run(ui: &ui::Ui, cfg: &RelabelConfig) -> Result<()> {
    println!("Starting scan for mislabeled images in non-person directory...");
    let summary = {
        let stage = ui.stage("Scan non-person directory");
        let mut done = 0usize;
        process_mislabeled_with_progress(cfg, |item| {
            done += 1;
            stage.progress(done);
            match &item.outcome {
                ItemOutcome::Moved { confidence } => stage.println(&format!(
                    "Moved {} to person directory (confidence: {:.2})",
                    item.filename, confidence
                )),
                ItemOutcome::DetectionFailed(message) | ItemOutcome::RelocationFailed(message) => {
                    stage.println(&format!("Error processing {}: {}", item.filename, message))
                }
                ItemOutcome::Clean => {}
            }
        })
        .context("mislabel processing failed")?
    };

    println!(
        "\nCompleted processing. Moved {} mislabeled images to person directory.",
        summary.moved_count
    );
    println!("Log file saved to: {}", summary.log_path.display());
    Ok(())
}

fn review(ui: &ui::Ui, cfg: &RelabelConfig) -> Result<()> {
    println!("Starting scan for mislabeled images in non-person directory...");
    let items = {
        let _stage = ui.stage("Collect review candidates");
        review_mislabeled(cfg).context("mislabel review failed")?
    };

    println!("\nFound {} likely mislabeled images.", items.len());
    if items.is_empty() {
        println!("No mislabeled images found to visualize.");
        return Ok(());
    }
    for (index, item) in items.iter().enumerate() {
        println!("[{:>2}] {}  conf: {:.2}", index + 1, item.filename, item.confidence);
    }

    #[cfg(feature = "review")]
    {
        let _stage = ui.stage("Render contact sheet");
        let drawn =
            person_relabel::review::render_contact_sheet(&items, &cfg.review, &cfg.review.output)?;
        println!(
            "Contact sheet with {} images written to {}",
            drawn,
            cfg.review.output.display()
        );
    }
    Ok(())
}
