//! Command-line interface

use crate::dataset;
use crate::error::Result;
use crate::inference::InferenceService;
use crate::training;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "radscan", version, about = "Chest radiograph classification pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a feature dataset from a radiograph archive
    BuildDataset {
        /// Path to the ZIP archive of class-labeled radiographs
        #[arg(long)]
        archive: PathBuf,
        /// Cap on entries per class
        #[arg(long)]
        max_per_class: Option<usize>,
        /// Directory for the metadata artifact
        #[arg(long, default_value = "data")]
        output_dir: PathBuf,
    },
    /// Train a classifier from a dataset metadata artifact
    Train {
        /// Path to metadata.json from build-dataset
        #[arg(long)]
        metadata: PathBuf,
        /// Directory for the model artifact
        #[arg(long, default_value = "models")]
        model_dir: PathBuf,
        /// Directory for the report and confusion matrix
        #[arg(long, default_value = "reports")]
        reports_dir: PathBuf,
    },
    /// Classify a single radiograph
    Predict {
        /// Path to the trained model artifact
        #[arg(long)]
        model: PathBuf,
        /// Image to classify
        #[arg(long)]
        image: PathBuf,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::BuildDataset {
            archive,
            max_per_class,
            output_dir,
        } => cmd_build_dataset(archive, max_per_class, output_dir),
        Commands::Train {
            metadata,
            model_dir,
            reports_dir,
        } => cmd_train(metadata, model_dir, reports_dir),
        Commands::Predict { model, image } => cmd_predict(model, image),
    }
}

fn cmd_build_dataset(
    archive: PathBuf,
    max_per_class: Option<usize>,
    output_dir: PathBuf,
) -> Result<()> {
    let metadata_path = dataset::build_dataset(&archive, max_per_class, &output_dir)?;
    println!(
        "{} metadata written to {}",
        "done:".green().bold(),
        metadata_path.display()
    );
    Ok(())
}

fn cmd_train(metadata: PathBuf, model_dir: PathBuf, reports_dir: PathBuf) -> Result<()> {
    let model_path = training::train(&metadata, &model_dir, &reports_dir)?;
    println!(
        "{} model written to {}",
        "done:".green().bold(),
        model_path.display()
    );
    println!("reports under {}", reports_dir.display());
    Ok(())
}

fn cmd_predict(model: PathBuf, image: PathBuf) -> Result<()> {
    let service = InferenceService::load(&model)?;
    let prediction = service.predict_path(&image)?;

    println!(
        "{} {} ({:.1}%)",
        "prediction:".green().bold(),
        prediction.class_name.bold(),
        prediction.confidence * 100.0
    );
    for (name, p) in &prediction.probabilities {
        println!("  {name:<16} {:.4}", p);
    }
    Ok(())
}
