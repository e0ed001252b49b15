use std::{env, path::PathBuf, process};

use anyhow::Context;
use rigmerge::{LoadSummary, load_manifest, load_rig, write_rig_json};

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: rigmerge <manifest.json> [output.json]");
        process::exit(2);
    }

    let manifest_path = PathBuf::from(&args[1]);
    let manifest = load_manifest(&manifest_path)?;
    let layout = manifest.frame_layout()?;

    // Subject paths are relative to the manifest.
    let base = manifest_path.parent().map(PathBuf::from).unwrap_or_default();
    let subjects: Vec<PathBuf> = manifest
        .subjects
        .iter()
        .map(|subject| base.join(subject))
        .collect();

    let mut importer = manifest.importer.importer();
    let rig = load_rig(&mut importer, &subjects, &layout)
        .with_context(|| format!("failed to load subjects from {}", manifest_path.display()))?;

    let summary = LoadSummary::from_rig(&rig);
    println!("Subjects: {}, Frames: {}", summary.subject_count, summary.frame_count);
    println!("{summary}");

    let output = args
        .get(2)
        .cloned()
        .or_else(|| manifest.output_path.clone())
        .map(PathBuf::from);
    if let Some(output) = output {
        write_rig_json(&output, &rig)?;
        println!("Rig written to {}", output.display());
    }

    Ok(())
}
