use board_align::detector::detect_with_report;
use board_align::edges::detect_edges;
use board_align::image::{load_frame, save_grayscale_u8, write_json_file};
use board_align::{DetectionSettings, RegionOfInterest};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct DetectImageConfig {
    pub input: PathBuf,
    #[serde(default)]
    pub roi: RegionOfInterest,
    #[serde(default)]
    pub detection: DetectionSettings,
    pub output: DetectImageOutput,
}

#[derive(Debug, Deserialize)]
pub struct DetectImageOutput {
    pub report_json: PathBuf,
    /// Edge map of the clipped region, for tuning the Canny thresholds.
    #[serde(default)]
    pub edges_png: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<DetectImageConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}

fn main() {
    board_align::logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = load_config(Path::new(&config_path))?;
    config.detection.validate().map_err(|e| e.to_string())?;

    let frame = load_frame(&config.input).map_err(|e| e.to_string())?;
    let report = detect_with_report(&frame, &config.roi, &config.detection)
        .map_err(|e| e.to_string())?;
    write_json_file(&config.output.report_json, &report).map_err(|e| e.to_string())?;

    let decision = &report.decision;
    println!(
        "{:?}: angle {:?}, {} segment(s), {} edge pixel(s), {:.2} ms",
        decision.kind,
        decision.angle_deg,
        decision.segments.len(),
        report.edge_pixels,
        report.timing.total_ms
    );
    println!("Saved report to {}", config.output.report_json.display());

    if let Some(path) = &config.output.edges_png {
        let mask = config
            .roi
            .clip(frame.width(), frame.height())
            .ok_or("Region of interest is empty; no edge map to save")?;
        let luma = frame.luma_crop(&mask.bounds);
        let edges = detect_edges(&luma, Some(&mask), &config.detection.edge_params());
        save_grayscale_u8(&edges.as_view(), path).map_err(|e| e.to_string())?;
        println!("Saved edge map to {}", path.display());
    }
    Ok(())
}

fn usage() -> String {
    "Usage: detect_image <config.json>".to_string()
}
