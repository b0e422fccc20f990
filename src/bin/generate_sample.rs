use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "generate_sample")]
#[command(about = "Write a synthetic upload manifest of microscope filenames")]
struct Args {
    /// Output CSV path
    #[arg(short, long, default_value = "sample_manifest.csv")]
    out: PathBuf,

    /// Number of acquisition sites
    #[arg(short, long, default_value_t = 12)]
    sites: u32,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Serialize)]
struct Row {
    id: u64,
    filename: String,
}

const DETECTORS: [&str; 8] = ["UD", "LD", "MD", "UVD", "PDBSE", "BSE", "SE", "ABF"];
const ELEMENTS: [&str; 6] = ["Co K_alpha_1", "Ni K_alpha_1", "Cr K_alpha_1", "Fe K_alpha_1", "O K_alpha_1", "C K_alpha_1"];
const SAMPLES: [&str; 3] = ["NiCoCr_48h", "Inconel718", "Ti64_as_built"];
const EXTENSIONS: [&str; 3] = ["tif", "tiff", "png"];

/// Minimal deterministic PRNG (splitmix64)
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        SimpleRng { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    fn chance(&mut self, percent: u64) -> bool {
        self.next_u64() % 100 < percent
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.below(items.len())]
    }
}

/// Filenames for one acquisition site, in the naming styles the microscopes
/// and EDS software actually produce.
fn site_filenames(site: u32, rng: &mut SimpleRng) -> Vec<String> {
    let sample = rng.pick(&SAMPLES);
    let ext = rng.pick(&EXTENSIONS);
    let mut names = Vec::new();

    match site % 3 {
        // SEM detector images: sample_site_frame_DET
        0 => {
            let count = 2 + rng.below(4);
            for det in DETECTORS.iter().take(count) {
                names.push(format!("{sample}_{site:04}_{}_{det}.{ext}", 1 + rng.below(3)));
            }
        }
        // EDS maps with their electron image
        1 => {
            names.push(format!("Electron Image {site}.{ext}"));
            for element in ELEMENTS.iter().take(2 + rng.below(4)) {
                names.push(format!("{element} Map Data {site}.{ext}"));
            }
        }
        // Point spectra
        _ => {
            for point in 1..=1 + rng.below(3) {
                names.push(format!("Spectrum {site}_{point}.{ext}"));
            }
        }
    }

    // Stray files: a copy with a suffix, and a name without a group key.
    if rng.chance(20) {
        names.push(format!("{site:04} SE copy.{ext}"));
    }
    if rng.chance(10) {
        names.push(format!("overview_{}.{ext}", rng.pick(&DETECTORS).to_lowercase()));
    }
    names
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    let mut writer = csv::Writer::from_path(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    let mut id = 1;
    for site in 1..=args.sites {
        for filename in site_filenames(site, &mut rng) {
            writer.serialize(Row { id, filename })?;
            id += 1;
        }
    }
    writer.flush()?;

    println!("Wrote {} rows to {}", id - 1, args.out.display());
    Ok(())
}
