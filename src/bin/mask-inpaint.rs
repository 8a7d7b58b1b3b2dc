use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use log::info;

use mask_inpaint::{
    default_output_path, Algorithm, InpaintOptions, Inpainter, MaskSource, Phase, ProcessResult,
    Region, Shape, DEFAULT_SEED,
};

#[derive(Parser)]
#[command(
    name = "mask-inpaint",
    about = "Fill masked regions of an image by texture synthesis and diffusion",
    version,
    after_help = "Simple usage: mask-inpaint <image> --rect x,y,w,h  (writes {name}_inpainted.{ext})\n\n\
                  Masks can come from a mask image (-m, any channel above 128 is masked),\n\
                  from --rect/--ellipse shapes, or both."
)]
struct Cli {
    /// Input image file or directory
    input: String,

    /// Output file or directory (default: {name}_inpainted.{ext})
    #[arg(short, long)]
    output: Option<String>,

    /// Mask image with the same dimensions as the input
    #[arg(short, long)]
    mask: Option<String>,

    /// Rectangle to mask, as x,y,width,height (repeatable)
    #[arg(long, value_name = "X,Y,W,H")]
    rect: Vec<Region>,

    /// Ellipse inscribed in x,y,width,height to mask (repeatable)
    #[arg(long, value_name = "X,Y,W,H")]
    ellipse: Vec<Region>,

    /// Grow each shape by 10% per side (at least 5px) to catch soft edges
    #[arg(long)]
    expand: bool,

    /// Inpainting algorithm
    #[arg(short, long, value_enum, default_value_t = Algorithm::Hybrid)]
    algorithm: Algorithm,

    /// Patch size for texture synthesis (odd, 3-31)
    #[arg(short, long, default_value = "7")]
    patch_size: u32,

    /// Diffusion passes
    #[arg(long, default_value = "10")]
    passes: u32,

    /// Candidate patches sampled per pixel
    #[arg(long, default_value = "500")]
    samples: u32,

    /// Random seed for candidate sampling
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Score penalty per pixel of distance to the source patch
    #[arg(long, default_value = "0.1")]
    distance_penalty: f32,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if cli.distance_penalty < 0.0 || !cli.distance_penalty.is_finite() {
        eprintln!("Error: Distance penalty must be a non-negative number");
        process::exit(1);
    }

    let shapes: Vec<Shape> = cli
        .rect
        .iter()
        .copied()
        .map(Shape::Rect)
        .chain(cli.ellipse.iter().copied().map(Shape::Ellipse))
        .collect();
    if cli.mask.is_none() && shapes.is_empty() {
        eprintln!("Error: No mask given; use -m <mask> or --rect/--ellipse");
        process::exit(1);
    }

    let source = MaskSource {
        mask_path: cli.mask.as_ref().map(PathBuf::from),
        shapes,
        expand: cli.expand,
    };

    let options = InpaintOptions {
        samples: cli.samples,
        distance_penalty: cli.distance_penalty,
        seed: cli.seed,
        ..InpaintOptions::new(cli.algorithm, cli.patch_size, cli.passes)
    };

    let mut engine = Inpainter::new(options);
    if cli.verbose {
        engine = engine.with_progress(log_progress);
    }

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input);
        process::exit(1);
    }

    info!(
        "algorithm: {} (patch {}, passes {})",
        cli.algorithm, cli.patch_size, cli.passes
    );

    let results = if input_path.is_dir() {
        if source.mask_path.is_some() {
            eprintln!("Error: Batch processing takes --rect/--ellipse shapes, not a mask image");
            process::exit(1);
        }
        let output_dir = if let Some(o) = &cli.output {
            PathBuf::from(o)
        } else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: mask-inpaint <input_dir> -o <output_dir> --rect x,y,w,h");
            process::exit(1);
        };
        engine.process_directory(input_path, &output_dir, &source)
    } else {
        let output_path = match &cli.output {
            Some(o) => PathBuf::from(o),
            None => default_output_path(input_path),
        };
        vec![engine.process_file(input_path, &output_path, &source)]
    };

    let mut success_count = 0u32;
    let mut skip_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, cli.quiet, cli.verbose);
        if r.skipped {
            skip_count += 1;
        } else if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if skip_count > 0 {
            eprint!(", Skipped: {skip_count}");
        }
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn log_progress(phase: Phase, percent: u8) {
    log::debug!("{phase}: {percent}%");
}

fn print_result(result: &ProcessResult, quiet: bool, verbose: bool) {
    if quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.skipped {
        if !quiet {
            eprintln!("[SKIP] {filename}: {}", result.message);
        }
    } else if result.success {
        if !quiet {
            eprintln!("[OK] {filename} ({} px)", result.masked_pixels);
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if verbose && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
    }
}
