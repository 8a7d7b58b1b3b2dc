//! Fill a rectangle of an image.
//!
//! Usage:
//! ```sh
//! cargo run --example inpaint_rect -- input.png output.png 40,40,60,20
//! ```

use std::env;
use std::process;

use mask_inpaint::{InpaintOptions, Inpainter, MaskSource, Region, Shape};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <input> <output> <x,y,w,h>", args[0]);
        process::exit(1);
    }

    let input = &args[1];
    let output = &args[2];
    let region: Region = args[3].parse().expect("invalid rectangle");

    let engine = Inpainter::new(InpaintOptions::default());
    let source = MaskSource {
        shapes: vec![Shape::Rect(region)],
        ..MaskSource::default()
    };
    let result = engine.process_file(input.as_ref(), output.as_ref(), &source);

    if result.skipped {
        println!("Skipped: {}", result.message);
    } else if result.success {
        println!("Done: {}", result.message);
    } else {
        eprintln!("Error: {}", result.message);
        process::exit(1);
    }
}
