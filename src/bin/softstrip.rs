use clap::{Parser, Subcommand};
use softstrip::config::WireOrder;
use softstrip::tools::synth::{StripContent, StripLayout, render_strip};
use softstrip::tools::{load_strip, strip_paths, strip_stats};
use softstrip::utils::binarization::DEFAULT_THRESHOLD;
use softstrip::{DecoderConfig, Pipeline, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "softstrip", version, about = "Cauzin Softstrip decoder")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode the strips of one file, in order
    Decode {
        /// Strip images, or directories of strip images
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// JSON decoder configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the decoded file here under its strip filename
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Binarization threshold; pixels above it are white
        #[arg(long, default_value_t = DEFAULT_THRESHOLD, conflicts_with = "otsu")]
        threshold: u8,
        /// Binarize with Otsu's threshold instead
        #[arg(long)]
        otsu: bool,
    },
    /// Render text as a single synthetic strip
    Render {
        #[arg(long)]
        text: String,
        #[arg(long)]
        filename: String,
        #[arg(long)]
        out: PathBuf,
        /// Data nibbles per row
        #[arg(long, default_value_t = 4)]
        nibbles: usize,
        /// Pixels per unit
        #[arg(long, default_value_t = 4)]
        unit_width: u32,
        /// Pack bytes least significant bit first
        #[arg(long)]
        lsb_first: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Decode {
            images,
            config,
            out_dir,
            threshold,
            otsu,
        } => decode_cmd(
            &images,
            config.as_deref(),
            out_dir.as_deref(),
            (!otsu).then_some(threshold),
        ),
        Command::Render {
            text,
            filename,
            out,
            nibbles,
            unit_width,
            lsb_first,
        } => {
            let layout = StripLayout {
                nibbles,
                unit_width,
                ..StripLayout::default()
            };
            let order = if lsb_first {
                WireOrder::LsbFirst
            } else {
                WireOrder::MsbFirst
            };
            render_cmd(&text, &filename, &out, &layout, order)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn decode_cmd(
    images: &[PathBuf],
    config: Option<&Path>,
    out_dir: Option<&Path>,
    threshold: Option<u8>,
) -> Result<()> {
    let config = match config {
        Some(path) => DecoderConfig::from_file(path)?,
        None => DecoderConfig::default(),
    }
    .with_env_overrides();
    let pipeline = Pipeline::new(config)?;

    let paths = strip_paths(images);
    let mut strips = Vec::with_capacity(paths.len());
    for path in &paths {
        let strip = load_strip(path, threshold)?;
        let stats = strip_stats(&strip);
        println!(
            "Strip: {} ({}x{}), grayscale {}-{} avg {}, black {:.1}%",
            path.display(),
            strip.gray().width(),
            strip.gray().height(),
            stats.min,
            stats.max,
            stats.avg,
            stats.black_ratio * 100.0
        );
        strips.push(strip);
    }

    let start = Instant::now();
    let file = pipeline.decode_file(&strips)?;
    println!("Decoded {} strips in {:.2?}", file.strips.len(), start.elapsed());
    for (report, path) in file.strips.iter().zip(&paths) {
        println!("{}:", path.display());
        println!("{}", report.header);
        println!(
            " Checksum: {}",
            if report.checksum_valid { "ok" } else { "INVALID" }
        );
    }
    println!("File data: {} bytes", file.data.len());

    match out_dir {
        Some(dir) => {
            let written = file.write_to_dir(dir)?;
            println!("Wrote {}", written.display());
        }
        None => println!("{}", String::from_utf8_lossy(&file.data)),
    }
    Ok(())
}

fn render_cmd(
    text: &str,
    filename: &str,
    out: &Path,
    layout: &StripLayout,
    order: WireOrder,
) -> Result<()> {
    let content = StripContent::single_file(filename, text.as_bytes());
    let strip = render_strip(&content, layout, order)?;
    strip.gray().save(out)?;
    println!(
        "Rendered {} bytes into {} ({}x{})",
        text.len(),
        out.display(),
        strip.gray().width(),
        strip.gray().height()
    );
    Ok(())
}
