use clap::Parser;
use std::path::{Path, PathBuf};
use z64dec::codec::{CodecError, CodecId};

#[derive(Parser)]
#[command(
    name = "z64dec",
    about = "Decompress a Zelda64 rom image, or one of its packed assets"
)]
struct Cli {
    /// Input rom (or compressed file with --individual)
    input: PathBuf,

    /// Output path; defaults to the input name with `.decompressed` inserted
    /// before the extension
    output: Option<PathBuf>,

    /// Manually choose the decompression codec: yaz, lzo, ucl, aplib, lz4
    #[arg(short, long)]
    codec: Option<String>,

    /// Decompress a single compressed file rather than a full rom
    #[arg(short, long)]
    individual: bool,

    /// Accept a rom built with the dma-ext table extension
    #[arg(short, long)]
    dma_ext: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.individual && cli.dma_ext {
        return Err("--dma-ext cannot be used with individual files".into());
    }

    let codec = match &cli.codec {
        Some(name) => Some(
            CodecId::from_name(name).ok_or_else(|| CodecError::UnknownName(name.clone()))?,
        ),
        None => None,
    };

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_outname(&cli.input));

    let comp = std::fs::read(&cli.input)?;

    let dec = if cli.individual {
        z64dec::decompress_file(&comp, codec)?
    } else {
        z64dec::decompress_rom(&comp, codec)?
    };

    std::fs::write(&output, &dec)?;
    eprintln!("decompressed '{}' written successfully", output.display());

    Ok(())
}

/// "rom.z64" becomes "rom.decompressed.z64".
fn default_outname(input: &Path) -> PathBuf {
    match input.extension() {
        Some(ext) => input.with_extension(format!("decompressed.{}", ext.to_string_lossy())),
        None => input.with_extension("decompressed"),
    }
}
