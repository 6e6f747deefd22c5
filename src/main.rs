use std::env;
use std::fs::File;

use anyhow::Context;
use log::{debug, error, info, warn, LevelFilter};
use structopt::StructOpt;

mod cli;

use espack::esp32::image::AppImage;
use espack::manifest::Manifest;
use espack::ComponentSet;

fn postbuild(opts: &cli::PostbuildOpts) -> Result<(), anyhow::Error> {
    debug!("Using build directory {}", opts.build_dir.display());
    debug!("Using project directory {}", opts.project_dir.display());

    let components = ComponentSet::for_project(&opts.project_dir, opts.name.as_deref());

    espack::extract::extract_components(&opts.build_dir, &components)
        .with_context(|| "Failed to extract firmware components")?;

    // A failed merge must not fail the build
    if let Err(err) = espack::merge::merge_components(&components) {
        warn!("Skipping merged image: {}", err);
    }

    if opts.manifest {
        let manifest = Manifest::for_components(&components);

        espack::manifest::write_manifest(&components, &manifest)
            .with_context(|| "Failed to write manifest")?;
    }

    info!("Firmware extraction completed successfully");

    Ok(())
}

fn extract(opts: &cli::ExtractOpts) -> Result<(), anyhow::Error> {
    let components = ComponentSet::for_project(&opts.project_dir, opts.name.as_deref());

    espack::extract::extract_components(&opts.build_dir, &components)
        .with_context(|| "Failed to extract firmware components")?;

    Ok(())
}

fn merge(opts: &cli::MergeOpts) -> Result<(), anyhow::Error> {
    let components = ComponentSet::for_project(&opts.project_dir, opts.name.as_deref());

    espack::merge::merge_components(&components)
        .with_context(|| "Failed to merge firmware components")?;

    Ok(())
}

fn manifest(opts: &cli::ManifestOpts) -> Result<(), anyhow::Error> {
    let components = ComponentSet::for_project(&opts.project_dir, opts.name.as_deref());

    let mut manifest = if opts.merged {
        Manifest::for_merged(&components)
    } else {
        Manifest::for_components(&components)
    };

    manifest.version = opts.version.clone();

    if opts.prompt_erase {
        manifest.new_install_prompt_erase = Some(true);
    }

    espack::manifest::write_manifest(&components, &manifest)
        .with_context(|| "Failed to write manifest")?;

    Ok(())
}

fn image_info(opts: &cli::InfoOpts) -> Result<(), anyhow::Error> {
    let mut file = File::open(&opts.filename)
        .with_context(|| format!("Failed to open '{}'", opts.filename.display()))?;

    let image = AppImage::from_reader(&mut file).with_context(|| {
        format!(
            "Failed to parse application image '{}'",
            opts.filename.display()
        )
    })?;

    match image.chip() {
        Some(chip) => println!("Chip: {}", chip),
        None => println!("Chip: unknown ({:#06x})", image.chip_id),
    }

    println!("Minimum chip revision: {}", image.min_chip_rev);
    println!("SPI mode: {}", image.spi_mode);
    println!("Flash frequency: {}", image.flash_frequency);
    println!("Flash size: {}", image.flash_size);
    println!("Entry point: {:#010x}", image.entry_addr);
    println!("Segments:");

    for segment in &image.segments {
        println!("  {:#010x} ({} bytes)", segment.addr, segment.size);
    }

    if image.checksum_valid {
        println!("Checksum: {:#04x} (valid)", image.checksum);
    } else {
        println!("Checksum: {:#04x} (INVALID)", image.checksum);
    }

    match image.hash_valid {
        Some(true) => println!("SHA-256: appended, valid"),
        Some(false) => println!("SHA-256: appended, MISMATCH"),
        None => println!("SHA-256: not appended"),
    }

    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    use cli::Command;

    // Create a logger with a timestamp that logs everything at Info level or above
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.filter_level(LevelFilter::Info);

    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder.init();

    // Parse the command-line arguments
    let opts = cli::Opts::from_args();

    match &opts.command {
        Command::Postbuild(postbuild_opts) => {
            // The build must carry on even when packaging fails
            if let Err(err) = postbuild(postbuild_opts) {
                error!("Post-build processing failed: {:?}", err);
            }
        }
        Command::Extract(extract_opts) => extract(extract_opts)?,
        Command::Merge(merge_opts) => merge(merge_opts)?,
        Command::Manifest(manifest_opts) => manifest(manifest_opts)?,
        Command::Info(info_opts) => image_info(info_opts)?,
    }

    Ok(())
}
