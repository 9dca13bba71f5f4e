#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]

use anyhow::{Context, Result, bail};
use cli::{AddCommand, App, Command, FormatCommand};
use log::LevelFilter;
use std::{
    fs::File,
    path::Path,
    process::ExitCode,
};
use storage::{
    device::open_target,
    fat::{self, Batch, FormatOptions, SECTOR_SIZE},
};

mod cli;
mod logger;

fn main() -> ExitCode {
    let app: App = argh::from_env();

    let level = if app.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(err) = logger::init(level) {
        eprintln!("cannot install logger: {err}");
    }

    match run(app.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Info(info) => {
            let mut image = open_target(&info.image)?;
            let (bpb, geometry) = fat::read_geometry(&mut image)
                .with_context(|| format!("cannot read {}", info.image.display()))?;
            let boot_sector = fat::bs::BootSector::read(&mut image)?;
            let free = fat::fat::count_free_clusters(&mut image, &geometry)?;

            println!("{}", geometry.summary(&bpb));
            println!(
                "Volume {:04X}-{:04X} \"{}\" ({})",
                boot_sector.volume_id() >> 16,
                boot_sector.volume_id() & 0xFFFF,
                String::from_utf8_lossy(&boot_sector.volume_label()).trim_end(),
                String::from_utf8_lossy(&boot_sector.fs_type()).trim_end()
            );
            println!(
                "{free} free clusters ({} bytes)",
                u64::from(free) * u64::from(geometry.bytes_per_cluster())
            );
        }
        Command::List(list) => {
            let mut image = open_target(&list.image)?;
            let (_, geometry) = fat::read_geometry(&mut image)
                .with_context(|| format!("cannot read {}", list.image.display()))?;
            for (index, entry) in fat::dir::list_root_dir(&mut image, &geometry)? {
                println!(
                    "#{index:<4} {:<12} {:>10} bytes  cluster {}",
                    entry.file_name(),
                    entry.size(),
                    entry.first_cluster()
                );
            }
        }
        Command::Add(add) => add_files(&add)?,
        Command::Format(format) => format_image(&format)?,
    }
    Ok(())
}

fn add_files(add: &AddCommand) -> Result<()> {
    if add.files.is_empty() {
        bail!("no file to add");
    }
    let count = u16::try_from(add.files.len()).context("too many files")?;

    let mut image = open_target(&add.image)?;
    let mut batch = Batch::reserve(&mut image, count)
        .with_context(|| format!("cannot prepare {}", add.image.display()))?;
    log::debug!("{}", batch.geometry().summary(batch.bpb()));

    for path in &add.files {
        let mut source =
            File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        let metadata = source
            .metadata()
            .with_context(|| format!("cannot stat {}", path.display()))?;
        if metadata.is_dir() {
            bail!("{} is a directory", path.display());
        }
        let name = file_name(path)?;

        batch
            .inject(&mut source, metadata.len(), &name)
            .with_context(|| format!("cannot add {}", path.display()))?;
    }

    batch.finish()?;
    Ok(())
}

fn format_image(format: &FormatCommand) -> Result<()> {
    if !format.image.exists() {
        let sectors = format
            .sectors
            .context("--sectors is required to create a new image")?;
        File::create(&format.image)
            .and_then(|file| file.set_len(sectors * SECTOR_SIZE as u64))
            .with_context(|| format!("cannot create {}", format.image.display()))?;
    }

    let mut options = FormatOptions::default();
    if let Some(sectors) = format.sectors {
        options = options.with_total_sectors(sectors);
    }
    if let Some(label) = &format.label {
        options = options.with_volume_label(label);
    }
    if let Some(volume_id) = format.volume_id {
        options = options.with_volume_id(volume_id);
    }

    let mut image = open_target(&format.image)?;
    let formatted = fat::format_volume(&mut image, &options)
        .with_context(|| format!("cannot format {}", format.image.display()))?;
    println!(
        "Volume {:04X}-{:04X}: {} bytes available",
        formatted.volume_id() >> 16,
        formatted.volume_id() & 0xFFFF,
        formatted.data_bytes()
    );
    Ok(())
}

/// Returns the last component of `path`, lossily converted to UTF-8.
fn file_name(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok(name.to_string_lossy().into_owned())
}
