use std::path::Path;

use clap::{App, Arg};

use tau::{Error, FileDisk, FileSystem, MountKind, Result};

mod logging;

fn main() {
    logging::init();
    let matches = App::new("tau")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Mounts a tau disk image, building a fresh filesystem if none is found")
        .arg(
            Arg::with_name("device")
                .value_name("DEVICE")
                .help("Disk image to mount")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("mountpoint")
                .value_name("MOUNTPOINT")
                .help("Directory to serve the filesystem on (needs the `fuse` feature)")
                .index(2),
        )
        .arg(
            Arg::with_name("format-size")
                .long("format-size")
                .value_name("BYTES")
                .help("Create the image with this size if it does not exist")
                .takes_value(true),
        )
        .get_matches();

    let device = matches.value_of("device").unwrap_or_default();
    if let Err(e) = run(device, matches.value_of("mountpoint"), matches.value_of("format-size")) {
        log::error!("{}", e);
        eprintln!("tau: {}", e);
        std::process::exit(1);
    }
}

fn open_device(path: &str, format_size: Option<&str>) -> Result<FileDisk> {
    match format_size {
        Some(size) if !Path::new(path).exists() => {
            let size = size
                .parse::<u64>()
                .map_err(|_| Error::InvalidArgument("--format-size expects a byte count"))?;
            log::info!("creating image {} of {} bytes", path, size);
            FileDisk::create(path, size)
        }
        _ => FileDisk::open(path),
    }
}

fn run(device: &str, mountpoint: Option<&str>, format_size: Option<&str>) -> Result<()> {
    let fs = FileSystem::mount(open_device(device, format_size)?)?;
    if fs.mount_kind() == MountKind::Built {
        log::info!("built a new filesystem on {}", device);
    }

    match mountpoint {
        Some(mountpoint) => serve(fs, mountpoint),
        None => {
            print!("{}", fs.dump());
            fs.unmount().map(|_| ())
        }
    }
}

#[cfg(feature = "fuse")]
fn serve(fs: FileSystem<FileDisk>, mountpoint: &str) -> Result<()> {
    log::info!("serving on {}", mountpoint);
    tau::fuse::serve(fs, mountpoint)?;
    Ok(())
}

#[cfg(not(feature = "fuse"))]
fn serve(fs: FileSystem<FileDisk>, mountpoint: &str) -> Result<()> {
    log::warn!("built without the `fuse` feature; not serving on {}", mountpoint);
    print!("{}", fs.dump());
    fs.unmount().map(|_| ())
}
