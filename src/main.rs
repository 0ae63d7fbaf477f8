use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;

use rmfile::{
    BUFFER_POOL_SIZE, BufferManager, MAX_OPEN_FILES, PagedFileManager, RecordFileHeader,
    RecordFileManager,
};

#[derive(Parser)]
#[command(name = "rmfile", about = "Create, inspect and destroy fixed-size record files")]
struct Cli {
    /// Buffer pool capacity in pages
    #[arg(long, default_value_t = BUFFER_POOL_SIZE)]
    pool_size: usize,

    /// Maximum number of simultaneously open files
    #[arg(long, default_value_t = MAX_OPEN_FILES)]
    max_files: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a record file with a fixed record size
    Create {
        path: PathBuf,
        #[arg(long)]
        record_size: usize,
    },
    /// Print the header of a record file
    Info {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Delete a record file
    Destroy { path: PathBuf },
}

#[derive(Serialize)]
struct FileInfo<'a> {
    path: &'a Path,
    records_per_page: usize,
    header: RecordFileHeader,
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let file_manager = PagedFileManager::with_max_files(cli.max_files);
    let storage = BufferManager::with_capacity(file_manager, cli.pool_size);
    let mut manager = RecordFileManager::new(storage);

    match cli.command {
        Command::Create { path, record_size } => {
            manager.create_file(&path, record_size)?;
            println!("created {} (record size {})", path.display(), record_size);
        }
        Command::Info { path, json } => {
            let handle = manager.open_file(&path)?;
            let info = FileInfo {
                path: &path,
                records_per_page: handle.records_per_page(),
                header: *handle.header(),
            };
            manager.close_file(handle)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("file:             {}", path.display());
                println!("record size:      {}", info.header.record_size());
                println!("records per page: {}", info.records_per_page);
            }
        }
        Command::Destroy { path } => {
            manager.destroy_file(&path)?;
            println!("destroyed {}", path.display());
        }
    }

    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
