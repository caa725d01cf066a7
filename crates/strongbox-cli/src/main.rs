//! Command-line front-end: image creation and an interactive shell.

use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use strongbox_core::container::{self, ContainerOptions};
use strongbox_core::{
    FolderRemovalMode, OpenDisposition, ProgressEvent, ProgressSink, Strongbox, StrongboxError,
};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "strongbox")]
#[command(about = "Encrypted single-file virtual filesystem")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new container image
    #[command(name = "make_image")]
    MakeImage {
        /// Path of the image file to create
        path: PathBuf,
        /// Size of the filesystem in blocks
        block_count: u64,
        /// Place the root folder on a secret block (prompted for)
        #[arg(long)]
        magic: bool,
    },
    /// Open an interactive shell on an existing image
    #[command(name = "shell")]
    Shell {
        /// Path of the image file to open
        path: PathBuf,
        /// Mount the alternative sub-volume (root block prompted for)
        #[arg(long)]
        magic: bool,
    },
}

fn console_sink() -> ProgressSink {
    Arc::new(|event| {
        let mut out = std::io::stdout();
        match event {
            ProgressEvent::KeyGenBegin => {
                print!("deriving key (this may take a few seconds)...");
                let _ = out.flush();
            }
            ProgressEvent::KeyGenEnd => println!(" done"),
            ProgressEvent::BigCipherBuildBegin => {
                print!("building cipher stream");
                let _ = out.flush();
            }
            ProgressEvent::CipherBuildUpdate => {
                print!(".");
                let _ = out.flush();
            }
            ProgressEvent::BigCipherBuildEnd => println!(" done"),
        }
    })
}

fn prompt_magic_block() -> Result<u64, String> {
    let answer = rpassword::prompt_password("magic number: ")
        .map_err(|e| format!("could not read magic number: {e}"))?;
    answer
        .trim()
        .parse::<u64>()
        .map_err(|_| "magic number must be a block index".to_string())
}

fn options_for(magic: bool) -> Result<ContainerOptions, String> {
    let mut opts = ContainerOptions {
        sink: console_sink(),
        ..ContainerOptions::default()
    };
    if magic {
        opts.root_block = prompt_magic_block()?;
    }
    Ok(opts)
}

fn run(args: Args) -> Result<(), String> {
    match args.command {
        Command::MakeImage {
            path,
            block_count,
            magic,
        } => {
            let opts = options_for(magic)?;
            let password = rpassword::prompt_password("password: ")
                .map_err(|e| format!("could not read password: {e}"))?;
            let engine = container::create(&path, password.as_bytes(), block_count, opts)
                .map_err(|e| format!("could not create image: {e}"))?;
            engine
                .close()
                .map_err(|e| format!("could not flush image: {e}"))?;
            println!("created {} ({} blocks)", path.display(), block_count);
            Ok(())
        }
        Command::Shell { path, magic } => {
            let opts = options_for(magic)?;
            let password = rpassword::prompt_password("password: ")
                .map_err(|e| format!("could not read password: {e}"))?;
            let engine = container::open(&path, password.as_bytes(), opts)
                .map_err(|e| format!("could not open image: {e}"))?;
            shell_loop(engine)
        }
    }
}

fn resolve(cwd: &str, arg: &str) -> String {
    if arg.starts_with('/') {
        arg.to_string()
    } else if cwd.ends_with('/') {
        format!("{cwd}{arg}")
    } else {
        format!("{cwd}/{arg}")
    }
}

fn com_ls(engine: &Strongbox, path: &str) {
    match engine.list_folder(path) {
        Ok(entries) => {
            for info in entries {
                match info.entry_type {
                    strongbox_core::EntryType::Folder => println!("{}/", info.filename),
                    strongbox_core::EntryType::File => {
                        println!("{}  {} bytes", info.filename, info.size)
                    }
                }
            }
        }
        Err(e) => println!("ls: {e}"),
    }
}

fn com_rm(engine: &Strongbox, path: &str) {
    let outcome = match engine.folder_exists(path) {
        Ok(true) => engine.remove_folder(path, FolderRemovalMode::Recursive),
        Ok(false) => engine.remove_file(path),
        Err(e) => Err(e),
    };
    if let Err(e) = outcome {
        println!("rm: {e}");
    }
}

fn com_extract(engine: &Strongbox, path: &str, dest: Option<&str>) {
    let Some(dest) = dest else {
        println!("extract: expected a destination directory");
        return;
    };
    match strongbox_core::extract_folder(engine, path, Path::new(dest)) {
        Ok(()) => println!("extracted {path} to {dest}"),
        Err(e) => println!("extract: {e}"),
    }
}

fn com_add(engine: &Strongbox, cwd: &str, resource: &str) {
    let Some(host_path) = resource.strip_prefix("file://") else {
        println!("add: expected file://<host-path>");
        return;
    };
    let Some(name) = Path::new(host_path).file_name().and_then(|n| n.to_str()) else {
        println!("add: {host_path} has no usable filename");
        return;
    };
    let dest = resolve(cwd, name);
    let outcome = (|| -> Result<u64, StrongboxError> {
        let mut source = std::fs::File::open(host_path)?;
        engine.add_file(&dest)?;
        let mut device = engine.open_file(&dest, OpenDisposition::write_only())?;
        let copied = std::io::copy(&mut source, &mut device)?;
        device.flush()?;
        Ok(copied)
    })();
    match outcome {
        Ok(copied) => println!("added {dest} ({copied} bytes)"),
        Err(e) => println!("add: {e}"),
    }
}

fn shell_loop(engine: Strongbox) -> Result<(), String> {
    let stdin = std::io::stdin();
    let mut cwd = String::from("/");
    loop {
        print!("strongbox:{cwd}> ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("could not read command: {e}")),
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            continue;
        };
        debug!(command, "shell command");
        match (command, tokens.get(1)) {
            ("exit" | "quit", _) => break,
            ("pwd", _) => println!("{cwd}"),
            ("ls", arg) => {
                let path = arg.map(|a| resolve(&cwd, a)).unwrap_or_else(|| cwd.clone());
                com_ls(&engine, &path);
            }
            ("cd", Some(arg)) => {
                let path = resolve(&cwd, arg);
                match engine.folder_exists(&path) {
                    Ok(true) => cwd = path,
                    Ok(false) => println!("cd: no such folder: {path}"),
                    Err(e) => println!("cd: {e}"),
                }
            }
            ("mkdir", Some(arg)) => {
                if let Err(e) = engine.add_folder(&resolve(&cwd, arg)) {
                    println!("mkdir: {e}");
                }
            }
            ("rm", Some(arg)) => com_rm(&engine, &resolve(&cwd, arg)),
            ("add", Some(arg)) => com_add(&engine, &cwd, arg),
            ("extract", Some(arg)) => {
                com_extract(&engine, &resolve(&cwd, arg), tokens.get(2).copied());
            }
            ("cd" | "mkdir" | "rm" | "add" | "extract", None) => {
                println!("{command}: missing operand");
            }
            _ => {
                println!(
                    "commands: ls [path], pwd, cd <path>, mkdir <path>, rm <path>, \
                     add file://<host-path>, extract <path> <host-dir>, exit"
                );
            }
        }
    }
    engine
        .close()
        .map_err(|e| format!("could not flush image: {e}"))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}
