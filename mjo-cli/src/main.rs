mod config;
mod error;
mod find;

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use memmap2::Mmap;
use mjo_file::{MjoFile, StringTable, SymbolResolver, SymbolTable};
use mjo_ir::{ControlFlowGraph, Script};

use config::Config;
use error::{CliError, Result, io};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[cfg(target_env = "msvc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "mjo", about = "Majiro .mjo script assembler, disassembler and decompiler")]
struct Cli {
    /// YAML file with default table paths and options
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Symbol table (YAML) used to name hashes
    #[arg(long, global = true)]
    symbols: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Disassemble .mjo files to assembly text
    Disasm {
        /// Paths to .mjo files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the flat listing instead of functions and blocks
        #[arg(long)]
        list: bool,
    },
    /// Assemble text into a .mjo file
    Asm {
        /// Path to the assembly text
        input: PathBuf,
        /// Path of the .mjo file to write
        #[arg(short, long)]
        output: PathBuf,
        /// Externalized-string table for `%{key}` operands
        #[arg(long)]
        strings: Option<PathBuf>,
        /// Encrypt the code blob
        #[arg(long, conflicts_with = "no_encrypt")]
        encrypt: bool,
        /// Write a plain code blob even if the config asks for encryption
        #[arg(long)]
        no_encrypt: bool,
    },
    /// Decompile .mjo files to source text
    Decompile {
        /// Paths to .mjo files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the identifier hash of each name
    Hash {
        #[arg(required = true)]
        names: Vec<String>,
        /// CRC64 instead of the CRC32 used for identifiers
        #[arg(long)]
        crc64: bool,
    },
    /// Show .mjo header and function index
    Info {
        /// Path to the .mjo file
        input: PathBuf,
    },
    /// Find declarations of and references to hashes
    Find {
        /// Hashes to search for, hex, comma-separated
        hashes: String,
        /// A .mjo file, or a directory searched recursively
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Move message text into a string table
    Strings {
        /// Path to the .mjo file
        input: PathBuf,
        /// Table to write (default: the configured table, else stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write the externalized assembly text here
        #[arg(long)]
        asm: Option<PathBuf>,
    },
}

struct Context {
    config: Config,
    resolver: Option<Arc<dyn SymbolResolver>>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let resolver: Option<Arc<dyn SymbolResolver>> = match cli.symbols.as_ref().or(config.symbols.as_ref()) {
        Some(path) => {
            let table = SymbolTable::load(path)?;
            log::debug!("loaded {} symbols from {}", table.len(), path.display());
            Some(Arc::new(table))
        }
        None => None,
    };
    let ctx = Context { config, resolver };

    match cli.command {
        Commands::Disasm { inputs, output, list } => {
            batch(&inputs, output.as_deref(), "mjs", |input| cmd_disasm(&ctx, input, list))
        }
        Commands::Asm {
            input,
            output,
            strings,
            encrypt,
            no_encrypt,
        } => {
            let encrypt = if encrypt || no_encrypt { encrypt } else { ctx.config.encrypt };
            let strings = strings.or_else(|| ctx.config.strings.clone());
            cmd_asm(&input, &output, strings.as_deref(), encrypt)
        }
        Commands::Decompile { inputs, output } => {
            batch(&inputs, output.as_deref(), "txt", |input| cmd_decompile(&ctx, input))
        }
        Commands::Hash { names, crc64 } => cmd_hash(&names, crc64),
        Commands::Info { input } => cmd_info(&ctx, &input),
        Commands::Find { hashes, path } => {
            let hashes = hashes.split(',').map(find::parse_hash).collect::<Result<Vec<_>>>()?;
            cmd_find(&ctx, &hashes, &path)
        }
        Commands::Strings { input, output, asm } => {
            let output = output.or_else(|| ctx.config.strings.clone());
            cmd_strings(&ctx, &input, output.as_deref(), asm.as_deref())
        }
    }
}

fn map_input(path: &Path) -> Result<Mmap> {
    let file = File::open(path).map_err(io(path))?;
    // SAFETY: read-only map; inputs are not expected to change while the
    // command runs.
    unsafe { Mmap::map(&file) }.map_err(io(path))
}

fn load_script(ctx: &Context, path: &Path) -> Result<Script> {
    let map = map_input(path)?;
    let mut script = Script::decode(&map)?;
    if let Some(resolver) = &ctx.resolver {
        script.set_resolver(resolver.clone());
    }
    Ok(script)
}

/// Render every input. A single input fails the command; with several, each
/// failure is reported and the rest still run.
fn batch(inputs: &[PathBuf], output_dir: Option<&Path>, ext: &str, render: impl Fn(&Path) -> Result<String>) -> Result<()> {
    if let Some(dir) = output_dir {
        fs::create_dir_all(dir).map_err(io(dir))?;
    }
    if let [input] = inputs {
        let text = render(input)?;
        return write_output(input, output_dir, ext, &text);
    }

    let mut failed = 0;
    for input in inputs {
        let result = render(input).and_then(|text| write_output(input, output_dir, ext, &text));
        if let Err(e) = result {
            eprintln!("Error: {}: {e}", input.display());
            failed += 1;
        }
    }
    match failed {
        0 => Ok(()),
        n => Err(CliError::Batch(n)),
    }
}

fn write_output(input: &Path, output_dir: Option<&Path>, ext: &str, text: &str) -> Result<()> {
    match output_dir {
        Some(dir) => {
            let name = input.file_stem().unwrap_or(input.as_os_str());
            let path = dir.join(name).with_extension(ext);
            fs::write(&path, text).map_err(io(&path))
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn cmd_disasm(ctx: &Context, path: &Path, list: bool) -> Result<String> {
    let mut script = load_script(ctx, path)?;
    if list {
        return match &script {
            Script::InstructionList(l) => Ok(mjo_asm::print_list(l)?),
            other => Err(CliError::UnexpectedState(other.representation())),
        };
    }
    script.to_control_flow_graph()?;
    Ok(mjo_asm::print_script(&script)?)
}

fn cmd_asm(input: &Path, output: &Path, strings: Option<&Path>, encrypt: bool) -> Result<()> {
    let map = map_input(input)?;
    let text = std::str::from_utf8(&map).map_err(|_| CliError::NotText(input.to_path_buf()))?;
    let mut script = mjo_asm::parse(text)?;
    if let (Some(path), Some(meta)) = (strings, script.meta_mut()) {
        meta.strings = StringTable::load(path)?;
    }
    script.internalize_strings()?;
    script.to_instruction_list()?;
    if let Some(meta) = script.meta_mut() {
        meta.encrypted = encrypt;
    }
    let bytes = script.encode()?;
    fs::write(output, &bytes).map_err(io(output))?;
    log::info!("wrote {} bytes to {}", bytes.len(), output.display());
    Ok(())
}

fn cmd_decompile(ctx: &Context, path: &Path) -> Result<String> {
    let mut script = load_script(ctx, path)?;
    script.to_control_flow_graph()?;
    script.to_ssa_graph()?;
    mjo_decompiler::decompile_script(&mut script)?;
    match &script {
        Script::SyntaxTree(tree) => Ok(mjo_decompiler::emit_tree(tree)),
        other => Err(CliError::UnexpectedState(other.representation())),
    }
}

fn cmd_hash(names: &[String], crc64: bool) -> Result<()> {
    for name in names {
        let bytes = mjo_isa::sjis::encode(name).ok_or_else(|| CliError::Unhashable(name.clone()))?;
        if crc64 {
            println!("{:016x} {name}", mjo_isa::crc::hash64(&bytes));
        } else {
            println!("${:08x} {name}", mjo_isa::crc::hash32(&bytes));
        }
    }
    Ok(())
}

fn cmd_info(ctx: &Context, path: &Path) -> Result<()> {
    let map = map_input(path)?;
    let file = MjoFile::parse(&map)?;
    let name = |hash: u32| {
        ctx.resolver
            .as_deref()
            .and_then(|r| r.resolve(hash))
            .map(|n| format!(" {n}"))
            .unwrap_or_default()
    };
    let code_size: u32 = file.instructions.iter().filter_map(|i| i.size).sum();
    let unverified = file.instructions.iter().filter(|i| i.opcode.unverified).count();

    println!("=== MJO File Info ===");
    println!("Encrypted:        {}", if file.encrypted { "yes" } else { "no" });
    println!("Read mark:        {}", file.read_mark_size());
    match file.entry_function() {
        Some(entry) => println!("Entry point:      ${:08x}{}", entry.hash, name(entry.hash)),
        None => println!("Entry point:      {:#x} (not indexed)", file.entry_offset),
    }
    println!("Functions:        {}", file.functions.len());
    println!("Instructions:     {}", file.instructions.len());
    println!("Unverified ops:   {unverified}");
    println!("Code size:        {code_size} bytes");
    for f in &file.functions {
        println!("  ${:08x} {:#06x}{}", f.hash, f.offset, name(f.hash));
    }
    Ok(())
}

fn cmd_find(ctx: &Context, hashes: &[u32], path: &Path) -> Result<()> {
    let files = find::script_files(path)?;
    if files.is_empty() {
        log::info!("no .mjo files under {}", path.display());
        return Ok(());
    }
    let name = |hash: u32| {
        ctx.resolver
            .as_deref()
            .and_then(|r| r.resolve(hash))
            .map(|n| format!(" {n}"))
            .unwrap_or_default()
    };

    let mut failed = 0;
    for file in &files {
        let shown = file.strip_prefix(path).ok().filter(|p| !p.as_os_str().is_empty()).unwrap_or(file.as_path());
        let graph = match load_graph(ctx, file) {
            Ok(graph) => graph,
            Err(e) => {
                eprintln!("Error: {}: {e}", file.display());
                failed += 1;
                continue;
            }
        };
        let mut header = false;
        for function in &graph.functions {
            let found = find::references(function, hashes);
            if found.is_empty() {
                continue;
            }
            if !header {
                println!("{}:", shown.display());
                header = true;
            }
            println!("  ${:08x}{}", function.hash, name(function.hash));
            for reference in found {
                let target = reference.target().map(&name).unwrap_or_default();
                println!("    {reference}{target}");
            }
        }
    }
    match failed {
        0 => Ok(()),
        n => Err(CliError::Batch(n)),
    }
}

fn load_graph(ctx: &Context, path: &Path) -> Result<ControlFlowGraph> {
    let mut script = load_script(ctx, path)?;
    script.to_control_flow_graph()?;
    match script {
        Script::ControlFlowGraph(graph) => Ok(graph),
        other => Err(CliError::UnexpectedState(other.representation())),
    }
}

fn cmd_strings(ctx: &Context, path: &Path, output: Option<&Path>, asm: Option<&Path>) -> Result<()> {
    let mut script = load_script(ctx, path)?;
    script.to_control_flow_graph()?;
    let moved = script.externalize_strings()?;
    log::info!("externalized {moved} strings from {}", path.display());

    if let Some(asm) = asm {
        let text = mjo_asm::print_script(&script)?;
        fs::write(asm, text).map_err(io(asm))?;
    }
    let Some(meta) = script.meta() else {
        return Err(CliError::UnexpectedState(script.representation()));
    };
    match output {
        Some(out) => meta.strings.save(out)?,
        None => print!("{}", meta.strings.to_yaml()?),
    }
    Ok(())
}
