use clap::{Args, Parser, Subcommand};
use eeprom_id::block::BlockPayload;
use eeprom_id::io_stream::{self, EepromReader, EepromWriter};
use eeprom_id::{report, EepromRecord, ProductArgs, ProductConfig};
use log::{info, warn};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "eeprom-id", version, about = "Identity EEPROM configuration tool")]
struct Cli {
    /// Directory holding the per-product JSON tables
    #[arg(long, global = true, default_value = "configs")]
    config_dir: PathBuf,
    /// Product table to use instead of <config-dir>/<product>.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct Product {
    /// Module name, e.g. PCM-066 or PFL-G-01
    #[arg(long)]
    som: Option<String>,
    /// Kit name, e.g. KSP-0300 (or KSP-08 next to --som)
    #[arg(long)]
    ksx: Option<String>,
    /// Option id of a flex module, e.g. PT003
    #[arg(long)]
    id:  Option<String>,
}

#[derive(Args, Clone)]
struct Build {
    /// Kit options from the option tree
    #[arg(long)]
    kit: String,
    /// PCB revision, e.g. 3 or 3a
    #[arg(long)]
    pcb: String,
    /// BOM revision, e.g. A0
    #[arg(long)]
    bom: String,
    /// Option-tree revision (defaults to the product table)
    #[arg(long)]
    opt: Option<u8>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the product configuration from an EEPROM device or image file
    Read {
        #[command(flatten)]
        product: Product,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Write a product configuration to the EEPROM device
    Write {
        #[command(flatten)]
        product: Product,
        #[command(flatten)]
        build: Build,
        /// Do not ask before flashing
        #[arg(short = 'y')]
        yes: bool,
    },
    /// Create an image file that can be flashed with dd or via JTAG
    Create {
        #[command(flatten)]
        product: Product,
        #[command(flatten)]
        build: Build,
        /// Output file (default: output/<product name>)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Print a product configuration without touching any device
    Display {
        #[command(flatten)]
        product: Product,
        #[command(flatten)]
        build: Build,
    },
    /// Add a MAC address block to an image file or EEPROM device
    AddMac {
        /// Ethernet interface number
        interface: u16,
        /// MAC address in XX:XX:XX:XX:XX:XX format
        mac: String,
        #[command(flatten)]
        product: Product,
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[arg(short = 'y')]
        yes: bool,
    },
    /// Print the MAC address block of an Ethernet interface
    ReadMac {
        interface: u8,
        #[command(flatten)]
        product: Product,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Add a key-value block to an image file or EEPROM device
    AddKeyValue {
        key:   String,
        value: String,
        #[command(flatten)]
        product: Product,
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[arg(short = 'y')]
        yes: bool,
    },
    /// Print the key-value block of a key
    ReadKeyValue {
        key: String,
        #[command(flatten)]
        product: Product,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() -> CliResult<()> {
    env_logger::init();
    let cli = Cli::parse();
    let tables = Tables { dir: cli.config_dir, explicit: cli.config };

    match cli.command {

        // ── Display / Create / Write ─────────────────────────────────────────
        Commands::Display { product, build } => {
            let config = tables.load(&product, None)?;
            let record = product_args(&product, &build).build(&config)?;
            print!("{}", report::render(&record, Some(&config))?);
        }

        Commands::Create { product, build, file } => {
            let config = tables.load(&product, None)?;
            let args = product_args(&product, &build);
            let record = args.build(&config)?;
            let path = match file {
                Some(path) => path,
                None => {
                    std::fs::create_dir_all("output")?;
                    Path::new("output").join(args.file_name(&record))
                }
            };
            save_file(&path, &record, &config)?;
            print!("{}", report::render(&record, Some(&config))?);
            println!("Created: {}", path.display());
        }

        Commands::Write { product, build, yes } => {
            let config = tables.load(&product, None)?;
            let record = product_args(&product, &build).build(&config)?;
            flash(&record, &config, yes)?;
            print!("{}", report::render(&record, Some(&config))?);
        }

        // ── Read ─────────────────────────────────────────────────────────────
        Commands::Read { product, file } => {
            let config = tables.load(&product, file.as_deref())?;
            let record = load(&config, file.as_deref())?;
            print!("{}", report::render(&record, Some(&config))?);
        }

        // ── Blocks ───────────────────────────────────────────────────────────
        Commands::AddMac { interface, mac, product, file, yes } => {
            let config = tables.load(&product, file.as_deref())?;
            let mut record = load_v3(&config, file.as_deref(), "MAC blocks")?;
            record.add_mac_block(interface, &mac)?;
            store(&record, &config, file.as_deref(), yes)?;
            print!("{}", report::render(&record, Some(&config))?);
        }

        Commands::ReadMac { interface, product, file } => {
            let config = tables.load(&product, file.as_deref())?;
            let record = load_v3(&config, file.as_deref(), "MAC blocks")?;
            let block = record
                .blocks()
                .iter()
                .find(|b| matches!(b.payload(), BlockPayload::Mac(m) if m.interface == interface))
                .ok_or_else(|| format!("No MAC found for Ethernet interface {interface}"))?;
            println!("{block}");
        }

        Commands::AddKeyValue { key, value, product, file, yes } => {
            let config = tables.load(&product, file.as_deref())?;
            let mut record = load_v3(&config, file.as_deref(), "Key-value blocks")?;
            record.add_key_value_block(&key, &value)?;
            store(&record, &config, file.as_deref(), yes)?;
            print!("{}", report::render(&record, Some(&config))?);
        }

        Commands::ReadKeyValue { key, product, file } => {
            let config = tables.load(&product, file.as_deref())?;
            let record = load_v3(&config, file.as_deref(), "Key-value blocks")?;
            let block = record
                .blocks()
                .iter()
                .find(|b| matches!(b.payload(), BlockPayload::KeyValue(kv) if kv.key == key))
                .ok_or_else(|| format!("No key found for {key}"))?;
            println!("{block}");
        }
    }
    Ok(())
}

// ── Product tables ───────────────────────────────────────────────────────────

struct Tables {
    dir:      PathBuf,
    explicit: Option<PathBuf>,
}

impl Tables {
    /// Load the table named by `--config`, by the product arguments, or by
    /// the product found in `file`.
    fn load(&self, product: &Product, file: Option<&Path>) -> CliResult<ProductConfig> {
        if let Some(path) = &self.explicit {
            return Ok(ProductConfig::load(path)?);
        }
        let stem = match (product.som.as_ref().or(product.ksx.as_ref()), file) {
            (Some(name), _) => name.clone(),
            (None, Some(path)) => {
                println!("Neither --som nor --ksx given, detecting the product from the image");
                let name = io_stream::detect_base_name(File::open(path)?)?;
                println!("Detected product table: {name}.json");
                name
            }
            (None, None) => return Err("Set --som and/or --ksx, or --file".into()),
        };
        let path = self.dir.join(format!("{stem}.json"));
        match ProductConfig::load(&path) {
            Ok(config) => Ok(config),
            // Images can still be inspected without their table.
            Err(e) if file.is_some() => {
                warn!("{e}; continuing without a product table");
                Ok(ProductConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn product_args(product: &Product, build: &Build) -> ProductArgs {
    ProductArgs {
        som: product.som.clone(),
        ksx: product.ksx.clone(),
        id:  product.id.clone(),
        kit: build.kit.clone(),
        pcb: build.pcb.clone(),
        bom: build.bom.clone(),
        opt: build.opt,
    }
}

// ── Image I/O ────────────────────────────────────────────────────────────────

fn load(config: &ProductConfig, file: Option<&Path>) -> CliResult<EepromRecord> {
    let path = match file {
        Some(path) => path.to_path_buf(),
        None => io_stream::device_path(config)?,
    };
    info!("reading {}", path.display());
    Ok(EepromReader::new(File::open(&path)?).read_record()?)
}

fn load_v3(config: &ProductConfig, file: Option<&Path>, what: &str) -> CliResult<EepromRecord> {
    let record = load(config, file)?;
    if !record.is_v3() {
        return Err(format!("{what} are only supported with API v3").into());
    }
    Ok(record)
}

fn store(record: &EepromRecord, config: &ProductConfig, file: Option<&Path>, yes: bool) -> CliResult<()> {
    match file {
        Some(path) => save_file(path, record, config),
        None => flash(record, config, yes),
    }
}

fn save_file(path: &Path, record: &EepromRecord, config: &ProductConfig) -> CliResult<()> {
    let out = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
    EepromWriter::with_options(out, 0, config.product.max_image_size).write_record(record)?;
    Ok(())
}

fn flash(record: &EepromRecord, config: &ProductConfig, yes: bool) -> CliResult<()> {
    let path = io_stream::device_path(config)?;
    if !yes && !write_clearance()? {
        println!("Skipped flashing EEPROM!");
        return Ok(());
    }
    let device = OpenOptions::new().write(true).open(&path)?;
    EepromWriter::with_options(device, 0, config.product.max_image_size).write_record(record)?;
    println!("EEPROM flash successful!");
    Ok(())
}

fn write_clearance() -> CliResult<bool> {
    println!("You're about to flash a new image to the EEPROM!");
    println!("Image data is read by the bootloader and flashing the wrong image");
    println!("can lead to boot failure or misbehaving hardware.");
    print!("Do you really want to continue? (y/N) ");
    std::io::stdout().flush()?;

    let mut reply = String::new();
    std::io::stdin().lock().read_line(&mut reply)?;
    Ok(reply.trim().eq_ignore_ascii_case("y"))
}
