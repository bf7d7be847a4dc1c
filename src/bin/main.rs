//! vz-conf CLI

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use vz_conf::{ConfigStore, DefinitionParser, Driver, DriverConfig, UuidAssigner};

#[derive(Parser)]
#[command(name = "vz-conf")]
#[command(about = "Inspect OpenVZ container definitions and config files", long_about = None)]
struct Cli {
    /// JSON driver config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Config directory candidate (repeatable, replaces the defaults)
    #[arg(long = "conf-dir", global = true)]
    conf_dirs: Vec<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a domain XML file and print the definition
    Parse {
        /// Path to the domain XML
        file: PathBuf,
    },
    /// Print a parameter from a container config
    Param {
        /// Container id
        vpsid: i32,
        /// Parameter name, e.g. OSTEMPLATE
        name: String,
    },
    /// Print the UUID of a container, assigning one if needed
    Uuid {
        /// Container id
        vpsid: i32,
    },
    /// Give every container config a UUID
    AssignUuids,
    /// List containers known to the runtime
    List,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vz_conf=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Parse { file } => cmd_parse(&file)?,
        Commands::Param { vpsid, name } => cmd_param(&config, vpsid, &name)?,
        Commands::Uuid { vpsid } => cmd_uuid(&config, vpsid)?,
        Commands::AssignUuids => cmd_assign_uuids(&config)?,
        Commands::List => cmd_list(config)?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> vz_conf::Result<DriverConfig> {
    let mut config = match &cli.config {
        Some(path) => DriverConfig::from_file(path)?,
        None => DriverConfig::default(),
    };
    if !cli.conf_dirs.is_empty() {
        config.conf_dirs = cli.conf_dirs.clone();
    }
    config.validate()?;
    Ok(config)
}

fn cmd_parse(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let xml = std::fs::read_to_string(file)?;
    let def = DefinitionParser::new().parse_str(&xml)?;
    println!("{}", serde_json::to_string_pretty(&def)?);
    Ok(())
}

fn cmd_param(config: &DriverConfig, vpsid: i32, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = ConfigStore::locate(&config.conf_dirs)?;
    match store.find_param(vpsid, name)? {
        Some(value) => println!("{}", value),
        None => {
            eprintln!("{} is not set in {}", name, store.conf_path(vpsid).display());
            std::process::exit(1);
        }
    }
    Ok(())
}

fn cmd_uuid(config: &DriverConfig, vpsid: i32) -> Result<(), Box<dyn std::error::Error>> {
    let assigner = UuidAssigner::new(ConfigStore::locate(&config.conf_dirs)?);
    println!("{}", assigner.ensure_uuid(vpsid)?);
    Ok(())
}

fn cmd_assign_uuids(config: &DriverConfig) -> Result<(), Box<dyn std::error::Error>> {
    let assigner = UuidAssigner::new(ConfigStore::locate(&config.conf_dirs)?);
    let report = assigner.scan_and_assign_all()?;

    for (vpsid, uuid) in &report.assigned {
        println!("{:>8}  {}  (new)", vpsid, uuid);
    }
    for (vpsid, uuid) in &report.existing {
        println!("{:>8}  {}", vpsid, uuid);
    }
    for (vpsid, e) in &report.failed {
        println!("{:>8}  error: {}", vpsid, e);
    }
    println!(
        "\n{} assigned, {} existing, {} failed",
        report.assigned.len(),
        report.existing.len(),
        report.failed.len()
    );
    Ok(())
}

fn cmd_list(config: DriverConfig) -> Result<(), Box<dyn std::error::Error>> {
    let driver = Driver::open(config)?;
    driver.refresh()?;

    println!("{:<8} {:<8} {:<10} UUID", "NAME", "ID", "STATUS");
    for vm in driver.list() {
        let id = if vm.is_active() { vm.id.to_string() } else { "-".to_string() };
        println!("{:<8} {:<8} {:<10} {}", vm.def.name, id, vm.status.to_string(), vm.def.uuid);
    }
    println!(
        "\n{} active, {} inactive",
        driver.num_active(),
        driver.num_inactive()
    );
    Ok(())
}
