#![forbid(unsafe_code)]

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use byeblock_core::{config::TEMPLATE, MonitorConfig, ProxyKind, ProxyStore};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod monitor;

const DEFAULT_CONFIG: &str = "byeblock.toml";

#[derive(Debug, Parser)]
#[command(name = "byeblock", version, about = "Proxy latency monitor and proxy settings manager")]
struct Cli {
	/// Config file. Default: $BYEBLOCK_CONFIG, else ./byeblock.toml when present
	#[arg(long, global = true)]
	config: Option<PathBuf>,
	/// Proxy settings file (overrides settings_path from the config)
	#[arg(long, global = true)]
	settings: Option<PathBuf>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Probe the selected proxy continuously; press Ctrl-C to stop
	Monitor {
		/// Stop after this many seconds
		#[arg(long)]
		duration_secs: Option<u64>,
		/// Emit one JSON object per sample
		#[arg(long)]
		json: bool,
	},
	/// Manage stored proxies
	Proxy {
		#[command(subcommand)]
		action: ProxyCmd,
	},
	/// Config helpers
	Config {
		#[command(subcommand)]
		action: ConfigCmd,
	},
}

#[derive(Debug, Subcommand)]
enum ProxyCmd {
	/// Add or replace a proxy
	Add {
		host: String,
		#[arg(value_parser = clap::value_parser!(u16).range(1..))]
		port: u16,
		/// Identifier (default: the host)
		#[arg(long, default_value = "")]
		id: String,
		/// Proxy protocol: http or socks5
		#[arg(long, default_value = "http")]
		kind: ProxyKind,
		/// Also make it the selected proxy
		#[arg(long)]
		select: bool,
	},
	/// List stored proxies; the selected one is marked with '*'
	List,
	/// Select the proxy used by the monitor
	Select { id: String },
	/// Remove a proxy
	Remove { id: String },
	/// Clear the selection without removing any proxy
	Clear,
	/// Show the selected proxy
	Show,
}

#[derive(Debug, Subcommand)]
enum ConfigCmd {
	/// Show effective config (file, then BYEBLOCK_* env, then flags)
	Show,
	/// Write a byeblock.toml template
	WriteTemplate {
		/// Destination path (default: ./byeblock.toml)
		#[arg(long)]
		path: Option<PathBuf>,
		/// Overwrite if file exists
		#[arg(long)]
		force: bool,
	},
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
	let Cli { config, settings, command } = Cli::parse();

	match command {
		Commands::Config { action: ConfigCmd::WriteTemplate { path, force } } => write_template(path, force),
		Commands::Config { action: ConfigCmd::Show } => {
			let cfg = setup(config, settings)?;
			println!("{}", serde_json::to_string_pretty(&cfg)?);
			Ok(())
		}
		Commands::Proxy { action } => proxy_command(&setup(config, settings)?, action),
		Commands::Monitor { duration_secs, json } => {
			let cfg = setup(config, settings)?;
			monitor::run(&cfg, duration_secs.map(Duration::from_secs), json).await
		}
	}
}

/// Resolves the effective config and installs the tracing subscriber.
fn setup(config: Option<PathBuf>, settings: Option<PathBuf>) -> Result<MonitorConfig> {
	let path = config
		.or_else(|| std::env::var_os("BYEBLOCK_CONFIG").map(PathBuf::from))
		.or_else(|| Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.exists()));
	let mut cfg = match path {
		Some(p) => MonitorConfig::load_from_file(&p).with_context(|| format!("loading config {}", p.display()))?,
		None => MonitorConfig::default(),
	};
	cfg.apply_env()?;
	if let Some(settings) = settings {
		cfg.settings_path = settings;
	}
	cfg.validate()?;
	init_tracing(&cfg.log_level);
	Ok(cfg)
}

fn init_tracing(level: &str) {
	// RUST_LOG wins over the configured level; logs go to stderr so stdout stays parseable
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn proxy_command(cfg: &MonitorConfig, action: ProxyCmd) -> Result<()> {
	let path = &cfg.settings_path;
	let mut store = ProxyStore::load(path).with_context(|| format!("loading proxy settings from {}", path.display()))?;

	match action {
		ProxyCmd::Add { host, port, id, kind, select } => {
			let id = store.add(&id, &host, port, kind)?;
			if select {
				store.select(&id)?;
			}
			store.save(path)?;
			println!("added {id}");
		}
		ProxyCmd::List => {
			if store.is_empty() {
				println!("no proxies configured");
			}
			let selected = store.selected_id();
			for (id, entry) in store.list() {
				let mark = if Some(id) == selected { '*' } else { ' ' };
				println!("{mark} {id}\t{}:{} ({})", entry.host, entry.port, entry.kind);
			}
		}
		ProxyCmd::Select { id } => {
			store.select(&id)?;
			store.save(path)?;
			println!("selected {id}");
		}
		ProxyCmd::Remove { id } => {
			if store.remove(&id).is_none() {
				anyhow::bail!("no proxy named {id:?}");
			}
			store.save(path)?;
			println!("removed {id}");
		}
		ProxyCmd::Clear => {
			store.clear_selection();
			store.save(path)?;
			println!("selection cleared");
		}
		ProxyCmd::Show => match store.selected_endpoint() {
			Some(ep) => println!("Host: {}, Port: {}, Kind: {}", ep.host(), ep.port(), ep.kind()),
			None => println!("Host: None, Port: None"),
		},
	}
	Ok(())
}

fn write_template(path: Option<PathBuf>, force: bool) -> Result<()> {
	let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
	if path.exists() && !force {
		eprintln!("refusing to overwrite existing file: {} (use --force)", path.display());
		std::process::exit(2);
	}
	std::fs::write(&path, TEMPLATE).with_context(|| format!("writing {}", path.display()))?;
	eprintln!("wrote {}", path.display());
	Ok(())
}
