//! Command line surface: `put`, `stream`, `cat` and `params`.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ax_app::{StreamBlob, TransferEvent};
use ax_core::ports::BlobStorePort;
use ax_core::transfer::TransferParamsAsset;
use ax_core::vfile::DEFAULT_PRIORITY;
use ax_core::{BlobId, BlobKey, BlobType, OpenMode, TransferConfig, VirtualFile};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use crate::bootstrap::{self, Wired};

#[derive(Parser, Debug)]
#[command(name = "assetxfer")]
#[command(about = "Stream blobs out of a block store, packet by packet", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Local block store directory (overrides the config file)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Upstream block store consulted on local misses
    #[arg(long, global = true)]
    pub upstream: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a file as a blob and print its id
    Put {
        /// Blob type, by short name (`sound`) or numeric code (`1`)
        #[arg(short, long, value_parser = parse_blob_type)]
        r#type: BlobType,
        /// Reuse this id instead of generating one
        #[arg(long)]
        id: Option<BlobId>,
        file: PathBuf,
    },
    /// Stream a blob through the transfer engine
    Stream {
        #[arg(long)]
        id: BlobId,
        #[arg(short, long, value_parser = parse_blob_type)]
        r#type: BlobType,
        /// Bytes per packet (overrides the config file)
        #[arg(long)]
        packet_size: Option<usize>,
        #[arg(long, default_value_t = DEFAULT_PRIORITY)]
        priority: f32,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Read a blob straight through the virtual file layer
    Cat {
        #[arg(long)]
        id: BlobId,
        #[arg(short, long, value_parser = parse_blob_type)]
        r#type: BlobType,
        /// Bytes per async read
        #[arg(long, default_value_t = 4096)]
        chunk: usize,
    },
    /// Print the hex parameter block addressing a blob
    Params {
        #[arg(long)]
        id: BlobId,
        #[arg(short, long, value_parser = parse_blob_type)]
        r#type: BlobType,
    },
}

fn parse_blob_type(value: &str) -> Result<BlobType, String> {
    if let Some(blob_type) = BlobType::from_short_name(value) {
        return Ok(blob_type);
    }
    match value.parse::<i32>() {
        Ok(code) => Ok(BlobType::from_code(code)),
        Err(_) => Err(format!("unknown blob type `{value}`")),
    }
}

/// Fold command line overrides into the loaded config.
pub fn resolve_config(global: &GlobalArgs) -> Result<TransferConfig> {
    let mut config = match global.config.as_deref() {
        Some(path) => bootstrap::load_config(path)?,
        None => TransferConfig::with_store_root(bootstrap::default_store_root()),
    };
    if let Some(store) = &global.store {
        config.store_root = store.clone();
    }
    if let Some(upstream) = &global.upstream {
        config.upstream_root = Some(upstream.clone());
    }
    if config.store_root.as_os_str().is_empty() {
        config.store_root = bootstrap::default_store_root();
    }
    Ok(config)
}

pub fn run(command: Commands, mut config: TransferConfig) -> Result<()> {
    match command {
        Commands::Put { r#type, id, file } => run_put(&config, r#type, id, file),
        Commands::Stream {
            id,
            r#type,
            packet_size,
            priority,
            out,
        } => {
            if let Some(packet_size) = packet_size {
                config.packet_size = packet_size;
            }
            run_stream(&config, TransferParamsAsset::new(id, r#type), priority, out)
        }
        Commands::Cat { id, r#type, chunk } => run_cat(&config, BlobKey::new(id, r#type), chunk),
        Commands::Params { id, r#type } => {
            println!("{}", params_hex(&TransferParamsAsset::new(id, r#type)));
            Ok(())
        }
    }
}

pub fn params_hex(params: &TransferParamsAsset) -> String {
    hex::encode(params.to_bytes())
}

fn run_put(
    config: &TransferConfig,
    blob_type: BlobType,
    id: Option<BlobId>,
    file: PathBuf,
) -> Result<()> {
    let data = fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let key = BlobKey::new(id.unwrap_or_else(BlobId::new), blob_type);

    VirtualFile::write_file(bootstrap::local_store(config), key, &data)
        .with_context(|| format!("Failed to store blob {key}"))?;
    info!(blob = %key, bytes = data.len(), "stored blob");
    println!("{}", key.id);
    Ok(())
}

fn run_stream(
    config: &TransferConfig,
    params: TransferParamsAsset,
    priority: f32,
    out: Option<PathBuf>,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let payload = runtime.block_on(async {
        let Wired {
            manager,
            mut events,
            ..
        } = bootstrap::wire(config, tokio::runtime::Handle::current());

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    TransferEvent::Status {
                        transfer_id,
                        status,
                    } => debug!(transfer_id = %transfer_id, %status, "transfer status"),
                    TransferEvent::Completed {
                        transfer_id,
                        status,
                    } => debug!(transfer_id = %transfer_id, %status, "transfer completed"),
                }
            }
        });

        let mut payload = Vec::new();
        let report = StreamBlob::new(manager)
            .execute(params, priority, &mut payload)
            .await?;
        info!(
            transfer_id = %report.transfer_id,
            bytes = report.bytes,
            packets = report.packets,
            "stream finished"
        );
        anyhow::Ok(payload)
    })?;

    write_output(out, &payload)
}

fn run_cat(config: &TransferConfig, key: BlobKey, chunk: usize) -> Result<()> {
    if chunk == 0 {
        bail!("--chunk must be at least 1");
    }
    let worker = ax_infra::vfs::init_global().context("Failed to start vfs worker")?;
    let store: Arc<dyn BlobStorePort> = bootstrap::local_store(config);
    if !store.exists(&key) {
        ax_infra::vfs::cleanup_global();
        bail!("blob {key} not in store");
    }

    let mut file = VirtualFile::open(store, key, OpenMode::Read).with_worker(worker);
    let mut payload = Vec::new();
    let result = loop {
        if let Err(err) = file.read_async(chunk, DEFAULT_PRIORITY) {
            break Err(err);
        }
        match file.wait_for_read() {
            Ok(bytes) => payload.extend_from_slice(&bytes),
            Err(err) => break Err(err),
        }
        if file.eof() {
            break Ok(());
        }
    };
    drop(file);
    ax_infra::vfs::cleanup_global();

    result.with_context(|| format!("Failed to read blob {key}"))?;
    write_output(None, &payload)
}

fn write_output(out: Option<PathBuf>, payload: &[u8]) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(&path, payload)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(payload)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
