use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use skysync_core::SyncMethod;

#[derive(Parser)]
#[command(name = "skysync")]
#[command(about = "Sync records, metadata and live photos with a cloud store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Remote endpoint base URL (overrides SKYSYNC_API_BASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_base_url: Option<String>,

    /// Directory for translated record metadata
    #[arg(long, global = true, value_name = "PATH")]
    pub metadata_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Push or pull records against a remote endpoint
    Sync {
        /// Endpoint path relative to the base URL, e.g. `contacts`
        endpoint: String,
        /// Request method
        #[arg(short, long, value_enum, default_value_t = MethodArg::Put)]
        method: MethodArg,
        /// JSON file with one record or an array of records (stdin when omitted)
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,
        /// Output the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upload, download and convert live photos
    #[command(name = "live-photo")]
    LivePhoto {
        #[command(subcommand)]
        command: LivePhotoCommands,
    },
    /// Reconcile two versions of a record
    Resolve {
        /// JSON file with the local version
        #[arg(long, value_name = "PATH")]
        local: PathBuf,
        /// JSON file with the remote version
        #[arg(long, value_name = "PATH")]
        remote: PathBuf,
        /// Strategy: last-write-wins, merge or manual
        #[arg(short, long)]
        strategy: Option<String>,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Inspect and translate attribute metadata
    Metadata {
        #[command(subcommand)]
        command: MetadataCommands,
    },
    /// Plain file transfer against remote object storage
    Files {
        #[command(subcommand)]
        command: FilesCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum LivePhotoCommands {
    /// Splice a still and its clip and upload the result
    Push {
        /// Still image (JPEG)
        still: PathBuf,
        /// Motion clip
        video: PathBuf,
        /// Output the upload result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download a live photo and write the local still and clip
    Pull {
        /// Remote live photo id
        id: String,
        /// Directory receiving `<id>.jpg` and `<id>.mov`
        #[arg(long, value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,
    },
    /// Splice a still and its clip into one file without uploading
    Encode {
        still: PathBuf,
        video: PathBuf,
        /// Spliced output file
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,
    },
    /// Split a spliced file into a still and a clip without downloading
    Decode {
        /// Spliced input file
        input: PathBuf,
        /// Directory receiving the still and the clip
        #[arg(long, value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum MetadataCommands {
    /// Show metadata persisted for a record
    Show {
        /// Record id
        id: String,
        /// Print the flat remote attribute form
        #[arg(long)]
        remote: bool,
    },
    /// Translate a metadata document between the two attribute forms
    Translate {
        /// JSON file with the metadata (stdin when omitted)
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,
        /// Print the flat remote attribute form
        #[arg(long)]
        remote: bool,
    },
}

#[derive(Subcommand)]
pub enum FilesCommands {
    /// Upload a local file
    Upload {
        /// Local file to upload
        path: PathBuf,
        /// Object key (generated under `--namespace` when omitted)
        #[arg(long)]
        key: Option<String>,
        /// Namespace for generated keys
        #[arg(long, default_value = "default")]
        namespace: String,
        /// Content type stored with the object
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Download an object
    Download {
        /// Object key
        key: String,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// List objects under a prefix
    List {
        /// Key prefix
        #[arg(default_value = "")]
        prefix: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an object
    Delete {
        /// Object key
        key: String,
    },
    /// Check that the configured bucket is reachable
    Check,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum MethodArg {
    Get,
    Post,
    Put,
    Delete,
}

impl From<MethodArg> for SyncMethod {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Get => Self::Get,
            MethodArg::Post => Self::Post,
            MethodArg::Put => Self::Put,
            MethodArg::Delete => Self::Delete,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
