mod commands;
mod progress;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::lifecycle::Transition;
use commands::{exit_code_for, parse_type_name, ArtifactRef, Connection};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "glare",
    version,
    about = "Command-line client for the Glare artifact repository"
)]
struct Cli {
    #[command(flatten)]
    connection: Connection,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List artifacts of a type.
    List {
        /// Artifact type, or `all` for every type.
        #[arg(value_parser = parse_type_name)]
        type_name: String,
        /// Maximum number of artifacts to return (0 for no limit).
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
        /// Number of artifacts requested per page.
        #[arg(short, long)]
        page_size: Option<usize>,
        /// Filter as KEY=VALUE; repeat for several filters.
        #[arg(short = 'F', long = "filter")]
        filters: Vec<String>,
        /// Sort as key[:asc|desc], comma separated.
        #[arg(short = 'S', long)]
        sort: Option<String>,
        /// Start after the artifact with this id.
        #[arg(short, long)]
        marker: Option<String>,
    },
    /// Show artifact details.
    Show {
        #[command(flatten)]
        artifact: ArtifactRef,
    },
    /// Create a new artifact.
    Create {
        /// Artifact type.
        #[arg(value_parser = parse_type_name)]
        type_name: String,
        /// Artifact name.
        name: String,
        /// Artifact version.
        #[arg(short = 'V', long, default_value = "0.0.0")]
        artifact_version: String,
        /// Property as KEY=VALUE.
        #[arg(short, long = "property")]
        properties: Vec<String>,
        /// List property as KEY=V1,V2.
        #[arg(short, long = "list")]
        lists: Vec<String>,
        /// Dict property as KEY=K1:V1,K2:V2.
        #[arg(short, long = "dict")]
        dicts: Vec<String>,
    },
    /// Update properties of an artifact.
    Update {
        #[command(flatten)]
        artifact: ArtifactRef,
        /// Property as KEY=VALUE.
        #[arg(short, long = "property")]
        properties: Vec<String>,
        /// List property as KEY=V1,V2.
        #[arg(short, long = "list")]
        lists: Vec<String>,
        /// Dict property as KEY=K1:V1,K2:V2.
        #[arg(short, long = "dict")]
        dicts: Vec<String>,
        /// Property to clear; `dict/key` drops one dict entry.
        #[arg(short, long = "remove-property")]
        remove: Vec<String>,
    },
    /// Delete an artifact.
    Delete {
        #[command(flatten)]
        artifact: ArtifactRef,
    },
    /// Set artifact status to active.
    Activate {
        #[command(flatten)]
        artifact: ArtifactRef,
    },
    /// Set artifact status to deactivated.
    Deactivate {
        #[command(flatten)]
        artifact: ArtifactRef,
    },
    /// Set a deactivated artifact back to active.
    Reactivate {
        #[command(flatten)]
        artifact: ArtifactRef,
    },
    /// Make an active artifact public.
    Publish {
        #[command(flatten)]
        artifact: ArtifactRef,
    },
    /// Add a tag to an artifact.
    AddTag {
        #[command(flatten)]
        artifact: ArtifactRef,
        /// Tag to add.
        #[arg(long)]
        tag: String,
    },
    /// Remove a tag from an artifact.
    RemoveTag {
        #[command(flatten)]
        artifact: ArtifactRef,
        /// Tag to remove.
        #[arg(long)]
        tag: String,
    },
    /// Upload blob data from a file or stdin.
    Upload {
        #[command(flatten)]
        artifact: ArtifactRef,
        /// File to upload; stdin when omitted.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Blob property to fill; defaults per type.
        #[arg(short = 'p', long)]
        blob_property: Option<String>,
        /// Content type of the uploaded data.
        #[arg(short = 'C', long)]
        content_type: Option<String>,
        /// Show a progress bar.
        #[arg(long, default_value_t = false)]
        progress: bool,
    },
    /// Download blob data to a file or stdout.
    Download {
        #[command(flatten)]
        artifact: ArtifactRef,
        /// Destination file; stdout when omitted.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Blob property to read; defaults per type.
        #[arg(short = 'p', long)]
        blob_property: Option<String>,
        /// Show a progress bar.
        #[arg(long, default_value_t = false)]
        progress: bool,
    },
    /// Point a blob property at data held in an external store.
    AddLocation {
        #[command(flatten)]
        artifact: ArtifactRef,
        /// URL of the external data.
        #[arg(long)]
        url: String,
        /// Declared MD5 of the data.
        #[arg(long)]
        md5: Option<String>,
        /// Declared SHA-1 of the data.
        #[arg(long)]
        sha1: Option<String>,
        /// Declared SHA-256 of the data.
        #[arg(long)]
        sha256: Option<String>,
        /// Blob property to point; defaults per type.
        #[arg(short = 'p', long)]
        blob_property: Option<String>,
    },
    /// Remove an external location from a blob property.
    RemoveLocation {
        #[command(flatten)]
        artifact: ArtifactRef,
        /// Blob property to clear; defaults per type.
        #[arg(short = 'p', long)]
        blob_property: Option<String>,
    },
    /// List the artifact types the service supports.
    TypeList,
    /// Show the schema of an artifact type.
    TypeSchema {
        /// Artifact type.
        #[arg(value_parser = parse_type_name)]
        type_name: String,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

#[allow(clippy::too_many_lines)]
fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("GLARE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let conn = &cli.connection;
    let json = cli.json;

    let result = match cli.command {
        Commands::List {
            type_name,
            limit,
            page_size,
            filters,
            sort,
            marker,
        } => commands::list::run(
            conn,
            &type_name,
            &commands::list::ListArgs {
                filters: &filters,
                sort: sort.as_deref(),
                limit,
                page_size,
                marker: marker.as_deref(),
            },
            json,
        ),
        Commands::Show { artifact } => commands::show::run(conn, &artifact, json),
        Commands::Create {
            type_name,
            name,
            artifact_version,
            properties,
            lists,
            dicts,
        } => commands::create::run(
            conn,
            &type_name,
            &commands::create::CreateArgs {
                name: &name,
                version: &artifact_version,
                properties: &properties,
                lists: &lists,
                dicts: &dicts,
            },
            json,
        ),
        Commands::Update {
            artifact,
            properties,
            lists,
            dicts,
            remove,
        } => commands::update::run(
            conn,
            &artifact,
            &commands::update::UpdateArgs {
                properties: &properties,
                lists: &lists,
                dicts: &dicts,
                remove: &remove,
            },
            json,
        ),
        Commands::Delete { artifact } => commands::delete::run(conn, &artifact, json),
        Commands::Activate { artifact } => {
            commands::lifecycle::run(conn, &artifact, Transition::Activate, json)
        }
        Commands::Deactivate { artifact } => {
            commands::lifecycle::run(conn, &artifact, Transition::Deactivate, json)
        }
        Commands::Reactivate { artifact } => {
            commands::lifecycle::run(conn, &artifact, Transition::Reactivate, json)
        }
        Commands::Publish { artifact } => {
            commands::lifecycle::run(conn, &artifact, Transition::Publish, json)
        }
        Commands::AddTag { artifact, tag } => commands::tag::add(conn, &artifact, &tag, json),
        Commands::RemoveTag { artifact, tag } => {
            commands::tag::remove(conn, &artifact, &tag, json)
        }
        Commands::Upload {
            artifact,
            file,
            blob_property,
            content_type,
            progress,
        } => commands::upload::run(
            conn,
            &artifact,
            &commands::upload::UploadArgs {
                file: file.as_deref(),
                blob_property: blob_property.as_deref(),
                content_type: content_type.as_deref(),
                progress,
            },
            json,
        ),
        Commands::Download {
            artifact,
            file,
            blob_property,
            progress,
        } => commands::download::run(
            conn,
            &artifact,
            &commands::download::DownloadArgs {
                file: file.as_deref(),
                blob_property: blob_property.as_deref(),
                progress,
            },
            json,
        ),
        Commands::AddLocation {
            artifact,
            url,
            md5,
            sha1,
            sha256,
            blob_property,
        } => commands::location::add(
            conn,
            &artifact,
            &commands::location::LocationArgs {
                url: &url,
                md5: md5.as_deref(),
                sha1: sha1.as_deref(),
                sha256: sha256.as_deref(),
                blob_property: blob_property.as_deref(),
            },
            json,
        ),
        Commands::RemoveLocation {
            artifact,
            blob_property,
        } => commands::location::remove(conn, &artifact, blob_property.as_deref(), json),
        Commands::TypeList => commands::schema::list(conn, json),
        Commands::TypeSchema { type_name } => commands::schema::show(conn, &type_name, json),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}
