use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dls",
    version,
    about = "List paths in a mounted distributed-filesystem namespace - similar to `hadoop fs -ls`",
    long_about = "`dls` lists files and directories of a distributed-filesystem namespace exposed
through a local mount point, one aligned row per entry.

EXAMPLES:
    # List a directory
    dls --mount /mnt/dfs /data

    # Recursive listing with human-readable sizes
    dls --mount /mnt/dfs -R -H /data /logs

The mount point can also be supplied via the DFS_MOUNT environment variable."
)]
struct Args {
    // Listing options
    /// Recursively list subdirectories encountered
    #[arg(short = 'R', long = "recursive", help_heading = "Listing options")]
    recursive: bool,

    /// List a directory itself as a plain entry instead of its contents
    #[arg(short = 'd', long = "directory", help_heading = "Listing options")]
    directory: bool,

    /// Format file sizes in a human-readable fashion (e.g. 64.0 MB instead of 67108864)
    #[arg(short = 'H', long = "human-readable", help_heading = "Listing options")]
    human_readable: bool,

    // Progress & output
    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Namespace
    /// Root of the mounted namespace
    #[arg(long, value_name = "PATH", env = "DFS_MOUNT", help_heading = "Namespace")]
    mount: std::path::PathBuf,

    // Advanced settings
    /// Directory entries fetched per page from the namespace
    #[arg(
        long,
        default_value = "100",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    page_size: usize,

    // ARGUMENTS
    /// Namespace path(s) to list, e.g. /data/logs
    #[arg(value_name = "PATH")]
    paths: Vec<String>,
}

struct ListSummary {
    entries: usize,
}

impl std::fmt::Display for ListSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "entries listed: {}", self.entries)
    }
}

#[instrument]
async fn async_main(args: Args) -> Result<ListSummary> {
    if args.paths.is_empty() {
        return Err(anyhow!("ls: no paths given"));
    }
    if args.page_size == 0 {
        return Err(anyhow!("--page-size must be greater than zero"));
    }
    let remote = common::MountedFs::new(&args.mount);
    let settings = common::walk::WalkSettings {
        recursive: args.recursive,
        dirs_as_plain: args.directory,
        page_size: args.page_size,
    };
    let stdout = std::io::stdout();
    let mut lister = common::list::Lister::new(stdout.lock(), args.human_readable);
    let mut entries = 0;
    for path in &args.paths {
        // any stat, open or page-read error aborts the whole command
        common::walk::walk(&remote, path, &settings, |status| {
            entries += 1;
            lister.push(status);
        })
        .await
        .with_context(|| format!("ls: cannot list '{path}'"))?;
        lister.flush()?;
    }
    Ok(ListSummary { entries })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: false,
    };
    let res = common::run(output, func);
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
