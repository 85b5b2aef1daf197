use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dput",
    version,
    about = "Copy local files and directories into a mounted distributed-filesystem namespace",
    long_about = "`dput` uploads a local file or directory tree into a distributed-filesystem
namespace exposed through a local mount point.

If the destination already exists as a directory, the source is placed inside
it under its own base name; if it does not exist, the source is copied to
exactly that path. A destination that exists as a file is an error.

EXAMPLES:
    # Upload a tree; lands at /data/src because /data already exists
    dput --mount /mnt/dfs ./src /data

    # Stream stdin into a remote file
    generate-report | dput --mount /mnt/dfs /reports/today.txt

Failures on individual entries are reported and counted; the rest of the tree
is still attempted and the exit code reflects whether anything failed."
)]
struct Args {
    // Progress & output
    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Namespace
    /// Root of the mounted namespace
    #[arg(long, value_name = "PATH", env = "DFS_MOUNT", help_heading = "Namespace")]
    mount: std::path::PathBuf,

    // ARGUMENTS
    /// Local SOURCE and namespace DEST; with only DEST given, bytes are read
    /// from standard input
    #[arg(value_name = "PATH")]
    paths: Vec<String>,
}

#[instrument]
async fn async_main(args: Args) -> Result<common::upload::Summary> {
    let remote = common::MountedFs::new(&args.mount);
    let result = match args.paths.as_slice() {
        [dest] => common::upload::upload_stream(&remote, tokio::io::stdin(), dest).await,
        [source, dest] => {
            let source = std::path::absolute(source)?;
            let plan = common::upload::resolve(&remote, &source, dest).await?;
            tracing::debug!("upload plan: {:?}", &plan);
            common::upload::upload(&remote, &plan).await
        }
        _ => {
            return Err(anyhow!(
                "you must specify SOURCE and DEST, or just DEST to read from standard input"
            ));
        }
    };
    match result {
        Ok(summary) => Ok(summary),
        Err(error) => {
            if args.summary {
                Err(anyhow!("{}\n\n{}", error, &error.summary))
            } else {
                Err(anyhow!("{}", error))
            }
        }
    }
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
        print_summary: args.summary,
    };
    let res = common::run(output, func);
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
