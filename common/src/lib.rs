//! Shared engine for the dfs command-line tools: the remote-namespace seam,
//! paginated tree traversal, listing row rendering and the upload walk.

pub mod list;
pub mod mount;
pub mod remote;
#[cfg(test)]
pub mod testutils;
pub mod upload;
pub mod walk;

pub use mount::MountedFs;
pub use remote::{FileKind, FileStatus, RemoteError, RemoteFilesystem};

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

/// Set up logging and a runtime, run the tool's async main and report its
/// outcome. Returns `None` on failure so `main` can exit non-zero.
///
/// The runtime is single-threaded on purpose: every remote and local call
/// in these tools is strictly sequential, one stat, one page, one file
/// transfer at a time.
pub fn run<FuncType, FutureType, SummaryType>(
    output: OutputConfig,
    func: FuncType,
) -> Option<SummaryType>
where
    FuncType: FnOnce() -> FutureType,
    FutureType: std::future::Future<Output = anyhow::Result<SummaryType>>,
    SummaryType: std::fmt::Display,
{
    init_logging(output.verbose);
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("failed starting the runtime: {error:#}");
            return None;
        }
    };
    match runtime.block_on(func()) {
        Ok(summary) => {
            if output.print_summary {
                println!("{}", &summary);
            }
            Some(summary)
        }
        Err(error) => {
            if !output.quiet {
                tracing::error!("{:#}", &error);
            }
            None
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    // a second call in the same process keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
