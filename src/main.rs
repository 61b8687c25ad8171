use clap::Parser;
use parallel_worker::runner::{DEFAULT_WORKER_COUNT, RunArgs, run_pool};
use std::path::PathBuf;

/// Run a command once per line of an argument file across a pool of workers
///
/// Child output is buffered in memory and there is no per-job timeout: a
/// child that never exits stalls its worker and the run waits for it.
#[derive(Parser, Clone)]
#[command(version, about)]
struct Args {
    /// Number of concurrent workers
    #[arg(short = 'n', long = "numworker", default_value_t = DEFAULT_WORKER_COUNT, value_parser = cli::parse_worker_count)]
    workers: usize,

    /// Argument list file, one job per line
    #[arg(short = 'a', long = "args")]
    arg_list: PathBuf,

    /// Output file (results print to the console if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Quiet mode - no banner, progress or summary, warnings only
    #[arg(short, long)]
    quiet: bool,

    /// Command to run; every "%arg" in its arguments is replaced by the job line
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing based on quiet mode; logs go to stderr so they stay
    // out of console results
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let default_filter = if args.quiet {
        "parallel_worker=warn"
    } else {
        "parallel_worker=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    if !args.quiet {
        println!("Parallel worker execution");
        println!("=========================");
        println!("Number of workers: {}", args.workers);
        println!("Worker exec command: {}", args.command.join(" "));
        println!("Worker arg list: {}", args.arg_list.display());
        println!();
    }

    let run_args = RunArgs {
        worker_count: args.workers,
        arg_list: args.arg_list,
        command: args.command,
        output: args.output.clone(),
        quiet: args.quiet,
    };

    let summary = run_pool(run_args).await?;

    if args.quiet {
        return Ok(());
    }

    println!();
    println!("Run Summary");
    println!("===========");
    println!("Run ID: {}", summary.run_id);
    println!("Jobs: {}", summary.jobs_total);
    println!("Succeeded: {}", summary.jobs_succeeded);
    println!("Failed: {}", summary.jobs_failed);
    println!("Records written: {}", summary.records_written);
    println!("Duration: {:.2}s", summary.duration.as_secs_f64());
    if let (Some(p50), Some(p90), Some(p99)) = summary.job_duration_percentiles_ms {
        println!("Job time: p50: {}ms, p90: {}ms, p99: {}ms", p50, p90, p99);
    }
    if summary.output_fell_back
        && let Some(ref requested) = args.output
    {
        println!(
            "Output: {} (could not create {})",
            summary.output,
            requested.display()
        );
    } else {
        println!("Output: {}", summary.output);
    }

    Ok(())
}

/// CLI utility functions for parsing command-line arguments
mod cli {
    /// Parse the worker count, which must be a positive integer
    pub fn parse_worker_count(s: &str) -> Result<usize, String> {
        let count: usize = s
            .trim()
            .parse()
            .map_err(|e| format!("Invalid worker count '{}': {}", s, e))?;

        if count == 0 {
            return Err("Number of workers must be at least 1".to_string());
        }

        Ok(count)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_worker_count() {
            assert_eq!(parse_worker_count("1"), Ok(1));
            assert_eq!(parse_worker_count(" 8 "), Ok(8));
            assert!(parse_worker_count("0").is_err());
            assert!(parse_worker_count("-2").is_err());
            assert!(parse_worker_count("many").is_err());
        }

        #[test]
        fn test_worker_count_defaults_to_shared_constant() {
            use crate::Args;
            use clap::Parser;
            use parallel_worker::runner::DEFAULT_WORKER_COUNT;

            let args = Args::try_parse_from(["parallel-worker", "-a", "args.txt", "echo", "%arg"])
                .unwrap();
            assert_eq!(args.workers, DEFAULT_WORKER_COUNT);
            assert_eq!(args.command, vec!["echo", "%arg"]);

            let args =
                Args::try_parse_from(["parallel-worker", "-n", "4", "-a", "args.txt", "true"])
                    .unwrap();
            assert_eq!(args.workers, 4);
        }
    }
}
