use std::time::Duration;

use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "synod-peer")]
struct Opt {
    /// Membership descriptor, one `hostname:role,...` entry per line
    #[structopt(short = "f", long = "hosts", parse(from_os_str))]
    hosts: std::path::PathBuf,

    /// Initial value to propose
    #[structopt(short = "v", long = "value", default_value = "")]
    value: String,

    /// Delay before proposing, in seconds (proposers only)
    #[structopt(short = "t", long = "delay", default_value = "0")]
    delay: u64,

    /// Port every peer listens on
    #[structopt(short = "p", long = "port", default_value = "8080")]
    port: u16,

    /// Name of this host in the descriptor
    #[structopt(short = "n", long = "hostname", env = "HOSTNAME")]
    hostname: Option<String>,

    /// Timeout for each connection attempt and response (in milliseconds)
    #[structopt(long = "timeout", default_value = "1000")]
    timeout: u64,

    /// Log verbosity, repeat for more detail
    #[structopt(long = "verbose", parse(from_occurrences))]
    verbose: u8,
}

fn init_logger(verbose: u8) -> Result<(), log::SetLoggerError> {
    let level = match verbose {
    | 0 => log::LevelFilter::Warn,
    | 1 => log::LevelFilter::Info,
    | 2 => log::LevelFilter::Debug,
    | _ => log::LevelFilter::Trace,
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message,
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
}

async fn run(opt: Opt) -> Result<(), synod::Error> {
    let membership = synod::Membership::load(&opt.hosts)?;
    synod::Config::new(membership, opt.hostname.unwrap_or_default())
        .with_port(opt.port)
        .with_timeout(Duration::from_millis(opt.timeout))
        .with_delay(Duration::from_secs(opt.delay))
        .with_value(opt.value)
        .run()
        .await
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();
    if let Err(error) = init_logger(opt.verbose) {
        eprintln!("[ERROR]: could not initialize logger: {}", error);
    }
    if let Err(error) = run(opt).await {
        eprintln!("[ERROR]: {}", error);
        std::process::exit(1);
    }
}
