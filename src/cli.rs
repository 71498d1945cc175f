use clap::Parser;

#[derive(Parser)]
#[command(version, about = "Benchmark proxy profiles from a subscription, file, or link list", long_about = None)]
pub struct Args {
    #[arg(help = "Subscription URL, file path, or pasted links")]
    pub input: String,

    #[arg(short, long, default_value_t = 4, help = "Max parallel profile tests")]
    pub concurrency: usize,

    #[arg(short, long, default_value_t = 16, help = "Per-profile download budget in seconds")]
    pub timeout: u64,

    #[arg(short, long, default_value = "all", help = "Test phases: all, pingonly, speedonly")]
    pub mode: String,

    #[arg(short, long, default_value = "rspeed", help = "Result order: speed, rspeed, ping, rping")]
    pub sort: String,

    #[arg(short, long, default_value = "Default", help = "Display group label")]
    pub group: String,

    #[arg(short, long, help = "Log every progress event")]
    pub events: bool,

    #[arg(short, long, help = "Emit debug log")]
    pub verbose: bool,
}
