use clap::Parser;

/// polyview demo: one window hosting a page with an `echo` bridge handler.
#[derive(Parser, Debug)]
#[command(name = "polyview-demo", version, about)]
pub struct Args {
    /// URL to open instead of the built-in demo page.
    pub url: Option<String>,

    /// Directory served under `polyview://localhost/`.
    #[arg(long)]
    pub assets: Option<String>,

    /// Only allow main-frame navigations starting with one of these
    /// prefixes. Repeatable.
    #[arg(long = "allow")]
    pub allow: Vec<String>,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
