use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "reportwatch",
    version,
    about = "trigger a report, wait for it, page through the results",
    long_about = "reportwatch asks a report service to generate a report, polls it at a fixed interval until the report is ready, then renders the rows page by page.\n\nExamples:\n  reportwatch -u http://127.0.0.1:8000\n  reportwatch -u http://reports.local --page-size 25 --page 3 --no-interactive\n  reportwatch -u http://reports.local -o report.json\n  reportwatch --config ~/.reportwatch/config.yml\n\nPager commands: n(ext), p(rev), f(irst), l(ast), <number>, q(uit)."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv, -vvv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'c',
        long = "clr",
        visible_alias = "color",
        help_heading = "Output",
        help = "Enable colored output (overrides --no-color)."
    )]
    pub color: bool,

    #[arg(
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write the full report to FILE."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'O',
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Export format: text, json, csv or xml (inferred from the extension if omitted)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'u',
        long = "u",
        visible_alias = "url",
        value_name = "URL",
        help_heading = "Service",
        help = "Base URL of the report service."
    )]
    pub url: Option<String>,

    #[arg(
        long = "sp",
        visible_alias = "submit-path",
        value_name = "PATH",
        help_heading = "Service",
        help = "Path that creates a report job (POST)."
    )]
    pub submit_path: Option<String>,

    #[arg(
        long = "pp",
        visible_alias = "poll-path",
        value_name = "PATH",
        help_heading = "Service",
        help = "Path prefix for status checks (GET <path>/<report_id>)."
    )]
    pub poll_path: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.reportwatch/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "ic",
        visible_alias = "init-config",
        help_heading = "Input",
        help = "Write a commented default config file and exit."
    )]
    pub init_config: bool,

    #[arg(
        short = 'i',
        long = "iv",
        visible_alias = "interval",
        value_name = "MS",
        help_heading = "Polling",
        help = "Delay between status checks in milliseconds."
    )]
    pub interval: Option<u64>,

    #[arg(
        long = "mp",
        visible_alias = "max-polls",
        value_name = "N",
        help_heading = "Polling",
        help = "Fail after N status checks (default: poll until done)."
    )]
    pub max_polls: Option<u32>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        help_heading = "HTTP",
        help = "Request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'x',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "Route requests through a proxy."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'd',
        long = "dl",
        visible_alias = "delimiter",
        value_name = "CHAR",
        help_heading = "Report",
        help = "Field delimiter of the report body (single byte)."
    )]
    pub delimiter: Option<String>,

    #[arg(
        long = "sr",
        visible_alias = "strict-rows",
        num_args = 0..=1,
        default_missing_value = "true",
        help_heading = "Report",
        help = "Reject reports with rows that do not match the header width."
    )]
    pub strict_rows: Option<bool>,

    #[arg(
        short = 's',
        long = "ps",
        visible_alias = "page-size",
        value_name = "N",
        help_heading = "View",
        help = "Rows per page."
    )]
    pub page_size: Option<usize>,

    #[arg(
        short = 'p',
        long = "pg",
        visible_alias = "page",
        value_name = "N",
        allow_negative_numbers = true,
        help_heading = "View",
        help = "Page to show first (clamped to the available pages)."
    )]
    pub page: Option<i64>,

    #[arg(
        long = "ni",
        visible_alias = "no-interactive",
        help_heading = "View",
        help = "Print one page and exit instead of starting the pager."
    )]
    pub no_interactive: bool,
}
