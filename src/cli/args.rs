use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "plotdesk",
    version,
    about = "terminal admin client for the plotdesk back office",
    long_about = "Plotdesk talks to the real-estate sales / MLM back-office REST API and renders list screens as tables in the terminal.\n\nExamples:\n  plotdesk properties --venture 3\n  plotdesk members --cadre DO --filter name=rao --page 2\n  plotdesk team 41 --output team.json\n\nTip: keep base_url and token in ~/.plotdesk/config.yml and the invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.plotdesk/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'b',
        long = "base-url",
        value_name = "URL",
        help_heading = "API",
        help = "Base URL of the back-office API."
    )]
    pub base_url: Option<String>,

    #[arg(
        short = 'T',
        long = "token",
        value_name = "TOKEN",
        help_heading = "API",
        help = "Bearer token for the Authorization header."
    )]
    pub token: Option<String>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        help_heading = "API",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "proxy",
        value_name = "URL",
        help_heading = "API",
        help = "Route all requests through this HTTP proxy."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'p',
        long = "page",
        value_name = "N",
        help_heading = "Table",
        help = "Page to display (1-based)."
    )]
    pub page: Option<usize>,

    #[arg(
        short = 's',
        long = "page-size",
        value_name = "N",
        help_heading = "Table",
        help = "Rows per page."
    )]
    pub page_size: Option<usize>,

    #[arg(
        short = 'f',
        long = "filter",
        value_name = "COLUMN=TEXT",
        action = clap::ArgAction::Append,
        help_heading = "Table",
        help = "Per-column substring filter, case-insensitive (repeatable)."
    )]
    pub filter: Vec<String>,

    #[arg(
        short = 'q',
        long = "search",
        value_name = "TEXT",
        help_heading = "Table",
        help = "Global substring filter over the searchable columns."
    )]
    pub search: Option<String>,

    #[arg(
        short = 'a',
        long = "all",
        help_heading = "Table",
        help = "Fetch every server page into one local table before filtering."
    )]
    pub all: bool,

    #[arg(
        short = 'l',
        long = "live",
        help_heading = "Table",
        help = "Live search: read queries from stdin (one per line), debounced."
    )]
    pub live: bool,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write the rendered table to a file instead of stdout."
    )]
    pub output: Option<String>,

    #[arg(
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format: text or json (inferred from --output extension when omitted)."
    )]
    pub output_format: Option<String>,

    #[arg(
        long = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Record counts across every screen's endpoint.
    Dashboard,

    /// List real-estate ventures (projects).
    Ventures,

    /// List properties/plots, optionally scoped to one venture.
    Properties {
        #[arg(long = "venture", value_name = "ID")]
        venture: Option<u64>,
    },

    /// List agents/members, optionally scoped to one cadre.
    Members {
        #[arg(long = "cadre", value_name = "CADRE", help = "APM, PM, DO or MD.")]
        cadre: Option<String>,
    },

    /// List call logs.
    Calls,

    /// List visitor logs, optionally scoped to one venture.
    Visitors {
        #[arg(long = "venture", value_name = "ID")]
        venture: Option<u64>,
    },

    /// List expense bills.
    Expenses,

    /// Commission-hierarchy report for one member's downline.
    Team {
        #[arg(value_name = "MEMBER_ID")]
        member_id: u64,
    },

    /// Record an incoming call.
    LogCall {
        #[arg(long = "caller", value_name = "NAME")]
        caller: String,
        #[arg(long = "phone", value_name = "PHONE")]
        phone: String,
        #[arg(long = "purpose", value_name = "TEXT", default_value = "enquiry")]
        purpose: String,
    },

    /// Mark an expense bill approved.
    Approve {
        #[arg(value_name = "BILL_ID")]
        bill_id: u64,
    },

    /// Delete a call log entry.
    DropCall {
        #[arg(value_name = "CALL_ID")]
        id: u64,
    },
}
