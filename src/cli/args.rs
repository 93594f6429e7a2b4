use clap::Parser;
use std::path::PathBuf;

use crate::pdf::HorizontalPlacement;

#[derive(Parser, Debug)]
#[command(name = "certmail")]
#[command(author, version, about, long_about = None)]
#[command(about = "Personalize certificate PDFs and email them to a roster")]
pub struct Cli {
    /// Roster CSV with `name` and `email` columns
    #[arg(short, long, default_value = "roster.csv")]
    pub roster: PathBuf,

    /// Base certificate PDF (the first page is personalized)
    #[arg(short, long, default_value = "certificate.pdf")]
    pub base_cert: PathBuf,

    /// Directory for the generated certificates
    #[arg(short, long, default_value = "personalized_certs")]
    pub output_dir: PathBuf,

    /// TTF font for the name overlay (falls back to Helvetica-Bold)
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Font size in points
    #[arg(long, default_value_t = 36.0)]
    pub font_size: f64,

    /// Horizontal placement: "center" or an x coordinate in points
    #[arg(long, default_value = "center", value_parser = parse_placement)]
    pub text_x: HorizontalPlacement,

    /// Explicit y coordinate in points (default: 42% of the page height)
    #[arg(long)]
    pub text_y: Option<f64>,

    /// Generate PDFs but do not send emails
    #[arg(long)]
    pub dry_run: bool,

    /// Process only the first N rows (0 for all)
    #[arg(long, default_value_t = 0)]
    pub limit: usize,

    /// Process only the row matching this email (case-insensitive)
    #[arg(long)]
    pub only_email: Option<String>,

    /// Process only the row matching this name (case-insensitive)
    #[arg(long)]
    pub only_name: Option<String>,

    /// Send directly to this email (bypass the roster)
    #[arg(long)]
    pub adhoc_email: Option<String>,

    /// Name to render for the ad-hoc send
    #[arg(long, default_value = "Test Recipient")]
    pub adhoc_name: String,

    /// Send the email without the PDF attachment (debug)
    #[arg(long)]
    pub no_attach: bool,

    /// Override the email subject
    #[arg(long)]
    pub subject: Option<String>,

    /// Override the email body
    #[arg(long)]
    pub body: Option<String>,

    /// Log the SMTP relay response for each send
    #[arg(long)]
    pub smtp_debug: bool,

    /// Log file (console output is mirrored here)
    #[arg(long, default_value = "certificates.log")]
    pub log_file: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse a horizontal placement: "center" or a coordinate in points
fn parse_placement(s: &str) -> Result<HorizontalPlacement, String> {
    if s.eq_ignore_ascii_case("center") {
        return Ok(HorizontalPlacement::Centered);
    }
    s.parse::<f64>()
        .map(HorizontalPlacement::At)
        .map_err(|_| format!("expected `center` or a number, got `{}`", s))
}
