use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::cli::Cli;
use crate::pdf::{HorizontalPlacement, VerticalPlacement};

/// Fraction of the page height (from the bottom) used when no explicit y
/// coordinate is configured.
pub const DEFAULT_Y_RATIO: f64 = 0.42;

const DEFAULT_SUBJECT: &str = "Your Certificate of Participation";
const DEFAULT_BODY: &str = "Hello <name>,\n\n\
    Congratulations! Please find your certificate attached.\n\n\
    Regards,\n<from_name>\n";

/// Immutable configuration, built once at startup from CLI arguments and
/// the environment, and passed by reference into each component.
#[derive(Debug, Clone)]
pub struct Config {
    pub roster_path: PathBuf,
    pub base_cert: PathBuf,
    pub output_dir: PathBuf,
    /// Transient overlay file, reused across iterations. Lives in the OS
    /// temp directory so it can never collide with an output artifact.
    pub overlay_path: PathBuf,
    pub layout: TextLayout,
    pub smtp: SmtpConfig,
    pub from_name: String,
    pub subject: String,
    pub body_template: String,
    /// Pause between consecutive sends, to respect relay rate expectations.
    pub delay: Duration,
    pub batch: BatchOptions,
}

#[derive(Debug, Clone)]
pub struct TextLayout {
    pub font_path: Option<PathBuf>,
    pub font_size: f64,
    /// RGB fill color in [0, 1] per channel.
    pub color: (f32, f32, f32),
    pub x: HorizontalPlacement,
    pub y: VerticalPlacement,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Log the relay response for each send.
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub dry_run: bool,
    /// 0 means no limit.
    pub limit: usize,
    pub only_email: Option<String>,
    pub only_name: Option<String>,
    pub adhoc_email: Option<String>,
    pub adhoc_name: String,
    pub attach: bool,
}

impl Config {
    pub fn load(cli: &Cli) -> Self {
        dotenvy::dotenv().ok();

        let host = std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string());
        let port: u16 = match std::env::var("SMTP_PORT") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Invalid SMTP_PORT value {:?}, falling back to 587", raw);
                587
            }),
            Err(_) => 587,
        };
        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_name = std::env::var("CERTMAIL_FROM_NAME")
            .unwrap_or_else(|_| "The Certificates Team".to_string());

        Self {
            roster_path: cli.roster.clone(),
            base_cert: cli.base_cert.clone(),
            output_dir: cli.output_dir.clone(),
            overlay_path: std::env::temp_dir().join("certmail_overlay.pdf"),
            layout: TextLayout {
                font_path: cli.font.clone(),
                font_size: cli.font_size,
                color: (1.0, 1.0, 1.0),
                x: cli.text_x.clone(),
                y: match cli.text_y {
                    Some(y) => VerticalPlacement::At(y),
                    None => VerticalPlacement::Ratio(DEFAULT_Y_RATIO),
                },
            },
            smtp: SmtpConfig {
                host,
                port,
                username,
                password,
                debug: cli.smtp_debug,
            },
            from_name,
            subject: cli.subject.clone().unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            body_template: cli.body.clone().unwrap_or_else(|| DEFAULT_BODY.to_string()),
            delay: Duration::from_secs(1),
            batch: BatchOptions {
                dry_run: cli.dry_run,
                limit: cli.limit,
                only_email: cli.only_email.clone(),
                only_name: cli.only_name.clone(),
                adhoc_email: cli.adhoc_email.clone(),
                adhoc_name: cli.adhoc_name.clone(),
                attach: !cli.no_attach,
            },
        }
    }

    /// Email body for one recipient, with template placeholders filled in.
    pub fn body_for(&self, name: &str) -> String {
        self.body_template
            .replace("<name>", name)
            .replace("<from_name>", &self.from_name)
    }
}

/// Dry-run configuration rooted in a scratch directory, shared by the
/// module tests across the crate.
#[cfg(test)]
pub mod tests_support {
    use super::*;
    use std::path::Path;

    pub fn test_config(dir: &Path) -> Config {
        Config {
            roster_path: dir.join("roster.csv"),
            base_cert: dir.join("certificate.pdf"),
            output_dir: dir.join("out"),
            overlay_path: dir.join("overlay.pdf"),
            layout: TextLayout {
                font_path: None,
                font_size: 36.0,
                color: (1.0, 1.0, 1.0),
                x: HorizontalPlacement::Centered,
                y: VerticalPlacement::Ratio(DEFAULT_Y_RATIO),
            },
            smtp: SmtpConfig {
                host: "localhost".to_string(),
                port: 587,
                username: String::new(),
                password: String::new(),
                debug: false,
            },
            from_name: "The Team".to_string(),
            subject: DEFAULT_SUBJECT.to_string(),
            body_template: DEFAULT_BODY.to_string(),
            delay: Duration::ZERO,
            batch: BatchOptions {
                dry_run: true,
                limit: 0,
                only_email: None,
                only_name: None,
                adhoc_email: None,
                adhoc_name: "Test Recipient".to_string(),
                attach: true,
            },
        }
    }
}
