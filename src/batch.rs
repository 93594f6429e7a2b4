use tracing::{error, info};

use crate::config::Config;
use crate::error::Result;
use crate::mail::Mailer;
use crate::pdf::compose_certificate;
use crate::roster::{Recipient, Roster};

/// Aggregated outcome of one batch run. Per-recipient failures are recorded
/// here and logged; they never abort the run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Valid, unfiltered roster rows attempted (including failed ones).
    pub processed: usize,
    pub generated: usize,
    pub sent: usize,
    pub simulated: usize,
    pub failures: Vec<RecipientFailure>,
}

#[derive(Debug)]
pub struct RecipientFailure {
    pub name: String,
    pub email: String,
    pub reason: String,
}

/// Runs the whole batch: every valid, unfiltered roster row gets a compose
/// + send cycle, in file order, with the configured delay in between. Falls
/// back to a single ad-hoc cycle when the roster yielded nothing and an
/// ad-hoc destination was supplied.
pub fn run(config: &Config) -> BatchReport {
    let mut report = BatchReport::default();
    let mailer = Mailer::new(config);

    match Roster::open(&config.roster_path) {
        Ok(roster) => {
            for recipient in roster {
                if !matches_filters(config, &recipient) {
                    continue;
                }

                process(config, &mailer, &recipient, &mut report);
                report.processed += 1;

                if config.batch.limit > 0 && report.processed >= config.batch.limit {
                    info!("Limit reached ({}). Stopping.", config.batch.limit);
                    break;
                }
                std::thread::sleep(config.delay);
            }
        }
        Err(e) => error!("{}", e),
    }

    if report.processed == 0 {
        if let Some(adhoc_email) = config.batch.adhoc_email.as_deref() {
            let name = config.batch.adhoc_name.trim();
            let name = if name.is_empty() { "Test Recipient" } else { name };
            let recipient = Recipient {
                name: name.to_string(),
                email: adhoc_email.trim().to_string(),
            };
            info!("Ad-hoc send to {} <{}>", recipient.name, recipient.email);
            process(config, &mailer, &recipient, &mut report);
        }
    }

    report
}

fn process(config: &Config, mailer: &Mailer, recipient: &Recipient, report: &mut BatchReport) {
    if let Err(e) = process_one(config, mailer, recipient, report) {
        error!("Failed for {} <{}>: {}", recipient.name, recipient.email, e);
        report.failures.push(RecipientFailure {
            name: recipient.name.clone(),
            email: recipient.email.clone(),
            reason: e.to_string(),
        });
    }
}

fn process_one(
    config: &Config,
    mailer: &Mailer,
    recipient: &Recipient,
    report: &mut BatchReport,
) -> Result<()> {
    let cert_path = config
        .output_dir
        .join(format!("{}.pdf", slugify(&recipient.name)));
    compose_certificate(config, &recipient.name, &cert_path)?;
    report.generated += 1;

    if config.batch.dry_run {
        info!("[DRY_RUN] Would email {} with {}", recipient.email, cert_path.display());
        report.simulated += 1;
    } else {
        let body = config.body_for(&recipient.name);
        let attachment = config.batch.attach.then_some(cert_path.as_path());
        mailer.send(&recipient.email, &config.subject, &body, attachment)?;
        report.sent += 1;
    }
    Ok(())
}

// Unicode case folding, so a `--only-name Müller` filter matches `MÜLLER`.
fn matches_filters(config: &Config, recipient: &Recipient) -> bool {
    if let Some(email) = &config.batch.only_email {
        if recipient.email.to_lowercase() != email.to_lowercase() {
            return false;
        }
    }
    if let Some(name) = &config.batch.only_name {
        if recipient.name.to_lowercase() != name.to_lowercase() {
            return false;
        }
    }
    true
}

/// Deterministic file stem for a recipient: lowercased, spaces and anything
/// outside [a-z0-9_-] replaced with underscores.
fn slugify(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests_support::test_config;
    use crate::pdf::compose::tests::write_base;
    use std::path::Path;

    fn setup(dir: &Path, roster: &str) -> Config {
        let config = test_config(dir);
        write_base(&config.base_cert, 842.0, 595.0);
        std::fs::write(&config.roster_path, roster).unwrap();
        config
    }

    fn roster_rows(n: usize) -> String {
        let mut content = String::from("name,email\n");
        for i in 0..n {
            content.push_str(&format!("Person {},person{}@example.com\n", i, i));
        }
        content
    }

    #[test]
    fn test_dry_run_processes_every_valid_row() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path(), &roster_rows(4));

        let report = run(&config);
        assert_eq!(report.processed, 4);
        assert_eq!(report.generated, 4);
        assert_eq!(report.simulated, 4);
        assert_eq!(report.sent, 0);
        assert!(report.failures.is_empty());
        assert!(config.output_dir.join("person_0.pdf").is_file());
    }

    #[test]
    fn test_invalid_rows_do_not_count() {
        let roster = "name,email\n\
            Jane Doe,jane@example.com\n\
            ,missing@example.com\n\
            Bob Smith,bob@example.com\n\
            No Email,\n\
            Eve Jones,eve@example.com\n";
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path(), roster);

        let report = run(&config);
        assert_eq!(report.processed, 3);
        assert_eq!(report.generated, 3);
    }

    #[test]
    fn test_limit_stops_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), &roster_rows(10));
        config.batch.limit = 3;

        let report = run(&config);
        assert_eq!(report.processed, 3);
        assert_eq!(report.generated, 3);
        assert!(!config.output_dir.join("person_3.pdf").exists());
    }

    #[test]
    fn test_name_filter_is_case_insensitive() {
        let roster = "name,email\njane doe,jane@example.com\nBob,bob@example.com\n";
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), roster);
        config.batch.only_name = Some("Jane Doe".to_string());

        let report = run(&config);
        assert_eq!(report.processed, 1);
        assert!(config.output_dir.join("jane_doe.pdf").is_file());
    }

    #[test]
    fn test_name_filter_folds_unicode_case() {
        let roster = "name,email\nmüller,mueller@example.com\nBob,bob@example.com\n";
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), roster);
        config.batch.only_name = Some("MÜLLER".to_string());

        let report = run(&config);
        assert_eq!(report.processed, 1);
        assert!(config.output_dir.join("m_ller.pdf").is_file());
    }

    #[test]
    fn test_email_filter() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), &roster_rows(3));
        config.batch.only_email = Some("PERSON1@example.com".to_string());

        let report = run(&config);
        assert_eq!(report.processed, 1);
        assert!(config.output_dir.join("person_1.pdf").is_file());
    }

    #[test]
    fn test_adhoc_fallback_on_empty_roster() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), "name,email\n");
        config.batch.adhoc_email = Some("a@b.com".to_string());

        let report = run(&config);
        assert_eq!(report.processed, 0);
        assert_eq!(report.generated, 1);
        assert_eq!(report.simulated, 1);
        assert!(config.output_dir.join("test_recipient.pdf").is_file());
    }

    #[test]
    fn test_adhoc_fallback_on_missing_roster() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        write_base(&config.base_cert, 842.0, 595.0);
        config.batch.adhoc_email = Some("a@b.com".to_string());
        config.batch.adhoc_name = "Grace Hopper".to_string();

        let report = run(&config);
        assert_eq!(report.generated, 1);
        assert!(config.output_dir.join("grace_hopper.pdf").is_file());
    }

    #[test]
    fn test_no_adhoc_when_roster_produced_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), &roster_rows(1));
        config.batch.adhoc_email = Some("a@b.com".to_string());

        let report = run(&config);
        assert_eq!(report.processed, 1);
        assert_eq!(report.generated, 1);
        assert!(!config.output_dir.join("test_recipient.pdf").exists());
    }

    #[test]
    fn test_missing_base_certificate_is_recorded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::write(&config.roster_path, roster_rows(2)).unwrap();

        let report = run(&config);
        assert_eq!(report.processed, 2);
        assert_eq!(report.generated, 0);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures[0].reason.contains("Base certificate"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Jane Doe"), "jane_doe");
        assert_eq!(slugify("  Ada Lovelace "), "ada_lovelace");
        assert_eq!(slugify("Test/File"), "test_file");
        assert_eq!(slugify("Müller"), "m_ller");
    }
}
