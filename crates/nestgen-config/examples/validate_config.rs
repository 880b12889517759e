use std::env;
use std::path::PathBuf;

use nestgen_config::{ConfigError, ValidationReport, load_config};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("missing config path")?;

    let validated = match load_config(&path) {
        Ok(validated) => validated,
        Err(ConfigError::Invalid(report)) => {
            eprintln!("config validation failed");
            print_report(&report);
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    if validated.warnings.is_empty() {
        println!("config validated successfully");
    } else {
        eprintln!("config validated with warnings:");
        print_report(&ValidationReport {
            errors: Vec::new(),
            warnings: validated.warnings,
        });
    }

    Ok(())
}

fn print_report(report: &ValidationReport) {
    for issue in report.issues() {
        eprintln!("{issue}");
    }
}
