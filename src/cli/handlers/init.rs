use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::cli::commands::InitArgs;
use crate::io::dataset_io::{
    self, CATEGORIES_FILE, CONFIG_FILE, DATA_DIR, ENTRIES_FILE, INDICATORS_FILE, PERIODS_FILE,
};

const KPI_TOML_TEMPLATE: &str = r##"[organization]
name = "{name}"

[dates]
# Offset whose midnight ends each period's last day
utc_offset_hours = 7

[urgency]
due_soon_days = 7
overdue_points = 100
due_soon_points = 50
progress_penalty = 25

[view]
# "default" (incomplete first) or "deadline" (most pressing first)
default_mode = "default"
"##;

const EMPTY_LIST: &str = "[]\n";

/// Infer an organization name from a directory name: replace hyphens with spaces, title-case.
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    upper + &chars.collect::<String>()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn cmd_init(args: InitArgs, dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = dir.join(DATA_DIR);

    if data_dir.is_dir() && !args.force {
        return Err("kpi dataset already exists in ./kpi/ (use --force to reinitialize)".into());
    }

    // Check for parent dataset and warn
    if let Some(parent) = dir.parent()
        && let Ok(parent_root) = dataset_io::discover_dataset(parent)
    {
        eprintln!(
            "Note: parent dataset found at {}/",
            parent_root.join(DATA_DIR).display()
        );
        eprintln!("Creating new dataset in ./kpi/");
    }

    let name = args.name.unwrap_or_else(|| {
        dir.file_name()
            .and_then(|n| n.to_str())
            .map(infer_name)
            .unwrap_or_else(|| "Untitled".to_string())
    });

    fs::create_dir_all(&data_dir)?;
    fs::write(
        data_dir.join(CONFIG_FILE),
        KPI_TOML_TEMPLATE.replace("{name}", &name),
    )?;

    // Existing data files survive --force
    for file in [INDICATORS_FILE, PERIODS_FILE, CATEGORIES_FILE, ENTRIES_FILE] {
        let path = data_dir.join(file);
        if !path.exists() {
            fs::write(path, EMPTY_LIST)?;
        }
    }

    info!(name = %name, dir = %data_dir.display(), "dataset initialized");
    println!("Initialized kpi dataset: {}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::KpiConfig;

    #[test]
    fn test_infer_name() {
        assert_eq!(infer_name("city-hospital"), "City Hospital");
        assert_eq!(infer_name("clinic"), "Clinic");
        assert_eq!(infer_name("a-b-c"), "A B C");
    }

    #[test]
    fn template_parses_as_config() {
        let text = KPI_TOML_TEMPLATE.replace("{name}", "Clinic");
        let config: KpiConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.organization.name, "Clinic");
        assert_eq!(config.urgency.due_soon_days, 7);
    }
}
