use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use crate::models::SiteConfig;

/// Directory holding one JSON config per dynamic site.
pub fn default_sites_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobmatch") {
        Ok(proj_dirs.config_dir().join("sites"))
    } else {
        Ok(PathBuf::from("sites"))
    }
}

/// Load every `*.json` site config in `dir`, sorted by file name so the
/// factory's registration order is deterministic. Malformed files are
/// skipped with a warning; a missing directory means no dynamic sites.
pub fn load_site_configs(dir: &Path) -> Result<Vec<SiteConfig>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut configs = Vec::new();
    for path in paths {
        match read_site_config(&path) {
            Ok(config) => configs.push(config),
            Err(e) => eprintln!("Warning: skipping {}: {e}", path.display()),
        }
    }
    Ok(configs)
}

fn read_site_config(path: &Path) -> Result<SiteConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: SiteConfig =
        serde_json::from_str(&raw).context("Invalid site config JSON")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &SiteConfig) -> Result<()> {
    if config.name.trim().is_empty() {
        return Err(anyhow!("Site config needs a non-empty name"));
    }
    if config.url_pattern.trim().is_empty() {
        return Err(anyhow!("Site config needs a non-empty urlPattern"));
    }
    if config.selectors.title.trim().is_empty()
        || config.selectors.company.trim().is_empty()
        || config.selectors.description.trim().is_empty()
    {
        return Err(anyhow!(
            "Site config needs title, company, and description selectors"
        ));
    }
    Ok(())
}

/// Validate and install a config file into the registry directory, named
/// after the config's own name.
pub fn add_site_config(dir: &Path, file: &Path) -> Result<SiteConfig> {
    let config = read_site_config(file)?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let dest = dir.join(format!("{}.json", config.name));
    let raw = serde_json::to_string_pretty(&config)?;
    std::fs::write(&dest, raw)
        .with_context(|| format!("Failed to write {}", dest.display()))?;
    Ok(config)
}

/// Remove a config by name. Returns false when no such config exists.
pub fn remove_site_config(dir: &Path, name: &str) -> Result<bool> {
    let path = dir.join(format!("{name}.json"));
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(&path)
        .with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "jobmatch-sites-test-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    const VALID: &str = r#"{
        "name": "boards",
        "urlPattern": "boards.example.io",
        "selectors": {
            "title": "h2.posting-headline",
            "company": ".employer",
            "description": ".posting-body"
        }
    }"#;

    #[test]
    fn test_load_missing_dir_is_empty() {
        let dir = std::env::temp_dir().join("jobmatch-sites-test-missing");
        let _ = std::fs::remove_dir_all(&dir);
        assert!(load_site_configs(&dir).unwrap().is_empty());
    }

    #[test]
    fn test_load_skips_malformed_and_sorts_by_file_name() {
        let dir = temp_dir("load");
        std::fs::write(dir.join("b-boards.json"), VALID).unwrap();
        std::fs::write(
            dir.join("a-other.json"),
            VALID.replace("boards", "other"),
        )
        .unwrap();
        std::fs::write(dir.join("broken.json"), "{nope").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let configs = load_site_configs(&dir).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].name, "other");
        assert_eq!(configs[1].name, "boards");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_add_and_remove_round_trip() {
        let dir = temp_dir("add");
        let source = dir.join("incoming.json");
        std::fs::write(&source, VALID).unwrap();

        let config = add_site_config(&dir, &source).unwrap();
        assert_eq!(config.name, "boards");
        assert!(dir.join("boards.json").exists());

        assert!(remove_site_config(&dir, "boards").unwrap());
        assert!(!remove_site_config(&dir, "boards").unwrap());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_validation_rejects_empty_selectors() {
        let dir = temp_dir("invalid");
        let source = dir.join("bad.json");
        std::fs::write(
            &source,
            r#"{"name": "x", "urlPattern": "y", "selectors": {"title": "", "company": "c", "description": "d"}}"#,
        )
        .unwrap();
        assert!(add_site_config(&dir, &source).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
