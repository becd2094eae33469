use anyhow::{Context, Result};
use serde::Deserialize;

/// One watched Drive root: a remote folder paired with the secret hook key
/// the provider calls back on and the path prefix its documents publish
/// under.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SiteConfig {
    pub name: String,
    pub hook_key: String,
    pub drive_folder_id: String,
    #[serde(default)]
    pub path_prefix: String,
}

// Load the sites file from a provided path or env var SITES_CONFIG_PATH,
// defaulting to ./sites.json. A missing or malformed file is a startup
// failure.
pub fn load_sites(path: Option<String>) -> Result<Vec<SiteConfig>> {
    let default_path =
        std::env::var("SITES_CONFIG_PATH").unwrap_or_else(|_| "sites.json".to_string());
    let path = path.unwrap_or(default_path);

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read sites config from {}", path))?;

    let sites: Vec<SiteConfig> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid sites config in {}", path))?;

    Ok(sites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_sites_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"[
                {"name": "blog", "hook_key": "k1", "drive_folder_id": "root-1", "path_prefix": "blog"},
                {"name": "docs", "hook_key": "k2", "drive_folder_id": "root-2"}
            ]"#,
        )
        .unwrap();

        let sites = load_sites(Some(file.path().to_str().unwrap().to_string())).unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].path_prefix, "blog");
        assert_eq!(sites[1].path_prefix, "");
        assert_eq!(sites[1].drive_folder_id, "root-2");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_sites(Some("/nonexistent/sites.json".to_string())).unwrap_err();
        assert!(err.to_string().contains("Failed to read sites config"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();

        let err = load_sites(Some(file.path().to_str().unwrap().to_string())).unwrap_err();
        assert!(err.to_string().contains("Invalid sites config"));
    }
}
