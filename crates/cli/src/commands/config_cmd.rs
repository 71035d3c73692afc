//! `rustedclaw config`: Show the effective loader configuration.

use rustedclaw_config::LoaderConfig;

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = LoaderConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let secrets = config.read_secrets()?;

    println!("# {}", config_path().display());
    println!("{}", config.to_toml()?);

    if config.secrets_file.is_some() {
        let mut keys: Vec<&String> = secrets.0.keys().collect();
        keys.sort();
        println!("# secrets: {} key(s), values redacted", keys.len());
        for key in keys {
            println!("#   {key} = [REDACTED]");
        }
    }
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path().display());
    Ok(())
}

fn config_path() -> std::path::PathBuf {
    LoaderConfig::config_dir().join("load.toml")
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = super::config_path();
        assert!(path.to_str().unwrap().ends_with("load.toml"));
    }
}
