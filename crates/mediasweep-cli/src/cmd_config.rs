use crate::config::Config;
use std::path::Path;

pub fn execute(config: &Config, path: &Path) -> anyhow::Result<()> {
    println!("# {}", path.display());
    print!("{}", serde_yaml::to_string(&config.masked())?);
    let server = config.server_name.as_deref().unwrap_or("(homeserver host)");
    println!("# summary server label: {server}");
    Ok(())
}
