//! Asset cache commands.

use super::CliFacade;

/// Fetches `url` into the cache.
pub async fn fetch(facade: &CliFacade, url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let body = facade.cache_asset(url).await?;
    println!("Cached {} ({} bytes)", url, body.len());
    Ok(())
}

/// Stores `content` under `url` without fetching.
pub fn store(
    facade: &CliFacade,
    url: &str,
    content: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    facade.cache_asset_content(url, content)?;
    println!("Cached {} ({} bytes)", url, content.len());
    Ok(())
}

/// Prints the cached body for `url`.
pub fn show(facade: &CliFacade, url: &str) -> Result<(), Box<dyn std::error::Error>> {
    match facade.get_cached_asset(url)? {
        Some(content) => {
            println!("{content}");
            Ok(())
        }
        None => Err(format!("No cached asset for {url}").into()),
    }
}
