use reqwest::Url;

use crate::error::ProviderError;

/// Validate the RPC URL and append the API key as its final path segment
/// (the layout used by Alchemy-style endpoints, `.../v2/<key>`).
pub(super) fn build_endpoint(connection: &str, api_key: Option<&str>) -> Result<Url, ProviderError> {
    let mut url = Url::parse(connection).map_err(|e| {
        ProviderError::Config(format!(
            "invalid connection `{connection}`: expected HTTP(S) URL ({e})"
        ))
    })?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ProviderError::Config(format!(
                "unsupported connection scheme `{other}`; expected http or https"
            )));
        }
    }

    let Some(key) = api_key else {
        return Ok(url);
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(ProviderError::Config("api key must not be empty".to_owned()));
    }

    url.path_segments_mut()
        .map_err(|()| {
            ProviderError::Config(format!("connection `{connection}` cannot take a path"))
        })?
        .pop_if_empty()
        .push(key);
    Ok(url)
}

/// The endpoint with its path removed, safe to log.
pub(super) fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_path("");
    shown.set_query(None);
    shown.to_string()
}
