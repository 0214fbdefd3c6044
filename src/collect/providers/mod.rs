// src/collect/providers/mod.rs
pub mod baidu;
pub mod gdelt;
pub mod news_rss;

use crate::collect::types::FetchError;

/// Send a GET and return the body of a 2xx response.
pub(crate) async fn get_text(req: reqwest::RequestBuilder) -> Result<String, FetchError> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    Ok(resp.text().await?)
}
