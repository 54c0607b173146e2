use scraper::{Html, Selector};
use tokio::task::spawn_blocking;

use crate::{Error, Result};

/// Parses a rendered page and returns the trimmed text of every element matching `selector`,
/// in document order.
///
/// Parsing happens on the blocking pool since big pages can take a while.
pub async fn select_text(html: String, selector: &str) -> Result<Vec<String>> {
    let selector = create_selector(selector)?;
    let texts = spawn_blocking(move || {
        let doc = Html::parse_document(&html);
        doc.select(&selector)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect::<Vec<_>>()
    })
    .await?;

    Ok(texts)
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::InvalidSelector(sel_str.into()))
}
