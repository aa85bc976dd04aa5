use crate::storage::settings::PodcastSettings;
use crate::types::RankedArticle;
use std::fmt::Write;

pub const SCRIPT_PATH: &str = "/assets/recirc.js";

/// HTML-escape text and attribute values.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Append `utm_source=<source>` to a permalink, keeping any existing query.
pub fn with_tracking(permalink: &str, source: &str) -> String {
    match url::Url::parse(permalink) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("utm_source", source);
            url.to_string()
        }
        Err(_) => {
            let sep = if permalink.contains('?') { '&' } else { '?' };
            let encoded: String = url::form_urlencoded::byte_serialize(source.as_bytes()).collect();
            format!("{permalink}{sep}utm_source={encoded}")
        }
    }
}

/// The ranked list block. Every candidate is emitted; the browser script
/// hides visited items and keeps the first `min_visible` unseen ones.
pub fn top_posts_block(
    heading: &str,
    articles: &[RankedArticle],
    utm_source: &str,
    min_visible: usize,
) -> String {
    let mut items = String::new();
    for article in articles {
        let (Some(id), Some(permalink)) = (article.resolved_id(), article.permalink.as_deref())
        else {
            continue;
        };
        let title = article.title.as_deref().unwrap_or(&article.path);
        let _ = write!(
            items,
            r#"<li class="recirc-top-posts__item" data-post-id="{id}"><a href="{href}">{title}</a></li>"#,
            href = html_escape(&with_tracking(permalink, utm_source)),
            title = html_escape(title),
        );
    }

    format!(
        r#"<aside class="recirc-top-posts" data-recirc-block="top-posts" data-min-visible="{min_visible}"><h3 class="recirc-top-posts__heading">{heading}</h3><ol class="recirc-top-posts__list">{items}</ol></aside>"#,
        heading = html_escape(heading),
    )
}

pub fn podcast_block(podcast: &PodcastSettings) -> String {
    let image = if podcast.image_url.is_empty() {
        String::new()
    } else {
        format!(
            r#"<img class="recirc-podcast__image" src="{}" alt="" loading="lazy">"#,
            html_escape(&podcast.image_url)
        )
    };
    let heading = if podcast.heading.is_empty() {
        String::new()
    } else {
        format!(
            r#"<h3 class="recirc-podcast__heading">{}</h3>"#,
            html_escape(&podcast.heading)
        )
    };
    let description = if podcast.description.is_empty() {
        String::new()
    } else {
        format!(
            r#"<p class="recirc-podcast__description">{}</p>"#,
            html_escape(&podcast.description)
        )
    };

    format!(
        r#"<aside class="recirc-podcast" data-recirc-block="podcast">{heading}<a class="recirc-podcast__link" href="{href}">{image}<strong class="recirc-podcast__title">{title}</strong></a>{description}</aside>"#,
        href = html_escape(&podcast.url),
        title = html_escape(&podcast.title),
    )
}

/// Script tag that records the visit and applies the per-visitor filters.
pub fn tracker_script(public_url: &str, post_id: i64) -> String {
    format!(
        r#"<script src="{src}" data-post-id="{post_id}" defer></script>"#,
        src = html_escape(&format!("{}{SCRIPT_PATH}", public_url.trim_end_matches('/'))),
    )
}
