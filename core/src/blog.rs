//! Standalone HTML page for sharing a collection.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use tracing::info;

use crate::db::Database;
use crate::models::FoodItem;

/// Render one collection as a self-contained page: inline CSS, photos as
/// `data:` URIs, and a map link per item. Items are newest first.
pub fn render_blog(db: &Database, collection_id: i64) -> Result<String> {
    let collection = db
        .get_collection(collection_id)?
        .ok_or_else(|| anyhow!("Collection {collection_id} not found"))?;
    let items = db.by_collection(collection_id)?;

    let mut html = String::new();

    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
"#,
        html_escape(&collection.name)
    ));
    html.push_str(STYLE);
    html.push_str("</head>\n<body>\n");

    html.push_str(&format!(
        "    <h1>{}</h1>\n",
        html_escape(&collection.name)
    ));
    if let Some(ref description) = collection.description {
        html.push_str(&format!(
            "    <p class=\"intro\">{}</p>\n",
            html_escape(description)
        ));
    }
    html.push_str(&format!(
        "    <div class=\"stats\"><strong>{}</strong> place{}</div>\n",
        items.len(),
        if items.len() == 1 { "" } else { "s" }
    ));

    for item in &items {
        render_item(db, item, &mut html)?;
    }

    html.push_str("</body>\n</html>\n");
    Ok(html)
}

fn render_item(db: &Database, item: &FoodItem, html: &mut String) -> Result<()> {
    html.push_str("    <article class=\"entry\">\n");
    html.push_str(&format!(
        "        <h2>{} <span class=\"rating\">{:.1}/10</span></h2>\n",
        html_escape(&item.name),
        item.rating
    ));
    html.push_str(&format!(
        "        <div class=\"meta\">{} &middot; {} &middot; {}</div>\n",
        html_escape(&item.food_type),
        html_escape(&item.city),
        html_escape(&item.address)
    ));

    if let Some(ref reason) = item.reason {
        html.push_str(&format!(
            "        <p class=\"reason\">{}</p>\n",
            html_escape(reason)
        ));
    }

    if !item.tags.is_empty() {
        html.push_str("        <div class=\"tags\">");
        for tag in &item.tags {
            html.push_str(&format!("<span>{}</span>", html_escape(tag)));
        }
        html.push_str("</div>\n");
    }

    let photos = db.photos_for_item(item.id)?;
    if !photos.is_empty() {
        html.push_str("        <div class=\"photos\">\n");
        for photo in &photos {
            html.push_str(&format!(
                "            <img src=\"data:{};base64,{}\" alt=\"{}\">\n",
                image_mime(&photo.data),
                BASE64.encode(&photo.data),
                html_escape(&item.name)
            ));
        }
        html.push_str("        </div>\n");
    }

    html.push_str(&format!(
        "        <a class=\"map\" href=\"{}\">{:.5}, {:.5}</a>\n",
        html_escape(&map_link(item.latitude, item.longitude)),
        item.latitude,
        item.longitude
    ));
    html.push_str("    </article>\n");
    Ok(())
}

/// Render and write the page. Returns the number of items on it.
pub fn write_blog(db: &Database, collection_id: i64, path: &Path) -> Result<usize> {
    let html = render_blog(db, collection_id)?;
    let count = db.count_items_in_collection(collection_id)?;
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(html.as_bytes())?;
    info!(collection_id, items = count, path = %path.display(), "Wrote blog page");
    Ok(usize::try_from(count).unwrap_or_default())
}

fn map_link(latitude: f64, longitude: f64) -> String {
    format!(
        "https://www.openstreetmap.org/?mlat={latitude:.6}&mlon={longitude:.6}#map=17/{latitude:.6}/{longitude:.6}"
    )
}

// Sniffed from magic bytes; ingested photos are JPEG but imports may carry anything.
fn image_mime(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if data.starts_with(b"GIF8") {
        "image/gif"
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "image/webp"
    } else if data.starts_with(b"BM") {
        "image/bmp"
    } else {
        "image/jpeg"
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const STYLE: &str = r"    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 860px;
            margin: 0 auto;
            padding: 20px;
            background: #fdfaf5;
            color: #2b2b2b;
        }
        h1 {
            color: #c0392b;
            border-bottom: 2px solid #c0392b;
            padding-bottom: 10px;
        }
        .intro {
            font-style: italic;
            color: #666;
        }
        .stats {
            margin-bottom: 20px;
            color: #666;
        }
        .entry {
            background: #fff;
            border: 1px solid #e5ded3;
            border-radius: 8px;
            padding: 16px;
            margin-bottom: 20px;
        }
        .entry h2 {
            margin: 0 0 6px 0;
            font-size: 20px;
        }
        .rating {
            color: #e67e22;
            font-size: 16px;
            margin-left: 8px;
        }
        .meta {
            font-size: 13px;
            color: #888;
        }
        .reason {
            line-height: 1.6;
        }
        .tags span {
            display: inline-block;
            background: #f3ede4;
            border-radius: 4px;
            padding: 2px 8px;
            margin-right: 6px;
            font-size: 12px;
        }
        .photos img {
            max-width: 100%;
            border-radius: 6px;
            margin-top: 10px;
        }
        .map {
            display: inline-block;
            margin-top: 10px;
            font-size: 13px;
            color: #2980b9;
        }
    </style>
";
