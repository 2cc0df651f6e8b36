//! HTML rendering of directory listings.
//!
//! Pure functions from listing data to a self-contained document. Anything
//! that came from the backend is escaped before it is placed in markup.

use crate::renegotiate::listing::{DirectoryListing, ListingItem};

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Renders a listing as an HTML document linking `stylesheet`.
///
/// Folders link to their own listing (trailing `/`), files to their content.
pub fn render_listing(listing: &DirectoryListing, stylesheet: &str) -> String {
    let title = escape_html(&listing.path);
    let mut doc = String::with_capacity(512 + listing.items.len() * 160);

    doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    doc.push_str(&format!("<title>Index of {}</title>\n", title));
    doc.push_str(&format!(
        "<link rel=\"stylesheet\" href=\"{}\">\n",
        escape_html(stylesheet)
    ));
    doc.push_str("</head>\n<body>\n");
    doc.push_str(&format!("<h1>Index of {}</h1>\n", title));
    doc.push_str("<table class=\"listing\">\n");
    doc.push_str("<thead><tr><th>Name</th><th>Type</th><th>Size</th></tr></thead>\n<tbody>\n");

    if let Some(parent) = parent_path(&listing.path) {
        doc.push_str(&format!(
            "<tr class=\"parent\"><td><a href=\"{}\">../</a></td><td>folder</td><td>-</td></tr>\n",
            escape_html(&folder_href(parent))
        ));
    }

    for item in &listing.items {
        render_item(&mut doc, item);
    }

    doc.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    doc
}

fn render_item(doc: &mut String, item: &ListingItem) {
    let (class, href, label) = if item.is_folder() {
        ("folder", folder_href(&item.path), format!("{}/", item.name))
    } else {
        ("file", item.path.clone(), item.name.clone())
    };

    let size = match item.size {
        Some(bytes) if !item.is_folder() => format_size(bytes),
        _ => "-".to_string(),
    };

    doc.push_str(&format!(
        "<tr class=\"{class}\"><td><a href=\"{}\">{}</a></td><td>{class}</td><td>{}</td></tr>\n",
        escape_html(&href),
        escape_html(&label),
        size,
    ));
}

/// Minimal document shown in place of a listing that could not be parsed.
pub fn render_error(message: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Listing unavailable</title>\n</head>\n<body>\n<h1>Listing unavailable</h1>\n<p>{}</p>\n</body>\n</html>\n",
        escape_html(message)
    )
}

/// Human-readable size with 1024-based units and one decimal above bytes.
///
/// ```
/// # use vhost_proxy::renegotiate::format_size;
/// assert_eq!(format_size(1023), "1023 B");
/// assert_eq!(format_size(1024), "1.0 KB");
/// assert_eq!(format_size(1_048_576), "1.0 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    match bytes {
        b if b < KB => format!("{} B", b),
        b if b < MB => format!("{:.1} KB", b as f64 / KB as f64),
        b if b < GB => format!("{:.1} MB", b as f64 / MB as f64),
        b => format!("{:.1} GB", b as f64 / GB as f64),
    }
}

/// Escapes text for use in element content and quoted attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn folder_href(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

fn parent_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.rsplit_once('/') {
        Some(("", _)) | None => Some("/"),
        Some((parent, _)) => Some(parent),
    }
}
