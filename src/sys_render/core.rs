//! HTML pages: chrome, breadcrumb header, listing tables, error bodies.
//! All links are relative so pages work behind any path-rewriting proxy.

use std::time::SystemTime;

use crate::{
    sys_listing::{
        core::{EntryInfo, ListingRow},
        selection::Selection,
        sort::{SortColumn, SortOrder, SortState},
    },
    sys_path::core::{RequestPath, encode_path},
    sys_render::format::{format_local_time, format_size},
};

const PAGE_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{TITLE}}</title>
<style>
{{STYLE}}
</style>
</head>
<body>
<h1>{{HEADER}}</h1>
<hr>
{{BODY}}
</body>
</html>
"#;

const PAGE_STYLE: &str = "body { font-family: monospace; }
h1 { margin: 0; }
th, td { text-align: left; padding-right: 2em; }
th { padding-bottom: 0.5em; }
th button { font: inherit; font-weight: bold; border: 0; background: none; padding: 0; cursor: pointer; }
a, a:visited, a:hover, a:active { color: blue; }";

const LISTING_JS: &str = include_str!("../../assets/listing.js");

/// Wrap `body` in the page chrome for `path`.
pub fn render_page(path: &RequestPath, body: &str) -> String {
    apply_template(
        PAGE_TEMPLATE,
        &html_escape(path.base()),
        &render_breadcrumb(path),
        body,
    )
}

fn apply_template(template: &str, title: &str, header: &str, body: &str) -> String {
    template
        .replace("{{TITLE}}", title)
        .replace("{{STYLE}}", PAGE_STYLE)
        .replace("{{HEADER}}", header)
        .replace("{{BODY}}", body)
}

/// One link per path segment, each pointing at its ancestor with a
/// relative `../` chain. For a file path the last segment links to itself.
pub fn render_breadcrumb(path: &RequestPath) -> String {
    let p = path.as_str();
    let dir_like = path.has_trailing_slash();
    let names: Vec<&str> = p.strip_suffix('/').unwrap_or(p).split('/').collect();
    let last = names.len() - 1;

    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mut label = format!("{name}/");
            let mut href = format!(".{}", "/..".repeat(last - i));
            if !dir_like {
                if i == last {
                    label = name.to_string();
                    href = encode_path(path.base());
                } else if let Some(shorter) = href.strip_suffix("/..") {
                    href = shorter.to_string();
                }
            }
            format!(r#"<a href="{}">{}</a>"#, html_escape(&href), html_escape(&label))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Server-rendered listing table, sorted according to `sort`.
/// `entries` is expected to already be in that order.
pub fn render_listing_table(entries: &[EntryInfo], sort: SortState, now: SystemTime) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "<p id=\"selection\">{}</p>\n",
        render_selection_summary(&Selection::finished(entries.len()))
    ));
    out.push_str("<table>\n<thead>\n<tr>\n");
    for (column, label) in [
        (SortColumn::Name, "Name"),
        (SortColumn::Size, "Size"),
        (SortColumn::Date, "Last Modified"),
    ] {
        let marker = match (sort.column == column, sort.order) {
            (true, SortOrder::Asc) => " &#9650;",
            (true, SortOrder::Desc) => " &#9660;",
            (false, _) => "",
        };
        out.push_str(&format!(
            "<th><a href=\"{}\">{}</a>{}</th>\n",
            html_escape(&sort.clicked(column).to_query()),
            label,
            marker
        ));
    }
    out.push_str("</tr>\n</thead>\n<tbody>\n");

    for entry in entries {
        let name = entry.display_name();
        out.push_str("<tr>\n");
        out.push_str(&format!(
            "<td><a href=\"{}\">{}</a></td>\n",
            html_escape(&encode_path(&name)),
            html_escape(&name)
        ));
        if entry.is_dir {
            out.push_str("<td></td>\n");
        } else {
            out.push_str(&format!("<td>{}</td>\n", html_escape(&format_size(entry.size))));
        }
        out.push_str(&format!(
            "<td>{}</td>\n",
            html_escape(&format_local_time(entry.modified, now))
        ));
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

/// The `N of M selected` line shown above a listing.
pub fn render_selection_summary(selection: &Selection) -> String {
    format!("{} of {} selected", selection.selected(), selection.finished_count())
}

/// Listing rows as the JSON array the client engine consumes.
pub fn render_listing_json(entries: &[EntryInfo]) -> Result<String, serde_json::Error> {
    let rows: Vec<ListingRow> = entries.iter().map(ListingRow::from).collect();
    serde_json::to_string(&rows)
}

/// Listing shell plus the data payload for the client-side sort/select engine.
pub fn render_client_listing(entries: &[EntryInfo]) -> Result<String, serde_json::Error> {
    // "</" would end the script element early; "<\/" is the same JSON string.
    let payload = render_listing_json(entries)?.replace("</", "<\\/");

    let mut out = String::new();
    out.push_str(&format!(
        "<p id=\"selection\">{}</p>\n",
        render_selection_summary(&Selection::finished(entries.len()))
    ));
    out.push_str("<p><button id=\"refresh\">Refresh</button> <span id=\"operations\"></span></p>\n");
    out.push_str("<table>\n<thead>\n<tr>\n<th></th>\n");
    out.push_str("<th><button data-column=\"name\">Name</button></th>\n");
    out.push_str("<th><button data-column=\"size\">Size</button></th>\n");
    out.push_str("<th><button data-column=\"date\">Last Modified</button></th>\n");
    out.push_str("</tr>\n</thead>\n<tbody id=\"files\">\n</tbody>\n</table>\n");
    out.push_str("<script>\n");
    out.push_str(LISTING_JS);
    out.push_str(&format!("\nfileInfos = {payload};\nrenderFiles();\n"));
    out.push_str("</script>\n");
    Ok(out)
}

/// Body of an error page: status text followed by the escaped message.
pub fn render_error_body(status_text: &str, message: &str) -> String {
    format!("{}: {}", status_text, html_escape(message))
}

pub fn html_escape(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '&' => "&amp;".into(),
            '<' => "&lt;".into(),
            '>' => "&gt;".into(),
            '"' => "&quot;".into(),
            '\'' => "&#39;".into(),
            _ => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn breadcrumb(p: &str) -> String {
        render_breadcrumb(&RequestPath::normalize(p))
    }

    #[test]
    fn breadcrumb_for_directories() {
        assert_eq!(breadcrumb("/"), r#"<a href=".">/</a>"#);
        assert_eq!(
            breadcrumb("/a/b/"),
            r#"<a href="./../..">/</a> <a href="./..">a/</a> <a href=".">b/</a>"#
        );
    }

    #[test]
    fn breadcrumb_for_files() {
        assert_eq!(
            breadcrumb("/a/x y.txt"),
            r#"<a href="./..">/</a> <a href=".">a/</a> <a href="x%20y.txt">x y.txt</a>"#
        );
    }

    #[test]
    fn page_title_is_escaped_base() {
        let page = render_page(&RequestPath::normalize("/<b>/"), "body");
        assert!(page.contains("<title>&lt;b&gt;</title>"));
        assert!(page.contains("\nbody\n"));
    }

    #[test]
    fn table_rows_link_relative_and_blank_directory_sizes() {
        let now = SystemTime::now();
        let entries = vec![
            EntryInfo {
                name: "a b.txt".into(),
                is_dir: false,
                size: 1536,
                modified: now,
            },
            EntryInfo {
                name: "sub".into(),
                is_dir: true,
                size: 0,
                modified: UNIX_EPOCH + Duration::from_secs(86400 * 365),
            },
        ];
        let html = render_listing_table(&entries, SortState::default(), now);
        assert!(html.contains(r#"<td><a href="a%20b.txt">a b.txt</a></td>"#));
        assert!(html.contains("<td>1.5KiB</td>"));
        assert!(html.contains(r#"<td><a href="sub/">sub/</a></td>"#));
        assert!(html.contains("<td></td>"));
        // Name is the active column, so its header links to descending order.
        assert!(html.contains(r#"<a href="?sort=name&amp;order=desc">Name</a> &#9650;"#));
        assert!(html.contains(r#"<a href="?sort=size&amp;order=asc">Size</a>"#));
        assert!(html.contains(r#"<p id="selection">0 of 2 selected</p>"#));
    }

    #[test]
    fn selection_summary_counts_finished_rows_only() {
        let mut sel = Selection::finished(3);
        sel.toggle(1).unwrap();
        sel.push_pending();
        assert_eq!(render_selection_summary(&sel), "1 of 3 selected");
    }

    #[test]
    fn client_payload_cannot_close_the_script() {
        let entries = vec![EntryInfo {
            name: "</script>".into(),
            is_dir: false,
            size: 1,
            modified: UNIX_EPOCH,
        }];
        let html = render_client_listing(&entries).unwrap();
        assert!(html.contains(r#"fileInfos = [{"name":"<\/script>","size":1,"date":0}];"#));
        assert_eq!(html.matches("</script>").count(), 1);
        assert!(html.contains(r#"<p id="selection">0 of 1 selected</p>"#));
        assert!(html.contains(r#"<button id="refresh">"#));
    }

    #[test]
    fn error_body_escapes_message() {
        assert_eq!(
            render_error_body("Forbidden", "<x> & y"),
            "Forbidden: &lt;x&gt; &amp; y"
        );
    }
}
