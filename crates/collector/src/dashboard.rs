//! HTML dashboard listing the current snapshots

use stats_core::Snapshot;
use std::fmt::Write;

const HEADER: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8" />
  <title>Docker Stats Dashboard</title>
</head>
<body>
  <h1>Docker Stats Dashboard</h1>
  <table border="1" cellpadding="8" cellspacing="0">
    <thead>
      <tr>
        <th>Instance ID</th>
        <th>Images Size (GB)</th>
        <th>Last Update</th>
        <th>Prune Action</th>
        <th>Manual Prune</th>
      </tr>
    </thead>
    <tbody>
"#;

const FOOTER: &str = r#"    </tbody>
  </table>
</body>
</html>
"#;

/// Escape text for HTML element content and quoted attributes
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the dashboard. Rows appear in the order given.
pub fn render(snapshots: &[Snapshot]) -> String {
    let mut html = String::from(HEADER);

    for snapshot in snapshots {
        let id = escape_html(&snapshot.instance_id);
        let query: String =
            url::form_urlencoded::byte_serialize(snapshot.instance_id.as_bytes()).collect();
        // Writing into a String cannot fail.
        let _ = write!(
            html,
            "      <tr>\n        <td>{id}</td>\n        <td>{size:.2}</td>\n        <td>{ts}</td>\n        <td>{prune}</td>\n        <td>\n          <form method=\"POST\" action=\"/api/prune?instance={action}\">\n            <button type=\"submit\">Prune</button>\n          </form>\n        </td>\n      </tr>\n",
            id = id,
            size = snapshot.images_size_gb,
            ts = escape_html(&snapshot.timestamp),
            prune = snapshot.prune_action,
            action = escape_html(&query),
        );
    }

    html.push_str(FOOTER);
    html
}
