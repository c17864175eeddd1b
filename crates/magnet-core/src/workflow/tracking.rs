//! Deliverable assembly helpers: HTML detection, code-fence stripping and
//! lead-tracking script injection.

/// Attribute marking the injected tracking script.
pub const TRACKING_MARKER: &str = "data-magnet-tracking";

/// Insert the tracking `<script>` before the last `</body>`, or append it
/// when there is no body close tag. Idempotent: HTML that already carries
/// the marker attribute is returned unchanged.
pub fn inject_tracking_script(html: &str, job_id: &str, tenant_id: &str, endpoint: &str) -> String {
    if html.contains(TRACKING_MARKER) {
        return html.to_string();
    }

    let script = format!(
        "<script {TRACKING_MARKER}=\"1\" data-job-id=\"{job}\" data-tenant-id=\"{tenant}\">\n\
         (function(){{var d={{job_id:\"{job}\",tenant_id:\"{tenant}\",url:location.href,ts:Date.now()}};\
         try{{navigator.sendBeacon(\"{endpoint}\",JSON.stringify(d));}}catch(e){{}}}})();\n\
         </script>",
        job = escape_attr(job_id),
        tenant = escape_attr(tenant_id),
        endpoint = escape_attr(endpoint),
    );

    // ASCII lowercasing keeps byte offsets aligned with the original.
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + script.len() + 1);
            out.push_str(&html[..pos]);
            out.push_str(&script);
            out.push('\n');
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}\n{script}"),
    }
}

/// Whether generated text is an HTML document rather than Markdown.
pub fn looks_like_html(text: &str) -> bool {
    let head = text.trim_start().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("</html>")
}

/// Remove a surrounding Markdown code fence (```html ... ```), if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string on the opening fence line.
    match body.find('\n') {
        Some(nl) => body[nl + 1..].trim_end(),
        None => body.trim(),
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
