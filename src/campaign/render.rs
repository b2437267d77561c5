//! Per-recipient content pipeline: template substitution, tracking-pixel
//! injection, and click-tracking link rewriting.

use std::collections::HashMap;

use regex::Regex;

use super::model::CampaignRecipient;

/// Where open/click tracking endpoints live.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Base URL of the tracking endpoints, no trailing slash
    /// (e.g. `https://app.example.com/api/track`).
    pub base_url: String,
}

impl TrackingConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// 1x1 pixel URL for a recipient's open tracking.
    pub fn open_url(&self, tracking_id: &str) -> String {
        format!("{}/open/{}", self.base_url, tracking_id)
    }

    /// Redirect URL wrapping an outbound link for click tracking.
    pub fn click_url(&self, tracking_id: &str, target: &str) -> String {
        format!(
            "{}/click/{}?url={}",
            self.base_url,
            tracking_id,
            urlencoding::encode(target)
        )
    }
}

/// Substitute `{{key}}` placeholders with their values.
///
/// Literal textual replacement only: no nested evaluation, unknown keys are
/// left in place.
pub fn render_template(template: &str, vars: &HashMap<String, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in vars {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
    }
    rendered
}

/// The variables available to a campaign's templates for one recipient.
pub fn recipient_vars(recipient: &CampaignRecipient) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("email".to_string(), recipient.email.clone());
    if let Some(ref nombre) = recipient.nombre {
        vars.insert("nombre".to_string(), nombre.clone());
    }
    if let Some(ref empresa) = recipient.empresa_nombre {
        vars.insert("empresa_nombre".to_string(), empresa.clone());
    }
    vars
}

/// Inject an open-tracking pixel before the closing body tag, or append it
/// when the HTML has none.
pub fn inject_tracking_pixel(html: &str, pixel_url: &str) -> String {
    let pixel = format!(
        "<img src=\"{pixel_url}\" width=\"1\" height=\"1\" style=\"display:none\" alt=\"\"/>"
    );
    if let Some(idx) = html.rfind("</body>") {
        let mut out = String::with_capacity(html.len() + pixel.len());
        out.push_str(&html[..idx]);
        out.push_str(&pixel);
        out.push_str(&html[idx..]);
        out
    } else {
        format!("{html}{pixel}")
    }
}

/// Rewrite every `http(s)` link through the click-tracking redirect.
///
/// Links already pointing at the tracking origin and unsubscribe links are
/// left untouched.
pub fn rewrite_links(html: &str, tracking: &TrackingConfig, tracking_id: &str) -> String {
    // href attributes with an absolute http(s) URL
    let re = Regex::new(r#"href="(https?://[^"]+)""#).expect("link pattern is valid");
    re.replace_all(html, |caps: &regex::Captures<'_>| {
        let target = &caps[1];
        if target.starts_with(&tracking.base_url) || is_unsubscribe_link(target) {
            caps[0].to_string()
        } else {
            format!("href=\"{}\"", tracking.click_url(tracking_id, target))
        }
    })
    .into_owned()
}

fn is_unsubscribe_link(url: &str) -> bool {
    let url = url.to_lowercase();
    url.contains("unsubscribe") || url.contains("darse-de-baja")
}
