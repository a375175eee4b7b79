//! Static info and legal pages.
//!
//! The texts are built in; `{store}` and `{email}` placeholders are filled
//! from `[store]` settings and the result is wrapped in a minimal HTML page.

use crate::{
    config::settings::StoreSettings,
    errors::{Error, Result},
};

/// A static page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPage {
    /// URL slug under `/pages/`
    pub slug: &'static str,
    /// Page title
    pub title: &'static str,
    body: &'static str,
}

/// All built-in pages
pub const PAGES: &[StaticPage] = &[
    StaticPage {
        slug: "about",
        title: "About",
        body: "{store} sells digital goods made by independent creators: templates, \
               UI kits, fonts, icon sets and more.\n\
               Every purchase is delivered instantly as a download from your order page.",
    },
    StaticPage {
        slug: "terms",
        title: "Terms of Service",
        body: "By purchasing from {store} you receive a personal, non-transferable \
               license to use the files you bought.\n\
               You may not resell or redistribute the files, whether modified or not.\n\
               We may update these terms; the version in force at the time of purchase applies.",
    },
    StaticPage {
        slug: "privacy",
        title: "Privacy Policy",
        body: "{store} stores your email, name and order history to deliver your purchases.\n\
               Payments are handled by our payment provider; we never see your card details.\n\
               Write to {email} to have your account and data removed.",
    },
    StaticPage {
        slug: "refund-policy",
        title: "Refund Policy",
        body: "Because digital files cannot be returned, sales are final once a file \
               has been downloaded.\n\
               If a file is broken or not as described, contact {email} within 14 days \
               and we will fix it or refund you.",
    },
    StaticPage {
        slug: "contact",
        title: "Contact",
        body: "Questions about an order? Email {email} and include your order number.\n\
               For custom work, use the service request form and {store} will get back to you.",
    },
];

/// Finds a built-in page by slug.
///
/// # Errors
/// Returns `NotFound` for an unknown slug.
pub fn find_page(slug: &str) -> Result<&'static StaticPage> {
    PAGES
        .iter()
        .find(|page| page.slug == slug)
        .ok_or_else(|| Error::not_found("Page", slug))
}

/// Escapes text for HTML element content and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

impl StaticPage {
    /// Body text with the store placeholders filled in.
    #[must_use]
    pub fn text(&self, store: &StoreSettings) -> String {
        self.body
            .replace("{store}", &store.name)
            .replace("{email}", &store.support_email)
    }

    /// The page as a standalone HTML document.
    #[must_use]
    pub fn render_html(&self, store: &StoreSettings) -> String {
        let title = escape_html(&format!("{} | {}", self.title, store.name));
        let heading = escape_html(self.title);
        let paragraphs: String = self
            .text(store)
            .lines()
            .map(|line| format!("<p>{}</p>\n", escape_html(line)))
            .collect();
        format!(
            "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{title}</title>\n</head>\n<body>\n<main>\n<h1>{heading}</h1>\n\
             {paragraphs}</main>\n</body>\n</html>\n"
        )
    }
}

/// Renders the page at `slug` for this store.
pub fn render_page(slug: &str, store: &StoreSettings) -> Result<String> {
    Ok(find_page(slug)?.render_html(store))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn store() -> StoreSettings {
        StoreSettings {
            name: "Pixel & Co".to_string(),
            support_email: "help@pixel.test".to_string(),
            ..StoreSettings::default()
        }
    }

    #[test]
    fn test_every_page_renders() {
        for slug in ["about", "terms", "privacy", "refund-policy", "contact"] {
            let html = render_page(slug, &store()).unwrap();
            assert!(html.starts_with("<!doctype html>"));
            assert!(!html.contains("{store}"));
            assert!(!html.contains("{email}"));
        }
    }

    #[test]
    fn test_placeholders_are_substituted_and_escaped() {
        let html = render_page("contact", &store()).unwrap();
        assert!(html.contains("help@pixel.test"));
        assert!(html.contains("Pixel &amp; Co"));
        assert!(html.contains("<title>Contact | Pixel &amp; Co</title>"));
    }

    #[test]
    fn test_unknown_page() {
        assert!(matches!(
            render_page("careers", &store()),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
