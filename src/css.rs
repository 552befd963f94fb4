//! CSS content rendering for bundling.
//!
//! Bundled stylesheets are served from the bundle-delivery endpoint, not
//! from their original directory, so every relative `url(...)` reference
//! must be rebased onto the stylesheet's own URL directory before the
//! content is merged. URLs with a known protocol (external fonts, data
//! URIs) pass through untouched.

use std::convert::Infallible;

use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{ParserOptions, StyleSheet};
use lightningcss::values::url::Url;
use lightningcss::visit_types;
use lightningcss::visitor::{Visit, VisitTypes, Visitor};

use crate::utils;

struct UrlRebaser<'a> {
    base_path: &'a str,
}

impl<'i> Visitor<'i> for UrlRebaser<'_> {
    type Error = Infallible;

    fn visit_types(&self) -> VisitTypes {
        visit_types!(URLS)
    }

    fn visit_url(&mut self, url: &mut Url<'i>) -> Result<(), Self::Error> {
        let current = url.url.to_string();
        if !utils::has_known_protocol(&current) {
            url.url = utils::clean_concatenated_url_path(self.base_path, &current).into();
        }
        Ok(())
    }
}

/// Parse a stylesheet, rebase its relative `url(...)` references onto
/// `base_path`, and re-serialize (minified when requested).
///
/// Returns the parse or print error message on failure so the caller can
/// log it and fall back to the verbatim source.
pub(crate) fn rewrite_urls(source: &str, base_path: &str, minify: bool) -> Result<String, String> {
    let mut stylesheet =
        StyleSheet::parse(source, ParserOptions::default()).map_err(|err| err.to_string())?;

    // Error = Infallible
    let _ = stylesheet.visit(&mut UrlRebaser { base_path });

    let output = stylesheet
        .to_css(PrinterOptions {
            minify,
            ..PrinterOptions::default()
        })
        .map_err(|err| err.to_string())?;
    Ok(output.code)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_urls_are_rebased() {
        let out = rewrite_urls(
            ".a { background: url('../img/a.png'); }",
            "/assets/css/",
            false,
        )
        .unwrap();
        assert!(out.contains("/assets/img/a.png"), "got: {out}");
    }

    #[test]
    fn sibling_urls_are_rebased() {
        let out = rewrite_urls(".a { background: url(bg.png); }", "/assets/css/", false).unwrap();
        assert!(out.contains("/assets/css/bg.png"), "got: {out}");
    }

    #[test]
    fn known_protocols_pass_through() {
        let out = rewrite_urls(
            "@font-face { src: url(https://fonts.example.com/a.woff2); }",
            "/assets/css/",
            false,
        )
        .unwrap();
        assert!(out.contains("https://fonts.example.com/a.woff2"));
    }

    #[test]
    fn parse_failure_is_reported() {
        assert!(rewrite_urls("} broken {", "/assets/", false).is_err());
    }

    #[test]
    fn minified_output_strips_whitespace() {
        let out = rewrite_urls(".a {\n  color: red;\n}\n", "/assets/", true).unwrap();
        assert!(!out.contains('\n'));
    }
}
