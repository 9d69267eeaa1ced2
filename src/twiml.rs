//! Voice instruction markup returned to the telephony provider.
//!
//! The provider drives each call leg by POSTing to our webhooks and executing
//! the XML document we answer with, verb by verb. Only the handful of verbs
//! this server actually uses are modeled.

use axum::http::header;
use axum::response::{IntoResponse, Response};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verb {
    Say(String),
    Pause(u32),
    Redirect(String),
    Dial(String),
    Hangup,
}

/// Builder for one voice instruction document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `text` to the caller.
    pub fn say(mut self, text: &str) -> Self {
        self.verbs.push(Verb::Say(text.to_string()));
        self
    }

    /// Silence for `seconds` before the next verb.
    pub fn pause(mut self, seconds: u32) -> Self {
        self.verbs.push(Verb::Pause(seconds));
        self
    }

    /// Tell the provider to POST to `url` for the next instruction set.
    pub fn redirect(mut self, url: &str) -> Self {
        self.verbs.push(Verb::Redirect(url.to_string()));
        self
    }

    /// Bridge the leg to `number`.
    pub fn dial(mut self, number: &str) -> Self {
        self.verbs.push(Verb::Dial(number.to_string()));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// True when the document hands control back to us via a redirect.
    pub fn has_redirect(&self) -> bool {
        self.verbs
            .iter()
            .any(|v| matches!(v, Verb::Redirect(_)))
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");
        for verb in &self.verbs {
            match verb {
                Verb::Say(text) => {
                    xml.push_str("<Say>");
                    xml.push_str(&escape(text));
                    xml.push_str("</Say>");
                }
                Verb::Pause(seconds) => {
                    xml.push_str(&format!("<Pause length=\"{}\"/>", seconds));
                }
                Verb::Redirect(url) => {
                    xml.push_str("<Redirect>");
                    xml.push_str(&escape(url));
                    xml.push_str("</Redirect>");
                }
                Verb::Dial(number) => {
                    xml.push_str("<Dial>");
                    xml.push_str(&escape(number));
                    xml.push_str("</Dial>");
                }
                Verb::Hangup => xml.push_str("<Hangup/>"),
            }
        }
        xml.push_str("</Response>");
        xml
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

impl IntoResponse for VoiceResponse {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "text/xml")], self.to_xml()).into_response()
    }
}
