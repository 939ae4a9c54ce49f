//! Hooks that rewrite the rendered envelope before it is sent.

use tracing::debug;

use super::client::Client;

/// Rewrites the outgoing request body. A doctor may also adjust the client,
/// e.g. its location or request headers, before the request goes out.
pub trait Doctor {
    fn treat(&self, client: &mut Client, xml: String) -> String;
}

impl<F> Doctor for F
where
    F: Fn(&mut Client, String) -> String,
{
    fn treat(&self, client: &mut Client, xml: String) -> String {
        self(client, xml)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub content_id: String,
    pub content_type: String,
    pub body: String,
}

/// Sends the envelope as the root part of a `multipart/related` message,
/// followed by text attachments.
#[derive(Debug, Clone)]
pub struct Multipart {
    boundary: String,
    attachments: Vec<Attachment>,
}

const ROOT_ID: &str = "<rootpart@lather>";

impl Multipart {
    pub fn new<S: Into<String>>(boundary: S) -> Self {
        Self {
            boundary: boundary.into(),
            attachments: Vec::new(),
        }
    }

    pub fn attach<I, T, B>(mut self, content_id: I, content_type: T, body: B) -> Self
    where
        I: Into<String>,
        T: Into<String>,
        B: Into<String>,
    {
        self.attachments.push(Attachment {
            content_id: content_id.into(),
            content_type: content_type.into(),
            body: body.into(),
        });
        self
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    fn part(&self, out: &mut String, content_type: &str, content_id: &str, body: &str) {
        out.push_str("--");
        out.push_str(&self.boundary);
        out.push_str("\r\nContent-Type: ");
        out.push_str(content_type);
        out.push_str("\r\nContent-ID: ");
        out.push_str(content_id);
        out.push_str("\r\n\r\n");
        out.push_str(body);
        out.push_str("\r\n");
    }
}

impl Doctor for Multipart {
    fn treat(&self, client: &mut Client, xml: String) -> String {
        let envelope_type = client.version().content_type(None);
        let media_type = envelope_type
            .split(';')
            .next()
            .unwrap_or_default()
            .to_owned();

        let mut out = String::new();
        self.part(&mut out, &envelope_type, ROOT_ID, &xml);

        for attachment in &self.attachments {
            let content_id = format!("<{}>", attachment.content_id);
            self.part(&mut out, &attachment.content_type, &content_id, &attachment.body);
        }

        out.push_str("--");
        out.push_str(&self.boundary);
        out.push_str("--\r\n");

        debug!(attachments = self.attachments.len(), "wrapped envelope as multipart");

        client.set_header(
            "Content-Type",
            format!(
                "multipart/related; type=\"{}\"; start=\"{}\"; boundary=\"{}\"",
                media_type, ROOT_ID, self.boundary
            ),
        );

        out
    }
}
