use std::path::Path;

/// Content types the server recognizes on requests and produces on
/// responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    TextHtml,
    TextPlain,
    TextCss,
    TextJavascript,
    ApplicationJson,
    FormUrlEncoded,
    OctetStream,
    ImagePng,
    ImageJpeg,
}

const TABLE: &[(ContentType, &str)] = &[
    (ContentType::TextHtml, "text/html"),
    (ContentType::TextPlain, "text/plain"),
    (ContentType::TextCss, "text/css"),
    (ContentType::TextJavascript, "text/javascript"),
    (ContentType::ApplicationJson, "application/json"),
    (ContentType::FormUrlEncoded, "application/x-www-form-urlencoded"),
    (ContentType::OctetStream, "application/octet-stream"),
    (ContentType::ImagePng, "image/png"),
    (ContentType::ImageJpeg, "image/jpeg"),
];

impl ContentType {
    /// Looks up a `Content-Type` header value. Parameters after `;` are
    /// ignored and the comparison is case-insensitive.
    pub fn from_str(s: &str) -> Option<Self> {
        let essence = s.split(';').next().unwrap_or("").trim();
        TABLE
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(essence))
            .map(|(ty, _)| *ty)
    }

    pub fn as_str(&self) -> &'static str {
        TABLE
            .iter()
            .find(|(ty, _)| ty == self)
            .map(|(_, name)| *name)
            .unwrap_or("application/octet-stream")
    }

    /// MIME type string for a file, guessed from its extension.
    pub fn for_path(path: &Path) -> String {
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_owned()
    }
}
