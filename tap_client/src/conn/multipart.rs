//! `multipart/form-data` bodies for uploads.

/// Boundary understood by TAP+ upload services.
pub const BOUNDARY: &str = "----------lImIt_of_THE_fIle_eW_$";

const CRLF: &str = "\r\n";

/// A file part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFile {
    /// Form field name (`FILE` for table uploads, the table name for
    /// `UPLOAD` parameters).
    pub field_name: String,
    pub file_name: String,
    pub content: Vec<u8>,
}

impl MultipartFile {
    pub fn new(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            content: content.into(),
        }
    }
}

/// Guess a part content type from a file name.
///
/// VOTable and FITS extensions are not in the MIME registry and are mapped here.
pub fn content_type_for(file_name: &str) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "vot" => "text/xml".to_string(),
        "fits" | "fit" => "application/fits".to_string(),
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string(),
    }
}

/// Encode form fields and files. Returns the request `Content-Type` and the body.
pub fn encode_multipart(fields: &[(&str, &str)], files: &[MultipartFile]) -> (String, Vec<u8>) {
    let mut body: Vec<u8> = Vec::new();

    for (name, value) in fields {
        push_line(&mut body, &format!("--{}", BOUNDARY));
        push_line(
            &mut body,
            &format!("Content-Disposition: form-data; name=\"{}\"", name),
        );
        push_line(&mut body, "");
        push_line(&mut body, value);
    }

    for file in files {
        push_line(&mut body, &format!("--{}", BOUNDARY));
        push_line(
            &mut body,
            &format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
                file.field_name, file.file_name
            ),
        );
        push_line(
            &mut body,
            &format!("Content-Type: {}", content_type_for(&file.file_name)),
        );
        push_line(&mut body, "");
        body.extend_from_slice(&file.content);
        body.extend_from_slice(CRLF.as_bytes());
    }

    push_line(&mut body, &format!("--{}--", BOUNDARY));
    push_line(&mut body, "");

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

fn push_line(body: &mut Vec<u8>, line: &str) {
    body.extend_from_slice(line.as_bytes());
    body.extend_from_slice(CRLF.as_bytes());
}
