//! `multipart/form-data` decoding.

use std::collections::BTreeMap;

use weft_model::{Parameters, UploadedFile};

use crate::error::UploadError;

/// Text fields and uploaded files of a decoded multipart body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub parameters: Parameters,
    /// Uploaded files by field name. A file input left empty is omitted.
    pub files: BTreeMap<String, UploadedFile>,
}

#[derive(Debug, Default)]
struct PartHeaders {
    name: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
}

/// Decode a multipart body, rejecting it up front when it exceeds `limit`.
pub fn decode_multipart(
    body: &[u8],
    boundary: Option<&str>,
    limit: u64,
) -> Result<MultipartForm, UploadError> {
    let actual = body.len() as u64;
    if actual > limit {
        return Err(UploadError::SizeLimitExceeded { limit, actual });
    }
    let boundary = boundary
        .filter(|b| !b.is_empty())
        .ok_or(UploadError::MissingBoundary)?;
    let delimiter = format!("--{boundary}").into_bytes();
    let separator = format!("\r\n--{boundary}").into_bytes();

    let mut form = MultipartForm::default();
    let mut cursor = find(body, &delimiter, 0)
        .ok_or_else(|| UploadError::Malformed("boundary not found".to_string()))?
        + delimiter.len();

    loop {
        let rest = &body[cursor..];
        if rest.starts_with(b"--") {
            return Ok(form);
        }
        if !rest.starts_with(b"\r\n") {
            return Err(UploadError::Malformed(
                "expected line break after boundary".to_string(),
            ));
        }
        cursor += 2;

        let header_end = find(body, b"\r\n\r\n", cursor)
            .ok_or_else(|| UploadError::Malformed("unterminated part headers".to_string()))?;
        let headers = parse_headers(&body[cursor..header_end])?;
        let content_start = header_end + 4;
        let content_end = find(body, &separator, content_start)
            .ok_or_else(|| UploadError::Malformed("missing closing boundary".to_string()))?;
        let content = &body[content_start..content_end];

        let name = headers
            .name
            .ok_or_else(|| UploadError::Malformed("part without a name".to_string()))?;
        match headers.file_name {
            Some(file_name) if file_name.is_empty() && content.is_empty() => {}
            Some(file_name) => {
                form.files.insert(
                    name.clone(),
                    UploadedFile {
                        field_name: name,
                        file_name,
                        content_type: headers.content_type,
                        bytes: content.to_vec(),
                    },
                );
            }
            None => form
                .parameters
                .append(name, String::from_utf8_lossy(content).into_owned()),
        }
        cursor = content_end + separator.len();
    }
}

fn parse_headers(raw: &[u8]) -> Result<PartHeaders, UploadError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| UploadError::Malformed("part headers are not UTF-8".to_string()))?;
    let mut headers = PartHeaders::default();
    for line in text.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.eq_ignore_ascii_case("content-disposition") {
            for attribute in value.split(';').skip(1) {
                let Some((key, value)) = attribute.trim().split_once('=') else {
                    continue;
                };
                let value = value.trim().trim_matches('"').to_string();
                match key.trim().to_ascii_lowercase().as_str() {
                    "name" => headers.name = Some(value),
                    "filename" => headers.file_name = Some(value),
                    _ => {}
                }
            }
        } else if name.eq_ignore_ascii_case("content-type") {
            headers.content_type = Some(value.trim().to_string());
        }
    }
    Ok(headers)
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "--XyZ\r\n\
        Content-Disposition: form-data; name=\"form:name\"\r\n\r\n\
        Ada\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"form:cv\"; filename=\"cv.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        line one\r\nline two\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"form:empty\"; filename=\"\"\r\n\r\n\
        \r\n\
        --XyZ--\r\n";

    #[test]
    fn decodes_fields_and_files() {
        let form = decode_multipart(BODY.as_bytes(), Some("XyZ"), 1024).unwrap();
        assert_eq!(form.parameters.get("form:name"), Some("Ada"));
        let file = &form.files["form:cv"];
        assert_eq!(file.file_name, "cv.txt");
        assert_eq!(file.content_type.as_deref(), Some("text/plain"));
        assert_eq!(file.bytes, b"line one\r\nline two");
        assert!(!form.files.contains_key("form:empty"));
    }

    #[test]
    fn rejects_oversized_bodies() {
        let err = decode_multipart(BODY.as_bytes(), Some("XyZ"), 10).unwrap_err();
        assert_eq!(
            err,
            UploadError::SizeLimitExceeded {
                limit: 10,
                actual: BODY.len() as u64
            }
        );
    }

    #[test]
    fn requires_boundary() {
        assert_eq!(
            decode_multipart(b"", None, 10),
            Err(UploadError::MissingBoundary)
        );
        assert!(matches!(
            decode_multipart(b"garbage", Some("XyZ"), 100),
            Err(UploadError::Malformed(_))
        ));
    }
}
