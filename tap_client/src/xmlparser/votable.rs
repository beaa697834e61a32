use super::{looks_like_xml, non_empty, walk, Node};
use crate::error::TapResult;
use crate::results::{VotableField, VotableSummary};

/// Inspect a VOTable: declared fields, number of rows and query status.
pub fn parse_votable_summary(data: &[u8]) -> TapResult<VotableSummary> {
    let mut summary = VotableSummary::default();
    let mut field: Option<VotableField> = None;
    let mut in_query_status = false;
    let mut rows = 0usize;
    let mut has_tabledata = false;

    walk(data, |node| {
        match node {
            Node::Open { name, attrs } => match name {
                "FIELD" => {
                    field = Some(VotableField {
                        name: attrs.owned("name").unwrap_or_default(),
                        datatype: attrs.owned("datatype"),
                        arraysize: attrs.owned("arraysize"),
                        unit: attrs.owned("unit"),
                        ucd: attrs.owned("ucd"),
                        description: None,
                    });
                }
                "INFO" if attrs.get("name") == Some("QUERY_STATUS") => {
                    summary.query_status = attrs.owned("value");
                    in_query_status = true;
                }
                "TABLEDATA" => has_tabledata = true,
                "TR" => rows += 1,
                _ => {}
            },
            Node::Close { name, text } => match name {
                "DESCRIPTION" => {
                    if let Some(f) = field.as_mut() {
                        f.description = non_empty(text);
                    }
                }
                "FIELD" => {
                    if let Some(done) = field.take() {
                        summary.fields.push(done);
                    }
                }
                "INFO" if in_query_status => {
                    summary.status_message = non_empty(text);
                    in_query_status = false;
                }
                _ => {}
            },
        }
        Ok(())
    })?;

    if has_tabledata {
        summary.row_count = Some(rows);
    }
    Ok(summary)
}

/// Error message carried by an XML error document, if any.
///
/// Recognizes a VOTable `INFO name="QUERY_STATUS" value="ERROR"` and a UWS
/// `errorSummary/message`. Anything else, malformed XML included, yields `None`.
pub fn extract_error_message(data: &[u8]) -> Option<String> {
    if !looks_like_xml(data) {
        return None;
    }
    let mut message: Option<String> = None;
    let mut error_info: Option<String> = None;
    let mut in_error_summary = false;

    // A truncated document still yields the message found before the failure
    let _ = walk(data, |node| {
        if message.is_some() {
            return Ok(());
        }
        match node {
            Node::Open { name: "INFO", attrs }
                if attrs.get("name") == Some("QUERY_STATUS")
                    && attrs.get("value") == Some("ERROR") =>
            {
                error_info = Some(attrs.owned("content").unwrap_or_default());
            }
            Node::Open {
                name: "errorSummary",
                ..
            } => in_error_summary = true,
            Node::Open { .. } => {}
            Node::Close { name: "INFO", text } => {
                if let Some(fallback) = error_info.take() {
                    message = non_empty(text).or_else(|| non_empty(&fallback));
                }
            }
            Node::Close {
                name: "message",
                text,
            } if in_error_summary => message = non_empty(text),
            Node::Close {
                name: "errorSummary",
                ..
            } => in_error_summary = false,
            Node::Close { .. } => {}
        }
        Ok(())
    });

    message
}
