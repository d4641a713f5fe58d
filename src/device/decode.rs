//! Decoding of the device's XML replies.
//!
//! Every function here is total: malformed input yields `None`, never an
//! error or a panic.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

/// What a reply carries, gathered in a single pass over the document
#[derive(Debug, Default, PartialEq, Eq)]
struct Reply {
    /// Text of the first `<returnValue>`, in document order
    return_value: Option<String>,
    /// Direct children of the first `<response>` as (name, text) pairs
    response: Option<Vec<(String, String)>>,
}

/// Streaming state. Only depths are tracked, so nesting costs no stack.
#[derive(Default)]
struct Scan {
    reply: Reply,
    /// Depth of the `<returnValue>` being read, while it is open
    return_depth: Option<usize>,
    /// Depth of the `<response>` being read, while it is open
    response_depth: Option<usize>,
}

impl Scan {
    fn open(&mut self, element: &BytesStart, depth: usize) {
        let name = element.name();
        let name = name.as_ref();

        if name == b"returnValue" && self.reply.return_value.is_none() {
            self.reply.return_value = Some(String::new());
            self.return_depth = Some(depth);
        }

        if name == b"response" && self.reply.response.is_none() {
            self.reply.response = Some(Vec::new());
            self.response_depth = Some(depth);
        } else if self.response_depth.map(|d| d + 1) == Some(depth) {
            if let Some(fields) = self.reply.response.as_mut() {
                fields.push((String::from_utf8_lossy(name).into_owned(), String::new()));
            }
        }
    }

    fn text(&mut self, text: &str, depth: usize) {
        if self.return_depth == Some(depth) {
            if let Some(value) = self.reply.return_value.as_mut() {
                value.push_str(text);
            }
        }
        if self.response_depth.map(|d| d + 1) == Some(depth) {
            if let Some((_, value)) = self.reply.response.as_mut().and_then(|f| f.last_mut()) {
                value.push_str(text);
            }
        }
    }

    fn close(&mut self, depth: usize) {
        if self.return_depth == Some(depth) {
            self.return_depth = None;
        }
        if self.response_depth == Some(depth) {
            self.response_depth = None;
        }
    }
}

/// Read a whole document. Any syntax error, unclosed element or second
/// root element makes the document unusable.
fn scan(xml: &str) -> Option<Reply> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut state = Scan::default();
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if depth == 0 && seen_root {
                    return None;
                }
                seen_root = true;
                depth += 1;
                state.open(&e, depth);
            }
            Ok(Event::Empty(e)) => {
                if depth == 0 && seen_root {
                    return None;
                }
                seen_root = true;
                state.open(&e, depth + 1);
                state.close(depth + 1);
            }
            Ok(Event::End(_)) => {
                state.close(depth);
                depth = depth.checked_sub(1)?;
            }
            Ok(Event::Text(t)) => state.text(&t.unescape().ok()?, depth),
            Ok(Event::CData(c)) => state.text(std::str::from_utf8(&c).ok()?, depth),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("Discarding malformed device XML: {}", e);
                return None;
            }
        }
    }

    if depth != 0 || !seen_root {
        return None;
    }
    Some(state.reply)
}

fn return_code(reply: &Reply) -> Option<i64> {
    reply.return_value.as_deref()?.trim().parse().ok()
}

/// Integer content of the `<returnValue>` element
pub fn return_value(xml: &str) -> Option<i64> {
    return_code(&scan(xml)?)
}

/// Children of `<response>` as (name, text) pairs, only when the return
/// value is exactly 0.
pub fn response_fields(xml: &str) -> Option<Vec<(String, String)>> {
    let reply = scan(xml)?;
    if return_code(&reply)? != 0 {
        return None;
    }
    reply.response
}

pub fn dictionary(xml: &str) -> Option<HashMap<String, String>> {
    Some(response_fields(xml)?.into_iter().collect())
}

pub fn list(xml: &str) -> Option<Vec<String>> {
    Some(response_fields(xml)?.into_iter().map(|(_, value)| value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO_OK: &str =
        "<theDavidBox><returnValue>0</returnValue><response><title>A</title></response></theDavidBox>";
    const INFO_FAILED: &str =
        "<theDavidBox><returnValue>1</returnValue><response><title>A</title></response></theDavidBox>";

    #[test]
    fn dictionary_from_successful_response() {
        let fields = dictionary(INFO_OK).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("title").map(String::as_str), Some("A"));
    }

    #[test]
    fn non_zero_return_value_blocks_response_decoding() {
        assert_eq!(return_value(INFO_FAILED), Some(1));
        assert_eq!(response_fields(INFO_FAILED), None);
        assert_eq!(dictionary(INFO_FAILED), None);
        assert_eq!(list(INFO_FAILED), None);
    }

    #[test]
    fn list_keeps_order_and_ignores_names() {
        let xml = r#"<?xml version="1.0"?>
            <theDavidBox>
              <request><arg0>list_key</arg0></request>
              <response>
                <key>play</key>
                <key>pause</key>
                <other>next</other>
              </response>
              <returnValue>0</returnValue>
            </theDavidBox>"#;
        assert_eq!(list(xml).unwrap(), vec!["play", "pause", "next"]);
    }

    #[test]
    fn missing_return_value_is_no_result() {
        let xml = "<theDavidBox><response><title>A</title></response></theDavidBox>";
        assert_eq!(return_value(xml), None);
        assert_eq!(dictionary(xml), None);
    }

    #[test]
    fn non_numeric_return_value_is_no_result() {
        assert_eq!(return_value("<r><returnValue>ok</returnValue></r>"), None);
        assert_eq!(return_value("<r><returnValue/></r>"), None);
    }

    #[test]
    fn whitespace_around_return_value_is_tolerated() {
        assert_eq!(return_value("<r><returnValue>\n  -3\n</returnValue></r>"), Some(-3));
    }

    #[test]
    fn missing_response_element_is_no_result() {
        assert_eq!(dictionary("<r><returnValue>0</returnValue></r>"), None);
    }

    #[test]
    fn empty_response_decodes_to_empty_containers() {
        let xml = "<r><returnValue>0</returnValue><response/></r>";
        assert_eq!(dictionary(xml), Some(HashMap::new()));
        assert_eq!(list(xml), Some(Vec::new()));
    }

    #[test]
    fn escaped_text_is_unescaped() {
        let xml =
            "<r><returnValue>0</returnValue><response><title>Tom &amp; Jerry</title></response></r>";
        assert_eq!(dictionary(xml).unwrap()["title"], "Tom & Jerry");
    }

    #[test]
    fn malformed_documents_are_no_result() {
        assert_eq!(return_value(""), None);
        assert_eq!(list("<?xml version=\"1.0\"?>"), None);
        assert_eq!(return_value("not xml at all"), None);
        assert_eq!(return_value("<r><returnValue>0</returnValue>"), None);
        assert_eq!(return_value("<r><returnValue>0</r></returnValue>"), None);
        assert_eq!(return_value("<a/><b><returnValue>0</returnValue></b>"), None);
    }

    #[test]
    fn first_return_value_in_document_order_wins() {
        let xml = "<a><b><returnValue>1</returnValue></b><returnValue>2</returnValue></a>";
        assert_eq!(return_value(xml), Some(1));
    }

    #[test]
    fn fields_take_only_their_own_text() {
        let xml = "<r><returnValue>0</returnValue>\
                   <response><x>1<y>2</y></x><z/></response>\
                   <response><w>3</w></response></r>";
        assert_eq!(
            response_fields(xml).unwrap(),
            vec![("x".to_string(), "1".to_string()), ("z".to_string(), String::new())]
        );
    }

    #[test]
    fn root_may_be_the_response() {
        let xml = "<response><returnValue>0</returnValue><title>A</title></response>";
        assert_eq!(list(xml).unwrap(), vec!["0", "A"]);
    }

    #[test]
    fn deep_nesting_does_not_overflow() {
        let depth = 300_000;
        let nested = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));

        let xml = format!("<r><returnValue>0</returnValue>{}</r>", nested);
        assert_eq!(return_value(&xml), Some(0));
        assert_eq!(dictionary(&xml), None);

        let unclosed = format!("<r><returnValue>0</returnValue>{}</r>", "<a>".repeat(depth));
        assert_eq!(return_value(&unclosed), None);
    }
}
