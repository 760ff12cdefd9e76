//! Conversion between step lists and the tracker's `Microsoft.VSTS.TCM.Steps` XML.

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::domain::test_case::{Steps, TestStep};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// Renders structured steps as steps XML. Raw step strings are returned as-is.
pub fn encode(steps: &Steps, default_expected: Option<&str>) -> String {
    let items = match steps {
        Steps::Raw(text) => return text.clone(),
        Steps::Structured(items) => items,
    };

    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&format!(r#"<steps id="0" last="{}">"#, items.len()));
    for (index, item) in items.iter().enumerate() {
        let expected = if item.expected.is_empty() {
            default_expected.unwrap_or("")
        } else {
            item.expected.as_str()
        };
        xml.push_str(&format!(r#"<step id="{}" type="ActionStep">"#, index + 1));
        xml.push_str(&parameterized(&item.step));
        xml.push_str(&parameterized(expected));
        xml.push_str("<executionStatus>NotExecuted</executionStatus>");
        xml.push_str(&format!("<expectedResult>{}</expectedResult>", cdata(expected)));
        xml.push_str("</step>");
    }
    xml.push_str("</steps>");
    xml
}

fn parameterized(text: &str) -> String {
    format!(
        r#"<parameterizedString isformatted="true">{}</parameterizedString>"#,
        cdata(text)
    )
}

// "]]>" cannot appear inside a CDATA section, so it is split across two.
fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

/// Reads every `<step>` back into a pair. Never fails: unparseable input
/// becomes a single step carrying the raw text.
pub fn decode(xml: &str) -> Vec<TestStep> {
    if xml.trim().is_empty() {
        return Vec::new();
    }
    match parse_steps(xml) {
        Ok(steps) => steps,
        Err(reason) => {
            debug!(reason = %reason, "Steps XML is malformed, keeping raw text");
            vec![TestStep::new(xml, "")]
        }
    }
}

#[derive(Default)]
struct StepBuilder {
    params: Vec<String>,
    expected: Option<String>,
}

impl StepBuilder {
    fn finish(self) -> TestStep {
        let StepBuilder { mut params, expected } = self;
        let expected = expected
            .or_else(|| (params.len() > 1).then(|| params.swap_remove(1)))
            .unwrap_or_default();
        let step = params.into_iter().next().unwrap_or_default();
        TestStep { step, expected }
    }
}

#[derive(Clone, Copy)]
enum Capture {
    Param(usize),
    Expected,
}

fn append_text(current: &mut Option<StepBuilder>, capture: Option<Capture>, value: &str) {
    let (Some(builder), Some(capture)) = (current.as_mut(), capture) else {
        return;
    };
    match capture {
        Capture::Param(index) => {
            if let Some(param) = builder.params.get_mut(index) {
                param.push_str(value);
            }
        }
        Capture::Expected => builder.expected.get_or_insert_with(String::new).push_str(value),
    }
}

fn parse_steps(xml: &str) -> std::result::Result<Vec<TestStep>, String> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut steps = Vec::new();
    let mut current: Option<StepBuilder> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event().map_err(|err| err.to_string())? {
            Event::Start(tag) => {
                if depth == 0 {
                    if seen_root {
                        return Err("multiple root elements".to_string());
                    }
                    seen_root = true;
                }
                depth += 1;
                match tag.name().as_ref() {
                    b"step" => {
                        current = Some(StepBuilder::default());
                        capture = None;
                    }
                    b"parameterizedString" => {
                        if let Some(builder) = current.as_mut() {
                            capture = Some(Capture::Param(builder.params.len()));
                            builder.params.push(String::new());
                        }
                    }
                    b"expectedResult" => {
                        if let Some(builder) = current.as_mut() {
                            capture = Some(Capture::Expected);
                            builder.expected.get_or_insert_with(String::new);
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(tag) => {
                if depth == 0 {
                    if seen_root {
                        return Err("multiple root elements".to_string());
                    }
                    seen_root = true;
                }
                match tag.name().as_ref() {
                    b"step" => steps.push(TestStep::default()),
                    b"parameterizedString" => {
                        if let Some(builder) = current.as_mut() {
                            builder.params.push(String::new());
                        }
                    }
                    b"expectedResult" => {
                        if let Some(builder) = current.as_mut() {
                            builder.expected.get_or_insert_with(String::new);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(tag) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "closing tag without opening tag".to_string())?;
                match tag.name().as_ref() {
                    b"step" => {
                        if let Some(builder) = current.take() {
                            steps.push(builder.finish());
                        }
                        capture = None;
                    }
                    b"parameterizedString" | b"expectedResult" => capture = None,
                    _ => {}
                }
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(|err| err.to_string())?;
                if depth == 0 {
                    if !value.trim().is_empty() {
                        return Err("text outside the root element".to_string());
                    }
                    continue;
                }
                append_text(&mut current, capture, &value);
            }
            Event::CData(data) => {
                if depth == 0 {
                    return Err("CDATA outside the root element".to_string());
                }
                let value = String::from_utf8_lossy(&data);
                append_text(&mut current, capture, &value);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err("unclosed element at end of input".to_string());
    }
    if !seen_root {
        return Err("no root element".to_string());
    }
    Ok(steps)
}
