//! XML exports. Documents are assembled as text so that field order,
//! indentation and line breaks are fixed by the layout below and nothing
//! else.

use crate::model::{SuiteInfo, TestCase};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const TESTLINK_DETAILS: &str = "This test suite contains automated test cases.";

/// Escapes the five XML-significant characters. `&` is handled in the same
/// pass as the others, so existing entities are escaped rather than kept.
pub fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn element(xml: &mut String, indent: &str, name: &str, value: &str) {
    xml.push_str(&format!("{indent}<{name}>{}</{name}>\n", escape_xml(value)));
}

/// Renders the generic `<testcases>` document: project and suite metadata
/// followed by every test case with its steps.
pub fn render_generic<'a, I>(suite: &SuiteInfo, cases: I) -> String
where
    I: IntoIterator<Item = &'a TestCase>,
{
    let mut xml = String::from(DECLARATION);
    xml.push_str("<testcases>\n");
    element(&mut xml, "  ", "project_id", &suite.project_id.to_string());
    element(&mut xml, "  ", "project_name", &suite.project_name);
    element(&mut xml, "  ", "test_suite_id", &suite.test_suite_id.to_string());
    element(&mut xml, "  ", "test_suite_name", &suite.test_suite_name);

    for case in cases {
        xml.push_str("  <testcase>\n");
        element(&mut xml, "    ", "id", &case.id.to_string());
        element(&mut xml, "    ", "title", &case.title);
        element(&mut xml, "    ", "summary", &case.summary);
        element(&mut xml, "    ", "precondition", &case.precondition);
        element(&mut xml, "    ", "postcondition", &case.postcondition);
        element(&mut xml, "    ", "status", case.status.as_str());
        element(&mut xml, "    ", "importance", case.importance.as_str());
        element(&mut xml, "    ", "execution_type", case.execution_type.as_str());

        if !case.test_steps.is_empty() {
            xml.push_str("    <test_steps>\n");
            for step in &case.test_steps {
                xml.push_str("      <step>\n");
                element(&mut xml, "        ", "step_number", &step.step_number.to_string());
                element(&mut xml, "        ", "step_action", &step.step_action);
                element(&mut xml, "        ", "expected_result", &step.expected_result);
                element(&mut xml, "        ", "execution_type", step.execution_type.as_str());
                xml.push_str("      </step>\n");
            }
            xml.push_str("    </test_steps>\n");
        }

        xml.push_str("  </testcase>\n");
    }

    xml.push_str("</testcases>");
    xml
}

/// Renders the TestLink import document rooted at `<testsuite name="..">`.
pub fn render_testlink<'a, I>(suite_name: &str, cases: I) -> String
where
    I: IntoIterator<Item = &'a TestCase>,
{
    let mut xml = String::from(DECLARATION);
    xml.push_str(&format!("<testsuite name=\"{}\">\n\n", escape_xml(suite_name)));
    xml.push_str("  <details>\n");
    xml.push_str(&format!("    {TESTLINK_DETAILS}\n"));
    xml.push_str("  </details>\n\n");

    for case in cases {
        xml.push_str(&format!(
            "  <testcase name=\"{}\" internalid=\"{}\" version=\"1\"\n",
            escape_xml(&case.title),
            escape_xml(&case.id.to_string())
        ));
        xml.push_str(&format!(
            "            summary=\"{}\"\n",
            escape_xml(&case.summary)
        ));
        xml.push_str(&format!(
            "            execution_type=\"{}\" importance=\"{}\">\n\n",
            escape_xml(case.execution_type.as_str()),
            escape_xml(case.importance.as_str())
        ));

        if !case.precondition.is_empty() {
            xml.push_str("    <preconditions>\n");
            xml.push_str(&format!("      {}\n", escape_xml(&case.precondition)));
            xml.push_str("    </preconditions>\n\n");
        }

        if !case.test_steps.is_empty() {
            xml.push_str("    <steps>\n");
            for step in &case.test_steps {
                xml.push_str("      <step>\n");
                element(&mut xml, "        ", "step_number", &step.step_number.to_string());
                element(&mut xml, "        ", "actions", &step.step_action);
                element(&mut xml, "        ", "expectedresults", &step.expected_result);
                element(&mut xml, "        ", "execution_type", step.execution_type.as_str());
                xml.push_str("      </step>\n");
            }
            xml.push_str("    </steps>\n\n");
        }

        xml.push_str("  </testcase>\n\n");
    }

    xml.push_str("</testsuite>");
    xml
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct XmlSummary {
    pub root: String,
    pub testcases: usize,
    pub steps: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("malformed XML at byte {position}: {source}")]
    Malformed {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("document has no root element")]
    MissingRoot,
    #[error("document ends with {0} unclosed element(s)")]
    Unclosed(usize),
}

/// Parses a stored export and counts its test cases and steps. Text and
/// attribute values are unescaped on the way through, so a stray `&` or a
/// broken entity is reported as malformed.
pub fn summarize(xml: &str) -> Result<XmlSummary, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<String> = None;
    let mut depth = 0usize;
    let mut testcases = 0usize;
    let mut steps = 0usize;

    loop {
        let malformed = |source: quick_xml::Error, reader: &Reader<&[u8]>| XmlError::Malformed {
            position: reader.buffer_position() as u64,
            source,
        };
        let event = reader
            .read_event()
            .map_err(|err| malformed(err, &reader))?;
        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                let name = String::from_utf8_lossy(element.name().as_ref()).to_string();
                for attr in element.attributes() {
                    let attr = attr.map_err(|err| malformed(err.into(), &reader))?;
                    attr.unescape_value()
                        .map_err(|err| malformed(err, &reader))?;
                }
                if root.is_none() {
                    root = Some(name.clone());
                }
                match name.as_str() {
                    "testcase" => testcases += 1,
                    "step" => steps += 1,
                    _ => {}
                }
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
            }
            Event::Text(ref text) => {
                text.unescape().map_err(|err| malformed(err, &reader))?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(XmlError::Unclosed(depth));
    }

    Ok(XmlSummary {
        root: root.ok_or(XmlError::MissingRoot)?,
        testcases,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecutionType, Importance, Status, TestStep};
    use time::OffsetDateTime;

    fn suite() -> SuiteInfo {
        SuiteInfo {
            project_id: 1,
            project_name: "Shop & Co".to_string(),
            test_suite_id: 201,
            test_suite_name: "Checkout".to_string(),
        }
    }

    fn case(id: i64, title: &str, steps: usize) -> TestCase {
        TestCase {
            id,
            test_suite_id: 201,
            user_story_id: None,
            title: title.to_string(),
            summary: format!("{title} summary"),
            precondition: String::new(),
            postcondition: String::new(),
            status: Status::NotRun,
            manual_edit: false,
            importance: Importance::High,
            execution_type: ExecutionType::Manual,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            test_steps: (1..=steps as i64)
                .map(|n| TestStep {
                    id: id * 10 + n,
                    test_case_id: id,
                    step_number: n,
                    step_action: format!("do {n}"),
                    expected_result: format!("see {n}"),
                    execution_type: ExecutionType::Manual,
                })
                .collect(),
        }
    }

    #[test]
    fn escape_replaces_all_significant_characters() {
        let escaped = escape_xml(r#"a & b < c > d "e" 'f'"#);
        assert_eq!(
            escaped,
            "a &amp; b &lt; c &gt; d &quot;e&quot; &apos;f&apos;"
        );
        for raw in ['<', '>', '"', '\''] {
            assert!(!escaped.contains(raw));
        }
        assert_eq!(escape_xml("&amp;"), "&amp;amp;");
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn generic_document_has_fixed_layout() {
        let cases = [case(101, "Login", 1)];
        let xml = render_generic(&suite(), &cases);
        let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<testcases>\n\
\x20 <project_id>1</project_id>\n\
\x20 <project_name>Shop &amp; Co</project_name>\n\
\x20 <test_suite_id>201</test_suite_id>\n\
\x20 <test_suite_name>Checkout</test_suite_name>\n\
\x20 <testcase>\n\
\x20   <id>101</id>\n\
\x20   <title>Login</title>\n\
\x20   <summary>Login summary</summary>\n\
\x20   <precondition></precondition>\n\
\x20   <postcondition></postcondition>\n\
\x20   <status>Not Run</status>\n\
\x20   <importance>High</importance>\n\
\x20   <execution_type>Manual</execution_type>\n\
\x20   <test_steps>\n\
\x20     <step>\n\
\x20       <step_number>1</step_number>\n\
\x20       <step_action>do 1</step_action>\n\
\x20       <expected_result>see 1</expected_result>\n\
\x20       <execution_type>Manual</execution_type>\n\
\x20     </step>\n\
\x20   </test_steps>\n\
\x20 </testcase>\n\
</testcases>";
        assert_eq!(xml, expected);
    }

    #[test]
    fn suite_with_stepless_case_omits_its_step_block() {
        let cases = [case(101, "With steps", 3), case(102, "Without steps", 0)];
        let xml = render_generic(&suite(), &cases);

        assert_eq!(xml.matches("<testcase>").count(), 2);
        assert_eq!(xml.matches("<test_steps>").count(), 1);

        let second = xml.split("<testcase>").nth(2).expect("second test case");
        assert!(!second.contains("<test_steps>"));
        let first = xml.split("<testcase>").nth(1).expect("first test case");
        assert_eq!(first.matches("<step>").count(), 3);

        let summary = summarize(&xml).expect("generic export parses");
        assert_eq!(summary.root, "testcases");
        assert_eq!(summary.testcases, 2);
        assert_eq!(summary.steps, 3);
    }

    #[test]
    fn hostile_text_stays_well_formed() {
        let mut hostile = case(7, "<script>&'\"", 1);
        hostile.summary = "]]> & <!-- -->".to_string();
        hostile.test_steps[0].step_action = "</step></testcases>".to_string();
        let mut info = suite();
        info.test_suite_name = "\"quoted\" <suite>".to_string();

        let generic = render_generic(&info, [&hostile]);
        let summary = summarize(&generic).expect("escaped generic export parses");
        assert_eq!(summary.testcases, 1);
        assert_eq!(summary.steps, 1);

        let testlink = render_testlink(&info.test_suite_name, [&hostile]);
        let summary = summarize(&testlink).expect("escaped testlink export parses");
        assert_eq!(summary.root, "testsuite");
        assert_eq!(summary.testcases, 1);
        assert!(testlink.contains("name=\"&lt;script&gt;&amp;&apos;&quot;\""));
    }

    #[test]
    fn testlink_document_has_fixed_layout() {
        let mut with_precondition = case(101, "Login", 1);
        with_precondition.precondition = "User exists".to_string();
        let cases = [with_precondition, case(102, "Logout", 0)];
        let xml = render_testlink("Checkout", &cases);
        let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<testsuite name=\"Checkout\">\n\
\n\
\x20 <details>\n\
\x20   This test suite contains automated test cases.\n\
\x20 </details>\n\
\n\
\x20 <testcase name=\"Login\" internalid=\"101\" version=\"1\"\n\
\x20           summary=\"Login summary\"\n\
\x20           execution_type=\"Manual\" importance=\"High\">\n\
\n\
\x20   <preconditions>\n\
\x20     User exists\n\
\x20   </preconditions>\n\
\n\
\x20   <steps>\n\
\x20     <step>\n\
\x20       <step_number>1</step_number>\n\
\x20       <actions>do 1</actions>\n\
\x20       <expectedresults>see 1</expectedresults>\n\
\x20       <execution_type>Manual</execution_type>\n\
\x20     </step>\n\
\x20   </steps>\n\
\n\
\x20 </testcase>\n\
\n\
\x20 <testcase name=\"Logout\" internalid=\"102\" version=\"1\"\n\
\x20           summary=\"Logout summary\"\n\
\x20           execution_type=\"Manual\" importance=\"High\">\n\
\n\
\x20 </testcase>\n\
\n\
</testsuite>";
        assert_eq!(xml, expected);
    }

    #[test]
    fn rendering_is_deterministic() {
        let cases = [case(1, "a", 2), case(2, "b", 0), case(3, "c", 4)];
        assert_eq!(
            render_generic(&suite(), &cases),
            render_generic(&suite(), &cases)
        );
        assert_eq!(render_testlink("s", &cases), render_testlink("s", &cases));
    }

    #[test]
    fn empty_collection_still_renders_metadata() {
        let xml = render_generic(&suite(), std::iter::empty());
        let summary = summarize(&xml).expect("parses");
        assert_eq!(summary.testcases, 0);
        assert!(xml.contains("<test_suite_name>Checkout</test_suite_name>"));
    }

    #[test]
    fn summarize_rejects_broken_documents() {
        assert!(summarize("<testcases><testcase>").is_err());
        assert!(matches!(summarize(""), Err(XmlError::MissingRoot)));
        assert!(matches!(
            summarize("<a>fish & chips</a>"),
            Err(XmlError::Malformed { .. })
        ));
        assert!(matches!(
            summarize("<a></b>"),
            Err(XmlError::Malformed { .. })
        ));
    }
}
