//! # Pages
//!
//! Jinja templates live in `templates/` and are embedded at compile time.
//!
//! ## Rendering
//! - Templates end in `.html`, so every interpolated value is HTML escaped
//! - Record text is data only, template syntax inside it renders literally
//! - `feedback_table.html` is shared by the listing and the analysis page
use std::collections::HashMap;

use minijinja::{Environment, context};

use crate::database::FeedbackRecord;

const TEMPLATES: [(&str, &str); 4] = [
    ("index.html", include_str!("../templates/index.html")),
    (
        "admin_analysis.html",
        include_str!("../templates/admin_analysis.html"),
    ),
    ("analysis.html", include_str!("../templates/analysis.html")),
    (
        "feedback_table.html",
        include_str!("../templates/feedback_table.html"),
    ),
];

pub struct Pages {
    env: Environment<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();

        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }

        Ok(Self { env })
    }

    pub fn index(
        &self,
        records: &[FeedbackRecord],
        is_admin: bool,
    ) -> Result<String, minijinja::Error> {
        self.env
            .get_template("index.html")?
            .render(context! { feedback_data => records, is_admin })
    }

    pub fn login(&self) -> Result<String, minijinja::Error> {
        self.env.get_template("admin_analysis.html")?.render(context! {})
    }

    pub fn analysis(&self, records: &[FeedbackRecord]) -> Result<String, minijinja::Error> {
        self.env.get_template("analysis.html")?.render(context! {
            feedback_data => records,
            summary => summarize(records),
            is_admin => true,
        })
    }
}

/// Counts records per sentiment label, most frequent first, ties by label.
pub fn summarize(records: &[FeedbackRecord]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.sentiment.as_str()).or_default() += 1;
    }

    let mut summary: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(label, count)| (label.to_string(), count))
        .collect();
    summary.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    summary
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn record(user_id: &str, text: &str, sentiment: &str) -> FeedbackRecord {
        FeedbackRecord {
            feedback_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            feedback_text: text.to_string(),
            sentiment: sentiment.to_string(),
        }
    }

    fn pages() -> Pages {
        Pages::new().unwrap()
    }

    #[test]
    fn test_record_text_escaped() {
        let records = vec![record("mallory", r#"<script>alert("x" & 'y')</script>"#, "Neutral")];
        let page = pages().index(&records, false).unwrap();

        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;alert(&quot;x&quot; &amp; &#x27;y&#x27;)"));
    }

    #[test]
    fn test_record_text_not_evaluated() {
        let records = vec![record("eve", "{{ 7 * 7 }} {% if true %}x{% endif %}", "Neutral")];
        let page = pages().index(&records, false).unwrap();

        assert!(page.contains("<td>{{ 7 * 7 }} {% if true %}x{% endif %}</td>"));
        assert!(!page.contains("49"));
    }

    #[test]
    fn test_index_page() {
        let records = vec![
            record("alice", "Loved <it>", "POSITIVE"),
            record("bob", "Meh", "NEGATIVE"),
        ];
        let page = pages().index(&records, false).unwrap();

        assert!(page.contains("<tr><td>alice</td><td>Loved &lt;it&gt;</td><td>POSITIVE</td></tr>"));
        assert!(page.contains("<tr><td>bob</td><td>Meh</td><td>NEGATIVE</td></tr>"));
        assert!(!page.contains(&records[0].feedback_id.to_string()));
        assert!(!page.contains("Feedback ID"));
        assert!(!page.contains("No feedback yet."));
    }

    #[test]
    fn test_index_page_empty() {
        let page = pages().index(&[], false).unwrap();

        assert!(page.contains("No feedback yet."));
        assert!(!page.contains("<table>"));
    }

    #[test]
    fn test_login_page() {
        let page = pages().login().unwrap();

        assert!(page.contains(r#"action="/view_analysis""#));
        assert!(page.contains(r#"name="password""#));
    }

    #[test]
    fn test_summarize() {
        let records = vec![
            record("a", "x", "NEGATIVE"),
            record("b", "x", "POSITIVE"),
            record("c", "x", "Positive"),
            record("d", "x", "POSITIVE"),
            record("e", "x", "Error"),
        ];

        assert_eq!(
            summarize(&records),
            vec![
                ("POSITIVE".to_string(), 2),
                ("Error".to_string(), 1),
                ("NEGATIVE".to_string(), 1),
                ("Positive".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_analysis_page() {
        let records = vec![record("a", "good", "POSITIVE"), record("b", "bad", "NEGATIVE")];
        let page = pages().analysis(&records).unwrap();

        assert!(page.contains("Total feedback: 2"));
        assert!(page.contains("<tr><td>NEGATIVE</td><td>1</td></tr>"));
        assert!(page.contains("<th>Feedback ID</th>"));
        for record in &records {
            assert!(page.contains(&format!(
                "<tr><td>{}</td><td>{}</td>",
                record.feedback_id, record.user_id
            )));
        }
    }

    #[test]
    fn test_analysis_page_empty() {
        let page = pages().analysis(&[]).unwrap();

        assert!(page.contains("Total feedback: 0"));
        assert!(page.contains("No feedback yet."));
    }
}
